//! Minimal SQL scanner.
//!
//! Splits statement text into tokens just finely enough to tell keywords
//! apart from string literals, quoted identifiers, and comments, and to
//! know the parenthesis depth of each token. It does not parse.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Bare identifier, keyword, or number.
    Word,
    /// `"ident"`, `` `ident` ``, or `[ident]`.
    Quoted,
    /// `'literal'` with `''` escapes.
    Str,
    /// `-- line` or `/* block */`.
    Comment,
    Space,
    /// Run of `< > = !`.
    Op,
    Semicolon,
    Open,
    Close,
    Punct,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset into the scanned text.
    pub start: usize,
    /// Parenthesis depth; parens themselves carry the outer depth.
    pub depth: usize,
    /// False for a literal, quoted identifier, or block comment that runs
    /// off the end of the text without its closing delimiter.
    pub closed: bool,
}

impl Token<'_> {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Space | TokenKind::Comment)
    }

    /// Bare word equal to `word`, ignoring ASCII case.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    /// Bare or quoted identifier naming `ident`, ignoring ASCII case.
    pub fn names(&self, ident: &str) -> bool {
        match self.kind {
            TokenKind::Word => self.text.eq_ignore_ascii_case(ident),
            TokenKind::Quoted if self.text.len() >= 2 => {
                self.text[1..self.text.len() - 1].eq_ignore_ascii_case(ident)
            }
            _ => false,
        }
    }
}

// Bytes >= 0x80 belong to multi-byte characters; treating them as word
// bytes keeps every split on an ASCII byte, hence on a char boundary.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_op_byte(b: u8) -> bool {
    matches!(b, b'<' | b'>' | b'=' | b'!')
}

fn scan_while(bytes: &[u8], mut i: usize, pred: fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

/// End of a quoted run opened at `i`; a doubled quote is an escape.
/// `None` when the closing quote never comes.
fn scan_quoted(bytes: &[u8], i: usize, quote: u8) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return Some(j + 1);
        }
        j += 1;
    }
    None
}

/// Position just past `terminator`, searching from `from`.
fn scan_past(bytes: &[u8], from: usize, terminator: &[u8]) -> Option<usize> {
    bytes
        .get(from..)
        .and_then(|rest| rest.windows(terminator.len()).position(|w| w == terminator))
        .map(|pos| from + pos + terminator.len())
}

/// An unclosed run extends to the end of the text.
fn or_end(end: Option<usize>, len: usize) -> (usize, bool) {
    end.map_or((len, false), |end| (end, true))
}

fn scan_line(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| i + pos)
}

pub(crate) fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let mut token_depth = depth;
        let mut closed = true;
        let b = bytes[i];
        let kind = match b {
            _ if b.is_ascii_whitespace() => {
                i = scan_while(bytes, i, |c| c.is_ascii_whitespace());
                TokenKind::Space
            }
            b'\'' => {
                (i, closed) = or_end(scan_quoted(bytes, i, b'\''), bytes.len());
                TokenKind::Str
            }
            b'"' | b'`' => {
                (i, closed) = or_end(scan_quoted(bytes, i, b), bytes.len());
                TokenKind::Quoted
            }
            b'[' => {
                (i, closed) = or_end(scan_past(bytes, i + 1, b"]"), bytes.len());
                TokenKind::Quoted
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = scan_line(bytes, i);
                TokenKind::Comment
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                (i, closed) = or_end(scan_past(bytes, i + 2, b"*/"), bytes.len());
                TokenKind::Comment
            }
            b'(' => {
                i += 1;
                depth += 1;
                TokenKind::Open
            }
            b')' => {
                i += 1;
                depth = depth.saturating_sub(1);
                token_depth = depth;
                TokenKind::Close
            }
            b';' => {
                i += 1;
                TokenKind::Semicolon
            }
            _ if is_op_byte(b) => {
                i = scan_while(bytes, i, is_op_byte);
                TokenKind::Op
            }
            _ if is_word_byte(b) => {
                i = scan_while(bytes, i, is_word_byte);
                TokenKind::Word
            }
            _ => {
                i += 1;
                TokenKind::Punct
            }
        };
        tokens.push(Token {
            kind,
            text: &sql[start..i],
            start,
            depth: token_depth,
            closed,
        });
    }
    tokens
}
