//! Prompt rendering.
//!
//! The prompt embeds the fixed store schema so the model cannot invent
//! tables or columns, and demands a bare JSON object in reply. Rendering is
//! deterministic: the same question always yields the same prompt.

/// Table and column listing embedded in every prompt.
pub const SCHEMA: &str = "\
- products(id INTEGER, name TEXT, price REAL)
- customers(id INTEGER, name TEXT, email TEXT, regn TEXT, age INTEGER, status TEXT, last_transaction_date TEXT)
- regions(id INTEGER, name TEXT, manager TEXT)
- sales(id INTEGER, customer_id INTEGER, product_id INTEGER, xx23 REAL, \"123sales\" REAL, date TEXT)";

/// Render the instruction for a sanitized question.
pub fn build_prompt(question: &str) -> String {
    format!(
        r#"
You are a business analyst and SQL expert.

Given the following schema:
{SCHEMA}

Your job is to take a vague business question and return:
1. A valid SQL query based on this schema.
2. A short, clear explanation of what the query does.

Make sure the SQL query always includes a date filter (e.g., WHERE date >= '2023-01-01') unless its irrelevant.

Respond **only in the following JSON format**:

{{
  "sql": "...",
  "explanation": "..."
}}

Vague Question: "{question}"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let q = "Which region has the highest sales in 2024?";
        assert_eq!(build_prompt(q), build_prompt(q));
    }

    #[test]
    fn embeds_every_table() {
        let prompt = build_prompt("anything");
        for table in ["products(", "customers(", "regions(", "sales("] {
            assert!(prompt.contains(table), "missing {table}");
        }
        assert!(prompt.contains(r#""123sales" REAL"#));
        assert!(prompt.contains("last_transaction_date TEXT"));
    }

    #[test]
    fn demands_json_shape() {
        let prompt = build_prompt("q");
        assert!(prompt.contains("Respond **only in the following JSON format**"));
        assert!(prompt.contains("{\n  \"sql\": \"...\",\n  \"explanation\": \"...\"\n}"));
    }

    #[test]
    fn ends_with_quoted_question() {
        let prompt = build_prompt("Top 5 customers by spend");
        assert!(prompt.ends_with("Vague Question: \"Top 5 customers by spend\"\n"));
    }

    #[test]
    fn golden_prefix() {
        let prompt = build_prompt("q");
        assert!(prompt.starts_with(
            "\nYou are a business analyst and SQL expert.\n\nGiven the following schema:\n- products("
        ));
    }
}
