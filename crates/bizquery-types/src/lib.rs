//! # bizquery-types
//!
//! Shared type definitions for bizquery. Every other crate in the
//! workspace depends on this one; it performs no I/O.
//!
//! - **[`ask`]** -- inbound request, pipeline outcome, and wire response
//! - **[`config`]** -- configuration schema for server, completion
//!   service, database, and pipeline budgets

pub mod ask;
pub mod config;

pub use ask::{AskRequest, AskResponse, AskResult, ErrorKind, Row};
pub use config::Config;
