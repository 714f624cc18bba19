//! Command Layer Module
//!
//! Parses interactive CLI input into typed commands and dispatches them to
//! the store and persistence layers.
//!
//! ```text
//! input line ──> Command::parse ──> CommandHandler::execute ──> Reply
//!                                           │
//!                                           ▼
//!                                    Store / snapshot
//! ```
//!
//! The layer holds no business logic of its own: every command maps onto
//! exactly one store or persistence operation, and replies are plain text.

pub mod handler;

// Re-export the main types
pub use handler::{Command, CommandHandler, ParseError, Reply};
