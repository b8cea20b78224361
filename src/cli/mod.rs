//! # CLI Driver
//!
//! The thin shell around the table facade: a line-oriented REPL with a
//! two-tier grammar — meta-commands starting with `.`, and the
//! `insert`/`select` statement language. Every user-visible string here is
//! part of the external contract, down to the prompt and the punctuation
//! of error messages, so the REPL is generic over its input and output
//! streams and the whole transcript is asserted in tests.

pub mod commands;
pub mod repl;
pub mod statement;

pub use repl::{Repl, ReplOutcome};
pub use statement::{ParseError, Statement};
