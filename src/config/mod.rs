//! Configuration constants for rowdb.
//!
//! There is no runtime configuration surface; everything the engine needs
//! is a compile-time constant defined in [`constants`].

pub mod constants;

pub use constants::{INVALID_PAGE_NUM, PAGE_SIZE, TABLE_MAX_PAGES};
