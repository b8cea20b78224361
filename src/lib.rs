//! # rowdb - Single-Table Embedded Key-Value Store
//!
//! rowdb stores fixed-shape rows keyed by a 32-bit unsigned integer in a
//! single paged file, organized as a B+tree: leaves hold rows in key order
//! and are linked left to right, internal nodes route lookups by key range.
//! A line-oriented REPL (`db <filename>`) fronts the library.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       REPL driver (cli, bin/db)      │
//! ├─────────────────────────────────────┤
//! │       Table facade │ Cursor          │
//! ├─────────────────────────────────────┤
//! │   B+tree operations (search/split)   │
//! ├─────────────────────────────────────┤
//! │   Node views │ Row record (zerocopy) │
//! ├─────────────────────────────────────┤
//! │      Pager (page cache over file)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! A database is one flat file of 4096-byte pages. Page 0 is always the
//! root node; further pages are allocated append-only and never freed.
//! A zero-length file is an empty tree. Integers are host-endian, so the
//! file is not portable across architectures.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rowdb::{InsertOutcome, Row, Table};
//!
//! let mut table = Table::open("./users.db")?;
//! let row = Row { id: 1, username: "alice".into(), email: "alice@example.com".into() };
//! assert!(matches!(table.insert(&row)?, InsertOutcome::Inserted));
//!
//! let mut cursor = table.start()?;
//! while !cursor.end_of_table() {
//!     println!("{:?}", cursor.row()?);
//!     cursor.advance()?;
//! }
//! table.close()?;
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the pager — a fixed-capacity page cache over the file
//! - [`btree`]: node layout views and the tree operations
//! - [`records`]: fixed-offset row serialization
//! - [`table`]: the facade owning the pager and the root page
//! - [`cursor`]: forward iteration over leaf cells
//! - [`cli`]: statement grammar, meta-commands, and the REPL loop
//!
//! ## Concurrency
//!
//! None. The store is single-threaded by design; ownership flows downward
//! (table owns pager, cursors and node views borrow) and the borrow checker
//! guarantees no page reference outlives the operation that produced it.

pub mod btree;
pub mod cli;
pub mod config;
pub mod cursor;
pub mod records;
pub mod storage;
pub mod table;

pub use btree::InsertOutcome;
pub use cursor::Cursor;
pub use records::Row;
pub use table::Table;
