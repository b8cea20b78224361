//! # Storage Layer
//!
//! One component lives here: the [`Pager`], a fixed-capacity page cache
//! over the single database file. Everything above it — node views, tree
//! operations, the table facade — addresses storage exclusively by page
//! number; no memory pointer to a page ever crosses a module boundary.
//!
//! ## Design
//!
//! The pager is deliberately simple, matching the store's single-threaded,
//! no-recovery contract:
//!
//! - Pages load lazily on first access and stay resident; there is no
//!   eviction, only a hard slot ceiling.
//! - The returned buffer aliases the cache, so a mutation through
//!   `page_mut` is observed by every later read and persisted by `flush`.
//! - Dirtiness is not tracked; closing the pager writes every loaded page
//!   back in one pass. With at most 400 slots of 4 KiB each, writing a
//!   clean page costs less than tracking would.
//! - Durability is best-effort: there is no write-ahead log and no fsync
//!   discipline, so a crash mid-operation can corrupt the file.

mod pager;

pub use pager::Pager;
