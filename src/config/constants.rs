//! # Layout and Capacity Constants
//!
//! This module centralizes the constants that shape the on-disk format and
//! the pager's capacity. Constants that depend on each other are co-located
//! with their relationships documented; everything derivable is derived in
//! the module that owns the corresponding layout (see `records` and
//! `btree::leaf` / `btree::interior`).
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> LEAF_NODE_SPACE_FOR_CELLS   (btree::leaf, derived)
//!       ├─> LEAF_NODE_MAX_CELLS         (btree::leaf, derived)
//!       └─> file length must be a whole multiple (checked at open)
//!
//! TABLE_MAX_PAGES (400)
//!       │
//!       └─> hard ceiling on the pager's slot array; exceeding it is a
//!           fatal error, not an eviction trigger (there is no eviction)
//!
//! INVALID_PAGE_NUM (u32::MAX)
//!       │
//!       └─> transient right-child sentinel during internal-node splits;
//!           must never be observed by a lookup
//! ```

/// Size of one database page in bytes. The fundamental unit of I/O.
pub const PAGE_SIZE: usize = 4096;

/// Capacity of the pager's slot array. The cache is unbounded up to this
/// ceiling: pages are never evicted, and fetching a page number at or past
/// the ceiling is a fatal error.
pub const TABLE_MAX_PAGES: usize = 400;

/// Sentinel marking an internal node's right child as unset while a split
/// is rearranging children. Never a valid page number.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

const _: () = assert!(PAGE_SIZE % 8 == 0, "pages must be word-aligned on disk");

const _: () = assert!(
    (TABLE_MAX_PAGES as u64) < INVALID_PAGE_NUM as u64,
    "the invalid-page sentinel must be outside the addressable page range"
);
