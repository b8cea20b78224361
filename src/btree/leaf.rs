//! # Leaf Node Layout and Views
//!
//! A leaf page stores rows in key order as fixed-size cells, plus a link
//! to its right sibling so a full scan can walk the leaf level without
//! touching the index above it.
//!
//! ## Leaf Header (14 bytes)
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  ----------------------------------
//! 0       6     common     node type, root flag, parent page
//! 6       4     num_cells  occupied cells
//! 10      4     next_leaf  right sibling page (0 = none)
//! ```
//!
//! `next_leaf = 0` can stand for "no sibling" because page 0 is always the
//! root and therefore never anyone's sibling.
//!
//! ## Cell Layout (297 bytes)
//!
//! ```text
//! +-----------+---------------------------+
//! | key (u32) |   row record (293 bytes)  |
//! +-----------+---------------------------+
//! ```
//!
//! Cells are packed contiguously after the header. With 4096-byte pages
//! that yields 13 cells per leaf; capacity and the split counts are derived
//! from the layout, never hard-coded.
//!
//! ## Views
//!
//! [`LeafNode`] / [`LeafNodeMut`] borrow a full page and expose typed
//! accessors. Construction validates the page size, the node-type tag, and
//! that `num_cells` is within capacity, so accessors past that point index
//! within the page by construction.

use eyre::{ensure, Result};
use zerocopy::byteorder::{NativeEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::{NodeHeader, NodeType};
use crate::config::PAGE_SIZE;
use crate::records::{Row, RowRecord, ROW_SIZE};

pub const LEAF_NODE_HEADER_SIZE: usize = size_of::<LeafHeader>();
pub const LEAF_NODE_KEY_SIZE: usize = size_of::<U32<NativeEndian>>();
pub const LEAF_NODE_CELL_SIZE: usize = size_of::<LeafCell>();
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

/// On split, the right sibling takes the larger half of the `MAX + 1`
/// cells and the original keeps the rest.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

const _: () = assert!(LEAF_NODE_CELL_SIZE == LEAF_NODE_KEY_SIZE + ROW_SIZE);
const _: () = assert!(LEAF_NODE_MAX_CELLS >= 2, "a leaf must hold at least two cells");
const _: () = assert!(
    LEAF_NODE_LEFT_SPLIT_COUNT + LEAF_NODE_RIGHT_SPLIT_COUNT == LEAF_NODE_MAX_CELLS + 1,
    "split counts must cover every cell exactly once"
);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafHeader {
    common: NodeHeader,
    num_cells: U32<NativeEndian>,
    next_leaf: U32<NativeEndian>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafCell {
    key: U32<NativeEndian>,
    row: RowRecord,
}

/// Outcome of a key search within one node: the exact cell, or the cell
/// index where the key would be inserted (possibly one past the last).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(usize),
    NotFound(usize),
}

impl SearchResult {
    /// The cell index either way — a cursor position.
    pub fn index(self) -> usize {
        match self {
            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
        }
    }
}

#[derive(Debug)]
pub struct LeafNode<'a> {
    data: &'a [u8],
}

pub struct LeafNodeMut<'a> {
    data: &'a mut [u8],
}

fn validate(data: &[u8]) -> Result<()> {
    ensure!(
        data.len() == PAGE_SIZE,
        "invalid page size: {} != {}",
        data.len(),
        PAGE_SIZE
    );
    let node_type = NodeHeader::of(data)?.node_type()?;
    ensure!(
        node_type == NodeType::Leaf,
        "expected a leaf page, found {:?}",
        node_type
    );
    let num_cells = LeafNode { data }.num_cells();
    ensure!(
        num_cells as usize <= LEAF_NODE_MAX_CELLS,
        "leaf claims {} cells, capacity is {}: corrupt page",
        num_cells,
        LEAF_NODE_MAX_CELLS
    );
    Ok(())
}

fn cell_range(index: usize) -> std::ops::Range<usize> {
    let start = LEAF_NODE_HEADER_SIZE + index * LEAF_NODE_CELL_SIZE;
    start..start + LEAF_NODE_CELL_SIZE
}

impl<'a> LeafNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    fn header(&self) -> &LeafHeader {
        LeafHeader::ref_from_bytes(&self.data[..LEAF_NODE_HEADER_SIZE])
            .unwrap() // INVARIANT: page size validated in from_page
    }

    pub fn num_cells(&self) -> u32 {
        self.header().num_cells.get()
    }

    pub fn next_leaf(&self) -> u32 {
        self.header().next_leaf.get()
    }

    pub fn parent(&self) -> u32 {
        self.header().common.parent()
    }

    pub fn is_root(&self) -> bool {
        self.header().common.is_root()
    }

    fn cell(&self, index: usize) -> Result<&'a LeafCell> {
        ensure!(
            index < self.num_cells() as usize,
            "cell index {} out of bounds (num_cells={})",
            index,
            self.num_cells()
        );
        LeafCell::ref_from_bytes(&self.data[cell_range(index)])
            .map_err(|e| eyre::eyre!("failed to read leaf cell {}: {:?}", index, e))
    }

    pub fn key_at(&self, index: usize) -> Result<u32> {
        Ok(self.cell(index)?.key.get())
    }

    pub fn row_at(&self, index: usize) -> Result<&'a RowRecord> {
        Ok(&self.cell(index)?.row)
    }

    /// Raw bytes of one cell, for split redistribution.
    pub fn raw_cell(&self, index: usize) -> Result<&'a [u8]> {
        ensure!(
            index < self.num_cells() as usize,
            "cell index {} out of bounds (num_cells={})",
            index,
            self.num_cells()
        );
        Ok(&self.data[cell_range(index)])
    }

    /// Largest key in the leaf.
    pub fn max_key(&self) -> Result<u32> {
        ensure!(self.num_cells() > 0, "max key requested on an empty leaf");
        self.key_at(self.num_cells() as usize - 1)
    }

    /// Binary search over the cell keys.
    pub fn find(&self, key: u32) -> SearchResult {
        let mut lo = 0usize;
        let mut hi = self.num_cells() as usize;
        while lo != hi {
            let mid = (lo + hi) / 2;
            let key_at_mid = key_unchecked(self.data, mid);
            if key == key_at_mid {
                return SearchResult::Found(mid);
            }
            if key < key_at_mid {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        SearchResult::NotFound(lo)
    }
}

// Reads a cell key without a bounds check against num_cells; callers stay
// below num_cells, which validate() bounded by the page capacity.
fn key_unchecked(data: &[u8], index: usize) -> u32 {
    let start = cell_range(index).start;
    u32::from_ne_bytes([
        data[start],
        data[start + 1],
        data[start + 2],
        data[start + 3],
    ])
}

impl<'a> LeafNodeMut<'a> {
    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    /// Initializes the page as an empty leaf. Does not touch the parent
    /// back-reference; the caller sets it when linking the node in.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = LeafHeader::mut_from_bytes(&mut data[..LEAF_NODE_HEADER_SIZE])
            .unwrap(); // INVARIANT: size checked above
        header.common.set_node_type(NodeType::Leaf);
        header.common.set_root(false);
        header.num_cells.set(0);
        header.next_leaf.set(0);
        Ok(Self { data })
    }

    pub fn as_ref(&self) -> LeafNode<'_> {
        LeafNode { data: self.data }
    }

    fn header_mut(&mut self) -> &mut LeafHeader {
        LeafHeader::mut_from_bytes(&mut self.data[..LEAF_NODE_HEADER_SIZE])
            .unwrap() // INVARIANT: page size validated in from_page/init
    }

    pub fn num_cells(&self) -> u32 {
        self.as_ref().num_cells()
    }

    pub fn next_leaf(&self) -> u32 {
        self.as_ref().next_leaf()
    }

    pub fn set_num_cells(&mut self, num_cells: u32) {
        self.header_mut().num_cells.set(num_cells);
    }

    pub fn set_next_leaf(&mut self, page_num: u32) {
        self.header_mut().next_leaf.set(page_num);
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.header_mut().common.set_parent(page_num);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.header_mut().common.set_root(is_root);
    }

    /// Inserts a cell at `index`, shifting later cells right. The caller
    /// checks capacity first; a full leaf must split instead.
    pub fn insert_at(&mut self, index: usize, key: u32, row: &Row) -> Result<()> {
        let num_cells = self.num_cells() as usize;
        ensure!(
            num_cells < LEAF_NODE_MAX_CELLS,
            "leaf is full ({} cells); split before inserting",
            num_cells
        );
        ensure!(
            index <= num_cells,
            "insert index {} out of bounds (num_cells={})",
            index,
            num_cells
        );

        if index < num_cells {
            let src = cell_range(index).start;
            let end = cell_range(num_cells - 1).end;
            let dst = cell_range(index + 1).start;
            self.data.copy_within(src..end, dst);
        }

        self.write_cell(index, key, row)?;
        self.set_num_cells(num_cells as u32 + 1);
        Ok(())
    }

    /// Writes one cell in place without shifting or touching `num_cells`;
    /// split redistribution uses this to rebuild both halves.
    pub fn write_cell(&mut self, index: usize, key: u32, row: &Row) -> Result<()> {
        ensure!(
            index < LEAF_NODE_MAX_CELLS,
            "cell index {} out of capacity ({})",
            index,
            LEAF_NODE_MAX_CELLS
        );
        let cell = LeafCell::mut_from_bytes(&mut self.data[cell_range(index)])
            .map_err(|e| eyre::eyre!("failed to write leaf cell {}: {:?}", index, e))?;
        cell.key.set(key);
        row.write_record(&mut cell.row)
    }

    /// Copies a raw cell produced by [`LeafNode::raw_cell`].
    pub fn write_raw_cell(&mut self, index: usize, cell: &[u8]) -> Result<()> {
        ensure!(
            index < LEAF_NODE_MAX_CELLS,
            "cell index {} out of capacity ({})",
            index,
            LEAF_NODE_MAX_CELLS
        );
        ensure!(
            cell.len() == LEAF_NODE_CELL_SIZE,
            "raw cell is {} bytes, expected {}",
            cell.len(),
            LEAF_NODE_CELL_SIZE
        );
        self.data[cell_range(index)].copy_from_slice(cell);
        Ok(())
    }
}
