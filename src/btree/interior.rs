//! # Internal Node Layout and Views
//!
//! An internal page routes searches: it holds up to `INTERNAL_NODE_MAX_KEYS`
//! cells of (child page, routing key) plus a distinguished right child for
//! everything above the last key. A routing key equals the largest key in
//! the subtree its child gates.
//!
//! ## Internal Header (14 bytes)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------
//! 0       6     common       node type, root flag, parent page
//! 6       4     num_keys     occupied cells
//! 10      4     right_child  page gating keys above the last key
//! ```
//!
//! ## Cell Layout (8 bytes)
//!
//! ```text
//! +-------------+------------+
//! | child (u32) | key (u32)  |
//! +-------------+------------+
//! ```
//!
//! ## Routing
//!
//! For a search key `k`, the first cell whose key is `>= k` names the
//! subtree to descend into; if every cell key is `< k`, the right child
//! does. [`InteriorNode::find_child_index`] returns the cell index, or
//! `num_keys` to mean the right child.
//!
//! ## The Invalid Right Child
//!
//! While a split rearranges children, a node's right child briefly holds
//! `INVALID_PAGE_NUM`. That state is internal to the split: the checked
//! accessor [`InteriorNode::child_at`] refuses to return it, so a lookup
//! that somehow reached such a node fails loudly instead of descending
//! into a nonsense page.

use eyre::{ensure, Result};
use zerocopy::byteorder::{NativeEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::{NodeHeader, NodeType};
use crate::config::{INVALID_PAGE_NUM, PAGE_SIZE};

pub const INTERNAL_NODE_HEADER_SIZE: usize = size_of::<InteriorHeader>();
pub const INTERNAL_NODE_CELL_SIZE: usize = size_of::<InteriorCell>();

/// Deliberately tiny fanout so a handful of inserts exercises every split
/// path; a production tree would derive this from the page size.
pub const INTERNAL_NODE_MAX_KEYS: usize = 3;

const _: () = assert!(
    INTERNAL_NODE_HEADER_SIZE + INTERNAL_NODE_MAX_KEYS * INTERNAL_NODE_CELL_SIZE <= PAGE_SIZE,
    "internal cells must fit in one page"
);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct InteriorHeader {
    common: NodeHeader,
    num_keys: U32<NativeEndian>,
    right_child: U32<NativeEndian>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct InteriorCell {
    child: U32<NativeEndian>,
    key: U32<NativeEndian>,
}

#[derive(Debug)]
pub struct InteriorNode<'a> {
    data: &'a [u8],
}

pub struct InteriorNodeMut<'a> {
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
        node_type == NodeType::Internal,
        "expected an internal page, found {:?}",
        node_type
    );
    let num_keys = InteriorNode { data }.num_keys();
    ensure!(
        num_keys as usize <= INTERNAL_NODE_MAX_KEYS,
        "internal node claims {} keys, capacity is {}: corrupt page",
        num_keys,
        INTERNAL_NODE_MAX_KEYS
    );
    Ok(())
}

fn cell_range(index: usize) -> std::ops::Range<usize> {
    let start = INTERNAL_NODE_HEADER_SIZE + index * INTERNAL_NODE_CELL_SIZE;
    start..start + INTERNAL_NODE_CELL_SIZE
}

impl<'a> InteriorNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    fn header(&self) -> &InteriorHeader {
        InteriorHeader::ref_from_bytes(&self.data[..INTERNAL_NODE_HEADER_SIZE])
            .unwrap() // INVARIANT: page size validated in from_page
    }

    pub fn num_keys(&self) -> u32 {
        self.header().num_keys.get()
    }

    /// Raw right child; may be the invalid sentinel mid-split.
    pub fn right_child(&self) -> u32 {
        self.header().right_child.get()
    }

    pub fn parent(&self) -> u32 {
        self.header().common.parent()
    }

    pub fn is_root(&self) -> bool {
        self.header().common.is_root()
    }

    fn cell(&self, index: usize) -> Result<&'a InteriorCell> {
        ensure!(
            index < self.num_keys() as usize,
            "cell index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        InteriorCell::ref_from_bytes(&self.data[cell_range(index)])
            .map_err(|e| eyre::eyre!("failed to read internal cell {}: {:?}", index, e))
    }

    pub fn key_at(&self, index: usize) -> Result<u32> {
        Ok(self.cell(index)?.key.get())
    }

    /// Child page stored in cell `index`, without interpreting the right
    /// child. Splits use this while rearranging cells.
    pub fn cell_child(&self, index: usize) -> Result<u32> {
        Ok(self.cell(index)?.child.get())
    }

    /// Child for position `index`, where `index == num_keys` means the
    /// right child. Refuses to hand out the invalid sentinel: a lookup
    /// must never observe a node mid-split.
    pub fn child_at(&self, index: usize) -> Result<u32> {
        let num_keys = self.num_keys() as usize;
        ensure!(
            index <= num_keys,
            "child index {} out of bounds (num_keys={})",
            index,
            num_keys
        );
        let child = if index == num_keys {
            self.right_child()
        } else {
            self.cell_child(index)?
        };
        ensure!(
            child != INVALID_PAGE_NUM,
            "child {} of internal node is unset: corrupt page",
            index
        );
        Ok(child)
    }

    /// Smallest cell index whose key is `>= key`; `num_keys` when every
    /// cell key is smaller (the right child's range).
    pub fn find_child_index(&self, key: u32) -> usize {
        let mut lo = 0usize;
        let mut hi = self.num_keys() as usize;
        while lo != hi {
            let mid = (lo + hi) / 2;
            if key_unchecked(self.data, mid) >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }
}

fn key_unchecked(data: &[u8], index: usize) -> u32 {
    let start = cell_range(index).start + size_of::<U32<NativeEndian>>();
    u32::from_ne_bytes([
        data[start],
        data[start + 1],
        data[start + 2],
        data[start + 3],
    ])
}

impl<'a> InteriorNodeMut<'a> {
    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        validate(data)?;
        Ok(Self { data })
    }

    /// Initializes the page as an empty internal node whose right child is
    /// the invalid sentinel; the first `internal_insert` claims it.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = InteriorHeader::mut_from_bytes(&mut data[..INTERNAL_NODE_HEADER_SIZE])
            .unwrap(); // INVARIANT: size checked above
        header.common.set_node_type(NodeType::Internal);
        header.common.set_root(false);
        header.num_keys.set(0);
        header.right_child.set(INVALID_PAGE_NUM);
        Ok(Self { data })
    }

    pub fn as_ref(&self) -> InteriorNode<'_> {
        InteriorNode { data: self.data }
    }

    fn header_mut(&mut self) -> &mut InteriorHeader {
        InteriorHeader::mut_from_bytes(&mut self.data[..INTERNAL_NODE_HEADER_SIZE])
            .unwrap() // INVARIANT: page size validated in from_page/init
    }

    pub fn num_keys(&self) -> u32 {
        self.as_ref().num_keys()
    }

    pub fn right_child(&self) -> u32 {
        self.as_ref().right_child()
    }

    pub fn cell_child(&self, index: usize) -> Result<u32> {
        self.as_ref().cell_child(index)
    }

    pub fn find_child_index(&self, key: u32) -> usize {
        self.as_ref().find_child_index(key)
    }

    pub fn set_num_keys(&mut self, num_keys: u32) {
        self.header_mut().num_keys.set(num_keys);
    }

    pub fn set_right_child(&mut self, page_num: u32) {
        self.header_mut().right_child.set(page_num);
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.header_mut().common.set_parent(page_num);
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.header_mut().common.set_root(is_root);
    }

    /// Writes cell `index` outright. The index must already be covered by
    /// `num_keys`; growth happens through `set_num_keys` first.
    pub fn set_cell(&mut self, index: usize, child: u32, key: u32) -> Result<()> {
        ensure!(
            index < self.num_keys() as usize,
            "cell index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        let cell = InteriorCell::mut_from_bytes(&mut self.data[cell_range(index)])
            .map_err(|e| eyre::eyre!("failed to write internal cell {}: {:?}", index, e))?;
        cell.child.set(child);
        cell.key.set(key);
        Ok(())
    }

    pub fn set_key_at(&mut self, index: usize, key: u32) -> Result<()> {
        ensure!(
            index < self.num_keys() as usize,
            "cell index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        let cell = InteriorCell::mut_from_bytes(&mut self.data[cell_range(index)])
            .map_err(|e| eyre::eyre!("failed to write internal cell {}: {:?}", index, e))?;
        cell.key.set(key);
        Ok(())
    }

    /// Shifts cells `[from, upto)` one slot right, opening cell `from`.
    pub fn shift_cells_right(&mut self, from: usize, upto: usize) -> Result<()> {
        ensure!(
            upto < INTERNAL_NODE_MAX_KEYS && from <= upto,
            "cell shift [{}, {}) out of capacity ({})",
            from,
            upto,
            INTERNAL_NODE_MAX_KEYS
        );
        if from < upto {
            let src = cell_range(from).start;
            let end = cell_range(upto - 1).end;
            let dst = cell_range(from + 1).start;
            self.data.copy_within(src..end, dst);
        }
        Ok(())
    }

    /// Replaces the routing key that currently reads `old_key`. When the
    /// key maps past the last cell the node routed it through the right
    /// child, which carries no key; nothing needs rewriting.
    pub fn replace_key(&mut self, old_key: u32, new_key: u32) -> Result<()> {
        let index = self.find_child_index(old_key);
        if index < self.num_keys() as usize {
            self.set_key_at(index, new_key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    /// Builds a node with cells [(2, 10), (3, 20)] and right child 4.
    fn routed_page() -> Vec<u8> {
        let mut page = make_page();
        {
            let mut node = InteriorNodeMut::init(&mut page).unwrap();
            node.set_num_keys(2);
            node.set_cell(0, 2, 10).unwrap();
            node.set_cell(1, 3, 20).unwrap();
            node.set_right_child(4);
        }
        page
    }

    #[test]
    fn derived_layout_matches_documented_sizes() {
        assert_eq!(INTERNAL_NODE_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_NODE_CELL_SIZE, 8);
    }

    #[test]
    fn init_leaves_the_right_child_unset() {
        let mut page = make_page();
        let node = InteriorNodeMut::init(&mut page).unwrap();

        assert_eq!(node.num_keys(), 0);
        assert_eq!(node.right_child(), INVALID_PAGE_NUM);
    }

    #[test]
    fn from_page_rejects_leaf_pages() {
        let mut page = make_page();
        NodeHeader::of_mut(&mut page)
            .unwrap()
            .set_node_type(NodeType::Leaf);

        assert!(InteriorNode::from_page(&page).is_err());
    }

    #[test]
    fn find_child_index_routes_by_key_range() {
        let page = routed_page();
        let node = InteriorNode::from_page(&page).unwrap();

        assert_eq!(node.find_child_index(0), 0);
        assert_eq!(node.find_child_index(10), 0);
        assert_eq!(node.find_child_index(11), 1);
        assert_eq!(node.find_child_index(20), 1);
        assert_eq!(node.find_child_index(21), 2);
    }

    #[test]
    fn child_at_resolves_cells_and_right_child() {
        let page = routed_page();
        let node = InteriorNode::from_page(&page).unwrap();

        assert_eq!(node.child_at(0).unwrap(), 2);
        assert_eq!(node.child_at(1).unwrap(), 3);
        assert_eq!(node.child_at(2).unwrap(), 4);
        assert!(node.child_at(3).is_err());
    }

    #[test]
    fn child_at_refuses_the_invalid_sentinel() {
        let mut page = make_page();
        InteriorNodeMut::init(&mut page).unwrap();
        let node = InteriorNode::from_page(&page).unwrap();

        let result = node.child_at(0);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unset"));
    }

    #[test]
    fn shift_opens_a_slot_without_losing_cells() {
        let mut page = routed_page();
        let mut node = InteriorNodeMut::from_page(&mut page).unwrap();

        node.set_num_keys(3);
        node.shift_cells_right(0, 2).unwrap();
        node.set_cell(0, 9, 5).unwrap();

        let view = node.as_ref();
        assert_eq!(view.cell_child(0).unwrap(), 9);
        assert_eq!(view.key_at(0).unwrap(), 5);
        assert_eq!(view.cell_child(1).unwrap(), 2);
        assert_eq!(view.key_at(1).unwrap(), 10);
        assert_eq!(view.cell_child(2).unwrap(), 3);
        assert_eq!(view.key_at(2).unwrap(), 20);
    }

    #[test]
    fn replace_key_rewrites_the_matching_cell() {
        let mut page = routed_page();
        let mut node = InteriorNodeMut::from_page(&mut page).unwrap();

        node.replace_key(10, 12).unwrap();

        assert_eq!(node.as_ref().key_at(0).unwrap(), 12);
        assert_eq!(node.as_ref().key_at(1).unwrap(), 20);
    }

    #[test]
    fn replace_key_past_the_last_cell_is_a_no_op() {
        let mut page = routed_page();
        let mut node = InteriorNodeMut::from_page(&mut page).unwrap();

        node.replace_key(99, 100).unwrap();

        assert_eq!(node.as_ref().key_at(0).unwrap(), 10);
        assert_eq!(node.as_ref().key_at(1).unwrap(), 20);
    }
}
