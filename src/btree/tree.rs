//! # Tree Operations
//!
//! [`BTree`] binds a pager to a root page number and implements descent
//! search, ordered insertion, node splits, and root promotion. All
//! traversal is by page number through the pager; when an operation needs
//! data from two pages at once it snapshots one side first, so no two page
//! borrows ever overlap.
//!
//! ## Insertion
//!
//! ```text
//! insert(key, row)
//!   └─ find leaf position (binary search at every level)
//!        ├─ key already present ──> DuplicateKey, nothing mutated
//!        ├─ leaf has room ────────> shift cells, write, done
//!        └─ leaf full ────────────> leaf split
//!             ├─ leaf was root ──> root promotion
//!             └─ else ───────────> fix routing key, insert sibling
//!                                  into parent (may split it, and so
//!                                  on up the tree)
//! ```
//!
//! ## Leaf Split
//!
//! The `MAX + 1` cells (the full leaf plus the incoming one) are dealt
//! out in order: the first `LEFT_SPLIT_COUNT` stay, the rest move to a
//! freshly allocated right sibling, which also inherits the old sibling
//! link. Both counts derive from the layout.
//!
//! ## Internal Split
//!
//! Internal nodes split proactively on the way down: an insert into a full
//! internal node splits it before placing the new child. During the split
//! the old node's right child is parked at the invalid sentinel while its
//! upper cells move across one at a time; the sentinel is gone again
//! before the operation returns, and lookups can never observe it because
//! the store is single-threaded.
//!
//! ## Root Promotion
//!
//! The root lives at page 0 forever. When it splits, its bytes are copied
//! to a fresh page (the new left child), the copied node's children are
//! re-parented, and page 0 is rewritten in place as an internal node with
//! one key and two children.

use eyre::{ensure, Result};

use crate::btree::interior::{InteriorNode, InteriorNodeMut, INTERNAL_NODE_MAX_KEYS};
use crate::btree::leaf::{
    LeafNode, LeafNodeMut, LEAF_NODE_CELL_SIZE, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
};
use crate::btree::{NodeHeader, NodeType};
use crate::config::{INVALID_PAGE_NUM, PAGE_SIZE};
use crate::records::{Row, RowRecord};
use crate::storage::Pager;

/// What became of an insert. Duplicate keys are an expected outcome the
/// driver reports and moves past, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateKey,
}

pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: u32,
}

impl<'a> BTree<'a> {
    pub fn new(pager: &'a mut Pager, root_page: u32) -> Self {
        Self { pager, root_page }
    }

    /// Descends from the root to the leaf that covers `key`. Returns the
    /// leaf page and the cell index of the key or of its insertion
    /// position (possibly one past the last cell).
    pub fn find(&mut self, key: u32) -> Result<(u32, u32)> {
        let mut page_num = self.root_page;
        loop {
            match self.node_type_of(page_num)? {
                NodeType::Leaf => {
                    let leaf = LeafNode::from_page(self.pager.page(page_num)?)?;
                    return Ok((page_num, leaf.find(key).index() as u32));
                }
                NodeType::Internal => {
                    let node = InteriorNode::from_page(self.pager.page(page_num)?)?;
                    let index = node.find_child_index(key);
                    page_num = node.child_at(index)?;
                }
            }
        }
    }

    pub fn insert(&mut self, key: u32, row: &Row) -> Result<InsertOutcome> {
        let (page_num, cell_num) = self.find(key)?;

        {
            let leaf = LeafNode::from_page(self.pager.page(page_num)?)?;
            if cell_num < leaf.num_cells() && leaf.key_at(cell_num as usize)? == key {
                return Ok(InsertOutcome::DuplicateKey);
            }
        }

        self.leaf_insert(page_num, cell_num, key, row)?;
        Ok(InsertOutcome::Inserted)
    }

    /// Largest key in the subtree rooted at `page_num`: the last cell of
    /// the rightmost leaf reachable through right-child links.
    pub fn max_key(&mut self, page_num: u32) -> Result<u32> {
        let mut current = page_num;
        loop {
            match self.node_type_of(current)? {
                NodeType::Leaf => {
                    return LeafNode::from_page(self.pager.page(current)?)?.max_key();
                }
                NodeType::Internal => {
                    let right = InteriorNode::from_page(self.pager.page(current)?)?.right_child();
                    ensure!(
                        right != INVALID_PAGE_NUM,
                        "max key requested below an internal node with no right child"
                    );
                    current = right;
                }
            }
        }
    }

    fn leaf_insert(&mut self, page_num: u32, cell_num: u32, key: u32, row: &Row) -> Result<()> {
        let num_cells = LeafNode::from_page(self.pager.page(page_num)?)?.num_cells();
        if num_cells as usize >= LEAF_NODE_MAX_CELLS {
            return self.leaf_split_and_insert(page_num, cell_num, key, row);
        }

        LeafNodeMut::from_page(self.pager.page_mut(page_num)?)?
            .insert_at(cell_num as usize, key, row)
    }

    fn leaf_split_and_insert(
        &mut self,
        old_page_num: u32,
        cell_num: u32,
        key: u32,
        row: &Row,
    ) -> Result<()> {
        let old_max = self.max_key(old_page_num)?;
        let new_page_num = self.pager.unused_page_num();

        // Snapshot the full leaf, then splice the new sibling into the
        // leaf chain: old -> new -> old's former sibling.
        let (parent, old_next, old_was_root, mut cells) = {
            let leaf = LeafNode::from_page(self.pager.page(old_page_num)?)?;
            let mut cells: Vec<Vec<u8>> = Vec::with_capacity(LEAF_NODE_MAX_CELLS + 1);
            for i in 0..leaf.num_cells() as usize {
                cells.push(leaf.raw_cell(i)?.to_vec());
            }
            (leaf.parent(), leaf.next_leaf(), leaf.is_root(), cells)
        };

        {
            let mut new_leaf = LeafNodeMut::init(self.pager.page_mut(new_page_num)?)?;
            new_leaf.set_parent(parent);
            new_leaf.set_next_leaf(old_next);
        }
        LeafNodeMut::from_page(self.pager.page_mut(old_page_num)?)?.set_next_leaf(new_page_num);

        // Deal the MAX + 1 cells out in key order; the left half stays,
        // the right half rebuilds the new sibling from cell 0.
        let mut new_cell = vec![0u8; LEAF_NODE_CELL_SIZE];
        encode_cell(&mut new_cell, key, row)?;
        cells.insert(cell_num as usize, new_cell);

        let right_cells = cells.split_off(LEAF_NODE_LEFT_SPLIT_COUNT);
        {
            let mut old_leaf = LeafNodeMut::from_page(self.pager.page_mut(old_page_num)?)?;
            for (i, cell) in cells.iter().enumerate() {
                old_leaf.write_raw_cell(i, cell)?;
            }
            old_leaf.set_num_cells(cells.len() as u32);
        }
        {
            let mut new_leaf = LeafNodeMut::from_page(self.pager.page_mut(new_page_num)?)?;
            for (i, cell) in right_cells.iter().enumerate() {
                new_leaf.write_raw_cell(i, cell)?;
            }
            new_leaf.set_num_cells(right_cells.len() as u32);
        }

        if old_was_root {
            return self.create_new_root(new_page_num);
        }

        // The old leaf's max key shrank; fix the routing key above it,
        // then hand the new sibling to the parent.
        let new_max = self.max_key(old_page_num)?;
        InteriorNodeMut::from_page(self.pager.page_mut(parent)?)?.replace_key(old_max, new_max)?;
        self.internal_insert(parent, new_page_num)
    }

    /// Splits the root while keeping its page number. The old root's bytes
    /// move to a fresh page that becomes the left child; page 0 is then
    /// rewritten in place as an internal node over the two children.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<()> {
        let root_page = self.root_page;
        let root_was_internal = self.node_type_of(root_page)? == NodeType::Internal;

        {
            // Touch the right page so it is allocated before the left
            // child's number is taken. An internal split hands this page
            // over uninitialized; set it up as an empty internal node.
            let right = self.pager.page_mut(right_child_page_num)?;
            if root_was_internal {
                InteriorNodeMut::init(right)?;
            }
        }

        let left_child_page_num = self.pager.unused_page_num();
        let root_bytes: [u8; PAGE_SIZE] = *self.pager.page(root_page)?;
        {
            let left = self.pager.page_mut(left_child_page_num)?;
            *left = root_bytes;
            NodeHeader::of_mut(left)?.set_root(false);
        }

        if root_was_internal {
            // The copied node's children still point at the root page;
            // re-parent them to the copy.
            let children = {
                let node = InteriorNode::from_page(self.pager.page(left_child_page_num)?)?;
                let mut children = Vec::with_capacity(node.num_keys() as usize + 1);
                for i in 0..=node.num_keys() as usize {
                    children.push(node.child_at(i)?);
                }
                children
            };
            for child in children {
                self.set_parent(child, left_child_page_num)?;
            }
        }

        {
            let mut root = InteriorNodeMut::init(self.pager.page_mut(root_page)?)?;
            root.set_root(true);
            root.set_num_keys(1);
            root.set_cell(0, left_child_page_num, 0)?;
        }
        let left_max = self.max_key(left_child_page_num)?;
        {
            let mut root = InteriorNodeMut::from_page(self.pager.page_mut(root_page)?)?;
            root.set_key_at(0, left_max)?;
            root.set_right_child(right_child_page_num);
        }

        self.set_parent(left_child_page_num, root_page)?;
        self.set_parent(right_child_page_num, root_page)?;
        Ok(())
    }

    /// Adds `child_page_num` to the internal node `parent_page_num`,
    /// routing by the child's max key. The caller updates the child's
    /// parent back-reference where required.
    fn internal_insert(&mut self, parent_page_num: u32, child_page_num: u32) -> Result<()> {
        let child_max = self.max_key(child_page_num)?;

        let (original_num_keys, right_child, index) = {
            let node = InteriorNode::from_page(self.pager.page(parent_page_num)?)?;
            (
                node.num_keys(),
                node.right_child(),
                node.find_child_index(child_max),
            )
        };

        if original_num_keys as usize >= INTERNAL_NODE_MAX_KEYS {
            return self.internal_split_and_insert(parent_page_num, child_page_num);
        }

        if right_child == INVALID_PAGE_NUM {
            // Empty node under construction: the first child arriving
            // becomes the right child.
            InteriorNodeMut::from_page(self.pager.page_mut(parent_page_num)?)?
                .set_right_child(child_page_num);
            return Ok(());
        }

        let right_child_max = self.max_key(right_child)?;

        let mut node = InteriorNodeMut::from_page(self.pager.page_mut(parent_page_num)?)?;
        node.set_num_keys(original_num_keys + 1);
        if child_max > right_child_max {
            // The new child becomes the right child; the old right child
            // gets a routing cell at the tail.
            node.set_cell(original_num_keys as usize, right_child, right_child_max)?;
            node.set_right_child(child_page_num);
        } else {
            node.shift_cells_right(index, original_num_keys as usize)?;
            node.set_cell(index, child_page_num, child_max)?;
        }
        Ok(())
    }

    fn internal_split_and_insert(
        &mut self,
        parent_page_num: u32,
        child_page_num: u32,
    ) -> Result<()> {
        let mut old_page_num = parent_page_num;
        let old_max = self.max_key(old_page_num)?;
        let child_max = self.max_key(child_page_num)?;
        let new_page_num = self.pager.unused_page_num();
        let splitting_root = self.is_root_node(old_page_num)?;

        let parent_page;
        if splitting_root {
            self.create_new_root(new_page_num)?;
            parent_page = self.root_page;
            // The node being split is now the copy hanging off the new
            // root's first cell.
            old_page_num =
                InteriorNode::from_page(self.pager.page(self.root_page)?)?.child_at(0)?;
        } else {
            parent_page = self.parent_of(old_page_num)?;
            InteriorNodeMut::init(self.pager.page_mut(new_page_num)?)?;
        }

        // Move the right child across first, parking the old node's right
        // child at the invalid sentinel until a replacement is promoted.
        let old_right = InteriorNode::from_page(self.pager.page(old_page_num)?)?.right_child();
        self.internal_insert(new_page_num, old_right)?;
        self.set_parent(old_right, new_page_num)?;
        InteriorNodeMut::from_page(self.pager.page_mut(old_page_num)?)?
            .set_right_child(INVALID_PAGE_NUM);

        // Move the cells above the midpoint across, one at a time.
        let midpoint = INTERNAL_NODE_MAX_KEYS / 2;
        for i in ((midpoint + 1)..INTERNAL_NODE_MAX_KEYS).rev() {
            let moved = InteriorNode::from_page(self.pager.page(old_page_num)?)?.cell_child(i)?;
            self.internal_insert(new_page_num, moved)?;
            self.set_parent(moved, new_page_num)?;

            let mut node = InteriorNodeMut::from_page(self.pager.page_mut(old_page_num)?)?;
            let num_keys = node.num_keys();
            node.set_num_keys(num_keys - 1);
        }

        // Promote the child at the last occupied cell to right child,
        // then retire that cell.
        {
            let mut node = InteriorNodeMut::from_page(self.pager.page_mut(old_page_num)?)?;
            let last = node.num_keys() as usize - 1;
            let promoted = node.cell_child(last)?;
            node.set_right_child(promoted);
            node.set_num_keys(last as u32);
        }

        // Route the incoming child to whichever half covers its key.
        let max_after_split = self.max_key(old_page_num)?;
        let destination = if child_max < max_after_split {
            old_page_num
        } else {
            new_page_num
        };
        self.internal_insert(destination, child_page_num)?;
        self.set_parent(child_page_num, destination)?;

        // The old node's max key changed; fix the routing key above it.
        let new_old_max = self.max_key(old_page_num)?;
        InteriorNodeMut::from_page(self.pager.page_mut(parent_page)?)?
            .replace_key(old_max, new_old_max)?;

        if !splitting_root {
            self.internal_insert(parent_page, new_page_num)?;
            self.set_parent(new_page_num, parent_page)?;
        }
        Ok(())
    }

    /// Renders the tree depth-first in the `.btree` meta-command format.
    pub fn render(&mut self, out: &mut String) -> Result<()> {
        self.render_node(self.root_page, 0, out)
    }

    fn render_node(&mut self, page_num: u32, depth: usize, out: &mut String) -> Result<()> {
        match self.node_type_of(page_num)? {
            NodeType::Leaf => {
                let keys = {
                    let leaf = LeafNode::from_page(self.pager.page(page_num)?)?;
                    let mut keys = Vec::with_capacity(leaf.num_cells() as usize);
                    for i in 0..leaf.num_cells() as usize {
                        keys.push(leaf.key_at(i)?);
                    }
                    keys
                };
                indent_line(out, depth, format_args!("- leaf (size {})", keys.len()));
                for key in keys {
                    indent_line(out, depth + 1, format_args!("- {}", key));
                }
            }
            NodeType::Internal => {
                let (cells, right_child) = {
                    let node = InteriorNode::from_page(self.pager.page(page_num)?)?;
                    let mut cells = Vec::with_capacity(node.num_keys() as usize);
                    for i in 0..node.num_keys() as usize {
                        cells.push((node.child_at(i)?, node.key_at(i)?));
                    }
                    (cells, node.child_at(node.num_keys() as usize))
                };
                indent_line(out, depth, format_args!("- internal (size {})", cells.len()));
                if !cells.is_empty() {
                    for (child, key) in cells {
                        self.render_node(child, depth + 1, out)?;
                        indent_line(out, depth + 1, format_args!("- key {}", key));
                    }
                    self.render_node(right_child?, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    fn node_type_of(&mut self, page_num: u32) -> Result<NodeType> {
        NodeHeader::of(self.pager.page(page_num)?)?.node_type()
    }

    fn is_root_node(&mut self, page_num: u32) -> Result<bool> {
        Ok(NodeHeader::of(self.pager.page(page_num)?)?.is_root())
    }

    fn parent_of(&mut self, page_num: u32) -> Result<u32> {
        Ok(NodeHeader::of(self.pager.page(page_num)?)?.parent())
    }

    fn set_parent(&mut self, page_num: u32, parent: u32) -> Result<()> {
        NodeHeader::of_mut(self.pager.page_mut(page_num)?)?.set_parent(parent);
        Ok(())
    }
}

fn encode_cell(cell: &mut [u8], key: u32, row: &Row) -> Result<()> {
    cell[..4].copy_from_slice(&key.to_ne_bytes());
    let record: &mut RowRecord = zerocopy::FromBytes::mut_from_bytes(&mut cell[4..])
        .map_err(|e| eyre::eyre!("failed to frame a row record: {:?}", e))?;
    row.write_record(record)
}

fn indent_line(out: &mut String, depth: usize, line: std::fmt::Arguments<'_>) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&line.to_string());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(id: u32) -> Row {
        Row {
            id,
            username: format!("user{id}"),
            email: format!("person{id}@example.com"),
        }
    }

    fn open_tree(dir: &tempfile::TempDir) -> Pager {
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();
        {
            let page = pager.page_mut(0).unwrap();
            let mut root = LeafNodeMut::init(page).unwrap();
            root.set_root(true);
        }
        pager
    }

    fn insert_all(pager: &mut Pager, keys: impl IntoIterator<Item = u32>) {
        for key in keys {
            let outcome = BTree::new(pager, 0).insert(key, &row(key)).unwrap();
            assert_eq!(outcome, InsertOutcome::Inserted, "insert of key {key}");
        }
    }

    fn collect_keys(pager: &mut Pager) -> Vec<u32> {
        let mut tree = BTree::new(pager, 0);
        let (mut page_num, _) = tree.find(0).unwrap();
        let mut keys = Vec::new();
        loop {
            let leaf = LeafNode::from_page(tree.pager.page(page_num).unwrap()).unwrap();
            for i in 0..leaf.num_cells() as usize {
                keys.push(leaf.key_at(i).unwrap());
            }
            match leaf.next_leaf() {
                0 => break,
                next => page_num = next,
            }
        }
        keys
    }

    #[test]
    fn find_on_empty_tree_points_at_root_cell_zero() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);

        assert_eq!(BTree::new(&mut pager, 0).find(42).unwrap(), (0, 0));
    }

    #[test]
    fn insert_and_find_within_one_leaf() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, [5, 1, 3]);

        assert_eq!(collect_keys(&mut pager), vec![1, 3, 5]);
    }

    #[test]
    fn duplicate_key_reports_without_mutating() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, [1, 2]);

        let outcome = BTree::new(&mut pager, 0).insert(2, &row(2)).unwrap();

        assert_eq!(outcome, InsertOutcome::DuplicateKey);
        assert_eq!(collect_keys(&mut pager), vec![1, 2]);
    }

    #[test]
    fn leaf_split_deals_cells_across_both_halves() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, 1..=(LEAF_NODE_MAX_CELLS as u32 + 1));

        // Root promotion: page 0 became an internal node over two leaves.
        let (left, right, routing_key) = {
            let node = InteriorNode::from_page(pager.page(0).unwrap()).unwrap();
            assert_eq!(node.num_keys(), 1);
            (
                node.child_at(0).unwrap(),
                node.child_at(1).unwrap(),
                node.key_at(0).unwrap(),
            )
        };
        assert_eq!(routing_key, LEAF_NODE_LEFT_SPLIT_COUNT as u32);

        let left_leaf = LeafNode::from_page(pager.page(left).unwrap()).unwrap();
        assert_eq!(left_leaf.num_cells() as usize, LEAF_NODE_LEFT_SPLIT_COUNT);
        assert_eq!(left_leaf.next_leaf(), right);
        drop(left_leaf);

        let right_leaf = LeafNode::from_page(pager.page(right).unwrap()).unwrap();
        assert_eq!(
            right_leaf.num_cells() as usize,
            LEAF_NODE_MAX_CELLS + 1 - LEAF_NODE_LEFT_SPLIT_COUNT
        );
        assert_eq!(right_leaf.next_leaf(), 0);

        assert_eq!(
            collect_keys(&mut pager),
            (1..=(LEAF_NODE_MAX_CELLS as u32 + 1)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn rows_survive_descending_insertion_across_splits() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, (1..=40).rev());

        assert_eq!(collect_keys(&mut pager), (1..=40).collect::<Vec<_>>());
    }

    #[test]
    fn deep_tree_keeps_every_row_reachable() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, 1..=80);

        assert_eq!(collect_keys(&mut pager), (1..=80).collect::<Vec<_>>());

        let mut tree = BTree::new(&mut pager, 0);
        for key in 1..=80 {
            let (page_num, cell_num) = tree.find(key).unwrap();
            let leaf = LeafNode::from_page(tree.pager.page(page_num).unwrap()).unwrap();
            assert_eq!(leaf.key_at(cell_num as usize).unwrap(), key);
            assert_eq!(Row::from_record(leaf.row_at(cell_num as usize).unwrap()), row(key));
        }
    }

    #[test]
    fn render_matches_the_documented_two_leaf_shape() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);
        insert_all(&mut pager, 1..=14);

        let mut out = String::new();
        BTree::new(&mut pager, 0).render(&mut out).unwrap();

        let expected = "\
- internal (size 1)
  - leaf (size 7)
    - 1
    - 2
    - 3
    - 4
    - 5
    - 6
    - 7
  - key 7
  - leaf (size 7)
    - 8
    - 9
    - 10
    - 11
    - 12
    - 13
    - 14
";
        assert_eq!(out, expected);
    }

    #[test]
    fn render_of_empty_tree_is_a_bare_leaf() {
        let dir = tempdir().unwrap();
        let mut pager = open_tree(&dir);

        let mut out = String::new();
        BTree::new(&mut pager, 0).render(&mut out).unwrap();

        assert_eq!(out, "- leaf (size 0)\n");
    }
}
