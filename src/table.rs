//! # Table Facade
//!
//! [`Table`] is the public face of the store: it owns the pager and the
//! root page number, and exposes open/close, point lookup, full scan, and
//! insertion. The root is always page 0; opening an empty file creates it
//! as an empty leaf marked root.

use std::path::Path;

use eyre::Result;

use crate::btree::{BTree, InsertOutcome, LeafNode, LeafNodeMut};
use crate::cursor::Cursor;
use crate::records::Row;
use crate::storage::Pager;

/// Page number of the root node for the table's whole lifetime.
const ROOT_PAGE_NUM: u32 = 0;

#[derive(Debug)]
pub struct Table {
    pub(crate) pager: Pager,
    root_page_num: u32,
}

impl Table {
    /// Opens (or creates) the database file. A brand-new file gets its
    /// root initialized as an empty leaf.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pager = Pager::open(path)?;

        if pager.num_pages() == 0 {
            let mut root = LeafNodeMut::init(pager.page_mut(ROOT_PAGE_NUM)?)?;
            root.set_root(true);
        }

        Ok(Self {
            pager,
            root_page_num: ROOT_PAGE_NUM,
        })
    }

    /// Flushes every cached page and releases the buffers. The table is
    /// reusable afterwards, but the REPL driver exits instead.
    pub fn close(&mut self) -> Result<()> {
        self.pager.close()
    }

    /// Inserts a row keyed by its id. An existing id leaves the tree
    /// untouched and reports [`InsertOutcome::DuplicateKey`].
    pub fn insert(&mut self, row: &Row) -> Result<InsertOutcome> {
        BTree::new(&mut self.pager, self.root_page_num).insert(row.id, row)
    }

    /// Positions a cursor at `key`, or at the slot where it would be
    /// inserted.
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        let (page_num, cell_num) =
            BTree::new(&mut self.pager, self.root_page_num).find(key)?;
        Ok(Cursor::new(self, page_num, cell_num, false))
    }

    /// Positions a cursor at the first row in key order. Key 0 is a valid
    /// search floor because keys are unsigned.
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        let (page_num, cell_num) =
            BTree::new(&mut self.pager, self.root_page_num).find(0)?;
        let num_cells = LeafNode::from_page(self.pager.page(page_num)?)?.num_cells();
        Ok(Cursor::new(self, page_num, cell_num, num_cells == 0))
    }

    /// Renders the tree for the `.btree` meta-command.
    pub fn render_tree(&mut self) -> Result<String> {
        let mut out = String::new();
        BTree::new(&mut self.pager, self.root_page_num).render(&mut out)?;
        Ok(out)
    }
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

    fn scan_rows(table: &mut Table) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut cursor = table.start().unwrap();
        while !cursor.end_of_table() {
            rows.push(cursor.row().unwrap());
            cursor.advance().unwrap();
        }
        rows
    }

    #[test]
    fn open_initializes_an_empty_root_leaf() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("test.db")).unwrap();

        assert_eq!(table.render_tree().unwrap(), "- leaf (size 0)\n");
        assert!(scan_rows(&mut table).is_empty());
    }

    #[test]
    fn scan_returns_rows_in_key_order() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("test.db")).unwrap();
        for id in [3, 1, 2] {
            assert_eq!(table.insert(&row(id)).unwrap(), InsertOutcome::Inserted);
        }

        assert_eq!(scan_rows(&mut table), vec![row(1), row(2), row(3)]);
    }

    #[test]
    fn duplicate_insert_reports_and_changes_nothing() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("test.db")).unwrap();
        table.insert(&row(1)).unwrap();

        let outcome = table
            .insert(&Row {
                id: 1,
                username: "other".into(),
                email: "other@example.com".into(),
            })
            .unwrap();

        assert_eq!(outcome, InsertOutcome::DuplicateKey);
        assert_eq!(scan_rows(&mut table), vec![row(1)]);
    }

    #[test]
    fn find_positions_cursor_on_the_exact_row() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("test.db")).unwrap();
        for id in 1..=20 {
            table.insert(&row(id)).unwrap();
        }

        let mut cursor = table.find(17).unwrap();
        assert_eq!(cursor.key().unwrap(), 17);
        assert_eq!(cursor.row().unwrap(), row(17));
    }

    #[test]
    fn scan_crosses_leaf_boundaries() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("test.db")).unwrap();
        for id in (1..=40).rev() {
            table.insert(&row(id)).unwrap();
        }

        let expected: Vec<Row> = (1..=40).map(row).collect();
        assert_eq!(scan_rows(&mut table), expected);
    }

    #[test]
    fn close_then_reopen_preserves_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut table = Table::open(&path).unwrap();
            for id in 1..=30 {
                table.insert(&row(id)).unwrap();
            }
            table.close().unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        let expected: Vec<Row> = (1..=30).map(row).collect();
        assert_eq!(scan_rows(&mut table), expected);
    }
}
