//! # Cursor
//!
//! A cursor is a position in the ordered sequence of rows: a leaf page, a
//! cell index within it, and an end-of-table flag. It only ever points at
//! leaves; advancing past the last cell follows the sibling link, and a
//! link of 0 means the scan is done.
//!
//! The cursor mutably borrows its [`Table`], so it — and any row it
//! yields — cannot outlive the pager that backs it, and the table cannot
//! be mutated out from under an active scan.

use eyre::Result;

use crate::btree::LeafNode;
use crate::records::Row;
use crate::table::Table;

pub struct Cursor<'t> {
    table: &'t mut Table,
    page_num: u32,
    cell_num: u32,
    end_of_table: bool,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(
        table: &'t mut Table,
        page_num: u32,
        cell_num: u32,
        end_of_table: bool,
    ) -> Self {
        Self {
            table,
            page_num,
            cell_num,
            end_of_table,
        }
    }

    /// True once the cursor has stepped past the last row.
    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// Key of the current cell.
    pub fn key(&mut self) -> Result<u32> {
        let leaf = LeafNode::from_page(self.table.pager.page(self.page_num)?)?;
        leaf.key_at(self.cell_num as usize)
    }

    /// Decodes the row under the cursor.
    pub fn row(&mut self) -> Result<Row> {
        let leaf = LeafNode::from_page(self.table.pager.page(self.page_num)?)?;
        Ok(Row::from_record(leaf.row_at(self.cell_num as usize)?))
    }

    /// Steps to the next cell, hopping to the right sibling when the
    /// current leaf runs out.
    pub fn advance(&mut self) -> Result<()> {
        let (num_cells, next_leaf) = {
            let leaf = LeafNode::from_page(self.table.pager.page(self.page_num)?)?;
            (leaf.num_cells(), leaf.next_leaf())
        };

        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
