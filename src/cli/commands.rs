//! Meta-command handling. Lines starting with `.` bypass the statement
//! grammar: `.exit` ends the session, `.btree` prints the tree shape, and
//! `.constants` prints the on-disk layout constants.

use eyre::Result;

use crate::btree::leaf::{
    LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS, LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::btree::COMMON_NODE_HEADER_SIZE;
use crate::records::ROW_SIZE;
use crate::table::Table;

#[derive(Debug, PartialEq, Eq)]
pub enum MetaResult {
    /// `.exit`: the REPL closes the table and ends the session.
    Exit,
    /// Text to print, newline-terminated.
    Output(String),
    /// Not a known meta-command; the REPL reports it.
    Unrecognized,
}

pub fn is_meta(line: &str) -> bool {
    line.starts_with('.')
}

pub fn execute(line: &str, table: &mut Table) -> Result<MetaResult> {
    match line {
        ".exit" => Ok(MetaResult::Exit),
        ".btree" => {
            let mut out = String::from("Tree:\n");
            out.push_str(&table.render_tree()?);
            Ok(MetaResult::Output(out))
        }
        ".constants" => Ok(MetaResult::Output(constants_text())),
        _ => Ok(MetaResult::Unrecognized),
    }
}

fn constants_text() -> String {
    format!(
        "Constants:\n\
         ROW_SIZE: {ROW_SIZE}\n\
         COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}\n\
         LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}\n\
         LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}\n\
         LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}\n\
         LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}\n"
    )
}
