//! # B+Tree Storage
//!
//! Every page in the file is one tree node, tagged by its first byte as a
//! leaf or an internal node. Leaves hold the rows in key order and link to
//! their right sibling; internal nodes hold routing keys and child page
//! numbers. Page 0 is always the root.
//!
//! ## Common Node Header (6 bytes)
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  -----------------------------------
//! 0       1     node_type  0 = internal, 1 = leaf
//! 1       1     is_root    boolean
//! 2       4     parent     page number of parent (root: unused)
//! ```
//!
//! The parent field is a back-reference, not ownership: splits rewrite it
//! for every node that changes parents, and the structural invariant —
//! the referenced page lists this node among its children — is what the
//! tests check.
//!
//! ## Module Organization
//!
//! - [`leaf`]: leaf page layout and views
//! - [`interior`]: internal page layout and views
//! - [`tree`]: search, insertion, splits, root promotion, rendering

pub mod interior;
pub mod leaf;
pub mod tree;


pub use interior::{InteriorNode, InteriorNodeMut, INTERNAL_NODE_MAX_KEYS};
pub use leaf::{LeafNode, LeafNodeMut, SearchResult};
pub use tree::{BTree, InsertOutcome};

use eyre::{bail, ensure, Result};
use zerocopy::byteorder::{NativeEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the header prefix shared by both node kinds.
pub const COMMON_NODE_HEADER_SIZE: usize = size_of::<NodeHeader>();

const _: () = assert!(COMMON_NODE_HEADER_SIZE == 6, "common header layout drifted");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

impl NodeType {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            other => bail!("unknown node type byte {:#04x}: corrupt page", other),
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            NodeType::Internal => 0,
            NodeType::Leaf => 1,
        }
    }
}

/// Header prefix present on every page regardless of node kind. Both
/// concrete headers start with these fields at the same offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    node_type: u8,
    is_root: u8,
    parent: U32<NativeEndian>,
}

impl NodeHeader {
    pub fn of(page: &[u8]) -> Result<&Self> {
        ensure!(
            page.len() >= COMMON_NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            page.len(),
            COMMON_NODE_HEADER_SIZE
        );
        Self::ref_from_bytes(&page[..COMMON_NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn of_mut(page: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            page.len() >= COMMON_NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            page.len(),
            COMMON_NODE_HEADER_SIZE
        );
        Self::mut_from_bytes(&mut page[..COMMON_NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn node_type(&self) -> Result<NodeType> {
        NodeType::from_byte(self.node_type)
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type.as_byte();
    }

    pub fn is_root(&self) -> bool {
        self.is_root != 0
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.is_root = is_root as u8;
    }

    pub fn parent(&self) -> u32 {
        self.parent.get()
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.parent.set(page_num);
    }
}
