//! # Row Record Layout
//!
//! A row is a fixed-shape record: a `u32` id followed by two fixed-width
//! string fields. Each string field is one byte wider than its documented
//! maximum so the content is always NUL-terminated on disk.
//!
//! ## Record Layout (293 bytes)
//!
//! ```text
//! Offset  Size  Field     Description
//! ------  ----  --------  --------------------------------------
//! 0       4     id        Row key, host-endian u32
//! 4       33    username  Up to 32 bytes + NUL terminator
//! 37      256   email     Up to 255 bytes + NUL terminator
//! ```
//!
//! ## Zero-Copy Access
//!
//! [`RowRecord`] derives the `zerocopy` traits so a record can be read and
//! written in place inside a leaf cell without intermediate buffers. The
//! struct is `Unaligned` because leaf cells start at offsets with no
//! alignment guarantee.
//!
//! Serialization zero-fills both string fields before copying the content
//! in, so every byte past the string — the terminator included — is zero
//! regardless of what the cell held before.

use eyre::{ensure, Result};
use zerocopy::byteorder::{NativeEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Longest username accepted, in bytes.
pub const USERNAME_MAX_LEN: usize = 32;

/// Longest email accepted, in bytes.
pub const EMAIL_MAX_LEN: usize = 255;

/// Serialized size of one row.
pub const ROW_SIZE: usize = size_of::<RowRecord>();

const _: () = assert!(
    ROW_SIZE == 4 + (USERNAME_MAX_LEN + 1) + (EMAIL_MAX_LEN + 1),
    "RowRecord layout drifted from the documented offsets"
);

/// On-disk representation of a row inside a leaf cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RowRecord {
    id: U32<NativeEndian>,
    username: [u8; USERNAME_MAX_LEN + 1],
    email: [u8; EMAIL_MAX_LEN + 1],
}

/// An owned row, as the driver and tests see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Serializes the row into a record in place. The string fields are
    /// zeroed first so the terminator byte is always present.
    pub fn write_record(&self, record: &mut RowRecord) -> Result<()> {
        ensure!(
            self.username.len() <= USERNAME_MAX_LEN,
            "username is {} bytes, limit is {}",
            self.username.len(),
            USERNAME_MAX_LEN
        );
        ensure!(
            self.email.len() <= EMAIL_MAX_LEN,
            "email is {} bytes, limit is {}",
            self.email.len(),
            EMAIL_MAX_LEN
        );

        record.id.set(self.id);
        record.username.fill(0);
        record.username[..self.username.len()].copy_from_slice(self.username.as_bytes());
        record.email.fill(0);
        record.email[..self.email.len()].copy_from_slice(self.email.as_bytes());
        Ok(())
    }

    /// Reads a row back out of a record, truncating each string field at
    /// its first NUL.
    pub fn from_record(record: &RowRecord) -> Row {
        Row {
            id: record.id.get(),
            username: string_field(&record.username),
            email: string_field(&record.email),
        }
    }
}

impl RowRecord {
    pub fn id(&self) -> u32 {
        self.id.get()
    }
}

fn string_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
