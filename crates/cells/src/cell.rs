use core::fmt::{self, Debug};
use std::ops::Deref;
use std::sync::Arc;

use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use sha2::{Digest, Sha256};

use crate::builder::CellBuilder;
use crate::slice::CellSlice;

/// Hard limit on the data payload of a single cell.
pub const MAX_BITS_LEN: usize = 1023;
/// Hard limit on the outgoing references of a single cell.
pub const MAX_REFS_COUNT: usize = 4;

/// A [Cell](https://docs.ton.org/develop/data-formats/cell-boc#cell):
/// immutable node of up to [`MAX_BITS_LEN`] bits of payload and up to
/// [`MAX_REFS_COUNT`] references to other cells.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    data: BitVec<u8, Msb0>,
    references: Vec<Arc<Cell>>,
}

impl Cell {
    /// Create new [`CellBuilder`]
    #[inline]
    #[must_use]
    pub const fn builder() -> CellBuilder {
        CellBuilder::new()
    }

    pub(crate) fn new(data: BitVec<u8, Msb0>, references: Vec<Arc<Cell>>) -> Self {
        debug_assert!(data.len() <= MAX_BITS_LEN);
        debug_assert!(references.len() <= MAX_REFS_COUNT);
        Self { data, references }
    }

    #[inline]
    pub fn data(&self) -> &BitSlice<u8, Msb0> {
        &self.data
    }

    #[inline]
    pub fn bits_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn as_raw_slice(&self) -> &[u8] {
        self.data.as_raw_slice()
    }

    #[inline]
    pub fn references(&self) -> &[Arc<Self>] {
        &self.references
    }

    /// Returns whether this cell has no data and zero references.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.references.is_empty()
    }

    /// Read cursor positioned at the start of this cell.
    #[inline]
    #[must_use]
    pub fn slice(self: &Arc<Self>) -> CellSlice {
        CellSlice::new(self.clone())
    }

    #[inline]
    fn refs_descriptor(&self) -> u8 {
        // no exotic cells here, so the level mask is always zero
        self.references.len() as u8
    }

    /// Second descriptor byte, `floor(b/8) + ceil(b/8)`: an odd value
    /// marks a partially filled last byte.
    #[inline]
    fn bits_descriptor(&self) -> u8 {
        (self.data.len() / 8 + self.data.len().div_ceil(8)) as u8
    }

    #[inline]
    pub(crate) fn max_depth(&self) -> u16 {
        self.references
            .iter()
            .map(Deref::deref)
            .map(Cell::max_depth)
            .max()
            .map(|d| d + 1)
            .unwrap_or(0)
    }

    /// Byte string the representation hash is computed over: both
    /// descriptors, the data augmented to a byte boundary, then the
    /// depth and the hash of every referenced cell.
    fn repr(&self) -> Vec<u8> {
        let mut repr = vec![self.refs_descriptor(), self.bits_descriptor()];

        let raw = self.data.as_raw_slice();
        let partial = self.data.len() % 8;
        if partial == 0 {
            repr.extend_from_slice(raw);
        } else if let Some((tail, full)) = raw.split_last() {
            repr.extend_from_slice(full);
            // keep the occupied bits and set the stop bit right after them
            let occupied = !0u8 << (8 - partial);
            repr.push((tail & occupied) | (0x80 >> partial));
        }

        for reference in &self.references {
            repr.extend_from_slice(&reference.max_depth().to_be_bytes());
        }
        for reference in &self.references {
            repr.extend_from_slice(&reference.hash());
        }
        repr
    }

    /// [Representation hash](https://docs.ton.org/develop/data-formats/cell-boc#cell-hash)
    /// of this cell: SHA-256 over its representation byte string.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.repr());
        hasher.finalize().into()
    }
}

impl Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C:R{}:D{}:", self.references.len(), self.max_depth())?;

        if f.alternate() {
            write!(f, "{}[0b", self.bits_len())?;
            for bit in self.data.iter() {
                write!(f, "{}", if *bit { '1' } else { '0' })?;
            }
            write!(f, "]")?;
        } else {
            write!(
                f,
                "{}[0x{}]",
                self.bits_len(),
                hex::encode_upper(self.data.as_raw_slice())
            )?;
        }
        if self.references.is_empty() {
            return Ok(());
        }
        write!(f, " -> ")?;
        f.debug_set().entries(self.references.iter()).finish()
    }
}
