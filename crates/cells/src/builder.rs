use std::sync::Arc;

use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use bitvec::view::AsBits;
use num_bigint::{BigInt, BigUint, Sign};

use crate::cell::{Cell, MAX_BITS_LEN, MAX_REFS_COUNT};
use crate::error::{CellError, CellResult};
use crate::slice::CellSlice;

/// Cell builder created with [`Cell::builder()`].
///
/// Both capacities are enforced at write time, so
/// [`.into_cell()`](CellBuilder::into_cell) is infallible.
#[derive(Clone, Default, Debug)]
pub struct CellBuilder {
    data: BitVec<u8, Msb0>,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: BitVec::EMPTY,
            references: Vec::new(),
        }
    }

    #[inline]
    pub fn bits_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn bits_left(&self) -> usize {
        MAX_BITS_LEN - self.data.len()
    }

    #[inline]
    pub fn references_len(&self) -> usize {
        self.references.len()
    }

    #[inline]
    pub fn references_left(&self) -> usize {
        MAX_REFS_COUNT - self.references.len()
    }

    #[inline]
    fn ensure_bits(&self, bits: usize) -> CellResult<()> {
        if bits > self.bits_left() {
            return Err(CellError::DataOverflow {
                bits,
                left: self.bits_left(),
            });
        }
        Ok(())
    }

    #[inline]
    fn ensure_references(&self, references: usize) -> CellResult<()> {
        if references > self.references_left() {
            return Err(CellError::TooManyReferences {
                max: MAX_REFS_COUNT,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        self.ensure_bits(1)?;
        self.data.push(bit);
        Ok(self)
    }

    /// Store given `bit` exactly `n` times.
    #[inline]
    pub fn store_repeated_bit(&mut self, n: usize, bit: bool) -> CellResult<&mut Self> {
        self.ensure_bits(n)?;
        self.data.resize(self.data.len() + n, bit);
        Ok(self)
    }

    #[inline]
    pub fn store_bits(&mut self, bits: &BitSlice<u8, Msb0>) -> CellResult<&mut Self> {
        self.ensure_bits(bits.len())?;
        self.data.extend_from_bitslice(bits);
        Ok(self)
    }

    #[inline]
    pub fn store_bytes(&mut self, bytes: impl AsRef<[u8]>) -> CellResult<&mut Self> {
        self.store_bits(bytes.as_ref().as_bits::<Msb0>())
    }

    /// Store `value` as `bits` unsigned big-endian bits.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits < u64::BITS as usize && value >> bits != 0 {
            return Err(CellError::IntegerOverflow { bits });
        }
        self.ensure_bits(bits)?;
        if bits > u64::BITS as usize {
            self.store_repeated_bit(bits - u64::BITS as usize, false)?;
            return self.store_uint(value, u64::BITS as usize);
        }
        for i in (0..bits).rev() {
            self.data.push((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store `value` as `bits` two's-complement big-endian bits.
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        if bits == 0 {
            return if value == 0 {
                Ok(self)
            } else {
                Err(CellError::IntegerOverflow { bits })
            };
        }
        self.ensure_bits(bits)?;
        if bits >= u64::BITS as usize {
            self.store_repeated_bit(bits - u64::BITS as usize, value < 0)?;
            for i in (0..u64::BITS as usize).rev() {
                self.data.push((value >> i) & 1 == 1);
            }
            return Ok(self);
        }
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if value < min || value > max {
            return Err(CellError::IntegerOverflow { bits });
        }
        let masked = (value as u64) & (u64::MAX >> (u64::BITS as usize - bits));
        for i in (0..bits).rev() {
            self.data.push((masked >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store `value` as `bits` unsigned big-endian bits.
    pub fn store_biguint(&mut self, value: &BigUint, bits: usize) -> CellResult<&mut Self> {
        let used_bits = value.bits() as usize;
        if used_bits > bits {
            return Err(CellError::IntegerOverflow { bits });
        }
        self.ensure_bits(bits)?;
        self.store_repeated_bit(bits - used_bits, false)?;
        let bytes = value.to_bytes_be();
        let all = bytes.as_bits::<Msb0>();
        self.data.extend_from_bitslice(&all[all.len() - used_bits..]);
        Ok(self)
    }

    /// Store `value` as `bits` two's-complement big-endian bits.
    pub fn store_bigint(&mut self, value: &BigInt, bits: usize) -> CellResult<&mut Self> {
        if bits == 0 {
            return if value.sign() == Sign::NoSign {
                Ok(self)
            } else {
                Err(CellError::IntegerOverflow { bits })
            };
        }
        self.ensure_bits(bits)?;
        let bytes = value.to_signed_bytes_be();
        let all = bytes.as_bits::<Msb0>();
        if all.len() <= bits {
            let fill = value.sign() == Sign::Minus;
            self.store_repeated_bit(bits - all.len(), fill)?;
            self.data.extend_from_bitslice(all);
        } else {
            let (extra, tail) = all.split_at(all.len() - bits);
            let sign_bit = tail[0];
            if extra.iter().any(|b| *b != sign_bit) {
                return Err(CellError::IntegerOverflow { bits });
            }
            self.data.extend_from_bitslice(tail);
        }
        Ok(self)
    }

    #[inline]
    pub fn store_reference(&mut self, reference: Arc<Cell>) -> CellResult<&mut Self> {
        self.ensure_references(1)?;
        self.references.push(reference);
        Ok(self)
    }

    /// Append another builder's bits, then its references.
    pub fn store_builder(&mut self, other: CellBuilder) -> CellResult<&mut Self> {
        self.ensure_bits(other.data.len())?;
        self.ensure_references(other.references.len())?;
        self.data.extend_from_bitslice(&other.data);
        self.references.extend(other.references);
        Ok(self)
    }

    /// Append the unread remainder of a slice: its bits, then its references.
    pub fn store_slice(&mut self, slice: &CellSlice) -> CellResult<&mut Self> {
        self.ensure_bits(slice.remaining_bits())?;
        self.ensure_references(slice.remaining_references())?;
        self.data.extend_from_bitslice(slice.remaining_data());
        self.references.extend_from_slice(slice.remaining_cells());
        Ok(self)
    }

    /// Convert builder to [`Cell`]
    #[inline]
    #[must_use]
    pub fn into_cell(self) -> Cell {
        Cell::new(self.data, self.references)
    }
}
