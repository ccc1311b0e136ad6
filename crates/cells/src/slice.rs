use std::sync::Arc;

use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use bitvec::view::AsMutBits;
use num_bigint::{BigInt, BigUint};

use crate::cell::Cell;
use crate::error::{CellError, CellResult};

/// Owned read cursor over a [`Cell`]'s bits and references.
///
/// The cursor holds the cell it reads from, so it can be kept, cloned and
/// re-seated across cells freely (e.g. while walking a chain of
/// continuation cells or dictionary leaves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSlice {
    cell: Arc<Cell>,
    bits_start: usize,
    refs_start: usize,
}

impl CellSlice {
    #[inline]
    #[must_use]
    pub fn new(cell: Arc<Cell>) -> Self {
        Self {
            cell,
            bits_start: 0,
            refs_start: 0,
        }
    }

    #[inline]
    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    #[inline]
    pub fn remaining_bits(&self) -> usize {
        self.cell.bits_len() - self.bits_start
    }

    #[inline]
    pub fn remaining_references(&self) -> usize {
        self.cell.references().len() - self.refs_start
    }

    #[inline]
    pub fn remaining_data(&self) -> &BitSlice<u8, Msb0> {
        &self.cell.data()[self.bits_start..]
    }

    #[inline]
    pub fn remaining_cells(&self) -> &[Arc<Cell>] {
        &self.cell.references()[self.refs_start..]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_references() == 0
    }

    #[inline]
    pub fn ensure_empty(&self) -> CellResult<()> {
        if !self.is_empty() {
            return Err(CellError::NotExhausted {
                bits: self.remaining_bits(),
                references: self.remaining_references(),
            });
        }
        Ok(())
    }

    #[inline]
    fn take_bits(&mut self, n: usize) -> CellResult<&BitSlice<u8, Msb0>> {
        if n > self.remaining_bits() {
            return Err(CellError::DataUnderflow {
                requested: n,
                left: self.remaining_bits(),
            });
        }
        let start = self.bits_start;
        self.bits_start += n;
        Ok(&self.cell.data()[start..start + n])
    }

    #[inline]
    pub fn load_bit(&mut self) -> CellResult<bool> {
        Ok(self.take_bits(1)?[0])
    }

    #[inline]
    pub fn load_bits(&mut self, n: usize) -> CellResult<BitVec<u8, Msb0>> {
        Ok(self.take_bits(n)?.to_bitvec())
    }

    #[inline]
    pub fn skip_bits(&mut self, n: usize) -> CellResult<&mut Self> {
        self.take_bits(n)?;
        Ok(self)
    }

    pub fn load_bytes(&mut self, n: usize) -> CellResult<Vec<u8>> {
        let mut out = vec![0; n];
        let bits = self.take_bits(n * 8)?;
        out.as_mut_bits::<Msb0>().copy_from_bitslice(bits);
        Ok(out)
    }

    pub fn load_bytes_array<const N: usize>(&mut self) -> CellResult<[u8; N]> {
        let mut out = [0; N];
        let bits = self.take_bits(N * 8)?;
        out.as_mut_bits::<Msb0>().copy_from_bitslice(bits);
        Ok(out)
    }

    /// Read `bits` (≤ 64) big-endian bits as an unsigned integer.
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        debug_assert!(bits <= u64::BITS as usize);
        let mut v = 0u64;
        for bit in self.take_bits(bits)? {
            v = (v << 1) | (*bit as u64);
        }
        Ok(v)
    }

    /// Read `bits` (≤ 64) big-endian bits as a two's-complement integer.
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        let mut v = self.load_uint(bits)?;
        if bits > 0 && bits < u64::BITS as usize && (v >> (bits - 1)) & 1 == 1 {
            v |= !0 << bits;
        }
        Ok(v as i64)
    }

    /// Read `bits` big-endian bits as an unsigned big integer.
    pub fn load_biguint(&mut self, bits: usize) -> CellResult<BigUint> {
        let mut read = self.load_bits(bits)?;
        let total_bits = (bits + 7) & !7;
        read.resize(total_bits, false);
        read.shift_right(total_bits - bits);
        Ok(BigUint::from_bytes_be(read.as_raw_slice()))
    }

    /// Read `bits` big-endian bits as a two's-complement big integer.
    pub fn load_bigint(&mut self, bits: usize) -> CellResult<BigInt> {
        let read = self.take_bits(bits)?;
        let Some(sign) = read.first().map(|b| *b) else {
            return Ok(BigInt::from(0));
        };
        let total_bits = (bits + 7) & !7;
        let mut extended = BitVec::<u8, Msb0>::repeat(sign, total_bits - bits);
        extended.extend_from_bitslice(read);
        Ok(BigInt::from_signed_bytes_be(extended.as_raw_slice()))
    }

    pub fn load_reference(&mut self) -> CellResult<Arc<Cell>> {
        let reference = self
            .cell
            .references()
            .get(self.refs_start)
            .ok_or(CellError::NoMoreReferences)?
            .clone();
        self.refs_start += 1;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn slice_of(f: impl FnOnce(&mut crate::CellBuilder)) -> CellSlice {
        let mut b = Cell::builder();
        f(&mut b);
        CellSlice::new(Arc::new(b.into_cell()))
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(0xDEAD_BEEF, 32)]
    #[case(u64::MAX, 64)]
    fn uint_roundtrip(#[case] value: u64, #[case] bits: usize) {
        let mut s = slice_of(|b| {
            b.store_uint(value, bits).unwrap();
        });
        assert_eq!(s.load_uint(bits).unwrap(), value);
        assert!(s.is_empty());
    }

    #[rstest]
    #[case(-1, 1)]
    #[case(-1, 8)]
    #[case(i64::MIN, 64)]
    #[case(127, 8)]
    #[case(-128, 8)]
    fn int_roundtrip(#[case] value: i64, #[case] bits: usize) {
        let mut s = slice_of(|b| {
            b.store_int(value, bits).unwrap();
        });
        assert_eq!(s.load_int(bits).unwrap(), value);
    }

    #[test]
    fn biguint_roundtrip() {
        let v = BigUint::from_bytes_be(&[0xAB; 32]);
        let mut s = slice_of(|b| {
            b.store_biguint(&v, 256).unwrap();
        });
        assert_eq!(s.load_biguint(256).unwrap(), v);
    }

    #[test]
    fn bigint_roundtrip() {
        let v = BigInt::from(-123456789i64);
        let mut s = slice_of(|b| {
            b.store_bigint(&v, 100).unwrap();
        });
        assert_eq!(s.load_bigint(100).unwrap(), v);
    }

    #[test]
    fn underflow() {
        let mut s = slice_of(|b| {
            b.store_uint(0, 7).unwrap();
        });
        assert_eq!(
            s.load_uint(8).unwrap_err(),
            CellError::DataUnderflow {
                requested: 8,
                left: 7
            },
        );
    }

    #[test]
    fn no_references() {
        let mut s = slice_of(|_| {});
        assert_eq!(s.load_reference().unwrap_err(), CellError::NoMoreReferences);
    }

    #[test]
    fn ensure_empty() {
        let s = slice_of(|b| {
            b.store_bit(true).unwrap();
        });
        assert_eq!(
            s.ensure_empty().unwrap_err(),
            CellError::NotExhausted {
                bits: 1,
                references: 0
            },
        );
    }
}
