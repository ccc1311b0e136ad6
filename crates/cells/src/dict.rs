use std::collections::BTreeMap;
use std::sync::Arc;

use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use either::Either;

use crate::builder::CellBuilder;
use crate::cell::Cell;
use crate::error::{CellError, CellResult};
use crate::slice::CellSlice;

/// Value of a single dictionary leaf: either spliced into the edge cell
/// (`Left`) or stored as its only outgoing reference (`Right`).
pub type DictValue = Either<Cell, Arc<Cell>>;

/// Dictionary with fixed-width keys:
/// ```tlb
/// hme_empty$0 {n:#} {X:Type} = HashmapE n X;
/// hme_root$1 {n:#} {X:Type} root:^(Hashmap n X) = HashmapE n X;
/// ```
#[derive(Debug, Clone)]
pub struct Dict {
    key_len: usize,
    entries: BTreeMap<BitVec<u8, Msb0>, DictValue>,
}

impl Dict {
    #[inline]
    #[must_use]
    pub fn new(key_len: usize) -> Self {
        Self {
            key_len,
            entries: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: BitVec<u8, Msb0>, value: DictValue) -> CellResult<()> {
        if key.len() != self.key_len {
            return Err(CellError::invalid(format!(
                "dictionary key must be {} bits wide, got {}",
                self.key_len,
                key.len()
            )));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Store as `HashmapE n X`: a presence bit, then the tree root by
    /// reference.
    pub fn store_into(&self, builder: &mut CellBuilder) -> CellResult<()> {
        if self.entries.is_empty() {
            builder.store_bit(false)?;
            return Ok(());
        }
        let entries: Vec<(BitVec<u8, Msb0>, &DictValue)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v))
            .collect();
        let root = build_edge(self.key_len, entries)?;
        builder
            .store_bit(true)?
            .store_reference(Arc::new(root))?;
        Ok(())
    }

    /// Read a `HashmapE key_len X` and return `(key, value slice)` pairs in
    /// ascending key order. The value slice is positioned right past the
    /// edge label of its leaf cell.
    pub fn parse(
        slice: &mut CellSlice,
        key_len: usize,
    ) -> CellResult<Vec<(BitVec<u8, Msb0>, CellSlice)>> {
        let mut out = Vec::new();
        if slice.load_bit()? {
            let root = slice.load_reference()?;
            parse_edge(root.slice(), key_len, BitVec::new(), &mut out)?;
        }
        Ok(out)
    }
}

/// ```tlb
/// hm_edge#_ {n:#} {X:Type} {l:#} {m:#} label:(HmLabel ~l n)
/// {n = (~m) + l} node:(HashmapNode m X) = Hashmap n X;
/// hmn_leaf#_ {X:Type} value:X = HashmapNode 0 X;
/// hmn_fork#_ {n:#} {X:Type} left:^(Hashmap n X)
///            right:^(Hashmap n X) = HashmapNode (n + 1) X;
/// ```
fn build_edge(n: usize, entries: Vec<(BitVec<u8, Msb0>, &DictValue)>) -> CellResult<Cell> {
    debug_assert!(!entries.is_empty());
    let mut builder = CellBuilder::new();

    let mut lcp_len = entries[0].0.len();
    for (key, _) in &entries[1..] {
        lcp_len = lcp_len.min(common_prefix_len(&entries[0].0, key));
    }
    let label = entries[0].0[..lcp_len].to_bitvec();
    store_label(&mut builder, &label, n)?;

    let m = n - lcp_len;
    if m == 0 {
        match entries[0].1 {
            Either::Left(cell) => {
                builder.store_bits(cell.data())?;
                for reference in cell.references() {
                    builder.store_reference(reference.clone())?;
                }
            }
            Either::Right(cell) => {
                builder.store_reference(cell.clone())?;
            }
        }
    } else {
        let split = entries
            .iter()
            .position(|(key, _)| key[lcp_len])
            .ok_or_else(|| CellError::invalid("fork with empty branch"))?;
        if split == 0 {
            return Err(CellError::invalid("fork with empty branch"));
        }
        let mut left = Vec::with_capacity(split);
        let mut right = Vec::with_capacity(entries.len() - split);
        for (i, (key, value)) in entries.into_iter().enumerate() {
            let suffix = key[lcp_len + 1..].to_bitvec();
            if i < split {
                left.push((suffix, value));
            } else {
                right.push((suffix, value));
            }
        }
        builder
            .store_reference(Arc::new(build_edge(m - 1, left)?))?
            .store_reference(Arc::new(build_edge(m - 1, right)?))?;
    }
    Ok(builder.into_cell())
}

fn parse_edge(
    mut slice: CellSlice,
    m: usize,
    prefix: BitVec<u8, Msb0>,
    out: &mut Vec<(BitVec<u8, Msb0>, CellSlice)>,
) -> CellResult<()> {
    let label = load_label(&mut slice, m)?;
    let mut key = prefix;
    key.extend_from_bitslice(&label);

    let m = m - label.len();
    if m == 0 {
        out.push((key, slice));
        return Ok(());
    }
    let left = slice.load_reference()?;
    let right = slice.load_reference()?;
    let mut left_key = key.clone();
    left_key.push(false);
    parse_edge(left.slice(), m - 1, left_key, out)?;
    key.push(true);
    parse_edge(right.slice(), m - 1, key, out)
}

/// Number of bits needed for `n:(#<= m)`
#[inline]
fn len_bits(m: usize) -> usize {
    (usize::BITS - m.leading_zeros()) as usize
}

/// ```tlb
/// hml_short$0 {m:#} {n:#} len:(Unary ~n) {n <= m} s:(n * Bit) = HmLabel ~n m;
/// hml_long$10 {m:#} n:(#<= m) s:(n * Bit) = HmLabel ~n m;
/// hml_same$11 {m:#} v:Bit n:(#<= m) = HmLabel ~n m;
/// ```
///
/// The shortest of the three encodings is chosen.
fn store_label(builder: &mut CellBuilder, label: &BitSlice<u8, Msb0>, m: usize) -> CellResult<()> {
    let n = label.len();
    let len_bits = len_bits(m);

    let short = 1 + n + 1 + n;
    let long = 2 + len_bits + n;
    let same = 2 + 1 + len_bits;
    let same_allowed = n > 0 && (label.all() || label.not_any());

    if same_allowed && same < short && same < long {
        builder
            .store_uint(0b11, 2)?
            .store_bit(label[0])?
            .store_uint(n as u64, len_bits)?;
    } else if long < short {
        builder
            .store_uint(0b10, 2)?
            .store_uint(n as u64, len_bits)?
            .store_bits(label)?;
    } else {
        builder
            .store_bit(false)?
            .store_repeated_bit(n, true)?
            .store_bit(false)?
            .store_bits(label)?;
    }
    Ok(())
}

fn load_label(slice: &mut CellSlice, m: usize) -> CellResult<BitVec<u8, Msb0>> {
    let ensure_len = |n: usize| {
        if n > m {
            return Err(CellError::invalid(format!(
                "label of {n} bits is longer than the {m}-bit key remainder"
            )));
        }
        Ok(n)
    };
    if !slice.load_bit()? {
        // hml_short$0 len:(Unary ~n)
        let mut n = 0;
        while slice.load_bit()? {
            n += 1;
        }
        slice.load_bits(ensure_len(n)?)
    } else if !slice.load_bit()? {
        // hml_long$10 n:(#<= m)
        let n = ensure_len(slice.load_uint(len_bits(m))? as usize)?;
        slice.load_bits(n)
    } else {
        // hml_same$11 v:Bit n:(#<= m)
        let v = slice.load_bit()?;
        let n = ensure_len(slice.load_uint(len_bits(m))? as usize)?;
        Ok(BitVec::repeat(v, n))
    }
}

#[inline]
fn common_prefix_len(a: &BitSlice<u8, Msb0>, b: &BitSlice<u8, Msb0>) -> usize {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn key(value: u64, bits: usize) -> BitVec<u8, Msb0> {
        let mut b = CellBuilder::new();
        b.store_uint(value, bits).unwrap();
        b.into_cell().data().to_bitvec()
    }

    fn inline_u16(value: u16) -> DictValue {
        let mut b = CellBuilder::new();
        b.store_uint(value as u64, 16).unwrap();
        Either::Left(b.into_cell())
    }

    fn roundtrip(key_len: usize, pairs: &[(u64, u16)]) {
        let mut dict = Dict::new(key_len);
        for (k, v) in pairs {
            dict.insert(key(*k, key_len), inline_u16(*v)).unwrap();
        }
        let mut builder = CellBuilder::new();
        dict.store_into(&mut builder).unwrap();
        let cell = Arc::new(builder.into_cell());

        let entries = Dict::parse(&mut cell.slice(), key_len).unwrap();
        assert_eq!(entries.len(), pairs.len());

        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        for ((got_key, mut got_value), (want_key, want_value)) in
            entries.into_iter().zip(sorted)
        {
            assert_eq!(got_key, key(want_key, key_len));
            assert_eq!(got_value.load_uint(16).unwrap(), want_value as u64);
        }
    }

    #[test]
    fn empty() {
        let dict = Dict::new(8);
        let mut builder = CellBuilder::new();
        dict.store_into(&mut builder).unwrap();
        let cell = Arc::new(builder.into_cell());
        assert_eq!(cell.bits_len(), 1);
        assert!(Dict::parse(&mut cell.slice(), 8).unwrap().is_empty());
    }

    #[test]
    fn single_entry() {
        roundtrip(8, &[(0xFF, 7)]);
    }

    /// Key/value set from the hashmap parsing example in the TON docs.
    #[test]
    fn three_entries() {
        roundtrip(8, &[(1, 777), (17, 111), (128, 777)]);
    }

    #[rstest]
    #[case(1)]
    #[case(8)]
    #[case(32)]
    #[case(64)]
    fn key_widths(#[case] key_len: usize) {
        let max = if key_len >= 64 {
            u64::MAX
        } else {
            (1 << key_len) - 1
        };
        roundtrip(key_len, &[(0, 1), (max, 2)]);
    }

    #[test]
    fn referenced_values() {
        let mut dict = Dict::new(16);
        for i in 0..10u64 {
            let mut b = CellBuilder::new();
            b.store_uint(i * 1000, 64).unwrap();
            dict.insert(key(i, 16), Either::Right(Arc::new(b.into_cell())))
                .unwrap();
        }
        let mut builder = CellBuilder::new();
        dict.store_into(&mut builder).unwrap();
        let cell = Arc::new(builder.into_cell());

        let entries = Dict::parse(&mut cell.slice(), 16).unwrap();
        for (i, (k, mut v)) in entries.into_iter().enumerate() {
            assert_eq!(k, key(i as u64, 16));
            let mut value = v.load_reference().unwrap().slice();
            assert_eq!(value.load_uint(64).unwrap(), i as u64 * 1000);
            v.ensure_empty().unwrap();
        }
    }

    #[test]
    fn wrong_key_width() {
        let mut dict = Dict::new(8);
        assert!(dict.insert(key(1, 9), inline_u16(1)).is_err());
    }
}
