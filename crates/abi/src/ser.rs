//! Per-type serialization into leaf builders and the cell-chain packer.
use std::sync::Arc;

use num_bigint::{BigInt, BigUint, Sign};
use tvm_cells::bitvec::order::Msb0;
use tvm_cells::bitvec::vec::BitVec;
use tvm_cells::either::Either;
use tvm_cells::{Cell, CellBuilder, Dict, MAX_BITS_LEN, MAX_REFS_COUNT};

use crate::error::{AbiError, AbiResult, CellResultExt};
use crate::param::ParamType;
use crate::value::Value;

/// Longest byte chunk that fits into a single cell.
pub(crate) const BYTES_PER_CHUNK: usize = 127;
/// Longest `gram` amount, in bytes.
const MAX_GRAM_BYTES: usize = 15;

/// Fold a sequence of leaf builders into a single root cell.
///
/// Walks the leaves right to left, keeping an accumulator of everything
/// serialized so far: the accumulator is appended to the preceding leaf
/// when both the bit and the reference budgets allow, and attached as its
/// trailing reference otherwise.
pub fn pack_into_chain(leaves: Vec<CellBuilder>) -> AbiResult<Cell> {
    let mut acc: Option<CellBuilder> = None;
    for mut leaf in leaves.into_iter().rev() {
        let Some(tail) = acc.take() else {
            acc = Some(leaf);
            continue;
        };
        if leaf.bits_len() + tail.bits_len() <= MAX_BITS_LEN
            && leaf.references_len() + tail.references_len() <= MAX_REFS_COUNT
        {
            leaf.store_builder(tail).stored()?;
        } else {
            leaf.store_reference(Arc::new(tail.into_cell())).stored()?;
        }
        acc = Some(leaf);
    }
    Ok(acc.map(CellBuilder::into_cell).unwrap_or_default())
}

/// Serialize a single value into leaf builders for [`pack_into_chain`].
pub fn serialize_value(value: &Value) -> AbiResult<Vec<CellBuilder>> {
    let mut leaf = CellBuilder::new();
    match value {
        Value::Uint { size, value } => {
            check_uint_range(value, *size)?;
            leaf.store_biguint(value, *size).stored()?;
        }
        Value::Int { size, value } => {
            check_int_range(value, *size)?;
            leaf.store_bigint(value, *size).stored()?;
        }
        Value::Bool(bit) => {
            leaf.store_bit(*bit).stored()?;
        }
        Value::Tuple(items) => {
            let mut leaves = Vec::new();
            for item in items {
                leaves.extend(serialize_value(item)?);
            }
            return Ok(leaves);
        }
        Value::Array(item_type, items) => {
            leaf.store_uint(items.len() as u64, 32).stored()?;
            store_array_dict(&mut leaf, item_type, items)?;
        }
        Value::FixedArray(item_type, items) => {
            store_array_dict(&mut leaf, item_type, items)?;
        }
        Value::Cell(cell) => {
            leaf.store_reference(cell.clone()).stored()?;
        }
        Value::Map(key_type, value_type, entries) => {
            store_map_dict(&mut leaf, key_type, value_type, entries)?;
        }
        Value::Address(address) => {
            address.store(&mut leaf).stored()?;
        }
        Value::Bytes(bytes) | Value::FixedBytes(bytes) => {
            leaf.store_reference(Arc::new(build_byte_chain(bytes)?))
                .stored()?;
        }
        Value::Gram(amount) => {
            store_gram(&mut leaf, *amount)?;
        }
        Value::Time(time) => {
            leaf.store_uint(*time, 64).stored()?;
        }
        Value::Expire(expire) => {
            leaf.store_uint(*expire as u64, 32).stored()?;
        }
        Value::PublicKey(key) => match key {
            Some(key) => {
                leaf.store_bit(true).stored()?;
                leaf.store_bytes(key).stored()?;
            }
            None => {
                leaf.store_bit(false).stored()?;
            }
        },
    }
    Ok(vec![leaf])
}

/// Confirm that `value`'s signature is byte-equal to `expected`'s.
pub(crate) fn check_type(value: &Value, expected: &ParamType) -> AbiResult<()> {
    let expected = expected.type_signature();
    let got = value.type_signature();
    if got != expected {
        return Err(AbiError::TypeMismatch { expected, got });
    }
    Ok(())
}

pub(crate) fn check_uint_range(value: &BigUint, size: usize) -> AbiResult<()> {
    if value.bits() as usize > size {
        return Err(AbiError::ValueOutOfRange(format!(
            "{value} does not fit into {size} unsigned bits"
        )));
    }
    Ok(())
}

pub(crate) fn check_int_range(value: &BigInt, size: usize) -> AbiResult<()> {
    let out_of_range = || {
        AbiError::ValueOutOfRange(format!("{value} does not fit into {size} signed bits"))
    };
    if size == 0 {
        return if value.sign() == Sign::NoSign {
            Ok(())
        } else {
            Err(out_of_range())
        };
    }
    let half = BigInt::from(1) << (size - 1);
    if *value < -&half || *value >= half {
        return Err(out_of_range());
    }
    Ok(())
}

/// Element values are always stored by reference, keyed by their 32-bit
/// big-endian index.
fn store_array_dict(
    leaf: &mut CellBuilder,
    item_type: &ParamType,
    items: &[Value],
) -> AbiResult<()> {
    let mut dict = Dict::new(32);
    for (index, item) in items.iter().enumerate() {
        check_type(item, item_type)?;
        let cell = pack_into_chain(serialize_value(item)?)?;
        dict.insert(index_key(index as u32), Either::Right(Arc::new(cell)))
            .stored()?;
    }
    dict.store_into(leaf).stored()?;
    Ok(())
}

fn store_map_dict(
    leaf: &mut CellBuilder,
    key_type: &ParamType,
    value_type: &ParamType,
    entries: &[(Value, Value)],
) -> AbiResult<()> {
    let key_len = map_key_len(key_type)?;
    let mut dict = Dict::new(key_len);
    for (key, value) in entries {
        check_type(key, key_type)?;
        check_type(value, value_type)?;
        let key_bits = serialize_map_key(key)?;
        let cell = pack_into_chain(serialize_value(value)?)?;
        let leaf_value = if stored_inline(value_type) {
            Either::Left(cell)
        } else {
            Either::Right(Arc::new(cell))
        };
        dict.insert(key_bits, leaf_value).stored()?;
    }
    dict.store_into(leaf).stored()?;
    Ok(())
}

pub(crate) fn map_key_len(key_type: &ParamType) -> AbiResult<usize> {
    key_type.map_key_len().ok_or_else(|| AbiError::TypeMismatch {
        expected: "map key of a fixed bit width (int, uint, address or fixed bytes)".to_string(),
        got: key_type.type_signature(),
    })
}

/// Map values of a fixed or small bit width are spliced into the leaf
/// edge cell; compound values are stored as its single reference. Both
/// directions of the codec apply this rule, so no trial parsing is
/// needed.
pub(crate) fn stored_inline(value_type: &ParamType) -> bool {
    matches!(
        value_type,
        ParamType::Uint(_)
            | ParamType::Int(_)
            | ParamType::Bool
            | ParamType::Address
            | ParamType::Gram
            | ParamType::Time
            | ParamType::Expire
            | ParamType::PublicKey
    )
}

fn serialize_map_key(key: &Value) -> AbiResult<BitVec<u8, Msb0>> {
    let mut builder = CellBuilder::new();
    match key {
        Value::Uint { size, value } => {
            check_uint_range(value, *size)?;
            builder.store_biguint(value, *size).stored()?;
        }
        Value::Int { size, value } => {
            check_int_range(value, *size)?;
            builder.store_bigint(value, *size).stored()?;
        }
        Value::Address(address) => {
            address.store(&mut builder).stored()?;
        }
        Value::FixedBytes(bytes) => {
            builder.store_bytes(bytes).stored()?;
        }
        _ => {
            return Err(AbiError::TypeMismatch {
                expected: "map key of a fixed bit width (int, uint, address or fixed bytes)"
                    .to_string(),
                got: key.type_signature(),
            });
        }
    }
    Ok(builder.into_cell().data().to_bitvec())
}

#[inline]
fn index_key(index: u32) -> BitVec<u8, Msb0> {
    BitVec::from_slice(&index.to_be_bytes())
}

/// Bytes are split into chunks of up to 127, laid out as a linear chain
/// with each chunk referencing the next.
pub(crate) fn build_byte_chain(bytes: &[u8]) -> AbiResult<Cell> {
    let mut next: Option<Cell> = None;
    for chunk in bytes.chunks(BYTES_PER_CHUNK).rev() {
        let mut builder = CellBuilder::new();
        builder.store_bytes(chunk).stored()?;
        if let Some(tail) = next.take() {
            builder.store_reference(Arc::new(tail)).stored()?;
        }
        next = Some(builder.into_cell());
    }
    Ok(next.unwrap_or_default())
}

/// 4-bit length prefix, then that many bytes of big-endian amount.
fn store_gram(leaf: &mut CellBuilder, amount: u128) -> AbiResult<()> {
    let bytes = (u128::BITS as usize - amount.leading_zeros() as usize).div_ceil(8);
    if bytes > MAX_GRAM_BYTES {
        return Err(AbiError::ValueOutOfRange(format!(
            "gram amount {amount} needs {bytes} bytes, at most {MAX_GRAM_BYTES} allowed"
        )));
    }
    leaf.store_uint(bytes as u64, 4).stored()?;
    leaf.store_bytes(&amount.to_be_bytes()[16 - bytes..]).stored()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn single_cell(value: &Value) -> Cell {
        pack_into_chain(serialize_value(value).unwrap()).unwrap()
    }

    #[test]
    fn uint32_bit_pattern() {
        let cell = single_cell(&Value::uint(32, 0xDEAD_BEEFu32));
        assert_eq!(cell.bits_len(), 32);
        assert_eq!(cell.as_raw_slice(), [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn address_bit_pattern() {
        let cell = single_cell(&Value::Address(Default::default()));
        assert_eq!(cell.bits_len(), 267);
        // addr_std$10, anycast 0, workchain 0, zero hash
        assert!(cell.data()[0]);
        assert!(!cell.data()[1..].any());
    }

    #[test]
    fn bytes_chunking() {
        let cell = single_cell(&Value::Bytes(vec![0xAA; 130]));
        assert_eq!(cell.bits_len(), 0);
        let head = &cell.references()[0];
        assert_eq!(head.bits_len(), 127 * 8);
        let tail = &head.references()[0];
        assert_eq!(tail.bits_len(), 3 * 8);
        assert!(tail.references().is_empty());
        assert_eq!(tail.as_raw_slice(), [0xAA; 3]);
    }

    #[rstest]
    #[case(0, 4)]
    #[case(1, 4 + 8)]
    #[case(1_000_000_000, 4 + 4 * 8)]
    #[case((1 << 120) - 1, 4 + 15 * 8)]
    fn gram_widths(#[case] amount: u128, #[case] bits: usize) {
        assert_eq!(single_cell(&Value::Gram(amount)).bits_len(), bits);
    }

    #[test]
    fn gram_out_of_range() {
        assert!(matches!(
            serialize_value(&Value::Gram(1 << 120)),
            Err(AbiError::ValueOutOfRange(_)),
        ));
    }

    #[rstest]
    #[case(Value::uint(8, 256u16))]
    #[case(Value::uint(1, 2u8))]
    #[case(Value::int(8, 128))]
    #[case(Value::int(8, -129))]
    fn integer_out_of_range(#[case] value: Value) {
        assert!(matches!(
            serialize_value(&value),
            Err(AbiError::ValueOutOfRange(_)),
        ));
    }

    #[test]
    fn tuple_concatenates_inline() {
        let cell = single_cell(&Value::Tuple(vec![
            Value::uint(8, 0xABu8),
            Value::Bool(true),
        ]));
        assert_eq!(cell.bits_len(), 9);
    }

    fn assert_budgets(cell: &Cell) {
        assert!(cell.bits_len() <= MAX_BITS_LEN);
        assert!(cell.references().len() <= MAX_REFS_COUNT);
        for reference in cell.references() {
            assert_budgets(reference);
        }
    }

    #[test]
    fn packer_respects_budgets() {
        // 10 leaves of 600 bits each cannot pairwise merge
        let leaves: Vec<CellBuilder> = (0..10)
            .map(|_| {
                let mut leaf = CellBuilder::new();
                leaf.store_repeated_bit(600, true).unwrap();
                leaf
            })
            .collect();
        let root = pack_into_chain(leaves).unwrap();
        assert_budgets(&root);
        assert_eq!(root.bits_len(), 600);
        assert_eq!(root.references().len(), 1);
    }

    #[test]
    fn packer_merges_small_leaves() {
        let leaves: Vec<CellBuilder> = (0..64)
            .map(|i| {
                let mut leaf = CellBuilder::new();
                leaf.store_uint(i, 8).unwrap();
                leaf
            })
            .collect();
        let root = pack_into_chain(leaves).unwrap();
        assert_eq!(root.bits_len(), 64 * 8);
        assert!(root.references().is_empty());
    }

    #[test]
    fn packer_spills_references() {
        let child = Arc::new(Cell::default());
        let leaves: Vec<CellBuilder> = (0..6)
            .map(|_| {
                let mut leaf = CellBuilder::new();
                leaf.store_reference(child.clone()).unwrap();
                leaf
            })
            .collect();
        let root = pack_into_chain(leaves).unwrap();
        assert_budgets(&root);
    }

    #[test]
    fn mismatched_array_item() {
        let value = Value::Array(ParamType::Uint(8).into(), vec![Value::Bool(true)]);
        assert_eq!(
            serialize_value(&value).unwrap_err(),
            AbiError::TypeMismatch {
                expected: "uint8".to_string(),
                got: "bool".to_string(),
            },
        );
    }
}
