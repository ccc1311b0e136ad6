//! Per-type deserialization walking the chain of continuation cells.
use std::sync::Arc;

use num_traits::ToPrimitive;
use tvm_cells::bitvec::order::Msb0;
use tvm_cells::bitvec::slice::BitSlice;
use tvm_cells::{Cell, CellBuilder, CellSlice, Dict, MsgAddress};

use crate::error::{AbiError, AbiResult, CellResultExt};
use crate::param::{Param, ParamType};
use crate::ser::{map_key_len, stored_inline};
use crate::value::Value;

/// Deserialize one value of the given type.
///
/// `last` tells whether this is the terminal parameter of the current
/// sequence; reference-shaped values use it to tell their own reference
/// apart from the trailing continuation reference.
pub fn deserialize_value(
    slice: &mut CellSlice,
    kind: &ParamType,
    last: bool,
) -> AbiResult<Value> {
    Ok(match kind {
        ParamType::Uint(size) => {
            find_next_bits(slice, *size)?;
            Value::Uint {
                size: *size,
                value: slice.load_biguint(*size).loaded()?,
            }
        }
        ParamType::Int(size) => {
            find_next_bits(slice, *size)?;
            Value::Int {
                size: *size,
                value: slice.load_bigint(*size).loaded()?,
            }
        }
        ParamType::Bool => {
            find_next_bits(slice, 1)?;
            Value::Bool(slice.load_bit().loaded()?)
        }
        ParamType::Tuple(items) => {
            let count = items.len();
            Value::Tuple(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        deserialize_value(slice, &item.kind, last && i + 1 == count)
                    })
                    .collect::<AbiResult<_>>()?,
            )
        }
        ParamType::Array(item) => {
            find_next_bits(slice, 32 + 1)?;
            let count = slice.load_uint(32).loaded()?;
            let items = read_array_dict(slice, item, count as usize)?;
            Value::Array(item.clone(), items)
        }
        ParamType::FixedArray(item, size) => {
            find_next_bits(slice, 1)?;
            let items = read_array_dict(slice, item, *size)?;
            Value::FixedArray(item.clone(), items)
        }
        ParamType::Cell => Value::Cell(load_reference_value(slice, last)?),
        ParamType::Map(key_type, value_type) => {
            let key_len = map_key_len(key_type)?;
            find_next_bits(slice, 1)?;
            let mut entries = Vec::new();
            for (key_bits, mut value_slice) in Dict::parse(slice, key_len).loaded()? {
                let key = map_key_from_bits(key_type, &key_bits)?;
                let value = if stored_inline(value_type) {
                    deserialize_value(&mut value_slice, value_type, true)?
                } else {
                    let cell = value_slice.load_reference().loaded()?;
                    deserialize_value(&mut cell.slice(), value_type, true)?
                };
                entries.push((key, value));
            }
            Value::Map(key_type.clone(), value_type.clone(), entries)
        }
        ParamType::Address => {
            find_next_bits(slice, 2)?;
            Value::Address(MsgAddress::load(slice).loaded()?)
        }
        ParamType::Bytes => {
            Value::Bytes(read_byte_chain(load_reference_value(slice, last)?)?)
        }
        ParamType::FixedBytes(size) => {
            let bytes = read_byte_chain(load_reference_value(slice, last)?)?;
            if bytes.len() != *size {
                return Err(AbiError::de(format!(
                    "expected {size} bytes, got {}",
                    bytes.len()
                )));
            }
            Value::FixedBytes(bytes)
        }
        ParamType::Gram => {
            find_next_bits(slice, 4)?;
            let bytes = slice.load_uint(4).loaded()? as usize;
            let amount = slice
                .load_biguint(bytes * 8)
                .loaded()?
                .to_u128()
                .ok_or_else(|| AbiError::de("gram amount overflow"))?;
            Value::Gram(amount)
        }
        ParamType::Time => {
            find_next_bits(slice, 64)?;
            Value::Time(slice.load_uint(64).loaded()?)
        }
        ParamType::Expire => {
            find_next_bits(slice, 32)?;
            Value::Expire(slice.load_uint(32).loaded()? as u32)
        }
        ParamType::PublicKey => {
            find_next_bits(slice, 1)?;
            Value::PublicKey(if slice.load_bit().loaded()? {
                Some(slice.load_bytes_array().loaded()?)
            } else {
                None
            })
        }
    })
}

/// Deserialize a parameter list in order; `last_group` marks whether the
/// list terminates the body.
pub(crate) fn deserialize_params(
    slice: &mut CellSlice,
    params: &[Param],
    last_group: bool,
) -> AbiResult<Vec<Value>> {
    let count = params.len();
    params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            deserialize_value(slice, &param.kind, last_group && i + 1 == count)
        })
        .collect()
}

/// Re-seat the cursor on the continuation cell when the requested bits
/// are not in the current one.
///
/// A value's bits never split across cells, so either the current cell
/// has them, or it is exhausted and its single trailing reference is the
/// continuation.
fn find_next_bits(slice: &mut CellSlice, bits: usize) -> AbiResult<()> {
    if slice.remaining_bits() >= bits {
        return Ok(());
    }
    if slice.remaining_bits() == 0 && slice.remaining_references() == 1 {
        *slice = slice.load_reference().loaded()?.slice();
        if slice.remaining_bits() >= bits {
            return Ok(());
        }
    }
    Err(AbiError::de(format!(
        "not enough bits: requested {bits}, {} left",
        slice.remaining_bits()
    )))
}

pub(crate) fn load_uint_chained(slice: &mut CellSlice, bits: usize) -> AbiResult<u64> {
    find_next_bits(slice, bits)?;
    slice.load_uint(bits).loaded()
}

/// Load a reference-shaped value (`cell`, `bytes`).
///
/// When exactly one reference remains in an exhausted cell and this is
/// not the last parameter, that reference is the continuation holding
/// the value; otherwise it is the value itself.
fn load_reference_value(slice: &mut CellSlice, last: bool) -> AbiResult<Arc<Cell>> {
    if !last && slice.remaining_bits() == 0 && slice.remaining_references() == 1 {
        *slice = slice.load_reference().loaded()?.slice();
    }
    slice.load_reference().loaded()
}

fn read_array_dict(
    slice: &mut CellSlice,
    item: &ParamType,
    count: usize,
) -> AbiResult<Vec<Value>> {
    let entries = Dict::parse(slice, 32).loaded()?;
    if entries.len() != count {
        return Err(AbiError::de(format!(
            "expected {count} array elements, dictionary holds {}",
            entries.len()
        )));
    }
    let mut items = Vec::with_capacity(count);
    for (index, (key, mut value_slice)) in entries.into_iter().enumerate() {
        if bits_to_u32(&key) != index as u32 {
            return Err(AbiError::de("array indexes are not contiguous"));
        }
        let cell = value_slice.load_reference().loaded()?;
        items.push(deserialize_value(&mut cell.slice(), item, true)?);
    }
    Ok(items)
}

fn map_key_from_bits(kind: &ParamType, bits: &BitSlice<u8, Msb0>) -> AbiResult<Value> {
    let mut builder = CellBuilder::new();
    builder.store_bits(bits).loaded()?;
    let cell = Arc::new(builder.into_cell());
    let mut slice = cell.slice();
    Ok(match kind {
        ParamType::Uint(size) => Value::Uint {
            size: *size,
            value: slice.load_biguint(*size).loaded()?,
        },
        ParamType::Int(size) => Value::Int {
            size: *size,
            value: slice.load_bigint(*size).loaded()?,
        },
        ParamType::Address => Value::Address(MsgAddress::load(&mut slice).loaded()?),
        ParamType::FixedBytes(size) => Value::FixedBytes(slice.load_bytes(*size).loaded()?),
        _ => {
            return Err(AbiError::de(format!(
                "`{kind}` cannot be a dictionary key"
            )));
        }
    })
}

/// Concatenate a linear chain of byte chunk cells.
pub(crate) fn read_byte_chain(root: Arc<Cell>) -> AbiResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cell = root;
    loop {
        if cell.bits_len() % 8 != 0 {
            return Err(AbiError::de("byte chunk is not byte-aligned"));
        }
        bytes.extend_from_slice(cell.as_raw_slice());
        match cell.references().first() {
            Some(next) => {
                let next = next.clone();
                cell = next;
            }
            None => return Ok(bytes),
        }
    }
}

#[inline]
fn bits_to_u32(bits: &BitSlice<u8, Msb0>) -> u32 {
    bits.iter().fold(0, |acc, bit| (acc << 1) | *bit as u32)
}
