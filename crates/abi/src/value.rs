use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use tvm_cells::{Cell, MsgAddress};

use crate::param::{Param, ParamType};

/// A typed ABI value: the payload together with enough structure to
/// recover its [`ParamType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint { size: usize, value: BigUint },
    Int { size: usize, value: BigInt },
    Bool(bool),
    Tuple(Vec<Value>),
    Array(Arc<ParamType>, Vec<Value>),
    FixedArray(Arc<ParamType>, Vec<Value>),
    Cell(Arc<Cell>),
    Map(Arc<ParamType>, Arc<ParamType>, Vec<(Value, Value)>),
    Address(MsgAddress),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    /// Currency amount, at most 2¹²⁰ − 1
    Gram(u128),
    /// Unix time, milliseconds
    Time(u64),
    /// Unix time, seconds
    Expire(u32),
    PublicKey(Option<[u8; 32]>),
}

impl Value {
    #[inline]
    pub fn uint(size: usize, value: impl Into<BigUint>) -> Self {
        Self::Uint {
            size,
            value: value.into(),
        }
    }

    #[inline]
    pub fn int(size: usize, value: impl Into<BigInt>) -> Self {
        Self::Int {
            size,
            value: value.into(),
        }
    }

    /// Schema node this value conforms to.
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Uint { size, .. } => ParamType::Uint(*size),
            Self::Int { size, .. } => ParamType::Int(*size),
            Self::Bool(_) => ParamType::Bool,
            Self::Tuple(items) => ParamType::Tuple(
                items
                    .iter()
                    .map(|item| Param::new("", item.param_type()))
                    .collect(),
            ),
            Self::Array(item, _) => ParamType::Array(item.clone()),
            Self::FixedArray(item, items) => ParamType::FixedArray(item.clone(), items.len()),
            Self::Cell(_) => ParamType::Cell,
            Self::Map(key, value, _) => ParamType::Map(key.clone(), value.clone()),
            Self::Address(_) => ParamType::Address,
            Self::Bytes(_) => ParamType::Bytes,
            Self::FixedBytes(bytes) => ParamType::FixedBytes(bytes.len()),
            Self::Gram(_) => ParamType::Gram,
            Self::Time(_) => ParamType::Time,
            Self::Expire(_) => ParamType::Expire,
            Self::PublicKey(_) => ParamType::PublicKey,
        }
    }

    /// Shortcut for [`.param_type()`](Value::param_type)`.type_signature()`
    #[inline]
    pub fn type_signature(&self) -> String {
        self.param_type().type_signature()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_signatures() {
        assert_eq!(Value::uint(32, 0u32).type_signature(), "uint32");
        assert_eq!(
            Value::Tuple(vec![Value::Bool(true), Value::Gram(1)]).type_signature(),
            "(bool,gram)",
        );
        assert_eq!(
            Value::FixedArray(ParamType::Uint(8).into(), vec![Value::uint(8, 1u8); 3])
                .type_signature(),
            "uint8[3]",
        );
        assert_eq!(Value::FixedBytes(vec![0; 16]).type_signature(), "fixedbytes16");
    }
}
