use core::fmt::{self, Display};
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use tvm_cells::{Cell, MsgAddress};

use crate::clock::Clock;
use crate::value::Value;

/// Named parameter of a function schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
}

impl Param {
    #[inline]
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Type of an ABI parameter.
///
/// Compound nodes are shared by reference: parameters are immutable, so
/// the same node may back many values and functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// `uintN`: `N`-bit unsigned integer
    Uint(usize),
    /// `intN`: `N`-bit two's-complement integer
    Int(usize),
    /// `bool`: single bit
    Bool,
    /// `(t1,...)`: inline concatenation of the element encodings
    Tuple(Vec<Param>),
    /// `T[]`: 32-bit count, then a dictionary keyed by element index
    Array(Arc<ParamType>),
    /// `T[N]`: same dictionary as `T[]` without the count
    FixedArray(Arc<ParamType>, usize),
    /// `cell`: a subtree stored as one reference
    Cell,
    /// `map(K,V)`: dictionary keyed by `K`'s fixed-width encoding
    Map(Arc<ParamType>, Arc<ParamType>),
    /// `address`: `addr_std$10` message address
    Address,
    /// `bytes`: chain of cells of up to 127 bytes each
    Bytes,
    /// `fixedbytesN`: same chain, exactly `N` bytes
    FixedBytes(usize),
    /// `gram`: 4-bit length prefix, then that many bytes of amount
    Gram,
    /// `time`: 64-bit unsigned milliseconds, defaults to the current time
    Time,
    /// `expire`: 32-bit unsigned seconds
    Expire,
    /// `pubkey`: presence bit, then 256 bits of key material
    PublicKey,
}

impl ParamType {
    /// Canonical textual form of this type.
    ///
    /// Signatures are deterministic and independent of parameter names:
    /// two types are equivalent iff their signatures are byte-equal.
    pub fn type_signature(&self) -> String {
        match self {
            Self::Uint(size) => format!("uint{size}"),
            Self::Int(size) => format!("int{size}"),
            Self::Bool => "bool".to_string(),
            Self::Tuple(items) => format!(
                "({})",
                items
                    .iter()
                    .map(|item| item.kind.type_signature())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Self::Array(item) => format!("{}[]", item.type_signature()),
            Self::FixedArray(item, size) => format!("{}[{size}]", item.type_signature()),
            Self::Cell => "cell".to_string(),
            Self::Map(key, value) => format!(
                "map({},{})",
                key.type_signature(),
                value.type_signature()
            ),
            Self::Address => "address".to_string(),
            Self::Bytes => "bytes".to_string(),
            Self::FixedBytes(size) => format!("fixedbytes{size}"),
            Self::Gram => "gram".to_string(),
            Self::Time => "time".to_string(),
            Self::Expire => "expire".to_string(),
            Self::PublicKey => "pubkey".to_string(),
        }
    }

    /// Bit width of fixed-width primitives; `None` for everything else.
    pub fn bit_len(&self) -> Option<usize> {
        match self {
            Self::Uint(size) | Self::Int(size) => Some(*size),
            Self::Bool => Some(1),
            _ => None,
        }
    }

    /// Width of this type when used as a dictionary key.
    ///
    /// Only integers, addresses and fixed byte strings have one.
    pub(crate) fn map_key_len(&self) -> Option<usize> {
        match self {
            Self::Uint(size) | Self::Int(size) => Some(*size),
            Self::Address => Some(MsgAddress::BITS),
            Self::FixedBytes(size) => Some(8 * size),
            _ => None,
        }
    }

    /// Default value used when a header parameter is not supplied.
    ///
    /// Defined for primitives (and tuples thereof) only.
    pub fn default_value(&self, clock: &dyn Clock) -> Option<Value> {
        Some(match self {
            Self::Uint(size) => Value::Uint {
                size: *size,
                value: BigUint::from(0u8),
            },
            Self::Int(size) => Value::Int {
                size: *size,
                value: BigInt::from(0),
            },
            Self::Bool => Value::Bool(false),
            Self::Tuple(items) => Value::Tuple(
                items
                    .iter()
                    .map(|item| item.kind.default_value(clock))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Array(..) | Self::FixedArray(..) | Self::Map(..) => return None,
            Self::Cell => Value::Cell(Arc::new(Cell::default())),
            Self::Address => Value::Address(MsgAddress::NULL),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::FixedBytes(size) => Value::FixedBytes(vec![0; *size]),
            Self::Gram => Value::Gram(0),
            Self::Time => Value::Time(clock.now_ms()),
            Self::Expire => Value::Expire(u32::MAX),
            Self::PublicKey => Value::PublicKey(None),
        })
    }
}

impl Display for ParamType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_signature())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::clock::ConstClock;

    use super::*;

    #[rstest]
    #[case(ParamType::Uint(256), "uint256")]
    #[case(ParamType::Int(8), "int8")]
    #[case(ParamType::Bool, "bool")]
    #[case(ParamType::Tuple(vec![]), "()")]
    #[case(
        ParamType::Tuple(vec![
            Param::new("a", ParamType::Uint(8)),
            Param::new("b", ParamType::Bool),
        ]),
        "(uint8,bool)"
    )]
    #[case(ParamType::Array(ParamType::Uint(8).into()), "uint8[]")]
    #[case(
        ParamType::FixedArray(ParamType::Array(ParamType::Uint(8).into()).into(), 4),
        "uint8[][4]"
    )]
    #[case(ParamType::Cell, "cell")]
    #[case(
        ParamType::Map(ParamType::Int(16).into(), ParamType::Gram.into()),
        "map(int16,gram)"
    )]
    #[case(ParamType::Address, "address")]
    #[case(ParamType::Bytes, "bytes")]
    #[case(ParamType::FixedBytes(32), "fixedbytes32")]
    #[case(ParamType::Gram, "gram")]
    #[case(ParamType::Time, "time")]
    #[case(ParamType::Expire, "expire")]
    #[case(ParamType::PublicKey, "pubkey")]
    fn signatures(#[case] kind: ParamType, #[case] expected: &str) {
        assert_eq!(kind.type_signature(), expected);
    }

    #[test]
    fn signature_ignores_names() {
        let a = ParamType::Tuple(vec![Param::new("first", ParamType::Uint(8))]);
        let b = ParamType::Tuple(vec![Param::new("renamed", ParamType::Uint(8))]);
        assert_eq!(a.type_signature(), b.type_signature());
    }

    #[test]
    fn bit_lens() {
        assert_eq!(ParamType::Uint(77).bit_len(), Some(77));
        assert_eq!(ParamType::Bool.bit_len(), Some(1));
        assert_eq!(ParamType::Gram.bit_len(), None);
        assert_eq!(ParamType::Tuple(vec![]).bit_len(), None);
    }

    #[test]
    fn defaults() {
        let clock = ConstClock(1_700_000_000_000);
        assert_eq!(
            ParamType::Time.default_value(&clock),
            Some(Value::Time(1_700_000_000_000)),
        );
        assert_eq!(
            ParamType::Expire.default_value(&clock),
            Some(Value::Expire(u32::MAX)),
        );
        assert_eq!(
            ParamType::PublicKey.default_value(&clock),
            Some(Value::PublicKey(None)),
        );
        assert_eq!(
            ParamType::Array(ParamType::Bool.into()).default_value(&clock),
            None,
        );
        // a tuple is defaultable iff all of its elements are
        assert!(
            ParamType::Tuple(vec![Param::new("x", ParamType::Uint(8))])
                .default_value(&clock)
                .is_some()
        );
        assert_eq!(
            ParamType::Tuple(vec![Param::new("x", ParamType::Map(
                ParamType::Uint(8).into(),
                ParamType::Bool.into(),
            ))])
            .default_value(&clock),
            None,
        );
    }
}
