//! ABI codec for TVM-family blockchains.
//!
//! The codec translates between typed schemas ([`Param`]/[`ParamType`])
//! with their payloads ([`Value`]) and the bit-packed cell chains carried
//! by the VM, assembles and decodes function-call message bodies under
//! ABI version 2, derives CRC32-based selectors from canonical
//! signatures, and adapts typed values onto a VM stack for `get`-methods.
//!
//! ## Encoding a call
//!
//! ```rust
//! # use std::collections::HashMap;
//! # use tvm_abi::{cells::MsgAddress, AbiResult, Function, Param, ParamType, SystemClock, Value};
//! # fn main() -> AbiResult<()> {
//! let transfer = Function::new(
//!     "transfer",
//!     vec![
//!         Param::new("time", ParamType::Time),
//!         Param::new("expire", ParamType::Expire),
//!     ],
//!     vec![
//!         Param::new("dest", ParamType::Address),
//!         Param::new("amount", ParamType::Uint(128)),
//!     ],
//!     vec![],
//! );
//!
//! let body = transfer.encode_input(
//!     &SystemClock,
//!     &HashMap::new(), // header values fall back to their defaults
//!     &[
//!         Value::Address(MsgAddress::NULL),
//!         Value::uint(128, 5_000_000_000u64),
//!     ],
//!     true, // internal: no signature slot, no header
//!     None,
//! )?;
//!
//! let (_, inputs) = transfer.decode_params(&body, true)?;
//! assert_eq!(inputs[1], Value::uint(128, 5_000_000_000u64));
//! # Ok(())
//! # }
//! ```
mod account;
mod clock;
pub mod de;
mod error;
mod function;
mod param;
mod runner;
pub mod ser;
mod signer;
mod value;

pub use self::{
    account::*, clock::*, de::deserialize_value, error::*, function::*, param::*, runner::*,
    ser::{pack_into_chain, serialize_value}, signer::*, value::*,
};

pub use tvm_cells as cells;
