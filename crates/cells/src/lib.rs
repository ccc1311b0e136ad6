//! Cells, builders, slices and dictionaries for TVM-family blockchains.
//!
//! A [`Cell`] is an immutable node of up to 1023 bits of payload and up to
//! 4 references to other cells. [`CellBuilder`] is the write cursor that
//! finalizes into a cell, [`CellSlice`] the owned read cursor over one.
//! [`Dict`] implements the `HashmapE n X` hashmap-augmented-binary-tree
//! layout in both directions, and [`MsgAddress`] the standard
//! `addr_std$10` message address.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use tvm_cells::{Cell, CellResult};
//! # fn main() -> CellResult<()> {
//! let mut builder = Cell::builder();
//! builder.store_uint(0xDEAD_BEEF, 32)?;
//! let cell = Arc::new(builder.into_cell());
//!
//! let mut slice = cell.slice();
//! assert_eq!(slice.load_uint(32)?, 0xDEAD_BEEF);
//! # Ok(())
//! # }
//! ```
mod address;
mod builder;
mod cell;
mod dict;
mod error;
mod slice;

pub use self::{address::*, builder::*, cell::*, dict::*, error::*, slice::*};

pub use bitvec;
pub use either;
