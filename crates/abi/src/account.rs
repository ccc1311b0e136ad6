use std::sync::Arc;

use strum::Display;
use tvm_cells::{Cell, MsgAddress};

/// Lifecycle state of an account snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AccountState {
    Empty,
    Uninit,
    Frozen,
    Active,
    #[default]
    Unknown,
}

/// Code and data cells needed to materialize a VM over an account.
#[derive(Debug, Clone, Default)]
pub struct AccountStateDetails {
    pub code: Option<Arc<Cell>>,
    pub data: Option<Arc<Cell>>,
}

/// Snapshot of an account as observed at `sync_time`.
#[derive(Debug, Clone)]
pub struct AccountStateInfo {
    pub workchain: i32,
    pub address_hash: [u8; 32],
    /// Unix time of the snapshot, milliseconds
    pub sync_time: u64,
    pub balance: u128,
    pub state: AccountState,
    pub last_transaction_lt: u64,
    pub last_transaction_hash: [u8; 32],
    pub details: AccountStateDetails,
}

impl AccountStateInfo {
    #[inline]
    pub fn address(&self) -> MsgAddress {
        MsgAddress {
            workchain_id: self.workchain,
            address: self.address_hash,
        }
    }
}
