//! Sync passes that pull the game API into the local store.

pub mod transactions;
pub mod vessel_history;

pub use transactions::{TransactionSyncer, TxSyncResult};
pub use vessel_history::{
    SyncError, SyncManager, SyncOptions, SyncOutcome, SyncProgress, SyncStatus,
};
