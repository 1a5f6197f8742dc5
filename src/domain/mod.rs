//! Domain types for the companion ledger.
//!
//! This module provides:
//! - Domain primitives: TimeSec, TimeMs, UserId, VesselId
//! - The transaction context taxonomy and its classification table
//! - The three source record shapes (transaction, action log, departure)
//! - The reconciled ledger entry with typed snapshot columns

pub mod action_log;
pub mod context;
pub mod departure;
pub mod lookup;
pub mod primitives;
pub mod transaction;

pub use action_log::{
    ActionDetails, ActionKind, ActionLogEntry, ActionStatus, AmountField, CategoryAmount,
    DepartedVessel,
};
pub use context::{Classification, EntryValue, MatchStrategy, TxContext};
pub use departure::{parse_history_timestamp, CargoBreakdown, CargoItem, DepartureRecord};
pub use lookup::{LookupEntry, TripSnapshot};
pub use primitives::{TimeMs, TimeSec, UserId, VesselId};
pub use transaction::Transaction;
