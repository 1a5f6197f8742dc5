pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod sync;

pub use config::Config;
pub use datasource::{GameApi, GameApiError, MockGameApi, ShippingApiClient};
pub use db::{init_db, Repository};
pub use domain::{
    ActionKind, ActionLogEntry, DepartureRecord, EntryValue, LookupEntry, TimeMs, TimeSec,
    Transaction, TxContext, UserId, VesselId,
};
pub use engine::{LookupBuilder, MatchTolerances, LOOKUP_VERSION};
pub use error::AppError;
pub use sync::{SyncManager, TransactionSyncer};
