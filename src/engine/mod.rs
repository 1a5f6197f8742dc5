//! The reconciliation engine: pure matching over the three sources plus the
//! build/rematch passes that persist the results.

pub mod builder;
pub mod matcher;

pub use builder::{BuildStats, LookupBuilder, RematchStats, StoreInfo, LOOKUP_VERSION};
pub use matcher::{match_trip, ActionIndex, ActionMatch, MatchTolerances};
