//! Transaction context taxonomy and its static classification table.
//!
//! The game tags every ledger transaction with a context string. The
//! reconciliation engine keys everything off that tag: which entry type and
//! value a ledger row gets, and which matching strategy applies when
//! searching the action log. Unknown tags are preserved as `Unmapped` so an
//! unclassified context is a visible, testable case rather than a silent
//! default.

use serde::{Deserialize, Serialize};

/// Economic event kind, parsed from the game's context tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxContext {
    VesselsDeparted,
    HarborFeeOnDepart,
    GuardFeeOnDepart,
    RouteFeePaid,
    FuelPurchased,
    VesselRepaired,
    VesselPurchased,
    VesselSold,
    Unmapped(String),
}

impl TxContext {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "vessels_departed" => TxContext::VesselsDeparted,
            "harbor_fee_on_depart" => TxContext::HarborFeeOnDepart,
            "guard_fee_on_depart" => TxContext::GuardFeeOnDepart,
            "route_fee_paid" => TxContext::RouteFeePaid,
            "fuel_purchased" => TxContext::FuelPurchased,
            "vessel_repaired" => TxContext::VesselRepaired,
            "vessel_purchased" => TxContext::VesselPurchased,
            "vessel_sold" => TxContext::VesselSold,
            other => TxContext::Unmapped(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TxContext::VesselsDeparted => "vessels_departed",
            TxContext::HarborFeeOnDepart => "harbor_fee_on_depart",
            TxContext::GuardFeeOnDepart => "guard_fee_on_depart",
            TxContext::RouteFeePaid => "route_fee_paid",
            TxContext::FuelPurchased => "fuel_purchased",
            TxContext::VesselRepaired => "vessel_repaired",
            TxContext::VesselPurchased => "vessel_purchased",
            TxContext::VesselSold => "vessel_sold",
            TxContext::Unmapped(s) => s,
        }
    }

    /// Contexts caused by a departure batch. These are the ones eligible for
    /// a trip-history link, and the ones whose action match lives inside a
    /// departure log rather than a log of their own.
    pub fn departure_related(&self) -> bool {
        matches!(
            self,
            TxContext::VesselsDeparted
                | TxContext::HarborFeeOnDepart
                | TxContext::GuardFeeOnDepart
                | TxContext::RouteFeePaid
        )
    }

    /// Classify this context into ledger type, value and matching strategy.
    ///
    /// Unmapped contexts fall back to the raw tag as the entry type and a
    /// sign-based value guess for the given cash amount.
    pub fn classify(&self, cash: i64) -> Classification {
        let (entry_type, value, strategy) = match self {
            TxContext::VesselsDeparted => {
                ("Departure", EntryValue::Income, MatchStrategy::DepartureVessels)
            }
            TxContext::HarborFeeOnDepart => {
                ("Harbor fee", EntryValue::Expense, MatchStrategy::BorrowedHarborFee)
            }
            TxContext::GuardFeeOnDepart => {
                ("Guard fee", EntryValue::Expense, MatchStrategy::BorrowedGuardFee)
            }
            TxContext::RouteFeePaid => {
                ("Route fee", EntryValue::Expense, MatchStrategy::NearestDeparture)
            }
            TxContext::FuelPurchased => ("Fuel", EntryValue::Expense, MatchStrategy::Amount),
            TxContext::VesselRepaired => ("Repair", EntryValue::Expense, MatchStrategy::Amount),
            TxContext::VesselPurchased => {
                ("Vessel purchase", EntryValue::Expense, MatchStrategy::Amount)
            }
            TxContext::VesselSold => ("Vessel sale", EntryValue::Income, MatchStrategy::Amount),
            TxContext::Unmapped(tag) => {
                let value = if cash >= 0 {
                    EntryValue::Income
                } else {
                    EntryValue::Expense
                };
                return Classification {
                    entry_type: tag.clone(),
                    value,
                    strategy: MatchStrategy::Amount,
                };
            }
        };
        Classification {
            entry_type: entry_type.to_string(),
            value,
            strategy,
        }
    }
}

impl From<String> for TxContext {
    fn from(s: String) -> Self {
        TxContext::parse(&s)
    }
}

impl From<TxContext> for String {
    fn from(c: TxContext) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for TxContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a ledger entry counts toward income or expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryValue {
    Income,
    Expense,
}

impl EntryValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryValue::Income => "INCOME",
            EntryValue::Expense => "EXPENSE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "INCOME" => EntryValue::Income,
            _ => EntryValue::Expense,
        }
    }
}

/// How the action log is searched for a given context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Scan all per-vessel sub-records of departure logs; match on
    /// net income + |harbor fee| == |cash|.
    DepartureVessels,
    /// Borrow the departure log; match the vessel-level harbor fee.
    BorrowedHarborFee,
    /// Borrow the departure log; match guards x per-guard rate.
    BorrowedGuardFee,
    /// Nearest departure log in time, no amount to check against.
    NearestDeparture,
    /// Exact amount, then relative tolerance; unknown amounts by time only.
    Amount,
}

/// Result of classifying a context for a specific transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub entry_type: String,
    pub value: EntryValue,
    pub strategy: MatchStrategy,
}
