//! Action log entry: a record of one action this system performed.
//!
//! The autopilot (or the user, through the UI glue) writes one entry per
//! completed action. The reconciliation engine reads these as an upstream
//! feed; it never writes them.

use crate::domain::{TimeMs, TxContext, VesselId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of action produced a log entry.
///
/// Automatic and manual variants of the same operation are distinct kinds
/// but map to the same reconciliation context bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    AutoDepart,
    ManualDepart,
    AutoFuel,
    ManualFuel,
    AutoRepair,
    ManualRepair,
    Other(String),
}

impl ActionKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "Auto-Depart" => ActionKind::AutoDepart,
            "Manual Depart" => ActionKind::ManualDepart,
            "Auto-Fuel" => ActionKind::AutoFuel,
            "Manual Fuel" => ActionKind::ManualFuel,
            "Auto-Repair" => ActionKind::AutoRepair,
            "Manual Repair" => ActionKind::ManualRepair,
            other => ActionKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::AutoDepart => "Auto-Depart",
            ActionKind::ManualDepart => "Manual Depart",
            ActionKind::AutoFuel => "Auto-Fuel",
            ActionKind::ManualFuel => "Manual Fuel",
            ActionKind::AutoRepair => "Auto-Repair",
            ActionKind::ManualRepair => "Manual Repair",
            ActionKind::Other(s) => s,
        }
    }

    /// The transaction context this kind of action produces, if any.
    /// This is what the engine buckets the log by.
    pub fn context_bucket(&self) -> Option<TxContext> {
        match self {
            ActionKind::AutoDepart | ActionKind::ManualDepart => {
                Some(TxContext::VesselsDeparted)
            }
            ActionKind::AutoFuel | ActionKind::ManualFuel => Some(TxContext::FuelPurchased),
            ActionKind::AutoRepair | ActionKind::ManualRepair => {
                Some(TxContext::VesselRepaired)
            }
            ActionKind::Other(_) => None,
        }
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        ActionKind::parse(&s)
    }
}

impl From<ActionKind> for String {
    fn from(k: ActionKind) -> Self {
        k.as_str().to_string()
    }
}

/// Outcome of the logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Success,
    Error,
    Warning,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "SUCCESS",
            ActionStatus::Error => "ERROR",
            ActionStatus::Warning => "WARNING",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => ActionStatus::Success,
            "ERROR" => ActionStatus::Error,
            _ => ActionStatus::Warning,
        }
    }
}

/// Amounts split by who triggered them. Some payloads carry only the flat
/// total; `AmountField` absorbs both shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub total: i64,
    pub auto: i64,
    pub manual: i64,
}

/// The shape-shifting cost payload: older entries wrote a bare number,
/// newer ones a `{total, auto, manual}` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Split(CategoryAmount),
    Flat(i64),
}

impl AmountField {
    /// Uniform accessor regardless of stored shape.
    pub fn value_of(&self) -> CategoryAmount {
        match *self {
            AmountField::Flat(total) => CategoryAmount {
                total,
                auto: 0,
                manual: 0,
            },
            AmountField::Split(split) => split,
        }
    }

    pub fn total(&self) -> i64 {
        self.value_of().total
    }
}

/// One vessel's share of a batch departure, embedded in the log details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartedVessel {
    /// Absent on legacy rows written before vessel ids were recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_id: Option<VesselId>,
    pub vessel_name: String,
    pub origin: String,
    pub destination: String,
    pub distance: f64,
    pub fuel_used: f64,
    /// Net trip income, harbor fee already excluded.
    pub income: i64,
    /// Recorded as a positive magnitude.
    pub harbor_fee: i64,
    #[serde(default)]
    pub guards: i64,
    #[serde(default)]
    pub contribution: i64,
}

impl DepartedVessel {
    /// Gross amount the ledger books for this vessel's departure.
    pub fn gross(&self) -> i64 {
        self.income + self.harbor_fee.abs()
    }
}

/// Structured details payload, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ActionDetails {
    /// Multi-vessel departure batch.
    Departure { vessels: Vec<DepartedVessel> },
    /// A purchase-style action (fuel, repair, vessel trade).
    Purchase { cost: AmountField },
    /// Legacy rows; `None` means amount unknown, match by time only.
    Plain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
    },
}

impl ActionDetails {
    /// The single amount this entry represents, when it has one.
    pub fn amount(&self) -> Option<i64> {
        match self {
            ActionDetails::Departure { .. } => None,
            ActionDetails::Purchase { cost } => Some(cost.total()),
            ActionDetails::Plain { amount } => *amount,
        }
    }

    pub fn vessels(&self) -> &[DepartedVessel] {
        match self {
            ActionDetails::Departure { vessels } => vessels,
            _ => &[],
        }
    }
}

/// One action-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    /// Milliseconds since epoch.
    pub timestamp: TimeMs,
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub summary: String,
    pub details: ActionDetails,
}

impl ActionLogEntry {
    pub fn new(
        timestamp: TimeMs,
        kind: ActionKind,
        status: ActionStatus,
        summary: impl Into<String>,
        details: ActionDetails,
    ) -> Self {
        ActionLogEntry {
            id: Uuid::new_v4(),
            timestamp,
            kind,
            status,
            summary: summary.into(),
            details,
        }
    }
}
