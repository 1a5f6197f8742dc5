//! Matching ledger transactions against the action log and trip history.
//!
//! Pure functions over in-memory slices; the build pass owns all IO. Every
//! strategy gates on amount first, then tie-breaks by smallest absolute time
//! difference. Amount closeness never beats time closeness.

use crate::domain::{
    ActionLogEntry, DepartedVessel, DepartureRecord, MatchStrategy, Transaction, TxContext,
};
use std::collections::HashMap;

/// Matching windows and tolerances, all wired from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTolerances {
    /// Window for departure-batch matching, ms.
    pub departure_window_ms: i64,
    /// Window for fee contexts that borrow the departure log, ms.
    pub fee_window_ms: i64,
    /// Window for plain amount matching, ms.
    pub amount_window_ms: i64,
    /// Relative slack for the tolerant amount fallback, percent.
    pub amount_slack_pct: i64,
    /// Window for trip-history matching, ms.
    pub trip_window_ms: i64,
    /// Cost per guard; the guard-fee transaction carries no headcount.
    pub guard_rate: i64,
}

impl Default for MatchTolerances {
    fn default() -> Self {
        Self {
            departure_window_ms: 120_000,
            fee_window_ms: 120_000,
            amount_window_ms: 600_000,
            amount_slack_pct: 10,
            trip_window_ms: 600_000,
            guard_rate: 1500,
        }
    }
}

/// An action-log match. For departure contexts the specific per-vessel
/// sub-record that passed the amount gate comes along.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMatch<'a> {
    pub entry: &'a ActionLogEntry,
    pub vessel: Option<&'a DepartedVessel>,
}

/// Action-log entries bucketed by the context their kind produces.
#[derive(Debug)]
pub struct ActionIndex<'a> {
    by_context: HashMap<TxContext, Vec<&'a ActionLogEntry>>,
}

impl<'a> ActionIndex<'a> {
    pub fn new(entries: &'a [ActionLogEntry]) -> Self {
        let mut by_context: HashMap<TxContext, Vec<&ActionLogEntry>> = HashMap::new();
        for entry in entries {
            if let Some(context) = entry.kind.context_bucket() {
                by_context.entry(context).or_default().push(entry);
            }
        }
        Self { by_context }
    }

    fn bucket(&self, context: &TxContext) -> &[&'a ActionLogEntry] {
        self.by_context
            .get(context)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Find the best action-log match for a transaction under the strategy
    /// its context classifies to.
    pub fn match_transaction(
        &self,
        tx: &Transaction,
        strategy: MatchStrategy,
        tolerances: &MatchTolerances,
    ) -> Option<ActionMatch<'a>> {
        match strategy {
            MatchStrategy::DepartureVessels => self.match_departure_vessel(tx, tolerances, |v| {
                v.gross() == tx.cash.abs()
            }),
            MatchStrategy::BorrowedHarborFee => self.match_departure_vessel(tx, tolerances, |v| {
                v.harbor_fee.abs() == tx.cash.abs()
            }),
            MatchStrategy::BorrowedGuardFee => self.match_departure_vessel(tx, tolerances, |v| {
                v.guards > 0 && v.guards * tolerances.guard_rate == tx.cash.abs()
            }),
            MatchStrategy::NearestDeparture => self.match_nearest_departure(tx, tolerances),
            MatchStrategy::Amount => self.match_by_amount(tx, tolerances),
        }
    }

    /// Scan all per-vessel sub-records of departure logs, keep the ones that
    /// pass `accept`, and pick the one whose log is nearest in time.
    fn match_departure_vessel(
        &self,
        tx: &Transaction,
        tolerances: &MatchTolerances,
        accept: impl Fn(&DepartedVessel) -> bool,
    ) -> Option<ActionMatch<'a>> {
        let window = match tx.context {
            TxContext::VesselsDeparted => tolerances.departure_window_ms,
            _ => tolerances.fee_window_ms,
        };
        let tx_ms = tx.time.as_ms();

        let mut best: Option<(i64, ActionMatch<'a>)> = None;
        for entry in self.bucket(&TxContext::VesselsDeparted) {
            let dt = entry.timestamp.delta(tx_ms);
            if dt > window {
                continue;
            }
            for vessel in entry.details.vessels() {
                if !accept(vessel) {
                    continue;
                }
                if best.as_ref().map(|(b, _)| dt < *b).unwrap_or(true) {
                    best = Some((
                        dt,
                        ActionMatch {
                            entry,
                            vessel: Some(vessel),
                        },
                    ));
                }
            }
        }
        best.map(|(_, m)| m)
    }

    /// Route fees carry no per-vessel amount to check; the nearest departure
    /// log in the window stands in.
    fn match_nearest_departure(
        &self,
        tx: &Transaction,
        tolerances: &MatchTolerances,
    ) -> Option<ActionMatch<'a>> {
        let tx_ms = tx.time.as_ms();

        let mut best: Option<(i64, &'a ActionLogEntry)> = None;
        for entry in self.bucket(&TxContext::VesselsDeparted) {
            let dt = entry.timestamp.delta(tx_ms);
            if dt > tolerances.fee_window_ms {
                continue;
            }
            if best.as_ref().map(|(b, _)| dt < *b).unwrap_or(true) {
                best = Some((dt, entry));
            }
        }
        best.map(|(_, entry)| ActionMatch {
            entry,
            vessel: None,
        })
    }

    /// Exact amount equality first; only if nothing matches exactly, a
    /// second pass with relative slack. Entries with no recorded amount
    /// survive the second pass unconditionally and match by time alone.
    fn match_by_amount(
        &self,
        tx: &Transaction,
        tolerances: &MatchTolerances,
    ) -> Option<ActionMatch<'a>> {
        let tx_ms = tx.time.as_ms();
        let target = tx.cash.abs();

        let in_window: Vec<(i64, &'a ActionLogEntry)> = self
            .bucket(&tx.context)
            .iter()
            .filter_map(|entry| {
                let dt = entry.timestamp.delta(tx_ms);
                (dt <= tolerances.amount_window_ms).then_some((dt, *entry))
            })
            .collect();

        let exact = in_window
            .iter()
            .filter(|(_, entry)| entry.details.amount() == Some(target))
            .min_by_key(|(dt, _)| *dt);
        if let Some((_, entry)) = exact {
            return Some(ActionMatch {
                entry,
                vessel: None,
            });
        }

        in_window
            .iter()
            .filter(|(_, entry)| match entry.details.amount() {
                Some(amount) => within_slack(amount, target, tolerances.amount_slack_pct),
                None => true,
            })
            .min_by_key(|(dt, _)| *dt)
            .map(|(_, entry)| ActionMatch {
                entry,
                vessel: None,
            })
    }
}

fn within_slack(amount: i64, target: i64, slack_pct: i64) -> bool {
    (amount - target).abs() * 100 <= target.abs() * slack_pct
}

/// Find the trip-history record backing a departure-related transaction.
///
/// Precedence: vessel-id equality when the matched action vessel carries an
/// id, the action vessel's net income on legacy rows without one, and the
/// caller-computed expected net when there is no action match at all. The
/// calculation fallback applies only to the departure context itself.
pub fn match_trip<'a>(
    tx: &Transaction,
    action_vessel: Option<&DepartedVessel>,
    expected_net: Option<i64>,
    trips: &'a [DepartureRecord],
    tolerances: &MatchTolerances,
) -> Option<&'a DepartureRecord> {
    let tx_ms = tx.time.as_ms();

    let in_window = |trip: &&DepartureRecord| trip.timestamp.delta(tx_ms) <= tolerances.trip_window_ms;
    let nearest = |iter: &mut dyn Iterator<Item = &'a DepartureRecord>| {
        iter.min_by_key(|trip| trip.timestamp.delta(tx_ms))
    };

    match action_vessel {
        Some(vessel) => {
            if let Some(vessel_id) = vessel.vessel_id {
                nearest(
                    &mut trips
                        .iter()
                        .filter(in_window)
                        .filter(|trip| trip.vessel_id == vessel_id),
                )
            } else {
                // Legacy action rows: the net income is the only handle.
                let income = vessel.income;
                nearest(
                    &mut trips
                        .iter()
                        .filter(in_window)
                        .filter(|trip| trip.income == income),
                )
            }
        }
        None => {
            if tx.context != TxContext::VesselsDeparted {
                return None;
            }
            let expected = expected_net?;

            let exact = nearest(
                &mut trips
                    .iter()
                    .filter(in_window)
                    .filter(|trip| trip.income == expected),
            );
            if exact.is_some() {
                return exact;
            }
            // Accept a 1% discrepancy; the harbor-fee transaction the
            // expectation was derived from rounds independently.
            nearest(
                &mut trips
                    .iter()
                    .filter(in_window)
                    .filter(|trip| within_slack(trip.income, expected, 1)),
            )
        }
    }
}
