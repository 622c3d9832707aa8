use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::network::{RouteIndex, RouteTimeTable, StationIndex, StopIndex, Timestamp, TripId, TripIndex, TripSchedule};

/// What a constrained transfer guarantees or forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferConstraint {
    /// The departing trip waits for the arriving one.
    Guaranteed,
    /// The traveller stays in the vehicle, which continues as the next trip.
    StaySeated,
    MinTransferTime(Timestamp),
    NotAllowed,
}

impl TransferConstraint {
    /// Slack required between arrival and departure, or `None` if the transfer is forbidden.
    pub fn required_slack(&self) -> Option<Timestamp> {
        match self {
            TransferConstraint::Guaranteed | TransferConstraint::StaySeated => Some(0),
            TransferConstraint::MinTransferTime(slack) => Some(*slack),
            TransferConstraint::NotAllowed => None,
        }
    }

    pub fn is_not_allowed(&self) -> bool {
        matches!(self, TransferConstraint::NotAllowed)
    }
}

impl Display for TransferConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferConstraint::Guaranteed => write!(f, "guaranteed"),
            TransferConstraint::StaySeated => write!(f, "stay-seated"),
            TransferConstraint::MinTransferTime(slack) => write!(f, "min {slack}s"),
            TransferConstraint::NotAllowed => write!(f, "not-allowed"),
        }
    }
}

/// One end of a constrained transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferPoint {
    Station(StationIndex),
    Stop(StopIndex),
    RouteStation { line: Arc<str>, station: StationIndex },
    RouteStop { line: Arc<str>, stop: StopIndex },
    Trip { trip: TripId, stop_pos: usize },
}

impl TransferPoint {
    /// Higher is more specific. A trip point beats a route point, which beats a stop or station.
    pub fn specificity(&self) -> u8 {
        match self {
            TransferPoint::Station(_) => 0,
            TransferPoint::Stop(_) => 1,
            TransferPoint::RouteStation { .. } => 2,
            TransferPoint::RouteStop { .. } => 3,
            TransferPoint::Trip { .. } => 4,
        }
    }

    pub fn trip(&self) -> Option<TripId> {
        match self {
            TransferPoint::Trip { trip, .. } => Some(*trip),
            _ => None,
        }
    }

    pub(crate) fn matches(&self, ctx: &PointContext<'_>) -> bool {
        match self {
            TransferPoint::Station(station) => ctx.station == Some(*station),
            TransferPoint::Stop(stop) => ctx.stop == *stop,
            TransferPoint::RouteStation { line, station } => **line == *ctx.line && ctx.station == Some(*station),
            TransferPoint::RouteStop { line, stop } => **line == *ctx.line && ctx.stop == *stop,
            TransferPoint::Trip { trip, stop_pos } => ctx.trip == *trip && ctx.stop_pos == *stop_pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstrainedTransfer {
    pub from: TransferPoint,
    pub to: TransferPoint,
    pub constraint: TransferConstraint,
}

impl ConstrainedTransfer {
    pub fn new(from: TransferPoint, to: TransferPoint, constraint: TransferConstraint) -> Self {
        Self { from, to, constraint }
    }

    pub fn specificity(&self) -> u8 {
        self.from.specificity() + self.to.specificity()
    }
}

/// Where a ride touches a stop: the stop, its station, the line and the trip.
#[derive(Debug, Clone)]
pub(crate) struct PointContext<'a> {
    pub stop: StopIndex,
    pub station: Option<StationIndex>,
    pub line: &'a str,
    pub trip: TripId,
    pub stop_pos: usize,
}

/// A constrained transfer seen from one pattern and stop position. `source` is the other end
/// of the transfer, `trip` restricts which trip of this pattern it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferForPattern {
    pub source: TransferPoint,
    pub trip: Option<TripId>,
    pub constraint: TransferConstraint,
    pub specificity: u8,
}

impl TransferForPattern {
    pub fn applies_to_trip(&self, trip: TripId) -> bool {
        self.trip.is_none_or(|id| id == trip)
    }
}

/// Constrained transfers of one pattern, by stop position, most specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferForPatternByStopPos {
    by_pos: BTreeMap<usize, Vec<TransferForPattern>>,
}

impl TransferForPatternByStopPos {
    pub fn get(&self, stop_pos: usize) -> &[TransferForPattern] {
        self.by_pos.get(&stop_pos).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, stop_pos: usize) -> bool {
        self.by_pos.contains_key(&stop_pos)
    }

    pub fn is_empty(&self) -> bool {
        self.by_pos.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_pos.keys().copied()
    }

    pub(crate) fn add(&mut self, stop_pos: usize, transfer: TransferForPattern) {
        self.by_pos.entry(stop_pos).or_default().push(transfer);
    }

    pub(crate) fn sort(&mut self) {
        for transfers in self.by_pos.values_mut() {
            transfers.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        }
    }
}

/// Constrained transfers indexed by pattern, for boarding (`to_stop`) and alighting (`from_stop`).
#[derive(Debug, Clone, Default)]
pub struct ConstrainedTransfersForPatterns {
    pub(crate) to_stop: Vec<Option<TransferForPatternByStopPos>>,
    pub(crate) from_stop: Vec<Option<TransferForPatternByStopPos>>,
}

impl ConstrainedTransfersForPatterns {
    /// Transfers constraining the boarding of a pattern, keyed by the boarding position.
    pub fn to_stop(&self, pattern: RouteIndex) -> Option<&TransferForPatternByStopPos> {
        self.to_stop.get(pattern as usize).and_then(Option::as_ref)
    }

    /// Transfers constraining the alighting from a pattern, keyed by the alighting position.
    pub fn from_stop(&self, pattern: RouteIndex) -> Option<&TransferForPatternByStopPos> {
        self.from_stop.get(pattern as usize).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.to_stop.iter().chain(&self.from_stop).all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstrainedBoarding {
    /// No transfer at the position matches the arrival, board the regular way.
    NoConstraint,
    Board { trip: TripIndex, constraint: Option<TransferConstraint> },
    /// Constraints apply, but no trip can be boarded.
    Blocked,
}

/// Finds the first trip that can be boarded at `stop_pos` after arriving from `source` at
/// `arrival_time`. Trips without a matching constraint need `regular_slack`.
pub(crate) fn find_constrained_boarding<T: TripSchedule>(
    timetable: &RouteTimeTable<T>,
    stop_pos: usize,
    transfers: &[TransferForPattern],
    source: &PointContext<'_>,
    arrival_time: Timestamp,
    regular_slack: Timestamp,
) -> ConstrainedBoarding {
    let candidates: Vec<&TransferForPattern> = transfers.iter().filter(|tx| tx.source.matches(source)).collect();
    if candidates.is_empty() {
        return ConstrainedBoarding::NoConstraint;
    }

    let Some(first) = timetable.find_trip_departing_at_or_after(stop_pos, arrival_time, timetable.num_trips()) else {
        return ConstrainedBoarding::Blocked;
    };

    for (trip_idx, trip) in timetable.trips().iter().enumerate().skip(first as usize) {
        let departure = trip.departure(stop_pos);
        // Candidates are sorted by specificity, so the first match wins.
        match candidates.iter().find(|tx| tx.applies_to_trip(trip.trip_id())) {
            None => {
                if departure >= arrival_time + regular_slack {
                    return ConstrainedBoarding::Board { trip: trip_idx as TripIndex, constraint: None };
                }
            }
            Some(tx) => {
                if let Some(slack) = tx.constraint.required_slack() {
                    if departure >= arrival_time + slack {
                        return ConstrainedBoarding::Board {
                            trip: trip_idx as TripIndex,
                            constraint: Some(tx.constraint),
                        };
                    }
                }
            }
        }
    }
    ConstrainedBoarding::Blocked
}
