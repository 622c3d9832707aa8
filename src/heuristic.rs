use crate::calculator::TransitCalculator;
use crate::network::{StopIndex, Timestamp};
use crate::request::{Profile, RaptorRequest};

/// Which heuristic searches run ahead of the main search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeuristicsToRun {
    pub forward: bool,
    pub reverse: bool,
}

impl HeuristicsToRun {
    pub const NONE: HeuristicsToRun = HeuristicsToRun { forward: false, reverse: false };
    pub const FORWARD: HeuristicsToRun = HeuristicsToRun { forward: true, reverse: false };
    pub const REVERSE: HeuristicsToRun = HeuristicsToRun { forward: false, reverse: true };
}

pub fn resolve_heuristics_to_run(request: &RaptorRequest) -> HeuristicsToRun {
    let params = &request.search_params;
    resolve(
        request.profile,
        request.use_destination_pruning(),
        params.is_earliest_departure_time_set(),
        params.is_latest_arrival_time_set(),
        params.is_search_window_set(),
    )
}

fn resolve(profile: Profile, destination_pruning: bool, edt: bool, lat: bool, window: bool) -> HeuristicsToRun {
    if !profile.is_multi_criteria() {
        return HeuristicsToRun::NONE;
    }
    if destination_pruning {
        return HeuristicsToRun::REVERSE;
    }
    match (edt, lat, window) {
        (true, false, false) => HeuristicsToRun::FORWARD,
        (false, true, false) => HeuristicsToRun::REVERSE,
        _ => HeuristicsToRun::NONE,
    }
}

/// The best time and fewest rides found for the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationBound {
    pub time: Timestamp,
    pub rides: u8,
}

/// Per-stop bounds from a single-iteration search without transfer slack.
///
/// In a reverse search the time of a stop is the latest departure from it that still reaches
/// the destination in time, and the rounds are the fewest rides from it to the destination.
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub(crate) direction: TransitCalculator,
    pub(crate) origin_time: Timestamp,
    pub(crate) best_times: Vec<Timestamp>,
    pub(crate) best_rounds: Vec<u8>,
    pub(crate) destination: Option<DestinationBound>,
}

impl Heuristics {
    pub fn direction(&self) -> TransitCalculator {
        self.direction
    }

    pub fn is_reached(&self, stop: StopIndex) -> bool {
        self.best_rounds.get(stop as usize).is_some_and(|&rounds| rounds != u8::MAX)
    }

    pub fn best_time(&self, stop: StopIndex) -> Option<Timestamp> {
        self.is_reached(stop).then(|| self.best_times[stop as usize])
    }

    pub fn min_rides(&self, stop: StopIndex) -> Option<u8> {
        self.is_reached(stop).then(|| self.best_rounds[stop as usize])
    }

    pub fn destination(&self) -> Option<DestinationBound> {
        self.destination
    }

    pub fn is_destination_reached(&self) -> bool {
        self.destination.is_some()
    }

    /// Time between the origin time of the search and the best destination time.
    pub fn min_travel_duration(&self) -> Option<Timestamp> {
        self.destination.map(|dest| self.direction.duration(self.origin_time, dest.time))
    }
}
