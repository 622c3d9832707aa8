use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::constrained::{
    ConstrainedTransfer, ConstrainedTransfersForPatterns, TransferForPattern, TransferForPatternByStopPos,
    TransferPoint,
};
use crate::network::{Network, RouteIndex, RoutePattern, StationIndex, TripId, TripSchedule};

/// Builds and caches the per-pattern index of constrained transfers.
#[derive(Debug, Default)]
pub struct TransferIndexGenerator {
    transfers: Vec<ConstrainedTransfer>,
    patterns: BTreeMap<RouteIndex, RoutePattern>,
    trips_by_pattern: HashMap<RouteIndex, HashSet<TripId>>,
    referenced_trips: HashSet<TripId>,
    stations: Vec<Option<StationIndex>>,
    cached: Option<Arc<ConstrainedTransfersForPatterns>>,
}

impl TransferIndexGenerator {
    pub fn new(
        transfers: Vec<ConstrainedTransfer>,
        patterns: impl IntoIterator<Item = (RoutePattern, Vec<TripId>)>,
    ) -> Self {
        let referenced_trips = transfers.iter().flat_map(|tx| [tx.from.trip(), tx.to.trip()]).flatten().collect();
        let mut generator = Self { transfers, referenced_trips, ..Self::default() };
        for (pattern, trips) in patterns {
            generator.trips_by_pattern.insert(pattern.index, trips.into_iter().collect());
            generator.patterns.insert(pattern.index, pattern);
        }
        generator
    }

    pub fn from_network<T: TripSchedule>(network: &Network<T>, transfers: Vec<ConstrainedTransfer>) -> Self {
        let patterns = network.routes.iter().map(|route| {
            let trips = route.timetable.trips().iter().map(TripSchedule::trip_id).collect();
            (route.pattern.clone(), trips)
        });
        Self::new(transfers, patterns).with_stations(network.stops.iter().map(|stop| stop.station).collect())
    }

    /// The station of each stop, indexed by stop.
    pub fn with_stations(mut self, stations: Vec<Option<StationIndex>>) -> Self {
        self.stations = stations;
        self.cached = None;
        self
    }

    /// Registers a trip added by a real-time update. The cached index is dropped if the pattern is
    /// new, or if the trip is referenced by a trip-specific transfer.
    pub fn add_realtime_trip(&mut self, pattern: &RoutePattern, trips: &[TripId]) {
        let mut invalidate = false;
        if !self.patterns.contains_key(&pattern.index) {
            self.patterns.insert(pattern.index, pattern.clone());
            invalidate = true;
        }
        let known = self.trips_by_pattern.entry(pattern.index).or_default();
        for trip in trips {
            if known.insert(*trip) && self.referenced_trips.contains(trip) {
                invalidate = true;
            }
        }
        if invalidate {
            log::debug!("Real-time trips on pattern {} invalidated the constrained transfer index.", pattern.index);
            self.cached = None;
        }
    }

    pub fn generate_transfers(&mut self) -> Arc<ConstrainedTransfersForPatterns> {
        if let Some(cached) = &self.cached {
            return Arc::clone(cached);
        }
        let index = Arc::new(self.build());
        self.cached = Some(Arc::clone(&index));
        index
    }

    fn build(&self) -> ConstrainedTransfersForPatterns {
        let size = self.patterns.keys().next_back().map_or(0, |&idx| idx as usize + 1);
        let mut to_stop: Vec<Option<TransferForPatternByStopPos>> = vec![None; size];
        let mut from_stop: Vec<Option<TransferForPatternByStopPos>> = vec![None; size];

        for (&pattern_idx, pattern) in &self.patterns {
            let p = pattern_idx as usize;
            let n = pattern.num_stops();
            for tx in &self.transfers {
                let specificity = tx.specificity();
                // A pattern is boarded at any position but the last, and alighted at any but the first.
                for pos in 0..n.saturating_sub(1) {
                    if self.applies(&tx.to, pattern, pos) {
                        to_stop[p].get_or_insert_with(Default::default).add(
                            pos,
                            TransferForPattern {
                                source: tx.from.clone(),
                                trip: tx.to.trip(),
                                constraint: tx.constraint,
                                specificity,
                            },
                        );
                    }
                }
                for pos in 1..n {
                    if self.applies(&tx.from, pattern, pos) {
                        from_stop[p].get_or_insert_with(Default::default).add(
                            pos,
                            TransferForPattern {
                                source: tx.to.clone(),
                                trip: tx.from.trip(),
                                constraint: tx.constraint,
                                specificity,
                            },
                        );
                    }
                }
            }
        }

        for index in to_stop.iter_mut().chain(from_stop.iter_mut()).flatten() {
            index.sort();
        }
        log::debug!(
            "Indexed {} constrained transfers over {} patterns.",
            self.transfers.len(),
            self.patterns.len()
        );
        ConstrainedTransfersForPatterns { to_stop, from_stop }
    }

    fn applies(&self, point: &TransferPoint, pattern: &RoutePattern, pos: usize) -> bool {
        let stop = pattern.stop(pos);
        let station = || self.stations.get(stop as usize).copied().flatten();
        match point {
            TransferPoint::Station(s) => station() == Some(*s),
            TransferPoint::Stop(s) => stop == *s,
            TransferPoint::RouteStation { line, station: s } => *pattern.line == **line && station() == Some(*s),
            TransferPoint::RouteStop { line, stop: s } => *pattern.line == **line && stop == *s,
            TransferPoint::Trip { trip, stop_pos } => {
                *stop_pos == pos && self.trips_by_pattern.get(&pattern.index).is_some_and(|trips| trips.contains(trip))
            }
        }
    }
}
