use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

// Timestamp is seconds since midnight of the service day. It may be negative or exceed 24h.
pub type Timestamp = i32;
pub type StopIndex = u32;
pub type RouteIndex = u32;
pub type TripIndex = u32;
pub type TripId = u32;
pub type StationIndex = u32;
pub type PathfindingCost = i32;

/// The capability the search needs from a host trip schedule.
pub trait TripSchedule {
    fn arrival(&self, stop_pos: usize) -> Timestamp;
    fn departure(&self, stop_pos: usize) -> Timestamp;
    fn trip_id(&self) -> TripId;
    fn num_stops(&self) -> usize;

    /// Key the route timetable is sorted on.
    fn sort_key(&self) -> Timestamp {
        self.departure(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripTimes {
    pub id: TripId,
    pub arrivals: Vec<Timestamp>,
    pub departures: Vec<Timestamp>,
}

impl TripTimes {
    pub fn new(id: TripId, arrivals: Vec<Timestamp>, departures: Vec<Timestamp>) -> Self {
        debug_assert_eq!(arrivals.len(), departures.len());
        Self { id, arrivals, departures }
    }

    // Arrival equals departure at every stop.
    pub fn from_times(id: TripId, times: &[Timestamp]) -> Self {
        Self::new(id, times.to_vec(), times.to_vec())
    }
}

impl TripSchedule for TripTimes {
    fn arrival(&self, stop_pos: usize) -> Timestamp {
        self.arrivals[stop_pos]
    }

    fn departure(&self, stop_pos: usize) -> Timestamp {
        self.departures[stop_pos]
    }

    fn trip_id(&self) -> TripId {
        self.id
    }

    fn num_stops(&self) -> usize {
        self.arrivals.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    pub index: RouteIndex,
    pub line: Arc<str>,
    pub stops: Vec<StopIndex>,
}

impl RoutePattern {
    pub fn new(index: RouteIndex, line: &str, stops: Vec<StopIndex>) -> Self {
        Self { index, line: Arc::from(line), stops }
    }

    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }

    pub fn stop(&self, stop_pos: usize) -> StopIndex {
        self.stops[stop_pos]
    }

    pub fn find_stop_position_after(&self, start: usize, stop: StopIndex) -> Option<usize> {
        self.stops.iter().enumerate().skip(start).find_map(|(pos, &s)| (s == stop).then_some(pos))
    }
}

/// Trips of one pattern, ordered by their sort key. Trips must not overtake each other.
#[derive(Debug, Clone)]
pub struct RouteTimeTable<T> {
    trips: Vec<T>,
}

impl<T: TripSchedule> RouteTimeTable<T> {
    pub fn new(mut trips: Vec<T>) -> Self {
        trips.sort_by_key(|trip| trip.sort_key());
        Self { trips }
    }

    pub fn num_trips(&self) -> usize {
        self.trips.len()
    }

    pub fn trips(&self) -> &[T] {
        &self.trips
    }

    pub fn trip(&self, trip_idx: TripIndex) -> Option<&T> {
        self.trips.get(trip_idx as usize)
    }

    /// The earliest trip among the first `before` trips that departs `stop_pos` at or after `earliest`.
    pub fn find_trip_departing_at_or_after(
        &self,
        stop_pos: usize,
        earliest: Timestamp,
        before: usize,
    ) -> Option<TripIndex> {
        let candidates = &self.trips[..before.min(self.trips.len())];
        let idx = candidates.partition_point(|trip| trip.departure(stop_pos) < earliest);
        (idx < candidates.len()).then_some(idx as TripIndex)
    }

    /// The latest trip after `after` (exclusive) that arrives at `stop_pos` at or before `latest`.
    pub fn find_trip_arriving_at_or_before(
        &self,
        stop_pos: usize,
        latest: Timestamp,
        after: Option<usize>,
    ) -> Option<TripIndex> {
        let start = after.map_or(0, |idx| idx + 1);
        if start >= self.trips.len() {
            return None;
        }
        let n = self.trips[start..].partition_point(|trip| trip.arrival(stop_pos) <= latest);
        (n > 0).then(|| (start + n - 1) as TripIndex)
    }
}

pub struct Route<T> {
    pub pattern: RoutePattern,
    pub timetable: RouteTimeTable<T>,
}

impl<T: TripSchedule> Route<T> {
    pub fn get_stops(&self) -> &[StopIndex] {
        &self.pattern.stops
    }

    pub fn num_stops(&self) -> usize {
        self.pattern.num_stops()
    }

    pub fn get_trip(&self, trip_idx: TripIndex) -> &T {
        &self.timetable.trips[trip_idx as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreetMode {
    Walk,
    Bike,
    Car,
}

impl Display for StreetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreetMode::Walk => write!(f, "Walk"),
            StreetMode::Bike => write!(f, "Bicycle"),
            StreetMode::Car => write!(f, "Car"),
        }
    }
}

/// A small set of street modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreetModes(u8);

impl StreetModes {
    pub const WALK: StreetModes = StreetModes(1);
    pub const ALL: StreetModes = StreetModes(0b111);

    pub fn of(modes: &[StreetMode]) -> Self {
        Self(modes.iter().fold(0, |bits, mode| bits | Self::bit(*mode)))
    }

    pub fn contains(&self, mode: StreetMode) -> bool {
        self.0 & Self::bit(mode) != 0
    }

    fn bit(mode: StreetMode) -> u8 {
        match mode {
            StreetMode::Walk => 1,
            StreetMode::Bike => 2,
            StreetMode::Car => 4,
        }
    }
}

/// A static street transfer between two stops. Duration and cost depend on the request and are
/// derived by the transfer request cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub to_stop: StopIndex,
    pub distance_m: f64,
    pub modes: StreetModes,
    pub wheelchair_accessible: bool,
    pub has_stairs: bool,
}

impl Transfer {
    pub fn walk(to_stop: StopIndex, distance_m: f64) -> Self {
        Self { to_stop, distance_m, modes: StreetModes::ALL, wheelchair_accessible: true, has_stairs: false }
    }
}

/// Transfers indexed by their origin stop. Exactly one instance exists per graph version.
pub type TransfersByStop = Vec<Vec<Transfer>>;

pub struct Stop {
    pub name: Box<str>,
    pub station: Option<StationIndex>,
    pub transfer_time: Timestamp,
    pub routes_idx: usize,
    pub num_routes: usize,
}

impl Stop {
    pub fn new(name: String, station: Option<StationIndex>, transfer_time: Timestamp) -> Self {
        Self {
            name: name.into_boxed_str(),
            station,
            transfer_time,
            routes_idx: 0,
            num_routes: 0,
        }
    }

    pub fn get_routes<'a>(&self, stop_routes: &'a [RouteIndex]) -> &'a [RouteIndex] {
        &stop_routes[self.routes_idx..(self.routes_idx + self.num_routes)]
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Unknown stop index {0}.")]
    UnknownStop(StopIndex),
    #[error("Route {0} must serve at least two stops.")]
    RouteTooShort(String),
    #[error("Trip {trip} of route {line} has {trip_stops} stops, the route has {route_stops}.")]
    TripStopCountMismatch { line: String, trip: TripId, trip_stops: usize, route_stops: usize },
}

/// The read-only timetable a search runs against.
pub struct Network<T> {
    pub routes: Vec<Route<T>>,
    pub stops: Vec<Stop>,
    pub stop_index: HashMap<String, StopIndex>,
    pub stop_routes: Vec<RouteIndex>,
    pub transfers: Arc<TransfersByStop>,
}

/// The stop and route topology a search needs from the host timetable.
pub trait TransitData {
    fn num_stops(&self) -> usize;
    fn num_routes(&self) -> usize;
    fn routes_serving_stop(&self, stop: StopIndex) -> &[RouteIndex];
    fn min_transfer_time(&self, stop: StopIndex) -> Timestamp;
    fn station(&self, stop: StopIndex) -> Option<StationIndex>;
}

impl<T> TransitData for Network<T> {
    fn num_stops(&self) -> usize {
        self.stops.len()
    }

    fn num_routes(&self) -> usize {
        self.routes.len()
    }

    fn routes_serving_stop(&self, stop: StopIndex) -> &[RouteIndex] {
        self.stops[stop as usize].get_routes(&self.stop_routes)
    }

    fn min_transfer_time(&self, stop: StopIndex) -> Timestamp {
        self.stops[stop as usize].transfer_time
    }

    fn station(&self, stop: StopIndex) -> Option<StationIndex> {
        self.stops[stop as usize].station
    }
}

impl<T: TripSchedule> Network<T> {
    pub fn get_stop(&self, stop: StopIndex) -> &Stop {
        &self.stops[stop as usize]
    }

    pub fn get_stop_idx_from_name(&self, name: &str) -> Option<StopIndex> {
        self.stop_index.get(name).copied()
    }

    pub fn route(&self, route_idx: RouteIndex) -> &Route<T> {
        &self.routes[route_idx as usize]
    }

    pub fn patterns(&self) -> impl Iterator<Item = &RoutePattern> {
        self.routes.iter().map(|route| &route.pattern)
    }

    pub fn print_stats(&self) {
        let num_trips: usize = self.routes.iter().map(|route| route.timetable.num_trips()).sum();
        let num_transfers: usize = self.transfers.iter().map(Vec::len).sum();
        println!("Stops: {}", self.num_stops());
        println!("Routes: {}", self.num_routes());
        println!("Trips: {num_trips}");
        println!("Transfers: {num_transfers}");
    }
}

pub struct NetworkBuilder<T> {
    stops: Vec<Stop>,
    stop_index: HashMap<String, StopIndex>,
    routes: Vec<Route<T>>,
    transfers: TransfersByStop,
    default_transfer_time: Timestamp,
}

impl<T: TripSchedule> NetworkBuilder<T> {
    pub fn new(default_transfer_time: Timestamp) -> Self {
        Self {
            stops: Vec::new(),
            stop_index: HashMap::new(),
            routes: Vec::new(),
            transfers: Vec::new(),
            default_transfer_time,
        }
    }

    pub fn add_stop(&mut self, name: &str) -> StopIndex {
        self.add_stop_in_station(name, None)
    }

    pub fn add_stop_in_station(&mut self, name: &str, station: Option<StationIndex>) -> StopIndex {
        let idx = self.stops.len() as StopIndex;
        self.stops.push(Stop::new(name.to_owned(), station, self.default_transfer_time));
        self.stop_index.insert(name.to_owned(), idx);
        self.transfers.push(Vec::new());
        idx
    }

    pub fn set_transfer_time_for_stop(
        &mut self,
        stop: StopIndex,
        transfer_time: Timestamp,
    ) -> Result<(), NetworkError> {
        let stop = self.stops.get_mut(stop as usize).ok_or(NetworkError::UnknownStop(stop))?;
        stop.transfer_time = transfer_time;
        Ok(())
    }

    pub fn add_route(&mut self, line: &str, stops: Vec<StopIndex>, trips: Vec<T>) -> Result<RouteIndex, NetworkError> {
        if stops.len() < 2 {
            return Err(NetworkError::RouteTooShort(line.to_owned()));
        }
        self.check_stop(&stops)?;
        if let Some(trip) = trips.iter().find(|trip| trip.num_stops() != stops.len()) {
            return Err(NetworkError::TripStopCountMismatch {
                line: line.to_owned(),
                trip: trip.trip_id(),
                trip_stops: trip.num_stops(),
                route_stops: stops.len(),
            });
        }
        let idx = self.routes.len() as RouteIndex;
        self.routes.push(Route {
            pattern: RoutePattern::new(idx, line, stops),
            timetable: RouteTimeTable::new(trips),
        });
        Ok(idx)
    }

    pub fn add_transfer(&mut self, from: StopIndex, transfer: Transfer) -> Result<(), NetworkError> {
        self.check_stop(&[from, transfer.to_stop])?;
        self.transfers[from as usize].push(transfer);
        Ok(())
    }

    fn check_stop(&self, stops: &[StopIndex]) -> Result<(), NetworkError> {
        match stops.iter().find(|&&stop| stop as usize >= self.stops.len()) {
            Some(&stop) => Err(NetworkError::UnknownStop(stop)),
            None => Ok(()),
        }
    }

    pub fn build(self) -> Network<T> {
        let NetworkBuilder { mut stops, stop_index, routes, transfers, .. } = self;

        // Index the routes for a given stop.
        let mut stop_routes = Vec::new();
        for (stop_idx, stop) in stops.iter_mut().enumerate() {
            stop.routes_idx = stop_routes.len();
            for (route_idx, route) in routes.iter().enumerate() {
                if route.get_stops().contains(&(stop_idx as StopIndex)) {
                    stop_routes.push(route_idx as RouteIndex);
                }
            }
            stop.num_routes = stop_routes.len() - stop.routes_idx;
        }

        Network {
            routes,
            stops,
            stop_index,
            stop_routes,
            transfers: Arc::new(transfers),
        }
    }
}
