use std::fmt::Display;
use std::sync::Arc;

use chrono::Duration;

use crate::access_egress::AccessEgress;
use crate::cost::CostCalculator;
use crate::journey::{PathLeg, RaptorPath, TransitLeg};
use crate::network::{
    Network, PathfindingCost, Route, RouteIndex, Timestamp, TransitData, TripIndex, TripSchedule,
};
use crate::pareto::{ParetoComparator, ParetoSet};
use crate::request::{CostParams, RequestError, SearchParams};

/// A linear relaxation of the generalized cost, `ratio * c1 + slack`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxFunction {
    ratio: f64,
    slack: PathfindingCost,
}

impl RelaxFunction {
    /// Twice the cost plus 20 minutes.
    pub const DEFAULT: RelaxFunction = RelaxFunction { ratio: 2.0, slack: 20 * 60 };

    pub fn new(ratio: f64, slack: PathfindingCost) -> Result<Self, RequestError> {
        if ratio.is_nan() || ratio < 1.0 || slack < 0 {
            return Err(RequestError::InvalidRelaxFunction(format!("{ratio}x + {slack}")));
        }
        Ok(Self { ratio, slack })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn slack(&self) -> PathfindingCost {
        self.slack
    }

    pub fn relax(&self, c1: PathfindingCost) -> PathfindingCost {
        (c1 as f64 * self.ratio).round() as PathfindingCost + self.slack
    }
}

impl Default for RelaxFunction {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for RelaxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}x + {}", self.ratio, self.slack)
    }
}

/// Input of a search for journeys with exactly one ride.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectTransitRequest {
    pub earliest_departure_time: Timestamp,
    pub search_window: Duration,
    pub relax_c1: RelaxFunction,
    pub access_paths: Vec<AccessEgress>,
    pub egress_paths: Vec<AccessEgress>,
    pub cost: CostParams,
}

impl DirectTransitRequest {
    pub fn builder() -> DirectTransitRequestBuilder {
        DirectTransitRequestBuilder::default()
    }

    pub fn latest_departure_time(&self) -> Timestamp {
        self.earliest_departure_time + self.search_window.num_seconds() as Timestamp
    }

    pub fn access_egress_max_duration(&self) -> Timestamp {
        self.access_paths.iter().chain(&self.egress_paths).map(|path| path.duration).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectTransitRequestBuilder {
    earliest_departure_time: Option<Timestamp>,
    search_window: Option<Duration>,
    relax_c1: RelaxFunction,
    access_paths: Vec<AccessEgress>,
    egress_paths: Vec<AccessEgress>,
    cost: CostParams,
}

impl DirectTransitRequestBuilder {
    pub fn earliest_departure_time(mut self, time: Timestamp) -> Self {
        self.earliest_departure_time = Some(time);
        self
    }

    pub fn search_window(mut self, window: Duration) -> Self {
        self.search_window = Some(window);
        self
    }

    pub fn search_window_in_seconds(self, seconds: Timestamp) -> Self {
        self.search_window(Duration::seconds(seconds as i64))
    }

    pub fn relax_c1(mut self, relax_c1: RelaxFunction) -> Self {
        self.relax_c1 = relax_c1;
        self
    }

    pub fn add_access_paths(mut self, paths: impl IntoIterator<Item = AccessEgress>) -> Self {
        self.access_paths.extend(paths);
        self
    }

    pub fn add_egress_paths(mut self, paths: impl IntoIterator<Item = AccessEgress>) -> Self {
        self.egress_paths.extend(paths);
        self
    }

    pub fn cost_params(mut self, cost: CostParams) -> Self {
        self.cost = cost;
        self
    }

    pub fn build(self) -> Result<DirectTransitRequest, RequestError> {
        let earliest_departure_time =
            self.earliest_departure_time.ok_or(RequestError::EarliestDepartureTimeRequired)?;
        if self.access_paths.is_empty() {
            return Err(RequestError::NoAccessPaths);
        }
        if self.egress_paths.is_empty() {
            return Err(RequestError::NoEgressPaths);
        }
        Ok(DirectTransitRequest {
            earliest_departure_time,
            search_window: self.search_window.unwrap_or_else(Duration::zero),
            relax_c1: self.relax_c1,
            access_paths: self.access_paths,
            egress_paths: self.egress_paths,
            cost: self.cost,
        })
    }
}

/// Extra single-ride journeys added to a multi-criteria search. They are kept when their cost
/// is within the relax function of the cheapest one, even if the main search drops them.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxedLimitedTransferRequest {
    pub enabled: bool,
    pub cost_relax_function: RelaxFunction,
    /// Access and egress c1 is multiplied by this factor.
    pub extra_access_egress_cost_factor: f64,
    /// Only stop-to-stop journeys, access and egress paths must take no time.
    pub disable_access_egress: bool,
}

impl Default for RelaxedLimitedTransferRequest {
    fn default() -> Self {
        Self {
            enabled: false,
            cost_relax_function: RelaxFunction::DEFAULT,
            extra_access_egress_cost_factor: 1.0,
            disable_access_egress: false,
        }
    }
}

impl RelaxedLimitedTransferRequest {
    pub fn enabled() -> Self {
        Self { enabled: true, ..Self::default() }
    }

    pub fn with_cost_relax_function(mut self, relax: RelaxFunction) -> Self {
        self.cost_relax_function = relax;
        self
    }

    pub fn with_extra_access_egress_cost_factor(mut self, factor: f64) -> Self {
        self.extra_access_egress_cost_factor = factor;
        self
    }

    pub fn with_disable_access_egress(mut self, disable: bool) -> Self {
        self.disable_access_egress = disable;
        self
    }

    /// The direct search for a main search over `params`, starting at `earliest_departure_time`.
    /// `None` when disabled or when no access or egress path is left.
    pub fn to_direct_request(
        &self,
        params: &SearchParams,
        cost: &CostParams,
        earliest_departure_time: Timestamp,
        search_window: Timestamp,
    ) -> Option<DirectTransitRequest> {
        if !self.enabled {
            return None;
        }
        let accesses = self.map_paths(&params.access_paths);
        let egresses = self.map_paths(&params.egress_paths);
        DirectTransitRequest::builder()
            .earliest_departure_time(earliest_departure_time)
            .search_window_in_seconds(search_window)
            .relax_c1(self.cost_relax_function)
            .add_access_paths(accesses)
            .add_egress_paths(egresses)
            .cost_params(cost.clone())
            .build()
            .ok()
    }

    // Paths with opening hours cannot be time-shifted freely, so they are left out.
    fn map_paths(&self, paths: &[AccessEgress]) -> Vec<AccessEgress> {
        paths
            .iter()
            .filter(|path| path.opening_hours.is_none())
            .filter(|path| !self.disable_access_egress || path.duration == 0)
            .map(|path| {
                let c1 = (path.c1 as f64 * self.extra_access_egress_cost_factor).round() as PathfindingCost;
                path.clone().with_cost(c1)
            })
            .collect()
    }
}

/// Relaxed dominance: a path is dropped if another departs no earlier, arrives no later and
/// still beats it after relaxing its cost.
struct RelaxedPathComparator(RelaxFunction);

impl ParetoComparator<RaptorPath> for RelaxedPathComparator {
    fn dominates(&self, left: &RaptorPath, right: &RaptorPath) -> bool {
        left.start_time >= right.start_time && left.end_time <= right.end_time && self.0.relax(left.c1) <= right.c1
    }
}

/// Finds journeys riding a single trip from an access stop to an egress stop, for every trip
/// departing inside the search window.
pub(crate) struct DirectTransitSearch<'a, T> {
    network: &'a Network<T>,
    request: &'a DirectTransitRequest,
    cost: CostCalculator,
}

impl<'a, T: TripSchedule> DirectTransitSearch<'a, T> {
    pub fn new(network: &'a Network<T>, request: &'a DirectTransitRequest) -> Self {
        Self { network, request, cost: CostCalculator::new(&request.cost) }
    }

    pub fn route(&self) -> Vec<RaptorPath> {
        let comparator = RelaxedPathComparator(self.request.relax_c1);
        let mut results = ParetoSet::new();
        for route in self.routes_serving_accesses() {
            for path in self.route_search(route) {
                results.add(path, &comparator);
            }
        }
        log::debug!("Direct transit search found {} paths.", results.len());
        results.into_vec()
    }

    fn routes_serving_accesses(&self) -> Vec<RouteIndex> {
        let mut routes: Vec<RouteIndex> = self
            .request
            .access_paths
            .iter()
            .flat_map(|access| self.network.routes_serving_stop(access.stop).iter().copied())
            .collect();
        routes.sort_unstable();
        routes.dedup();
        routes
    }

    // The cheapest access and egress combination of the route, expanded to all trips in the window.
    fn route_search(&self, route_idx: RouteIndex) -> Vec<RaptorPath> {
        let request = self.request;
        let route = self.network.route(route_idx);
        let mut best: Option<(RaptorPath, TripIndex, Ride<'_>)> = None;
        for access in &request.access_paths {
            let Some(board_pos) = route.pattern.find_stop_position_after(0, access.stop) else {
                continue;
            };
            for egress in &request.egress_paths {
                let Some(alight_pos) = route.pattern.find_stop_position_after(board_pos + 1, egress.stop) else {
                    continue;
                };
                let ride = Ride { route: route_idx, access, egress, board_pos, alight_pos };
                if let Some((path, trip)) = self.first_path_in_search_window(route, &ride) {
                    if best.as_ref().is_none_or(|(best, _, _)| path.c1 < best.c1) {
                        best = Some((path, trip, ride));
                    }
                }
            }
        }
        let Some((first, trip, ride)) = best else {
            return Vec::new();
        };
        self.all_paths_in_search_window(route, first, trip, &ride)
    }

    fn first_path_in_search_window(&self, route: &Route<T>, ride: &Ride<'_>) -> Option<(RaptorPath, TripIndex)> {
        let earliest_board_time = self.request.earliest_departure_time + ride.access.duration;
        let timetable = &route.timetable;
        let trip =
            timetable.find_trip_departing_at_or_after(ride.board_pos, earliest_board_time, timetable.num_trips())?;
        let path = self.path(route, ride, trip);
        (path.start_time < self.request.latest_departure_time()).then_some((path, trip))
    }

    // Later trips depart later, so only the end of the window needs checking.
    fn all_paths_in_search_window(
        &self,
        route: &Route<T>,
        first: RaptorPath,
        first_trip: TripIndex,
        ride: &Ride<'_>,
    ) -> Vec<RaptorPath> {
        let latest = self.request.latest_departure_time();
        let mut paths = vec![first];
        for trip in first_trip + 1..route.timetable.num_trips() as TripIndex {
            let path = self.path(route, ride, trip);
            if path.start_time > latest {
                break;
            }
            paths.push(path);
        }
        paths
    }

    fn path(&self, route: &Route<T>, ride: &Ride<'_>, trip_idx: TripIndex) -> RaptorPath {
        let trip = route.get_trip(trip_idx);
        let board_time = trip.departure(ride.board_pos);
        let alight_time = trip.arrival(ride.alight_pos);
        let legs = vec![
            PathLeg::Access {
                stop: ride.access.stop,
                from_time: board_time - ride.access.duration,
                to_time: board_time,
                c1: ride.access.c1,
                number_of_rides: ride.access.number_of_rides,
            },
            PathLeg::Transit(TransitLeg {
                route: ride.route,
                line: Arc::clone(&route.pattern.line),
                trip: trip_idx,
                trip_id: trip.trip_id(),
                board_stop: ride.access.stop,
                board_pos: ride.board_pos,
                board_time,
                alight_stop: ride.egress.stop,
                alight_pos: ride.alight_pos,
                alight_time,
                constraint: None,
            }),
            PathLeg::Egress {
                stop: ride.egress.stop,
                from_time: alight_time,
                to_time: alight_time + ride.egress.duration,
                c1: ride.egress.c1,
                number_of_rides: ride.egress.number_of_rides,
            },
        ];
        RaptorPath::new(legs, &self.cost)
    }
}

#[derive(Debug, Clone, Copy)]
struct Ride<'a> {
    route: RouteIndex,
    access: &'a AccessEgress,
    egress: &'a AccessEgress,
    board_pos: usize,
    alight_pos: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relax_function_scales_then_adds_slack() {
        let relax = RelaxFunction::new(1.5, 300).unwrap();
        assert_eq!(relax.relax(1000), 1800);
        assert_eq!(RelaxFunction::DEFAULT.relax(100), 1400);
        assert_eq!(relax.to_string(), "1.50x + 300");
    }

    #[test]
    fn relax_function_must_not_tighten() {
        assert!(RelaxFunction::new(0.9, 0).is_err());
        assert!(RelaxFunction::new(1.0, -1).is_err());
        assert!(RelaxFunction::new(f64::NAN, 0).is_err());
        assert!(RelaxFunction::new(1.0, 0).is_ok());
    }

    #[test]
    fn request_needs_a_start_and_both_ends() {
        let err = DirectTransitRequest::builder().add_access_paths([AccessEgress::free(0)]).build().unwrap_err();
        assert_eq!(err, RequestError::EarliestDepartureTimeRequired);

        let err = DirectTransitRequest::builder()
            .earliest_departure_time(0)
            .add_access_paths([AccessEgress::free(0)])
            .build()
            .unwrap_err();
        assert_eq!(err, RequestError::NoEgressPaths);

        let request = DirectTransitRequest::builder()
            .earliest_departure_time(100)
            .add_access_paths([AccessEgress::walk(0, 30)])
            .add_egress_paths([AccessEgress::walk(1, 90)])
            .build()
            .unwrap();
        assert_eq!(request.latest_departure_time(), 100);
        assert_eq!(request.relax_c1, RelaxFunction::DEFAULT);
        assert_eq!(request.access_egress_max_duration(), 90);
    }

    fn main_search() -> SearchParams {
        crate::request::RaptorRequest::builder()
            .earliest_departure_time(0)
            .add_access_paths([
                AccessEgress::walk(0, 60),
                AccessEgress::free(1),
                AccessEgress::walk(2, 30).with_opening_hours(0, 600),
            ])
            .add_egress_paths([AccessEgress::walk(3, 40)])
            .build()
            .unwrap()
            .search_params
    }

    #[test]
    fn relaxed_limited_transfer_is_off_by_default() {
        let relaxed = RelaxedLimitedTransferRequest::default();
        assert!(relaxed.to_direct_request(&main_search(), &CostParams::default(), 0, 600).is_none());
    }

    #[test]
    fn relaxed_limited_transfer_maps_access_and_egress() {
        let relaxed = RelaxedLimitedTransferRequest::enabled().with_extra_access_egress_cost_factor(1.5);
        let request = relaxed.to_direct_request(&main_search(), &CostParams::default(), 60, 600).unwrap();
        assert_eq!(request.earliest_departure_time, 60);
        assert_eq!(request.latest_departure_time(), 660);
        let accesses: Vec<_> = request.access_paths.iter().map(|path| (path.stop, path.c1)).collect();
        assert_eq!(accesses, vec![(0, 180), (1, 0)]);
        assert_eq!(request.egress_paths[0].c1, 120);
    }

    #[test]
    fn disabled_access_egress_leaves_only_stop_to_stop_searches() {
        let relaxed = RelaxedLimitedTransferRequest::enabled().with_disable_access_egress(true);
        // The only egress walks, so nothing is left to search.
        assert!(relaxed.to_direct_request(&main_search(), &CostParams::default(), 0, 600).is_none());
    }
}
