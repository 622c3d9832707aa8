use std::fmt::Display;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arrayvec::ArrayVec;
use chrono::Duration;

use crate::access_egress::{AccessEgress, OnBoardAccess};
use crate::direct::RelaxedLimitedTransferRequest;
use crate::network::{PathfindingCost, StopIndex, Timestamp};
use crate::utils;

pub const MAX_VIA_LOCATIONS: usize = 10;
pub const DEFAULT_MAX_NUMBER_OF_TRANSFERS: u8 = 12;
/// Rounds are counted in a `u8` and `u8::MAX` marks a stop not reached in any round.
pub const MAX_NUMBER_OF_TRANSFERS: u8 = u8::MAX - 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    MultiCriteria,
    Standard,
    MinTravelDuration,
}

impl Profile {
    pub fn is_multi_criteria(&self) -> bool {
        matches!(self, Profile::MultiCriteria)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Optimization {
    ParetoCheckAgainstDestination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathSortOrder {
    #[default]
    ArrivalTime,
    // Latest departure first.
    DepartureTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSide {
    Access,
    Egress,
}

impl Display for PathSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSide::Access => write!(f, "Access"),
            PathSide::Egress => write!(f, "Egress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViaLocation {
    /// The journey must stop at one of the stops, waiting at least `minimum_wait_time`.
    Visit { label: String, minimum_wait_time: Timestamp, stops: Vec<StopIndex> },
    /// One of the stops must be part of the journey, boarding, alighting or riding through.
    PassThrough { label: String, stops: Vec<StopIndex> },
}

impl ViaLocation {
    pub fn visit(label: &str, stops: Vec<StopIndex>) -> Self {
        Self::visit_with_wait(label, 0, stops)
    }

    pub fn visit_with_wait(label: &str, minimum_wait_time: Timestamp, stops: Vec<StopIndex>) -> Self {
        ViaLocation::Visit { label: label.to_owned(), minimum_wait_time, stops }
    }

    pub fn pass_through(label: &str, stops: Vec<StopIndex>) -> Self {
        ViaLocation::PassThrough { label: label.to_owned(), stops }
    }

    pub fn label(&self) -> &str {
        match self {
            ViaLocation::Visit { label, .. } | ViaLocation::PassThrough { label, .. } => label,
        }
    }

    pub fn stops(&self) -> &[StopIndex] {
        match self {
            ViaLocation::Visit { stops, .. } | ViaLocation::PassThrough { stops, .. } => stops,
        }
    }

    pub fn minimum_wait_time(&self) -> Timestamp {
        match self {
            ViaLocation::Visit { minimum_wait_time, .. } => *minimum_wait_time,
            ViaLocation::PassThrough { .. } => 0,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, ViaLocation::PassThrough { .. })
    }
}

impl Display for ViaLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_pass_through() { "pass-through" } else { "visit" };
        write!(f, "ViaLocation{{{kind} {}", self.label())?;
        if self.minimum_wait_time() > 0 {
            write!(f, " wait {}", utils::get_duration_str(self.minimum_wait_time()))?;
        }
        write!(f, ": {:?}}}", self.stops())
    }
}

/// Weights of the generalized cost (c1). Costs are in seconds-equivalent units.
#[derive(Debug, Clone, PartialEq)]
pub struct CostParams {
    pub board_cost: PathfindingCost,
    pub transfer_cost: PathfindingCost,
    pub wait_reluctance: f64,
    pub transit_reluctance: f64,
    /// Extra cost of changing vehicles at a stop, indexed by stop. Added when alighting at the
    /// stop and when boarding there after an earlier ride. The last alighting is not charged.
    pub stop_transfer_cost: Option<Arc<[PathfindingCost]>>,
}

impl CostParams {
    pub fn with_stop_transfer_cost(mut self, costs: Vec<PathfindingCost>) -> Self {
        self.stop_transfer_cost = Some(Arc::from(costs));
        self
    }
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            board_cost: 600,
            transfer_cost: 0,
            wait_reluctance: 1.0,
            transit_reluctance: 1.0,
            stop_transfer_cost: None,
        }
    }
}

/// Limits checked between rounds. Exceeding them aborts the search.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    pub timeout: Option<std::time::Duration>,
    pub max_iterations: Option<usize>,
    pub cancel: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub earliest_departure_time: Option<Timestamp>,
    pub latest_arrival_time: Option<Timestamp>,
    pub search_window: Option<Duration>,
    pub max_number_of_transfers: u8,
    /// Once the destination is reached, search this many more rounds and stop.
    pub number_of_additional_transfers: Option<u8>,
    pub timetable: bool,
    pub depart_as_late_as_possible: bool,
    pub access_paths: Vec<AccessEgress>,
    pub egress_paths: Vec<AccessEgress>,
    pub on_board_accesses: Vec<OnBoardAccess>,
    pub via_locations: ArrayVec<ViaLocation, MAX_VIA_LOCATIONS>,
}

impl SearchParams {
    pub fn is_earliest_departure_time_set(&self) -> bool {
        self.earliest_departure_time.is_some()
    }

    pub fn is_latest_arrival_time_set(&self) -> bool {
        self.latest_arrival_time.is_some()
    }

    pub fn is_search_window_set(&self) -> bool {
        self.search_window.is_some()
    }

    pub fn search_window_in_seconds(&self) -> Option<Timestamp> {
        self.search_window.map(|window| window.num_seconds() as Timestamp)
    }

    pub fn number_of_rounds(&self) -> usize {
        self.max_number_of_transfers as usize + 1
    }

    pub fn has_visit_via(&self) -> bool {
        self.via_locations.iter().any(|via| !via.is_pass_through())
    }

    pub fn has_pass_through(&self) -> bool {
        self.via_locations.iter().any(ViaLocation::is_pass_through)
    }
}

#[derive(Debug, Clone)]
pub struct RaptorRequest {
    pub profile: Profile,
    pub optimizations: Vec<Optimization>,
    pub search_params: SearchParams,
    pub cost: CostParams,
    pub budget: SearchBudget,
    pub relaxed_limited_transfer: RelaxedLimitedTransferRequest,
}

impl RaptorRequest {
    pub fn builder() -> RaptorRequestBuilder {
        RaptorRequestBuilder::default()
    }

    pub fn use_destination_pruning(&self) -> bool {
        self.optimizations.contains(&Optimization::ParetoCheckAgainstDestination)
    }

    pub fn sort_order(&self) -> PathSortOrder {
        if self.search_params.depart_as_late_as_possible {
            PathSortOrder::DepartureTime
        } else {
            PathSortOrder::ArrivalTime
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("earliest departure time or latest arrival time is required")]
    MissingTimeBound,
    #[error("the earliest departure time is required")]
    EarliestDepartureTimeRequired,
    #[error("invalid relax function: {0}")]
    InvalidRelaxFunction(String),
    #[error("At least one access path is required")]
    NoAccessPaths,
    #[error("At least one egress path is required")]
    NoEgressPaths,
    #[error("the latest arrival time is required when depart-as-late-as-possible is set")]
    LatestArrivalTimeRequired,
    #[error("depart-as-late-as-possible is not allowed together with timetable mode")]
    DepartAsLateAsPossibleWithTimetable,
    #[error("at most {max} transfers are supported, got {count}")]
    TooManyTransfers { max: u8, count: u8 },
    #[error("at most {max} via locations are supported, got {count}")]
    TooManyViaLocations { max: usize, count: usize },
    #[error("combining pass-through and visit via locations is not allowed: [{0}]")]
    MixedViaLocations(String),
    #[error("via location '{0}' has no stops")]
    ViaLocationWithoutStops(String),
    #[error("{side} cannot have negative via visits: {count}")]
    NegativeViaVisits { side: PathSide, count: i32 },
    #[error("{side} visits {count} via locations, but only {defined} are defined")]
    TooManyViaVisits { side: PathSide, count: i32, defined: usize },
}

#[derive(Debug, Clone, Default)]
pub struct RaptorRequestBuilder {
    profile: Profile,
    optimizations: Vec<Optimization>,
    earliest_departure_time: Option<Timestamp>,
    latest_arrival_time: Option<Timestamp>,
    search_window: Option<Duration>,
    max_number_of_transfers: Option<u8>,
    number_of_additional_transfers: Option<u8>,
    timetable: bool,
    depart_as_late_as_possible: bool,
    access_paths: Vec<AccessEgress>,
    egress_paths: Vec<AccessEgress>,
    on_board_accesses: Vec<OnBoardAccess>,
    via_locations: Vec<ViaLocation>,
    cost: CostParams,
    budget: SearchBudget,
    relaxed_limited_transfer: RelaxedLimitedTransferRequest,
}

impl RaptorRequestBuilder {
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn add_optimization(mut self, optimization: Optimization) -> Self {
        if !self.optimizations.contains(&optimization) {
            self.optimizations.push(optimization);
        }
        self
    }

    pub fn earliest_departure_time(mut self, time: Timestamp) -> Self {
        self.earliest_departure_time = Some(time);
        self
    }

    pub fn latest_arrival_time(mut self, time: Timestamp) -> Self {
        self.latest_arrival_time = Some(time);
        self
    }

    pub fn search_window(mut self, window: Duration) -> Self {
        self.search_window = Some(window);
        self
    }

    pub fn search_window_in_seconds(self, seconds: Timestamp) -> Self {
        self.search_window(Duration::seconds(seconds as i64))
    }

    pub fn max_number_of_transfers(mut self, transfers: u8) -> Self {
        self.max_number_of_transfers = Some(transfers);
        self
    }

    pub fn number_of_additional_transfers(mut self, transfers: u8) -> Self {
        self.number_of_additional_transfers = Some(transfers);
        self
    }

    pub fn timetable(mut self, enabled: bool) -> Self {
        self.timetable = enabled;
        self
    }

    pub fn depart_as_late_as_possible(mut self, enabled: bool) -> Self {
        self.depart_as_late_as_possible = enabled;
        self
    }

    pub fn add_access_path(mut self, path: AccessEgress) -> Self {
        self.access_paths.push(path);
        self
    }

    pub fn add_access_paths(mut self, paths: impl IntoIterator<Item = AccessEgress>) -> Self {
        self.access_paths.extend(paths);
        self
    }

    pub fn add_egress_path(mut self, path: AccessEgress) -> Self {
        self.egress_paths.push(path);
        self
    }

    pub fn add_egress_paths(mut self, paths: impl IntoIterator<Item = AccessEgress>) -> Self {
        self.egress_paths.extend(paths);
        self
    }

    pub fn add_on_board_access(mut self, access: OnBoardAccess) -> Self {
        self.on_board_accesses.push(access);
        self
    }

    pub fn add_via_location(mut self, via: ViaLocation) -> Self {
        self.via_locations.push(via);
        self
    }

    pub fn cost_params(mut self, cost: CostParams) -> Self {
        self.cost = cost;
        self
    }

    pub fn budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn relaxed_limited_transfer(mut self, relaxed: RelaxedLimitedTransferRequest) -> Self {
        self.relaxed_limited_transfer = relaxed;
        self
    }

    pub fn build(self) -> Result<RaptorRequest, RequestError> {
        if self.earliest_departure_time.is_none() && self.latest_arrival_time.is_none() {
            return Err(RequestError::MissingTimeBound);
        }
        if self.access_paths.is_empty() && self.on_board_accesses.is_empty() {
            return Err(RequestError::NoAccessPaths);
        }
        if self.egress_paths.is_empty() {
            return Err(RequestError::NoEgressPaths);
        }
        let max_number_of_transfers = self.max_number_of_transfers.unwrap_or(DEFAULT_MAX_NUMBER_OF_TRANSFERS);
        if max_number_of_transfers > MAX_NUMBER_OF_TRANSFERS {
            return Err(RequestError::TooManyTransfers { max: MAX_NUMBER_OF_TRANSFERS, count: max_number_of_transfers });
        }
        if self.depart_as_late_as_possible && self.latest_arrival_time.is_none() {
            return Err(RequestError::LatestArrivalTimeRequired);
        }
        if self.depart_as_late_as_possible && self.timetable {
            return Err(RequestError::DepartAsLateAsPossibleWithTimetable);
        }
        Self::validate_via_locations(&self.via_locations)?;
        let defined = self.via_locations.len();
        Self::validate_via_visits(PathSide::Access, &self.access_paths, defined)?;
        Self::validate_via_visits(PathSide::Egress, &self.egress_paths, defined)?;

        let search_params = SearchParams {
            earliest_departure_time: self.earliest_departure_time,
            latest_arrival_time: self.latest_arrival_time,
            search_window: self.search_window,
            max_number_of_transfers,
            number_of_additional_transfers: self.number_of_additional_transfers,
            timetable: self.timetable,
            depart_as_late_as_possible: self.depart_as_late_as_possible,
            access_paths: self.access_paths,
            egress_paths: self.egress_paths,
            on_board_accesses: self.on_board_accesses,
            via_locations: self.via_locations.into_iter().collect(),
        };

        Ok(RaptorRequest {
            profile: self.profile,
            optimizations: self.optimizations,
            search_params,
            cost: self.cost,
            budget: self.budget,
            relaxed_limited_transfer: self.relaxed_limited_transfer,
        })
    }

    fn validate_via_locations(via_locations: &[ViaLocation]) -> Result<(), RequestError> {
        if via_locations.len() > MAX_VIA_LOCATIONS {
            let count = via_locations.len();
            return Err(RequestError::TooManyViaLocations { max: MAX_VIA_LOCATIONS, count });
        }
        let pass_through = via_locations.iter().filter(|via| via.is_pass_through()).count();
        if pass_through > 0 && pass_through < via_locations.len() {
            let entries: Vec<String> = via_locations.iter().map(ToString::to_string).collect();
            return Err(RequestError::MixedViaLocations(entries.join(", ")));
        }
        if let Some(via) = via_locations.iter().find(|via| via.stops().is_empty()) {
            return Err(RequestError::ViaLocationWithoutStops(via.label().to_owned()));
        }
        Ok(())
    }

    fn validate_via_visits(side: PathSide, paths: &[AccessEgress], defined: usize) -> Result<(), RequestError> {
        for path in paths {
            let count = path.via_locations_visited;
            if count < 0 {
                return Err(RequestError::NegativeViaVisits { side, count });
            }
            if count as usize > defined {
                return Err(RequestError::TooManyViaVisits { side, count, defined });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RaptorRequestBuilder {
        RaptorRequest::builder()
            .earliest_departure_time(0)
            .add_access_path(AccessEgress::walk(1, 60))
            .add_egress_path(AccessEgress::walk(2, 60))
    }

    fn error(builder: RaptorRequestBuilder) -> String {
        builder.build().unwrap_err().to_string()
    }

    #[test]
    fn valid_request_uses_defaults() {
        let request = valid().build().unwrap();
        assert_eq!(request.profile, Profile::MultiCriteria);
        assert_eq!(request.search_params.max_number_of_transfers, DEFAULT_MAX_NUMBER_OF_TRANSFERS);
        assert_eq!(request.search_params.number_of_rounds(), 13);
        assert_eq!(request.cost, CostParams::default());
        assert!(!request.use_destination_pruning());
    }

    #[test]
    fn time_bound_is_required() {
        let builder = RaptorRequest::builder()
            .add_access_path(AccessEgress::walk(1, 60))
            .add_egress_path(AccessEgress::walk(2, 60));
        assert_eq!(builder.build().unwrap_err(), RequestError::MissingTimeBound);
    }

    #[test]
    fn access_and_egress_errors_are_distinct() {
        let no_egress = RaptorRequest::builder().earliest_departure_time(0).add_access_path(AccessEgress::walk(1, 60));
        let no_access = RaptorRequest::builder().earliest_departure_time(0).add_egress_path(AccessEgress::walk(1, 60));
        assert_eq!(error(no_egress), "At least one egress path is required");
        assert_eq!(error(no_access), "At least one access path is required");
    }

    #[test]
    fn on_board_access_counts_as_access() {
        let request = RaptorRequest::builder()
            .earliest_departure_time(0)
            .add_on_board_access(OnBoardAccess { route: 0, trip: 0, stop_pos: 0, stop: 1, c1: 0 })
            .add_egress_path(AccessEgress::walk(2, 60))
            .build();
        assert!(request.is_ok());
    }

    #[test]
    fn depart_as_late_as_possible_rules() {
        let builder = valid().depart_as_late_as_possible(true);
        assert_eq!(builder.build().unwrap_err(), RequestError::LatestArrivalTimeRequired);
        let builder = valid().latest_arrival_time(3600).depart_as_late_as_possible(true).timetable(true);
        assert_eq!(builder.build().unwrap_err(), RequestError::DepartAsLateAsPossibleWithTimetable);
        let request = valid().latest_arrival_time(3600).depart_as_late_as_possible(true).build().unwrap();
        assert_eq!(request.sort_order(), PathSortOrder::DepartureTime);
    }

    #[test]
    fn visit_and_pass_through_cannot_be_combined() {
        let builder = valid()
            .add_via_location(ViaLocation::visit("Via", vec![5]))
            .add_via_location(ViaLocation::pass_through("PassThrough", vec![5]));
        assert_eq!(
            error(builder),
            "combining pass-through and visit via locations is not allowed: \
             [ViaLocation{visit Via: [5]}, ViaLocation{pass-through PassThrough: [5]}]"
        );
    }

    #[test]
    fn via_location_needs_stops() {
        let builder = valid().add_via_location(ViaLocation::visit("Empty", Vec::new()));
        assert_eq!(error(builder), "via location 'Empty' has no stops");
    }

    #[test]
    fn negative_via_visits_are_rejected() {
        let builder = valid()
            .add_via_location(ViaLocation::visit("Via", vec![5]))
            .add_access_path(AccessEgress::walk(3, 60).with_via_locations_visited(-1));
        assert_eq!(error(builder), "Access cannot have negative via visits: -1");
    }

    #[test]
    fn via_visits_must_not_exceed_via_locations() {
        let access = valid()
            .add_via_location(ViaLocation::visit("Via", vec![5]))
            .add_access_path(AccessEgress::walk(3, 60).with_via_locations_visited(2));
        assert_eq!(error(access), "Access visits 2 via locations, but only 1 are defined");

        let egress = valid()
            .add_via_location(ViaLocation::visit("Via", vec![5]))
            .add_egress_path(AccessEgress::walk(3, 60).with_via_locations_visited(2));
        assert_eq!(error(egress), "Egress visits 2 via locations, but only 1 are defined");
    }

    #[test]
    fn via_location_count_is_bounded() {
        let builder = (0..=MAX_VIA_LOCATIONS)
            .fold(valid(), |b, i| b.add_via_location(ViaLocation::visit(&i.to_string(), vec![1])));
        assert_eq!(
            builder.build().unwrap_err(),
            RequestError::TooManyViaLocations { max: MAX_VIA_LOCATIONS, count: MAX_VIA_LOCATIONS + 1 }
        );
    }

    #[test]
    fn via_location_display_includes_wait() {
        assert_eq!(
            ViaLocation::visit_with_wait("V", 120, vec![1, 2]).to_string(),
            "ViaLocation{visit V wait 2m: [1, 2]}"
        );
    }

    #[test]
    fn transfers_are_capped_so_rounds_fit_in_a_byte() {
        assert_eq!(
            valid().max_number_of_transfers(254).build().unwrap_err(),
            RequestError::TooManyTransfers { max: 253, count: 254 }
        );
        assert_eq!(error(valid().max_number_of_transfers(255)), "at most 253 transfers are supported, got 255");
        let request = valid().max_number_of_transfers(253).build().unwrap();
        assert_eq!(request.search_params.number_of_rounds(), 254);
    }

    #[test]
    fn additional_transfers_are_optional() {
        assert_eq!(valid().build().unwrap().search_params.number_of_additional_transfers, None);
        let request = valid().number_of_additional_transfers(2).build().unwrap();
        assert_eq!(request.search_params.number_of_additional_transfers, Some(2));
    }
}
