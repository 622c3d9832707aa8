use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;

use crate::access_egress::{remove_non_optimal_paths, AccessEgress, PathsByStop, SECONDS_PER_DAY};
use crate::aggregator::RouterResult;
use crate::calculator::TransitCalculator;
use crate::config::RaptorConfig;
use crate::constrained::ConstrainedTransfersForPatterns;
use crate::cost::CostCalculator;
use crate::direct::{DirectTransitRequest, DirectTransitSearch};
use crate::heuristic::{resolve_heuristics_to_run, Heuristics, HeuristicsToRun};
use crate::journey::{sort_paths, JourneyError, JourneyResult, PathComparator, RaptorPath};
use crate::multicriteria::McRoutingStrategy;
use crate::network::{Network, RouteIndex, StopIndex, Timestamp, TransitData, TripIndex, TripSchedule};
use crate::request::{Profile, RaptorRequest, RequestError, SearchBudget};
use crate::standard::StdRoutingStrategy;
use crate::strategy::RoutingStrategy;
use crate::transfer_cache::{
    RaptorRequestTransferCache, RaptorTransferIndex, RouteRequest, StreetRelevantOptions, TransferCacheError,
};
use crate::via::ViaConnector;
use crate::worker::{DefaultWorker, RangeRaptorWorker, ViaExit, Worker, WorkerContext, WorkerStats};

#[derive(thiserror::Error, Debug)]
pub enum RaptorError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("unsupported for this configuration: {0}")]
    Unsupported(&'static str),
    #[error("Invalid on-board access: trip {trip} of route {route} at stop position {stop_pos}.")]
    InvalidOnBoardAccess { route: RouteIndex, trip: TripIndex, stop_pos: usize },
    #[error("Unknown stop {0}.")]
    UnknownStop(StopIndex),
    #[error("Search timed out.")]
    SearchTimeout,
    #[error("Search stopped after {0} iterations.")]
    IterationLimit(usize),
    #[error("Search was cancelled.")]
    Cancelled,
    #[error(transparent)]
    TransferCache(#[from] TransferCacheError),
}

/// The transit data a search runs on.
pub struct SearchData<'a, T> {
    pub network: &'a Network<T>,
    pub transfers: Arc<RaptorTransferIndex>,
    pub constrained_transfers: Option<Arc<ConstrainedTransfersForPatterns>>,
}

impl<'a, T: TripSchedule> SearchData<'a, T> {
    pub fn new(network: &'a Network<T>, transfers: Arc<RaptorTransferIndex>) -> Self {
        Self { network, transfers, constrained_transfers: None }
    }

    pub fn with_constrained_transfers(mut self, transfers: Arc<ConstrainedTransfersForPatterns>) -> Self {
        self.constrained_transfers = (!transfers.is_empty()).then_some(transfers);
        self
    }

    /// Transfers of the network, walked with the default street preferences.
    pub fn walking(network: &'a Network<T>) -> Result<Self, RaptorError> {
        let options = StreetRelevantOptions::new(&RouteRequest::default());
        let transfers = RaptorTransferIndex::create(&network.transfers, &options)?;
        Ok(Self::new(network, Arc::new(transfers)))
    }

    pub fn from_cache(
        network: &'a Network<T>,
        cache: &RaptorRequestTransferCache,
        request: &RouteRequest,
    ) -> Result<Self, RaptorError> {
        let transfers = cache.get(&network.transfers, request)?;
        Ok(Self::new(network, transfers))
    }
}

#[derive(Debug)]
pub struct RaptorResponse {
    pub paths: Vec<RaptorPath>,
    pub stats: WorkerStats,
    /// Earliest departure of the search, given or derived from the latest arrival.
    pub earliest_departure_time: Option<Timestamp>,
    pub search_window: Duration,
    pub heuristics: HeuristicsToRun,
}

impl RaptorResponse {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Stops a search between rounds once its budget is used up.
#[derive(Debug, Clone)]
pub(crate) struct BudgetGuard {
    deadline: Option<Instant>,
    max_iterations: Option<usize>,
    cancel: Option<Arc<std::sync::atomic::AtomicBool>>,
}

impl BudgetGuard {
    pub fn new(budget: &SearchBudget, default_timeout: Option<std::time::Duration>) -> Self {
        let timeout = budget.timeout.or(default_timeout);
        Self {
            deadline: timeout.map(|timeout| Instant::now() + timeout),
            max_iterations: budget.max_iterations,
            cancel: budget.cancel.clone(),
        }
    }

    /// `iteration` is the number of iterations already started.
    pub fn check(&self, iteration: usize) -> Result<(), RaptorError> {
        if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            log::warn!("Search cancelled after {iteration} iterations.");
            return Err(RaptorError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::warn!("Search timed out after {iteration} iterations.");
            return Err(RaptorError::SearchTimeout);
        }
        if self.max_iterations.is_some_and(|max| iteration > max) {
            log::warn!("Search exceeded its limit of {iteration} iterations.");
            return Err(RaptorError::IterationLimit(iteration - 1));
        }
        Ok(())
    }
}

/// Runs the rounds of a worker for each departure time, latest first. Via arrivals are handed
/// between segments after every phase that can reach a via location.
pub(crate) struct RangeRaptor<W> {
    worker: Worker<W>,
    budget: BudgetGuard,
    // Rounds to keep searching after the destination is first reached in an iteration.
    additional_transfers: Option<u8>,
}

impl<W: RangeRaptorWorker> RangeRaptor<W> {
    pub fn new(worker: Worker<W>, budget: BudgetGuard) -> Self {
        Self { worker, budget, additional_transfers: None }
    }

    pub fn with_additional_transfers(mut self, additional_transfers: Option<u8>) -> Self {
        self.additional_transfers = additional_transfers;
        self
    }

    pub fn run(&mut self, departure_times: &[Timestamp]) -> Result<(), RaptorError> {
        for (i, &departure_time) in departure_times.iter().enumerate() {
            let iteration = i + 1;
            self.budget.check(iteration)?;
            self.worker.setup_iteration(departure_time);
            self.worker.find_access_on_street_for_round();
            ViaConnector::propagate(&mut self.worker);

            let mut round = 0;
            let mut round_limit: Option<usize> = None;
            while round_limit.is_none_or(|limit| round < limit) && self.worker.has_more_rounds() {
                self.budget.check(iteration)?;
                self.worker.next_round();
                round += 1;
                self.worker.find_access_on_board_for_round()?;
                self.worker.find_transit_for_round()?;
                ViaConnector::propagate(&mut self.worker);
                self.worker.find_access_on_street_for_round();
                self.worker.find_transfers_for_round();
                ViaConnector::propagate(&mut self.worker);

                if round_limit.is_none() && self.worker.is_destination_reached_in_current_round() {
                    round_limit = self.additional_transfers.map(|extra| round + extra as usize);
                    log::trace!("Destination reached in round {round}, round limit {round_limit:?}.");
                }
            }
        }
        Ok(())
    }

    pub fn into_worker(self) -> Worker<W> {
        self.worker
    }

    pub fn route(mut self, departure_times: &[Timestamp]) -> Result<RouterResult, RaptorError> {
        self.run(departure_times)?;
        Ok(self.worker.into_result())
    }
}

/// Entry point for searches. Holds the service settings only, so one service can serve many
/// concurrent searches over shared networks.
#[derive(Debug, Clone, Default)]
pub struct RaptorService {
    config: RaptorConfig,
}

impl RaptorService {
    pub fn new(config: RaptorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RaptorConfig {
        &self.config
    }

    /// All journeys with a single ride inside the search window, pruned with the relaxed cost.
    pub fn find_all_direct_transit<T: TripSchedule>(
        &self,
        data: &SearchData<'_, T>,
        request: &DirectTransitRequest,
    ) -> Result<Vec<RaptorPath>, RaptorError> {
        let paths = request.access_paths.iter().chain(&request.egress_paths).map(|path| path.stop);
        validate_stops(data.network, paths)?;
        Ok(DirectTransitSearch::new(data.network, request).route())
    }

    pub fn route<T: TripSchedule>(
        &self,
        data: &SearchData<'_, T>,
        request: &RaptorRequest,
    ) -> Result<RaptorResponse, RaptorError> {
        let params = &request.search_params;
        let multi_criteria = request.profile.is_multi_criteria();
        if params.has_pass_through() && !multi_criteria {
            return Err(RaptorError::Unsupported("pass-through via locations"));
        }

        let path_stops = params.access_paths.iter().chain(&params.egress_paths).map(|path| path.stop);
        let via_stops = params.via_locations.iter().flat_map(|via| via.stops().iter().copied());
        validate_stops(data.network, path_stops.chain(via_stops))?;

        let heuristics = resolve_heuristics_to_run(request);
        let accesses = remove_non_optimal_paths(&params.access_paths, multi_criteria);
        let egresses = remove_non_optimal_paths(&params.egress_paths, multi_criteria);
        let budget = BudgetGuard::new(&request.budget, self.config.default_search_timeout);
        let search = Search { data, request, budget, accesses, egresses };

        let forward = match params.earliest_departure_time {
            Some(edt) if heuristics.forward => Some(search.heuristic(TransitCalculator::Forward, edt)?),
            _ => None,
        };
        let mut reverse = match params.latest_arrival_time {
            Some(lat) if heuristics.reverse => Some(search.heuristic(TransitCalculator::Reverse, lat)?),
            _ => None,
        };

        let dynamic = &self.config.dynamic_search_window;
        let (edt, window) = match params.earliest_departure_time {
            Some(edt) => {
                let window = params
                    .search_window_in_seconds()
                    .or_else(|| {
                        forward.as_ref().and_then(Heuristics::min_travel_duration).map(|min| dynamic.calculate(min))
                    })
                    .unwrap_or(0);
                (edt, window)
            }
            None => {
                let lat = params.latest_arrival_time.ok_or(RequestError::MissingTimeBound)?;
                let bound = match reverse.take() {
                    Some(bound) => bound,
                    None => search.heuristic(TransitCalculator::Reverse, lat)?,
                };
                let Some(min) = bound.min_travel_duration() else {
                    log::debug!("Destination is not reachable before {}.", crate::utils::get_time_str(lat));
                    return Ok(RaptorResponse {
                        paths: Vec::new(),
                        stats: WorkerStats::default(),
                        earliest_departure_time: None,
                        search_window: Duration::zero(),
                        heuristics,
                    });
                };
                let window = params.search_window_in_seconds().unwrap_or_else(|| dynamic.calculate(min));
                reverse = heuristics.reverse.then_some(bound);
                (lat - min - window, window)
            }
        };
        // Without a latest arrival the reverse heuristic is only good for pruning by rides.
        if reverse.is_none() && heuristics.reverse {
            let origin = edt + window + SECONDS_PER_DAY;
            reverse = Some(search.heuristic(TransitCalculator::Reverse, origin)?);
        }
        log::debug!(
            "Searching from {} with a {}s window ({:?}).",
            crate::utils::get_time_str(edt),
            window,
            heuristics
        );

        let departure_times =
            TransitCalculator::Forward.iteration_departure_times(edt, window, self.config.iteration_step);
        let result = if multi_criteria {
            let pruning = reverse.map(Arc::new);
            let destination_pruning = request.use_destination_pruning();
            search.run(&departure_times, |ctx, single| {
                let strategy = McRoutingStrategy::new(ctx.network.num_stops());
                match (&pruning, single) {
                    (Some(heuristics), true) => strategy.with_heuristics(Arc::clone(heuristics), destination_pruning),
                    _ => strategy,
                }
            })?
        } else {
            let max_rounds = params.number_of_rounds();
            search.run(&departure_times, |ctx, _| {
                StdRoutingStrategy::new(TransitCalculator::Forward, ctx.network.num_stops(), max_rounds)
            })?
        };

        let stats = result.stats;
        let mut paths = result.into_paths();
        let relaxed = &request.relaxed_limited_transfer;
        if multi_criteria {
            if let Some(direct) = relaxed.to_direct_request(params, &request.cost, edt, window) {
                let extra = DirectTransitSearch::new(data.network, &direct).route();
                log::debug!("Relaxed direct search with {} found {} paths.", relaxed.cost_relax_function, extra.len());
                for path in extra {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
            }
        }
        sort_paths(&mut paths, request.sort_order());
        log::debug!("Found {} paths in {} iterations and {} rounds.", paths.len(), stats.iterations, stats.rounds);
        Ok(RaptorResponse {
            paths,
            stats,
            earliest_departure_time: Some(edt),
            search_window: Duration::seconds(window as i64),
            heuristics,
        })
    }
}

/// One request against one set of search data.
struct Search<'s, 'n, T> {
    data: &'s SearchData<'n, T>,
    request: &'s RaptorRequest,
    budget: BudgetGuard,
    accesses: Vec<AccessEgress>,
    egresses: Vec<AccessEgress>,
}

impl<'s, T: TripSchedule> Search<'s, '_, T> {
    fn context(
        &self,
        direction: TransitCalculator,
        accesses: Vec<AccessEgress>,
        egresses: Vec<AccessEgress>,
    ) -> WorkerContext<'s, T> {
        let params = &self.request.search_params;
        WorkerContext {
            network: self.data.network,
            transfers: &self.data.transfers,
            constrained: self.data.constrained_transfers.as_deref(),
            direction,
            accesses: PathsByStop::new(accesses),
            egresses: PathsByStop::new(egresses),
            on_board_accesses: &params.on_board_accesses,
            cost: CostCalculator::new(&self.request.cost),
            comparator: PathComparator::for_request(self.request),
            max_rounds: params.number_of_rounds(),
            time_limit: params.latest_arrival_time,
            transfer_slack: None,
            pass_through: Vec::new(),
            via_exit: None,
        }
    }

    /// A single best-time iteration without transfer slack. The reverse search starts from the
    /// egresses and ends at the accesses.
    fn heuristic(&self, direction: TransitCalculator, origin_time: Timestamp) -> Result<Heuristics, RaptorError> {
        let (accesses, egresses) = match direction {
            TransitCalculator::Forward => (self.accesses.clone(), self.egresses.clone()),
            TransitCalculator::Reverse => (self.egresses.clone(), self.accesses.clone()),
        };
        let mut ctx = self.context(direction, accesses, egresses);
        ctx.on_board_accesses = &[];
        ctx.constrained = None;
        ctx.time_limit = None;
        ctx.transfer_slack = Some(0);

        let strategy = StdRoutingStrategy::new(direction, ctx.network.num_stops(), ctx.max_rounds).without_paths();
        let mut raptor = RangeRaptor::new(Worker::Single(DefaultWorker::new(ctx, strategy)), self.budget.clone());
        raptor.run(&[origin_time])?;
        let worker = raptor.into_worker().into_single().ok_or(RaptorError::Unsupported("composite heuristic"))?;
        let (_, strategy, stats) = worker.into_parts();
        let heuristics = strategy.into_heuristics();
        log::debug!(
            "{:?} heuristic from {}: {} rounds, destination {:?}.",
            direction,
            crate::utils::get_time_str(origin_time),
            stats.rounds,
            heuristics.destination()
        );
        Ok(heuristics)
    }

    /// One worker per search segment. `make_strategy` gets the context of each segment and
    /// whether the search has a single segment.
    fn run<S: RoutingStrategy<T>>(
        &self,
        departure_times: &[Timestamp],
        make_strategy: impl Fn(&WorkerContext<'s, T>, bool) -> S,
    ) -> Result<RouterResult, RaptorError> {
        let params = &self.request.search_params;
        let comparator = PathComparator::for_request(self.request);
        let mut contexts = Vec::new();
        if params.has_visit_via() {
            let n = params.via_locations.len();
            for segment in 0..=n {
                let accesses = self.accesses.iter().filter(|a| a.via_locations_visited as usize == segment);
                let egresses = self.egresses.iter().filter(|e| e.via_locations_visited as usize == n - segment);
                let mut ctx =
                    self.context(TransitCalculator::Forward, accesses.cloned().collect(), egresses.cloned().collect());
                if segment > 0 {
                    ctx.on_board_accesses = &[];
                }
                ctx.via_exit = params.via_locations.get(segment).map(|via| ViaExit {
                    stops: via.stops().to_vec(),
                    minimum_wait_time: via.minimum_wait_time(),
                });
                contexts.push(ctx);
            }
        } else {
            let mut ctx = self.context(TransitCalculator::Forward, self.accesses.clone(), self.egresses.clone());
            ctx.pass_through = params.via_locations.iter().map(|via| via.stops().to_vec()).collect();
            contexts.push(ctx);
        }

        let single = contexts.len() == 1;
        let workers = contexts
            .into_iter()
            .map(|ctx| {
                let strategy = make_strategy(&ctx, single);
                Worker::Single(DefaultWorker::new(ctx, strategy))
            })
            .collect();
        RangeRaptor::new(Worker::composite(workers, comparator), self.budget.clone())
            .with_additional_transfers(params.number_of_additional_transfers)
            .route(departure_times)
    }
}

// Stops of on-board accesses are checked against their trip when boarding.
fn validate_stops<T: TripSchedule>(
    network: &Network<T>,
    mut stops: impl Iterator<Item = StopIndex>,
) -> Result<(), RaptorError> {
    let num_stops = network.num_stops();
    match stops.find(|&stop| stop as usize >= num_stops) {
        Some(stop) => Err(RaptorError::UnknownStop(stop)),
        None => Ok(()),
    }
}

fn simple_request(
    profile: Profile,
    config: &RaptorConfig,
    start: StopIndex,
    start_time: Timestamp,
    end: StopIndex,
) -> Result<RaptorRequest, RequestError> {
    RaptorRequest::builder()
        .profile(profile)
        .earliest_departure_time(start_time)
        .search_window_in_seconds(0)
        .max_number_of_transfers(config.default_max_number_of_transfers)
        .add_access_path(AccessEgress::free(start))
        .add_egress_path(AccessEgress::free(end))
        .build()
}

/// Earliest arrival from `start` to `end`, departing at `start_time`.
pub fn raptor_query<T: TripSchedule>(
    network: &Network<T>,
    start: StopIndex,
    start_time: Timestamp,
    end: StopIndex,
) -> JourneyResult {
    let service = RaptorService::default();
    let request =
        simple_request(Profile::Standard, service.config(), start, start_time, end).map_err(RaptorError::from)?;
    let data = SearchData::walking(network)?;
    let response = service.route(&data, &request)?;
    response.paths.into_iter().next().ok_or(JourneyError::NoJourneyFound)
}

/// The pareto set of arrival time, transfers and cost from `start` to `end`, departing at
/// `start_time`. Ordered by arrival time.
pub fn mc_raptor_query<T: TripSchedule>(
    network: &Network<T>,
    start: StopIndex,
    start_time: Timestamp,
    end: StopIndex,
) -> Result<Vec<RaptorPath>, RaptorError> {
    let service = RaptorService::default();
    let request = simple_request(Profile::MultiCriteria, service.config(), start, start_time, end)?;
    let data = SearchData::walking(network)?;
    Ok(service.route(&data, &request)?.paths)
}
