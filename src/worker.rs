use crate::access_egress::{AccessEgress, OnBoardAccess, PathsByStop};
use crate::aggregator::RouterResult;
use crate::arrivals::StopArrival;
use crate::constrained::{ConstrainedTransfersForPatterns, PointContext};
use crate::cost::CostCalculator;
use crate::calculator::TransitCalculator;
use crate::journey::{PathBuilder, PathComparator};
use crate::network::{Network, RouteIndex, StopIndex, Timestamp, TransitData, TripSchedule};
use crate::raptor::RaptorError;
use crate::strategy::RoutingStrategy;
use crate::transfer_cache::RaptorTransferIndex;
use crate::via::ViaArrival;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub iterations: usize,
    pub rounds: usize,
    pub stops_touched: usize,
    pub routes_scanned: usize,
}

impl WorkerStats {
    /// Combines the stats of workers that ran side by side.
    pub fn merge(&mut self, other: &WorkerStats) {
        self.iterations = self.iterations.max(other.iterations);
        self.rounds = self.rounds.max(other.rounds);
        self.stops_touched += other.stops_touched;
        self.routes_scanned += other.routes_scanned;
    }
}

/// Where a search segment hands its arrivals over to the next segment.
#[derive(Debug, Clone)]
pub(crate) struct ViaExit {
    pub stops: Vec<StopIndex>,
    pub minimum_wait_time: Timestamp,
}

/// Everything a worker reads but never changes during a search.
pub(crate) struct WorkerContext<'a, T> {
    pub network: &'a Network<T>,
    pub transfers: &'a RaptorTransferIndex,
    pub constrained: Option<&'a ConstrainedTransfersForPatterns>,
    pub direction: TransitCalculator,
    pub accesses: PathsByStop,
    pub egresses: PathsByStop,
    pub on_board_accesses: &'a [OnBoardAccess],
    pub cost: CostCalculator,
    pub comparator: PathComparator,
    pub max_rounds: usize,
    pub time_limit: Option<Timestamp>,
    // Replaces the minimum transfer time of every stop.
    pub transfer_slack: Option<Timestamp>,
    pub pass_through: Vec<Vec<StopIndex>>,
    pub via_exit: Option<ViaExit>,
}

impl<'a, T: TripSchedule> WorkerContext<'a, T> {
    pub fn boarding_slack(&self, arrival: &StopArrival) -> Timestamp {
        if arrival.arrived_on_board {
            self.transfer_slack.unwrap_or_else(|| self.network.min_transfer_time(arrival.stop))
        } else {
            0
        }
    }

    /// Time at the stop when starting the access at `departure_time`.
    pub fn access_arrival_time(&self, access: &AccessEgress, departure_time: Timestamp) -> Timestamp {
        match self.direction {
            TransitCalculator::Forward => access.earliest_departure_time(departure_time) + access.duration,
            TransitCalculator::Reverse => access.latest_departure_time(departure_time - access.duration),
        }
    }

    /// The latest start of a journey boarding at `board_time` after `previous`.
    pub fn ride_start_time(&self, previous: &StopArrival, board_time: Timestamp) -> Timestamp {
        match previous.kind {
            crate::arrivals::ArrivalKind::Access { access } if self.direction.is_forward() => {
                let path = self.accesses.get(access);
                path.latest_departure_time(board_time - path.duration)
            }
            crate::arrivals::ArrivalKind::OnBoardAccess { .. } => board_time,
            _ => previous.start_time,
        }
    }

    /// Egress paths usable from `arrival`, as (egress, departure from the stop, time at the destination).
    pub fn egress_candidates(&self, arrival: &StopArrival) -> Vec<(usize, Timestamp, Timestamp)> {
        let mut candidates = Vec::new();
        if (arrival.via_progress as usize) < self.pass_through.len() {
            return candidates;
        }
        for (idx, egress) in self.egresses.for_stop(arrival.stop) {
            // Street paths connect to a vehicle, and a journey needs at least one ride.
            if !egress.has_rides() && !arrival.arrived_on_board {
                continue;
            }
            if arrival.round as usize + egress.number_of_rides as usize == 0 {
                continue;
            }
            let (departure, end) = match self.direction {
                TransitCalculator::Forward => {
                    let slack =
                        if egress.has_rides() && arrival.arrived_on_board { self.boarding_slack(arrival) } else { 0 };
                    let departure = egress.earliest_departure_time(arrival.time + slack);
                    (departure, departure + egress.duration)
                }
                TransitCalculator::Reverse => {
                    (arrival.time, egress.latest_departure_time(arrival.time - egress.duration))
                }
            };
            if self.direction.exceeds(end, self.time_limit) {
                continue;
            }
            candidates.push((idx, departure, end));
        }
        candidates
    }

    /// Via progress after reaching `stop`.
    pub fn pass_through_progress(&self, stop: StopIndex, progress: u8) -> u8 {
        match self.pass_through.get(progress as usize) {
            Some(stops) if stops.contains(&stop) => progress + 1,
            _ => progress,
        }
    }

    pub fn is_via_exit(&self, stop: StopIndex) -> bool {
        self.via_exit.as_ref().is_some_and(|exit| exit.stops.contains(&stop))
    }

    pub fn path_builder(&self) -> PathBuilder<'_, T> {
        PathBuilder {
            network: self.network,
            accesses: &self.accesses,
            on_board_accesses: self.on_board_accesses,
            cost: &self.cost,
        }
    }

    /// The constrained-transfer view of a transit arrival.
    pub fn point_context(&self, arrival: &StopArrival) -> Option<PointContext<'a>> {
        let crate::arrivals::ArrivalKind::Transit { route, trip, alight_pos, .. } = arrival.kind else {
            return None;
        };
        let network: &'a Network<T> = self.network;
        let route = network.route(route);
        Some(PointContext {
            stop: arrival.stop,
            station: network.station(arrival.stop),
            line: &route.pattern.line,
            trip: route.get_trip(trip).trip_id(),
            stop_pos: alight_pos,
        })
    }

    fn has_access_for_later_round(&self, round: usize) -> bool {
        self.accesses.all().iter().any(|access| access.number_of_rides as usize > round)
    }
}

/// The per-round steps driven by [`crate::raptor::RangeRaptor`].
pub(crate) trait RangeRaptorWorker {
    fn setup_iteration(&mut self, departure_time: Timestamp);
    fn next_round(&mut self);
    fn find_access_on_street_for_round(&mut self);
    fn find_access_on_board_for_round(&mut self) -> Result<(), RaptorError>;
    fn find_transit_for_round(&mut self) -> Result<(), RaptorError>;
    fn find_transfers_for_round(&mut self);
    fn has_more_rounds(&self) -> bool;
    fn is_destination_reached_in_current_round(&self) -> bool;
    fn stats(&self) -> WorkerStats;
    fn into_result(self) -> RouterResult;

    /// Arrivals at the via location this worker searches towards, not yet handed over.
    fn take_via_arrivals(&mut self) -> Vec<ViaArrival> {
        Vec::new()
    }

    fn add_via_arrivals(&mut self, _arrivals: Vec<ViaArrival>) {}
}

pub(crate) struct DefaultWorker<'a, T, S> {
    ctx: WorkerContext<'a, T>,
    strategy: S,
    // The first stop position to scan for each route in the current round.
    first_stop_for_route: Vec<Option<usize>>,
    departure_time: Timestamp,
    iteration: usize,
    stats: WorkerStats,
}

impl<'a, T: TripSchedule, S: RoutingStrategy<T>> DefaultWorker<'a, T, S> {
    pub(crate) fn new(ctx: WorkerContext<'a, T>, strategy: S) -> Self {
        let num_routes = ctx.network.num_routes();
        Self {
            ctx,
            strategy,
            first_stop_for_route: vec![None; num_routes],
            departure_time: 0,
            iteration: 0,
            stats: WorkerStats::default(),
        }
    }

    pub(crate) fn into_parts(self) -> (WorkerContext<'a, T>, S, WorkerStats) {
        (self.ctx, self.strategy, self.stats)
    }

    fn is_first_iteration(&self) -> bool {
        self.iteration == 1
    }

    fn mark_routes_to_scan(&mut self) {
        let direction = self.ctx.direction;
        let network = self.ctx.network;
        self.first_stop_for_route.fill(None);
        for &stop in self.strategy.touched_stops() {
            for &route_idx in network.routes_serving_stop(stop) {
                let stops = network.route(route_idx).get_stops();
                let pos = match direction {
                    TransitCalculator::Forward => stops.iter().position(|&s| s == stop),
                    TransitCalculator::Reverse => stops.iter().rposition(|&s| s == stop),
                };
                if let Some(pos) = pos {
                    let first = &mut self.first_stop_for_route[route_idx as usize];
                    if first.is_none_or(|current| direction.is_before(pos, current)) {
                        *first = Some(pos);
                    }
                }
            }
        }
    }

    fn validate_on_board_access(&self, access: &OnBoardAccess) -> Result<(), RaptorError> {
        let invalid = || RaptorError::InvalidOnBoardAccess {
            route: access.route,
            trip: access.trip,
            stop_pos: access.stop_pos,
        };
        let network = self.ctx.network;
        if access.route as usize >= network.num_routes() {
            return Err(invalid());
        }
        let route = network.route(access.route);
        if access.trip as usize >= route.timetable.num_trips()
            || access.stop_pos >= route.num_stops()
            || route.pattern.stop(access.stop_pos) != access.stop
            || !self.ctx.direction.can_board_at(access.stop_pos, route.num_stops())
        {
            return Err(invalid());
        }
        Ok(())
    }
}

impl<T: TripSchedule, S: RoutingStrategy<T>> RangeRaptorWorker for DefaultWorker<'_, T, S> {
    fn setup_iteration(&mut self, departure_time: Timestamp) {
        self.iteration += 1;
        self.departure_time = departure_time;
        self.stats.iterations += 1;
        self.strategy.setup_iteration(&self.ctx, departure_time);
    }

    fn next_round(&mut self) {
        self.stats.rounds += 1;
        self.stats.stops_touched += self.strategy.touched_stops().len();
        self.strategy.next_round();
        log::trace!("Round {} with {} touched stops.", self.strategy.round(), self.strategy.touched_stops().len());
    }

    fn find_access_on_street_for_round(&mut self) {
        let round = self.strategy.round();
        for idx in 0..self.ctx.accesses.all().len() {
            if self.ctx.accesses.get(idx).number_of_rides as usize == round {
                self.strategy.set_access_to_stop(&self.ctx, idx, self.departure_time);
            }
        }
    }

    fn find_access_on_board_for_round(&mut self) -> Result<(), RaptorError> {
        // The traveller is on the trip now, so it can only be boarded in the latest iteration.
        if self.strategy.round() != 1 || !self.is_first_iteration() {
            return Ok(());
        }
        for (idx, access) in self.ctx.on_board_accesses.iter().enumerate() {
            self.validate_on_board_access(access)?;
            self.strategy.register_on_board_access_stop_arrival(&self.ctx, idx)?;
        }
        Ok(())
    }

    fn find_transit_for_round(&mut self) -> Result<(), RaptorError> {
        let direction = self.ctx.direction;
        let network = self.ctx.network;
        let constrained = self.ctx.constrained;
        let on_board = self.strategy.take_on_board_arrivals();

        self.mark_routes_to_scan();
        for arrival in &on_board {
            let first = &mut self.first_stop_for_route[arrival.route as usize];
            if first.is_none_or(|current| direction.is_before(arrival.stop_pos, current)) {
                *first = Some(arrival.stop_pos);
            }
        }

        for route_idx in 0..self.first_stop_for_route.len() {
            let Some(first) = self.first_stop_for_route[route_idx] else {
                continue;
            };
            let route_idx = route_idx as RouteIndex;
            let route = network.route(route_idx);
            let num_stops = route.num_stops();
            // Constraints are only indexed for forward searches.
            let boarding_constraints = constrained.and_then(|c| c.to_stop(route_idx));
            let alighting_constraints = constrained.and_then(|c| c.from_stop(route_idx));

            self.stats.routes_scanned += 1;
            self.strategy.prepare_for_route(&self.ctx, route_idx);

            for pos in direction.positions(num_stops, first) {
                let stop = route.pattern.stop(pos);
                self.strategy.prepare_for_next_stop(&self.ctx, stop, pos);

                if alighting_constraints.is_some_and(|c| c.contains(pos)) {
                    self.strategy.alight_constrained_transfer_exist(&self.ctx, stop, pos);
                } else {
                    self.strategy.alight_only_regular_transfer_exist(&self.ctx, stop, pos);
                }

                for arrival in on_board.iter().filter(|a| a.route == route_idx && a.stop_pos == pos) {
                    self.strategy.board_as_on_board_access(&self.ctx, arrival)?;
                }

                if !direction.can_board_at(pos, num_stops) || !self.strategy.is_touched(stop) {
                    continue;
                }
                match boarding_constraints.map(|c| c.get(pos)).filter(|transfers| !transfers.is_empty()) {
                    Some(transfers) => self.strategy.board_with_constrained_transfer(&self.ctx, stop, pos, transfers),
                    None => self.strategy.board_with_regular_transfer(&self.ctx, stop, pos),
                }
            }
        }
        self.strategy.transits_for_round_complete(&self.ctx);
        Ok(())
    }

    fn find_transfers_for_round(&mut self) {
        let direction = self.ctx.direction;
        let transfers = self.ctx.transfers;
        for stop in self.strategy.stops_reached_on_board() {
            let transfers = match direction {
                TransitCalculator::Forward => transfers.forward_transfers(stop),
                TransitCalculator::Reverse => transfers.reverse_transfers(stop),
            };
            if !transfers.is_empty() {
                self.strategy.transfer_to_stop(&self.ctx, stop, transfers);
            }
        }
    }

    fn has_more_rounds(&self) -> bool {
        let round = self.strategy.round();
        if round >= self.ctx.max_rounds {
            return false;
        }
        !self.strategy.touched_stops().is_empty()
            || (round == 0 && self.is_first_iteration() && !self.ctx.on_board_accesses.is_empty())
            || self.ctx.has_access_for_later_round(round)
    }

    fn is_destination_reached_in_current_round(&self) -> bool {
        self.strategy.is_destination_reached_in_current_round()
    }

    fn stats(&self) -> WorkerStats {
        self.stats
    }

    fn into_result(self) -> RouterResult {
        RouterResult { paths: self.strategy.into_paths(), stats: self.stats }
    }

    fn take_via_arrivals(&mut self) -> Vec<ViaArrival> {
        self.strategy.take_via_arrivals(&self.ctx)
    }

    fn add_via_arrivals(&mut self, arrivals: Vec<ViaArrival>) {
        self.strategy.add_via_arrivals(&self.ctx, arrivals);
    }
}

/// A single worker, or workers for consecutive via segments run in lockstep.
pub(crate) enum Worker<W> {
    Single(W),
    Composite { children: Vec<W>, comparator: PathComparator },
}

impl<W: RangeRaptorWorker> Worker<W> {
    /// Nested composites are flattened, a composite of one worker is that worker.
    pub fn composite(workers: Vec<Worker<W>>, comparator: PathComparator) -> Self {
        let mut children = Vec::new();
        for worker in workers {
            match worker {
                Worker::Single(w) => children.push(w),
                Worker::Composite { children: nested, .. } => children.extend(nested),
            }
        }
        if children.len() == 1 {
            if let Some(single) = children.pop() {
                return Worker::Single(single);
            }
        }
        Worker::Composite { children, comparator }
    }

    pub fn children_mut(&mut self) -> &mut [W] {
        match self {
            Worker::Single(worker) => std::slice::from_mut(worker),
            Worker::Composite { children, .. } => children,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Worker::Single(_) => 1,
            Worker::Composite { children, .. } => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_single(self) -> Option<W> {
        match self {
            Worker::Single(worker) => Some(worker),
            Worker::Composite { .. } => None,
        }
    }
}

impl<W: RangeRaptorWorker> RangeRaptorWorker for Worker<W> {
    fn setup_iteration(&mut self, departure_time: Timestamp) {
        self.children_mut().iter_mut().for_each(|w| w.setup_iteration(departure_time));
    }

    fn next_round(&mut self) {
        self.children_mut().iter_mut().for_each(W::next_round);
    }

    fn find_access_on_street_for_round(&mut self) {
        self.children_mut().iter_mut().for_each(W::find_access_on_street_for_round);
    }

    fn find_access_on_board_for_round(&mut self) -> Result<(), RaptorError> {
        self.children_mut().iter_mut().try_for_each(W::find_access_on_board_for_round)
    }

    fn find_transit_for_round(&mut self) -> Result<(), RaptorError> {
        self.children_mut().iter_mut().try_for_each(W::find_transit_for_round)
    }

    fn find_transfers_for_round(&mut self) {
        self.children_mut().iter_mut().for_each(W::find_transfers_for_round);
    }

    fn has_more_rounds(&self) -> bool {
        match self {
            Worker::Single(worker) => worker.has_more_rounds(),
            Worker::Composite { children, .. } => children.iter().any(W::has_more_rounds),
        }
    }

    fn is_destination_reached_in_current_round(&self) -> bool {
        match self {
            Worker::Single(worker) => worker.is_destination_reached_in_current_round(),
            Worker::Composite { children, .. } => children.iter().any(W::is_destination_reached_in_current_round),
        }
    }

    fn stats(&self) -> WorkerStats {
        match self {
            Worker::Single(worker) => worker.stats(),
            Worker::Composite { children, .. } => children.iter().fold(WorkerStats::default(), |mut stats, w| {
                stats.merge(&w.stats());
                stats
            }),
        }
    }

    fn into_result(self) -> RouterResult {
        match self {
            Worker::Single(worker) => worker.into_result(),
            Worker::Composite { children, comparator } => {
                RouterResult::merge(children.into_iter().map(W::into_result), &comparator)
            }
        }
    }
}
