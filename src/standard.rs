use crate::arrivals::{ArrivalArena, ArrivalIndex, ArrivalKind, StopArrival};
use crate::constrained::{TransferConstraint, TransferForPattern};
use crate::calculator::TransitCalculator;
use crate::heuristic::{DestinationBound, Heuristics};
use crate::journey::RaptorPath;
use crate::network::{RouteIndex, StopIndex, Timestamp, TripIndex, TripSchedule};
use crate::pareto::ParetoSet;
use crate::strategy::{constrained_boardings, RoutingStrategy};
use crate::transfer_cache::RaptorTransfer;
use crate::via::ViaArrival;
use crate::worker::WorkerContext;

const UNREACHED_ROUND: u8 = u8::MAX;

// The trip currently ridden along the scanned route.
#[derive(Debug, Clone, Copy)]
struct Ride {
    previous: ArrivalIndex,
    trip: TripIndex,
    board_pos: usize,
    board_stop: StopIndex,
    board_time: Timestamp,
    start_time: Timestamp,
    constraint: Option<TransferConstraint>,
}

/// Best arrival time per stop and round. Only a strictly better time replaces an arrival, so
/// ties keep the arrival found first.
pub(crate) struct StdRoutingStrategy {
    direction: TransitCalculator,
    arena: ArrivalArena,
    // τ*[p] = best known time at stop p in any round.
    best_times: Vec<Timestamp>,
    // Best time at stop p when arriving on board.
    best_transit_times: Vec<Timestamp>,
    best_rounds: Vec<u8>,
    // τ[k][p] = best arrival at stop p in round k.
    round_arrivals: Vec<Vec<Option<ArrivalIndex>>>,
    // Arrivals on board in the current round, transfers start from these.
    on_board_arrivals: Vec<Option<ArrivalIndex>>,
    reached_on_board: Vec<StopIndex>,
    touched: Vec<bool>,
    touched_stops: Vec<StopIndex>,
    next_touched: Vec<bool>,
    next_touched_stops: Vec<StopIndex>,
    round: usize,
    route: RouteIndex,
    ride: Option<Ride>,
    // Alightings kept for constrained transfers although they did not improve the stop.
    constrained_candidates: Vec<(StopIndex, ArrivalIndex)>,
    previous_constrained_candidates: Vec<(StopIndex, ArrivalIndex)>,
    via_exports: Vec<ArrivalIndex>,
    paths: ParetoSet<RaptorPath>,
    collect_paths: bool,
    destination: Option<DestinationBound>,
    destination_reached: bool,
    origin_time: Timestamp,
}

impl StdRoutingStrategy {
    pub fn new(direction: TransitCalculator, num_stops: usize, max_rounds: usize) -> Self {
        Self {
            direction,
            arena: ArrivalArena::default(),
            best_times: vec![direction.unreached(); num_stops],
            best_transit_times: vec![direction.unreached(); num_stops],
            best_rounds: vec![UNREACHED_ROUND; num_stops],
            round_arrivals: vec![vec![None; num_stops]; max_rounds + 1],
            on_board_arrivals: vec![None; num_stops],
            reached_on_board: Vec::new(),
            touched: vec![false; num_stops],
            touched_stops: Vec::new(),
            next_touched: vec![false; num_stops],
            next_touched_stops: Vec::new(),
            round: 0,
            route: 0,
            ride: None,
            constrained_candidates: Vec::new(),
            previous_constrained_candidates: Vec::new(),
            via_exports: Vec::new(),
            paths: ParetoSet::new(),
            collect_paths: true,
            destination: None,
            destination_reached: false,
            origin_time: 0,
        }
    }

    /// Only track the best destination arrival, used by the heuristic searches.
    pub fn without_paths(mut self) -> Self {
        self.collect_paths = false;
        self
    }

    pub fn into_heuristics(self) -> Heuristics {
        Heuristics {
            direction: self.direction,
            origin_time: self.origin_time,
            best_times: self.best_times,
            best_rounds: self.best_rounds,
            destination: self.destination,
        }
    }

    fn touch(&mut self, stop: StopIndex) {
        if !self.touched[stop as usize] {
            self.touched[stop as usize] = true;
            self.touched_stops.push(stop);
        }
    }

    fn touch_next(&mut self, stop: StopIndex) {
        if !self.next_touched[stop as usize] {
            self.next_touched[stop as usize] = true;
            self.next_touched_stops.push(stop);
        }
    }

    fn clear_touched(&mut self) {
        for &stop in &self.touched_stops {
            self.touched[stop as usize] = false;
        }
        self.touched_stops.clear();
    }

    fn set_on_board(&mut self, stop: StopIndex, idx: ArrivalIndex) {
        let slot = &mut self.on_board_arrivals[stop as usize];
        if slot.is_none() {
            self.reached_on_board.push(stop);
        }
        *slot = Some(idx);
    }

    fn update_best_round(&mut self, stop: StopIndex, round: u8) {
        let best = &mut self.best_rounds[stop as usize];
        *best = (*best).min(round);
    }

    /// Accepts an arrival that is not from the transit phase if it improves the stop.
    fn add_arrival<T: TripSchedule>(&mut self, ctx: &WorkerContext<'_, T>, arrival: StopArrival) {
        let stop = arrival.stop;
        if self.direction.exceeds(arrival.time, ctx.time_limit)
            || !self.direction.is_better(arrival.time, self.best_times[stop as usize])
        {
            return;
        }
        let round = arrival.round;
        let on_board = arrival.arrived_on_board;
        let time = arrival.time;
        let idx = self.arena.push(arrival);
        self.best_times[stop as usize] = time;
        self.round_arrivals[round as usize][stop as usize] = Some(idx);
        self.update_best_round(stop, round);
        self.touch(stop);
        if on_board {
            if self.direction.is_better(time, self.best_transit_times[stop as usize]) {
                self.best_transit_times[stop as usize] = time;
            }
            self.set_on_board(stop, idx);
        }
        self.arrived(ctx, idx);
    }

    fn arrived<T: TripSchedule>(&mut self, ctx: &WorkerContext<'_, T>, idx: ArrivalIndex) {
        if ctx.is_via_exit(self.arena[idx].stop) {
            self.via_exports.push(idx);
        }
        self.check_destination(ctx, idx);
    }

    fn check_destination<T: TripSchedule>(&mut self, ctx: &WorkerContext<'_, T>, idx: ArrivalIndex) {
        let arrival = &self.arena[idx];
        for (egress, departure, end) in ctx.egress_candidates(arrival) {
            let egress = ctx.egresses.get(egress);
            let rides = arrival.round.saturating_add(egress.number_of_rides);
            self.destination = Some(match self.destination {
                None => DestinationBound { time: end, rides },
                Some(best) => DestinationBound {
                    time: if self.direction.is_better(end, best.time) { end } else { best.time },
                    rides: best.rides.min(rides),
                },
            });
            self.destination_reached = true;
            if self.collect_paths {
                let path = ctx.path_builder().path(&self.arena, idx, egress, departure);
                self.paths.add(path, &ctx.comparator);
            }
        }
    }

    fn board<T: TripSchedule>(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        previous: ArrivalIndex,
        trip: TripIndex,
        constraint: Option<TransferConstraint>,
    ) {
        let route = ctx.network.route(self.route);
        let board_time = self.direction.board_time(route.get_trip(trip), stop_pos);
        let start_time = ctx.ride_start_time(&self.arena[previous], board_time);
        self.ride =
            Some(Ride { previous, trip, board_pos: stop_pos, board_stop: stop, board_time, start_time, constraint });
    }

    fn alight<T: TripSchedule>(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        constrained: bool,
    ) {
        let Some(ride) = self.ride else {
            return;
        };
        if ride.board_pos == stop_pos {
            return;
        }
        let time = self.direction.alight_time(ctx.network.route(self.route).get_trip(ride.trip), stop_pos);
        if self.direction.exceeds(time, ctx.time_limit) {
            return;
        }
        let improves_stop = self.direction.is_better(time, self.best_times[stop as usize]);
        let improves_transit = self.direction.is_better(time, self.best_transit_times[stop as usize]);
        if !improves_stop && !improves_transit && !constrained {
            return;
        }

        let round = self.round as u8;
        let idx = self.arena.push(StopArrival {
            stop,
            time,
            round,
            c1: 0,
            via_progress: 0,
            arrived_on_board: true,
            start_time: ride.start_time,
            kind: ArrivalKind::Transit {
                route: self.route,
                trip: ride.trip,
                board_pos: ride.board_pos,
                alight_pos: stop_pos,
                board_stop: ride.board_stop,
                board_time: ride.board_time,
                constraint: ride.constraint,
            },
            previous: Some(ride.previous),
        });

        if improves_stop {
            self.best_times[stop as usize] = time;
            self.round_arrivals[self.round][stop as usize] = Some(idx);
            self.touch_next(stop);
            if ctx.is_via_exit(stop) {
                self.via_exports.push(idx);
            }
        }
        if improves_transit {
            self.best_transit_times[stop as usize] = time;
            self.update_best_round(stop, round);
            self.set_on_board(stop, idx);
            self.check_destination(ctx, idx);
        }
        if constrained && !improves_stop {
            self.constrained_candidates.push((stop, idx));
        }
    }

    // The arrival to board from, found in the previous round.
    fn previous_arrival(&self, stop: StopIndex) -> Option<ArrivalIndex> {
        self.round.checked_sub(1).and_then(|k| self.round_arrivals[k][stop as usize])
    }
}

impl<T: TripSchedule> RoutingStrategy<T> for StdRoutingStrategy {
    fn setup_iteration(&mut self, _ctx: &WorkerContext<'_, T>, departure_time: Timestamp) {
        self.origin_time = departure_time;
        self.round = 0;
        self.clear_touched();
        for &stop in &self.reached_on_board {
            self.on_board_arrivals[stop as usize] = None;
        }
        self.reached_on_board.clear();
        self.constrained_candidates.clear();
        self.previous_constrained_candidates.clear();
        self.via_exports.clear();
        self.destination_reached = false;
    }

    fn next_round(&mut self) {
        self.round += 1;
        for &stop in &self.reached_on_board {
            self.on_board_arrivals[stop as usize] = None;
        }
        self.reached_on_board.clear();
        self.previous_constrained_candidates = std::mem::take(&mut self.constrained_candidates);
        self.destination_reached = false;
    }

    fn round(&self) -> usize {
        self.round
    }

    fn touched_stops(&self) -> &[StopIndex] {
        &self.touched_stops
    }

    fn is_touched(&self, stop: StopIndex) -> bool {
        self.touched[stop as usize]
    }

    fn stops_reached_on_board(&self) -> Vec<StopIndex> {
        self.reached_on_board.clone()
    }

    fn is_destination_reached_in_current_round(&self) -> bool {
        self.destination_reached
    }

    fn set_access_to_stop(&mut self, ctx: &WorkerContext<'_, T>, access: usize, departure_time: Timestamp) {
        let path = ctx.accesses.get(access);
        let arrival = StopArrival {
            stop: path.stop,
            time: ctx.access_arrival_time(path, departure_time),
            round: path.number_of_rides,
            c1: path.c1,
            via_progress: 0,
            arrived_on_board: path.stop_reached_on_board,
            start_time: departure_time,
            kind: ArrivalKind::Access { access },
            previous: None,
        };
        self.add_arrival(ctx, arrival);
    }

    fn prepare_for_route(&mut self, _ctx: &WorkerContext<'_, T>, route: RouteIndex) {
        self.route = route;
        self.ride = None;
    }

    fn alight_only_regular_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        self.alight(ctx, stop, stop_pos, false);
    }

    fn alight_constrained_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        self.alight(ctx, stop, stop_pos, true);
    }

    fn board_with_regular_transfer(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        let Some(previous) = self.previous_arrival(stop) else {
            return;
        };
        let arrival = &self.arena[previous];
        let earliest = self.direction.plus(arrival.time, ctx.boarding_slack(arrival));
        let timetable = &ctx.network.route(self.route).timetable;
        if let Some(trip) = self.direction.find_trip(timetable, stop_pos, earliest, self.ride.map(|ride| ride.trip)) {
            self.board(ctx, stop, stop_pos, previous, trip, None);
        }
    }

    fn board_with_constrained_transfer(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        transfers: &[TransferForPattern],
    ) {
        let mut sources: Vec<(ArrivalIndex, bool)> =
            self.previous_arrival(stop).map(|idx| (idx, true)).into_iter().collect();
        sources.extend(
            self.previous_constrained_candidates.iter().filter(|(s, _)| *s == stop).map(|&(_, idx)| (idx, false)),
        );
        let boardings = constrained_boardings(ctx, &self.arena, self.route, stop_pos, transfers, &sources);
        // The earliest trip wins, ties go to the regular arrival.
        let best = boardings
            .into_iter()
            .filter(|b| self.ride.is_none_or(|ride| b.trip < ride.trip))
            .min_by_key(|b| b.trip);
        if let Some(boarding) = best {
            self.board(ctx, stop, stop_pos, boarding.source, boarding.trip, boarding.constraint);
        }
    }

    fn transits_for_round_complete(&mut self, _ctx: &WorkerContext<'_, T>) {
        self.clear_touched();
        std::mem::swap(&mut self.touched, &mut self.next_touched);
        std::mem::swap(&mut self.touched_stops, &mut self.next_touched_stops);
    }

    fn transfer_to_stop(&mut self, ctx: &WorkerContext<'_, T>, from_stop: StopIndex, transfers: &[RaptorTransfer]) {
        let Some(previous) = self.on_board_arrivals[from_stop as usize] else {
            return;
        };
        let (time, c1) = (self.arena[previous].time, self.arena[previous].c1);
        let start_time = self.arena[previous].start_time;
        for transfer in transfers {
            let arrival = StopArrival {
                stop: transfer.stop,
                time: self.direction.plus(time, transfer.duration),
                round: self.round as u8,
                c1: c1 + transfer.c1,
                via_progress: 0,
                arrived_on_board: false,
                start_time,
                kind: ArrivalKind::Transfer { from_stop, duration: transfer.duration, c1: transfer.c1 },
                previous: Some(previous),
            };
            self.add_arrival(ctx, arrival);
        }
    }

    fn take_via_arrivals(&mut self, ctx: &WorkerContext<'_, T>) -> Vec<ViaArrival> {
        std::mem::take(&mut self.via_exports)
            .into_iter()
            .map(|idx| ViaArrival::from_arrival(ctx, &self.arena, idx))
            .collect()
    }

    fn add_via_arrivals(&mut self, ctx: &WorkerContext<'_, T>, arrivals: Vec<ViaArrival>) {
        for arrival in arrivals {
            self.add_arrival(ctx, arrival.into_stop_arrival());
        }
    }

    fn into_paths(self) -> ParetoSet<RaptorPath> {
        self.paths
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access_egress::{AccessEgress, PathsByStop};
    use crate::cost::CostCalculator;
    use crate::journey::PathComparator;
    use crate::network::{Network, NetworkBuilder, TransitData, Transfer, TripTimes};
    use crate::transfer_cache::{RaptorTransferIndex, RouteRequest, StreetRelevantOptions};
    use crate::worker::{DefaultWorker, RangeRaptorWorker};

    // A -R1-> B -R2-> C, ten minutes each, with a 2 minute walk from B to D.
    fn network() -> Network<TripTimes> {
        let mut builder = NetworkBuilder::new(60);
        let a = builder.add_stop("A");
        let b = builder.add_stop("B");
        let c = builder.add_stop("C");
        let d = builder.add_stop("D");
        builder
            .add_route(
                "R1",
                vec![a, b],
                vec![TripTimes::from_times(1, &[600, 1200]), TripTimes::from_times(2, &[1800, 2400])],
            )
            .unwrap();
        builder.add_route("R2", vec![b, c], vec![TripTimes::from_times(3, &[1500, 2100])]).unwrap();
        builder.add_transfer(b, Transfer::walk(d, 160.0)).unwrap();
        builder.build()
    }

    fn transfers(network: &Network<TripTimes>) -> RaptorTransferIndex {
        let options = StreetRelevantOptions::new(&RouteRequest::default());
        RaptorTransferIndex::create(&network.transfers, &options).unwrap()
    }

    fn context<'a>(
        network: &'a Network<TripTimes>,
        transfers: &'a RaptorTransferIndex,
        egress: AccessEgress,
    ) -> WorkerContext<'a, TripTimes> {
        WorkerContext {
            network,
            transfers,
            constrained: None,
            direction: TransitCalculator::Forward,
            accesses: PathsByStop::new(vec![AccessEgress::free(0)]),
            egresses: PathsByStop::new(vec![egress]),
            on_board_accesses: &[],
            cost: CostCalculator::default(),
            comparator: PathComparator { departure_time: true, include_c1: false },
            max_rounds: 3,
            time_limit: None,
            transfer_slack: None,
            pass_through: Vec::new(),
            via_exit: None,
        }
    }

    fn run(ctx: WorkerContext<'_, TripTimes>, departure_time: Timestamp) -> StdRoutingStrategy {
        let strategy = StdRoutingStrategy::new(ctx.direction, ctx.network.num_stops(), ctx.max_rounds);
        let mut worker = DefaultWorker::new(ctx, strategy);
        worker.setup_iteration(departure_time);
        worker.find_access_on_street_for_round();
        while worker.has_more_rounds() {
            worker.next_round();
            worker.find_transit_for_round().unwrap();
            worker.find_access_on_street_for_round();
            worker.find_transfers_for_round();
        }
        worker.into_parts().1
    }

    #[test]
    fn two_rides_with_a_transfer() {
        let network = network();
        let transfers = transfers(&network);
        let strategy = run(context(&network, &transfers, AccessEgress::free(2)), 0);
        let paths = RoutingStrategy::<TripTimes>::into_paths(strategy).into_vec();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].start_time, 600);
        assert_eq!(paths[0].end_time, 2100);
        assert_eq!(paths[0].number_of_transfers, 1);
    }

    #[test]
    fn destination_is_flagged_only_in_the_round_it_is_reached() {
        let network = network();
        let transfers = transfers(&network);
        let ctx = context(&network, &transfers, AccessEgress::free(2));
        let strategy = StdRoutingStrategy::new(ctx.direction, network.num_stops(), ctx.max_rounds);
        let mut worker = DefaultWorker::new(ctx, strategy);
        worker.setup_iteration(0);
        worker.find_access_on_street_for_round();
        let mut reached = Vec::new();
        while reached.len() < 2 && worker.has_more_rounds() {
            worker.next_round();
            worker.find_transit_for_round().unwrap();
            worker.find_access_on_street_for_round();
            worker.find_transfers_for_round();
            reached.push(worker.is_destination_reached_in_current_round());
        }
        // C is reached on R2 in the second round.
        assert_eq!(reached, vec![false, true]);

        worker.setup_iteration(-60);
        assert!(!worker.is_destination_reached_in_current_round());
    }

    #[test]
    fn walking_egress_needs_a_ride() {
        let network = network();
        let transfers = transfers(&network);
        let strategy = run(context(&network, &transfers, AccessEgress::free(0)), 0);
        assert!(RoutingStrategy::<TripTimes>::into_paths(strategy).is_empty());
    }

    #[test]
    fn heuristics_keep_best_times_and_rounds() {
        let network = network();
        let transfers = transfers(&network);
        let strategy = run(context(&network, &transfers, AccessEgress::free(1)), 0);
        let heuristics = strategy.into_heuristics();
        // 160m at 1.33m/s rounds up to 121s.
        assert_eq!(heuristics.best_time(3), Some(1200 + 121));
        assert_eq!(heuristics.min_rides(3), Some(1));
        assert_eq!(heuristics.best_time(2), Some(2100));
        assert_eq!(heuristics.destination(), Some(DestinationBound { time: 1200, rides: 1 }));
        assert_eq!(heuristics.min_travel_duration(), Some(1200));
    }

    #[test]
    fn walking_egress_after_a_transfer_is_not_a_journey() {
        let network = network();
        let transfers = transfers(&network);
        let strategy = run(context(&network, &transfers, AccessEgress::free(3)), 0);
        assert!(RoutingStrategy::<TripTimes>::into_paths(strategy).is_empty());
    }

    #[test]
    fn time_limit_rejects_late_arrivals() {
        let network = network();
        let transfers = transfers(&network);
        let mut ctx = context(&network, &transfers, AccessEgress::free(2));
        ctx.time_limit = Some(2000);
        let strategy = run(ctx, 0);
        assert!(RoutingStrategy::<TripTimes>::into_paths(strategy).is_empty());
    }

    #[test]
    fn via_arrivals_seed_the_next_segment() {
        let network = network();
        let transfers = transfers(&network);
        let ctx = context(&network, &transfers, AccessEgress::free(2));
        let mut strategy = StdRoutingStrategy::new(ctx.direction, network.num_stops(), ctx.max_rounds);
        RoutingStrategy::<TripTimes>::setup_iteration(&mut strategy, &ctx, 0);
        RoutingStrategy::<TripTimes>::next_round(&mut strategy);
        let via = ViaArrival {
            stop: 1,
            time: 1200,
            round: 1,
            c1: 0,
            arrived_on_board: true,
            start_time: 600,
            prefix: Arc::from(Vec::new()),
        };
        strategy.add_via_arrivals(&ctx, vec![via]);
        assert_eq!(RoutingStrategy::<TripTimes>::touched_stops(&strategy), &[1]);
        assert_eq!(RoutingStrategy::<TripTimes>::stops_reached_on_board(&strategy), vec![1]);
    }
}
