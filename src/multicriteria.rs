use std::sync::Arc;

use crate::arrivals::{ArrivalArena, ArrivalIndex, ArrivalKind, StopArrival};
use crate::constrained::{TransferConstraint, TransferForPattern};
use crate::heuristic::Heuristics;
use crate::journey::RaptorPath;
use crate::network::{PathfindingCost, RouteIndex, StopIndex, Timestamp, TripIndex, TripSchedule};
use crate::pareto::ParetoSet;
use crate::raptor::RaptorError;
use crate::strategy::{constrained_boardings, OnBoardStopArrival, RoutingStrategy};
use crate::transfer_cache::RaptorTransfer;
use crate::via::ViaArrival;
use crate::worker::WorkerContext;

// One arrival is at least as good as another in every criterion.
fn arrival_dominates(left: &StopArrival, right: &StopArrival) -> bool {
    left.time <= right.time
        && left.round <= right.round
        && left.c1 <= right.c1
        && left.via_progress >= right.via_progress
        && (left.arrived_on_board || !right.arrived_on_board)
}

/// Pareto sets of arrivals for every stop. Arrivals added since the marker was last set are the
/// ones a round continues from.
pub(crate) struct McStopArrivals {
    arrivals: Vec<ParetoSet<ArrivalIndex>>,
    touched: Vec<bool>,
    touched_stops: Vec<StopIndex>,
}

impl McStopArrivals {
    pub fn new(num_stops: usize) -> Self {
        Self {
            arrivals: (0..num_stops).map(|_| ParetoSet::new()).collect(),
            touched: vec![false; num_stops],
            touched_stops: Vec::new(),
        }
    }

    pub fn is_dominated(&self, arena: &ArrivalArena, arrival: &StopArrival) -> bool {
        self.arrivals[arrival.stop as usize].iter().any(|&idx| arrival_dominates(&arena[idx], arrival))
    }

    /// Stores the arrival in the arena only if it enters the pareto set of its stop.
    pub fn add(&mut self, arena: &mut ArrivalArena, arrival: StopArrival) -> Option<ArrivalIndex> {
        if self.is_dominated(arena, &arrival) {
            return None;
        }
        let idx = arena.push(arrival);
        self.add_existing(arena, idx).then_some(idx)
    }

    pub fn add_existing(&mut self, arena: &ArrivalArena, idx: ArrivalIndex) -> bool {
        let stop = arena[idx].stop;
        let added = self.arrivals[stop as usize]
            .add(idx, &|left: &ArrivalIndex, right: &ArrivalIndex| arrival_dominates(&arena[*left], &arena[*right]));
        if added && !self.touched[stop as usize] {
            self.touched[stop as usize] = true;
            self.touched_stops.push(stop);
        }
        added
    }

    pub fn clear_touched_stops_and_set_stop_markers(&mut self) {
        for &stop in &self.touched_stops {
            self.touched[stop as usize] = false;
            self.arrivals[stop as usize].mark_at_end_of_set();
        }
        self.touched_stops.clear();
    }

    pub fn arrivals_after_marker(&self, stop: StopIndex) -> &[ArrivalIndex] {
        self.arrivals[stop as usize].elements_after_marker()
    }

    pub fn arrivals(&self, stop: StopIndex) -> &[ArrivalIndex] {
        self.arrivals[stop as usize].as_slice()
    }

    pub fn touched_stops(&self) -> &[StopIndex] {
        &self.touched_stops
    }

    pub fn is_touched(&self, stop: StopIndex) -> bool {
        self.touched[stop as usize]
    }
}

// A trip boarded along the scanned route, with the criteria it carries to the next alighting.
#[derive(Debug, Clone)]
struct McRide {
    previous: ArrivalIndex,
    trip: TripIndex,
    board_pos: usize,
    board_stop: StopIndex,
    board_time: Timestamp,
    c1: PathfindingCost,
    // c1 minus the transit cost up to the boarding, comparable between rides on the same pattern.
    relative_c1: PathfindingCost,
    round: u8,
    via_progress: u8,
    start_time: Timestamp,
    constraint: Option<TransferConstraint>,
}

impl McRide {
    fn dominates(&self, other: &McRide) -> bool {
        self.trip <= other.trip
            && self.relative_c1 <= other.relative_c1
            && self.round <= other.round
            && self.via_progress >= other.via_progress
            && self.start_time >= other.start_time
    }
}

/// Multi-criteria routing over arrival time, rounds, c1 and via progress.
pub(crate) struct McRoutingStrategy {
    arena: ArrivalArena,
    stop_arrivals: McStopArrivals,
    // Alightings of the current transit phase, committed when the phase completes.
    pending: Vec<(ArrivalIndex, bool)>,
    reached_on_board: Vec<StopIndex>,
    on_board_flags: Vec<bool>,
    round: usize,
    route: RouteIndex,
    rides: ParetoSet<McRide>,
    on_board_queue: Vec<OnBoardStopArrival>,
    constrained_candidates: Vec<(StopIndex, ArrivalIndex)>,
    previous_constrained_candidates: Vec<(StopIndex, ArrivalIndex)>,
    via_exports: Vec<ArrivalIndex>,
    paths: ParetoSet<RaptorPath>,
    destination_reached: bool,
    heuristics: Option<Arc<Heuristics>>,
    destination_pruning: bool,
}

impl McRoutingStrategy {
    pub fn new(num_stops: usize) -> Self {
        Self {
            arena: ArrivalArena::default(),
            stop_arrivals: McStopArrivals::new(num_stops),
            pending: Vec::new(),
            reached_on_board: Vec::new(),
            on_board_flags: vec![false; num_stops],
            round: 0,
            route: 0,
            rides: ParetoSet::new(),
            on_board_queue: Vec::new(),
            constrained_candidates: Vec::new(),
            previous_constrained_candidates: Vec::new(),
            via_exports: Vec::new(),
            paths: ParetoSet::new(),
            destination_reached: false,
            heuristics: None,
            destination_pruning: false,
        }
    }

    /// Prunes arrivals using the bounds of a reverse heuristic search. With `destination_pruning`
    /// an arrival is also dropped when a path already found beats anything it can still become.
    pub fn with_heuristics(mut self, heuristics: Arc<Heuristics>, destination_pruning: bool) -> Self {
        self.heuristics = Some(heuristics);
        self.destination_pruning = destination_pruning;
        self
    }

    fn is_pruned<T: TripSchedule>(&self, ctx: &WorkerContext<'_, T>, arrival: &StopArrival) -> bool {
        if ctx.direction.exceeds(arrival.time, ctx.time_limit) {
            return true;
        }
        let Some(heuristics) = &self.heuristics else {
            return false;
        };
        let (Some(latest), Some(min_rides)) = (heuristics.best_time(arrival.stop), heuristics.min_rides(arrival.stop))
        else {
            return true;
        };
        if arrival.time > latest {
            return true;
        }
        if !self.destination_pruning || arrival.round == 0 {
            return false;
        }
        let min_transfers = (arrival.round as usize + min_rides as usize).saturating_sub(1);
        // An egress right here would take the alighting cost back.
        let min_c1 =
            if arrival.arrived_on_board { arrival.c1 - ctx.cost.alighting_cost(arrival.stop) } else { arrival.c1 };
        self.paths.iter().any(|path| {
            path.end_time <= arrival.time
                && path.start_time >= arrival.start_time
                && path.number_of_transfers as usize <= min_transfers
                && path.c1 <= min_c1
        })
    }

    fn reached_on_board(&mut self, stop: StopIndex) {
        if !self.on_board_flags[stop as usize] {
            self.on_board_flags[stop as usize] = true;
            self.reached_on_board.push(stop);
        }
    }

    fn add_arrival<T: TripSchedule>(&mut self, ctx: &WorkerContext<'_, T>, arrival: StopArrival) {
        if self.is_pruned(ctx, &arrival) {
            return;
        }
        let on_board = arrival.arrived_on_board;
        if let Some(idx) = self.stop_arrivals.add(&mut self.arena, arrival) {
            let stop = self.arena[idx].stop;
            if on_board {
                self.reached_on_board(stop);
            }
            self.arrived(ctx, idx);
        }
    }

    fn arrived<T: TripSchedule>(&mut self, ctx: &WorkerContext<'_, T>, idx: ArrivalIndex) {
        if ctx.is_via_exit(self.arena[idx].stop) {
            self.via_exports.push(idx);
        }
        let arrival = &self.arena[idx];
        for (egress, departure, _) in ctx.egress_candidates(arrival) {
            let path = ctx.path_builder().path(&self.arena, idx, ctx.egresses.get(egress), departure);
            if self.paths.add(path, &ctx.comparator) {
                self.destination_reached = true;
            }
        }
    }

    fn add_ride<T: TripSchedule>(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        previous: ArrivalIndex,
        trip: TripIndex,
        constraint: Option<TransferConstraint>,
    ) {
        let arrival = &self.arena[previous];
        let board_time = ctx.network.route(self.route).get_trip(trip).departure(stop_pos);
        let wait = if arrival.is_start_of_journey() { 0 } else { board_time - arrival.time };
        let c1 = arrival.c1 + ctx.cost.boarding_cost(arrival.round == 0, wait, stop);
        let ride = McRide {
            previous,
            trip,
            board_pos: stop_pos,
            board_stop: stop,
            board_time,
            c1,
            relative_c1: ctx.cost.relative_ride_cost(c1, board_time),
            round: arrival.round + 1,
            via_progress: arrival.via_progress,
            start_time: ctx.ride_start_time(arrival, board_time),
            constraint,
        };
        self.rides.add(ride, &McRide::dominates);
    }

    fn alight<T: TripSchedule>(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        constrained: bool,
    ) {
        let route = ctx.network.route(self.route);
        let rides: Vec<McRide> = self.rides.iter().filter(|ride| ride.board_pos != stop_pos).cloned().collect();
        for ride in rides {
            let time = route.get_trip(ride.trip).arrival(stop_pos);
            let arrival = StopArrival {
                stop,
                time,
                round: ride.round,
                c1: ride.c1 + ctx.cost.transit_cost(time - ride.board_time) + ctx.cost.alighting_cost(stop),
                via_progress: ride.via_progress,
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
            };
            if self.is_pruned(ctx, &arrival) {
                continue;
            }
            if !constrained && self.stop_arrivals.is_dominated(&self.arena, &arrival) {
                continue;
            }
            let idx = self.arena.push(arrival);
            self.pending.push((idx, constrained));
        }
    }
}

impl<T: TripSchedule> RoutingStrategy<T> for McRoutingStrategy {
    fn setup_iteration(&mut self, _ctx: &WorkerContext<'_, T>, _departure_time: Timestamp) {
        self.round = 0;
        self.stop_arrivals.clear_touched_stops_and_set_stop_markers();
        for &stop in &self.reached_on_board {
            self.on_board_flags[stop as usize] = false;
        }
        self.reached_on_board.clear();
        self.on_board_queue.clear();
        self.constrained_candidates.clear();
        self.previous_constrained_candidates.clear();
        self.via_exports.clear();
        self.destination_reached = false;
    }

    fn next_round(&mut self) {
        self.round += 1;
        for &stop in &self.reached_on_board {
            self.on_board_flags[stop as usize] = false;
        }
        self.reached_on_board.clear();
        self.previous_constrained_candidates = std::mem::take(&mut self.constrained_candidates);
        self.destination_reached = false;
    }

    fn round(&self) -> usize {
        self.round
    }

    fn touched_stops(&self) -> &[StopIndex] {
        self.stop_arrivals.touched_stops()
    }

    fn is_touched(&self, stop: StopIndex) -> bool {
        self.stop_arrivals.is_touched(stop)
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
            via_progress: ctx.pass_through_progress(path.stop, 0),
            arrived_on_board: path.stop_reached_on_board,
            start_time: departure_time,
            kind: ArrivalKind::Access { access },
            previous: None,
        };
        self.add_arrival(ctx, arrival);
    }

    fn prepare_for_route(&mut self, _ctx: &WorkerContext<'_, T>, route: RouteIndex) {
        self.route = route;
        self.rides.clear();
    }

    fn prepare_for_next_stop(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, _stop_pos: usize) {
        if ctx.pass_through.is_empty() {
            return;
        }
        for ride in self.rides.iter_mut() {
            ride.via_progress = ctx.pass_through_progress(stop, ride.via_progress);
        }
    }

    fn alight_only_regular_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        self.alight(ctx, stop, stop_pos, false);
    }

    fn alight_constrained_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        self.alight(ctx, stop, stop_pos, true);
    }

    fn board_with_regular_transfer(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize) {
        let timetable = &ctx.network.route(self.route).timetable;
        let sources = self.stop_arrivals.arrivals_after_marker(stop).to_vec();
        for previous in sources {
            let arrival = &self.arena[previous];
            let earliest = arrival.time + ctx.boarding_slack(arrival);
            if let Some(trip) = timetable.find_trip_departing_at_or_after(stop_pos, earliest, timetable.num_trips()) {
                self.add_ride(ctx, stop, stop_pos, previous, trip, None);
            }
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
            self.stop_arrivals.arrivals_after_marker(stop).iter().map(|&idx| (idx, true)).collect();
        sources.extend(
            self.previous_constrained_candidates.iter().filter(|(s, _)| *s == stop).map(|&(_, idx)| (idx, false)),
        );
        for boarding in constrained_boardings(ctx, &self.arena, self.route, stop_pos, transfers, &sources) {
            self.add_ride(ctx, stop, stop_pos, boarding.source, boarding.trip, boarding.constraint);
        }
    }

    fn transits_for_round_complete(&mut self, ctx: &WorkerContext<'_, T>) {
        self.stop_arrivals.clear_touched_stops_and_set_stop_markers();
        for (idx, constrained) in std::mem::take(&mut self.pending) {
            let stop = self.arena[idx].stop;
            if self.stop_arrivals.add_existing(&self.arena, idx) {
                self.reached_on_board(stop);
                self.arrived(ctx, idx);
            } else if constrained {
                self.constrained_candidates.push((stop, idx));
            }
        }
    }

    fn transfer_to_stop(&mut self, ctx: &WorkerContext<'_, T>, from_stop: StopIndex, transfers: &[RaptorTransfer]) {
        let round = self.round as u8;
        let sources: Vec<ArrivalIndex> = self
            .stop_arrivals
            .arrivals_after_marker(from_stop)
            .iter()
            .copied()
            .filter(|&idx| self.arena[idx].arrived_on_board && self.arena[idx].round == round)
            .collect();
        for previous in sources {
            let (time, c1, via_progress, start_time) = {
                let arrival = &self.arena[previous];
                (arrival.time, arrival.c1, arrival.via_progress, arrival.start_time)
            };
            for transfer in transfers {
                let arrival = StopArrival {
                    stop: transfer.stop,
                    time: time + transfer.duration,
                    round,
                    c1: c1 + transfer.c1,
                    via_progress: ctx.pass_through_progress(transfer.stop, via_progress),
                    arrived_on_board: false,
                    start_time,
                    kind: ArrivalKind::Transfer { from_stop, duration: transfer.duration, c1: transfer.c1 },
                    previous: Some(previous),
                };
                self.add_arrival(ctx, arrival);
            }
        }
    }

    fn register_on_board_access_stop_arrival(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        access: usize,
    ) -> Result<(), RaptorError> {
        let on_board = &ctx.on_board_accesses[access];
        let time = ctx.network.route(on_board.route).get_trip(on_board.trip).departure(on_board.stop_pos);
        let idx = self.arena.push(StopArrival {
            stop: on_board.stop,
            time,
            round: 0,
            c1: on_board.c1,
            via_progress: ctx.pass_through_progress(on_board.stop, 0),
            arrived_on_board: true,
            start_time: time,
            kind: ArrivalKind::OnBoardAccess { access },
            previous: None,
        });
        self.on_board_queue.push(OnBoardStopArrival {
            route: on_board.route,
            stop_pos: on_board.stop_pos,
            trip: on_board.trip,
            arrival: idx,
        });
        Ok(())
    }

    fn take_on_board_arrivals(&mut self) -> Vec<OnBoardStopArrival> {
        std::mem::take(&mut self.on_board_queue)
    }

    fn board_as_on_board_access(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        arrival: &OnBoardStopArrival,
    ) -> Result<(), RaptorError> {
        let stop = self.arena[arrival.arrival].stop;
        self.add_ride(ctx, stop, arrival.stop_pos, arrival.arrival, arrival.trip, None);
        Ok(())
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
    use super::*;

    fn arrival(stop: StopIndex, time: Timestamp, round: u8, c1: PathfindingCost, on_board: bool) -> StopArrival {
        StopArrival {
            stop,
            time,
            round,
            c1,
            via_progress: 0,
            arrived_on_board: on_board,
            start_time: 0,
            kind: ArrivalKind::Access { access: 0 },
            previous: None,
        }
    }

    #[test]
    fn stop_arrivals_keep_the_pareto_front() {
        let mut arena = ArrivalArena::default();
        let mut arrivals = McStopArrivals::new(2);
        let fast = arrivals.add(&mut arena, arrival(1, 600, 1, 900, true));
        let cheap = arrivals.add(&mut arena, arrival(1, 700, 1, 500, true));
        assert!(fast.is_some() && cheap.is_some());
        // Slower and more expensive than the first arrival.
        assert_eq!(arrivals.add(&mut arena, arrival(1, 650, 1, 950, true)), None);
        assert_eq!(arena.len(), 2);
        assert_eq!(arrivals.add(&mut arena, arrival(1, 600, 1, 900, true)), None);
        assert_eq!(arrivals.arrivals(1).len(), 2);
        assert_eq!(arrivals.touched_stops(), &[1]);
    }

    #[test]
    fn arriving_on_board_is_a_criterion() {
        let mut arena = ArrivalArena::default();
        let mut arrivals = McStopArrivals::new(1);
        assert!(arrivals.add(&mut arena, arrival(0, 600, 1, 500, false)).is_some());
        assert!(arrivals.add(&mut arena, arrival(0, 600, 1, 500, true)).is_some());
        // The on-board arrival replaced the walking one.
        assert_eq!(arrivals.arrivals(0).len(), 1);
        assert!(arena[arrivals.arrivals(0)[0]].arrived_on_board);
    }

    #[test]
    fn markers_separate_new_arrivals() {
        let mut arena = ArrivalArena::default();
        let mut arrivals = McStopArrivals::new(1);
        arrivals.add(&mut arena, arrival(0, 600, 0, 500, false));
        arrivals.clear_touched_stops_and_set_stop_markers();
        assert!(arrivals.arrivals_after_marker(0).is_empty());
        assert!(!arrivals.is_touched(0));
        let later = arrivals.add(&mut arena, arrival(0, 900, 0, 100, false));
        assert_eq!(arrivals.arrivals_after_marker(0), &[later.unwrap()]);
    }

    #[test]
    fn rides_compare_on_trip_and_relative_cost() {
        let ride = |trip, relative_c1, start_time| McRide {
            previous: 0,
            trip,
            board_pos: 0,
            board_stop: 0,
            board_time: 0,
            c1: relative_c1,
            relative_c1,
            round: 1,
            via_progress: 0,
            start_time,
            constraint: None,
        };
        assert!(ride(0, 100, 0).dominates(&ride(1, 100, 0)));
        assert!(!ride(0, 200, 0).dominates(&ride(1, 100, 0)));
        assert!(!ride(0, 100, 0).dominates(&ride(0, 100, 60)));
    }
}
