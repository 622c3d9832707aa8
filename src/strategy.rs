use crate::arrivals::{ArrivalArena, ArrivalIndex};
use crate::constrained::{find_constrained_boarding, ConstrainedBoarding, TransferForPattern};
use crate::journey::RaptorPath;
use crate::network::{RouteIndex, StopIndex, Timestamp, TripIndex, TripSchedule};
use crate::pareto::ParetoSet;
use crate::raptor::RaptorError;
use crate::transfer_cache::RaptorTransfer;
use crate::via::ViaArrival;
use crate::worker::WorkerContext;

/// A trip boarded by an on-board access, waiting for its route to be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OnBoardStopArrival {
    pub route: RouteIndex,
    pub stop_pos: usize,
    pub trip: TripIndex,
    pub arrival: ArrivalIndex,
}

/// The state and criteria of a search. The worker drives the rounds and asks the strategy to
/// record arrivals and rides.
pub(crate) trait RoutingStrategy<T: TripSchedule> {
    fn setup_iteration(&mut self, ctx: &WorkerContext<'_, T>, departure_time: Timestamp);

    fn next_round(&mut self);

    fn round(&self) -> usize;

    /// Stops reached since the last transit phase started.
    fn touched_stops(&self) -> &[StopIndex];

    fn is_touched(&self, stop: StopIndex) -> bool;

    /// Stops reached on board a vehicle in the current round. Transfers start from these.
    fn stops_reached_on_board(&self) -> Vec<StopIndex>;

    fn is_destination_reached_in_current_round(&self) -> bool;

    fn set_access_to_stop(&mut self, ctx: &WorkerContext<'_, T>, access: usize, departure_time: Timestamp);

    fn prepare_for_route(&mut self, ctx: &WorkerContext<'_, T>, route: RouteIndex);

    fn prepare_for_next_stop(&mut self, _ctx: &WorkerContext<'_, T>, _stop: StopIndex, _stop_pos: usize) {}

    fn alight_only_regular_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize);

    fn alight_constrained_transfer_exist(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize);

    fn board_with_regular_transfer(&mut self, ctx: &WorkerContext<'_, T>, stop: StopIndex, stop_pos: usize);

    fn board_with_constrained_transfer(
        &mut self,
        ctx: &WorkerContext<'_, T>,
        stop: StopIndex,
        stop_pos: usize,
        transfers: &[TransferForPattern],
    );

    fn transits_for_round_complete(&mut self, ctx: &WorkerContext<'_, T>);

    fn transfer_to_stop(&mut self, ctx: &WorkerContext<'_, T>, from_stop: StopIndex, transfers: &[RaptorTransfer]);

    fn register_on_board_access_stop_arrival(
        &mut self,
        _ctx: &WorkerContext<'_, T>,
        _access: usize,
    ) -> Result<(), RaptorError> {
        Err(RaptorError::Unsupported("on-board access"))
    }

    fn take_on_board_arrivals(&mut self) -> Vec<OnBoardStopArrival> {
        Vec::new()
    }

    fn board_as_on_board_access(
        &mut self,
        _ctx: &WorkerContext<'_, T>,
        _arrival: &OnBoardStopArrival,
    ) -> Result<(), RaptorError> {
        Err(RaptorError::Unsupported("on-board access"))
    }

    fn take_via_arrivals(&mut self, ctx: &WorkerContext<'_, T>) -> Vec<ViaArrival>;

    fn add_via_arrivals(&mut self, ctx: &WorkerContext<'_, T>, arrivals: Vec<ViaArrival>);

    fn into_paths(self) -> ParetoSet<RaptorPath>;
}

/// A trip found for boarding after arriving with `source`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Boarding {
    pub source: ArrivalIndex,
    pub trip: TripIndex,
    pub constraint: Option<crate::constrained::TransferConstraint>,
}

/// Resolves boarding at a position with constrained transfers for each source arrival. `regular`
/// marks sources that may also board the regular way when no constraint matches them.
pub(crate) fn constrained_boardings<T: TripSchedule>(
    ctx: &WorkerContext<'_, T>,
    arena: &ArrivalArena,
    route: RouteIndex,
    stop_pos: usize,
    transfers: &[TransferForPattern],
    sources: &[(ArrivalIndex, bool)],
) -> Vec<Boarding> {
    let timetable = &ctx.network.route(route).timetable;
    let mut boardings = Vec::new();
    for &(source, regular) in sources {
        let arrival = &arena[source];
        let slack = ctx.boarding_slack(arrival);
        let context = arena.last_transit(source).and_then(|transit| ctx.point_context(&arena[transit]));
        let outcome = match &context {
            Some(context) => find_constrained_boarding(timetable, stop_pos, transfers, context, arrival.time, slack),
            None => ConstrainedBoarding::NoConstraint,
        };
        match outcome {
            ConstrainedBoarding::Board { trip, constraint } => boardings.push(Boarding { source, trip, constraint }),
            ConstrainedBoarding::NoConstraint if regular => {
                let earliest = ctx.direction.plus(arrival.time, slack);
                if let Some(trip) = ctx.direction.find_trip(timetable, stop_pos, earliest, None) {
                    boardings.push(Boarding { source, trip, constraint: None });
                }
            }
            ConstrainedBoarding::NoConstraint | ConstrainedBoarding::Blocked => {}
        }
    }
    boardings
}
