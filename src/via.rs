use std::sync::Arc;

use crate::arrivals::{ArrivalArena, ArrivalIndex, ArrivalKind, StopArrival};
use crate::journey::PathLeg;
use crate::network::{PathfindingCost, StopIndex, Timestamp, TripSchedule};
use crate::worker::{RangeRaptorWorker, Worker, WorkerContext};

/// An arrival at a via location, handed from one search segment to the next.
#[derive(Debug, Clone)]
pub(crate) struct ViaArrival {
    pub stop: StopIndex,
    // Includes the minimum wait at the via location.
    pub time: Timestamp,
    pub round: u8,
    pub c1: PathfindingCost,
    pub arrived_on_board: bool,
    pub start_time: Timestamp,
    pub prefix: Arc<[PathLeg]>,
}

impl ViaArrival {
    pub fn from_arrival<T: TripSchedule>(ctx: &WorkerContext<'_, T>, arena: &ArrivalArena, idx: ArrivalIndex) -> Self {
        let arrival = &arena[idx];
        let wait = ctx.via_exit.as_ref().map_or(0, |exit| exit.minimum_wait_time);
        Self {
            stop: arrival.stop,
            time: ctx.direction.plus(arrival.time, wait),
            round: arrival.round,
            c1: arrival.c1 + ctx.cost.wait_cost(wait),
            arrived_on_board: arrival.arrived_on_board,
            start_time: arrival.start_time,
            prefix: Arc::from(ctx.path_builder().legs(arena, idx)),
        }
    }

    /// The first arrival of the next segment.
    pub fn into_stop_arrival(self) -> StopArrival {
        StopArrival {
            stop: self.stop,
            time: self.time,
            round: self.round,
            c1: self.c1,
            via_progress: 0,
            arrived_on_board: self.arrived_on_board,
            start_time: self.start_time,
            kind: ArrivalKind::Via { prefix: self.prefix },
            previous: None,
        }
    }
}

/// Hands the via arrivals of each segment to the segment after it. Segments are visited in
/// order, so a journey may pass several via locations in the same round.
pub(crate) struct ViaConnector;

impl ViaConnector {
    pub fn propagate<W: RangeRaptorWorker>(worker: &mut Worker<W>) {
        let children = worker.children_mut();
        for i in 1..children.len() {
            let arrivals = children[i - 1].take_via_arrivals();
            if !arrivals.is_empty() {
                log::trace!("Connecting {} via arrivals to segment {i}.", arrivals.len());
                children[i].add_via_arrivals(arrivals);
            }
        }
    }
}
