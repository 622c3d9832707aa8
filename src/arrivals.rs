use std::ops::Index;
use std::sync::Arc;

use crate::constrained::TransferConstraint;
use crate::journey::PathLeg;
use crate::network::{PathfindingCost, RouteIndex, StopIndex, Timestamp, TripIndex};

pub(crate) type ArrivalIndex = u32;

/// How a stop arrival was reached.
#[derive(Debug, Clone)]
pub(crate) enum ArrivalKind {
    Access {
        access: usize,
    },
    OnBoardAccess {
        access: usize,
    },
    Transit {
        route: RouteIndex,
        trip: TripIndex,
        board_pos: usize,
        alight_pos: usize,
        board_stop: StopIndex,
        board_time: Timestamp,
        constraint: Option<TransferConstraint>,
    },
    Transfer {
        from_stop: StopIndex,
        duration: Timestamp,
        c1: PathfindingCost,
    },
    // Continues a journey found by the search segment before a via location.
    Via {
        prefix: Arc<[PathLeg]>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct StopArrival {
    pub stop: StopIndex,
    pub time: Timestamp,
    pub round: u8,
    pub c1: PathfindingCost,
    pub via_progress: u8,
    pub arrived_on_board: bool,
    // Latest possible start of the journey. Only exact once a ride has been boarded.
    pub start_time: Timestamp,
    pub kind: ArrivalKind,
    pub previous: Option<ArrivalIndex>,
}

impl StopArrival {
    pub fn is_transit(&self) -> bool {
        matches!(self.kind, ArrivalKind::Transit { .. })
    }

    /// Waiting before the next boarding is free when the journey starts here.
    pub fn is_start_of_journey(&self) -> bool {
        matches!(self.kind, ArrivalKind::Access { .. } | ArrivalKind::OnBoardAccess { .. })
    }
}

/// Append-only storage for stop arrivals. A back-pointer always refers to an earlier entry,
/// so following `previous` always terminates.
#[derive(Debug, Default)]
pub(crate) struct ArrivalArena {
    arrivals: Vec<StopArrival>,
}

impl ArrivalArena {
    pub fn push(&mut self, arrival: StopArrival) -> ArrivalIndex {
        let idx = self.arrivals.len() as ArrivalIndex;
        debug_assert!(arrival.previous.is_none_or(|previous| previous < idx));
        self.arrivals.push(arrival);
        idx
    }

    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    /// Indices from the first arrival of the journey up to and including `last`.
    pub fn chain(&self, last: ArrivalIndex) -> Vec<ArrivalIndex> {
        let mut chain = Vec::new();
        let mut current = Some(last);
        while let Some(idx) = current {
            chain.push(idx);
            current = self[idx].previous;
        }
        chain.reverse();
        chain
    }

    /// The transit arrival this arrival continues from, if any. Used to match constrained transfers.
    pub fn last_transit(&self, idx: ArrivalIndex) -> Option<ArrivalIndex> {
        let arrival = &self[idx];
        match arrival.kind {
            ArrivalKind::Transit { .. } => Some(idx),
            ArrivalKind::Transfer { .. } => arrival.previous.filter(|&previous| self[previous].is_transit()),
            _ => None,
        }
    }
}

impl Index<ArrivalIndex> for ArrivalArena {
    type Output = StopArrival;

    fn index(&self, idx: ArrivalIndex) -> &StopArrival {
        &self.arrivals[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(stop: StopIndex, kind: ArrivalKind, previous: Option<ArrivalIndex>) -> StopArrival {
        StopArrival {
            stop,
            time: 0,
            round: 0,
            c1: 0,
            via_progress: 0,
            arrived_on_board: false,
            start_time: 0,
            kind,
            previous,
        }
    }

    fn transit() -> ArrivalKind {
        ArrivalKind::Transit {
            route: 0,
            trip: 0,
            board_pos: 0,
            alight_pos: 1,
            board_stop: 0,
            board_time: 0,
            constraint: None,
        }
    }

    #[test]
    fn chain_walks_back_to_the_access() {
        let mut arena = ArrivalArena::default();
        let access = arena.push(arrival(0, ArrivalKind::Access { access: 0 }, None));
        let ride = arena.push(arrival(1, transit(), Some(access)));
        let walk = arena.push(arrival(2, ArrivalKind::Transfer { from_stop: 1, duration: 60, c1: 120 }, Some(ride)));
        assert_eq!(arena.chain(walk), vec![access, ride, walk]);
        assert_eq!(arena.last_transit(walk), Some(ride));
        assert_eq!(arena.last_transit(ride), Some(ride));
        assert_eq!(arena.last_transit(access), None);
        assert_eq!(arena.len(), 3);
    }
}
