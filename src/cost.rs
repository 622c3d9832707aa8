use std::sync::Arc;

use crate::journey::PathLeg;
use crate::network::{PathfindingCost, StopIndex, Timestamp};
use crate::request::CostParams;

fn weighted(seconds: Timestamp, reluctance: f64) -> PathfindingCost {
    (seconds as f64 * reluctance).round() as PathfindingCost
}

/// Generalized cost (c1) of rides, waits and boardings.
#[derive(Debug, Clone, PartialEq)]
pub struct CostCalculator {
    board_cost: PathfindingCost,
    transfer_cost: PathfindingCost,
    wait_reluctance: f64,
    transit_reluctance: f64,
    stop_transfer_cost: Option<Arc<[PathfindingCost]>>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(&CostParams::default())
    }
}

impl CostCalculator {
    pub fn new(params: &CostParams) -> Self {
        Self {
            board_cost: params.board_cost,
            transfer_cost: params.transfer_cost,
            wait_reluctance: params.wait_reluctance,
            transit_reluctance: params.transit_reluctance,
            stop_transfer_cost: params.stop_transfer_cost.clone(),
        }
    }

    pub fn boarding_cost(&self, first_ride: bool, wait: Timestamp, stop: StopIndex) -> PathfindingCost {
        let transfer_cost = if first_ride { 0 } else { self.transfer_cost + self.stop_transfer_cost(stop) };
        self.board_cost + transfer_cost + self.wait_cost(wait)
    }

    /// Charged on every alighting, since it is not yet known whether a transfer follows.
    pub fn alighting_cost(&self, stop: StopIndex) -> PathfindingCost {
        self.stop_transfer_cost(stop)
    }

    /// A street egress right after alighting ends the journey there, so the alighting cost
    /// charged at its stop is taken back.
    pub fn egress_cost(&self, egress_c1: PathfindingCost, stop: StopIndex, after_alighting: bool) -> PathfindingCost {
        if after_alighting {
            egress_c1 - self.stop_transfer_cost(stop)
        } else {
            egress_c1
        }
    }

    pub fn stop_transfer_cost(&self, stop: StopIndex) -> PathfindingCost {
        self.stop_transfer_cost.as_ref().and_then(|costs| costs.get(stop as usize).copied()).unwrap_or(0)
    }

    pub fn wait_cost(&self, wait: Timestamp) -> PathfindingCost {
        weighted(wait, self.wait_reluctance)
    }

    pub fn transit_cost(&self, ride_duration: Timestamp) -> PathfindingCost {
        weighted(ride_duration, self.transit_reluctance)
    }

    /// The ride cost up to `time` is `relative_cost + transit_cost(time)`. Rides on the same
    /// pattern compare on this value.
    pub fn relative_ride_cost(&self, c1_at_board: PathfindingCost, board_time: Timestamp) -> PathfindingCost {
        c1_at_board - self.transit_cost(board_time)
    }

    /// The c1 of a complete path. Waiting right after an access leg is free because the access
    /// is time-shifted to the boarding.
    pub fn path_cost(&self, legs: &[PathLeg]) -> PathfindingCost {
        let mut c1 = 0;
        let mut rides = 0;
        let mut previous: Option<&PathLeg> = None;
        for leg in legs {
            match leg {
                PathLeg::Access { c1: access_c1, number_of_rides, .. } => {
                    c1 += access_c1;
                    rides += *number_of_rides as usize;
                }
                PathLeg::OnBoardAccess { c1: access_c1, .. } => c1 += access_c1,
                PathLeg::Transit(transit) => {
                    let wait = match previous {
                        None | Some(PathLeg::Access { .. }) | Some(PathLeg::OnBoardAccess { .. }) => 0,
                        Some(leg) => transit.board_time - leg.to_time(),
                    };
                    c1 += self.boarding_cost(rides == 0, wait, transit.board_stop);
                    c1 += self.transit_cost(transit.alight_time - transit.board_time);
                    c1 += self.alighting_cost(transit.alight_stop);
                    rides += 1;
                }
                PathLeg::Transfer { c1: transfer_c1, .. } => c1 += transfer_c1,
                PathLeg::Egress { stop, c1: egress_c1, from_time, number_of_rides, .. } => {
                    let wait = previous.map_or(0, |leg| from_time - leg.to_time());
                    let after_alighting = *number_of_rides == 0 && matches!(previous, Some(PathLeg::Transit(_)));
                    c1 += self.egress_cost(*egress_c1, *stop, after_alighting) + self.wait_cost(wait);
                }
            }
            previous = Some(leg);
        }
        c1
    }
}
