use std::cmp::Reverse;
use std::fmt::Display;
use std::sync::Arc;

use crate::access_egress::{AccessEgress, OnBoardAccess, PathsByStop};
use crate::arrivals::{ArrivalArena, ArrivalIndex, ArrivalKind};
use crate::constrained::TransferConstraint;
use crate::cost::CostCalculator;
use crate::network::{Network, PathfindingCost, RouteIndex, StopIndex, Timestamp, TripId, TripIndex, TripSchedule};
use crate::pareto::ParetoComparator;
use crate::raptor::RaptorError;
use crate::request::{PathSortOrder, Profile, RaptorRequest};
use crate::utils;

#[derive(Debug, Clone, PartialEq)]
pub struct TransitLeg {
    pub route: RouteIndex,
    pub line: Arc<str>,
    pub trip: TripIndex,
    pub trip_id: TripId,
    pub board_stop: StopIndex,
    pub board_pos: usize,
    pub board_time: Timestamp,
    pub alight_stop: StopIndex,
    pub alight_pos: usize,
    pub alight_time: Timestamp,
    pub constraint: Option<TransferConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathLeg {
    Access {
        stop: StopIndex,
        from_time: Timestamp,
        to_time: Timestamp,
        c1: PathfindingCost,
        number_of_rides: u8,
    },
    OnBoardAccess {
        stop: StopIndex,
        time: Timestamp,
        c1: PathfindingCost,
    },
    Transit(TransitLeg),
    Transfer {
        from_stop: StopIndex,
        to_stop: StopIndex,
        from_time: Timestamp,
        to_time: Timestamp,
        c1: PathfindingCost,
    },
    Egress {
        stop: StopIndex,
        from_time: Timestamp,
        to_time: Timestamp,
        c1: PathfindingCost,
        number_of_rides: u8,
    },
}

impl PathLeg {
    pub fn from_time(&self) -> Timestamp {
        match self {
            PathLeg::Access { from_time, .. }
            | PathLeg::Transfer { from_time, .. }
            | PathLeg::Egress { from_time, .. } => *from_time,
            PathLeg::OnBoardAccess { time, .. } => *time,
            PathLeg::Transit(leg) => leg.board_time,
        }
    }

    pub fn to_time(&self) -> Timestamp {
        match self {
            PathLeg::Access { to_time, .. } | PathLeg::Transfer { to_time, .. } | PathLeg::Egress { to_time, .. } => {
                *to_time
            }
            PathLeg::OnBoardAccess { time, .. } => *time,
            PathLeg::Transit(leg) => leg.alight_time,
        }
    }

    /// The stop the leg ends at. Egress legs end at the destination.
    pub fn to_stop(&self) -> Option<StopIndex> {
        match self {
            PathLeg::Access { stop, .. } | PathLeg::OnBoardAccess { stop, .. } => Some(*stop),
            PathLeg::Transit(leg) => Some(leg.alight_stop),
            PathLeg::Transfer { to_stop, .. } => Some(*to_stop),
            PathLeg::Egress { .. } => None,
        }
    }

    fn rides(&self) -> usize {
        match self {
            PathLeg::Access { number_of_rides, .. } | PathLeg::Egress { number_of_rides, .. } => {
                *number_of_rides as usize
            }
            PathLeg::Transit(_) => 1,
            _ => 0,
        }
    }
}

fn street_leg_str(f: &mut std::fmt::Formatter<'_>, duration: Timestamp, rides: u8) -> std::fmt::Result {
    if rides > 0 {
        write!(f, "Flex {} {}x", utils::get_duration_str(duration), rides)
    } else {
        write!(f, "Walk {}", utils::get_duration_str(duration))
    }
}

impl Display for PathLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathLeg::Access { from_time, to_time, number_of_rides, .. }
            | PathLeg::Egress { from_time, to_time, number_of_rides, .. } => {
                street_leg_str(f, to_time - from_time, *number_of_rides)
            }
            PathLeg::OnBoardAccess { .. } => write!(f, "OnBoard"),
            PathLeg::Transit(leg) => {
                write!(
                    f,
                    "{} {} {}",
                    leg.line,
                    utils::get_time_str(leg.board_time),
                    utils::get_time_str(leg.alight_time)
                )?;
                if let Some(constraint) = leg.constraint {
                    write!(f, " ({constraint})")?;
                }
                Ok(())
            }
            PathLeg::Transfer { from_time, to_time, .. } => {
                write!(f, "Walk {}", utils::get_duration_str(to_time - from_time))
            }
        }
    }
}

/// A journey from origin to destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RaptorPath {
    pub legs: Vec<PathLeg>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub number_of_transfers: u8,
    pub c1: PathfindingCost,
}

impl RaptorPath {
    pub(crate) fn new(legs: Vec<PathLeg>, cost: &CostCalculator) -> Self {
        let start_time = legs.first().map_or(0, PathLeg::from_time);
        let end_time = legs.last().map_or(0, PathLeg::to_time);
        let rides: usize = legs.iter().map(PathLeg::rides).sum();
        let c1 = cost.path_cost(&legs);
        Self { legs, start_time, end_time, number_of_transfers: rides.saturating_sub(1) as u8, c1 }
    }

    pub fn duration(&self) -> Timestamp {
        self.end_time - self.start_time
    }

    pub fn transit_legs(&self) -> impl Iterator<Item = &TransitLeg> {
        self.legs.iter().filter_map(|leg| match leg {
            PathLeg::Transit(transit) => Some(transit),
            _ => None,
        })
    }

    pub fn number_of_rides(&self) -> usize {
        self.legs.iter().map(PathLeg::rides).sum()
    }

    /// A multi-line description using the stop names of the network.
    pub fn describe<'a, T: TripSchedule>(&'a self, network: &'a Network<T>) -> JourneyDisplay<'a, T> {
        JourneyDisplay { path: self, network }
    }
}

impl Display for RaptorPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, leg) in self.legs.iter().enumerate() {
            write!(f, "{leg}")?;
            if i + 1 < self.legs.len() {
                if let Some(stop) = leg.to_stop() {
                    write!(f, " ~ {stop} ~ ")?;
                }
            }
        }
        write!(
            f,
            " [{} {} {} Tx{} C1 {}]",
            utils::get_time_str(self.start_time),
            utils::get_time_str(self.end_time),
            utils::get_duration_str(self.duration()),
            self.number_of_transfers,
            self.c1
        )
    }
}

pub struct JourneyDisplay<'a, T> {
    path: &'a RaptorPath,
    network: &'a Network<T>,
}

impl<T: TripSchedule> Display for JourneyDisplay<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-----------------------------------------------")?;
        let stop_name = |stop: StopIndex| &self.network.get_stop(stop).name;
        for leg in &self.path.legs {
            match leg {
                PathLeg::Transit(transit) => {
                    writeln!(f)?;
                    writeln!(
                        f,
                        "Board at {} at {} ({} line).",
                        stop_name(transit.board_stop),
                        utils::get_time_str(transit.board_time),
                        transit.line,
                    )?;
                    let alight_time = utils::get_time_str(transit.alight_time);
                    write!(f, "Arrive at {} at {}.", stop_name(transit.alight_stop), alight_time)?;
                }
                PathLeg::Transfer { from_stop, to_stop, from_time, to_time, .. } => {
                    writeln!(f)?;
                    write!(
                        f,
                        "Walk from {} to {} ({}).",
                        stop_name(*from_stop),
                        stop_name(*to_stop),
                        utils::get_duration_str(to_time - from_time)
                    )?;
                }
                _ => {}
            }
        }
        writeln!(f)?;
        writeln!(f)?;
        writeln!(f, "Total journey time: {} minutes.", self.path.duration() / 60)?;
        writeln!(f, "Generalized cost: {}.", self.path.c1)?;
        writeln!(f, "-----------------------------------------------")
    }
}

/// Pareto comparison of complete paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathComparator {
    /// Compare on a later start instead of a shorter duration.
    pub departure_time: bool,
    pub include_c1: bool,
}

impl PathComparator {
    pub fn for_request(request: &RaptorRequest) -> Self {
        match request.profile {
            Profile::MultiCriteria => {
                Self { departure_time: request.search_params.timetable, include_c1: true }
            }
            Profile::Standard => Self { departure_time: true, include_c1: false },
            Profile::MinTravelDuration => Self { departure_time: false, include_c1: false },
        }
    }
}

impl ParetoComparator<RaptorPath> for PathComparator {
    fn dominates(&self, left: &RaptorPath, right: &RaptorPath) -> bool {
        let departure = if self.departure_time {
            left.start_time >= right.start_time
        } else {
            left.duration() <= right.duration()
        };
        left.end_time <= right.end_time
            && departure
            && left.number_of_transfers <= right.number_of_transfers
            && (!self.include_c1 || left.c1 <= right.c1)
    }
}

pub fn sort_paths(paths: &mut [RaptorPath], order: PathSortOrder) {
    match order {
        PathSortOrder::ArrivalTime => {
            paths.sort_by_key(|p| (p.end_time, p.number_of_transfers, p.c1, Reverse(p.start_time)))
        }
        PathSortOrder::DepartureTime => {
            paths.sort_by_key(|p| (Reverse(p.start_time), p.end_time, p.number_of_transfers, p.c1))
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum JourneyError {
    #[error("No journey found.")]
    NoJourneyFound,
    #[error(transparent)]
    Search(#[from] RaptorError),
}

pub type JourneyResult = Result<RaptorPath, JourneyError>;

/// Turns chains of stop arrivals into paths.
pub(crate) struct PathBuilder<'a, T> {
    pub network: &'a Network<T>,
    pub accesses: &'a PathsByStop,
    pub on_board_accesses: &'a [OnBoardAccess],
    pub cost: &'a CostCalculator,
}

impl<T: TripSchedule> PathBuilder<'_, T> {
    pub fn legs(&self, arena: &ArrivalArena, last: ArrivalIndex) -> Vec<PathLeg> {
        let mut legs: Vec<PathLeg> = Vec::new();
        let mut access_before_ride: Option<&AccessEgress> = None;
        for idx in arena.chain(last) {
            let arrival = &arena[idx];
            match &arrival.kind {
                ArrivalKind::Via { prefix } => legs.extend(prefix.iter().cloned()),
                ArrivalKind::Access { access } => {
                    let path = self.accesses.get(*access);
                    legs.push(PathLeg::Access {
                        stop: path.stop,
                        from_time: arrival.time - path.duration,
                        to_time: arrival.time,
                        c1: path.c1,
                        number_of_rides: path.number_of_rides,
                    });
                    access_before_ride = Some(path);
                    continue;
                }
                ArrivalKind::OnBoardAccess { access } => legs.push(PathLeg::OnBoardAccess {
                    stop: arrival.stop,
                    time: arrival.time,
                    c1: self.on_board_accesses[*access].c1,
                }),
                ArrivalKind::Transit { route, trip, board_pos, alight_pos, board_stop, board_time, constraint } => {
                    // Leave as late as possible for the first ride.
                    if let (Some(path), Some(PathLeg::Access { from_time, to_time, .. })) =
                        (access_before_ride, legs.last_mut())
                    {
                        *from_time = path.latest_departure_time(board_time - path.duration);
                        *to_time = *from_time + path.duration;
                    }
                    let pattern = &self.network.route(*route).pattern;
                    legs.push(PathLeg::Transit(TransitLeg {
                        route: *route,
                        line: Arc::clone(&pattern.line),
                        trip: *trip,
                        trip_id: self.network.route(*route).get_trip(*trip).trip_id(),
                        board_stop: *board_stop,
                        board_pos: *board_pos,
                        board_time: *board_time,
                        alight_stop: arrival.stop,
                        alight_pos: *alight_pos,
                        alight_time: arrival.time,
                        constraint: *constraint,
                    }));
                }
                ArrivalKind::Transfer { from_stop, duration, c1 } => legs.push(PathLeg::Transfer {
                    from_stop: *from_stop,
                    to_stop: arrival.stop,
                    from_time: arrival.time - duration,
                    to_time: arrival.time,
                    c1: *c1,
                }),
            }
            access_before_ride = None;
        }
        legs
    }

    pub fn path(
        &self,
        arena: &ArrivalArena,
        last: ArrivalIndex,
        egress: &AccessEgress,
        departure: Timestamp,
    ) -> RaptorPath {
        let mut legs = self.legs(arena, last);
        legs.push(PathLeg::Egress {
            stop: egress.stop,
            from_time: departure,
            to_time: departure + egress.duration,
            c1: egress.c1,
            number_of_rides: egress.number_of_rides,
        });
        RaptorPath::new(legs, self.cost)
    }
}
