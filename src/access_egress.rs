use std::collections::HashMap;
use std::fmt::Display;

use crate::network::{PathfindingCost, RouteIndex, StopIndex, Timestamp, TripIndex};
use crate::utils;

pub const SECONDS_PER_DAY: Timestamp = 24 * 3600;

// Walking counts double in the default cost of a street path.
const WALK_RELUCTANCE: PathfindingCost = 2;

/// A daily window in which a street path may be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open: Timestamp,
    pub close: Timestamp,
}

impl OpeningHours {
    pub fn new(open: Timestamp, close: Timestamp) -> Self {
        debug_assert!(0 <= open && open <= close && close <= SECONDS_PER_DAY);
        Self { open, close }
    }

    pub fn earliest_departure_time(&self, time: Timestamp) -> Timestamp {
        let day = time.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        let time_of_day = time - day;
        if time_of_day < self.open {
            day + self.open
        } else if time_of_day <= self.close {
            time
        } else {
            day + SECONDS_PER_DAY + self.open
        }
    }

    pub fn latest_departure_time(&self, time: Timestamp) -> Timestamp {
        let day = time.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        let time_of_day = time - day;
        if time_of_day > self.close {
            day + self.close
        } else if time_of_day >= self.open {
            time
        } else {
            day - SECONDS_PER_DAY + self.close
        }
    }
}

/// A street (or flex) path between the origin/destination and a transit stop.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEgress {
    pub stop: StopIndex,
    pub duration: Timestamp,
    pub c1: PathfindingCost,
    pub number_of_rides: u8,
    pub stop_reached_on_board: bool,
    pub opening_hours: Option<OpeningHours>,
    // Signed so that invalid input can be reported by request validation.
    pub via_locations_visited: i32,
}

impl AccessEgress {
    pub fn walk(stop: StopIndex, duration: Timestamp) -> Self {
        Self {
            stop,
            duration,
            c1: duration * WALK_RELUCTANCE,
            number_of_rides: 0,
            stop_reached_on_board: false,
            opening_hours: None,
            via_locations_visited: 0,
        }
    }

    pub fn free(stop: StopIndex) -> Self {
        Self::walk(stop, 0)
    }

    /// A flexible access/egress containing `rides` transit rides, arriving on board.
    pub fn flex(stop: StopIndex, duration: Timestamp, rides: u8) -> Self {
        Self { number_of_rides: rides, stop_reached_on_board: true, ..Self::walk(stop, duration) }
    }

    pub fn with_cost(mut self, c1: PathfindingCost) -> Self {
        self.c1 = c1;
        self
    }

    pub fn with_opening_hours(mut self, open: Timestamp, close: Timestamp) -> Self {
        self.opening_hours = Some(OpeningHours::new(open, close));
        self
    }

    pub fn with_via_locations_visited(mut self, count: i32) -> Self {
        self.via_locations_visited = count;
        self
    }

    pub fn has_rides(&self) -> bool {
        self.number_of_rides > 0
    }

    pub fn earliest_departure_time(&self, time: Timestamp) -> Timestamp {
        self.opening_hours.map_or(time, |hours| hours.earliest_departure_time(time))
    }

    pub fn latest_departure_time(&self, time: Timestamp) -> Timestamp {
        self.opening_hours.map_or(time, |hours| hours.latest_departure_time(time))
    }

    fn dominates(&self, other: &AccessEgress, include_cost: bool) -> bool {
        // A path restricted by opening hours can never replace one that is always available.
        if self.opening_hours.is_some() && other.opening_hours.is_none() {
            return false;
        }
        self.duration <= other.duration
            && self.number_of_rides <= other.number_of_rides
            && self.via_locations_visited >= other.via_locations_visited
            && (self.stop_reached_on_board || !other.stop_reached_on_board)
            && (!include_cost || self.c1 <= other.c1)
    }
}

impl Display for AccessEgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_rides() {
            write!(f, "Flex {} {}x", utils::get_duration_str(self.duration), self.number_of_rides)?;
        } else {
            write!(f, "Walk {}", utils::get_duration_str(self.duration))?;
        }
        if let Some(hours) = self.opening_hours {
            write!(f, " Open({} {})", utils::get_time_str(hours.open), utils::get_time_str(hours.close))?;
        }
        if self.via_locations_visited > 0 {
            write!(f, " Via{}", self.via_locations_visited)?;
        }
        Ok(())
    }
}

/// Boarding a trip the traveller is already sitting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnBoardAccess {
    pub route: RouteIndex,
    pub trip: TripIndex,
    pub stop_pos: usize,
    pub stop: StopIndex,
    pub c1: PathfindingCost,
}

/// Removes paths dominated by another path to the same stop. Cost only counts for multi-criteria searches.
pub fn remove_non_optimal_paths(paths: &[AccessEgress], include_cost: bool) -> Vec<AccessEgress> {
    let mut optimal: Vec<AccessEgress> = Vec::with_capacity(paths.len());
    for path in paths {
        if optimal.iter().any(|p| p.stop == path.stop && p.dominates(path, include_cost)) {
            continue;
        }
        optimal.retain(|p| p.stop != path.stop || !path.dominates(p, include_cost));
        optimal.push(path.clone());
    }
    optimal
}

/// Access or egress paths grouped by stop.
#[derive(Debug, Clone, Default)]
pub(crate) struct PathsByStop {
    paths: Vec<AccessEgress>,
    by_stop: HashMap<StopIndex, Vec<usize>>,
}

impl PathsByStop {
    pub fn new(paths: Vec<AccessEgress>) -> Self {
        let mut by_stop: HashMap<StopIndex, Vec<usize>> = HashMap::new();
        for (idx, path) in paths.iter().enumerate() {
            by_stop.entry(path.stop).or_default().push(idx);
        }
        Self { paths, by_stop }
    }

    pub fn all(&self) -> &[AccessEgress] {
        &self.paths
    }

    pub fn get(&self, idx: usize) -> &AccessEgress {
        &self.paths[idx]
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains_stop(&self, stop: StopIndex) -> bool {
        self.by_stop.contains_key(&stop)
    }

    pub fn for_stop(&self, stop: StopIndex) -> impl Iterator<Item = (usize, &AccessEgress)> {
        self.by_stop.get(&stop).into_iter().flatten().map(|&idx| (idx, &self.paths[idx]))
    }
}
