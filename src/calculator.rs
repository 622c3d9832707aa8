use crate::network::{RouteTimeTable, Timestamp, TripIndex, TripSchedule};

/// Time arithmetic for searching forward from a departure time or backward from an arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitCalculator {
    #[default]
    Forward,
    Reverse,
}

impl TransitCalculator {
    pub fn is_forward(self) -> bool {
        self == TransitCalculator::Forward
    }

    pub fn unreached(self) -> Timestamp {
        match self {
            TransitCalculator::Forward => Timestamp::MAX,
            TransitCalculator::Reverse => Timestamp::MIN,
        }
    }

    pub fn is_better(self, time: Timestamp, than: Timestamp) -> bool {
        match self {
            TransitCalculator::Forward => time < than,
            TransitCalculator::Reverse => time > than,
        }
    }

    pub fn is_better_or_equal(self, time: Timestamp, than: Timestamp) -> bool {
        time == than || self.is_better(time, than)
    }

    pub fn plus(self, time: Timestamp, duration: Timestamp) -> Timestamp {
        match self {
            TransitCalculator::Forward => time.saturating_add(duration),
            TransitCalculator::Reverse => time.saturating_sub(duration),
        }
    }

    pub fn minus(self, time: Timestamp, duration: Timestamp) -> Timestamp {
        self.plus(time, -duration)
    }

    /// Time elapsed from `from` to `to` in search order.
    pub fn duration(self, from: Timestamp, to: Timestamp) -> Timestamp {
        match self {
            TransitCalculator::Forward => to - from,
            TransitCalculator::Reverse => from - to,
        }
    }

    /// True if `time` violates the limit.
    pub fn exceeds(self, time: Timestamp, limit: Option<Timestamp>) -> bool {
        limit.is_some_and(|limit| self.is_better(limit, time))
    }

    /// Stop positions of a pattern in search order, starting at `first`.
    pub fn positions(self, num_stops: usize, first: usize) -> StopPositions {
        StopPositions { next: (first < num_stops).then_some(first), num_stops, forward: self.is_forward() }
    }

    /// The position where a pattern is first visited in search order.
    pub fn first_position(self, num_stops: usize) -> usize {
        match self {
            TransitCalculator::Forward => 0,
            TransitCalculator::Reverse => num_stops - 1,
        }
    }

    /// Whether `pos` comes before `other` in search order.
    pub fn is_before(self, pos: usize, other: usize) -> bool {
        match self {
            TransitCalculator::Forward => pos < other,
            TransitCalculator::Reverse => pos > other,
        }
    }

    /// Boarding at the last position in search order leads nowhere.
    pub fn can_board_at(self, pos: usize, num_stops: usize) -> bool {
        match self {
            TransitCalculator::Forward => pos + 1 < num_stops,
            TransitCalculator::Reverse => pos > 0,
        }
    }

    pub fn board_time<T: TripSchedule>(self, trip: &T, pos: usize) -> Timestamp {
        match self {
            TransitCalculator::Forward => trip.departure(pos),
            TransitCalculator::Reverse => trip.arrival(pos),
        }
    }

    pub fn alight_time<T: TripSchedule>(self, trip: &T, pos: usize) -> Timestamp {
        match self {
            TransitCalculator::Forward => trip.arrival(pos),
            TransitCalculator::Reverse => trip.departure(pos),
        }
    }

    /// A trip boardable at `earliest_board_time` that improves on `current`. Earlier in forward
    /// search, later in reverse.
    pub fn find_trip<T: TripSchedule>(
        self,
        timetable: &RouteTimeTable<T>,
        pos: usize,
        earliest_board_time: Timestamp,
        current: Option<TripIndex>,
    ) -> Option<TripIndex> {
        match self {
            TransitCalculator::Forward => {
                let before = current.map_or(timetable.num_trips(), |trip| trip as usize);
                timetable.find_trip_departing_at_or_after(pos, earliest_board_time, before)
            }
            TransitCalculator::Reverse => {
                timetable.find_trip_arriving_at_or_before(pos, earliest_board_time, current.map(|trip| trip as usize))
            }
        }
    }

    /// Departure times of the Range-Raptor iterations, processed latest first in forward search:
    /// `origin + window - step` down to `origin`. A zero window is a single iteration.
    pub fn iteration_departure_times(self, origin: Timestamp, window: Timestamp, step: Timestamp) -> Vec<Timestamp> {
        let step = step.max(1);
        let n = ((window.max(0) + step - 1) / step).max(1);
        match self {
            TransitCalculator::Forward => (0..n).rev().map(|i| origin + i * step).collect(),
            TransitCalculator::Reverse => (0..n).rev().map(|i| origin - i * step).collect(),
        }
    }
}

pub struct StopPositions {
    next: Option<usize>,
    num_stops: usize,
    forward: bool,
}

impl Iterator for StopPositions {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = if self.forward {
            (current + 1 < self.num_stops).then_some(current + 1)
        } else {
            current.checked_sub(1)
        };
        Some(current)
    }
}
