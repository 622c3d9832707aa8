use chrono::Duration;

use crate::network::Timestamp;

/// Rounds `value` up to the closest multiple of `step`.
pub fn ceiling(value: i64, step: i64) -> i64 {
    let remainder = value.rem_euclid(step);
    if remainder == 0 {
        value
    } else {
        value - remainder + step
    }
}

/// Derives a search window from the minimum travel time found by the forward heuristic search.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicSearchWindow {
    pub min_transit_time_coefficient: f64,
    pub min_window: Duration,
    pub max_window: Duration,
    pub step: Duration,
}

impl Default for DynamicSearchWindow {
    fn default() -> Self {
        Self {
            min_transit_time_coefficient: 0.5,
            min_window: Duration::minutes(40),
            max_window: Duration::hours(3),
            step: Duration::minutes(10),
        }
    }
}

impl DynamicSearchWindow {
    /// The window in seconds for a journey taking at least `min_travel_duration` seconds.
    pub fn calculate(&self, min_travel_duration: Timestamp) -> Timestamp {
        let raw = self.min_window.num_seconds() as f64 + self.min_transit_time_coefficient * min_travel_duration as f64;
        let window = ceiling(raw.ceil() as i64, self.step.num_seconds().max(1));
        window.min(self.max_window.num_seconds()) as Timestamp
    }
}

/// Adjusts the search window between pages of results.
#[derive(Debug, Clone, PartialEq)]
pub struct PagingSearchWindowAdjuster {
    min_window: Duration,
    max_window: Duration,
    paging_steps: Vec<Duration>,
}

impl Default for PagingSearchWindowAdjuster {
    fn default() -> Self {
        Self::new(
            Duration::minutes(10),
            Duration::days(1),
            vec![Duration::hours(5), Duration::minutes(80), Duration::minutes(30), Duration::minutes(10)],
        )
    }
}

impl PagingSearchWindowAdjuster {
    /// `paging_steps[n]` is added to the window when a search found `n` results but more were requested.
    pub fn new(min_window: Duration, max_window: Duration, paging_steps: Vec<Duration>) -> Self {
        Self { min_window, max_window, paging_steps }
    }

    /// Widens the window when fewer results than requested were found.
    pub fn increase_or_keep_search_window(&self, window: Duration, n_requested: usize, n_found: usize) -> Duration {
        if n_found >= n_requested {
            return window;
        }
        let step = self.paging_steps.get(n_found).copied().unwrap_or_else(Duration::zero);
        (window + step).min(self.max_window)
    }

    /// Shrinks the window so the next page starts where results were cropped. With `crop_tail`
    /// the window ends at the first removed departure, otherwise it starts there.
    pub fn decrease_search_window(
        &self,
        window: Duration,
        search_window_start: Timestamp,
        first_removed_departure: Timestamp,
        crop_tail: bool,
    ) -> Duration {
        let seconds = if crop_tail {
            first_removed_departure - search_window_start
        } else {
            search_window_start + window.num_seconds() as Timestamp - first_removed_departure
        };
        self.normalize_search_window(seconds as i64)
    }

    /// Clamps the window and rounds it up to 10 minutes, or to 30 minutes above 4 hours.
    pub fn normalize_search_window(&self, seconds: i64) -> Duration {
        let min = self.min_window.num_seconds();
        let max = self.max_window.num_seconds();
        if seconds <= min {
            return self.min_window;
        }
        let step = if seconds <= Duration::hours(4).num_seconds() { 10 * 60 } else { 30 * 60 };
        Duration::seconds(ceiling(seconds, step).min(max))
    }
}

/// [`PagingSearchWindowAdjuster::normalize_search_window`] with the default limits.
pub fn normalize_search_window(seconds: i64) -> Duration {
    PagingSearchWindowAdjuster::default().normalize_search_window(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_rounds_towards_positive_infinity() {
        assert_eq!(ceiling(-1, 2), 0);
        assert_eq!(ceiling(-2, 2), -2);
        assert_eq!(ceiling(3, 2), 4);
        assert_eq!(ceiling(4, 3), 6);
        assert_eq!(ceiling(-2, 3), 0);
        assert_eq!(ceiling(-3, 3), -3);
    }

    #[test]
    fn normalize() {
        let minutes = |m: i64| normalize_search_window(m * 60).num_minutes();
        assert_eq!(minutes(-10), 10);
        assert_eq!(minutes(0), 10);
        assert_eq!(minutes(10), 10);
        assert_eq!(minutes(11), 20);
        assert_eq!(minutes(240), 240);
        assert_eq!(minutes(241), 270);
        assert_eq!(minutes(1410), 1410);
        assert_eq!(minutes(1440), 1440);
        assert_eq!(normalize_search_window(99_999_999).num_minutes(), 1440);
    }

    #[test]
    fn increase_by_number_of_results_found() {
        let adjuster = PagingSearchWindowAdjuster::default();
        let increase = |found| adjuster.increase_or_keep_search_window(Duration::zero(), 20, found);
        assert_eq!(increase(0), Duration::hours(5));
        assert_eq!(increase(1), Duration::minutes(80));
        assert_eq!(increase(2), Duration::minutes(30));
        assert_eq!(increase(3), Duration::minutes(10));
        assert_eq!(increase(4), Duration::zero());
        let window = Duration::minutes(30);
        assert_eq!(adjuster.increase_or_keep_search_window(window, 5, 5), window);
        assert_eq!(adjuster.increase_or_keep_search_window(window, 1, 3), window);
    }

    #[test]
    fn decrease_crops_head_or_tail() {
        let adjuster = PagingSearchWindowAdjuster::default();
        let start = 12 * 3600;
        let decrease = |window: Duration, removed: i64, tail| {
            adjuster.decrease_search_window(window, start, start + removed as Timestamp, tail)
        };
        assert_eq!(decrease(Duration::hours(2), 70 * 60, true), Duration::minutes(70));
        assert_eq!(decrease(Duration::hours(2), 70 * 60, false), Duration::minutes(50));
        assert_eq!(decrease(Duration::hours(5), 4 * 3600, true), Duration::hours(4));
        assert_eq!(decrease(Duration::hours(5), 4 * 3600, false), Duration::hours(1));
    }

    #[test]
    fn dynamic_window_scales_with_travel_time() {
        let window = DynamicSearchWindow::default();
        assert_eq!(window.calculate(0), 40 * 60);
        // 40m + 0.5 * 25m = 52.5m, rounded up to 60m.
        assert_eq!(window.calculate(25 * 60), 60 * 60);
        assert_eq!(window.calculate(10 * 3600), 3 * 3600);
    }
}
