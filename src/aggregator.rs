use crate::journey::{PathComparator, RaptorPath};
use crate::pareto::ParetoSet;
use crate::worker::WorkerStats;

/// The paths and stats of one worker, or of several merged into one pareto set.
#[derive(Debug, Default)]
pub struct RouterResult {
    pub paths: ParetoSet<RaptorPath>,
    pub stats: WorkerStats,
}

impl RouterResult {
    pub fn is_destination_reached(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Merges results with one shared comparator. A path dominated by a path of another result
    /// is dropped.
    pub fn merge(results: impl IntoIterator<Item = RouterResult>, comparator: &PathComparator) -> RouterResult {
        let mut merged = RouterResult::default();
        for result in results {
            merged.stats.merge(&result.stats);
            for path in result.paths.into_vec() {
                merged.paths.add(path, comparator);
            }
        }
        merged
    }

    pub fn into_paths(self) -> Vec<RaptorPath> {
        self.paths.into_vec()
    }
}
