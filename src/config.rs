use std::time::Duration;

use crate::network::Timestamp;
use crate::request::DEFAULT_MAX_NUMBER_OF_TRANSFERS;
use crate::search_window::DynamicSearchWindow;
use crate::transfer_cache::RaptorRequestTransferCache;

/// Service-wide settings. Requests carry their own costs and budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RaptorConfig {
    pub default_max_number_of_transfers: u8,
    /// Seconds between two Range-Raptor iterations.
    pub iteration_step: Timestamp,
    pub dynamic_search_window: DynamicSearchWindow,
    /// Applies when the request budget has no timeout.
    pub default_search_timeout: Option<Duration>,
    pub transfer_cache_max_size: usize,
}

impl Default for RaptorConfig {
    fn default() -> Self {
        Self {
            default_max_number_of_transfers: DEFAULT_MAX_NUMBER_OF_TRANSFERS,
            iteration_step: 60,
            dynamic_search_window: DynamicSearchWindow::default(),
            default_search_timeout: None,
            transfer_cache_max_size: 25,
        }
    }
}

impl RaptorConfig {
    pub fn with_default_max_number_of_transfers(mut self, transfers: u8) -> Self {
        self.default_max_number_of_transfers = transfers;
        self
    }

    pub fn with_iteration_step(mut self, seconds: Timestamp) -> Self {
        self.iteration_step = seconds.max(1);
        self
    }

    pub fn with_dynamic_search_window(mut self, window: DynamicSearchWindow) -> Self {
        self.dynamic_search_window = window;
        self
    }

    pub fn with_default_search_timeout(mut self, timeout: Duration) -> Self {
        self.default_search_timeout = Some(timeout);
        self
    }

    pub fn with_transfer_cache_max_size(mut self, size: usize) -> Self {
        self.transfer_cache_max_size = size;
        self
    }

    pub fn transfer_cache(&self) -> RaptorRequestTransferCache {
        RaptorRequestTransferCache::new(self.transfer_cache_max_size)
    }
}
