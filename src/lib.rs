pub mod network;

pub use network::{Network, NetworkBuilder, TransitData, TripSchedule, TripTimes};

pub mod access_egress;

pub use access_egress::{AccessEgress, OnBoardAccess};

pub mod request;

pub use request::{Profile, RaptorRequest, SearchBudget, ViaLocation};

pub mod direct;

pub use direct::{DirectTransitRequest, RelaxFunction, RelaxedLimitedTransferRequest};

pub mod journey;

pub use journey::{JourneyError, PathLeg, RaptorPath};

pub mod raptor;

pub use raptor::{mc_raptor_query, raptor_query, RaptorError, RaptorResponse, RaptorService, SearchData};

pub mod aggregator;
pub mod calculator;
pub mod config;
pub mod constrained;
pub mod cost;
pub mod heuristic;
pub mod pareto;
pub mod search_window;
pub mod transfer_cache;
pub mod transfer_index;
pub mod utils;

pub use aggregator::RouterResult;
pub use config::RaptorConfig;
pub use worker::WorkerStats;

mod arrivals;
mod multicriteria;
mod standard;
mod strategy;
mod via;
mod worker;
