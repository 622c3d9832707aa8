use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::network::{PathfindingCost, StopIndex, StreetMode, Timestamp, TransfersByStop};
use crate::request::CostParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkPreferences {
    pub speed: f64,
    pub reluctance: f64,
    pub board_cost: PathfindingCost,
    pub stairs_reluctance: f64,
}

impl Default for WalkPreferences {
    fn default() -> Self {
        Self { speed: 1.33, reluctance: 2.0, board_cost: 600, stairs_reluctance: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BikePreferences {
    pub speed: f64,
    pub reluctance: f64,
    pub board_cost: PathfindingCost,
}

impl Default for BikePreferences {
    fn default() -> Self {
        Self { speed: 5.0, reluctance: 2.0, board_cost: 600 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarPreferences {
    pub speed: f64,
    pub reluctance: f64,
}

impl Default for CarPreferences {
    fn default() -> Self {
        Self { speed: 11.0, reluctance: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelchairPreferences {
    pub stairs_reluctance: f64,
    pub inaccessible_street_reluctance: f64,
}

impl Default for WheelchairPreferences {
    fn default() -> Self {
        Self { stairs_reluctance: 100.0, inaccessible_street_reluctance: 25.0 }
    }
}

/// The routing request as seen by the host. Only part of it is relevant for transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub transfer_mode: StreetMode,
    pub wheelchair: bool,
    pub walk: WalkPreferences,
    pub bike: BikePreferences,
    pub car: CarPreferences,
    pub wheelchair_preferences: WheelchairPreferences,
    pub turn_reluctance: f64,
    pub transit: CostParams,
}

impl Default for RouteRequest {
    fn default() -> Self {
        Self {
            transfer_mode: StreetMode::Walk,
            wheelchair: false,
            walk: WalkPreferences::default(),
            bike: BikePreferences::default(),
            car: CarPreferences::default(),
            wheelchair_preferences: WheelchairPreferences::default(),
            turn_reluctance: 1.0,
            transit: CostParams::default(),
        }
    }
}

/// The subset of a request that influences transfer durations and costs. Preferences of modes
/// not in use are reset, so requests that differ only there share a cache entry.
#[derive(Debug, Clone)]
pub struct StreetRelevantOptions {
    pub mode: StreetMode,
    pub wheelchair: bool,
    pub walk: WalkPreferences,
    pub bike: BikePreferences,
    pub car: CarPreferences,
    pub wheelchair_preferences: WheelchairPreferences,
    pub turn_reluctance: f64,
}

impl StreetRelevantOptions {
    pub fn new(request: &RouteRequest) -> Self {
        let mode = request.transfer_mode;
        Self {
            mode,
            wheelchair: request.wheelchair,
            walk: if mode == StreetMode::Walk { request.walk } else { WalkPreferences::default() },
            bike: if mode == StreetMode::Bike { request.bike } else { BikePreferences::default() },
            car: if mode == StreetMode::Car { request.car } else { CarPreferences::default() },
            wheelchair_preferences: if request.wheelchair {
                request.wheelchair_preferences
            } else {
                WheelchairPreferences::default()
            },
            turn_reluctance: request.turn_reluctance,
        }
    }

    // Floats compare by their bits so the options can be a map key.
    fn bits(&self) -> (StreetMode, bool, [u64; 10], [PathfindingCost; 2]) {
        (
            self.mode,
            self.wheelchair,
            [
                self.walk.speed.to_bits(),
                self.walk.reluctance.to_bits(),
                self.walk.stairs_reluctance.to_bits(),
                self.bike.speed.to_bits(),
                self.bike.reluctance.to_bits(),
                self.car.speed.to_bits(),
                self.car.reluctance.to_bits(),
                self.wheelchair_preferences.stairs_reluctance.to_bits(),
                self.wheelchair_preferences.inaccessible_street_reluctance.to_bits(),
                self.turn_reluctance.to_bits(),
            ],
            [self.walk.board_cost, self.bike.board_cost],
        )
    }

    fn speed_and_reluctance(&self) -> (f64, f64) {
        match self.mode {
            StreetMode::Walk => (self.walk.speed, self.walk.reluctance),
            StreetMode::Bike => (self.bike.speed, self.bike.reluctance),
            StreetMode::Car => (self.car.speed, self.car.reluctance),
        }
    }

    fn stairs_reluctance(&self) -> f64 {
        if self.wheelchair {
            self.wheelchair_preferences.stairs_reluctance
        } else if self.mode == StreetMode::Walk {
            self.walk.stairs_reluctance
        } else {
            1.0
        }
    }
}

impl PartialEq for StreetRelevantOptions {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for StreetRelevantOptions {}

impl Hash for StreetRelevantOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransferCacheError {
    #[error("Transfer from stop {from} leads to unknown stop {to}.")]
    UnknownStop { from: StopIndex, to: StopIndex },
    #[error("Transfer from stop {from} to stop {to} has invalid distance {distance}.")]
    InvalidDistance { from: StopIndex, to: StopIndex, distance: f64 },
    #[error("Failed to build the transfer index: {0}")]
    Build(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaptorTransfer {
    pub stop: StopIndex,
    pub duration: Timestamp,
    pub c1: PathfindingCost,
}

/// Transfers with request-specific durations and costs, indexed for forward and reverse search.
#[derive(Debug, Clone, Default)]
pub struct RaptorTransferIndex {
    forward: Vec<Vec<RaptorTransfer>>,
    reverse: Vec<Vec<RaptorTransfer>>,
}

impl RaptorTransferIndex {
    pub fn create(transfers: &TransfersByStop, options: &StreetRelevantOptions) -> Result<Self, TransferCacheError> {
        let num_stops = transfers.len();
        let (speed, reluctance) = options.speed_and_reluctance();
        let mut forward = vec![Vec::new(); num_stops];
        let mut reverse = vec![Vec::new(); num_stops];

        for (from, transfers_from_stop) in transfers.iter().enumerate() {
            let from = from as StopIndex;
            for transfer in transfers_from_stop {
                let to = transfer.to_stop;
                if to as usize >= num_stops {
                    return Err(TransferCacheError::UnknownStop { from, to });
                }
                if !transfer.distance_m.is_finite() || transfer.distance_m < 0.0 {
                    return Err(TransferCacheError::InvalidDistance { from, to, distance: transfer.distance_m });
                }
                if !transfer.modes.contains(options.mode) || (options.wheelchair && !transfer.wheelchair_accessible) {
                    continue;
                }
                let duration = (transfer.distance_m / speed).ceil() as Timestamp;
                let stairs = if transfer.has_stairs { options.stairs_reluctance() } else { 1.0 };
                let c1 = (duration as f64 * reluctance * stairs).round() as PathfindingCost;
                forward[from as usize].push(RaptorTransfer { stop: to, duration, c1 });
                reverse[to as usize].push(RaptorTransfer { stop: from, duration, c1 });
            }
        }
        Ok(Self { forward, reverse })
    }

    pub fn forward_transfers(&self, stop: StopIndex) -> &[RaptorTransfer] {
        self.forward.get(stop as usize).map_or(&[], Vec::as_slice)
    }

    pub fn reverse_transfers(&self, stop: StopIndex) -> &[RaptorTransfer] {
        self.reverse.get(stop as usize).map_or(&[], Vec::as_slice)
    }

    pub fn num_stops(&self) -> usize {
        self.forward.len()
    }
}

/// Cache key: the transfer list instance and the relevant options. The transfer list compares by
/// identity, so a new graph version never hits entries built for an old one.
#[derive(Debug, Clone)]
struct TransferCacheKey {
    transfers: Arc<TransfersByStop>,
    options: StreetRelevantOptions,
}

impl PartialEq for TransferCacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.transfers, &other.transfers) && self.options == other.options
    }
}

impl Eq for TransferCacheKey {}

impl Hash for TransferCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.options.hash(state);
    }
}

type Loader = dyn Fn(&TransfersByStop, &StreetRelevantOptions) -> Result<RaptorTransferIndex, TransferCacheError>
    + Send
    + Sync;

type Slot = Arc<OnceCell<Arc<RaptorTransferIndex>>>;

/// A bounded, thread-safe cache of transfer indexes. Concurrent requests for the same key
/// compute the index once, and a failed computation is not cached.
pub struct RaptorRequestTransferCache {
    max_size: usize,
    entries: DashMap<TransferCacheKey, Slot>,
    insertion_order: Mutex<VecDeque<TransferCacheKey>>,
    loader: Box<Loader>,
}

impl RaptorRequestTransferCache {
    pub fn new(max_size: usize) -> Self {
        Self::with_loader(max_size, RaptorTransferIndex::create)
    }

    pub fn with_loader(
        max_size: usize,
        loader: impl Fn(&TransfersByStop, &StreetRelevantOptions) -> Result<RaptorTransferIndex, TransferCacheError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            max_size: max_size.max(1),
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            loader: Box::new(loader),
        }
    }

    /// Pre-loads the cache, e.g. with the default request at startup.
    pub fn put(&self, transfers: &Arc<TransfersByStop>, request: &RouteRequest) -> Result<(), TransferCacheError> {
        let key = TransferCacheKey { transfers: Arc::clone(transfers), options: StreetRelevantOptions::new(request) };
        log::info!("Initializing cache with request: {:?}", key.options);
        let slot = self.slot(&key);
        self.load(&key, &slot, false).map(|_| ())
    }

    pub fn get(
        &self,
        transfers: &Arc<TransfersByStop>,
        request: &RouteRequest,
    ) -> Result<Arc<RaptorTransferIndex>, TransferCacheError> {
        let key = TransferCacheKey { transfers: Arc::clone(transfers), options: StreetRelevantOptions::new(request) };
        let slot = self.slot(&key);
        self.load(&key, &slot, true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, key: &TransferCacheKey) -> Slot {
        // The map guard must be dropped before the index is computed.
        let (slot, inserted) = match self.entries.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let slot: Slot = Arc::new(OnceCell::new());
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        };
        if inserted {
            self.evict(key);
        }
        slot
    }

    fn evict(&self, inserted: &TransferCacheKey) {
        let mut order = self.insertion_order.lock();
        order.push_back(inserted.clone());
        while order.len() > self.max_size {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn load(
        &self,
        key: &TransferCacheKey,
        slot: &Slot,
        runtime: bool,
    ) -> Result<Arc<RaptorTransferIndex>, TransferCacheError> {
        let result = slot
            .get_or_try_init(|| {
                if runtime {
                    log::info!("Adding runtime request to cache: {:?}", key.options);
                }
                (self.loader)(&key.transfers, &key.options).map(Arc::new)
            })
            .cloned();
        if result.is_err() {
            // Only remove the entry if it still holds the failed slot.
            self.entries.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
            self.insertion_order.lock().retain(|k| k != key);
        }
        result
    }
}
