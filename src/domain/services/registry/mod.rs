use std::collections::HashMap;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::info;

use crate::domain::services::matching_engine::{MatchingEngineHandle, MatchingEngineWorker};

/// Lazily creates and caches one matching engine per symbol, guarded by a
/// single mutex on lookup/insert only — once a handle is cloned out, all
/// further traffic to that engine goes straight through its own channel
/// with no registry-level lock in the hot path. Grounded on the teacher's
/// `OrderbookManagerServiceImpl` channel map, simplified to route every
/// order through the real matching engine instead of a bare resting-order
/// container, and to drop halt/resume (out of scope here).
pub struct EngineRegistry {
    engines: Mutex<HashMap<String, (MatchingEngineHandle, JoinHandle<()>)>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, symbol: &str) -> MatchingEngineHandle {
        let mut engines = self.engines.lock();
        if let Some((handle, _)) = engines.get(symbol) {
            return handle.clone();
        }

        info!(symbol, "creating matching engine");
        let (handle, join_handle) = MatchingEngineWorker::start(symbol);
        engines.insert(symbol.to_string(), (handle.clone(), join_handle));
        handle
    }

    pub fn symbol_count(&self) -> usize {
        self.engines.lock().len()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
