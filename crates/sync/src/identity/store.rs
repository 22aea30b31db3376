//! In-memory identity tables.
//!
//! - `phone_to_frontend`: normalized phone digits -> frontend id
//! - `frontend_to_backend`: frontend id (or raw phone digits) -> backend id
//!
//! Backend entries are advisory caches: the remote system may reassign ids at
//! any time, so a hit here can always be re-checked by a full resolve pass.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use workerdesk_core::{BackendId, FrontendId, phone_digits};

use crate::types::MappingSnapshot;

/// A demo worker whose backend id is pinned regardless of sync results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedWorker {
    /// Lowercase name fragment matched case-insensitively.
    pub name_key: &'static str,
    pub phone: &'static str,
    pub backend_id: &'static str,
}

impl SeedWorker {
    pub fn frontend_id(&self) -> FrontendId {
        FrontendId::new(format!("{}_{}", self.name_key, self.phone))
    }

    pub fn backend_id(&self) -> BackendId {
        BackendId::new(self.backend_id)
    }

    /// Case-insensitive substring match against a name or frontend id.
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(self.name_key)
    }
}

pub const SEED_WORKERS: [SeedWorker; 3] = [
    SeedWorker {
        name_key: "string",
        phone: "2345678",
        backend_id: "1",
    },
    SeedWorker {
        name_key: "ravi",
        phone: "9876543210",
        backend_id: "2",
    },
    SeedWorker {
        name_key: "priya",
        phone: "9123456780",
        backend_id: "3",
    },
];

/// First seed whose name key occurs in `text`.
pub fn seed_matching(seeds: &[SeedWorker], text: &str) -> Option<SeedWorker> {
    seeds.iter().copied().find(|seed| seed.matches(text))
}

/// Both mapping tables, swapped in as a unit on full rebuilds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityTables {
    pub phone_to_frontend: HashMap<String, FrontendId>,
    pub frontend_to_backend: HashMap<String, BackendId>,
}

impl IdentityTables {
    pub fn seeded(seeds: &[SeedWorker]) -> Self {
        let mut tables = Self::default();
        for seed in seeds {
            let frontend = seed.frontend_id();
            tables
                .phone_to_frontend
                .insert(seed.phone.to_string(), frontend.clone());
            tables
                .frontend_to_backend
                .insert(frontend.into_inner(), seed.backend_id());
            tables
                .frontend_to_backend
                .insert(seed.phone.to_string(), seed.backend_id());
        }
        tables
    }
}

/// Process-wide identity state, injected into the resolver and the sync service.
#[derive(Debug)]
pub struct IdentityStore {
    tables: RwLock<IdentityTables>,
    seeds: Vec<SeedWorker>,
}

impl IdentityStore {
    /// Store seeded with [`SEED_WORKERS`].
    pub fn new() -> Self {
        Self::with_seeds(SEED_WORKERS.to_vec())
    }

    pub fn with_seeds(seeds: Vec<SeedWorker>) -> Self {
        Self {
            tables: RwLock::new(IdentityTables::seeded(&seeds)),
            seeds,
        }
    }

    pub fn seeds(&self) -> &[SeedWorker] {
        &self.seeds
    }

    pub fn seed_matching(&self, text: &str) -> Option<SeedWorker> {
        seed_matching(&self.seeds, text)
    }

    pub fn frontend_for_phone(&self, digits: &str) -> Option<FrontendId> {
        self.read().phone_to_frontend.get(digits).cloned()
    }

    /// Register `candidate` for `digits` unless the phone already has an identity.
    ///
    /// Returns whichever identity the phone maps to afterwards.
    pub fn register_phone(&self, digits: &str, candidate: FrontendId) -> FrontendId {
        self.write()
            .phone_to_frontend
            .entry(digits.to_string())
            .or_insert(candidate)
            .clone()
    }

    /// Cached backend id for a frontend id or raw phone key.
    pub fn backend_for(&self, key: &str) -> Option<BackendId> {
        self.read().frontend_to_backend.get(key).cloned()
    }

    pub fn remember_backend(&self, key: &str, backend_id: BackendId) {
        self.write()
            .frontend_to_backend
            .insert(key.to_string(), backend_id);
    }

    /// Operator override of a single backend mapping.
    pub fn set_mapping(&self, key: &str, backend_id: BackendId) {
        tracing::info!("manual id mapping {} -> {}", key, backend_id);
        self.remember_backend(key, backend_id);
    }

    /// Purge every entry that points at or is keyed by `id`.
    ///
    /// Returns the number of entries removed.
    pub fn forget_frontend(&self, id: &FrontendId) -> usize {
        let mut tables = self.write();
        let phones: Vec<String> = tables
            .phone_to_frontend
            .iter()
            .filter(|(_, frontend)| *frontend == id)
            .map(|(phone, _)| phone.clone())
            .collect();

        let mut removed = 0;
        for phone in &phones {
            tables.phone_to_frontend.remove(phone);
            removed += 1;
            if tables.frontend_to_backend.remove(phone).is_some() {
                removed += 1;
            }
        }
        if tables.frontend_to_backend.remove(id.as_str()).is_some() {
            removed += 1;
        }

        // The id embeds its phone digits; drop a raw-phone key left behind.
        let embedded = phone_digits(id.as_str().split_once('_').map_or("", |(_, rest)| rest));
        if !embedded.is_empty()
            && !phones.contains(&embedded)
            && !tables.phone_to_frontend.contains_key(&embedded)
            && tables.frontend_to_backend.remove(&embedded).is_some()
        {
            removed += 1;
        }
        removed
    }

    /// Swap in freshly built tables.
    pub fn replace(&self, tables: IdentityTables) {
        *self.write() = tables;
    }

    /// Clear both tables and reseed.
    pub fn reset(&self) {
        tracing::info!("resetting id mappings to seed entries");
        self.replace(IdentityTables::seeded(&self.seeds));
    }

    pub fn tables(&self) -> IdentityTables {
        self.read().clone()
    }

    pub fn snapshot(&self) -> MappingSnapshot {
        let tables = self.read();
        MappingSnapshot {
            phone_to_frontend: tables
                .phone_to_frontend
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            frontend_to_backend: tables
                .frontend_to_backend
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IdentityTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IdentityTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}
