//! Frontend identity derivation and full mapping rebuilds.

use rand::Rng;
use rand::distr::Alphanumeric;
use workerdesk_core::{BackendId, FrontendId, RawWorker, name_slug_or_default, phone_digits};

use super::store::{IdentityStore, IdentityTables};
use crate::types::MappingSyncReport;

const RANDOM_SUFFIX_LEN: usize = 6;

/// Stable identity for `raw`, keyed by its normalized phone number.
///
/// Once a phone has an identity it is returned unchanged, whatever the name
/// says now. Workers without a phone get `<slug>_<random>`, which is not
/// registered and therefore not stable across sessions.
///
/// With `backend_index` (position in a just-fetched list) a new identity also
/// caches a backend id: the record's own id, or `backend_index + 1` when it
/// carries none.
pub fn derive_frontend_id(
    store: &IdentityStore,
    raw: &RawWorker,
    backend_index: Option<usize>,
) -> FrontendId {
    let digits = phone_digits(raw.phone_or_empty());
    if digits.is_empty() {
        return synthesize_unstable(raw.name_or_empty());
    }

    if let Some(existing) = store.frontend_for_phone(&digits) {
        return existing;
    }

    let candidate = stable_candidate(raw.name_or_empty(), &digits);
    let id = store.register_phone(&digits, candidate);

    if let Some(index) = backend_index {
        let backend = raw
            .backend_id()
            .unwrap_or_else(|| BackendId::from_position(index));
        store.remember_backend(id.as_str(), backend);
    }
    id
}

/// Build fresh tables from a full worker list.
///
/// Starts from the seed entries and keeps identities phones already had, so a
/// resync never renames a known worker. Records without an id get their
/// 1-based list position. Records whose name matches a seed worker are pinned
/// to the seed's backend id.
pub fn rebuild_tables(store: &IdentityStore, roster: &[RawWorker]) -> (IdentityTables, MappingSyncReport) {
    let previous = store.tables();
    let mut tables = IdentityTables::seeded(store.seeds());
    let mut report = MappingSyncReport {
        workers: roster.len(),
        pinned: 0,
    };

    for (index, raw) in roster.iter().enumerate() {
        let name = raw.name_or_empty();
        let digits = phone_digits(raw.phone_or_empty());

        let frontend = if digits.is_empty() {
            synthesize_unstable(name)
        } else {
            previous
                .phone_to_frontend
                .get(&digits)
                .cloned()
                .unwrap_or_else(|| stable_candidate(name, &digits))
        };

        let mut backend = raw
            .backend_id()
            .unwrap_or_else(|| BackendId::from_position(index));
        if let Some(seed) = store.seed_matching(name) {
            if backend != seed.backend_id() {
                tracing::debug!(
                    "pinning {} to seed backend id {} (list says {})",
                    frontend,
                    seed.backend_id,
                    backend
                );
            }
            backend = seed.backend_id();
            report.pinned += 1;
        }

        if !digits.is_empty() {
            tables.phone_to_frontend.insert(digits.clone(), frontend.clone());
            tables.frontend_to_backend.insert(digits, backend.clone());
        }
        tables
            .frontend_to_backend
            .insert(frontend.into_inner(), backend);
    }

    (tables, report)
}

fn stable_candidate(name: &str, digits: &str) -> FrontendId {
    FrontendId::new(format!("{}_{}", name_slug_or_default(name), digits))
}

fn synthesize_unstable(name: &str) -> FrontendId {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    FrontendId::new(format!("{}_{}", name_slug_or_default(name), suffix))
}
