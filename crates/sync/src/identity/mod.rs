//! Worker identity reconciliation: stable frontend ids vs volatile backend ids.

pub mod derive;
pub mod resolver;
pub mod store;

pub use derive::{derive_frontend_id, rebuild_tables};
pub use resolver::{IdentityResolver, ResolveContext, ResolveStrategy, default_strategies};
pub use store::{IdentityStore, IdentityTables, SEED_WORKERS, SeedWorker};
