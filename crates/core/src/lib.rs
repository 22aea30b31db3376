//! `workerdesk-core`: worker domain primitives.
//!
//! This crate contains **pure domain** code (no network or storage): worker
//! identifiers, the canonical status set and its normalizer, and the mapping
//! from lenient backend payloads into canonical records.

pub mod error;
pub mod id;
pub mod normalize;
pub mod status;
pub mod worker;

pub use error::{DomainError, DomainResult};
pub use id::{BackendId, FrontendId};
pub use normalize::{name_slug, name_slug_or_default, overlaps, phone_digits};
pub use status::WorkerStatus;
pub use worker::{ProfileUpdate, RawWorker, WorkerRecord};
