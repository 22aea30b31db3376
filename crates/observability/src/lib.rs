//! Tracing and logging setup shared by workerdesk binaries.

/// Initialize process-wide tracing/logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::Json);
}

/// Initialize with human-readable output (interactive CLI use).
pub fn init_pretty() {
    tracing::init(tracing::LogFormat::Pretty);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
