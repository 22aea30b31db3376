//! Remote worker API client.
//!
//! Endpoints (all under one base URL):
//! - `GET /all`: every worker record
//! - `PUT /update/{backendId}`: JSON body, or `?new_status=..&new_religion=..`
//! - `DELETE /delete-worker/{backendId}`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use workerdesk_core::{BackendId, RawWorker, WorkerRecord, WorkerStatus};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

const MAX_LOG_BODY_CHARS: usize = 512;

/// JSON body of `PUT /update/{backendId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub status: WorkerStatus,
    pub religion: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub service: String,
    pub availability: String,
}

impl UpdatePayload {
    /// Full payload for `record`, as the backend requires every field.
    pub fn from_record(record: &WorkerRecord) -> Self {
        Self {
            status: record.status,
            religion: record.religion.clone(),
            phone: record.phone.clone(),
            email: record.email.clone(),
            address: record.address.clone(),
            service: record.service.clone(),
            availability: record.availability.clone(),
        }
    }

    /// Status change with the remaining fields backfilled from the backend's copy.
    pub fn status_change(status: WorkerStatus, religion: &str, current: Option<&RawWorker>) -> Self {
        let field = |pick: fn(&RawWorker) -> &Option<String>| {
            current
                .and_then(|raw| pick(raw).clone())
                .unwrap_or_default()
        };
        Self {
            status,
            religion: religion.to_string(),
            phone: field(|r| &r.phone),
            email: field(|r| &r.email),
            address: field(|r| &r.address),
            service: field(|r| &r.service),
            availability: field(|r| &r.availability),
        }
    }
}

/// Operations the remote worker API offers.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    /// Short-timeout list request; returns the HTTP status code.
    async fn probe(&self) -> SyncResult<u16>;

    async fn list_workers(&self) -> SyncResult<Vec<RawWorker>>;

    async fn update_worker(&self, backend_id: &BackendId, payload: &UpdatePayload) -> SyncResult<()>;

    /// Query-parameter encoding of the same update, for backends that ignore the body.
    async fn update_worker_by_query(
        &self,
        backend_id: &BackendId,
        status: WorkerStatus,
        religion: &str,
    ) -> SyncResult<()>;

    async fn delete_worker(&self, backend_id: &BackendId) -> SyncResult<()>;
}

/// `reqwest` implementation of [`WorkerApi`].
#[derive(Debug, Clone)]
pub struct HttpWorkerApi {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpWorkerApi {
    pub fn new(base_url: &str, probe_timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.api_url, config.probe_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `SyncError::Api` carrying a body preview.
    async fn ensure_success(resp: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            tracing::debug!("API response status: {}", status);
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        tracing::debug!("API response error ({}): {}", status, preview);
        Err(SyncError::Api(status.as_u16(), preview))
    }
}

#[async_trait]
impl WorkerApi for HttpWorkerApi {
    async fn probe(&self) -> SyncResult<u16> {
        let resp = self
            .client
            .get(self.url("/all"))
            .timeout(self.probe_timeout)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }

    async fn list_workers(&self) -> SyncResult<Vec<RawWorker>> {
        let resp = self.client.get(self.url("/all")).send().await?;
        let resp = Self::ensure_success(resp).await?;
        let workers: Vec<RawWorker> = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("failed to parse worker list: {}", e)))?;
        tracing::debug!("fetched {} workers", workers.len());
        Ok(workers)
    }

    async fn update_worker(&self, backend_id: &BackendId, payload: &UpdatePayload) -> SyncResult<()> {
        let resp = self
            .client
            .put(self.url(&format!("/update/{}", backend_id)))
            .json(payload)
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }

    async fn update_worker_by_query(
        &self,
        backend_id: &BackendId,
        status: WorkerStatus,
        religion: &str,
    ) -> SyncResult<()> {
        let resp = self
            .client
            .put(self.url(&format!("/update/{}", backend_id)))
            .query(&[("new_status", status.as_str()), ("new_religion", religion)])
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }

    async fn delete_worker(&self, backend_id: &BackendId) -> SyncResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/delete-worker/{}", backend_id)))
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workerdesk_core::FrontendId;

    #[test]
    fn status_change_backfills_from_backend_copy() {
        let current = RawWorker {
            phone: Some("9876543210".to_string()),
            email: Some("ravi@example.com".to_string()),
            service: Some("Plumbing".to_string()),
            ..RawWorker::default()
        };

        let payload = UpdatePayload::status_change(WorkerStatus::Active, "Hindu", Some(&current));
        assert_eq!(payload.status, WorkerStatus::Active);
        assert_eq!(payload.religion, "Hindu");
        assert_eq!(payload.phone, "9876543210");
        assert_eq!(payload.service, "Plumbing");
        assert_eq!(payload.address, "");

        let bare = UpdatePayload::status_change(WorkerStatus::Rejected, "", None);
        assert_eq!(bare.email, "");
    }

    #[test]
    fn payload_from_record_serializes_canonical_status() {
        let raw = RawWorker {
            status: Some("approved".to_string()),
            availability: Some("Weekends".to_string()),
            ..RawWorker::default()
        };
        let record = WorkerRecord::from_raw(&raw, FrontendId::new("x_1"), None);
        let value = serde_json::to_value(UpdatePayload::from_record(&record)).unwrap();
        assert_eq!(value["status"], "Active");
        assert_eq!(value["availability"], "Weekends");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let api = HttpWorkerApi::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/all"), "http://localhost:8000/all");
    }
}
