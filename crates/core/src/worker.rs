//! Worker records: the lenient backend payload and the canonical record pages consume.
//!
//! The remote API returns loosely-typed JSON (numbers as strings, missing
//! fields, `null`s). [`RawWorker`] accepts all of that; [`WorkerRecord::from_raw`]
//! is the single place where defaults are decided.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BackendId, FrontendId};
use crate::status::WorkerStatus;

/// Worker as returned by `GET /all`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWorker {
    #[serde(deserialize_with = "lenient::text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text", alias = "phone_number", alias = "phoneNumber")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub religion: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub service: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub experience: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub availability: Option<String>,
    #[serde(deserialize_with = "lenient::text", alias = "idType", alias = "id_proof_type")]
    pub id_type: Option<String>,
    #[serde(deserialize_with = "lenient::text", alias = "idNumber", alias = "id_proof_number")]
    pub id_number: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::float")]
    pub rating: Option<f64>,
    #[serde(deserialize_with = "lenient::count", alias = "totalBookings")]
    pub total_bookings: Option<u32>,
    #[serde(deserialize_with = "lenient::count", alias = "completedBookings")]
    pub completed_bookings: Option<u32>,
    #[serde(deserialize_with = "lenient::text", alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient::text", alias = "updatedAt")]
    pub updated_at: Option<String>,
}

impl RawWorker {
    /// The record's own backend id, if it carries a non-empty one.
    pub fn backend_id(&self) -> Option<BackendId> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(BackendId::new)
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn phone_or_empty(&self) -> &str {
        self.phone.as_deref().unwrap_or("")
    }
}

/// Canonical worker shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub id: FrontendId,
    pub backend_id: Option<BackendId>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub gender: String,
    pub religion: String,
    pub service: String,
    pub experience: String,
    pub availability: String,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub status: WorkerStatus,
    pub rating: f64,
    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    pub fn from_raw(raw: &RawWorker, id: FrontendId, backend_id: Option<BackendId>) -> Self {
        let text = |field: &Option<String>| field.as_deref().map(str::trim).unwrap_or("").to_string();
        let optional = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let name = optional(&raw.name).unwrap_or_else(|| "Unknown".to_string());

        Self {
            id,
            backend_id,
            name,
            phone: text(&raw.phone),
            email: text(&raw.email),
            address: text(&raw.address),
            city: text(&raw.city),
            gender: text(&raw.gender),
            religion: text(&raw.religion),
            service: text(&raw.service),
            experience: text(&raw.experience),
            availability: text(&raw.availability),
            id_type: optional(&raw.id_type),
            id_number: optional(&raw.id_number),
            status: WorkerStatus::normalize(raw.status.as_deref().unwrap_or("")),
            rating: raw.rating.filter(|r| r.is_finite()).unwrap_or(0.0),
            total_bookings: raw.total_bookings.unwrap_or(0),
            completed_bookings: raw.completed_bookings.unwrap_or(0),
            created_at: raw.created_at.as_deref().and_then(parse_timestamp),
            updated_at: raw.updated_at.as_deref().and_then(parse_timestamp),
        }
    }
}

/// Partial profile edit merged over a caller-supplied snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub status: Option<WorkerStatus>,
    pub religion: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub service: Option<String>,
    pub availability: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }

    /// Whether any field beyond status and religion is set.
    pub fn has_contact_fields(&self) -> bool {
        [
            &self.phone,
            &self.email,
            &self.address,
            &self.service,
            &self.availability,
        ]
        .iter()
        .any(|field| field.is_some())
    }

    /// Overlay the set fields on `current`; unset fields keep their values.
    pub fn apply_to(&self, current: &WorkerRecord) -> WorkerRecord {
        let mut merged = current.clone();
        if let Some(status) = self.status {
            merged.status = status;
        }
        let overlay = |target: &mut String, value: &Option<String>| {
            if let Some(value) = value {
                *target = value.clone();
            }
        };
        overlay(&mut merged.religion, &self.religion);
        overlay(&mut merged.phone, &self.phone);
        overlay(&mut merged.email, &self.email);
        overlay(&mut merged.address, &self.address);
        overlay(&mut merged.service, &self.service);
        overlay(&mut merged.availability, &self.availability);
        merged
    }
}

/// RFC 3339, or the naive `YYYY-MM-DDTHH:MM:SS[.fff]` form read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}
