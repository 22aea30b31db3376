//! Strongly-typed worker identifiers.
//!
//! A worker has two identities: the stable [`FrontendId`] derived on the client
//! (usually `<name-slug>_<phone-digits>`) and the volatile [`BackendId`] the
//! remote API assigns and may reassign at any time.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Stable client-side worker identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontendId(String);

/// Backend-assigned worker id, kept as text because the API mixes integers and strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without validation.
            ///
            /// Use `parse` for operator input; this is for values already produced
            /// by the identity layer.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id($name, s));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(FrontendId, "FrontendId");
impl_string_newtype!(BackendId, "BackendId");

impl BackendId {
    /// 1-based positional id used when a fetched record carries no id of its own.
    pub fn from_position(index: usize) -> Self {
        Self((index + 1).to_string())
    }
}
