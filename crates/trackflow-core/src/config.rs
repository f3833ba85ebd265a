//! Shared client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_EXCHANGE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest";
pub const DEFAULT_STORE_NAMESPACE: &str = "trackflow_offline";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RATES_TTL: Duration = Duration::from_secs(10 * 60);

/// Settings for talking to the expense service and storing the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the expense API, without trailing slash.
    pub api_base_url: String,
    pub exchange_api_url: String,
    /// Bearer token sent with every API request.
    pub auth_token: Option<String>,
    /// Per-request timeout for delivery attempts.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// How long a fetched rate table is reused.
    #[serde(with = "duration_secs")]
    pub rates_ttl: Duration,
    /// Directory holding one sub-directory per store namespace.
    pub data_dir: PathBuf,
    pub store_namespace: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            exchange_api_url: DEFAULT_EXCHANGE_API_URL.to_string(),
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rates_ttl: DEFAULT_RATES_TTL,
            data_dir: PathBuf::from(".trackflow"),
            store_namespace: DEFAULT_STORE_NAMESPACE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Directory of the offline queue for this installation.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join(&self.store_namespace)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
