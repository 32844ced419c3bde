/// Protocol version accepted when none is configured.
pub const DEFAULT_API_VERSION: &str = "2.15";

/// Engine-level configuration for the request dispatcher.
///
/// Controls the header contract every request must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Exact value required in `X-Broker-API-Version`.
    pub api_version: String,
    /// Shared secret the `Authorization` header must equal. `None` disables the check.
    pub auth_token: Option<String>,
}

impl BrokerConfig {
    #[must_use]
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION)
    }
}
