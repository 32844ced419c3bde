use serde_json::Value;

/// Per-request context derived from the protocol headers.
/// Handed to every backend operation alongside the merged request object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestContext {
    /// Value of `X-Broker-API-Version`, already checked against the broker's version.
    pub api_version: String,
    /// Parsed `X-Broker-API-Originating-Identity`, if the platform sent one.
    pub originating_identity: Option<OriginatingIdentity>,
    /// Value of `X-Broker-API-Request-Identity`, echoed back on the response.
    pub request_identity: Option<String>,
}

/// The `<platform> <value>` pair identifying the user that initiated a request.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginatingIdentity {
    /// Platform name, e.g. `cloudfoundry` or `kubernetes`.
    pub platform: String,
    /// Base64 value exactly as sent.
    pub raw_value: String,
    /// The value decoded as JSON, when it is base64-encoded JSON.
    pub value: Option<Value>,
}
