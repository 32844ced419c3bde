//! Protocol header contract, checked before anything else runs.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use broker_core::{BrokerError, OriginatingIdentity, RequestContext};
use http::HeaderMap;
use regex::Regex;
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::config::BrokerConfig;

pub const API_VERSION_HEADER: &str = "x-broker-api-version";
pub const ORIGINATING_IDENTITY_HEADER: &str = "x-broker-api-originating-identity";
pub const REQUEST_IDENTITY_HEADER: &str = "x-broker-api-request-identity";
pub const AUTHORIZATION_HEADER: &str = "authorization";

static VERSION_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.)?(\d+\.)?(\*|\d+)$").expect("version pattern is a valid regex")
});

/// Validates the protocol headers and builds the context handed to backends.
///
/// # Errors
///
/// Returns `InvalidParameter` when:
/// - `X-Broker-API-Version` is missing, malformed, or not the configured version;
/// - `X-Broker-API-Originating-Identity` is present but not `<platform> <value>`;
/// - a shared secret is configured and `Authorization` does not equal it.
pub fn parse_headers(
    headers: &HeaderMap,
    config: &BrokerConfig,
) -> Result<RequestContext, BrokerError> {
    let api_version = check_api_version(headers, &config.api_version)?;
    if let Some(secret) = &config.auth_token {
        check_authorization(headers, secret)?;
    }
    let originating_identity = header_str(headers, ORIGINATING_IDENTITY_HEADER)?
        .map(parse_originating_identity)
        .transpose()?;
    let request_identity = header_str(headers, REQUEST_IDENTITY_HEADER)?.map(str::to_owned);

    Ok(RequestContext {
        api_version,
        originating_identity,
        request_identity,
    })
}

/// Reads the request identity without validating anything else, so error
/// responses can still echo it.
#[must_use]
pub fn request_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, BrokerError> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|_| {
                BrokerError::invalid_parameter(format!("Header {name} is not valid ASCII"))
            })
        })
        .transpose()
}

fn check_api_version(headers: &HeaderMap, expected: &str) -> Result<String, BrokerError> {
    let version = header_str(headers, API_VERSION_HEADER)?.ok_or_else(|| {
        BrokerError::invalid_parameter(format!("Missing {API_VERSION_HEADER} header"))
    })?;
    if !VERSION_FORMAT.is_match(version) {
        return Err(BrokerError::invalid_parameter(format!(
            "[{API_VERSION_HEADER}]: version numbers are in the format MAJOR.MINOR, got {version}"
        )));
    }
    if version != expected {
        return Err(BrokerError::invalid_parameter(format!(
            "[{API_VERSION_HEADER}]: wrong API version {version}, expected {expected}"
        )));
    }
    Ok(version.to_owned())
}

fn check_authorization(headers: &HeaderMap, secret: &str) -> Result<(), BrokerError> {
    let presented = headers
        .get(AUTHORIZATION_HEADER)
        .map(http::HeaderValue::as_bytes)
        .unwrap_or_default();
    if bool::from(presented.ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        Err(BrokerError::invalid_parameter(
            "[authorization]: missing or invalid credentials",
        ))
    }
}

fn parse_originating_identity(raw: &str) -> Result<OriginatingIdentity, BrokerError> {
    let tokens: Vec<&str> = raw.split(' ').collect();
    let [platform, value] = tokens.as_slice() else {
        return Err(BrokerError::invalid_parameter(format!(
            "[{ORIGINATING_IDENTITY_HEADER}]: the format of the header must be: <platform> <value>"
        )));
    };
    if platform.is_empty() || value.is_empty() {
        return Err(BrokerError::invalid_parameter(format!(
            "[{ORIGINATING_IDENTITY_HEADER}]: platform and value must not be empty"
        )));
    }

    // The value is base64-encoded JSON by convention; keep only the raw form otherwise.
    let decoded = STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok());

    Ok(OriginatingIdentity {
        platform: (*platform).to_owned(),
        raw_value: (*value).to_owned(),
        value: decoded,
    })
}

#[cfg(test)]
mod tests {
    use broker_core::ErrorKind;
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn matching_version_is_accepted() {
        let ctx = parse_headers(
            &headers(&[(API_VERSION_HEADER, "2.15")]),
            &BrokerConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.api_version, "2.15");
        assert!(ctx.originating_identity.is_none());
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = parse_headers(&HeaderMap::new(), &BrokerConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn malformed_version_is_rejected() {
        let err = parse_headers(
            &headers(&[(API_VERSION_HEADER, "v2")]),
            &BrokerConfig::default(),
        )
        .unwrap_err();
        assert!(err.description().unwrap().contains("MAJOR.MINOR"));
    }

    #[test]
    fn other_version_is_rejected() {
        let err = parse_headers(
            &headers(&[(API_VERSION_HEADER, "2.14")]),
            &BrokerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(err.description().unwrap().contains("expected 2.15"));
    }

    #[test]
    fn originating_identity_is_decoded() {
        let encoded = STANDARD.encode(br#"{"user_id":"683ea748"}"#);
        let ctx = parse_headers(
            &headers(&[
                (API_VERSION_HEADER, "2.15"),
                (ORIGINATING_IDENTITY_HEADER, &format!("cloudfoundry {encoded}")),
                (REQUEST_IDENTITY_HEADER, "req-42"),
            ]),
            &BrokerConfig::default(),
        )
        .unwrap();

        let identity = ctx.originating_identity.unwrap();
        assert_eq!(identity.platform, "cloudfoundry");
        assert_eq!(identity.raw_value, encoded);
        assert_eq!(identity.value, Some(json!({ "user_id": "683ea748" })));
        assert_eq!(ctx.request_identity.as_deref(), Some("req-42"));
    }

    #[test]
    fn opaque_identity_value_is_kept_raw() {
        let ctx = parse_headers(
            &headers(&[
                (API_VERSION_HEADER, "2.15"),
                (ORIGINATING_IDENTITY_HEADER, "kubernetes not-base64!"),
            ]),
            &BrokerConfig::default(),
        )
        .unwrap();
        let identity = ctx.originating_identity.unwrap();
        assert_eq!(identity.raw_value, "not-base64!");
        assert!(identity.value.is_none());
    }

    #[test]
    fn single_token_identity_is_rejected() {
        let err = parse_headers(
            &headers(&[
                (API_VERSION_HEADER, "2.15"),
                (ORIGINATING_IDENTITY_HEADER, "cloudfoundry"),
            ]),
            &BrokerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn shared_secret_must_match() {
        let config = BrokerConfig::default().with_auth_token("Basic c2VjcmV0");

        let missing = parse_headers(&headers(&[(API_VERSION_HEADER, "2.15")]), &config);
        assert!(missing.is_err());

        let wrong = parse_headers(
            &headers(&[(API_VERSION_HEADER, "2.15"), (AUTHORIZATION_HEADER, "Basic b3RoZXI=")]),
            &config,
        );
        assert!(wrong.is_err());

        let right = parse_headers(
            &headers(&[(API_VERSION_HEADER, "2.15"), (AUTHORIZATION_HEADER, "Basic c2VjcmV0")]),
            &config,
        );
        assert!(right.is_ok());
    }

    #[test]
    fn request_identity_is_read_without_validation() {
        let map = headers(&[(REQUEST_IDENTITY_HEADER, "abc")]);
        assert_eq!(request_identity(&map).as_deref(), Some("abc"));
    }
}
