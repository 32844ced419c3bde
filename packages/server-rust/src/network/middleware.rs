//! HTTP middleware stack applied to every route.
//!
//! The first layer listed is the outermost: it sees the request first and
//! the response last. These are transport concerns only. Anything that can
//! reject a broker request (body size included) is left to the handlers so
//! the platform always gets a taxonomy error body, and no layer here cancels
//! a backend call that is already running.

use axum::http::header::HeaderName;
use axum::http::Method;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// The composed layer produced by [`build_http_layers`].
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        CorsLayer,
        Stack<
            CompressionLayer,
            Stack<
                TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
            >,
        >,
    >,
>;

/// Builds the transport middleware from the network configuration.
///
/// Outermost to innermost:
/// 1. `SetRequestId`: UUID `x-request-id` on every request
/// 2. `Trace`: request/response spans
/// 3. `Compression`: gzip responses when the client asks
/// 4. `CORS`: configured origins, broker methods
/// 5. `PropagateRequestId`: copies `x-request-id` onto the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// `"*"` allows any origin; otherwise each parseable origin is allow-listed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        Router::new()
            .route("/v2/catalog", get(|| async { "{}" }))
            .layer(build_http_layers(config))
    }

    #[tokio::test]
    async fn request_id_is_generated_and_echoed() {
        let response = app(&NetworkConfig::default())
            .oneshot(Request::get("/v2/catalog").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn preflight_allows_listed_origin_and_broker_methods() {
        let config = NetworkConfig {
            cors_origins: vec![
                "https://platform.example.com".to_string(),
                "not a valid origin\n".to_string(),
            ],
            ..NetworkConfig::default()
        };
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/v2/catalog")
            .header("origin", "https://platform.example.com")
            .header("access-control-request-method", "PATCH")
            .body(Body::empty())
            .unwrap();

        let response = app(&config).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://platform.example.com"
        );
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap();
        assert!(methods.contains("PATCH"));
    }
}
