//! HTTP endpoint
//!
//! Serves the text exposition on `/metrics` and liveness/readiness probes
//! on `/healthz`, `/livez` and `/readyz`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::registry::Exposition;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// State shared by every connection.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub exposition: Exposition,
    pub refresher: Arc<Refresher>,
}

impl ServerState {
    pub fn new(exposition: Exposition, refresher: Arc<Refresher>) -> Self {
        Self {
            exposition,
            refresher,
        }
    }
}

/// Bind `addr` and serve until the listener fails.
pub async fn run_server(addr: &str, state: ServerState) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", addr, e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    let state = Arc::new(state);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(route(&state, req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}

/// Dispatch one request. Request bodies are ignored.
pub async fn route<B>(state: &ServerState, req: Request<B>) -> Response<Full<Bytes>> {
    let (parts, _) = req.into_parts();
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, PLAIN_TEXT, "method not allowed");
    }

    match parts.uri.path() {
        "/metrics" => metrics(state).await,
        "/healthz" | "/livez" => text(StatusCode::OK, PLAIN_TEXT, "ok"),
        "/readyz" => {
            let refresh = state.refresher.state();
            if state.refresher.is_ready() {
                text(StatusCode::OK, PLAIN_TEXT, format!("ok (refresh {})", refresh))
            } else {
                text(
                    StatusCode::SERVICE_UNAVAILABLE,
                    PLAIN_TEXT,
                    format!("waiting for first refresh (refresh {})", refresh),
                )
            }
        }
        _ => text(StatusCode::NOT_FOUND, PLAIN_TEXT, "not found"),
    }
}

async fn metrics(state: &ServerState) -> Response<Full<Bytes>> {
    let exposition = state.exposition.clone();
    let content_type = exposition.content_type();

    // Value functions walk directories and spawn `df`; keep them off the runtime.
    match tokio::task::spawn_blocking(move || exposition.encode()).await {
        Ok(Ok(body)) => text(StatusCode::OK, &content_type, body),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to encode metrics");
            text(StatusCode::INTERNAL_SERVER_ERROR, PLAIN_TEXT, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Metrics encoding task failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, PLAIN_TEXT, "internal error")
        }
    }
}

fn text(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticInventory;
    use crate::refresh::{ExporterContext, DEFAULT_REFRESH_INTERVAL};
    use crate::registry::MetricRegistry;
    use http_body_util::BodyExt;

    fn state() -> ServerState {
        let registry = Arc::new(MetricRegistry::default());
        let ctx = ExporterContext::new(
            Arc::new(StaticInventory::default()),
            "node-a",
            "",
            Arc::clone(&registry),
        );
        let exposition = Exposition::new(registry).unwrap();
        let refresher = Refresher::new(ctx, DEFAULT_REFRESH_INTERVAL)
            .with_metrics(exposition.metrics().clone());
        ServerState::new(exposition, Arc::new(refresher))
    }

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let state = state();
        for path in ["/healthz", "/livez"] {
            let response = route(&state, get(path)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "ok");
        }
    }

    #[tokio::test]
    async fn test_readyz_waits_for_first_cycle() {
        let state = state();
        let response = route(&state, get("/readyz")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_string(response).await,
            "waiting for first refresh (refresh idle)"
        );

        state.refresher.reconcile_once().await;
        let response = route(&state, get("/readyz")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok (refresh idle)");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = state();
        state.refresher.reconcile_once().await;

        let response = route(&state, get("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));

        let body = body_string(response).await;
        assert!(body.contains("pv_exporter_refresh_cycles_total 1"));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let state = state();
        let response = route(&state, get("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let post = Request::builder()
            .method(Method::POST)
            .uri("/metrics")
            .body(())
            .unwrap();
        let response = route(&state, post).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_invalid_listen_address() {
        let result = run_server("not-an-address", state()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
