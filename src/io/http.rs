//! HTTP API for tracking operations
//!
//! Uses hyper for the HTTP server. The caller's identity comes from the
//! `x-user-id` header (the edge gateway authenticates and injects it);
//! a missing header is `unauthorized`. Every error response carries a
//! stable kind plus a human-readable message:
//! `{"error": "<kind>", "message": "..."}`.

use crate::domain::types::{EmergencyKind, GeoPoint, RideId, SessionId, UserId};
use crate::infra::error::TrackingError;
use crate::services::tracking::TrackingService;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct StartBody {
    ride_id: RideId,
    location: GeoPoint,
    #[serde(default)]
    estimated_duration_min: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LocationBody {
    location: GeoPoint,
    #[serde(default)]
    speed_kmh: Option<f64>,
    #[serde(default)]
    heading_deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CompleteBody {
    #[serde(default)]
    location: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
struct EmergencyBody {
    kind: EmergencyKind,
    location: GeoPoint,
}

/// Session-scoped actions under /tracking/{id}/...
#[derive(Debug, PartialEq)]
enum SessionAction {
    Location,
    PickupComplete,
    Complete,
    Emergency,
    Snapshot,
}

/// Parse /tracking/{id}[/{action}] paths. `/tracking/active` and
/// `/tracking/start` are handled before this is consulted.
fn parse_session_path(path: &str) -> Option<(SessionId, SessionAction)> {
    let rest = path.strip_prefix("/tracking/")?;
    let mut parts = rest.splitn(2, '/');
    let id = parts.next().filter(|s| !s.is_empty())?;
    let action = match parts.next() {
        None => SessionAction::Snapshot,
        Some("location") => SessionAction::Location,
        Some("pickup-complete") => SessionAction::PickupComplete,
        Some("complete") => SessionAction::Complete,
        Some("emergency") => SessionAction::Emergency,
        Some(_) => return None,
    };
    Some((SessionId::from(id), action))
}

fn actor_from(req: &Request<Incoming>) -> Result<UserId, TrackingError> {
    req.headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(UserId::from)
        .ok_or_else(|| TrackingError::Unauthorized("missing x-user-id header".to_string()))
}

async fn read_body(body: Incoming) -> Result<Bytes, TrackingError> {
    Ok(body
        .collect()
        .await
        .map_err(|e| TrackingError::Validation(format!("failed to read body: {e}")))?
        .to_bytes())
}

async fn read_json<T: DeserializeOwned>(body: Incoming) -> Result<T, TrackingError> {
    let bytes = read_body(body).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TrackingError::Validation(format!("malformed request body: {e}")))
}

/// Like `read_json`, but an absent body is the type's default
async fn read_json_or_default<T: DeserializeOwned + Default>(
    body: Incoming,
) -> Result<T, TrackingError> {
    let bytes = read_body(body).await?;
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| TrackingError::Validation(format!("malformed request body: {e}")))
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn ok_json<T: serde::Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(value) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "response_serialize_failed");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"internal","message":"serialization failed"}"#.to_string(),
            )
        }
    }
}

fn error_response(err: &TrackingError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    json_response(status, body.to_string())
}

async fn handle_request(
    req: Request<Incoming>,
    service: Arc<TrackingService>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::GET && path == "/health" {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail"));
    }

    let actor = match actor_from(&req) {
        Ok(actor) => actor,
        Err(e) => return Ok(error_response(&e)),
    };

    let result = route(req, &method, &path, &actor, service).await;
    Ok(match result {
        Ok(response) => response,
        Err(e) => error_response(&e),
    })
}

async fn route(
    req: Request<Incoming>,
    method: &Method,
    path: &str,
    actor: &UserId,
    service: Arc<TrackingService>,
) -> Result<Response<Full<Bytes>>, TrackingError> {
    match (method, path) {
        (&Method::POST, "/tracking/start") => {
            let body: StartBody = read_json(req.into_body()).await?;
            let session = service
                .start(body.ride_id, actor, body.location, body.estimated_duration_min)
                .await?;
            Ok(ok_json(&session))
        }
        (&Method::GET, "/tracking/active") => {
            let sessions = service.active_sessions(actor);
            Ok(ok_json(&sessions))
        }
        _ => {
            let Some((session_id, action)) = parse_session_path(path) else {
                return Err(TrackingError::NotFound(format!("no route for {path}")));
            };
            match (method, action) {
                (&Method::POST, SessionAction::Location) => {
                    let body: LocationBody = read_json(req.into_body()).await?;
                    let session = service
                        .update_location(
                            &session_id,
                            actor,
                            body.location,
                            body.speed_kmh,
                            body.heading_deg,
                        )
                        .await?;
                    Ok(ok_json(&session))
                }
                (&Method::POST, SessionAction::PickupComplete) => {
                    let session = service.mark_pickup_complete(&session_id, actor).await?;
                    Ok(ok_json(&session))
                }
                (&Method::POST, SessionAction::Complete) => {
                    let body: CompleteBody = read_json_or_default(req.into_body()).await?;
                    let session = service.complete(&session_id, actor, body.location).await?;
                    Ok(ok_json(&session))
                }
                (&Method::POST, SessionAction::Emergency) => {
                    let body: EmergencyBody = read_json(req.into_body()).await?;
                    let session = service
                        .trigger_emergency(&session_id, actor, body.kind, body.location)
                        .await?;
                    Ok(ok_json(&session))
                }
                (&Method::GET, SessionAction::Snapshot) => {
                    let session = service.snapshot(&session_id, actor)?;
                    Ok(ok_json(&session))
                }
                _ => Err(TrackingError::NotFound(format!("no route for {method} {path}"))),
            }
        }
    }
}

/// Start the tracking HTTP server
pub async fn start_http_server(
    bind_address: &str,
    port: u16,
    service: Arc<TrackingService>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{bind_address}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let service = service.clone();

                        tokio::spawn(async move {
                            let handler = service_fn(move |req| {
                                let service = service.clone();
                                async move { handle_request(req, service).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, handler)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_paths() {
        let (id, action) = parse_session_path("/tracking/abc/location").unwrap();
        assert_eq!(id, SessionId::from("abc"));
        assert_eq!(action, SessionAction::Location);

        let (_, action) = parse_session_path("/tracking/abc/pickup-complete").unwrap();
        assert_eq!(action, SessionAction::PickupComplete);

        let (_, action) = parse_session_path("/tracking/abc/complete").unwrap();
        assert_eq!(action, SessionAction::Complete);

        let (_, action) = parse_session_path("/tracking/abc/emergency").unwrap();
        assert_eq!(action, SessionAction::Emergency);

        let (id, action) = parse_session_path("/tracking/abc").unwrap();
        assert_eq!(id, SessionId::from("abc"));
        assert_eq!(action, SessionAction::Snapshot);
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        assert!(parse_session_path("/tracking/").is_none());
        assert!(parse_session_path("/tracking/abc/unknown").is_none());
        assert!(parse_session_path("/other/abc").is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(&TrackingError::Forbidden("wrong party".to_string()));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
