//! Per-connection HTTP handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLogger, AuditRequest};
use crate::auth::{Authorization, RateLimiter, RequestAuthorizer, Verdict};
use crate::config::Settings;
use crate::content::ContentGateway;
use crate::error::{DenialReason, GateError, GateResult, ProtocolErrorKind};
use crate::protocol::{AuthorizedRequest, Response as ApiResponse};
use crate::validation::validate_file_name;

use super::listener::ConnectionMetrics;
use super::routes::Route;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Longest path parameter copied into the audit log.
const MAX_AUDIT_FIELD_LENGTH: usize = 128;

/// Everything a request handler needs, shared across connections.
pub struct GatewayState {
    pub settings: Arc<Settings>,
    pub authorizer: RequestAuthorizer,
    pub gateway: ContentGateway,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit_logger: Option<Arc<AuditLogger>>,
    pub metrics: Arc<ConnectionMetrics>,
}

/// Serve HTTP/1.1 on one accepted connection until it closes.
///
/// On `shutdown` the connection finishes its in-flight request and then
/// closes instead of waiting for the next one.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<GatewayState>,
    shutdown: Arc<Notify>,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let header_timeout = Duration::from_secs(state.settings.limits.header_read_timeout_seconds);

    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle_request(state, peer, req).await) }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_timeout);
    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.notified() => {
            debug!(peer = %peer, "Closing connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

/// Route and answer one request.
async fn handle_request(
    state: Arc<GatewayState>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> Response<ResponseBody> {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let route = match Route::parse(&method, &path) {
        Some(route) => route,
        None => {
            debug!(request_id = %request_id, method = %method, path = %path, "No route");
            let err = GateError::Protocol {
                kind: ProtocolErrorKind::NotFound {
                    method: method.to_string(),
                    path,
                },
            };
            return error_response(&state, request_id, &err);
        }
    };

    if route == Route::Health {
        return health_response(&state);
    }

    let start_time = Instant::now();
    let mut audit = AuditRequest::new(request_id, route.operation(), peer);
    record_path(&mut audit, &route);

    info!(
        request_id = %request_id,
        operation = route.operation(),
        peer = %peer,
        "Received request"
    );

    let result = if state.rate_limiter.check_and_record(peer.ip()) {
        let request_timeout = Duration::from_secs(state.settings.limits.request_timeout_seconds);
        match tokio::time::timeout(
            request_timeout,
            serve_content(&state, &route, req.headers(), &mut audit),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GateError::Protocol {
                kind: ProtocolErrorKind::RequestTimeout {
                    timeout_secs: request_timeout.as_secs(),
                },
            }),
        }
    } else {
        warn!(request_id = %request_id, peer = %peer, "Rate limit exceeded");
        Err(GateError::Protocol {
            kind: ProtocolErrorKind::RateLimited,
        })
    };

    let duration_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.record_request(result.is_ok());

    match result {
        Ok(served) => {
            info!(
                request_id = %request_id,
                operation = route.operation(),
                duration_ms,
                "Request served"
            );
            write_audit(&state, AuditEntry::success(audit, Some(served.summary), duration_ms));
            served.response
        }
        Err(err) => {
            if err.code() == "ACCESS_DENIED" {
                state.metrics.record_denial();
            }
            write_audit(&state, AuditEntry::failure(audit, err.code(), err.to_string(), duration_ms));
            error_response(&state, request_id, &err)
        }
    }
}

/// A successful content response plus what to say about it in the audit log.
struct Served {
    response: Response<ResponseBody>,
    summary: serde_json::Value,
}

/// Parse, authorize and answer a content request.
async fn serve_content(
    state: &GatewayState,
    route: &Route,
    headers: &HeaderMap,
    audit: &mut AuditRequest,
) -> GateResult<Served> {
    let Some((owner, area, file_name)) = route.content_target() else {
        return Err(GateError::Server {
            message: format!("{} is not a content route", route.operation()),
        });
    };

    let request = AuthorizedRequest::from_parts(headers, owner, area)?;
    audit.visitor = Some(request.visitor.to_string());
    let file_name = file_name.map(validate_file_name).transpose()?;

    let authorization = authorize(state, &request)?;

    match file_name {
        None => {
            let items = state
                .gateway
                .list(authorization, &request.owner, &request.area)
                .await?;
            let summary = serde_json::json!({ "items": items.len() });
            let body = serde_json::to_vec(&items)?;
            Ok(Served {
                response: json_response(StatusCode::OK, body),
                summary,
            })
        }
        Some(file_name) => {
            let content = state
                .gateway
                .fetch(authorization, &request.owner, &request.area, &file_name)
                .await?;
            let summary = serde_json::json!({ "length": content.length });

            let body = StreamBody::new(content.chunks.map(|chunk| chunk.map(Frame::data)))
                .map_err(|e| Box::new(e) as BoxError)
                .boxed_unsync();
            let mut response = Response::new(body);
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&content.descriptor.mime_type) {
                headers.insert(CONTENT_TYPE, value);
            }
            if let Some(length) = content.length {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
            }
            Ok(Served { response, summary })
        }
    }
}

fn authorize(state: &GatewayState, request: &AuthorizedRequest) -> GateResult<Authorization> {
    match state.authorizer.authorize(request) {
        Verdict::Authorized(authorization) => Ok(authorization),
        Verdict::Denied(DenialReason::NonceStoreFull) => {
            error!(
                visitor = %request.visitor,
                "Nonce store exhausted, refusing request until entries expire"
            );
            Err(GateError::Protocol {
                kind: ProtocolErrorKind::Unavailable {
                    reason: DenialReason::NonceStoreFull.to_string(),
                },
            })
        }
        Verdict::Denied(reason) => {
            warn!(
                visitor = %request.visitor,
                owner = %request.owner,
                area = %request.area,
                reason = reason.code(),
                "Request denied"
            );
            Err(GateError::denied(reason))
        }
    }
}

fn record_path(audit: &mut AuditRequest, route: &Route) {
    let clip = |s: &str| s.chars().take(MAX_AUDIT_FIELD_LENGTH).collect::<String>();
    if let Some((owner, area, file_name)) = route.content_target() {
        audit.owner = Some(clip(owner));
        audit.area = Some(clip(area));
        audit.file_name = file_name.map(clip);
    }
}

fn write_audit(state: &GatewayState, entry: AuditEntry) {
    if let Some(logger) = &state.audit_logger {
        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }
}

/// HTTP status for an error code.
pub fn status_for(err: &GateError) -> StatusCode {
    match err.code() {
        "ACCESS_DENIED" => StatusCode::FORBIDDEN,
        "AUTH_REQUIRED" => StatusCode::UNAUTHORIZED,
        "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "CONTENT_NOT_FOUND" | "NOT_FOUND" => StatusCode::NOT_FOUND,
        "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
        "REQUEST_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(state: &GatewayState, request_id: Uuid, err: &GateError) -> Response<ResponseBody> {
    let envelope =
        ApiResponse::from_error(request_id, err, state.settings.security.expose_denial_reasons);
    let body = serde_json::to_vec(&envelope).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize error response");
        Vec::new()
    });
    json_response(status_for(err), body)
}

fn health_response(state: &GatewayState) -> Response<ResponseBody> {
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chain_id": state.authorizer.chain_id(),
        "active_connections": state.metrics.active(),
        "requests_total": state.metrics.total_requests(),
    });
    json_response(StatusCode::OK, body.to_string().into_bytes())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<ResponseBody> {
    let body = Full::new(Bytes::from(body))
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
