//! HTTP gateway
//!
//! Hyper http1 with TokioIo, one spawned task per connection. The only hot
//! route is `POST /interactions`: verify the webhook signature, classify,
//! gate, publish to the command queue, and return the deferred ack. Everything
//! slow happens in the worker afterwards; this path has to stay well inside
//! the platform's response deadline.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::PolicyTable;
use crate::config::Args;
use crate::interaction::{normalize, Interaction, InteractionKind, SignatureVerifier};
use crate::queue::{CommandQueue, QueueMessage};
use crate::types::TellerError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Detached-signature header, hex-encoded
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
/// Timestamp header, signed together with the body
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Webhook signature verifier. `None` only in dev mode.
    pub verifier: Option<SignatureVerifier>,
    pub policies: Arc<PolicyTable>,
    /// Command queue. `None` in dev mode when NATS is unreachable; commands
    /// are then acked but dropped.
    pub queue: Option<CommandQueue>,
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), TellerError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Teller listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - signature verification disabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::POST, "/interactions") => {
            return Ok(to_boxed(handle_interaction(state, req).await?))
        }

        // Liveness probe - returns 200 if the gateway is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => health_check(),

        // Readiness probe - requires the command queue (dev mode excepted)
        (Method::GET, "/ready") | (Method::GET, "/readyz") => readiness_check(&state),

        (Method::GET, "/version") => version_info(),

        (_, p) => not_found_response(p),
    };

    Ok(to_boxed(response))
}

/// The interaction webhook: verify, classify, gate, enqueue, ack.
async fn handle_interaction(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let signature = header_value(&req, SIGNATURE_HEADER);
    let timestamp = header_value(&req, TIMESTAMP_HEADER);

    let body = req.into_body().collect().await?.to_bytes();

    match &state.verifier {
        Some(verifier) => {
            let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
                warn!("interaction rejected: missing signature headers");
                return Ok(unauthorized_response());
            };
            if let Err(e) = verifier.verify(&timestamp, &body, &signature) {
                warn!("interaction rejected: {}", e);
                return Ok(unauthorized_response());
            }
        }
        None => debug!("dev mode: accepting unsigned interaction"),
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(i) => i,
        Err(e) => {
            warn!("unparseable interaction body: {}", e);
            return Ok(bad_request_response("malformed interaction body"));
        }
    };

    match interaction.classify() {
        InteractionKind::Ping => Ok(json_response(StatusCode::OK, pong())),
        InteractionKind::Unknown => {
            debug!(kind = interaction.kind, "unsupported interaction type");
            Ok(json_response(
                StatusCode::OK,
                rejection("This interaction type is not supported."),
            ))
        }
        InteractionKind::Command => Ok(handle_command(&state, interaction).await),
    }
}

async fn handle_command(state: &AppState, interaction: Interaction) -> Response<Full<Bytes>> {
    let Some(data) = interaction.data.as_ref() else {
        return bad_request_response("command interaction without data");
    };
    let command = normalize(data);
    let identifier = command.identifier.clone();

    if let Err(reason) = state.policies.authorize(
        &identifier,
        &interaction.role_set(),
        interaction.channel_id(),
    ) {
        info!(
            command = %identifier,
            interaction = %interaction.id,
            reason = ?reason,
            "command denied"
        );
        return json_response(StatusCode::OK, rejection(&reason.message(&identifier)));
    }

    let initiator_id = interaction
        .member
        .as_ref()
        .and_then(|m| m.user.as_ref())
        .map(|u| u.id.clone())
        .unwrap_or_default();

    let msg = QueueMessage::new(identifier.clone(), interaction, initiator_id);

    // The platform needs a response either way; enqueue failure means the
    // deferred message is never edited, which beats timing out the webhook.
    match &state.queue {
        Some(queue) => {
            if let Err(e) = queue.publish(&msg).await {
                error!(command = %identifier, "failed to enqueue command: {}", e);
            }
        }
        None => warn!(command = %identifier, "no queue connected, dropping command"),
    }

    json_response(StatusCode::OK, deferred_ack(&identifier))
}

fn header_value(req: &Request<Incoming>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Inline pong for the platform handshake.
fn pong() -> serde_json::Value {
    serde_json::json!({ "type": 1 })
}

/// Deferred ack. Registration replies carry personal data, so their deferred
/// message is ephemeral.
fn deferred_ack(identifier: &str) -> serde_json::Value {
    if identifier == "register" {
        serde_json::json!({ "type": 5, "data": { "flags": 64 } })
    } else {
        serde_json::json!({ "type": 5 })
    }
}

/// Immediate ephemeral message, used for gate rejections.
fn rejection(content: &str) -> serde_json::Value {
    serde_json::json!({
        "type": 4,
        "data": { "content": content, "flags": 64 }
    })
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn health_check() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, serde_json::json!({ "healthy": true }))
}

fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    let ready = state.queue.is_some() || state.args.dev_mode;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(
        status,
        serde_json::json!({ "ready": ready, "queue_connected": state.queue.is_some() }),
    )
}

fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "service": "teller",
        }),
    )
}

fn unauthorized_response() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::UNAUTHORIZED,
        serde_json::json!({ "error": "invalid request signature" }),
    )
}

fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        serde_json::json!({ "error": "Bad Request", "message": message }),
    )
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        serde_json::json!({ "error": "Not Found", "path": path }),
    )
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
