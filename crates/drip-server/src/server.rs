//! Axum app: routes, handlers, and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use drip_core::batch::MessageBatch;
use drip_core::errors::DispatchError;
use drip_core::state::LifecycleState;
use drip_dispatch::Dispatcher;
use drip_session::SessionManager;

/// Server configuration.
#[derive(Clone, Copy, Debug)]
pub struct ServerConfig {
    /// TCP port to bind on all interfaces.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle manager.
    pub manager: Arc<SessionManager>,
    /// Dispatch job admission.
    pub dispatcher: Arc<Dispatcher>,
    /// Renders `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/qr", get(qr_handler))
        .route("/status", get(status_handler))
        .route("/start", post(start_handler))
        .route("/stop", post(stop_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve. Returns a handle that keeps the server task alive.
pub async fn start(
    config: ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    let port = listener.local_addr()?.port();
    info!(port, "control surface listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .ok();
    });

    Ok(ServerHandle {
        port,
        _server: server,
    })
}

/// Handle returned by [`start`] — keeps the serve task alive.
pub struct ServerHandle {
    /// Actual bound port (useful with port 0).
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let body = match state.manager.state() {
        LifecycleState::Connected => connected_page(state.dispatcher.job_active()),
        _ => pairing_page(state.manager.pairing_code().map(|c| c.0)),
    };
    Html(body)
}

async fn qr_handler(State(state): State<AppState>) -> Response {
    match state.manager.pairing_code() {
        Some(code) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            code.0,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "pairing code not available").into_response(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    state: &'static str,
    pairing: Option<String>,
    job_active: bool,
}

async fn status_handler(State(state): State<AppState>) -> axum::Json<StatusBody> {
    axum::Json(StatusBody {
        state: state.manager.state().as_str(),
        pairing: state.manager.pairing_code().map(|c| c.0),
        job_active: state.dispatcher.job_active(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartedBody {
    status: &'static str,
    lines: usize,
    delay_ms: u64,
}

async fn start_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut batch: Option<MessageBatch> = None;
    let mut number: Option<String> = None;
    let mut delay_secs: Option<u64> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart body: {e}")),
        };
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        let text = match field.text().await {
            Ok(text) => text,
            Err(e) => return bad_request(format!("unreadable field {name}: {e}")),
        };
        match name.as_str() {
            "messageFile" => batch = Some(MessageBatch::from_text(&text)),
            "number" => number = Some(text),
            "delay" => match text.trim().parse::<u64>() {
                Ok(secs) => delay_secs = Some(secs),
                Err(_) => return bad_request(format!("delay is not a number: {text}")),
            },
            _ => {}
        }
    }

    let Some(batch) = batch else {
        return bad_request("message file not found".into());
    };
    let Some(number) = number else {
        return bad_request("recipient number missing".into());
    };
    let delay = Duration::from_secs(delay_secs.unwrap_or(0));

    match state.dispatcher.start(&number, batch.clone(), delay) {
        Ok(_handle) => (
            StatusCode::OK,
            axum::Json(StartedBody {
                status: "started",
                lines: batch.len(),
                delay_ms: delay.as_millis() as u64,
            }),
        )
            .into_response(),
        Err(e) => dispatch_error_response(&e),
    }
}

#[derive(Serialize)]
struct StoppedBody {
    stopped: bool,
    message: &'static str,
}

async fn stop_handler(State(state): State<AppState>) -> axum::Json<StoppedBody> {
    let stopped = state.dispatcher.stop();
    axum::Json(StoppedBody {
        stopped,
        message: if stopped {
            "dispatch job cancelled"
        } else {
            "no dispatch job was running"
        },
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(&state.metrics),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

fn dispatch_error_response(error: &DispatchError) -> Response {
    let status = match error {
        DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
        DispatchError::Conflict => StatusCode::CONFLICT,
        DispatchError::SessionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, error.to_string()).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Pages
// ─────────────────────────────────────────────────────────────────────────────

fn pairing_page(code: Option<String>) -> String {
    let body = match code {
        // The code is rendered as a scannable QR client-side; the <pre>
        // fallback keeps the raw code visible without scripts.
        Some(code) => format!(
            "<p>Scan this pairing code from the app on your phone:</p>\n\
             <div id=\"qr\"></div>\n<pre>{code}</pre>\n\
             <script src=\"https://unpkg.com/qrcodejs@1.0.0/qrcode.min.js\"></script>\n\
             <script>new QRCode(document.getElementById('qr'), \
             document.querySelector('pre').textContent.trim());</script>"
        ),
        None => "<p>Waiting for the gateway to issue a pairing code&hellip;</p>".to_string(),
    };
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"3\">\
         <title>drip &mdash; pairing</title></head>\n\
         <body><h1>drip</h1>\n{body}\n</body></html>"
    )
}

fn connected_page(job_active: bool) -> String {
    let job_note = if job_active {
        "<p>A dispatch job is running. <form method=\"post\" action=\"/stop\">\
         <button type=\"submit\">Stop</button></form></p>"
    } else {
        ""
    };
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <title>drip &mdash; connected</title></head>\n\
         <body><h1>drip</h1>\n<p>Session connected.</p>\n{job_note}\n\
         <form method=\"post\" action=\"/start\" enctype=\"multipart/form-data\">\n\
         <label>Messages file <input type=\"file\" name=\"messageFile\" required></label><br>\n\
         <label>Number <input type=\"text\" name=\"number\" required></label><br>\n\
         <label>Delay (seconds) <input type=\"number\" name=\"delay\" value=\"1\" min=\"1\"></label><br>\n\
         <button type=\"submit\">Start</button>\n</form>\n</body></html>"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use drip_core::retry::RetryConfig;
    use drip_core::state::PairingCode;
    use drip_dispatch::FailurePolicy;
    use drip_session::testing::{ConnectionScript, ScriptedTransport};
    use drip_session::{CredentialStore, Credentials, TransportEvent};

    struct Harness {
        router: Router,
        manager: Arc<SessionManager>,
        scripts: mpsc::Receiver<ConnectionScript>,
        shutdown: CancellationToken,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path(), "test").unwrap();
        let (transport, scripts) = ScriptedTransport::new();
        let manager = Arc::new(SessionManager::new(
            Arc::new(transport),
            store,
            RetryConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        drop(tokio::spawn({
            let manager = Arc::clone(&manager);
            let shutdown = shutdown.clone();
            async move { manager.run(shutdown).await }
        }));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&manager),
            Duration::from_millis(1_000),
            FailurePolicy::default(),
        ));
        // Recorder handle without global installation; tests run in one
        // process and the global recorder can only be installed once.
        let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let router = build_router(AppState {
            manager: Arc::clone(&manager),
            dispatcher,
            metrics,
        });
        Harness {
            router,
            manager,
            scripts,
            shutdown,
            _dir: dir,
        }
    }

    async fn connect(h: &mut Harness) -> ConnectionScript {
        let script = h.scripts.recv().await.unwrap();
        script
            .emit(TransportEvent::Open {
                credentials: Credentials(serde_json::json!({})),
            })
            .await;
        let mut state = h.manager.watch_state();
        while *state.borrow_and_update() != LifecycleState::Connected {
            state.changed().await.unwrap();
        }
        script
    }

    async fn pair(h: &mut Harness) -> ConnectionScript {
        let script = h.scripts.recv().await.unwrap();
        script
            .emit(TransportEvent::Pairing {
                code: PairingCode("PAIR-CODE".into()),
            })
            .await;
        let mut state = h.manager.watch_state();
        while *state.borrow_and_update() != LifecycleState::AwaitingPairing {
            state.changed().await.unwrap();
        }
        script
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    const BOUNDARY: &str = "drip-test-boundary";

    fn multipart_request(parts: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            if *name == "messageFile" {
                body.push_str(
                    "Content-Disposition: form-data; name=\"messageFile\"; \
                     filename=\"messages.txt\"\r\nContent-Type: text/plain\r\n\r\n",
                );
            } else {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                ));
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::post("/start")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn post_start(router: &Router, parts: &[(&str, &str)]) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(multipart_request(parts))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn index_shows_pairing_view_then_send_form() {
        let mut h = harness();
        let (status, body) = get(&h.router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("pairing code"));

        let script = pair(&mut h).await;
        let (_, body) = get(&h.router, "/").await;
        assert!(body.contains("PAIR-CODE"));

        script
            .emit(TransportEvent::Open {
                credentials: Credentials(serde_json::json!({})),
            })
            .await;
        let mut state = h.manager.watch_state();
        while *state.borrow_and_update() != LifecycleState::Connected {
            state.changed().await.unwrap();
        }
        let (_, body) = get(&h.router, "/").await;
        assert!(body.contains("/start"));
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn qr_is_503_until_pairing_then_plain_text() {
        let mut h = harness();
        let (status, _) = get(&h.router, "/qr").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let _script = pair(&mut h).await;
        let (status, body) = get(&h.router, "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "PAIR-CODE");
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn status_snapshot_tracks_lifecycle() {
        let mut h = harness();
        let (_, body) = get(&h.router, "/status").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["pairing"], serde_json::Value::Null);
        assert_eq!(json["jobActive"], false);

        let _script = pair(&mut h).await;
        let (_, body) = get(&h.router, "/status").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "awaiting_pairing");
        assert_eq!(json["pairing"], "PAIR-CODE");
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_the_file_part() {
        let mut h = harness();
        let _script = connect(&mut h).await;
        let (status, body) = post_start(&h.router, &[("number", "1555"), ("delay", "2")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("message file"));
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn start_rejects_an_empty_batch() {
        let mut h = harness();
        let _script = connect(&mut h).await;
        let (status, _) = post_start(
            &h.router,
            &[("messageFile", "\n  \n"), ("number", "1555"), ("delay", "2")],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_disconnected_is_503() {
        let h = harness();
        let (status, _) = post_start(
            &h.router,
            &[("messageFile", "hello"), ("number", "1555"), ("delay", "2")],
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_a_job_and_conflicts_on_second_start() {
        let mut h = harness();
        let mut script = connect(&mut h).await;

        let (status, body) = post_start(
            &h.router,
            &[
                ("messageFile", "hello\nworld"),
                ("number", "1555"),
                ("delay", "2"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["lines"], 2);
        assert_eq!(json["delayMs"], 2_000);

        let (to, body) = script.ack_next_send().await;
        assert_eq!(to, "1555@s.whatsapp.net");
        assert_eq!(body, "hello");

        let (status, _) = post_start(
            &h.router,
            &[("messageFile", "x"), ("number", "1555"), ("delay", "2")],
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut h = harness();
        let mut script = connect(&mut h).await;

        let (status, body) = get_post_stop(&h.router).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("no dispatch job"));

        let (status, _) = post_start(
            &h.router,
            &[("messageFile", "hello"), ("number", "1555"), ("delay", "2")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let _ = script.ack_next_send().await;

        let (status, body) = get_post_stop(&h.router).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("cancelled"));

        let (status, body) = get_post_stop(&h.router).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("no dispatch job"));
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn bad_delay_is_400() {
        let mut h = harness();
        let _script = connect(&mut h).await;
        let (status, body) = post_start(
            &h.router,
            &[
                ("messageFile", "hello"),
                ("number", "1555"),
                ("delay", "soon"),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("delay"));
        h.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn metrics_renders_prometheus_text() {
        let h = harness();
        let (status, _) = get(&h.router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        h.shutdown.cancel();
    }

    async fn get_post_stop(router: &Router) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::post("/stop").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}
