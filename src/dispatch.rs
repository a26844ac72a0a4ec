//! Command dispatcher: builds a request from the current panel configuration
//! plus a command descriptor, posts it to the backend, and classifies the
//! response. Each dispatch runs on its own worker thread so the UI stays
//! responsive; overlapping dispatches are independent and their completions
//! may arrive in any order.

use crate::config::AppConfig;
use crate::log_debug;
use crate::storage::PanelConfig;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
#[cfg(test)]
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Instant;

/// A command to send: either a named preset or a raw command string. The two
/// variants go to distinct backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    Preset { key: String },
    Raw { cmd: String },
}

impl CommandRequest {
    pub fn preset(key: impl Into<String>) -> Self {
        Self::Preset { key: key.into() }
    }

    pub fn raw(cmd: impl Into<String>) -> Self {
        Self::Raw { cmd: cmd.into() }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Preset { .. } => "/api/preset",
            Self::Raw { .. } => "/api/raw",
        }
    }
}

#[derive(Serialize)]
struct PresetPayload<'a> {
    key: &'a str,
    cfg: &'a PanelConfig,
}

#[derive(Serialize)]
struct RawPayload<'a> {
    cmd: &'a str,
    cfg: &'a PanelConfig,
}

/// JSON response contract shared by both endpoints. A well-behaved backend
/// populates at most one of `response`/`error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiReply {
    #[serde(default)]
    pub sent: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The three ways a dispatch can end: a JSON reply (any HTTP status), a
/// non-JSON HTTP response (backend errors that bypass the JSON contract),
/// or a network-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Reply(ApiReply),
    HttpError {
        status: u16,
        status_text: String,
        body: String,
    },
    Transport(String),
}

impl DispatchOutcome {
    /// Render the outcome as a panel log line. `response` wins over `error`
    /// when both are populated; empty strings count as absent.
    pub fn log_line(&self) -> String {
        match self {
            Self::Reply(reply) => {
                let sent = reply.sent.as_deref().unwrap_or("");
                let tail = [reply.response.as_deref(), reply.error.as_deref()]
                    .into_iter()
                    .flatten()
                    .find(|text| !text.is_empty())
                    .unwrap_or("no response");
                format!("> {sent}\n< {tail}")
            }
            Self::HttpError {
                status,
                status_text,
                body,
            } => format!("HTTP {status} {status_text}\n{body}"),
            Self::Transport(description) => format!("Fetch error: {description}"),
        }
    }
}

/// Handle the UI uses to poll a worker thread for its outcome.
pub struct DispatchJob {
    pub receiver: mpsc::Receiver<DispatchOutcome>,
    pub handle: Option<thread::JoinHandle<()>>,
}

/// Spawn a worker thread that performs exactly one HTTP exchange and reports
/// one outcome. No cancellation, no timeout, no retry: fire-and-once.
pub fn start_dispatch_job(
    config: AppConfig,
    request: CommandRequest,
    cfg: PanelConfig,
) -> DispatchJob {
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let started = Instant::now();
        let outcome = execute_dispatch(&config, &request, &cfg);
        if config.log_timings {
            log_debug(&format!(
                "timing|phase=dispatch|endpoint={}|elapsed_s={:.3}",
                request.endpoint(),
                started.elapsed().as_secs_f64()
            ));
        }
        let _ = tx.send(outcome);
    });

    DispatchJob {
        receiver: rx,
        handle: Some(handle),
    }
}

fn execute_dispatch(
    config: &AppConfig,
    request: &CommandRequest,
    cfg: &PanelConfig,
) -> DispatchOutcome {
    #[cfg(test)]
    {
        // Clone the hook handle out from under the lock so a hook that blocks
        // (e.g. sleeps to force dispatch overlap) does not serialize other
        // in-flight dispatches waiting to read the same hook.
        let hook = DISPATCH_HOOK.get().and_then(|storage| {
            storage
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .as_ref()
                .map(Arc::clone)
        });
        if let Some(hook) = hook {
            return hook(request, cfg);
        }
    }
    perform_dispatch(&config.backend, request, cfg)
}

/// Post the request and classify the response. HTTP error statuses still
/// carry a usable response (the backend answers 400 with a JSON error body),
/// so they flow through the same content-type branch as 200s.
pub fn perform_dispatch(
    backend: &str,
    request: &CommandRequest,
    cfg: &PanelConfig,
) -> DispatchOutcome {
    let url = format!("{}{}", backend.trim_end_matches('/'), request.endpoint());
    let call = match request {
        CommandRequest::Preset { key } => ureq::post(&url).send_json(PresetPayload {
            key: key.as_str(),
            cfg,
        }),
        CommandRequest::Raw { cmd } => ureq::post(&url).send_json(RawPayload {
            cmd: cmd.as_str(),
            cfg,
        }),
    };

    let response = match call {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(err) => return DispatchOutcome::Transport(err.to_string()),
    };
    classify_response(response)
}

fn classify_response(response: ureq::Response) -> DispatchOutcome {
    let status = response.status();
    let status_text = response.status_text().to_string();
    let is_json = response
        .header("Content-Type")
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    let body = match response.into_string() {
        Ok(body) => body,
        Err(err) => {
            return DispatchOutcome::Transport(format!("failed to read response body: {err}"))
        }
    };

    if !is_json {
        return DispatchOutcome::HttpError {
            status,
            status_text,
            body,
        };
    }

    match serde_json::from_str::<ApiReply>(&body) {
        Ok(reply) => DispatchOutcome::Reply(reply),
        Err(err) => DispatchOutcome::Transport(format!("invalid JSON from backend: {err}")),
    }
}

#[cfg(test)]
pub(crate) type DispatchHook =
    Box<dyn Fn(&CommandRequest, &PanelConfig) -> DispatchOutcome + Send + Sync + 'static>;

#[cfg(test)]
static DISPATCH_HOOK: OnceLock<Mutex<Option<Arc<DispatchHook>>>> = OnceLock::new();

#[cfg(test)]
static DISPATCH_HOOK_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[cfg(test)]
fn set_dispatch_hook(hook: Option<DispatchHook>) {
    let storage = DISPATCH_HOOK.get_or_init(|| Mutex::new(None));
    *storage.lock().unwrap_or_else(|e| e.into_inner()) = hook.map(Arc::new);
}

/// Run `f` with the dispatcher stubbed out; serialized so concurrent tests
/// never see each other's hook.
#[cfg(test)]
pub(crate) fn with_dispatch_hook<R>(hook: DispatchHook, f: impl FnOnce() -> R) -> R {
    let _guard = DISPATCH_HOOK_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());

    set_dispatch_hook(Some(hook));

    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            set_dispatch_hook(None);
        }
    }
    let _reset = Reset; // clears hook even if f() panics

    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn test_cfg() -> PanelConfig {
        PanelConfig {
            ip: "192.168.1.5".into(),
            port: 8000,
            wrapcr: false,
        }
    }

    /// Serve exactly one request on an ephemeral port, answering with
    /// `response`; the join handle yields the request body the server saw.
    fn serve_once(
        response: tiny_http::Response<std::io::Cursor<Vec<u8>>>,
    ) -> (String, thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("tcp listener")
            .port();
        let backend = format!("http://127.0.0.1:{port}");
        let handle = thread::spawn(move || {
            let mut request = server.recv().expect("receive request");
            let mut body = String::new();
            request
                .as_reader()
                .read_to_string(&mut body)
                .expect("read request body");
            request.respond(response).expect("send response");
            body
        });
        (backend, handle)
    }

    fn json_response(body: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
        tiny_http::Response::from_string(body).with_header(
            tiny_http::Header::from_bytes("Content-Type", "application/json; charset=utf-8")
                .expect("header"),
        )
    }

    #[test]
    fn preset_dispatch_posts_key_and_cfg() {
        let (backend, server) = serve_once(json_response(r#"{"sent":"*up#","response":"ok"}"#));
        let outcome = perform_dispatch(&backend, &CommandRequest::preset("up"), &test_cfg());

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body["key"], "up");
        assert_eq!(body["cfg"]["ip"], "192.168.1.5");
        assert_eq!(body["cfg"]["port"], 8000);
        assert_eq!(body["cfg"]["wrapcr"], false);

        match outcome {
            DispatchOutcome::Reply(reply) => {
                assert_eq!(reply.sent.as_deref(), Some("*up#"));
                assert_eq!(reply.response.as_deref(), Some("ok"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn raw_dispatch_posts_cmd_and_cfg() {
        let (backend, server) = serve_once(json_response(r#"{"sent":"*pow=on#","response":""}"#));
        let outcome =
            perform_dispatch(&backend, &CommandRequest::raw("*pow=on#"), &test_cfg());

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body["cmd"], "*pow=on#");
        assert_eq!(body["cfg"]["ip"], "192.168.1.5");

        assert!(matches!(outcome, DispatchOutcome::Reply(_)));
    }

    #[test]
    fn non_json_error_body_is_surfaced_verbatim() {
        let response = tiny_http::Response::from_string("Internal Error").with_status_code(500);
        let (backend, server) = serve_once(response);
        let outcome = perform_dispatch(&backend, &CommandRequest::preset("up"), &test_cfg());
        server.join().unwrap();

        match &outcome {
            DispatchOutcome::HttpError { status, body, .. } => {
                assert_eq!(*status, 500);
                assert_eq!(body, "Internal Error");
            }
            other => panic!("expected http error, got {other:?}"),
        }
        let line = outcome.log_line();
        assert!(line.contains("HTTP 500"), "log line was {line:?}");
        assert!(line.contains("Internal Error"));
    }

    #[test]
    fn json_error_status_still_parses_reply() {
        let response = json_response(r#"{"error":"unknown preset key"}"#).with_status_code(400);
        let (backend, server) = serve_once(response);
        let outcome = perform_dispatch(&backend, &CommandRequest::preset("bogus"), &test_cfg());
        server.join().unwrap();

        assert_eq!(
            outcome.log_line(),
            "> \n< unknown preset key",
            "JSON 400 bodies follow the normal reply path"
        );
    }

    #[test]
    fn connection_failure_is_a_transport_outcome() {
        // Bind then immediately drop a listener so the port is closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = format!("http://127.0.0.1:{port}");
        let outcome = perform_dispatch(&backend, &CommandRequest::preset("up"), &test_cfg());
        match &outcome {
            DispatchOutcome::Transport(_) => {}
            other => panic!("expected transport failure, got {other:?}"),
        }
        assert!(outcome.log_line().starts_with("Fetch error: "));
    }

    #[test]
    fn reply_log_line_shows_sent_and_response() {
        let outcome = DispatchOutcome::Reply(ApiReply {
            sent: Some("UP\r\n".into()),
            response: Some("OK".into()),
            error: None,
        });
        assert_eq!(outcome.log_line(), "> UP\r\n< OK");
    }

    #[test]
    fn reply_log_line_uses_error_when_response_absent() {
        let outcome = DispatchOutcome::Reply(ApiReply {
            sent: Some("FOO".into()),
            response: None,
            error: Some("unknown command".into()),
        });
        assert_eq!(outcome.log_line(), "> FOO\n< unknown command");
    }

    #[test]
    fn reply_log_line_prefers_response_over_error() {
        let outcome = DispatchOutcome::Reply(ApiReply {
            sent: Some("FOO".into()),
            response: Some("OK".into()),
            error: Some("ignored".into()),
        });
        assert_eq!(outcome.log_line(), "> FOO\n< OK");
    }

    #[test]
    fn reply_log_line_falls_back_when_both_empty() {
        let outcome = DispatchOutcome::Reply(ApiReply {
            sent: None,
            response: Some(String::new()),
            error: None,
        });
        assert_eq!(outcome.log_line(), "> \n< no response");
    }

    #[test]
    fn endpoints_differ_per_variant() {
        assert_eq!(CommandRequest::preset("up").endpoint(), "/api/preset");
        assert_eq!(CommandRequest::raw("x").endpoint(), "/api/raw");
    }

    #[test]
    fn dispatch_job_delivers_outcome_over_channel() {
        use clap::Parser;
        let config = {
            let mut c = AppConfig::parse_from(["test-app"]);
            c.validate().unwrap();
            c
        };
        let outcome = with_dispatch_hook(
            Box::new(|request, _| {
                DispatchOutcome::Reply(ApiReply {
                    sent: Some(format!("echo {}", request.endpoint())),
                    response: Some("done".into()),
                    error: None,
                })
            }),
            || {
                let mut job =
                    start_dispatch_job(config.clone(), CommandRequest::preset("up"), test_cfg());
                let outcome = job
                    .receiver
                    .recv_timeout(std::time::Duration::from_secs(5))
                    .expect("worker reports an outcome");
                if let Some(handle) = job.handle.take() {
                    let _ = handle.join();
                }
                outcome
            },
        );
        assert_eq!(outcome.log_line(), "> echo /api/preset\n< done");
    }
}
