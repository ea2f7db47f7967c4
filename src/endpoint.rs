/// HTTP endpoint for the hazard monitor.
///
/// Endpoints:
/// - GET  /health            - Service health check
/// - GET  /risk              - Composite disaster-risk score from live feeds
/// - GET  /history           - Notification history, newest first
/// - POST /history/clear     - Empty the notification history
/// - POST /evaluate/{type}   - Evaluate a measurement (JSON body) against the
///                             stored notification settings
///
/// Routing is a pure function of method, path and body so it can be tested
/// without a socket.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::daemon::Daemon;
use crate::model::{Measurement, MonitorType};
use crate::monitor::NotificationMonitor;
use crate::scoring::RiskScorer;
use crate::settings::SettingsPort;

const ENDPOINTS: [&str; 5] = [
    "GET /health",
    "GET /risk",
    "GET /history",
    "POST /history/clear",
    "POST /evaluate/{type}",
];

/// Shared handles the routes operate on.
#[derive(Clone)]
pub struct Endpoint {
    scorer: Arc<RiskScorer>,
    monitor: Arc<NotificationMonitor>,
    settings: Arc<dyn SettingsPort>,
}

impl Endpoint {
    pub fn new(scorer: Arc<RiskScorer>, monitor: Arc<NotificationMonitor>, settings: Arc<dyn SettingsPort>) -> Self {
        Self {
            scorer,
            monitor,
            settings,
        }
    }

    pub fn for_daemon(daemon: &Daemon) -> Self {
        Self::new(daemon.scorer(), daemon.monitor(), daemon.settings())
    }

    /// Dispatches one request to its handler; returns status and JSON body.
    pub fn route(&self, method: &str, url: &str, body: &str) -> (u16, Value) {
        let path = url.split('?').next().unwrap_or(url);
        match (method, path) {
            ("GET", "/health") => handle_health(),
            ("GET", "/risk") => to_json(&self.scorer.calculate_disaster_risk()),
            ("GET", "/history") => to_json(&self.monitor.query_history()),
            ("POST", "/history/clear") => match self.monitor.clear_history() {
                Ok(()) => (200, json!({ "cleared": true })),
                Err(e) => (500, json!({ "error": e.to_string() })),
            },
            ("POST", p) if p.starts_with("/evaluate/") => {
                self.handle_evaluate(p.trim_start_matches("/evaluate/"), body)
            }
            _ => (
                404,
                json!({
                    "error": "Not found",
                    "available_endpoints": ENDPOINTS,
                }),
            ),
        }
    }

    fn handle_evaluate(&self, kind: &str, body: &str) -> (u16, Value) {
        let kind = match MonitorType::from_str(kind) {
            Ok(kind) => kind,
            Err(e) => return (400, json!({ "error": e.to_string() })),
        };
        // An empty body stands for "no measurement available".
        let measurement = if body.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Measurement>(body) {
                Ok(m) => Some(m),
                Err(e) => return (400, json!({ "error": format!("invalid measurement: {}", e) })),
            }
        };
        let settings = match self.settings.load() {
            Ok(settings) => settings,
            Err(e) => return (500, json!({ "error": e.to_string() })),
        };

        let evaluation = self.monitor.evaluate_measurement(kind, measurement.as_ref(), &settings);
        let faults: Vec<String> = evaluation.faults.iter().map(ToString::to_string).collect();
        (
            200,
            json!({
                "decision": evaluation.decision,
                "record": evaluation.record,
                "faults": faults,
            }),
        )
    }
}

fn handle_health() -> (u16, Value) {
    (
        200,
        json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn to_json<T: Serialize>(value: &T) -> (u16, Value) {
    match serde_json::to_value(value) {
        Ok(v) => (200, v),
        Err(e) => (500, json!({ "error": format!("failed to encode response: {}", e) })),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port. Blocks.
pub fn start_endpoint_server(port: u16, endpoint: Endpoint) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    log::info!("📡 HTTP endpoint listening on http://0.0.0.0:{}", port);

    for mut request in server.incoming_requests() {
        let mut body = String::new();
        let (status, json) = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => endpoint.route(&request.method().to_string(), request.url(), &body),
            Err(e) => (400, json!({ "error": format!("unreadable request body: {}", e) })),
        };
        log::debug!("{} {} -> {}", request.method(), request.url(), status);

        if let Err(e) = request.respond(create_response(status, &json)) {
            log::warn!("Failed to send response: {}", e);
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
