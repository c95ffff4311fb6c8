#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use std::env;
#[cfg(not(target_arch = "wasm32"))]
use std::io::{Cursor, Read};
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::scores::{Leaderboard, ScoreEndpoint, ScoreSubmission};
#[cfg(not(target_arch = "wasm32"))]
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
#[cfg(not(target_arch = "wasm32"))]
use tracing::{info, warn};

/// Serves the leaderboard over HTTP: `GET /ranking` and `POST /ranking`.
#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let board = Leaderboard::new();
    let server = Server::http(&addr).map_err(|e| anyhow::anyhow!(e))?;
    info!("Ranking server on http://{}/ranking", addr);

    for mut request in server.incoming_requests() {
        let url = request.url().to_string();
        let method = request.method().clone();
        let path = url.split('?').next().unwrap_or("/").trim_end_matches('/');
        let (status, body) = route(&board, &method, path, &mut request);
        if let Err(e) = request.respond(json_response(status, body)) {
            warn!("failed to respond to {} {}: {}", method, url, e);
        }
        info!("{} {} -> {}", method, url, status);
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn route(board: &Leaderboard, method: &Method, path: &str, request: &mut Request) -> (u16, String) {
    match (method, path) {
        (Method::Options, _) => (204, String::new()),
        (Method::Get, "/ranking") => match board.rankings() {
            Ok(ranking) => (200, serde_json::to_string(&ranking).unwrap_or_default()),
            Err(e) => (503, error_body(&e.to_string())),
        },
        (Method::Post, "/ranking") => {
            let mut raw = String::new();
            if let Err(e) = request.as_reader().read_to_string(&mut raw) {
                return (400, error_body(&e.to_string()));
            }
            let score: ScoreSubmission = match serde_json::from_str(&raw) {
                Ok(score) => score,
                Err(e) => return (400, error_body(&e.to_string())),
            };
            match board.submit(&score) {
                Ok(()) => (201, serde_json::to_string(&score).unwrap_or_default()),
                Err(e) => (422, error_body(&e.to_string())),
            }
        }
        _ => (404, error_body("not found")),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[cfg(not(target_arch = "wasm32"))]
fn json_response(status: u16, body: String) -> Response<Cursor<Vec<u8>>> {
    let mut resp = Response::from_string(body).with_status_code(StatusCode(status));
    for (name, value) in [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ] {
        if let Ok(h) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            resp.add_header(h);
        }
    }
    resp
}
