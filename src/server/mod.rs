//! HTTP server for the recommendation service
//!
//! Blocking microserver, no async runtime. One request per connection,
//! one thread per connection.

pub mod microserver;
mod routes;

pub use routes::{route_request, ItemView, RecommendationResponse, ServerState};

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::service::RecommendationService;
use microserver::HttpResponse;

/// Serve one connection on any Read + Write stream
pub fn handle_connection(stream: &mut (impl Read + Write), state: &ServerState) {
    let response = match microserver::read_request(stream) {
        Ok(Some(request)) => {
            debug!(method = %request.method, path = %request.path, "request");
            route_request(&request, state)
        }
        Ok(None) => return,
        Err(err) => {
            debug!(status = err.status, reason = %err.message, "unreadable request");
            HttpResponse::json(err.status, &serde_json::json!({"error": err.message}))
        }
    };
    microserver::write_response(stream, &response);
}

/// Bind the configured address
pub fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.host, config.port);
    if config.host != "127.0.0.1" && config.host != "localhost" {
        warn!(addr = %addr, "binding beyond loopback; the server has no TLS or auth");
    }
    TcpListener::bind(&addr).with_context(|| format!("Failed to bind {}", addr))
}

/// Accept connections until the listener fails
pub fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(addr = %addr, "listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    handle_connection(&mut stream, &state);
                    let _ = stream.shutdown(Shutdown::Write);
                });
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

/// Bind and serve until the process is stopped
pub fn run(service: Arc<RecommendationService>, config: &ServerConfig) -> Result<()> {
    let listener = bind(config)?;
    serve(listener, Arc::new(ServerState::new(service)))
}
