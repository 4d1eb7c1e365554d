use std::io::Read;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tiny_http::{Header, Request, Response, Server, StatusCode};

use crate::gemini::ImageModel;
use crate::proxy::{route, ProxyResponse};

/// Blocking HTTP front for the proxy handlers. Requests are served one at a
/// time.
pub struct ProxyServer {
    server: Server,
    model: Box<dyn ImageModel>,
}

impl ProxyServer {
    pub fn bind(addr: &str, model: Box<dyn ImageModel>) -> Result<Self> {
        let server = Server::http(addr).map_err(|err| anyhow!("failed to bind {addr}: {err}"))?;
        Ok(Self { server, model })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn serve(&self) -> Result<()> {
        for request in self.server.incoming_requests() {
            self.handle(request);
        }
        Ok(())
    }

    /// Blocks for a single request and answers it.
    pub fn serve_one(&self) -> Result<()> {
        let request = self.server.recv().context("failed to receive request")?;
        self.handle(request);
        Ok(())
    }

    fn handle(&self, mut request: Request) {
        let started = Instant::now();
        let method = request.method().to_string();
        let url = request.url().to_string();

        let mut body = Vec::new();
        let response = match request.as_reader().read_to_end(&mut body) {
            Ok(_) => route(self.model.as_ref(), &method, &url, &body),
            Err(err) => {
                tracing::warn!(%method, %url, "failed to read request body: {err}");
                route_read_failure()
            }
        };

        let status = response.status;
        if let Err(err) = request.respond(to_http_response(response)) {
            tracing::warn!(%method, %url, "failed to write response: {err}");
        }
        tracing::info!(
            %method,
            %url,
            status,
            elapsed_ms = elapsed_ms(started.elapsed()),
            "handled request"
        );
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn route_read_failure() -> ProxyResponse {
    ProxyResponse {
        status: 400,
        body: Some(serde_json::json!({ "error": "Failed to read request body" })),
    }
}

fn to_http_response(response: ProxyResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let data = response
        .body
        .map(|body| body.to_string().into_bytes())
        .unwrap_or_default();
    let mut http = Response::from_data(data).with_status_code(StatusCode(response.status));
    for (name, value) in [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ] {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            http.add_header(header);
        }
    }
    http
}
