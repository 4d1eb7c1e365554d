use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use thumbforge_contracts::studio::{ProxyTransport, StudioError};
use thumbforge_contracts::wire::{ImageReply, OutboundRequest};

pub const FAILURE_DETAIL_MAX_CHARS: usize = 300;

/// Talks to a running proxy server on behalf of the studio.
pub struct HttpProxyTransport {
    base_url: String,
    http: HttpClient,
}

impl HttpProxyTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build proxy HTTP client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ProxyTransport for HttpProxyTransport {
    fn send(&self, request: &OutboundRequest) -> Result<String, StudioError> {
        let url = format!("{}{}", self.base_url, request.path());
        let body = request
            .body()
            .map_err(|err| StudioError::Transport(format!("Generation failed: {err}")))?;
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| StudioError::Transport(format!("Generation failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(StudioError::Transport(failure_message(
                status.as_u16(),
                &detail,
            )));
        }

        let reply: ImageReply = response.json().map_err(|err| {
            StudioError::Transport(format!("Generation failed: unreadable response ({err})"))
        })?;
        Ok(reply.data_url)
    }
}

fn failure_message(status: u16, detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        return format!("Generation failed ({status}).");
    }
    let clipped: String = detail.chars().take(FAILURE_DETAIL_MAX_CHARS).collect();
    format!("Generation failed ({status}): {clipped}")
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::thread;

    use pretty_assertions::assert_eq;
    use thumbforge_contracts::studio::{ProxyTransport, StudioError};
    use thumbforge_contracts::wire::{EditRequest, GenerateRequest, OutboundRequest};

    use super::{failure_message, HttpProxyTransport, FAILURE_DETAIL_MAX_CHARS};
    use crate::dryrun::DryrunModel;
    use crate::server::ProxyServer;

    fn stub(status: u16, body: &'static str) -> anyhow::Result<(String, thread::JoinHandle<Vec<u8>>)> {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|err| anyhow::anyhow!("bind failed: {err}"))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow::anyhow!("no ip address"))?;
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            if let Ok(mut request) = server.recv() {
                let _ = request.as_reader().read_to_end(&mut received);
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(tiny_http::StatusCode(status)),
                );
            }
            received
        });
        Ok((format!("http://{addr}/"), handle))
    }

    #[test]
    fn failure_message_clips_detail() {
        let long = "x".repeat(1000);
        let message = failure_message(500, &long);
        assert_eq!(
            message,
            format!("Generation failed (500): {}", "x".repeat(FAILURE_DETAIL_MAX_CHARS))
        );
        assert_eq!(failure_message(502, "  "), "Generation failed (502).");
    }

    #[test]
    fn non_success_status_surfaces_body() -> anyhow::Result<()> {
        let (base, handle) = stub(500, r#"{"error":"No image returned"}"#)?;
        let transport = HttpProxyTransport::new(&base)?;
        let result = transport.send(&OutboundRequest::Generate(GenerateRequest {
            prompt: "a fox".to_string(),
        }));
        assert_eq!(
            result,
            Err(StudioError::Transport(
                r#"Generation failed (500): {"error":"No image returned"}"#.to_string()
            ))
        );
        let received = handle
            .join()
            .map_err(|_| anyhow::anyhow!("stub thread panicked"))?;
        assert_eq!(received, br#"{"prompt":"a fox"}"#.to_vec());
        Ok(())
    }

    #[test]
    fn unreachable_server_is_a_transport_error() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let transport = HttpProxyTransport::new(&format!("http://{addr}"))?;
        let result = transport.send(&OutboundRequest::Generate(GenerateRequest {
            prompt: "a fox".to_string(),
        }));
        assert!(matches!(
            result,
            Err(StudioError::Transport(message)) if message.starts_with("Generation failed:")
        ));
        Ok(())
    }

    #[test]
    fn edit_round_trip_through_proxy_server() -> anyhow::Result<()> {
        let server = ProxyServer::bind("127.0.0.1:0", Box::new(DryrunModel))?;
        let addr = server
            .local_addr()
            .ok_or_else(|| anyhow::anyhow!("server has no ip address"))?;
        let handle = thread::spawn(move || server.serve_one());

        let transport = HttpProxyTransport::new(&format!("http://{addr}"))?;
        let data_url = transport.send(&OutboundRequest::Edit(EditRequest {
            prompt: "make it pop".to_string(),
            base64_image: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        }))?;
        assert!(data_url.starts_with("data:image/png;base64,"));

        handle
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))??;
        Ok(())
    }
}
