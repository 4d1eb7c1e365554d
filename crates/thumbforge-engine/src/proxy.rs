//! The `/generate` and `/edit` handlers, independent of the HTTP server.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use thumbforge_contracts::wire::{
    png_data_url, EditRequest, ErrorReply, GenerateRequest, ImageReply, EDIT_PATH, GENERATE_PATH,
    HEALTH_PATH,
};

use crate::error_chain_text;
use crate::gemini::{ContentPart, ImageModel, ReferenceImage};

const GENERATE_FALLBACK: &str = "Failed to generate image";
const EDIT_FALLBACK: &str = "Failed to edit image";
const UPSTREAM_MESSAGE_MAX_CHARS: usize = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),
    #[error("No image returned")]
    NoImage,
    #[error("{0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NoImage | Self::Upstream(_) => 500,
        }
    }
}

/// Data of the first part that carries inline image bytes.
pub fn first_inline_image(parts: &[ContentPart]) -> Option<&str> {
    parts.iter().find_map(|part| match part {
        ContentPart::InlineData { data, .. } if !data.is_empty() => Some(data.as_str()),
        _ => None,
    })
}

pub fn generate_image(
    model: &dyn ImageModel,
    request: &GenerateRequest,
) -> Result<ImageReply, ProxyError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ProxyError::BadRequest("Prompt is required".to_string()));
    }
    call_model(model, prompt, None, GENERATE_FALLBACK)
}

pub fn edit_image(model: &dyn ImageModel, request: &EditRequest) -> Result<ImageReply, ProxyError> {
    let prompt = request.prompt.trim();
    if prompt.is_empty()
        || request.base64_image.trim().is_empty()
        || request.mime_type.trim().is_empty()
    {
        return Err(ProxyError::BadRequest(
            "Prompt, base64Image and mimeType are required".to_string(),
        ));
    }
    let reference = ReferenceImage {
        base64_data: request.base64_image.trim(),
        mime_type: request.mime_type.trim(),
    };
    call_model(model, prompt, Some(reference), EDIT_FALLBACK)
}

fn call_model(
    model: &dyn ImageModel,
    prompt: &str,
    reference: Option<ReferenceImage<'_>>,
    fallback: &str,
) -> Result<ImageReply, ProxyError> {
    let parts = model.generate_content(prompt, reference).map_err(|err| {
        tracing::error!(model = model.name(), "image model call failed: {err:#}");
        let message = error_chain_text(&err, UPSTREAM_MESSAGE_MAX_CHARS);
        if message.trim().is_empty() {
            ProxyError::Upstream(fallback.to_string())
        } else {
            ProxyError::Upstream(message)
        }
    })?;
    let Some(data) = first_inline_image(&parts) else {
        tracing::warn!(
            model = model.name(),
            parts = parts.len(),
            "image model returned no inline image"
        );
        return Err(ProxyError::NoImage);
    };
    Ok(ImageReply {
        data_url: png_data_url(data),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ProxyResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        let body = serde_json::to_value(ErrorReply {
            error: message.into(),
        })
        .unwrap_or(Value::Null);
        Self::json(status, body)
    }
}

impl From<Result<ImageReply, ProxyError>> for ProxyResponse {
    fn from(result: Result<ImageReply, ProxyError>) -> Self {
        match result {
            Ok(reply) => match serde_json::to_value(reply) {
                Ok(body) => Self::json(200, body),
                Err(err) => Self::error(500, err.to_string()),
            },
            Err(err) => Self::error(err.status(), err.to_string()),
        }
    }
}

/// Maps one HTTP request onto the handlers.
pub fn route(model: &dyn ImageModel, method: &str, url: &str, body: &[u8]) -> ProxyResponse {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let method = method.to_ascii_uppercase();

    if method == "OPTIONS" {
        return ProxyResponse {
            status: 204,
            body: None,
        };
    }

    match path {
        GENERATE_PATH | EDIT_PATH if method != "POST" => {
            ProxyResponse::error(405, "Method not allowed")
        }
        GENERATE_PATH => match parse_body::<GenerateRequest>(body) {
            Ok(request) => generate_image(model, &request).into(),
            Err(response) => response,
        },
        EDIT_PATH => match parse_body::<EditRequest>(body) {
            Ok(request) => edit_image(model, &request).into(),
            Err(response) => response,
        },
        HEALTH_PATH if method == "GET" => ProxyResponse::json(
            200,
            json!({
                "status": "ok",
                "model": model.name(),
            }),
        ),
        HEALTH_PATH => ProxyResponse::error(405, "Method not allowed"),
        _ => ProxyResponse::error(404, "Not found"),
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProxyResponse> {
    serde_json::from_slice(body)
        .map_err(|err| ProxyResponse::error(400, format!("Invalid JSON body: {err}")))
}
