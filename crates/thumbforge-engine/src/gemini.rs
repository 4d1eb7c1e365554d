use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::truncate_text;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Reference image attached to an edit request, already base64 encoded.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceImage<'a> {
    pub base64_data: &'a str,
    pub mime_type: &'a str,
}

/// One part of a model response, in the order the model produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/// The external image model, reduced to what the proxy needs.
pub trait ImageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the parts of the first candidate.
    fn generate_content(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage<'_>>,
    ) -> Result<Vec<ContentPart>>;
}

pub struct GeminiModel {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl GeminiModel {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        // A stuck upstream call stays stuck; there is no client-side deadline.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            http,
        })
    }

    /// Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and `GEMINI_API_BASE`.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let Some(api_key) = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
        else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let api_base =
            non_empty_env("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let model = model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| non_empty_env("THUMBFORGE_IMAGE_MODEL"))
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        Self::new(api_base, api_key, model)
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub(crate) fn build_payload(prompt: &str, reference: Option<ReferenceImage<'_>>) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(reference) = reference {
            parts.push(json!({
                "inlineData": {
                    "mimeType": reference.mime_type,
                    "data": reference.base64_data,
                }
            }));
        }
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "candidateCount": 1,
                "responseModalities": ["TEXT", "IMAGE"],
            },
        })
    }

    pub(crate) fn first_candidate_parts(response_payload: &Value) -> Vec<ContentPart> {
        let parts = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::new();
        for part in parts {
            if let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            {
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                out.push(ContentPart::InlineData {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                });
            } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push(ContentPart::Text(text.to_string()));
            }
        }
        out
    }
}

impl ImageModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate_content(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage<'_>>,
    ) -> Result<Vec<ContentPart>> {
        let endpoint = self.endpoint();
        let payload = Self::build_payload(prompt, reference);
        tracing::debug!(
            model = %self.model,
            with_reference = reference.is_some(),
            "calling Gemini generateContent"
        );
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Ok(Self::first_candidate_parts(&response_payload))
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
