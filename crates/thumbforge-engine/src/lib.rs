pub mod client;
pub mod dryrun;
pub mod gemini;
pub mod proxy;
pub mod server;

pub use client::HttpProxyTransport;
pub use dryrun::{DryrunModel, DRYRUN_MODEL};
pub use gemini::{ContentPart, GeminiModel, ImageModel, ReferenceImage, DEFAULT_GEMINI_MODEL};
pub use proxy::{edit_image, generate_image, route, ProxyError, ProxyResponse};
pub use server::ProxyServer;

/// Picks the image model for the server: `dryrun` stays offline, anything
/// else is treated as a Gemini model name.
pub fn image_model_for(name: Option<&str>) -> anyhow::Result<Box<dyn ImageModel>> {
    let requested = name.map(str::trim).filter(|value| !value.is_empty());
    if requested == Some(DRYRUN_MODEL) {
        return Ok(Box::new(DryrunModel));
    }
    Ok(Box::new(GeminiModel::from_env(requested.map(str::to_string))?))
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
