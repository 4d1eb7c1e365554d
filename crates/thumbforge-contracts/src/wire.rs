//! JSON bodies exchanged between the studio and the proxy server.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const GENERATE_PATH: &str = "/generate";
pub const EDIT_PATH: &str = "/edit";
pub const HEALTH_PATH: &str = "/health";

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub prompt: String,
    pub base64_image: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReply {
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// A request the studio sent (or is about to send) to the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    Generate(GenerateRequest),
    Edit(EditRequest),
}

impl OutboundRequest {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Generate(_) => GENERATE_PATH,
            Self::Edit(_) => EDIT_PATH,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::Generate(request) => &request.prompt,
            Self::Edit(request) => &request.prompt,
        }
    }

    pub fn body(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Generate(request) => serde_json::to_vec(request),
            Self::Edit(request) => serde_json::to_vec(request),
        }
    }
}

pub fn png_data_url(base64_data: &str) -> String {
    format!("{PNG_DATA_URL_PREFIX}{base64_data}")
}

/// Decodes the payload of any base64 `data:` URL.
pub fn decode_data_url(data_url: &str) -> anyhow::Result<Vec<u8>> {
    let Some(rest) = data_url.strip_prefix("data:") else {
        anyhow::bail!("not a data URL");
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        anyhow::bail!("data URL has no payload");
    };
    if !meta.ends_with(";base64") {
        anyhow::bail!("data URL is not base64 encoded");
    }
    Ok(BASE64.decode(payload.trim().as_bytes())?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn edit_request_uses_camel_case_keys() -> anyhow::Result<()> {
        let request = OutboundRequest::Edit(EditRequest {
            prompt: "p".to_string(),
            base64_image: "aGk=".to_string(),
            mime_type: "image/jpeg".to_string(),
        });
        assert_eq!(request.path(), "/edit");
        let body: Value = serde_json::from_slice(&request.body()?)?;
        assert_eq!(
            body,
            json!({"prompt": "p", "base64Image": "aGk=", "mimeType": "image/jpeg"})
        );
        Ok(())
    }

    #[test]
    fn image_reply_body_has_only_data_url() -> anyhow::Result<()> {
        let reply = ImageReply {
            data_url: png_data_url("QUJD"),
        };
        assert_eq!(
            serde_json::to_string(&reply)?,
            r#"{"data_url":"data:image/png;base64,QUJD"}"#
        );
        Ok(())
    }

    #[test]
    fn decode_data_url_accepts_base64_only() -> anyhow::Result<()> {
        assert_eq!(decode_data_url("data:image/png;base64,QUJD")?, b"ABC".to_vec());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("https://example.test/a.png").is_err());
        Ok(())
    }
}
