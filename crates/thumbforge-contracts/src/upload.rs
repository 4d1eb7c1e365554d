use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use uuid::Uuid;

/// Tracks live preview handles for uploaded references.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<BTreeSet<String>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> PreviewHandle {
        let url = format!("preview://{}", Uuid::new_v4());
        if let Ok(mut live) = self.live.lock() {
            live.insert(url.clone());
        }
        PreviewHandle {
            url,
            registry: self.clone(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(url))
            .unwrap_or(false)
    }

    fn release(&self, url: &str) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(url);
        }
    }
}

/// Released from its registry on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    url: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(&self.url);
    }
}

/// In-memory reference image. Never persisted.
#[derive(Debug)]
pub struct UploadedReference {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    preview: PreviewHandle,
}

impl UploadedReference {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        previews: &PreviewRegistry,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            preview: previews.create(),
        }
    }

    pub fn from_path(path: &Path, previews: &PreviewRegistry) -> anyhow::Result<Self> {
        let Some(mime_type) = mime_for_path(path) else {
            anyhow::bail!("{} is not a supported image type", path.display());
        };
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference".to_string());
        Ok(Self::new(file_name, mime_type, bytes, previews))
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn dropping_handles_releases_previews() {
        let registry = PreviewRegistry::new();
        let first = registry.create();
        let second = registry.create();
        assert_eq!(registry.live_count(), 2);
        assert!(registry.is_live(first.url()));

        let first_url = first.url().to_string();
        drop(first);
        assert!(!registry.is_live(&first_url));
        assert_eq!(registry.live_count(), 1);

        drop(second);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn from_path_reads_bytes_and_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("Face.JPG");
        std::fs::write(&path, b"jpeg-bytes")?;

        let registry = PreviewRegistry::new();
        let upload = UploadedReference::from_path(&path, &registry)?;
        assert_eq!(upload.file_name, "Face.JPG");
        assert_eq!(upload.mime_type, "image/jpeg");
        assert_eq!(upload.to_base64(), "anBlZy1ieXRlcw==");
        assert!(registry.is_live(upload.preview_url()));
        Ok(())
    }

    #[test]
    fn from_path_rejects_unknown_types_without_leaking() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"hello")?;

        let registry = PreviewRegistry::new();
        assert!(UploadedReference::from_path(&path, &registry).is_err());
        assert!(UploadedReference::from_path(&temp.path().join("missing.png"), &registry).is_err());
        assert_eq!(registry.live_count(), 0);
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let registry = PreviewRegistry::new();
        let message = UploadedReference::from_path(Path::new("/nonexistent/clip.mov"), &registry)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(message.contains("is not a supported image type"));
        assert!(!message.contains("failed reading"));
    }

    #[test]
    fn mime_lookup_is_case_insensitive() {
        assert_eq!(mime_for_path(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("a")), None);
    }
}
