use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::gemini::{ContentPart, ImageModel, ReferenceImage};

pub const DRYRUN_MODEL: &str = "dryrun";
const DRYRUN_WIDTH: u32 = 1280;
const DRYRUN_HEIGHT: u32 = 720;

/// Offline stand-in for the image model: a flat 16:9 PNG coloured by the
/// prompt (and reference, when present).
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunModel;

impl ImageModel for DryrunModel {
    fn name(&self) -> &str {
        DRYRUN_MODEL
    }

    fn generate_content(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage<'_>>,
    ) -> Result<Vec<ContentPart>> {
        let (r, g, b) = color_from_prompt(prompt, reference.map(|image| image.base64_data));
        let image = RgbImage::from_pixel(DRYRUN_WIDTH, DRYRUN_HEIGHT, Rgb([r, g, b]));
        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut encoded, ImageFormat::Png)
            .context("failed to encode dryrun PNG")?;
        Ok(vec![
            ContentPart::Text(format!("dryrun render #{r:02x}{g:02x}{b:02x}")),
            ContentPart::InlineData {
                mime_type: "image/png".to_string(),
                data: BASE64.encode(encoded.into_inner()),
            },
        ])
    }
}

fn color_from_prompt(prompt: &str, reference: Option<&str>) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    if let Some(reference) = reference {
        hasher.update(reference.as_bytes());
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
