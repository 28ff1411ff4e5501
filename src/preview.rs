//! Previewable image representations.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::GenericImageView;

use crate::intake::SelectedFile;

/// A selected file turned into something an image view can show directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewImage {
    pub data_url: String,
    /// Pixel dimensions, when the bytes decode as an image.
    pub dimensions: Option<(u32, u32)>,
}

impl PreviewImage {
    /// Builds the preview. Undecodable bytes still produce a data URL.
    pub fn load(file: &SelectedFile) -> Self {
        let dimensions = match image::load_from_memory(file.bytes()) {
            Ok(image) => Some(image.dimensions()),
            Err(err) => {
                log::debug!("preview of {} not decodable: {}", file.name(), err);
                None
            }
        };
        Self {
            data_url: data_url(file.media_type().as_mime(), file.bytes()),
            dimensions,
        }
    }
}

/// Encodes bytes as a base64 `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Splits a base64 `data:` URL into its media type and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("not a data url"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data url missing payload separator"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("only base64 data urls are supported"))?;
    let bytes = BASE64
        .decode(payload.trim())
        .context("decode data url payload")?;
    Ok((mime.to_string(), bytes))
}

/// File extension matching a data URL media type.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{validate, CandidateFile};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn data_url_uses_declared_type() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn preview_reports_dimensions() {
        let file = validate(CandidateFile::new("t.png", "image/png", tiny_png())).unwrap();
        let preview = PreviewImage::load(&file);
        assert!(preview.data_url.starts_with("data:image/png;base64,"));
        assert_eq!(preview.dimensions, Some((3, 2)));
    }

    #[test]
    fn preview_of_garbage_still_has_url() {
        let file = validate(CandidateFile::new("t.jpg", "image/jpeg", vec![1, 2, 3])).unwrap();
        let preview = PreviewImage::load(&file);
        assert_eq!(preview.data_url, "data:image/jpeg;base64,AQID");
        assert_eq!(preview.dimensions, None);
    }

    #[test]
    fn decode_data_url_recovers_bytes() -> Result<()> {
        let (mime, bytes) = decode_data_url("data:image/png;base64,YWJj")?;
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"abc");
        assert!(decode_data_url("http://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,abc").is_err());
        Ok(())
    }
}
