use std::fmt;
use std::path::Path;

use crate::PerceptionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl MediaType {
    /// Detects the format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, ..] => Some(MediaType::Png),
            [0xff, 0xd8, 0xff, ..] => Some(MediaType::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(MediaType::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Some(MediaType::WebP)
            }
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::WebP => "image/webp",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded board screenshot. The bytes are forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardImage {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl BoardImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PerceptionError> {
        let media_type = MediaType::sniff(&bytes).ok_or(PerceptionError::UnsupportedImage)?;
        Ok(Self { bytes, media_type })
    }

    /// Encodes raw 8-bit RGBA pixels as PNG.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, PerceptionError> {
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba)?;
        writer.finish()?;
        Ok(Self {
            bytes,
            media_type: MediaType::Png,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PerceptionError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| PerceptionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }
}
