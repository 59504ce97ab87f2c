//! Perception service client.
//!
//! A [`PerceptionService`] turns a board screenshot into the rank-listing text consumed by
//! [`kibitz_core::resolve`]. [`AnthropicVision`] is the HTTP implementation.

mod anthropic;
mod clipboard;
mod image;
mod prompt;

pub use anthropic::{AnthropicVision, VisionConfig};
pub use clipboard::clipboard_image;
pub use image::{BoardImage, MediaType};

use kibitz_core::Perspective;

#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("API key not set; export {0}")]
    MissingApiKey(String),

    #[error("unsupported image format (expected PNG, JPEG, GIF or WebP)")]
    UnsupportedImage,

    #[error("no image found in the clipboard; copy a board screenshot first")]
    NoClipboardImage,

    #[error("clipboard unavailable")]
    Clipboard(#[from] arboard::Error),

    #[error("failed to encode image")]
    Encode(#[from] png::EncodingError),

    #[error("failed to read image {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("perception request failed")]
    Http(#[from] reqwest::Error),

    #[error("perception service answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("perception service returned no text")]
    EmptyResponse,
}

pub trait PerceptionService {
    /// Rank listing (`8:rnbqkbnr` ... `1:RNBQKBNR`) of the board shown in `image`.
    fn describe_board(
        &self,
        image: &BoardImage,
        perspective: Perspective,
    ) -> Result<String, PerceptionError>;

    /// Short rationale for playing `san` in the position `fen`.
    fn explain_move(&self, fen: &str, san: &str) -> Result<String, PerceptionError>;
}
