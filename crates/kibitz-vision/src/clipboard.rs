use arboard::Clipboard;

use crate::{BoardImage, PerceptionError};

/// Board screenshot currently held by the system clipboard.
pub fn clipboard_image() -> Result<BoardImage, PerceptionError> {
    let mut clipboard = Clipboard::new()?;
    let image = match clipboard.get_image() {
        Ok(image) => image,
        Err(arboard::Error::ContentNotAvailable) => return Err(PerceptionError::NoClipboardImage),
        Err(err) => return Err(err.into()),
    };
    log::debug!("clipboard image {}x{}", image.width, image.height);
    let width = u32::try_from(image.width).map_err(|_| PerceptionError::UnsupportedImage)?;
    let height = u32::try_from(image.height).map_err(|_| PerceptionError::UnsupportedImage)?;
    BoardImage::from_rgba(width, height, &image.bytes)
}
