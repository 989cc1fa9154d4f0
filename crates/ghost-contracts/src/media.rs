use std::fmt;

use image::DynamicImage;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Opaque binary payload tagged with its media type. Forwarded verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl MediaPart {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self::new(PDF_MEDIA_TYPE, bytes)
    }
}

impl fmt::Debug for MediaPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPart")
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Decoded component photograph.
///
/// `pixels` is the decoded bitmap; `encoded` is what goes on the wire and
/// always matches `mime_type`.
#[derive(Clone)]
pub struct ImageInput {
    pub width: u32,
    pub height: u32,
    pub pixels: DynamicImage,
    pub mime_type: String,
    pub encoded: Vec<u8>,
}

impl ImageInput {
    pub fn new(pixels: DynamicImage, mime_type: impl Into<String>, encoded: Vec<u8>) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
            mime_type: mime_type.into(),
            encoded,
        }
    }
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInput")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mime_type", &self.mime_type)
            .field("encoded", &format_args!("<{} bytes>", self.encoded.len()))
            .finish()
    }
}
