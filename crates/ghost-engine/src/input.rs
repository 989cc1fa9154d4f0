use std::io::Cursor;

use ghost_contracts::{AuditError, ImageInput, InputSlot, MediaPart};
use image::ImageFormat;

/// Validates both uploads and packages them for the request builder.
///
/// The document is never parsed; it is wrapped as `application/pdf` and
/// forwarded verbatim.
pub fn assemble(
    image_bytes: Option<&[u8]>,
    document_bytes: Option<&[u8]>,
) -> Result<(ImageInput, MediaPart), AuditError> {
    let image_bytes = non_empty(image_bytes).ok_or(AuditError::MissingInput {
        slot: InputSlot::Image,
    })?;
    let document_bytes = non_empty(document_bytes).ok_or(AuditError::MissingInput {
        slot: InputSlot::Document,
    })?;

    let image = decode_image(image_bytes)?;
    Ok((image, MediaPart::pdf(document_bytes.to_vec())))
}

fn non_empty(bytes: Option<&[u8]>) -> Option<&[u8]> {
    bytes.filter(|bytes| !bytes.is_empty())
}

fn decode_image(bytes: &[u8]) -> Result<ImageInput, AuditError> {
    let format = image::guess_format(bytes).map_err(|err| AuditError::Decode {
        reason: err.to_string(),
    })?;
    let pixels =
        image::load_from_memory_with_format(bytes, format).map_err(|err| AuditError::Decode {
            reason: format!("{format:?}: {err}"),
        })?;

    if is_wire_native(format) {
        return Ok(ImageInput::new(
            pixels,
            format.to_mime_type(),
            bytes.to_vec(),
        ));
    }

    let mut encoded = Cursor::new(Vec::new());
    pixels
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|err| AuditError::Decode {
            reason: format!("re-encoding {format:?} as PNG failed: {err}"),
        })?;
    Ok(ImageInput::new(
        pixels,
        ImageFormat::Png.to_mime_type(),
        encoded.into_inner(),
    ))
}

fn is_wire_native(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP
    )
}
