//! Image upload handling.
//!
//! Uploaded photographs are kept as base64 data URLs, which is the form
//! stored in history and the form the model payload is extracted from.

use axum::extract::Multipart;
use base64::{engine::general_purpose, Engine as _};
use uuid::Uuid;

use crate::domain::assessment::UploadedImage;
use crate::error::{ApiError, ApiResult};
use crate::services::gemini::Blob;

/// Multipart field carrying image files.
pub const IMAGES_FIELD: &str = "images";

pub const NO_IMAGES_MESSAGE: &str = "画像を1枚以上アップロードしてください。";

/// Encode raw bytes as a data URL.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Base64 payload of a data URL (everything after the first comma).
pub fn data_url_payload(preview: &str) -> Option<&str> {
    preview.split_once(',').map(|(_, data)| data)
}

impl UploadedImage {
    pub fn from_bytes(file_name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            preview: to_data_url(mime_type, bytes),
        }
    }

    /// Inline payload sent to the model.
    pub fn inline_data(&self) -> Option<Blob> {
        data_url_payload(&self.preview).map(|data| Blob {
            mime_type: self.mime_type.clone(),
            data: data.to_string(),
        })
    }
}

/// Read every image from a multipart body.
///
/// Fields other than [`IMAGES_FIELD`] are ignored.
pub async fn read_images(
    mut multipart: Multipart,
    max_images: usize,
) -> ApiResult<Vec<UploadedImage>> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        if !mime_type.starts_with("image/") {
            return Err(ApiError::BadRequest(format!(
                "{} is not an image ({})",
                file_name,
                if mime_type.is_empty() { "unknown type" } else { mime_type.as_str() }
            )));
        }

        if images.len() == max_images {
            return Err(ApiError::BadRequest(format!(
                "画像は最大{}枚までアップロードできます。",
                max_images
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", file_name, e)))?;

        tracing::debug!(file_name = %file_name, mime_type = %mime_type, size = bytes.len(), "Image received");
        images.push(UploadedImage::from_bytes(&file_name, &mime_type, &bytes));
    }

    if images.is_empty() {
        return Err(ApiError::BadRequest(NO_IMAGES_MESSAGE.to_string()));
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip_payload() {
        let image = UploadedImage::from_bytes("house.jpg", "image/jpeg", b"\xFF\xD8\xFF");
        assert_eq!(image.preview, "data:image/jpeg;base64,/9j/");

        let blob = image.inline_data().unwrap();
        assert_eq!(blob.mime_type, "image/jpeg");
        assert_eq!(blob.data, "/9j/");
    }

    #[test]
    fn payload_requires_comma() {
        assert_eq!(data_url_payload("data:image/png;base64,iVBO"), Some("iVBO"));
        assert_eq!(data_url_payload("not a data url"), None);
    }
}
