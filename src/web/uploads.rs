//! Image uploads shared by forum attachments and profile avatars.

use std::path::Path;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit for upload routes: the image plus multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

const KNOWN_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Forum,
    Profile,
}

impl UploadKind {
    const fn dir_name(self) -> &'static str {
        match self {
            Self::Forum => "forum",
            Self::Profile => "profile",
        }
    }
}

/// One file part pulled out of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Read the part named `field` from a multipart body.
pub async fn read_file_field(multipart: &mut Multipart, field: &str) -> ApiResult<UploadedFile> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }

        let file_name = part.file_name().map(String::from);
        let content_type = part.content_type().map(String::from).or_else(|| {
            file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        });
        let bytes = part.bytes().await?;

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::bad_request("No file selected"))
}

/// Extension for the stored file: the original one if it is a known image
/// extension, otherwise derived from the content type.
#[must_use]
pub fn resolve_extension(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()));

    if let Some(ext) = from_name {
        return format!(".{ext}");
    }

    match content_type.to_lowercase().as_str() {
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        _ => ".jpg",
    }
    .to_string()
}

fn random_file_stem() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Validate an uploaded image and write it under `{uploads_dir}/{kind}/`.
/// Returns the public URL of the stored file.
pub async fn store_image(
    uploads_dir: &Path,
    kind: UploadKind,
    file: &UploadedFile,
) -> ApiResult<String> {
    if file.bytes.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::PayloadTooLarge(
            "File is too large (max 5 MB)".to_string(),
        ));
    }

    let content_type = file
        .content_type
        .as_deref()
        .map(str::to_lowercase)
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| ApiError::bad_request("Only images are allowed"))?;

    let name = format!(
        "{}{}",
        random_file_stem(),
        resolve_extension(file.file_name.as_deref(), &content_type)
    );

    let dir = uploads_dir.join(kind.dir_name());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create upload directory: {}", dir.display()))?;
    tokio::fs::write(dir.join(&name), &file.bytes)
        .await
        .context("Failed to save upload")?;

    let url = format!("/uploads/{}/{name}", kind.dir_name());
    info!(url = %url, bytes = file.bytes.len(), "Image stored");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>, content_type: Option<&str>, bytes: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.map(String::from),
            content_type: content_type.map(String::from),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn test_resolve_extension() {
        assert_eq!(resolve_extension(Some("Cat.PNG"), "image/png"), ".png");
        assert_eq!(resolve_extension(Some("photo.jpeg"), "image/jpeg"), ".jpeg");
        assert_eq!(resolve_extension(Some("archive.tar"), "image/gif"), ".gif");
        assert_eq!(resolve_extension(Some("noext"), "image/webp"), ".webp");
        assert_eq!(resolve_extension(None, "image/x-icon"), ".jpg");
    }

    #[test]
    fn test_random_file_stem() {
        let stem = random_file_stem();
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_store_image_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = upload(Some("shot.png"), Some("image/png"), b"\x89PNG fake");

        let url = store_image(dir.path(), UploadKind::Forum, &file).await.unwrap();
        assert!(url.starts_with("/uploads/forum/"));
        assert!(url.ends_with(".png"));

        let stored = dir.path().join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(stored).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_store_image_rejects_non_images() {
        let dir = tempfile::TempDir::new().unwrap();

        let text = upload(Some("notes.txt"), Some("text/plain"), b"hello");
        assert!(matches!(
            store_image(dir.path(), UploadKind::Profile, &text).await,
            Err(ApiError::BadRequest(_))
        ));

        let empty = upload(Some("empty.png"), Some("image/png"), b"");
        assert!(matches!(
            store_image(dir.path(), UploadKind::Profile, &empty).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
