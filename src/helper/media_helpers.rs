use actix_multipart::Multipart;
use actix_web::web;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::require_capability;
use crate::models::{Capability, Identity};

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Only these image types are accepted, each mapped to a fixed extension.
fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
    ]
    .iter()
    .cloned()
    .collect();

    map.get(mime_type).cloned()
}

/// Where a new featured image lands on disk and the URL it is served under.
fn featured_image_target(media_root: &Path, extension: &str) -> (PathBuf, String) {
    let file_name = format!("post-{}.{}", Uuid::new_v4(), extension);
    let path = media_root.join("posts").join(&file_name);
    (path, format!("/media/posts/{}", file_name))
}

/// Writes an upload chunk by chunk, removing the partial file once the size
/// limit is crossed.
struct UploadSink {
    path: PathBuf,
    file: fs::File,
    written: u64,
    limit: u64,
}

impl UploadSink {
    fn create(path: PathBuf, limit: u64) -> CmsResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&path)?;
        Ok(UploadSink {
            path,
            file,
            written: 0,
            limit,
        })
    }

    fn write_chunk(&mut self, data: &[u8]) -> CmsResult<()> {
        self.written += data.len() as u64;
        if self.written > self.limit {
            self.discard();
            return Err(CmsError::Validation(format!(
                "Image is too large. Maximum size is {}MB.",
                self.limit / (1024 * 1024)
            )));
        }
        if let Err(e) = self.file.write_all(data) {
            self.discard();
            return Err(e.into());
        }
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Could not remove partial upload {}: {}", self.path.display(), e);
        }
    }
}

/// Stores the first file field of `payload` as a post featured image and
/// returns its public URL.
pub async fn save_featured_image(actor: &Identity, media_root: &Path, mut payload: Multipart) -> CmsResult<String> {
    require_capability(actor, Capability::ManageContent)?;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| CmsError::Validation(format!("Malformed upload: {}", e)))?;
        if field.content_disposition().get_filename().is_none() {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        let extension = mime_to_safe_extension(&content_type).ok_or_else(|| {
            CmsError::Validation(format!(
                "Unsupported file type: '{}'. Upload a JPEG, PNG, GIF or WebP image.",
                content_type
            ))
        })?;

        let (path, url) = featured_image_target(media_root, extension);
        let mut sink = web::block({
            let path = path.clone();
            move || UploadSink::create(path, MAX_IMAGE_BYTES)
        })
        .await
        .map_err(|e| CmsError::Storage(e.to_string()))??;

        while let Some(chunk) = field.next().await {
            let data = match chunk {
                Ok(data) => data,
                Err(e) => {
                    sink.discard();
                    return Err(CmsError::Validation(format!("Upload interrupted: {}", e)));
                }
            };
            sink = web::block(move || sink.write_chunk(&data).map(|_| sink))
                .await
                .map_err(|e| CmsError::Storage(e.to_string()))??;
        }

        log::info!("{} uploaded featured image {} ({} bytes)", actor.email, url, sink.written);
        return Ok(url);
    }

    Err(CmsError::Validation("No file was uploaded.".to_string()))
}
