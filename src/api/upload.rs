//! Post image uploads
//!
//! The post form is submitted as multipart/form-data: text fields fill a
//! `PostForm`, the `image` part carries the file and `image-clear` asks to
//! drop the current one. Accepted images are stored under
//! `<upload.path>/posts_images/` with a random name and served from `/media/`.

use axum::{body::Bytes, extract::Multipart};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::forms::PostForm;
use crate::api::middleware::PageError;
use crate::config::UploadConfig;
use crate::models::ImageChange;

/// Directory under the media root holding post images
pub const POST_IMAGES_DIR: &str = "posts_images";

/// A file received in the `image` part
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Everything a post form submission carries
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub form: PostForm,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

impl PostSubmission {
    /// What the submission asks to do with an existing image.
    ///
    /// `image_path` is where the new upload was stored, if one was sent.
    pub fn image_change(&self, image_path: Option<String>) -> ImageChange {
        match image_path {
            Some(path) => ImageChange::Replace(path),
            None if self.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        }
    }
}

/// Read a multipart post form
pub async fn read_post_submission(mut multipart: Multipart) -> Result<PostSubmission, PageError> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PageError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| PageError::BadRequest(format!("Failed to read file: {}", e)))?;

                // An empty file input still sends a nameless, empty part
                if !filename.is_empty() || !data.is_empty() {
                    submission.image = Some(UploadedImage {
                        filename,
                        content_type,
                        data,
                    });
                }
            }
            "image-clear" => submission.clear_image = true,
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| PageError::BadRequest(format!("Failed to read field: {}", e)))?;
                submission.form.set_field(&name, value);
            }
        }
    }

    Ok(submission)
}

/// Check an upload against the allowed types and size
pub fn check_image(image: &UploadedImage, config: &UploadConfig) -> Result<(), String> {
    if image.data.is_empty() {
        return Err("The submitted file is empty.".to_string());
    }
    if !config.is_type_allowed(&image.content_type) {
        return Err(format!(
            "Upload a valid image. Allowed types: {}.",
            config.allowed_types.join(", ")
        ));
    }
    if image.data.len() as u64 > config.max_file_size {
        return Err(format!(
            "File too large. Maximum size: {} MB.",
            config.max_file_size / 1024 / 1024
        ));
    }
    Ok(())
}

/// Store an accepted image and return its path relative to the media root
pub async fn save_post_image(image: &UploadedImage, config: &UploadConfig) -> anyhow::Result<String> {
    let dir = config.path.join(POST_IMAGES_DIR);
    ensure_upload_dir(&dir).await?;

    // The client's filename never picks the extension: /media serves files
    // with the type implied by it
    let ext = config.get_extension(&image.content_type);
    let new_filename = format!("{}.{}", Uuid::new_v4(), ext);

    fs::write(dir.join(&new_filename), &image.data)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to save file: {}", e))?;

    Ok(format!("{}/{}", POST_IMAGES_DIR, new_filename))
}

/// Ensure upload directory exists
async fn ensure_upload_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload dir: {}", e))?;
    }
    Ok(())
}
