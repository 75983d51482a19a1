//! Avatar image hosting

use crate::error::AppError;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Allowed MIME types for avatars
pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Max avatar size: 5MB
pub const MAX_AVATAR_SIZE: usize = 5 * 1024 * 1024;

/// An avatar file received from a multipart form
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::Validation("Avatar file is missing".to_string()));
        }

        if !ALLOWED_TYPES.contains(&self.content_type.as_str()) {
            return Err(AppError::Validation(format!(
                "File type '{}' not allowed. Allowed types: {:?}",
                self.content_type, ALLOWED_TYPES
            )));
        }

        if self.bytes.len() > MAX_AVATAR_SIZE {
            return Err(AppError::Validation(format!(
                "File too large. Max size: {}MB",
                MAX_AVATAR_SIZE / 1024 / 1024
            )));
        }

        Ok(())
    }
}

/// Third-party image storage; returns the public URL of the stored image
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: AvatarUpload) -> Result<String, AppError>;
}

/// Cloudinary signed-upload client
pub struct CloudinaryHost {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryHost {
    pub fn new(
        client: reqwest::Client,
        cloud_name: &str,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            client,
            upload_url: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            folder: folder.into(),
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as a
/// query string, with the API secret appended, then hashed.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{:x}", Sha256::digest(format!("{to_sign}{api_secret}")))
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: AvatarUpload) -> Result<String, AppError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let part = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Image upload rejected");
            return Err(AppError::Upstream(format!(
                "image upload failed with status {status}"
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(url = %uploaded.secure_url, "Avatar uploaded");
        Ok(uploaded.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, size: usize) -> AvatarUpload {
        AvatarUpload {
            file_name: "me.png".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn test_avatar_validation() {
        assert!(upload("image/png", 1024).validate().is_ok());
        assert!(upload("application/pdf", 1024).validate().is_err());
        assert!(upload("image/png", 0).validate().is_err());
        assert!(upload("image/jpeg", MAX_AVATAR_SIZE + 1).validate().is_err());
    }

    #[test]
    fn test_signature_ignores_param_order() {
        let a = sign_params(&[("folder", "avatars"), ("timestamp", "1700000000")], "s3cr3t");
        let b = sign_params(&[("timestamp", "1700000000"), ("folder", "avatars")], "s3cr3t");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("folder", "avatars"), ("timestamp", "1700000000")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }
}
