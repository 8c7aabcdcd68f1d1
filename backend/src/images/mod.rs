//! Hosted image storage.

mod cloudinary;

pub use cloudinary::CloudinaryImageHost;

use async_trait::async_trait;

/// An image received from the client, ready to be stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Identifier to store the image under, unique per upload.
    pub public_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image upload failed: {0}")]
    Upload(String),
    #[error("Image host rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Storage that turns uploaded bytes into a publicly reachable URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<String, ImageError>;
}
