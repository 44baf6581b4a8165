pub(crate) mod auth;
pub(crate) mod upload;

use anyhow::Result;
use std::path::Path;

use crate::config::{AuthConfig, UploadConfig};

/// Authorizes against YouTube and uploads `video`, returning the new video id.
pub async fn publish(video: &Path, auth_settings: &AuthConfig, settings: &UploadConfig) -> Result<String> {
    let token = auth::authorize(&auth_settings.credentials, &auth_settings.token_cache).await?;
    let client = upload::YouTubeClient::new(token.access_token);
    let response = client.upload_video(video, settings).await?;
    Ok(response.id)
}
