use anyhow::{Context, Result, bail, ensure};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::UploadConfig;

const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";
const MEDIA_TYPE: &str = "video/*";

#[derive(Debug, Serialize)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "categoryId")]
    pub category_id: String,
}

#[derive(Debug, Serialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: String,
    #[serde(rename = "selfDeclaredMadeForKids")]
    pub self_declared_made_for_kids: bool,
}

#[derive(Debug, Serialize)]
pub struct VideoResource {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

impl VideoResource {
    pub fn from_config(settings: &UploadConfig) -> Self {
        Self {
            snippet: VideoSnippet {
                title: settings.title.clone(),
                description: settings.description.clone(),
                tags: settings.tags.clone(),
                category_id: settings.category_id.clone(),
            },
            status: VideoStatus {
                privacy_status: settings.privacy_status.to_string(),
                self_declared_made_for_kids: settings.made_for_kids,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoUploadResponse {
    pub id: String,
}

#[derive(Debug)]
pub enum ChunkOutcome {
    /// Server holds bytes `0..received`; more are expected.
    Incomplete { received: u64 },
    Complete(VideoUploadResponse),
}

/// Whole percent of `total` held by the server, rounded down.
pub fn progress_percent(received: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    received.saturating_mul(100) / total
}

/// Reads the `Range: bytes=0-N` header of a 308 reply; no header means the
/// server kept nothing.
pub fn received_from_range(range: Option<&str>) -> Result<u64> {
    let Some(range) = range else {
        return Ok(0);
    };
    let last = range
        .trim()
        .strip_prefix("bytes=")
        .and_then(|span| span.split_once('-'))
        .map(|(_, last)| last)
        .with_context(|| format!("Unexpected Range header `{range}`"))?;
    let last: u64 = last
        .parse()
        .with_context(|| format!("Unexpected Range header `{range}`"))?;
    Ok(last + 1)
}

pub struct YouTubeClient {
    client: reqwest::Client,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    /// Opens a resumable session and returns its URL.
    pub async fn initiate_resumable_upload(
        &self,
        resource: &VideoResource,
        file_size: u64,
    ) -> Result<String> {
        let response = self
            .client
            .post(UPLOAD_URL)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Length", file_size.to_string())
            .header("X-Upload-Content-Type", MEDIA_TYPE)
            .json(resource)
            .send()
            .await
            .context("Failed to send request to YouTube API")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("Failed to initiate resumable upload: {error_text}");
        }

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .context("No upload session URL in response")?
            .to_owned();

        tracing::debug!("Resumable upload session: {session_url}");
        Ok(session_url)
    }

    pub async fn upload_chunk(
        &self,
        session_url: &str,
        chunk: Vec<u8>,
        start: u64,
        total: u64,
    ) -> Result<ChunkOutcome> {
        let end = start + chunk.len() as u64 - 1;

        let response = self
            .client
            .put(session_url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_LENGTH, chunk.len().to_string())
            .header(CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
            .header(CONTENT_TYPE, MEDIA_TYPE)
            .body(chunk)
            .send()
            .await
            .context("Failed to send chunk to YouTube API")?;

        let status = response.status();

        if status == StatusCode::PERMANENT_REDIRECT {
            let range = response
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok());
            return Ok(ChunkOutcome::Incomplete {
                received: received_from_range(range)?,
            });
        }

        if status.is_success() {
            let video = response
                .json()
                .await
                .context("Failed to parse upload response")?;
            return Ok(ChunkOutcome::Complete(video));
        }

        let error_text = response.text().await.unwrap_or_default();
        bail!("Failed to upload chunk ({status}): {error_text}");
    }

    /// Sends `path` through a resumable session, printing progress after each
    /// partial chunk.
    pub async fn upload_video(&self, path: &Path, settings: &UploadConfig) -> Result<VideoUploadResponse> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let total = file.metadata().await?.len();
        ensure!(total > 0, "Video file {} is empty", path.display());

        let resource = VideoResource::from_config(settings);
        tracing::info!(title = %resource.snippet.title, bytes = total, "Uploading video…");
        let session_url = self.initiate_resumable_upload(&resource, total).await?;

        let chunk_size = settings.chunk_size.unwrap_or(total);
        let mut offset = 0;
        loop {
            let length = chunk_size.min(total - offset);
            let mut chunk = vec![0; length as usize];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk)
                .await
                .context("Failed to read video chunk")?;

            match self.upload_chunk(&session_url, chunk, offset, total).await? {
                ChunkOutcome::Incomplete { received } => {
                    println!("Uploaded {}%.", progress_percent(received, total));
                    ensure!(
                        received < total,
                        "Server holds the whole file but did not finish the upload"
                    );
                    offset = received;
                }
                ChunkOutcome::Complete(video) => return Ok(video),
            }
        }
    }
}
