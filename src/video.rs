use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::VideoConfig;

/// Output height; images are scaled to it with their aspect ratio kept.
pub const SHORTS_HEIGHT: u32 = 1920;

fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Builds an ffmpeg concat-demuxer script showing each image for
/// `clip_seconds`. The last image is listed twice because the demuxer drops
/// the duration of the final entry otherwise.
pub fn concat_script(frames: &[PathBuf], clip_seconds: f64) -> String {
    let mut script = String::from("ffconcat version 1.0\n");
    for frame in frames {
        script.push_str(&format!("file {}\nduration {clip_seconds}\n", quote(frame)));
    }
    if let Some(last) = frames.last() {
        script.push_str(&format!("file {}\n", quote(last)));
    }
    script
}

/// Every clip lasts the same `clip_seconds`; clip position does not stretch it.
pub fn total_seconds(clip_count: usize, clip_seconds: f64) -> f64 {
    clip_count as f64 * clip_seconds
}

pub fn ffmpeg_args(
    concat_list: &Path,
    audio: &Path,
    output: &Path,
    duration: f64,
    fps: u32,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
    args.push(concat_list.into());
    args.push("-i".into());
    args.push(audio.into());
    args.extend(
        [
            "-map".to_owned(),
            "0:v:0".to_owned(),
            "-map".to_owned(),
            "1:a:0".to_owned(),
            "-t".to_owned(),
            format!("{duration:.3}"),
            "-vf".to_owned(),
            format!("scale=-2:{SHORTS_HEIGHT},fps={fps},format=yuv420p"),
            "-r".to_owned(),
            fps.to_string(),
            "-c:v".to_owned(),
            "libx264".to_owned(),
            "-c:a".to_owned(),
            "aac".to_owned(),
        ]
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Concatenates the message images into a video carrying the voiceover,
/// trimmed to the length of the image sequence.
pub async fn assemble(frames: &[PathBuf], audio: &Path, settings: &VideoConfig) -> Result<PathBuf> {
    anyhow::ensure!(!frames.is_empty(), "No images to assemble");

    let mut absolute = Vec::with_capacity(frames.len());
    for frame in frames {
        absolute.push(
            tokio::fs::canonicalize(frame)
                .await
                .with_context(|| format!("Missing image {}", frame.display()))?,
        );
    }

    if let Some(parent) = settings.output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create video directory")?;
    }

    let concat_list = settings.output.with_extension("ffconcat");
    tokio::fs::write(&concat_list, concat_script(&absolute, settings.clip_seconds))
        .await
        .context("Failed to write concat list")?;

    let duration = total_seconds(frames.len(), settings.clip_seconds);
    tracing::info!(
        clips = frames.len(),
        duration,
        output = %settings.output.display(),
        "Encoding video…"
    );

    let result = Command::new("ffmpeg")
        .args(ffmpeg_args(&concat_list, audio, &settings.output, duration, settings.fps))
        .output()
        .await
        .context("Failed to run ffmpeg; is it installed?")?;

    if let Err(err) = tokio::fs::remove_file(&concat_list).await {
        tracing::debug!("Failed to remove {}: {err}", concat_list.display());
    }

    if !result.status.success() {
        bail!(
            "ffmpeg exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        );
    }

    Ok(settings.output.clone())
}
