use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::cache::{VoiceoverCache, VoiceoverCacheKey};
use crate::config::VoiceoverConfig;

/// Longest text the speech endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Splits `text` into pieces of at most `max` characters, breaking between
/// words. A single word longer than `max` is cut into `max`-sized pieces.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(max)
                .map_or(word.len(), |(index, _)| index);
            chunks.push(word[..split].to_owned());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn endpoint(tld: &str) -> String {
    format!("https://translate.google.{tld}/translate_tts")
}

async fn fetch_chunk(
    client: &reqwest::Client,
    settings: &VoiceoverConfig,
    chunk: &str,
    index: usize,
    total: usize,
    audio: &mut Vec<u8>,
) -> Result<()> {
    let total = total.to_string();
    let index = index.to_string();
    let textlen = chunk.chars().count().to_string();

    let response = client
        .get(endpoint(&settings.tld))
        .query(&[
            ("ie", "UTF-8"),
            ("client", "tw-ob"),
            ("tl", settings.lang.as_str()),
            ("q", chunk),
            ("total", total.as_str()),
            ("idx", index.as_str()),
            ("textlen", textlen.as_str()),
        ])
        .send()
        .await
        .context("Failed to send request to speech endpoint")?
        .error_for_status()
        .context("Speech endpoint error")?;

    let mut stream = response.bytes_stream();

    while let Some(bytes) = stream.next().await {
        let bytes = bytes.context("Failed to read chunk from response")?;
        audio.extend_from_slice(&bytes);
    }

    Ok(())
}

/// Speaks `text` into an MP3 at the configured output path, reusing a cached
/// rendition of the same text when one exists.
pub async fn synthesize(
    text: &str,
    settings: &VoiceoverConfig,
    cache: &VoiceoverCache,
) -> Result<PathBuf> {
    let key = VoiceoverCacheKey::new(&settings.lang, &settings.tld, text);

    let audio = if let Some(cached) = cache.get(&key).await {
        tracing::info!("Using cached voiceover");
        cached
    } else {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        anyhow::ensure!(!chunks.is_empty(), "Nothing to speak");

        let client = reqwest::Client::new();
        let mut audio = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            tracing::info!("Synthesizing speech {}/{}…", index + 1, chunks.len());
            fetch_chunk(&client, settings, chunk, index, chunks.len(), &mut audio).await?;
        }

        cache.insert(&key, &audio).await;
        audio
    };

    write_audio(&settings.output, &audio).await?;
    Ok(settings.output.clone())
}

async fn write_audio(path: &Path, audio: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create audio directory")?;
    }

    let mut file = File::create(path)
        .await
        .context("Failed to create output file")?;

    file.write_all(audio)
        .await
        .context("Failed to write audio to file")?;

    file.flush().await.context("Failed to flush file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(
            chunk_text("Sounds like a plan!", MAX_CHUNK_CHARS),
            ["Sounds like a plan!"]
        );
    }

    #[test]
    fn chunks_break_between_words() {
        let text = "Hey, are we still on for today? Absolutely! Can't wait to see you. \
                    Don't forget to bring the documents. Will do. See you at 3 PM.";
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn overlong_word_is_cut() {
        let chunks = chunk_text("ab abcdefgh cd", 4);
        assert_eq!(chunks, ["ab", "abcd", "efgh", "cd"]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("   ", MAX_CHUNK_CHARS).is_empty());
    }

    #[tokio::test]
    async fn cached_audio_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VoiceoverCache::at(dir.path().join("cache")).await.unwrap();
        let settings = VoiceoverConfig {
            // unroutable, so a network attempt would fail the test
            tld: "invalid".to_owned(),
            output: dir.path().join("audio").join("voiceover.mp3"),
            ..VoiceoverConfig::default()
        };
        let text = "Thanks for your help!";
        cache
            .insert(&VoiceoverCacheKey::new(&settings.lang, &settings.tld, text), b"mp3")
            .await;

        let path = synthesize(text, &settings, &cache).await.unwrap();

        assert_eq!(path, settings.output);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"mp3");
    }
}
