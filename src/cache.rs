use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceoverCacheKey {
    pub speech_hash: String,
}

impl VoiceoverCacheKey {
    pub fn new(lang: &str, tld: &str, text: &str) -> Self {
        Self {
            speech_hash: compute_speech_hash(lang, tld, text),
        }
    }
}

pub struct VoiceoverCache {
    cache_dir: PathBuf,
}

impl VoiceoverCache {
    pub async fn new() -> Result<Self> {
        Self::at(get_cache_directory()?).await
    }

    pub async fn at(cache_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .context("Failed to create cache directory")?;

        Ok(Self { cache_dir })
    }

    pub async fn get(&self, key: &VoiceoverCacheKey) -> Option<Vec<u8>> {
        cacache::read(&self.cache_dir, &key.speech_hash)
            .await
            .ok()
            .filter(|audio| !audio.is_empty())
    }

    pub async fn insert(&self, key: &VoiceoverCacheKey, audio: &[u8]) {
        if let Err(err) = cacache::write(&self.cache_dir, &key.speech_hash, audio).await {
            tracing::warn!("Failed to cache voiceover: {err}");
        }
    }
}

fn get_cache_directory() -> Result<PathBuf> {
    let cache_base = dirs::cache_dir().context("Failed to determine cache directory")?;
    Ok(cache_base.join(env!("CARGO_CRATE_NAME")))
}

fn compute_speech_hash(lang: &str, tld: &str, text: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(lang.as_bytes());
    hasher.update([0]);
    hasher.update(tld.as_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_every_input() {
        let base = VoiceoverCacheKey::new("en", "com", "Sounds like a plan!");
        assert_eq!(base, VoiceoverCacheKey::new("en", "com", "Sounds like a plan!"));
        assert_ne!(base, VoiceoverCacheKey::new("fr", "com", "Sounds like a plan!"));
        assert_ne!(base, VoiceoverCacheKey::new("en", "co.uk", "Sounds like a plan!"));
        assert_ne!(base, VoiceoverCacheKey::new("en", "com", "Sounds like a plan"));
        assert_eq!(base.speech_hash.len(), 64);
    }

    #[tokio::test]
    async fn stores_and_returns_audio() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VoiceoverCache::at(dir.path().join("cache")).await.unwrap();
        let key = VoiceoverCacheKey::new("en", "com", "Thanks for your help!");

        assert_eq!(cache.get(&key).await, None);
        cache.insert(&key, b"ID3 fake mp3").await;
        assert_eq!(cache.get(&key).await.as_deref(), Some(&b"ID3 fake mp3"[..]));
    }
}
