use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

/// Resumable upload chunks must be sized in multiples of this.
pub const UPLOAD_CHUNK_GRANULARITY: u64 = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Private,
    Unlisted,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub conversation: ConversationConfig,
    pub render: RenderConfig,
    pub voiceover: VoiceoverConfig,
    pub video: VideoConfig,
    pub upload: UploadConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub participants: Vec<String>,
    pub messages: Vec<String>,
    pub min_messages: usize,
    pub max_messages: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            participants: ["Alex", "Jamie"].map(String::from).to_vec(),
            messages: [
                "Hey, are we still on for today?",
                "Absolutely! Can't wait to see you.",
                "Don't forget to bring the documents.",
                "Will do. See you at 3 PM.",
                "Should we grab coffee afterwards?",
                "Sounds like a plan!",
                "Let me know if anything changes.",
                "Did you finish the project?",
                "Yes, I'll send it over tonight.",
                "Thanks for your help!",
            ]
            .map(String::from)
            .to_vec(),
            min_messages: 5,
            max_messages: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Font file to draw with instead of the bundled DejaVu Sans.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub background: [u8; 3],
    pub text_color: [u8; 3],
    pub image_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            font_path: None,
            font_size: 40.0,
            background: [255, 255, 255],
            text_color: [0, 0, 0],
            image_dir: PathBuf::from("./image"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceoverConfig {
    pub lang: String,
    pub tld: String,
    pub output: PathBuf,
}

impl Default for VoiceoverConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_owned(),
            tld: "com".to_owned(),
            output: PathBuf::from("./audio/voiceover.mp3"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Seconds each message image stays on screen.
    pub clip_seconds: f64,
    pub fps: u32,
    pub output: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            clip_seconds: 2.3,
            fps: 24,
            output: PathBuf::from("./video/best_message_leaks_video.mp4"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub made_for_kids: bool,
    /// Bytes per request, a multiple of 256 KiB; `None` sends the whole file
    /// at once.
    pub chunk_size: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            title: "Best Message Leaks #Shorts".to_owned(),
            description: "CAT TEST #Shorts".to_owned(),
            tags: ["leaks", "messages", "shorts"].map(String::from).to_vec(),
            // People & Blogs
            category_id: "22".to_owned(),
            privacy_status: PrivacyStatus::Public,
            made_for_kids: false,
            chunk_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub credentials: PathBuf,
    pub token_cache: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: PathBuf::from("credentials.json"),
            token_cache: PathBuf::from("token.json"),
        }
    }
}

/// `MESSAGE_SHORTS_*` environment overrides.
#[derive(Deserialize, Debug, Default)]
pub struct Environment {
    pub font_path: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub token_cache: Option<PathBuf>,
}

impl Environment {
    pub fn from_env() -> Result<Self> {
        envy::prefixed("MESSAGE_SHORTS_")
            .from_env::<Environment>()
            .context("Failed to read MESSAGE_SHORTS_* environment variables")
    }
}

impl Config {
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::parse(
                &tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read config file {}", path.display()))?,
            )?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn parse(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse config TOML")
    }

    pub fn apply(&mut self, environment: Environment) {
        if let Some(font_path) = environment.font_path {
            self.render.font_path = Some(font_path);
        }
        if let Some(credentials) = environment.credentials {
            self.auth.credentials = credentials;
        }
        if let Some(token_cache) = environment.token_cache {
            self.auth.token_cache = token_cache;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let conversation = &self.conversation;
        ensure!(
            !conversation.participants.is_empty(),
            "At least one participant is required"
        );
        ensure!(
            !conversation.messages.is_empty(),
            "At least one canned message is required"
        );
        ensure!(
            conversation.min_messages >= 1
                && conversation.min_messages <= conversation.max_messages,
            "Invalid message count range {}..={}",
            conversation.min_messages,
            conversation.max_messages
        );
        ensure!(
            self.video.clip_seconds > 0.0 && self.video.fps > 0,
            "Clip duration and frame rate must be positive"
        );
        if let Some(chunk_size) = self.upload.chunk_size {
            ensure!(
                chunk_size > 0 && chunk_size % UPLOAD_CHUNK_GRANULARITY == 0,
                "Upload chunk size {chunk_size} is not a positive multiple of {UPLOAD_CHUNK_GRANULARITY} bytes"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_stock_short() {
        let config = Config::default();
        assert_eq!(config.conversation.participants, ["Alex", "Jamie"]);
        assert_eq!(config.conversation.messages.len(), 10);
        assert_eq!(
            (config.conversation.min_messages, config.conversation.max_messages),
            (5, 10)
        );
        assert_eq!((config.render.width, config.render.height), (1080, 1920));
        assert_eq!(config.video.clip_seconds, 2.3);
        assert_eq!(config.upload.privacy_status, PrivacyStatus::Public);
        assert_eq!(config.upload.category_id, "22");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = Config::parse(
            r#"
            [upload]
            title = "Other"
            privacy_status = "unlisted"

            [video]
            fps = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.upload.title, "Other");
        assert_eq!(config.upload.privacy_status, PrivacyStatus::Unlisted);
        assert_eq!(config.upload.description, "CAT TEST #Shorts");
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.video.clip_seconds, 2.3);
    }

    #[test]
    fn example_file_spells_out_defaults() {
        let config = Config::parse(include_str!("../config.example.toml")).unwrap();
        let defaults = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.conversation.participants, defaults.conversation.participants);
        assert_eq!(config.render.font_path, defaults.render.font_path);
        assert_eq!(config.video.output, defaults.video.output);
        assert_eq!(config.upload.tags, defaults.upload.tags);
        assert_eq!(config.upload.chunk_size, None);
    }

    #[test]
    fn rejects_inverted_range() {
        let config = Config::parse(
            r#"
            [conversation]
            min_messages = 8
            max_messages = 3
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn chunk_size_must_be_whole_quarter_mebibytes() {
        let with_chunk = |chunk_size| {
            let mut config = Config::default();
            config.upload.chunk_size = chunk_size;
            config.validate()
        };

        assert!(with_chunk(None).is_ok());
        assert!(with_chunk(Some(8 * 1024 * 1024)).is_ok());
        assert!(with_chunk(Some(256 * 1024)).is_ok());
        assert!(with_chunk(Some(0)).is_err());
        assert!(with_chunk(Some(1_000_000)).is_err());
    }

    #[test]
    fn environment_overrides_paths() {
        let mut config = Config::default();
        config.apply(Environment {
            font_path: Some(PathBuf::from("font.ttf")),
            credentials: None,
            token_cache: Some(PathBuf::from("cache/token.json")),
        });
        assert_eq!(config.render.font_path, Some(PathBuf::from("font.ttf")));
        assert_eq!(config.auth.credentials, PathBuf::from("credentials.json"));
        assert_eq!(config.auth.token_cache, PathBuf::from("cache/token.json"));
    }

    #[test]
    fn privacy_status_round_trips_through_strum() {
        assert_eq!("private".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Private);
        assert_eq!(PrivacyStatus::Unlisted.to_string(), "unlisted");
    }
}
