mod audio;
mod cache;
mod config;
mod conversation;
mod preflight;
mod render;
mod video;
mod youtube;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use structopt::StructOpt;

use crate::config::{Config, Environment};

#[derive(StructOpt, Debug)]
#[structopt(
    name = "message-shorts",
    about = "Turn a random text-message conversation into a YouTube Short"
)]
struct Args {
    /// Path to a TOML config file; built-in defaults apply otherwise
    #[structopt(short = "c", long)]
    config: Option<PathBuf>,

    /// Seed for the conversation generator
    #[structopt(long)]
    seed: Option<u64>,

    /// Stop once the video is written
    #[structopt(long)]
    skip_upload: bool,
}

fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,reqwest=warn,hyper=warn"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to initialize logging: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging()?;
    let args = Args::from_args();

    let mut config = Config::load(args.config.as_deref()).await?;
    config.apply(Environment::from_env()?);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let conversation = conversation::random::generate(&mut rng, &config.conversation)?;
    tracing::info!("Generated a conversation of {} messages", conversation.messages.len());

    let images = render::render(&conversation, &config.render).context("Failed to render messages")?;
    tracing::info!("Rendered {} images", images.len());

    let voiceover_cache = cache::VoiceoverCache::new().await?;
    let audio_file = audio::synthesize(&conversation.spoken_text(), &config.voiceover, &voiceover_cache)
        .await
        .context("Failed to synthesize voiceover")?;
    tracing::info!("Voiceover written to {}", audio_file.display());

    let video_file = video::assemble(&images, &audio_file, &config.video)
        .await
        .context("Failed to assemble video")?;
    tracing::info!("Video written to {}", video_file.display());

    if args.skip_upload {
        return Ok(());
    }

    if let Err(missing) = preflight::check(&config.auth.credentials, &video_file) {
        let code = preflight::report(&missing, &mut std::io::stdout())?;
        std::process::exit(code);
    }

    let video_id = youtube::publish(&video_file, &config.auth, &config.upload).await?;
    println!("Video uploaded. Video ID: {video_id}");

    Ok(())
}
