use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};

use crate::config::RenderConfig;
use crate::conversation::Conversation;

const LEFT_MARGIN: i32 = 50;
const TOP_MARGIN: i32 = 100;
const LINE_STEP: i32 = 100;

static BUNDLED_FONT: &[u8] = include_bytes!("../resources/DejaVuSans.ttf");

/// One message image: what to draw, where, and where to save it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub caption: String,
    pub position: (i32, i32),
    pub path: PathBuf,
}

/// Each message gets its own canvas, with the caption pushed down one line
/// per preceding message.
pub fn layout(conversation: &Conversation, image_dir: &Path) -> Vec<Frame> {
    conversation
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| Frame {
            caption: message.caption(),
            position: (LEFT_MARGIN, TOP_MARGIN + index as i32 * LINE_STEP),
            path: image_dir.join(format!("message_{index}.png")),
        })
        .collect()
}

/// Loads the override font when one is configured, the bundled DejaVu Sans
/// otherwise.
pub fn load_font(path: Option<&Path>) -> Result<FontArc> {
    let Some(path) = path else {
        return FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|err| anyhow::anyhow!("Invalid bundled font: {err}"));
    };
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read font file {}", path.display()))?;
    FontArc::try_from_vec(data)
        .map_err(|err| anyhow::anyhow!("Invalid font file {}: {err}", path.display()))
}

pub fn draw(frame: &Frame, font: &FontArc, settings: &RenderConfig) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(settings.width, settings.height, Rgb(settings.background));
    let (x, y) = frame.position;
    draw_text_mut(
        &mut canvas,
        Rgb(settings.text_color),
        x,
        y,
        PxScale::from(settings.font_size),
        font,
        &frame.caption,
    );
    canvas
}

/// Renders every message to a PNG and returns the paths in conversation order.
pub fn render(conversation: &Conversation, settings: &RenderConfig) -> Result<Vec<PathBuf>> {
    let font = load_font(settings.font_path.as_deref())?;

    std::fs::create_dir_all(&settings.image_dir).with_context(|| {
        format!(
            "Failed to create image directory {}",
            settings.image_dir.display()
        )
    })?;

    layout(conversation, &settings.image_dir)
        .into_iter()
        .map(|frame| {
            draw(&frame, &font, settings)
                .save(&frame.path)
                .with_context(|| format!("Failed to write {}", frame.path.display()))?;
            tracing::debug!(path = %frame.path.display(), "rendered message image");
            Ok(frame.path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::random::generate;
    use crate::config::ConversationConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample() -> Conversation {
        generate(&mut StdRng::seed_from_u64(11), &ConversationConfig::default()).unwrap()
    }

    #[test]
    fn layout_has_one_frame_per_message() {
        let conversation = sample();
        let frames = layout(&conversation, Path::new("image"));

        assert_eq!(frames.len(), conversation.messages.len());
        for (index, (frame, message)) in frames.iter().zip(&conversation.messages).enumerate() {
            assert_eq!(frame.caption, message.caption());
            assert_eq!(frame.position, (50, 100 + 100 * index as i32));
            assert_eq!(frame.path, Path::new("image").join(format!("message_{index}.png")));
        }
    }

    #[test]
    fn bundled_font_loads_without_override() {
        assert!(RenderConfig::default().font_path.is_none());
        assert!(load_font(None).is_ok());
    }

    #[test]
    fn missing_font_is_an_error() {
        let settings = RenderConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            ..RenderConfig::default()
        };
        assert!(render(&sample(), &settings).is_err());
    }

    #[test]
    fn renders_one_image_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RenderConfig {
            image_dir: dir.path().join("image"),
            ..RenderConfig::default()
        };
        let conversation = sample();

        let paths = render(&conversation, &settings).unwrap();

        assert_eq!(paths.len(), conversation.messages.len());
        for path in &paths {
            let image = image::open(path).unwrap().to_rgb8();
            assert_eq!(image.dimensions(), (1080, 1920));
            assert_eq!(*image.get_pixel(0, 0), Rgb([255, 255, 255]));
            assert!(image.pixels().any(|pixel| pixel.0[0] < 128));
        }
    }
}
