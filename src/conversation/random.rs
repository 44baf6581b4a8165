use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;

use super::{Conversation, Message};
use crate::config::ConversationConfig;

/// Draws a conversation: a uniform length within the configured range, then a
/// sender and a canned message per entry, each chosen independently with
/// replacement.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, script: &ConversationConfig) -> Result<Conversation> {
    let count = rng.gen_range(script.min_messages..=script.max_messages);

    let messages = (0..count)
        .map(|_| {
            let sender = script
                .participants
                .choose(rng)
                .context("No participants to choose from")?;
            let text = script
                .messages
                .choose(rng)
                .context("No canned messages to choose from")?;

            Ok(Message {
                sender: sender.clone(),
                text: text.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Conversation { messages })
}
