pub(crate) mod random;

use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
}

impl Message {
    /// The line drawn onto the message image.
    pub fn caption(&self) -> String {
        format!("{}: {}", self.sender, self.text)
    }
}

impl Conversation {
    /// Message texts joined by spaces; sender names are not spoken.
    pub fn spoken_text(&self) -> String {
        self.messages.iter().map(|message| &message.text).join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, text: &str) -> Message {
        Message {
            sender: sender.to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn caption_prefixes_sender() {
        assert_eq!(
            message("Alex", "Sounds like a plan!").caption(),
            "Alex: Sounds like a plan!"
        );
    }

    #[test]
    fn spoken_text_omits_senders() {
        let conversation = Conversation {
            messages: vec![
                message("Alex", "Did you finish the project?"),
                message("Jamie", "Yes, I'll send it over tonight."),
            ],
        };
        assert_eq!(
            conversation.spoken_text(),
            "Did you finish the project? Yes, I'll send it over tonight."
        );
    }
}
