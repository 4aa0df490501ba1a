use teloxide::types::{Message, User, UserId};

/// Looks through the message for a user it's directed at, either by reply or
/// by a link mention. Replies take priority.
///
/// This does not return the sender, nor users mentioned by username like
/// `@Architector_4`, since those can't be resolved to an ID without having
/// seen that user before.
#[must_use]
pub fn mentioned_user(message: &Message) -> Option<&User> {
    if let Some(repliee) = message.reply_to_message().and_then(|m| m.from.as_ref()) {
        return Some(repliee);
    }

    message
        .parse_entities()
        .or_else(|| message.parse_caption_entities())?
        .into_iter()
        .find_map(|ent| {
            use teloxide::types::MessageEntityKind::*;
            match ent.kind() {
                TextMention { user } => Some(user),
                _ => None, // none other contain users
            }
        })
}

/// Parses a word that looks like a user ID.
#[must_use]
pub fn parse_user_id(word: &str) -> Option<UserId> {
    word.trim().parse().ok().map(UserId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids() {
        assert_eq!(parse_user_id("1366743555"), Some(UserId(1366743555)));
        assert_eq!(parse_user_id(" 42 "), Some(UserId(42)));
        assert_eq!(parse_user_id("@someone"), None);
        assert_eq!(parse_user_id("-5"), None);
    }
}
