use teloxide::types::Message;

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;

    /// Splits a command message into the command callname and its parameters.
    ///
    /// For `/Hewwo@Some_Bot everypony bazinga` this returns
    /// `("/Hewwo", Some("Some_Bot"), "everypony bazinga")`.
    /// Returns `None` if the message is not a command.
    fn split_command(&self) -> Option<(&str, Option<&str>, &str)>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }

    fn split_command(&self) -> Option<(&str, Option<&str>, &str)> {
        split_command(self.text_full()?)
    }
}

/// See [`MessageStuff::split_command`].
#[must_use]
pub fn split_command(text: &str) -> Option<(&str, Option<&str>, &str)> {
    if !text.starts_with('/') {
        return None;
    }

    let command = text.split_whitespace().next()?;

    if !command.is_ascii() {
        // Telegram commands must be ASCII.
        // See https://core.telegram.org/bots/api#botcommand
        return None;
    }

    let params = text[command.len()..].trim();

    match command.split_once('@') {
        Some((callname, username)) => Some((callname, Some(username), params)),
        None => Some((command, None, params)),
    }
}
