use std::{future::Future, pin::Pin};

use bot_commons::{mentioned_user, parse_user_id};
use html_escape::encode_text;
use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::RequestReplyExt,
    types::{BotCommand, Message, ParseMode, User},
    Bot, RequestError,
};

use super::{refresh_approval_post, refresh_blacklist_post, report_storage_failure, App};
use crate::{
    render,
    types::{
        BlacklistSnapshot, FirstActivities, NewBlacklistEntry, NewRecruit, OriginRefs,
        Transition,
    },
};

pub const COMMANDS: &[Command] = &[
    START,
    HELP,
    APPLY,
    RANKING,
    ____SEPARATOR,
    BLACKLIST,
    UNBLACKLIST,
    CHECK,
    APPROVE,
    REJECT,
    RANKING_ADD,
    RANKING_REMOVE,
];

pub type Ret = Result<(), RequestError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

pub struct CommandParams<'a> {
    pub app: &'a App,
    pub bot: &'a Bot,
    pub message: &'a Message,
    pub sender: &'a User,
    /// Everything after the command itself, trimmed.
    pub params: &'a str,
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub function: fn(CommandParams) -> CommandFuture,
    /// Only admins of the control chat may run this.
    pub manager_only: bool,
    hidden: bool,
}

impl Command {
    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.callname
            .split_ascii_whitespace()
            .next()
            .is_some_and(|x| x.eq_ignore_ascii_case(command))
    }

    pub fn find(callname: &str) -> Option<&'static Command> {
        COMMANDS
            .iter()
            .find(|command| !command.callname.is_empty() && command.is_matching_callname(callname))
    }

    pub fn get_help(&self, mut output: impl std::fmt::Write) -> Result<(), std::fmt::Error> {
        // useful for the separator "command"
        if self.callname.is_empty() && self.description.is_empty() {
            return output.write_str("<b>Managers only:</b>");
        }

        output.write_str(self.callname)?;
        if !self.description.is_empty() {
            output.write_str(" - ")?;
            output.write_str(self.description)?;
        }

        Ok(())
    }

    pub fn generate_help() -> String {
        let mut response = String::from("HELP:\n\n");
        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            let _ = command.get_help(&mut response);
            response += "\n\n";
        }
        response.pop();
        response.pop();
        response
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        let mut output = Vec::new();

        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            let Some(callname) = command.callname.split_ascii_whitespace().next() else {
                continue;
            };

            // Cut off the /
            let callname = callname[1..].trim().to_string();
            let description = command
                .description
                .replace("&lt;", "<")
                .replace("&gt;", ">");

            output.push(BotCommand {
                command: callname,
                description,
            });
        }

        output
    }
}

/// Splits `a | b | c` into trimmed parts.
fn split_fields(params: &str) -> Vec<&str> {
    params.split('|').map(str::trim).collect()
}

/// Empty text means no answer.
fn answer(text: Option<&&str>) -> Option<String> {
    text.filter(|text| !text.is_empty()).map(|text| text.to_string())
}

/// `<id> rest of the text`, with the rest trimmed.
fn split_id(params: &str) -> Option<(&str, &str)> {
    let mut parts = params.splitn(2, char::is_whitespace);
    let id = parts.next().filter(|id| !id.is_empty())?;
    Some((id, parts.next().unwrap_or_default().trim()))
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |cp| Box::pin($thing(cp))
    };
}

macro_rules! respond {
    ($cp:expr, $text:expr) => {{
        $cp.bot
            .send_message($cp.message.chat.id, $text)
            .reply_to($cp.message.id)
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    }};
}

/// Unwraps a storage result, or reports the failure and returns.
macro_rules! stored {
    ($cp:expr, $result:expr) => {
        match $result {
            Ok(x) => x,
            Err(e) => return report_storage_failure($cp.bot, $cp.message, &e).await,
        }
    };
}

pub const START: Command = Command {
    callname: "/start",
    description: "",
    function: wrap!(help),
    manager_only: false,
    hidden: true,
};

pub const HELP: Command = Command {
    callname: "/help",
    description: "Show this help.",
    function: wrap!(help),
    manager_only: false,
    hidden: false,
};
async fn help(cp: CommandParams<'_>) -> Ret {
    respond!(cp, Command::generate_help());
}

pub const ____SEPARATOR: Command = Command {
    callname: "",
    description: "",
    function: wrap!(do_nothing),
    manager_only: false,
    hidden: false,
};
async fn do_nothing(_: CommandParams<'_>) -> Ret {
    Ok(())
}

pub const APPLY: Command = Command {
    callname: "/apply &lt;full name&gt; | &lt;phone&gt; | &lt;passport&gt;",
    description: "Ask to join. Send it as a reply to a message of the member who recruited you.",
    function: wrap!(apply),
    manager_only: false,
    hidden: false,
};
async fn apply(cp: CommandParams<'_>) -> Ret {
    let fields = split_fields(cp.params);
    let [name, phone, passport] = fields[..] else {
        respond!(cp, "Usage: <code>/apply full name | phone | passport</code>, as a reply to your recruiter.");
    };
    if name.is_empty() || phone.is_empty() || passport.is_empty() {
        respond!(cp, "Full name, phone and passport are all required.");
    }

    let Some(recruiter) = mentioned_user(cp.message) else {
        respond!(cp, "Send this as a reply to a message of the member who recruited you.");
    };
    if recruiter.id == cp.sender.id || recruiter.is_bot {
        respond!(cp, "That can't be your recruiter.");
    }

    let active = stored!(cp, cp.app.ledger.get_active_by_passport(passport).await);
    if let Some(entry) = &active {
        log::warn!(
            "Candidate {} applied with blacklisted passport {:?} (entry {})",
            cp.sender.id,
            passport,
            entry.id
        );
    }

    let new = NewRecruit {
        id: None,
        recruiter_id: recruiter.id.to_string(),
        candidate_id: cp.sender.id.to_string(),
        candidate_name: name.to_string(),
        phone: phone.to_string(),
        passport: passport.trim().to_string(),
        approval_channel_id: None,
        approval_message_id: None,
    };
    let snapshot = BlacklistSnapshot::from_entry(active.as_ref());

    // The post comes first, so a request is never stored without one.
    let draft = cp.app.pipeline.draft(new.clone(), snapshot.clone());
    let post = cp
        .bot
        .send_message(cp.app.config.approval_chat, render::recruit_post(&draft))
        .parse_mode(ParseMode::Html)
        .reply_markup(render::recruit_keyboard(&draft))
        .await;
    let post = match post {
        Ok(post) => post,
        Err(e) => {
            log::error!("Could not post recruit request {} for approval: {e}", draft.id);
            respond!(cp, "Could not reach the managers right now. Please try again later.");
        }
    };

    let result = cp
        .app
        .pipeline
        .create(
            NewRecruit {
                id: Some(draft.id),
                approval_channel_id: Some(post.chat.id.0.to_string()),
                approval_message_id: Some(post.id.0.to_string()),
                ..new
            },
            snapshot,
        )
        .await;

    let request = match result {
        Ok(request) => request,
        Err(e) => {
            let _ = cp.bot.delete_message(post.chat.id, post.id).await;
            return report_storage_failure(cp.bot, cp.message, &e).await;
        }
    };

    respond!(
        cp,
        format!(
            "Your request <code>{}</code> was sent to the managers for approval.",
            encode_text(&request.id)
        )
    );
}

pub const RANKING: Command = Command {
    callname: "/ranking",
    description: "Show the recruiters with the most approved recruits.",
    function: wrap!(ranking),
    manager_only: false,
    hidden: false,
};
async fn ranking(cp: CommandParams<'_>) -> Ret {
    let top = stored!(
        cp,
        cp.app
            .ranking
            .top_recruiters(cp.app.config.ranking_limit)
            .await
    );
    respond!(cp, render::ranking(&top));
}

pub const BLACKLIST: Command = Command {
    callname: "/blacklist &lt;passport&gt; | &lt;name&gt; | &lt;reason&gt;",
    description: "Add someone to the blacklist.",
    function: wrap!(blacklist),
    manager_only: true,
    hidden: false,
};
async fn blacklist(cp: CommandParams<'_>) -> Ret {
    let fields = split_fields(cp.params);
    let [passport, name, reason] = fields[..] else {
        respond!(cp, "Usage: <code>/blacklist passport | name | reason</code>");
    };
    if passport.is_empty() || name.is_empty() || reason.is_empty() {
        respond!(cp, "Passport, name and reason are all required.");
    }

    // The post comes first, so the entry can point at it.
    let post = cp
        .bot
        .send_message(cp.app.config.blacklist_chat, "Adding a blacklist entry...")
        .await?;

    let chat = post.chat.id.0.to_string();
    let result = cp
        .app
        .ledger
        .add_entry(NewBlacklistEntry {
            passport_id: passport.to_string(),
            display_name: name.to_string(),
            reason: reason.to_string(),
            author_id: cp.sender.id.to_string(),
            origin: OriginRefs {
                guild_id: chat.clone(),
                channel_id: chat,
                message_id: post.id.0.to_string(),
            },
        })
        .await;

    let entry = match result {
        Ok(entry) => entry,
        Err(e) => {
            let _ = cp.bot.delete_message(post.chat.id, post.id).await;
            return report_storage_failure(cp.bot, cp.message, &e).await;
        }
    };

    refresh_blacklist_post(cp.bot, &entry).await?;

    respond!(
        cp,
        format!(
            "Blacklist entry <code>{}</code> added for passport <code>{}</code>.",
            encode_text(&entry.id),
            encode_text(&entry.passport_id)
        )
    );
}

pub const UNBLACKLIST: Command = Command {
    callname: "/unblacklist &lt;entry id&gt; &lt;reason&gt;",
    description: "Remove a blacklist entry.",
    function: wrap!(unblacklist),
    manager_only: true,
    hidden: false,
};
async fn unblacklist(cp: CommandParams<'_>) -> Ret {
    let Some((id, reason)) = split_id(cp.params).filter(|(_, reason)| !reason.is_empty()) else {
        respond!(cp, "Usage: <code>/unblacklist entry_id reason</code>");
    };

    let removed_by = cp.sender.id.to_string();
    match stored!(cp, cp.app.ledger.mark_removed(id, &removed_by, reason).await) {
        Transition::Applied(entry) => {
            refresh_blacklist_post(cp.bot, &entry).await?;
            respond!(
                cp,
                format!(
                    "Entry for passport <code>{}</code> removed.",
                    encode_text(&entry.passport_id)
                )
            );
        }
        Transition::InvalidTransition(entry) => respond!(
            cp,
            format!(
                "That entry was already removed by {}.",
                entry
                    .removed_by
                    .as_deref()
                    .map_or_else(|| String::from("someone"), render::user_link)
            )
        ),
        Transition::NotFound => respond!(cp, "There is no blacklist entry with that ID."),
    }
}

pub const CHECK: Command = Command {
    callname: "/check &lt;passport&gt;",
    description: "Look up a passport in the blacklist.",
    function: wrap!(check),
    manager_only: true,
    hidden: false,
};
async fn check(cp: CommandParams<'_>) -> Ret {
    if cp.params.is_empty() {
        respond!(cp, "Usage: <code>/check passport</code>");
    }

    match stored!(cp, cp.app.ledger.get_active_by_passport(cp.params).await) {
        Some(entry) => respond!(cp, render::blacklist_post(&entry)),
        None => respond!(
            cp,
            format!(
                "Passport <code>{}</code> is not blacklisted.",
                encode_text(cp.params)
            )
        ),
    }
}

pub const APPROVE: Command = Command {
    callname: "/approve &lt;request id&gt; [race | farm | dismantle]",
    description: "Approve a recruit, optionally with answers about their first activities.",
    function: wrap!(approve),
    manager_only: true,
    hidden: false,
};
async fn approve(cp: CommandParams<'_>) -> Ret {
    let Some((id, rest)) = split_id(cp.params) else {
        respond!(cp, "Usage: <code>/approve request_id [race | farm | dismantle]</code>");
    };

    let answers = if rest.is_empty() {
        Vec::new()
    } else {
        split_fields(rest)
    };
    if answers.len() > 3 {
        respond!(cp, "At most three answers: race, farm and dismantle.");
    }
    let first = FirstActivities {
        race: answer(answers.first()),
        farm: answer(answers.get(1)),
        dismantle: answer(answers.get(2)),
    };

    let approved_by = cp.sender.id.to_string();
    let result = stored!(cp, cp.app.pipeline.approve(id, &approved_by, first).await);
    respond_to_transition(cp, result, "Approved.").await
}

pub const REJECT: Command = Command {
    callname: "/reject &lt;request id&gt; [reason]",
    description: "Reject a recruit.",
    function: wrap!(reject),
    manager_only: true,
    hidden: false,
};
async fn reject(cp: CommandParams<'_>) -> Ret {
    let Some((id, reason)) = split_id(cp.params) else {
        respond!(cp, "Usage: <code>/reject request_id [reason]</code>");
    };

    let rejected_by = cp.sender.id.to_string();
    let result = stored!(
        cp,
        cp.app
            .pipeline
            .reject(id, &rejected_by, Some(reason))
            .await
    );
    respond_to_transition(cp, result, "Rejected.").await
}

async fn respond_to_transition(
    cp: CommandParams<'_>,
    result: Transition<crate::types::RecruitRequest>,
    done: &str,
) -> Ret {
    match result {
        Transition::Applied(request) => {
            refresh_approval_post(cp.bot, &request).await?;
            respond!(cp, done.to_string());
        }
        Transition::InvalidTransition(request) => {
            refresh_approval_post(cp.bot, &request).await?;
            respond!(cp, format!("That request is already {}.", request.status));
        }
        Transition::NotFound => respond!(cp, "There is no recruit request with that ID."),
    }
}

pub const RANKING_ADD: Command = Command {
    callname: "/ranking_add &lt;amount&gt;",
    description: "Give a recruiter points. Reply to them, or put their user ID before the amount.",
    function: wrap!(ranking_add),
    manager_only: true,
    hidden: false,
};
fn ranking_add(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    adjust_ranking(cp, 1)
}

pub const RANKING_REMOVE: Command = Command {
    callname: "/ranking_remove &lt;amount&gt;",
    description: "Take points from a recruiter. Reply to them, or put their user ID before the amount.",
    function: wrap!(ranking_remove),
    manager_only: true,
    hidden: false,
};
fn ranking_remove(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    adjust_ranking(cp, -1)
}

async fn adjust_ranking(cp: CommandParams<'_>, sign: i64) -> Ret {
    let words: Vec<&str> = cp.params.split_whitespace().collect();
    let (recruiter, amount) = match words[..] {
        [amount] => (mentioned_user(cp.message).map(|user| user.id), amount),
        [user, amount] => (parse_user_id(user), amount),
        _ => (None, ""),
    };

    let (Some(recruiter), Ok(amount)) = (recruiter, amount.parse::<u32>()) else {
        respond!(
            cp,
            "Reply to the recruiter with the amount, or give their user ID and then the amount."
        );
    };
    let delta = sign * i64::from(amount);

    let adjusted_by = cp.sender.id.to_string();
    let result = cp
        .app
        .pipeline
        .adjust_ranking_points(&recruiter.to_string(), delta, &adjusted_by)
        .await;

    if !result.success {
        log::warn!("Ranking of {recruiter} not adjusted by {delta}: {}", result.message);
    }
    respond!(cp, encode_text(&result.message).into_owned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Validate that bot commands match requirements by Telegram's Bot API
    fn validate_bot_commands() {
        let commands = Command::generate_bot_commands();
        // "At most 100 commands can be specified"
        // - https://core.telegram.org/bots/api#setmycommands
        assert!(commands.len() <= 100);
        for command in commands {
            // Everything here is from https://core.telegram.org/bots/api#botcommand
            // "Text of the command; 1-32 characters."
            assert!(!command.command.is_empty());
            assert!(command.command.len() <= 32);

            // "Can contain only lowercase English letters, digits and underscores."
            for chr in command.command.chars() {
                assert!(chr.is_ascii_lowercase() || chr.is_ascii_digit() || chr == '_');
            }

            // "Description of the command; 1-256 characters."
            assert!(!command.description.is_empty());
            assert!(command.description.len() <= 256);
        }
    }

    #[test]
    fn finding_commands() {
        assert_eq!(Command::find("/ranking").unwrap().callname, "/ranking");
        assert!(Command::find("/RANKING").is_some());
        assert!(Command::find("/ranking_add").unwrap().manager_only);
        assert!(!Command::find("/apply").unwrap().manager_only);
        assert!(Command::find("/start").is_some());
        assert!(Command::find("/nope").is_none());
        assert!(Command::find("").is_none());
    }

    #[test]
    fn help_lists_visible_commands() {
        let help = Command::generate_help();
        assert!(help.contains("/approve &lt;request id&gt;"));
        assert!(help.contains("<b>Managers only:</b>"));
        assert!(!help.contains("/start"));
    }

    #[test]
    fn parameter_splitting() {
        assert_eq!(
            split_fields(" Fulano de Tal |555-0101|  ABC123 "),
            ["Fulano de Tal", "555-0101", "ABC123"]
        );
        assert_eq!(split_id("abc123  did not show up "), Some(("abc123", "did not show up")));
        assert_eq!(split_id("abc123"), Some(("abc123", "")));
        assert_eq!(split_id(""), None);
        assert_eq!(answer(Some(&"")), None);
        assert_eq!(answer(Some(&"yes")), Some(String::from("yes")));
        assert_eq!(answer(None), None);
    }
}
