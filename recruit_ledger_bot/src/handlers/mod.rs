pub mod callbacks;
pub mod commands;

use std::sync::Arc;

use bot_commons::{is_admin_of, useful_methods::*};
use teloxide::{
    payloads::EditMessageTextSetters,
    requests::Requester,
    sugar::request::RequestReplyExt,
    types::{ChatId, Me, Message, MessageId, ParseMode, User},
    ApiError, Bot, RequestError,
};

use crate::{
    blacklist::BlacklistLedger,
    config::Config,
    ranking::RankingAggregator,
    recruits::RecruitPipeline,
    render,
    store::{RecordStore, StoreError},
    types::{BlacklistEntry, RecruitRequest},
};

use self::commands::{Command, CommandParams};

/// Everything the handlers need, shared between all of them.
pub struct App {
    pub config: Config,
    pub ledger: BlacklistLedger,
    pub pipeline: RecruitPipeline,
    pub ranking: RankingAggregator,
}

impl App {
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn RecordStore>) -> Self {
        App {
            config,
            ledger: BlacklistLedger::new(store.clone()),
            pipeline: RecruitPipeline::new(store.clone()),
            ranking: RankingAggregator::new(store),
        }
    }
}

/// `@username`, or the full name if there's no username.
pub fn user_name(user: &User) -> String {
    if let Some(username) = &user.username {
        format!("@{}", username)
    } else {
        user.full_name()
    }
}

/// Check if this user is an admin of the control chat, which is what makes
/// someone a manager.
pub async fn authenticate_manager(bot: &Bot, app: &App, user: &User) -> Result<bool, RequestError> {
    let manager = is_admin_of(bot, user.id, app.config.control_chat).await?;
    if !manager {
        log::warn!(
            "Non-manager trying to manage things: {} (userid {})",
            user_name(user),
            user.id
        );
    }
    Ok(manager)
}

/// Logs the storage failure and tells the user something went wrong.
pub async fn report_storage_failure(
    bot: &Bot,
    message: &Message,
    error: &StoreError,
) -> Result<(), RequestError> {
    log::error!("Storage failed while handling a message: {error}");
    bot.send_message(
        message.chat.id,
        "Could not reach the records right now. Please try again later.",
    )
    .reply_to(message.id)
    .await?;
    Ok(())
}

/// Edits a posted message, ignoring the error Telegram gives when nothing changed.
async fn edit_post(
    bot: &Bot,
    chat: &str,
    message: &str,
    text: String,
    keyboard: teloxide::types::InlineKeyboardMarkup,
) -> Result<(), RequestError> {
    let (Ok(chat), Ok(message)) = (chat.parse::<i64>(), message.parse::<i32>()) else {
        log::warn!("Can't edit post {message} in chat {chat}, those don't look like Telegram IDs");
        return Ok(());
    };

    let edit_result = bot
        .edit_message_text(ChatId(chat), MessageId(message), text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await;

    match edit_result {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Re-renders the approval post of this request from the stored record.
pub async fn refresh_approval_post(bot: &Bot, request: &RecruitRequest) -> Result<(), RequestError> {
    let (Some(chat), Some(message)) = (&request.approval_channel_id, &request.approval_message_id)
    else {
        return Ok(());
    };
    edit_post(
        bot,
        chat,
        message,
        render::recruit_post(request),
        render::recruit_keyboard(request),
    )
    .await
}

/// Re-renders the blacklist chat post of this entry from the stored record.
pub async fn refresh_blacklist_post(bot: &Bot, entry: &BlacklistEntry) -> Result<(), RequestError> {
    edit_post(
        bot,
        &entry.origin_channel_id,
        &entry.origin_message_id,
        render::blacklist_post(entry),
        render::blacklist_keyboard(entry),
    )
    .await
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    app: Arc<App>,
) -> Result<(), RequestError> {
    let Some(sender) = &message.from else {
        return Ok(());
    };
    // Bot ignores messages made by itself.
    if sender.id == me.id {
        return Ok(());
    }

    let Some((callname, username, params)) = message.split_command() else {
        return Ok(());
    };

    // "/ranking@Some_Other_Bot" is not for us.
    // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
    if username.is_some_and(|username| !username.eq_ignore_ascii_case(me.username())) {
        return Ok(());
    }

    let Some(command) = Command::find(callname) else {
        return Ok(());
    };

    if command.manager_only && !authenticate_manager(&bot, &app, sender).await? {
        bot.send_message(message.chat.id, "Only managers can use this command.")
            .reply_to(message.id)
            .await?;
        return Ok(());
    }

    log::debug!("{} ran {}", user_name(sender), callname);

    (command.function)(CommandParams {
        app: &app,
        bot: &bot,
        message: &message,
        sender,
        params,
    })
    .await
}
