use std::sync::Arc;

use teloxide::{
    payloads::AnswerCallbackQuerySetters, requests::Requester, types::CallbackQuery, Bot,
    RequestError,
};

use super::{authenticate_manager, refresh_approval_post, user_name, App};
use crate::types::{FirstActivities, RecruitRequest, RecruitStatus, Transition};

/// What an inline button asks for. Serialized as `<action>:<id>`, which has to
/// fit in Telegram's 64 bytes of callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    RemoveBlacklist(String),
    Approve(String),
    Reject(String),
    DeliverKit(String),
}

impl CallbackAction {
    #[must_use]
    pub fn to_data(&self) -> String {
        let (action, id) = match self {
            CallbackAction::RemoveBlacklist(id) => ("bl_rm", id),
            CallbackAction::Approve(id) => ("rc_ok", id),
            CallbackAction::Reject(id) => ("rc_no", id),
            CallbackAction::DeliverKit(id) => ("rc_kit", id),
        };
        format!("{action}:{id}")
    }

    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let (action, id) = data.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        let id = id.to_string();
        Some(match action {
            "bl_rm" => CallbackAction::RemoveBlacklist(id),
            "rc_ok" => CallbackAction::Approve(id),
            "rc_no" => CallbackAction::Reject(id),
            "rc_kit" => CallbackAction::DeliverKit(id),
            _ => return None,
        })
    }
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    app: Arc<App>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id.clone())
                .text($text)
                .await?;
            return Ok(());
        };
    }

    let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
        goodbye!("This button doesn't do anything.");
    };

    if !authenticate_manager(&bot, &app, &query.from).await? {
        goodbye!("Only managers can do that.");
    }

    let manager = query.from.id.to_string();

    let result = match &action {
        CallbackAction::RemoveBlacklist(id) => {
            bot.answer_callback_query(query.id.clone())
                .text(format!(
                    "Removal needs a reason. Send this in the control chat:\n/unblacklist {id} <reason>"
                ))
                .show_alert(true)
                .await?;
            return Ok(());
        }
        CallbackAction::Approve(id) => {
            app.pipeline
                .approve(id, &manager, FirstActivities::default())
                .await
        }
        CallbackAction::Reject(id) => app.pipeline.reject(id, &manager, None).await,
        CallbackAction::DeliverKit(id) => app.pipeline.mark_kit_delivered(id, &manager).await,
    };

    let transition = match result {
        Ok(transition) => transition,
        Err(e) => {
            log::error!(
                "Storage failed while {} pressed {}: {e}",
                user_name(&query.from),
                action.to_data()
            );
            goodbye!("Could not save that. Please try again later.");
        }
    };

    let Some(request) = transition.current() else {
        goodbye!("This request no longer exists.");
    };
    let request = keep_pressed_post(&app, &query, request).await;

    // Refused or not, the post should show what actually happened.
    refresh_approval_post(&bot, &request).await?;

    if let Transition::Applied(_) = transition {
        goodbye!("Done.");
    }
    goodbye!(refusal(&action, &request));
}

/// The post the button was pressed on is the one to keep updated. Remembers
/// it if the request points somewhere else, or nowhere.
async fn keep_pressed_post(
    app: &App,
    query: &CallbackQuery,
    request: &RecruitRequest,
) -> RecruitRequest {
    let Some(pressed) = &query.message else {
        return request.clone();
    };
    let chat = pressed.chat().id.0.to_string();
    let message = pressed.id().0.to_string();
    if request.approval_channel_id.as_ref() == Some(&chat)
        && request.approval_message_id.as_ref() == Some(&message)
    {
        return request.clone();
    }

    match app
        .pipeline
        .attach_approval_post(&request.id, &chat, &message)
        .await
    {
        Ok(Some(updated)) => updated,
        Ok(None) => request.clone(),
        Err(e) => {
            log::error!("Could not remember the approval post of {}: {e}", request.id);
            request.clone()
        }
    }
}

/// Why pressing this button changed nothing, going by what it was meant to do.
fn refusal(action: &CallbackAction, request: &RecruitRequest) -> String {
    match action {
        CallbackAction::DeliverKit(_) if request.kit_delivered => {
            String::from("The kit was already delivered.")
        }
        CallbackAction::DeliverKit(_) if request.status == RecruitStatus::Pending => {
            String::from("This request isn't approved yet.")
        }
        CallbackAction::DeliverKit(_) => String::from("Only approved recruits get a kit."),
        _ if request.status.is_terminal() => {
            format!("This request is already {}.", request.status)
        }
        _ => String::from("This request can't be changed like that."),
    }
}
