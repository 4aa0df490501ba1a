use std::fmt::Write;

use chrono::{DateTime, Utc};
use html_escape::encode_text;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::{
    handlers::callbacks::CallbackAction,
    types::{BlacklistEntry, RankingEntry, RecruitRequest, RecruitStatus},
};

fn time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Clickable mention of a Telegram user, if the ID looks like one.
#[must_use]
pub fn user_link(id: &str) -> String {
    match id.parse::<u64>() {
        Ok(_) => format!("<a href=\"tg://user?id={id}\">{id}</a>"),
        Err(_) => encode_text(id).into_owned(),
    }
}

/// Text of the post in the blacklist chat.
#[must_use]
pub fn blacklist_post(entry: &BlacklistEntry) -> String {
    let mut text = format!(
        "<b>BLACKLIST ENTRY{}</b> <code>{}</code>\n\n\
        Passport: <code>{}</code>\n\
        Name: {}\n\
        Reason: {}\n\
        Added by {} on {}",
        if entry.removed { " (REMOVED)" } else { "" },
        encode_text(&entry.id),
        encode_text(&entry.passport_id),
        encode_text(&entry.display_name),
        encode_text(&entry.reason),
        user_link(&entry.author_id),
        time(&entry.created_at),
    );

    if entry.removed {
        let _ = write!(
            text,
            "\n\nRemoved by {} on {}\nReason: {}",
            entry.removed_by.as_deref().map_or_else(String::new, user_link),
            entry.removed_at.as_ref().map_or_else(String::new, time),
            encode_text(entry.remove_reason.as_deref().unwrap_or_default()),
        );
    }

    text
}

#[must_use]
pub fn blacklist_keyboard(entry: &BlacklistEntry) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if entry.is_active() {
        rows.push(vec![InlineKeyboardButton::callback(
            "Remove",
            CallbackAction::RemoveBlacklist(entry.id.clone()).to_data(),
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Text of the post in the approval chat.
#[must_use]
pub fn recruit_post(request: &RecruitRequest) -> String {
    let mut text = format!(
        "<b>RECRUIT REQUEST</b> <code>{}</code>\n\n\
        Candidate: {} ({})\n\
        Phone: {}\n\
        Passport: <code>{}</code>\n\
        Recruiter: {}\n\
        Submitted on {}",
        encode_text(&request.id),
        encode_text(&request.candidate_name),
        user_link(&request.candidate_id),
        encode_text(&request.phone),
        encode_text(&request.passport),
        user_link(&request.recruiter_id),
        time(&request.created_at),
    );

    if request.blacklist_flag {
        let _ = write!(
            text,
            "\n\n<b>This passport is blacklisted!</b> Reason: {}",
            encode_text(request.blacklist_reason.as_deref().unwrap_or("none given"))
        );
    }

    text.push_str("\n\n");
    match request.status {
        RecruitStatus::Pending => text.push_str("Status: <b>PENDING</b>"),
        RecruitStatus::Approved => {
            let _ = write!(
                text,
                "Status: <b>APPROVED</b> by {} on {}",
                request.approved_by.as_deref().map_or_else(String::new, user_link),
                request.approved_at.as_ref().map_or_else(String::new, time),
            );
            for (label, answer) in [
                ("First race", &request.first_race),
                ("First farm", &request.first_farm),
                ("First dismantle", &request.first_dismantle),
            ] {
                if let Some(answer) = answer {
                    let _ = write!(text, "\n{label}: {}", encode_text(answer));
                }
            }
            match (&request.kit_delivered_by, &request.kit_delivered_at) {
                (Some(by), Some(at)) if request.kit_delivered => {
                    let _ = write!(text, "\nKit delivered by {} on {}", user_link(by), time(at));
                }
                _ => text.push_str("\nKit not delivered yet"),
            }
        }
        RecruitStatus::Rejected => {
            let _ = write!(
                text,
                "Status: <b>REJECTED</b> by {} on {}",
                request.rejected_by.as_deref().map_or_else(String::new, user_link),
                request.rejected_at.as_ref().map_or_else(String::new, time),
            );
            if let Some(reason) = &request.reject_reason {
                let _ = write!(text, "\nReason: {}", encode_text(reason));
            }
        }
    }

    text
}

/// Buttons for whatever can still happen to the request.
#[must_use]
pub fn recruit_keyboard(request: &RecruitRequest) -> InlineKeyboardMarkup {
    let rows = match request.status {
        RecruitStatus::Pending => vec![vec![
            InlineKeyboardButton::callback(
                "Approve",
                CallbackAction::Approve(request.id.clone()).to_data(),
            ),
            InlineKeyboardButton::callback(
                "Reject",
                CallbackAction::Reject(request.id.clone()).to_data(),
            ),
        ]],
        RecruitStatus::Approved if !request.kit_delivered => {
            vec![vec![InlineKeyboardButton::callback(
                "Kit delivered",
                CallbackAction::DeliverKit(request.id.clone()).to_data(),
            )]]
        }
        RecruitStatus::Approved | RecruitStatus::Rejected => Vec::new(),
    };
    InlineKeyboardMarkup::new(rows)
}

#[must_use]
pub fn ranking(entries: &[RankingEntry]) -> String {
    if entries.is_empty() {
        return String::from("Nobody has any approved recruits yet.");
    }

    let mut text = String::from("<b>TOP RECRUITERS</b>\n");
    for (place, entry) in entries.iter().enumerate() {
        let _ = write!(
            text,
            "\n{}. {} - {} recruit{}",
            place + 1,
            user_link(&entry.recruiter_id),
            entry.total,
            if entry.total == 1 { "" } else { "s" }
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::types::{
        BlacklistPatch, BlacklistSnapshot, FirstActivities, NewRecruit, RecruitPatch,
    };

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 25, 14, 30, 0).unwrap()
    }

    fn request() -> RecruitRequest {
        RecruitRequest::new(
            String::from("r1"),
            NewRecruit {
                recruiter_id: String::from("1001"),
                candidate_id: String::from("2002"),
                candidate_name: String::from("<b>Fake</b> & Co"),
                phone: String::from("555"),
                passport: String::from("ABC123"),
                ..Default::default()
            },
            BlacklistSnapshot {
                flagged: true,
                reason: Some(String::from("cheating")),
            },
            at(),
        )
    }

    fn buttons(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                other => panic!("Unexpected button kind {other:?}"),
            })
            .collect()
    }

    #[test]
    fn user_text_is_escaped() {
        let text = recruit_post(&request());
        assert!(text.contains("&lt;b&gt;Fake&lt;/b&gt; &amp; Co"));
        assert!(!text.contains("<b>Fake"));
        assert!(text.contains("tg://user?id=1001"));
        assert!(text.contains("This passport is blacklisted!"));
        assert!(text.contains("2026-01-25 14:30 UTC"));
    }

    #[test]
    fn recruit_buttons_follow_the_status() {
        let mut request = request();
        assert_eq!(buttons(&recruit_keyboard(&request)), ["rc_ok:r1", "rc_no:r1"]);

        request.apply(&RecruitPatch::Approve {
            by: String::from("3003"),
            at: at(),
            first: FirstActivities {
                race: Some(String::from("yes")),
                ..Default::default()
            },
        });
        assert_eq!(buttons(&recruit_keyboard(&request)), ["rc_kit:r1"]);
        let text = recruit_post(&request);
        assert!(text.contains("APPROVED"));
        assert!(text.contains("First race: yes"));
        assert!(!text.contains("First farm"));
        assert!(text.contains("Kit not delivered yet"));

        request.apply(&RecruitPatch::DeliverKit {
            by: String::from("3003"),
            at: at(),
        });
        assert!(buttons(&recruit_keyboard(&request)).is_empty());
        assert!(recruit_post(&request).contains("Kit delivered by"));
    }

    #[test]
    fn removed_entries_lose_their_button() {
        let mut entry = crate::store::suite::entry("b1", "ABC123", 0);
        assert_eq!(buttons(&blacklist_keyboard(&entry)), ["bl_rm:b1"]);

        entry.apply(&BlacklistPatch::Remove {
            by: String::from("4004"),
            at: at(),
            reason: String::from("appeal accepted"),
        });
        assert!(buttons(&blacklist_keyboard(&entry)).is_empty());
        let text = blacklist_post(&entry);
        assert!(text.contains("(REMOVED)"));
        assert!(text.contains("appeal accepted"));
    }

    #[test]
    fn ranking_lines() {
        assert_eq!(ranking(&[]), "Nobody has any approved recruits yet.");

        let text = ranking(&[
            RankingEntry {
                recruiter_id: String::from("1001"),
                total: 3,
            },
            RankingEntry {
                recruiter_id: String::from("not<a>number"),
                total: 1,
            },
        ]);
        assert!(text.contains("\n1. <a href=\"tg://user?id=1001\">1001</a> - 3 recruits"));
        assert!(text.contains("\n2. not&lt;a&gt;number - 1 recruit"));
    }
}
