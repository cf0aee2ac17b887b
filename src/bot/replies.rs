//! User-facing texts and keyboards. Messages are sent with HTML parse mode,
//! so anything user-supplied goes through `escape_html`.

use super::commands::Callback;
use crate::chat::{Button, Keyboard};
use crate::config::GateConfig;
use crate::domain::model::{ContentKind, ContentRecord, UploadMode, format_duration};
use crate::domain::{BroadcastReport, BundleStart, DeliveryReport, IngestReceipt, RevokeReport};
use crate::domain::{deep_link, share_link};
use crate::error::{IngestError, LinkError, StoreError};
use std::fmt::Write as _;
use std::time::Duration;

pub const TRY_LATER: &str = "Something went wrong on our side. Please try again later.";

pub const BUSY: &str = "Slow down, I am still working on your earlier messages. Please resend the last one in a moment.";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn welcome(first_name: &str) -> String {
    format!(
        "Hi {}! Send me any file and I will give you a link to share it.\n\
         Use /batch to bundle several files under one link, or /help for everything else.",
        escape_html(first_name)
    )
}

pub fn help(is_admin: bool) -> String {
    let mut text = String::from(
        "<b>Sharing</b>\n\
         Send a file to get a link. A caption like <code>channel=@mychannel ttl=12h My notes</code> \
         gates the link on a channel, makes it expire and names it.\n\
         /batch [options] start a bundle, then send files\n\
         /done create the bundle link\n\
         /cancel drop the open bundle\n\
         /links list your links\n\
         /delete &lt;token&gt; remove one of your links",
    );
    if is_admin {
        text.push_str(
            "\n\n<b>Admin</b>\n\
             /settings or /mode public|admins choose who may upload\n\
             /ban &lt;user_id&gt;, /unban &lt;user_id&gt;\n\
             /broadcast (reply to a message) send it to every user\n\
             /stats usage numbers",
        );
    }
    text
}

pub fn not_found() -> &'static str {
    "This link does not exist or has expired."
}

pub fn banned() -> &'static str {
    "You are banned from using this bot."
}

pub fn denied(missing: &[String]) -> String {
    let mut text = String::from("Join these channels first, then press <b>I have joined</b>:\n");
    for channel in missing {
        let _ = writeln!(text, "• {}", escape_html(channel));
    }
    text
}

/// One join button per missing channel with a known URL, then the retry button.
pub fn denied_keyboard(gate: &GateConfig, missing: &[String], token: &str) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for channel in missing {
        if let Some(url) = gate.join_url(channel) {
            keyboard = keyboard.row(vec![Button::url(format!("Join {channel}"), url)]);
        }
    }
    keyboard.row(vec![Button::callback(
        "I have joined",
        Callback::Check {
            token: token.to_string(),
        }
        .encode(),
    )])
}

pub fn link_created(receipt: &IngestReceipt, bot_username: &str) -> String {
    let link = deep_link(bot_username, &receipt.token);
    let mut text = if receipt.items.len() > 1 {
        format!("Bundle of {} files saved.\n", receipt.items.len())
    } else {
        String::from("File saved.\n")
    };
    let _ = writeln!(text, "<code>{link}</code>");
    if let Some(at) = receipt.expires_at {
        let _ = writeln!(text, "Expires {}.", at.format("%Y-%m-%d %H:%M UTC"));
    }
    if receipt.failed > 0 {
        let _ = writeln!(
            text,
            "{} file(s) could not be stored and are not part of the link.",
            receipt.failed
        );
    }
    text
}

pub fn link_keyboard(bot_username: &str, token: &str) -> Keyboard {
    let link = deep_link(bot_username, token);
    Keyboard::new().row(vec![
        Button::url("Open", link.clone()),
        Button::url("Share", share_link(&link)),
    ])
}

pub fn bundle_started(start: BundleStart) -> String {
    let mut text = String::from("Bundle started. Send the files, then /done (or /cancel).");
    if let Some(count) = start.replaced.filter(|c| *c > 0) {
        let _ = write!(text, "\nThe previous bundle with {count} file(s) was discarded.");
    }
    text
}

pub fn bundle_item_added(count: usize) -> String {
    format!("Added ({count} so far). Send more or /done.")
}

pub fn bundle_cancelled(had_session: bool) -> &'static str {
    if had_session {
        "Bundle discarded."
    } else {
        "There was no open bundle."
    }
}

pub fn delivery_summary(report: &DeliveryReport) -> Option<String> {
    (report.failed > 0).then(|| {
        format!(
            "{} of {} files could not be sent. Please try the link again later.",
            report.failed,
            report.failed + report.sent.len()
        )
    })
}

pub fn auto_delete_notice(after: Duration) -> String {
    format!(
        "These files will be deleted from this chat in {}. Save them somewhere else.",
        format_duration(after)
    )
}

pub fn links_list(records: &[ContentRecord], bot_username: &str) -> String {
    if records.is_empty() {
        return "You have no links yet.".to_string();
    }
    let mut text = String::from("<b>Your links</b>\n");
    for record in records {
        let label = record.display_name.as_deref().unwrap_or(match record.kind {
            ContentKind::Single => "file",
            ContentKind::Bundle => "bundle",
        });
        let _ = write!(
            text,
            "\n{} ({})\n<code>{}</code>",
            escape_html(label),
            record.items.len(),
            deep_link(bot_username, &record.token)
        );
        if let Some(at) = record.expires_at {
            let _ = write!(text, "\nexpires {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
        text.push('\n');
    }
    text
}

pub fn revoked(report: &RevokeReport) -> String {
    if report.is_partial() {
        format!(
            "Link {} deleted. {} archived file(s) could not be removed.",
            report.token, report.archived_failed
        )
    } else {
        format!("Link {} deleted.", report.token)
    }
}

pub fn settings(mode: UploadMode) -> String {
    let label = match mode {
        UploadMode::Public => "everyone",
        UploadMode::AdminsOnly => "admins only",
    };
    format!("<b>Upload mode</b>: {label}")
}

pub fn settings_keyboard(mode: UploadMode) -> Keyboard {
    let mark = |m: UploadMode, text: &str| {
        if m == mode {
            format!("✓ {text}")
        } else {
            text.to_string()
        }
    };
    Keyboard::new().row(vec![
        Button::callback(
            mark(UploadMode::Public, "Public"),
            Callback::SetMode(UploadMode::Public).encode(),
        ),
        Button::callback(
            mark(UploadMode::AdminsOnly, "Admins only"),
            Callback::SetMode(UploadMode::AdminsOnly).encode(),
        ),
    ])
}

pub fn stats(links: u64, users: u64, banned: u64) -> String {
    format!("<b>Stats</b>\nLinks: {links}\nUsers: {users}\nBanned: {banned}")
}

pub fn broadcast_done(report: &BroadcastReport) -> String {
    format!(
        "Broadcast finished.\nSent: {}\nBlocked: {}\nFailed: {}",
        report.sent, report.blocked, report.failed
    )
}

/// Reply for a failed operation. Upstream failures get the generic text;
/// the caller logs the cause.
pub fn error_reply(err: &LinkError) -> &'static str {
    match err {
        LinkError::Ingest(err) => ingest_reply(err),
        LinkError::Store(err) => store_reply(err),
        _ => TRY_LATER,
    }
}

fn ingest_reply(err: &IngestError) -> &'static str {
    match err {
        IngestError::UploadsRestricted => "Uploads are currently limited to admins.",
        IngestError::Banned(_) => banned(),
        IngestError::NoActiveSession => "No bundle is open. Start one with /batch.",
        IngestError::EmptyBundle => "The bundle had no files, so no link was created.",
        IngestError::InvalidExpiry(_) => "That expiry is too long. The limit is 3650d.",
        IngestError::Archive(_) => "I could not store that. Please send it again.",
        IngestError::Store(err) => store_reply(err),
        IngestError::GenerationExhausted { .. } => TRY_LATER,
    }
}

fn store_reply(err: &StoreError) -> &'static str {
    match err {
        StoreError::NotFound(_) => "No such link.",
        StoreError::PermissionDenied { .. } => "You can only delete your own links.",
        StoreError::DuplicateToken(_) | StoreError::Backend(_) => TRY_LATER,
    }
}

/// Whether the error is ours rather than the user's, and so worth logging.
pub fn is_upstream(err: &LinkError) -> bool {
    error_reply(err) == TRY_LATER
        || matches!(err, LinkError::Ingest(IngestError::Archive(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ButtonAction;
    use crate::config::GateChannel;
    use crate::domain::MessageRef;
    use chrono::{TimeZone, Utc};

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & Jerry</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; Jerry&lt;/b&gt;"
        );
    }

    #[test]
    fn denied_keyboard_has_join_buttons_and_retry() {
        let gate = GateConfig {
            channels: vec![GateChannel {
                id: "-1001".into(),
                invite_link: Some("https://t.me/+invite".into()),
            }],
            ..GateConfig::default()
        };
        let missing = vec!["-1001".to_string(), "@news".to_string(), "-1002".to_string()];

        let keyboard = denied_keyboard(&gate, &missing, "abc12345");
        let actions: Vec<&ButtonAction> = keyboard.rows.iter().flatten().map(|b| &b.action).collect();
        assert_eq!(
            actions,
            vec![
                &ButtonAction::Url("https://t.me/+invite".into()),
                &ButtonAction::Url("https://t.me/news".into()),
                &ButtonAction::Callback("check:abc12345".into()),
            ]
        );
    }

    #[test]
    fn link_created_mentions_expiry_and_failures() {
        let receipt = IngestReceipt {
            token: "abc12345".into(),
            items: vec![MessageRef::new(-1, 1), MessageRef::new(-1, 2)],
            failed: 1,
            expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).unwrap()),
        };
        let text = link_created(&receipt, "vault_bot");
        assert!(text.contains("https://t.me/vault_bot?start=abc12345"));
        assert!(text.contains("Bundle of 2 files"));
        assert!(text.contains("Expires 2030-01-02 03:04 UTC"));
        assert!(text.contains("1 file(s) could not be stored"));
    }

    #[test]
    fn user_errors_get_specific_replies() {
        let err = LinkError::Ingest(IngestError::UploadsRestricted);
        assert_eq!(error_reply(&err), "Uploads are currently limited to admins.");
        assert!(!is_upstream(&err));

        let err = LinkError::Ingest(IngestError::Store(StoreError::PermissionDenied {
            token: "t".into(),
            user_id: 1,
        }));
        assert_eq!(error_reply(&err), "You can only delete your own links.");

        let err = LinkError::Ingest(IngestError::InvalidExpiry("100000000d".into()));
        assert!(error_reply(&err).contains("too long"));
        assert!(!is_upstream(&err));
    }

    #[test]
    fn upstream_errors_get_generic_reply() {
        let err = LinkError::Store(StoreError::Backend("disk full".into()));
        assert_eq!(error_reply(&err), TRY_LATER);
        assert!(is_upstream(&err));
        assert!(is_upstream(&LinkError::Ingest(IngestError::GenerationExhausted {
            attempts: 10
        })));
    }

    #[test]
    fn settings_keyboard_marks_current_mode() {
        let keyboard = settings_keyboard(UploadMode::AdminsOnly);
        let labels: Vec<&str> = keyboard.rows[0].iter().map(|b| b.text.as_str()).collect();
        assert_eq!(labels, vec!["Public", "✓ Admins only"]);
    }
}
