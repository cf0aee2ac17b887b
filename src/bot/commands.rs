use crate::domain::model::UploadMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { token: Option<String> },
    Help,
    Batch { options: String },
    Done,
    Cancel,
    Links,
    Delete { token: Option<String> },
    Settings,
    Mode { mode: Option<UploadMode> },
    Ban { user_id: Option<i64> },
    Unban { user_id: Option<i64> },
    Broadcast,
    Stats,
}

impl Command {
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Self::Settings
                | Self::Mode { .. }
                | Self::Ban { .. }
                | Self::Unban { .. }
                | Self::Broadcast
                | Self::Stats
        )
    }
}

/// Inline button payloads. Kept short: Telegram caps them at 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// "I have joined", re-run the gate for this token.
    Check { token: String },
    SetMode(UploadMode),
}

impl Callback {
    pub fn encode(&self) -> String {
        match self {
            Self::Check { token } => format!("check:{token}"),
            Self::SetMode(UploadMode::Public) => "mode:public".to_string(),
            Self::SetMode(UploadMode::AdminsOnly) => "mode:admins".to_string(),
        }
    }
}

pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let head = parts.next()?.to_lowercase();
    // `/start@vault_bot` in groups.
    let cmd = head.split('@').next().unwrap_or(head.as_str());
    let args = parts.next().unwrap_or("").trim();
    let first_arg = args.split_whitespace().next();

    match cmd {
        "/start" => Some(Command::Start {
            token: first_arg.map(|t| t.to_ascii_lowercase()),
        }),
        "/help" | "/?" => Some(Command::Help),
        "/batch" => Some(Command::Batch {
            options: args.to_string(),
        }),
        "/done" => Some(Command::Done),
        "/cancel" => Some(Command::Cancel),
        "/links" => Some(Command::Links),
        "/delete" | "/revoke" => Some(Command::Delete {
            token: first_arg.map(|t| t.to_ascii_lowercase()),
        }),
        "/settings" => Some(Command::Settings),
        "/mode" => Some(Command::Mode {
            mode: first_arg.and_then(UploadMode::parse),
        }),
        "/ban" => Some(Command::Ban {
            user_id: first_arg.and_then(|id| id.parse().ok()),
        }),
        "/unban" => Some(Command::Unban {
            user_id: first_arg.and_then(|id| id.parse().ok()),
        }),
        "/broadcast" => Some(Command::Broadcast),
        "/stats" => Some(Command::Stats),
        _ => None,
    }
}

pub fn parse_callback(data: &str) -> Option<Callback> {
    let (kind, value) = data.split_once(':')?;
    match kind {
        "check" if !value.is_empty() => Some(Callback::Check {
            token: value.to_string(),
        }),
        "mode" => UploadMode::parse(value).map(Callback::SetMode),
        _ => None,
    }
}
