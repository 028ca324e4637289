//! Typed inline-keyboard callback actions.
//!
//! Callback data crosses the Telegram wire as an opaque string, so every
//! action has an explicit encode/decode instead of ad hoc string tags.
//! Unknown or malformed data decodes to `None` and is ignored.

/// An action carried by an inline-keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Send the already-built APK for the latest revision.
    SendBuilt,
    /// Dismiss the "send again?" offer.
    Dismiss,
    /// Redeem a one-time token and send the build log.
    SendLog { token: String },
    /// Dismiss the log offer.
    DismissLog,
    /// Toggle the admin-only flag; carries the user who issued
    /// `/setadminonly` so the toggle is honored only if that user is an
    /// admin when the button is pressed.
    SetAdminOnly { enable: bool, user_id: u64 },
}

impl CallbackAction {
    /// Encodes the action as callback data (Telegram limits this to 64
    /// bytes, which every variant fits).
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::SendBuilt => "send-built".to_string(),
            CallbackAction::Dismiss => "dismiss".to_string(),
            CallbackAction::SendLog { token } => format!("log:{}", token),
            CallbackAction::DismissLog => "log-dismiss".to_string(),
            CallbackAction::SetAdminOnly { enable, user_id } => {
                format!("adminonly:{}:{}", u8::from(*enable), user_id)
            }
        }
    }

    /// Decodes callback data; `None` for anything unrecognized.
    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "send-built" => return Some(CallbackAction::SendBuilt),
            "dismiss" => return Some(CallbackAction::Dismiss),
            "log-dismiss" => return Some(CallbackAction::DismissLog),
            _ => {}
        }

        if let Some(token) = data.strip_prefix("log:") {
            if token.is_empty() {
                return None;
            }
            return Some(CallbackAction::SendLog {
                token: token.to_string(),
            });
        }

        if let Some(rest) = data.strip_prefix("adminonly:") {
            let (flag, user_id) = rest.split_once(':')?;
            let enable = match flag {
                "1" => true,
                "0" => false,
                _ => return None,
            };
            return Some(CallbackAction::SetAdminOnly {
                enable,
                user_id: user_id.parse().ok()?,
            });
        }

        None
    }
}
