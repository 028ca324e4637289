//! Bot lifecycle: construction and the long-polling dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{debug, info};

use droidforge_core::config;
use droidforge_models::GitCredentials;

use crate::error::{Result, TelegramError};
use crate::handlers::{self, Command};
use crate::state::{create_shared_state, BotState};

/// The DroidForge Telegram bot.
pub struct DroidForgeBot {
    bot: Bot,
    state: Arc<BotState>,
}

impl DroidForgeBot {
    /// Creates a bot from the `TELEGRAM_BOT_TOKEN` environment variable.
    pub fn new(
        state_dir: &Path,
        repos_root: PathBuf,
        credentials: Option<GitCredentials>,
    ) -> Result<Self> {
        let token = std::env::var(config::BOT_TOKEN_ENV).map_err(|_| TelegramError::NoToken)?;
        let state = create_shared_state(state_dir, repos_root, credentials);
        Ok(Self {
            bot: Bot::new(token),
            state,
        })
    }

    /// Creates a bot over pre-built shared state (used by tests).
    pub fn with_state(token: impl Into<String>, state: Arc<BotState>) -> Self {
        Self {
            bot: Bot::new(token.into()),
            state,
        }
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Fetches the bot's own username and caches it for deep links.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        let username = me.username().to_string();
        self.state.set_username(username.clone());
        Ok(username)
    }

    /// Runs the long-polling dispatcher until shutdown.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram long polling");

        let state_for_commands = Arc::clone(&self.state);
        let state_for_callbacks = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: CallbackQuery| {
                    let state = Arc::clone(&state_for_callbacks);
                    async move { handlers::handle_callback(bot, q, state).await }
                },
            ))
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        debug!(chat_id = %msg.chat.id, ?cmd, "Command matched");
                        async move { handlers::handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                // Slash messages that matched no known command.
                Update::filter_message()
                    .filter(|msg: Message| {
                        msg.text().map(|t| t.starts_with('/')).unwrap_or(false)
                    })
                    .endpoint(handlers::handle_unknown_command),
            );

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                debug!(update = ?upd, "Ignoring unhandled update");
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}
