//! Shared state across bot handlers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use droidforge_models::{BuildTarget, GitCredentials};
use droidforge_orchestrator::BuildOrchestrator;
use droidforge_persistence::TargetStore;

use crate::admin::AdminCache;
use crate::error::Result;
use crate::logtoken::LogTokens;

/// State shared by every handler: the configuration store, the build
/// orchestrator, the admin cache and the outstanding log tokens.
pub struct BotState {
    store: Arc<TargetStore>,
    orchestrator: Arc<BuildOrchestrator>,
    admins: AdminCache,
    log_tokens: LogTokens,
    http: reqwest::Client,
    credentials: Option<GitCredentials>,
    bot_username: OnceLock<String>,
}

impl BotState {
    /// Builds the state over a state directory and a repos root.
    pub fn new(
        state_dir: &Path,
        repos_root: PathBuf,
        credentials: Option<GitCredentials>,
    ) -> Self {
        let store = Arc::new(TargetStore::new(state_dir));
        let orchestrator = Arc::new(BuildOrchestrator::new(
            Arc::clone(&store),
            repos_root,
            credentials.clone(),
        ));

        Self {
            store,
            orchestrator,
            admins: AdminCache::default(),
            log_tokens: LogTokens::default(),
            http: reqwest::Client::new(),
            credentials,
            bot_username: OnceLock::new(),
        }
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<BuildOrchestrator> {
        &self.orchestrator
    }

    pub fn admins(&self) -> &AdminCache {
        &self.admins
    }

    pub fn log_tokens(&self) -> &LogTokens {
        &self.log_tokens
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn credentials(&self) -> Option<&GitCredentials> {
        self.credentials.as_ref()
    }

    /// Records the bot's username once known (used for deep links).
    pub fn set_username(&self, username: String) {
        let _ = self.bot_username.set(username);
    }

    pub fn username(&self) -> Option<&str> {
        self.bot_username.get().map(String::as_str)
    }

    /// Loads a chat's target, `None` when nothing is configured.
    pub fn target(&self, chat_id: i64) -> Result<Option<BuildTarget>> {
        Ok(self.store.load(chat_id)?)
    }

    /// Path of a chat's captured build log, when a repo is configured.
    pub fn build_log(&self, chat_id: i64) -> Result<Option<PathBuf>> {
        let Some(target) = self.target(chat_id)? else {
            return Ok(None);
        };
        Ok(target.repo.map(|repo| self.orchestrator.build_log(&repo)))
    }
}

/// Creates the shared state handlers clone around.
pub fn create_shared_state(
    state_dir: &Path,
    repos_root: PathBuf,
    credentials: Option<GitCredentials>,
) -> Arc<BotState> {
    Arc::new(BotState::new(state_dir, repos_root, credentials))
}
