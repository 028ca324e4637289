//! Locations and environment configuration for DroidForge.
//!
//! # Storage structure
//!
//! All state lives under `~/.droidforge/`:
//!
//! ```text
//! ~/.droidforge/
//! ├── repos/        # Working copies, one per configured repository
//! │   └── <name>/
//! │       ├── error.log                    # Last build's error output
//! │       └── output/<name>-<rev>.apk      # Built artifacts
//! └── targets/      # Per-chat build configuration records
//! ```
//!
//! # Environment variables
//!
//! - `DROIDFORGE_STATE_DIR`: override the base state directory
//! - `DROIDFORGE_REPOS_DIR`: override the working-copy directory
//! - `TELEGRAM_BOT_TOKEN`: bot token from @BotFather
//! - `DROIDFORGE_GIT_USERNAME` / `DROIDFORGE_GIT_PASSWORD`: optional git
//!   credentials for private repositories

use std::path::PathBuf;
use std::sync::OnceLock;

use droidforge_models::GitCredentials;

/// Environment variable for a custom state directory.
pub const STATE_DIR_ENV: &str = "DROIDFORGE_STATE_DIR";

/// Environment variable for a custom working-copy directory.
pub const REPOS_DIR_ENV: &str = "DROIDFORGE_REPOS_DIR";

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable for the git username.
pub const GIT_USERNAME_ENV: &str = "DROIDFORGE_GIT_USERNAME";

/// Environment variable for the git password or token.
pub const GIT_PASSWORD_ENV: &str = "DROIDFORGE_GIT_PASSWORD";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".droidforge";

const REPOS_SUBDIR: &str = "repos";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the DroidForge state directory.
///
/// Resolution order:
/// 1. `DROIDFORGE_STATE_DIR` environment variable if set
/// 2. `~/.droidforge` if a home directory is available
/// 3. `.droidforge` in the current directory as a fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the directory under which working copies are cloned.
///
/// Defaults to `<state_dir>/repos` or `DROIDFORGE_REPOS_DIR` env var.
pub fn repos_dir() -> PathBuf {
    std::env::var(REPOS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(REPOS_SUBDIR))
}

/// Path of the optional env file loaded at startup.
pub fn env_file() -> PathBuf {
    state_dir().join(".env")
}

/// Ensure the state and repos directories exist.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(state_dir())?;
    std::fs::create_dir_all(repos_dir())?;
    Ok(())
}

/// Git credentials from the environment, when both halves are set.
pub fn git_credentials() -> Option<GitCredentials> {
    let username = std::env::var(GIT_USERNAME_ENV).ok()?;
    let password = std::env::var(GIT_PASSWORD_ENV).ok()?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some(GitCredentials { username, password })
}
