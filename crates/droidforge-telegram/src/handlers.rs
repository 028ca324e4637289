//! Command and callback handlers for the DroidForge bot.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use droidforge_models::attempt::{BuildFailure, BuildOutcome, BuildPhase};
use droidforge_models::repo::RepoRef;
use droidforge_orchestrator::BuildProgress;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, UserId};
use teloxide::utils::command::BotCommands;
use teloxide::RequestError;
use tracing::{error, info, warn};
use url::Url;

use droidforge_persistence::TargetStore;

use crate::callback::CallbackAction;
use crate::github::{rejection_message, verify_repo, RepoCheck};
use crate::state::BotState;

const NO_PERMISSION: &str = "You think you have permission to do this? Grow up!";
const SETREPO_SYNTAX: &str = "Syntax is /setrepo [{github username}/{repo}]";

/// Commands understood by the bot.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start(String),
    #[command(description = "say hello")]
    Hello,
    #[command(description = "show the id of this chat")]
    Chatid,
    #[command(description = "set the GitHub repo to build, e.g. /setrepo owner/name")]
    Setrepo(String),
    #[command(description = "show the configured repo")]
    Getrepo,
    #[command(description = "choose whether only admins may run /build")]
    Setadminonly,
    #[command(description = "sync the repo and build the apk")]
    Build,
    #[command(description = "build even if the latest source was already built (admins only)")]
    Forcebuild,
    #[command(description = "show this help message")]
    Help,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start(payload) => handle_start(bot, msg, state, payload).await,
        Command::Hello => handle_hello(bot, msg).await,
        Command::Chatid => handle_chatid(bot, msg).await,
        Command::Setrepo(args) => handle_setrepo(bot, msg, state, args).await,
        Command::Getrepo => handle_getrepo(bot, msg, state).await,
        Command::Setadminonly => handle_setadminonly(bot, msg, state).await,
        Command::Build => handle_build(bot, msg, state, false).await,
        Command::Forcebuild => handle_build(bot, msg, state, true).await,
        Command::Help => handle_help(bot, msg).await,
    }
}

pub async fn handle_unknown_command(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(
        msg.chat.id,
        "Sorry, I didn't understand that command.\nTry /help to get available commands",
    )
    .await?;
    Ok(())
}

/// `/start` greets the user; `/start sendlog_<token>` is the deep link a
/// group-chat button points at, redeemed here in the private chat.
async fn handle_start(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    payload: String,
) -> ResponseResult<()> {
    let payload = payload.trim();
    if let Some(token) = payload.strip_prefix("sendlog_") {
        return deliver_log(&bot, &state, msg.chat.id, token).await;
    }
    bot.send_message(msg.chat.id, "Hello World!").await?;
    Ok(())
}

async fn handle_hello(bot: Bot, msg: Message) -> ResponseResult<()> {
    let name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or("there");
    bot.send_message(
        msg.chat.id,
        format!("Hello {name}!\nTry /help to see what I can do"),
    )
    .await?;
    Ok(())
}

async fn handle_chatid(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, msg.chat.id.to_string())
        .await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_setrepo(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    args: String,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    if !state.admins().is_admin(&bot, &msg).await {
        bot.send_message(chat_id, NO_PERMISSION).await?;
        return Ok(());
    }

    let args = args.trim();
    if args.is_empty() {
        bot.send_message(chat_id, format!("Oops! no option specified!\n{SETREPO_SYNTAX}"))
            .await?;
        return Ok(());
    }

    let repo: RepoRef = match args.parse() {
        Ok(repo) => repo,
        Err(_) => {
            bot.send_message(
                chat_id,
                format!(
                    "Oops! The option must be in the form {{github username}}/{{repo}}\n{SETREPO_SYNTAX}"
                ),
            )
            .await?;
            return Ok(());
        }
    };

    // Check the repo actually exists on GitHub before persisting it.
    let check = match verify_repo(state.http(), &repo, state.credentials()).await {
        Ok(check) => check,
        Err(err) => {
            warn!(error = %err, repo = %repo, "GitHub verification request failed");
            bot.send_message(chat_id, "Could not verify the repo right now. Please try again later")
                .await?;
            return Ok(());
        }
    };

    match persist_checked_repo(state.store(), chat_id.0, repo.clone(), check) {
        Ok(Some(updated)) => {
            let verb = if updated { "updated" } else { "set" };
            bot.send_message(
                chat_id,
                format!("The repo url has been successfully {verb} to {}", repo.url()),
            )
            .await?;
        }
        Ok(None) => {
            if let Some(rejection) = rejection_message(check) {
                bot.send_message(chat_id, rejection).await?;
            }
        }
        Err(err) => {
            error!(error = %err, chat_id = chat_id.0, "failed to persist repo");
            bot.send_message(chat_id, "Could not save the repo. Please try again later")
                .await?;
        }
    }
    Ok(())
}

/// Persists a repository only when its verification passed.
///
/// A rejected check stores nothing and returns `None`; otherwise returns
/// whether an existing record was updated.
fn persist_checked_repo(
    store: &TargetStore,
    chat_id: i64,
    repo: RepoRef,
    check: RepoCheck,
) -> droidforge_persistence::Result<Option<bool>> {
    if rejection_message(check).is_some() {
        return Ok(None);
    }
    store.set_repo(chat_id, repo).map(Some)
}

async fn handle_getrepo(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let repo = match state.target(chat_id.0) {
        Ok(target) => target.and_then(|t| t.repo),
        Err(err) => {
            error!(error = %err, chat_id = chat_id.0, "failed to load build target");
            None
        }
    };
    let text = match repo {
        Some(repo) => format!("The repo url is {}", repo.url()),
        None => "The repo url is null.\nPlease set one using /setrepo".to_string(),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

async fn handle_setadminonly(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    if !state.admins().is_admin(&bot, &msg).await {
        bot.send_message(chat_id, NO_PERMISSION).await?;
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0;
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "Yes!",
            CallbackAction::SetAdminOnly { enable: true, user_id }.encode(),
        ),
        InlineKeyboardButton::callback(
            "No",
            CallbackAction::SetAdminOnly { enable: false, user_id }.encode(),
        ),
    ]]);
    bot.send_message(chat_id, "Should the build command be invoked by admins only?")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn handle_build(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    force: bool,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let is_private = msg.chat.is_private();

    let admin_only = state
        .target(chat_id.0)
        .ok()
        .flatten()
        .map(|t| t.admin_only)
        .unwrap_or(false);
    // Only resolve admin status when the decision depends on it.
    let is_admin = if force || admin_only {
        state.admins().is_admin(&bot, &msg).await
    } else {
        true
    };
    if let Some(rejection) = build_permitted(force, admin_only, is_admin) {
        bot.send_message(chat_id, rejection).await?;
        return Ok(());
    }

    let initial = if force { "Force building app" } else { "Repo syncing..." };
    let status = bot.send_message(chat_id, initial).await?;

    // The build runs for minutes; hand it to a worker so the dispatcher
    // keeps serving other chats.
    let worker_bot = bot.clone();
    tokio::spawn(async move {
        run_build_task(worker_bot, state, chat_id, status.id, force, is_private).await;
    });
    Ok(())
}

/// Gating decision for `/build` and `/forcebuild`, taken before the
/// orchestrator is ever invoked. `None` means the build may proceed;
/// otherwise the rejection to reply with.
fn build_permitted(force: bool, admin_only: bool, is_admin: bool) -> Option<&'static str> {
    if force && !is_admin {
        return Some(NO_PERMISSION);
    }
    if admin_only && !is_admin {
        return Some("Only admins can build repo!");
    }
    None
}

async fn run_build_task(
    bot: Bot,
    state: Arc<BotState>,
    chat_id: ChatId,
    status_id: MessageId,
    force: bool,
    is_private: bool,
) {
    let progress = MessageProgress {
        bot: bot.clone(),
        chat_id,
        message_id: status_id,
    };
    let attempt = match state
        .orchestrator()
        .run_build(chat_id.0, force, &progress)
        .await
    {
        Ok(attempt) => attempt,
        Err(err) => {
            error!(error = %err, chat_id = chat_id.0, "build attempt aborted");
            edit_text(&bot, chat_id, status_id, "Internal error while building. Please try again later").await;
            return;
        }
    };

    match attempt.outcome {
        BuildOutcome::Skipped { revision, .. } => {
            info!(chat_id = chat_id.0, %revision, "source unchanged, offering cached apk");
            let keyboard = InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback("Yes!", CallbackAction::SendBuilt.encode()),
                InlineKeyboardButton::callback("No", CallbackAction::Dismiss.encode()),
            ]]);
            edit_text_with_keyboard(
                &bot,
                chat_id,
                status_id,
                "An already built app is available for the latest source.\nDo you want to send the app?",
                keyboard,
            )
            .await;
        }
        BuildOutcome::Success { revision, artifact } => {
            info!(chat_id = chat_id.0, %revision, "build succeeded");
            send_file(&bot, &state, chat_id, &artifact).await;
            edit_text(&bot, chat_id, status_id, "App built and sent!").await;
        }
        BuildOutcome::Failed(failure) => {
            report_failure(&bot, &state, chat_id, status_id, is_private, failure).await;
        }
    }
}

async fn report_failure(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    status_id: MessageId,
    is_private: bool,
    failure: BuildFailure,
) {
    warn!(chat_id = chat_id.0, error = %failure, "build failed");
    match failure {
        BuildFailure::Build { .. } => {
            edit_text(bot, chat_id, status_id, "Building apk failed").await;
            offer_log(bot, state, chat_id, is_private).await;
        }
        other => edit_text(bot, chat_id, status_id, &other.to_string()).await,
    }
}

/// Offer the gradle error log after a failed build. Documents cannot be
/// pushed into a group without consent, so group chats get a deep link into
/// the bot's private chat instead of an immediate upload.
async fn offer_log(bot: &Bot, state: &BotState, chat_id: ChatId, is_private: bool) {
    let token = state.log_tokens().issue(chat_id.0);
    let prompt = "An error has occurred while building the app. Do you want me to send the log?";

    let keyboard = if is_private {
        InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("Yes!", CallbackAction::SendLog { token }.encode()),
            InlineKeyboardButton::callback("No", CallbackAction::DismissLog.encode()),
        ]])
    } else {
        let Some(username) = state.username() else {
            warn!("bot username unknown, cannot build log deep link");
            return;
        };
        let link = format!("https://telegram.me/{username}?start=sendlog_{token}");
        let Ok(url) = Url::parse(&link) else {
            warn!(%link, "malformed log deep link");
            return;
        };
        InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::url("Yes!", url),
            InlineKeyboardButton::callback("No", CallbackAction::DismissLog.encode()),
        ]])
    };

    if let Err(err) = bot.send_message(chat_id, prompt).reply_markup(keyboard).await {
        warn!(error = %err, chat_id = chat_id.0, "failed to offer build log");
    }
}

pub async fn handle_callback(
    bot: Bot,
    query: CallbackQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let _ = bot.answer_callback_query(query.id.clone()).await;

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let Some(action) = CallbackAction::decode(data) else {
        warn!(data, "unrecognized callback data");
        return Ok(());
    };
    let Some(message) = query.message.as_ref() else {
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat().id, message.id());

    match action {
        CallbackAction::SendBuilt => {
            send_cached_apk(&bot, &state, chat_id, message_id).await;
        }
        CallbackAction::Dismiss => {
            edit_text(&bot, chat_id, message_id, "Ok! The app won't be sent").await;
        }
        CallbackAction::SendLog { token } => {
            edit_text(&bot, chat_id, message_id, "Log is being sent").await;
            deliver_log(&bot, &state, chat_id, &token).await?;
        }
        CallbackAction::DismissLog => {
            edit_text(&bot, chat_id, message_id, "Log will not be sent").await;
        }
        CallbackAction::SetAdminOnly { enable, user_id } => {
            apply_admin_only(&bot, &state, chat_id, message_id, enable, UserId(user_id)).await;
        }
    }
    Ok(())
}

async fn send_cached_apk(bot: &Bot, state: &BotState, chat_id: ChatId, message_id: MessageId) {
    let target = match state.target(chat_id.0) {
        Ok(target) => target,
        Err(err) => {
            error!(error = %err, chat_id = chat_id.0, "failed to load build target");
            None
        }
    };
    let artifact = target.and_then(|t| {
        if !t.has_built() {
            return None;
        }
        t.repo
            .as_ref()
            .map(|repo| state.orchestrator().built_artifact(repo, &t.last_built_revision))
    });
    match artifact {
        Some(path) if path.exists() => {
            edit_text(bot, chat_id, message_id, "App is being sent!").await;
            send_file(bot, state, chat_id, &path).await;
        }
        _ => {
            edit_text(
                bot,
                chat_id,
                message_id,
                "No built app found for the latest source. Run /build first",
            )
            .await;
        }
    }
}

async fn apply_admin_only(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    enable: bool,
    user_id: UserId,
) {
    // Only the user who has admin rights may flip the switch; anyone in the
    // chat can press the button.
    if !state.admins().is_admin_user(bot, chat_id, user_id).await {
        edit_text(bot, chat_id, message_id, NO_PERMISSION).await;
        return;
    }
    match state.store().set_admin_only(chat_id.0, enable) {
        Ok(()) => {
            let text = if enable {
                "Only admins can execute /build from now on!"
            } else {
                "Anyone can execute /build from now on!"
            };
            edit_text(bot, chat_id, message_id, text).await;
        }
        Err(err) => {
            warn!(error = %err, chat_id = chat_id.0, "failed to persist admin-only flag");
            edit_text(bot, chat_id, message_id, "No repo set. Set a repo using /setrepo first").await;
        }
    }
}

/// Redeem a log token and deliver the gradle error log into `chat_id`.
async fn deliver_log(
    bot: &Bot,
    state: &BotState,
    chat_id: ChatId,
    token: &str,
) -> ResponseResult<()> {
    let Some(source_chat) = state.log_tokens().redeem(token) else {
        bot.send_message(chat_id, "That log link is invalid or has expired")
            .await?;
        return Ok(());
    };
    let log = match state.build_log(source_chat) {
        Ok(Some(path)) if log_has_content(&path) => path,
        _ => {
            bot.send_message(chat_id, "No build log found").await?;
            return Ok(());
        }
    };
    send_file(bot, state, chat_id, &log).await;
    Ok(())
}

/// A log is only sendable when it exists and is non-empty.
fn log_has_content(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Send a document, remapping the stored chat id and retrying once if the
/// group was migrated to a supergroup.
async fn send_file(bot: &Bot, state: &BotState, chat_id: ChatId, path: &Path) {
    match bot.send_document(chat_id, InputFile::file(path.to_path_buf())).await {
        Ok(_) => {}
        Err(RequestError::MigrateToChatId(new_chat)) => {
            info!(old = chat_id.0, new = new_chat.0, "chat migrated, remapping build target");
            if let Err(err) = state.store().migrate_chat_id(chat_id.0, new_chat.0) {
                error!(error = %err, "failed to migrate build target");
            }
            if let Err(err) = bot
                .send_document(new_chat, InputFile::file(path.to_path_buf()))
                .await
            {
                warn!(error = %err, chat_id = new_chat.0, "failed to send document after migration");
            }
        }
        Err(err) => {
            warn!(error = %err, chat_id = chat_id.0, path = %path.display(), "failed to send document");
        }
    }
}

/// Best-effort status edit. Telegram rejects edits that do not change the
/// text, so errors here are logged and swallowed.
async fn edit_text(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: &str) {
    if let Err(err) = bot.edit_message_text(chat_id, message_id, text).await {
        warn!(error = %err, chat_id = chat_id.0, "failed to edit status message");
    }
}

/// Same best-effort edit, attaching an inline keyboard.
async fn edit_text_with_keyboard(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) {
    if let Err(err) = bot
        .edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await
    {
        warn!(error = %err, chat_id = chat_id.0, "failed to edit status message");
    }
}

/// Progress sink that edits the status message as the build advances.
struct MessageProgress {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

#[async_trait]
impl BuildProgress for MessageProgress {
    async fn update(&self, phase: BuildPhase) {
        let text = match phase {
            BuildPhase::Syncing => "Repo syncing...",
            BuildPhase::Building => "Building apk...",
            BuildPhase::Sending => "Sending apk...",
        };
        edit_text(&self.bot, self.chat_id, self.message_id, text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn repo(s: &str) -> RepoRef {
        s.parse().unwrap()
    }

    #[test]
    fn force_build_requires_admin() {
        assert_eq!(build_permitted(true, false, false), Some(NO_PERMISSION));
        assert_eq!(build_permitted(true, false, true), None);
    }

    #[test]
    fn admin_only_flag_gates_plain_builds() {
        assert_eq!(
            build_permitted(false, true, false),
            Some("Only admins can build repo!")
        );
        assert_eq!(build_permitted(false, true, true), None);
    }

    #[test]
    fn anyone_may_build_when_flag_is_off() {
        assert_eq!(build_permitted(false, false, false), None);
        assert_eq!(build_permitted(false, false, true), None);
    }

    #[test]
    fn rejected_verification_stores_nothing() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        for check in [
            RepoCheck::NotFound,
            RepoCheck::BadCredentials,
            RepoCheck::Unknown(500),
        ] {
            let stored = persist_checked_repo(&store, 42, repo("octo/demo"), check).unwrap();
            assert_eq!(stored, None, "{:?} must not persist", check);
        }
        assert!(store.load(42).unwrap().is_none());
    }

    #[test]
    fn verified_repo_is_stored() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        let stored =
            persist_checked_repo(&store, 42, repo("octo/demo"), RepoCheck::Exists).unwrap();
        assert_eq!(stored, Some(false), "first set creates the record");
        assert_eq!(store.load(42).unwrap().unwrap().repo, Some(repo("octo/demo")));
    }

    #[test]
    fn empty_or_missing_log_is_not_sendable() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("error.log");

        assert!(!log_has_content(&log), "missing log");
        fs::write(&log, b"").unwrap();
        assert!(!log_has_content(&log), "zero-byte log");
        fs::write(&log, b"Execution failed").unwrap();
        assert!(log_has_content(&log));
    }
}
