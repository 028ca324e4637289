//! DroidForge Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p droidforge-telegram
//! ```

use clap::Parser;
use droidforge_core::config;
use droidforge_telegram::DroidForgeBot;
use tracing_subscriber::EnvFilter;

/// DroidForge - build Android apps from Telegram
#[derive(Parser, Debug)]
#[command(name = "droidforge")]
#[command(about = "Telegram bot that syncs a GitHub repo and builds its apk on command")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load environment variables from the state directory first, then any
    // local .env for development setups.
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::dotenv();

    let filter = match args.verbose {
        0 => "droidforge_telegram=info,droidforge_orchestrator=info,droidforge_git=info,droidforge_builder=info,teloxide=warn",
        1 => "droidforge_telegram=debug,droidforge_orchestrator=debug,droidforge_git=debug,droidforge_builder=debug,teloxide=info",
        2 => "droidforge_telegram=trace,droidforge_orchestrator=trace,droidforge_git=trace,droidforge_builder=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let bot = DroidForgeBot::new(
        &config::state_dir(),
        config::repos_dir(),
        config::git_credentials(),
    )?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] DroidForge Bot");
            println!("   Bot: @{}", username);
            println!("   Repos: {}", config::repos_dir().display());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /build to build your repo");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
