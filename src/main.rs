use anyhow::Result;
use clap::Parser;

use pricewatcher::app;
use pricewatcher::config::Config;

#[derive(Parser, Debug)]
#[command(version, about = "Telegram price watcher for marketplace products")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Cron expression for scheduled checks (overrides config)
    #[arg(long)]
    cron: Option<String>,

    /// IANA timezone for the schedule (overrides config)
    #[arg(long)]
    timezone: Option<String>,

    /// Max concurrent price checks (overrides config)
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Telegram bot token (overrides config)
    #[arg(long)]
    bot_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        Config::default()
    };

    // CLI args take priority over the config file
    if let Some(cron) = args.cron {
        config.worker.check_cron = cron;
    }
    if let Some(timezone) = args.timezone {
        config.worker.timezone = timezone;
    }
    if let Some(max_parallel) = args.max_parallel {
        config.worker.max_parallel = max_parallel;
    }
    if let Some(bot_token) = args.bot_token {
        config.notifications.bot_token = bot_token;
    }

    app::run(config).await
}
