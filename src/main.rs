use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use shopee_cloner::config;
use shopee_cloner::menu;
use shopee_cloner::profile::ProfileStore;
use shopee_cloner::workflow::{self, CloneRequest};

#[derive(Debug, Parser)]
#[command(author, version, about = "Clone a Shopee product under a new cover image")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive menu (default)
    Menu,
    /// Clone one product without prompting
    Clone {
        /// Saved profile name
        #[arg(long)]
        profile: String,
        /// Source product id
        #[arg(long)]
        item_id: String,
        /// Shop code used in the new cover image file name
        #[arg(long)]
        shop_code: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load_or_default(Some(&args.config))?;

    let success = match args.command.unwrap_or(Command::Menu) {
        Command::Menu => menu::main_menu(&cfg).await?,
        Command::Clone {
            profile,
            item_id,
            shop_code,
        } => {
            let store = ProfileStore::from_config(&cfg)?;
            let profile = store.get(&profile)?;
            let request = CloneRequest::parse(&item_id, &shop_code)?;
            info!(item_id = request.source_item_id, shop_code = %request.shop_code, "starting clone");
            let report = workflow::run_for_profile(&cfg, profile, &request).await?;
            menu::print_report(&report);
            report.is_success()
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
