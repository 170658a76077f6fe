use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use shopee_cloner::config;
use shopee_cloner::web;

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve the product clone web form")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override `web.bind`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load_or_default(Some(&args.config))?;
    if let Some(bind) = args.bind {
        cfg.web.bind = bind;
    }
    web::serve(cfg).await
}
