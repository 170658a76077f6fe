use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use std::path::PathBuf;
use tracing::info;

use shopee_cloner::auth::{self, Registration};
use shopee_cloner::config;
use shopee_cloner::profile::{self, ProfileStore};
use shopee_cloner::shopee::{now_timestamp, PartnerCredentials};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Authorize a Shopee shop and save it as a named profile"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load_or_default(Some(&args.config))?;

    // Registration always writes the file, even when a secret variable is set.
    let mut store = ProfileStore::load(cfg.profiles_path())?;
    println!("--- Shopee Shop Authorization Utility ---");

    let partner = prompt_partner(cfg.default_partner())?;
    let url = auth::auth_partner_url(&cfg.shopee, &partner, now_timestamp())?;
    println!("\nSTEP 1: Open this URL in your browser and log in to the shop you want to authorize:\n");
    println!("{}\n", url);
    println!("After authorizing, you will be redirected. Copy `code` and `shop_id` from the new URL.");

    let code: String = Input::new()
        .with_prompt("STEP 2: Paste the `code`")
        .validate_with(|v: &String| {
            if v.trim().is_empty() {
                Err("code must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    let shop_id: i64 = Input::new()
        .with_prompt("STEP 3: Paste the `shop_id`")
        .validate_with(|v: &i64| {
            if *v > 0 {
                Ok(())
            } else {
                Err("shop_id must be positive")
            }
        })
        .interact_text()?;

    // Everything the save needs is checked here; the code is single-use.
    let profile_name: String = Input::new()
        .with_prompt("Profile name for this shop (e.g., my_sg_shop)")
        .validate_with(|v: &String| {
            profile::validate_name(v).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    let profile_name = profile::validate_name(&profile_name)?.to_string();
    if store.get(&profile_name).is_ok()
        && !Confirm::new()
            .with_prompt(format!("Profile '{}' exists. Overwrite?", profile_name))
            .default(false)
            .interact()?
    {
        println!("Aborted; nothing saved.");
        return Ok(());
    }
    let image_hosting_url: String = Input::new()
        .with_prompt("Public base URL where your images are hosted")
        .validate_with(|v: &String| {
            profile::validate_hosting_url(v).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    let image_hosting_url = profile::validate_hosting_url(&image_hosting_url)?;

    let profile = auth::register_shop(
        &cfg.shopee,
        Registration {
            partner,
            code: code.trim().to_string(),
            shop_id,
            image_hosting_url,
        },
    )
    .await
    .context("shop registration failed")?;

    let shop_name = profile.shop_name.clone();
    store.insert(&profile_name, profile)?;
    store.save()?;
    info!(profile = %profile_name, %shop_name, "profile saved");

    if let Some(path) = store.path() {
        println!(
            "\nProfile '{}' for shop '{}' saved to {}.",
            profile_name,
            shop_name,
            path.display()
        );
    }
    Ok(())
}

fn prompt_partner(default: Option<PartnerCredentials>) -> Result<PartnerCredentials> {
    if let Some(partner) = default {
        let use_default = Confirm::new()
            .with_prompt(format!("Use configured partner id {}?", partner.partner_id()))
            .default(true)
            .interact()?;
        if use_default {
            return Ok(partner);
        }
    }

    let partner_id: i64 = Input::new()
        .with_prompt("Enter your Partner ID")
        .validate_with(|v: &i64| {
            if *v > 0 {
                Ok(())
            } else {
                Err("partner id must be positive")
            }
        })
        .interact_text()?;
    let partner_key = Password::new()
        .with_prompt("Enter your Partner Key")
        .interact()?;
    if partner_key.trim().is_empty() {
        bail!("partner key must not be empty");
    }
    Ok(PartnerCredentials::new(partner_id, partner_key.trim().to_string()))
}
