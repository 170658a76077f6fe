//! Interactive terminal front end built on `dialoguer`. It only gathers the
//! three inputs of a clone run and prints the resulting report.

use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use tracing::info;

use crate::config::Config;
use crate::profile::{ProfileStore, ShopProfile};
use crate::workflow::{self, parse_item_id, CloneOutcome, CloneReport, CloneRequest};

const MENU_ITEMS: [&str; 3] = ["Clone a single product", "Register a new shop", "Exit"];

/// Show the main menu, run the chosen action once, then return.
pub async fn main_menu(cfg: &Config) -> Result<bool> {
    println!("\nShopee Product Cloner v{}", env!("CARGO_PKG_VERSION"));
    let selection = Select::new()
        .with_prompt("Select an option")
        .items(&MENU_ITEMS)
        .default(0)
        .interact_opt()?;

    match selection {
        Some(0) => clone_product_flow(cfg).await,
        Some(1) => {
            println!("\nRun `shop-auth` from your terminal to register a new shop.");
            Ok(true)
        }
        _ => {
            println!("Exiting...");
            Ok(true)
        }
    }
}

/// Prompt for a profile, a source item id and a shop code, then clone.
/// Returns whether the clone completed.
pub async fn clone_product_flow(cfg: &Config) -> Result<bool> {
    let store = ProfileStore::from_config(cfg).context("failed to load shop profiles")?;
    let Some((name, profile)) = select_profile(&store)? else {
        return Ok(false);
    };
    println!("\nCloning products for shop: {}", profile.shop_name);
    info!(profile = %name, "profile selected");

    let item_id: String = Input::new()
        .with_prompt("Enter the source product ID to clone")
        .validate_with(|input: &String| validate_item_id(input))
        .interact_text()?;
    let shop_code: String = Input::new()
        .with_prompt("Enter the ShopCode for the new cover image (e.g., ONE)")
        .validate_with(|input: &String| validate_shop_code(input))
        .interact_text()?;

    let request = CloneRequest::parse(&item_id, &shop_code)?;
    let report = workflow::run_for_profile(cfg, &profile, &request).await?;
    print_report(&report);
    Ok(report.is_success())
}

fn select_profile(store: &ProfileStore) -> Result<Option<(String, ShopProfile)>> {
    if store.is_empty() {
        println!("No user profiles found!");
        println!("Please run `shop-auth` first to register a shop.");
        return Ok(None);
    }

    let entries: Vec<(&str, &ShopProfile)> = store.iter().collect();
    let labels: Vec<String> = entries
        .iter()
        .map(|(name, profile)| profile_label(name, profile))
        .collect();
    let choice = Select::new()
        .with_prompt("Select a profile to use")
        .items(&labels)
        .default(0)
        .interact_opt()?;

    Ok(choice
        .and_then(|i| entries.get(i))
        .map(|(name, profile)| {
            println!("Using profile: {}", name);
            (name.to_string(), (*profile).clone())
        }))
}

pub fn profile_label(name: &str, profile: &ShopProfile) -> String {
    format!("{} (Shop: {})", name, profile.shop_name)
}

fn validate_item_id(input: &str) -> Result<(), String> {
    parse_item_id(input).map(|_| ()).map_err(|e| e.to_string())
}

fn validate_shop_code(input: &str) -> Result<(), String> {
    CloneRequest::new(1, input).map(|_| ()).map_err(|e| e.to_string())
}

pub fn print_report(report: &CloneReport) {
    println!();
    for line in &report.log {
        println!("{}", line);
    }
    match &report.outcome {
        CloneOutcome::Completed { published_item_id, .. } => {
            println!("\nDone: item {} is live.", published_item_id);
        }
        CloneOutcome::Aborted { step, reason, .. } => {
            println!("\nFailed at {}: {}", step, reason);
        }
    }
}
