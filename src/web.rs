//! Web form front end.
//!
//! One page with the profile select, source item id and shop code. Posting
//! it runs a clone and re-renders the page with the run log and an outcome
//! banner taken from [`CloneReport::is_success`].

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::profile::ProfileStore;
use crate::shopee::ShopeeError;
use crate::workflow::{self, CloneReport, CloneRequest};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<Config>,
    profiles: Arc<ProfileStore>,
}

impl AppState {
    pub fn new(cfg: Config, profiles: ProfileStore) -> Self {
        Self {
            cfg: Arc::new(cfg),
            profiles: Arc::new(profiles),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("template error: {0}")]
    Render(#[from] askama::Error),
    #[error("platform client error: {0}")]
    Client(#[from] ShopeeError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!(error = %self, "web request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CloneForm {
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub source_item_id: String,
    #[serde(default)]
    pub shop_code: String,
}

struct ProfileOption {
    name: String,
    label: String,
    selected: bool,
}

enum Banner {
    Success(String),
    Failure(String),
    Warning(String),
}

impl Banner {
    fn class(&self) -> &'static str {
        match self {
            Banner::Success(_) => "success",
            Banner::Failure(_) => "failure",
            Banner::Warning(_) => "warning",
        }
    }

    fn message(&self) -> &str {
        match self {
            Banner::Success(m) | Banner::Failure(m) | Banner::Warning(m) => m,
        }
    }
}

#[derive(Template)]
#[template(path = "clone.html")]
struct ClonePage<'a> {
    profiles: Vec<ProfileOption>,
    source_item_id: &'a str,
    shop_code: &'a str,
    banner: Option<Banner>,
    log: Vec<String>,
}

impl<'a> ClonePage<'a> {
    fn new(state: &AppState, form: &'a CloneForm) -> Self {
        let profiles = state
            .profiles
            .iter()
            .map(|(name, profile)| ProfileOption {
                name: name.to_string(),
                label: crate::menu::profile_label(name, profile),
                selected: name == form.profile,
            })
            .collect();
        Self {
            profiles,
            source_item_id: &form.source_item_id,
            shop_code: &form.shop_code,
            banner: None,
            log: Vec::new(),
        }
    }

    fn with_banner(mut self, banner: Banner) -> Self {
        self.banner = Some(banner);
        self
    }

    fn with_report(self, report: &CloneReport) -> Self {
        let banner = if report.is_success() {
            Banner::Success("Cloning process completed successfully!".to_string())
        } else {
            Banner::Failure(
                "The process finished, but an error occurred. Please check the log below."
                    .to_string(),
            )
        };
        Self {
            log: report.log.clone(),
            ..self.with_banner(banner)
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(clone_page))
        .route("/clone", post(submit_clone))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Bind `web.bind` and serve until ctrl-c. Profiles are loaded once at
/// startup.
pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let profiles = ProfileStore::from_config(&cfg)?;
    if profiles.is_empty() {
        warn!("no shop profiles found; run `shop-auth` to register a shop");
    }
    let listener = TcpListener::bind(&cfg.web.bind).await?;
    info!(addr = %listener.local_addr()?, profiles = profiles.len(), "web form listening");

    axum::serve(listener, router(AppState::new(cfg, profiles)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

async fn clone_page(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    let form = CloneForm::default();
    Ok(Html(ClonePage::new(&state, &form).render()?))
}

async fn submit_clone(
    State(state): State<AppState>,
    Form(form): Form<CloneForm>,
) -> Result<Response, WebError> {
    let page = ClonePage::new(&state, &form);

    if form.source_item_id.trim().is_empty() || form.shop_code.trim().is_empty() {
        let page = page.with_banner(Banner::Warning(
            "Please provide both a Source Product ID and a Shop Code before starting.".into(),
        ));
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response());
    }

    let profile = match state.profiles.get(&form.profile) {
        Ok(profile) => profile,
        Err(err) => {
            let page = page.with_banner(Banner::Failure(err.to_string()));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response());
        }
    };

    let request = match CloneRequest::parse(&form.source_item_id, &form.shop_code) {
        Ok(request) => request,
        Err(err) => {
            let page = page.with_banner(Banner::Failure(err.to_string()));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page.render()?)).into_response());
        }
    };

    info!(profile = %form.profile, item_id = request.source_item_id, "clone requested from web form");
    let report = workflow::run_for_profile(&state.cfg, profile, &request).await?;
    info!(run_id = %report.run_id, success = report.is_success(), "clone finished");

    Ok(Html(page.with_report(&report).render()?).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ShopProfile;

    fn state_with_profile() -> AppState {
        let json = serde_json::to_string(&std::collections::BTreeMap::from([(
            "my_sg_shop".to_string(),
            ShopProfile {
                shop_id: 55,
                partner_id: 1,
                partner_key: "k".into(),
                access_token: "t".into(),
                refresh_token: "r".into(),
                shop_name: "Unisia SG".into(),
                image_hosting_url: "https://img.example.com".into(),
            },
        )]))
        .unwrap();
        AppState::new(
            Config::default(),
            ProfileStore::from_secret("shopee_profiles", &json).unwrap(),
        )
    }

    #[test]
    fn page_lists_profiles_and_keeps_input() {
        let state = state_with_profile();
        let form = CloneForm {
            profile: "my_sg_shop".into(),
            source_item_id: "42".into(),
            shop_code: "SGM".into(),
        };
        let html = ClonePage::new(&state, &form).render().unwrap();
        assert!(html.contains("my_sg_shop (Shop: Unisia SG)"));
        assert!(html.contains("value=\"42\""));
        assert!(html.contains("selected"));
    }

    #[test]
    fn page_without_profiles_shows_notice() {
        let state = AppState::new(
            Config::default(),
            ProfileStore::from_secret("shopee_profiles", "{}").unwrap(),
        );
        let form = CloneForm::default();
        let html = ClonePage::new(&state, &form).render().unwrap();
        assert!(html.contains("No shop profiles found"));
    }

    #[test]
    fn log_lines_are_escaped() {
        let state = state_with_profile();
        let form = CloneForm::default();
        let page = ClonePage {
            log: vec!["<script>".into()],
            ..ClonePage::new(&state, &form)
        };
        let html = page.render().unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
