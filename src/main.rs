mod cli;
mod commands;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use provider_directory::auth::{AccessOutcome, Session, User, gate_admin};
use provider_directory::constants::USER_AGENT;
use provider_directory::discover::Target;
use provider_directory::llm::HttpExtraction;
use provider_directory::store::http::BackendConfig;
use provider_directory::store::{EntityStore, HttpStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = cli::Args::parse();
    let backend = args.backend;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(backend.timeout_secs))
        .build()
        .context("build http client")?;
    let config = BackendConfig {
        base_url: backend.api_base_url,
        app_id: backend.app_id,
        token: backend.api_token,
        max_retries: backend.max_retries,
    };
    let llm = HttpExtraction::new(client.clone(), config.clone());

    match backend.seed {
        Some(path) => {
            let mut store = MemoryStore::from_seed_file(Path::new(&path))?;
            if let Some(email) = backend.seed_admin.as_deref() {
                store = store.with_user(User::admin(email));
            }
            dispatch(store, &llm, args.cmd).await
        }
        None => {
            if config.app_id.is_empty() {
                anyhow::bail!("--app-id (or DIRECTORY_APP_ID) is required without --seed");
            }
            dispatch(HttpStore::new(client, config), &llm, args.cmd).await
        }
    }
}

async fn dispatch<S: EntityStore + Session + 'static>(
    store: S,
    llm: &HttpExtraction,
    cmd: cli::Command,
) -> anyhow::Result<()> {
    use cli::Command;

    let public = matches!(cmd, Command::Serve(_) | Command::SampleCsv(_));
    if !public {
        match gate_admin(&store).await {
            AccessOutcome::Granted(user) => {
                tracing::info!("signed in as {}", user.email.as_deref().unwrap_or("admin"));
            }
            AccessOutcome::Redirect => {
                tracing::warn!("admin access required; nothing was changed");
                return Ok(());
            }
        }
    }

    match cmd {
        Command::Serve(cmd) => commands::serve(store, cmd).await.context("serve failed"),
        Command::SampleCsv(cmd) => commands::sample_csv(cmd).context("sample-csv failed"),
        Command::ImportProviders(cmd) => commands::import_providers(&store, llm, cmd)
            .await
            .context("import-providers failed"),
        Command::ImportPricing(cmd) => commands::import_pricing(&store, llm, cmd)
            .await
            .context("import-pricing failed"),
        Command::RoundPrices => commands::round_prices(&store)
            .await
            .context("round-prices failed"),
        Command::SetPrice(cmd) => commands::set_price(&store, cmd)
            .await
            .context("set-price failed"),
        Command::RefreshAll(cmd) => commands::refresh_all(&store, llm, cmd)
            .await
            .context("refresh-all failed"),
        Command::FindImages(cmd) => commands::find_missing(&store, llm, Target::Image, cmd)
            .await
            .context("find-images failed"),
        Command::FindWebsites(cmd) => commands::find_missing(&store, llm, Target::Website, cmd)
            .await
            .context("find-websites failed"),
        Command::Blog(cmd) => commands::manage_blog(&store, cmd).await.context("blog failed"),
    }
}
