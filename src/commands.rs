use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use provider_directory::blog;
use provider_directory::discover::{self, Target};
use provider_directory::import::{self, ImportKind, RowOutcome, csv_rows};
use provider_directory::llm::ExtractionService;
use provider_directory::model::{BlogPost, PostStatus, Provider};
use provider_directory::pricing;
use provider_directory::refresh::{RefreshBoard, RowState};
use provider_directory::runner::{SequentialRunner, progress_bar};
use provider_directory::server::{self, AppState};
use provider_directory::store::{EntityKind, EntityStore, Record, decode_all, record_id, record_str};

use crate::cli::{
    ApplyArgs, BlogCommand, BlogSaveArgs, ImportArgs, SampleCsvArgs, ServeArgs, SetPriceArgs,
};

pub async fn serve<S: EntityStore + 'static>(store: S, args: ServeArgs) -> Result<()> {
    server::run(AppState::new(store), &args.host, args.port).await
}

pub fn sample_csv(args: SampleCsvArgs) -> Result<()> {
    let body = import::sample_csv(args.kind.into());
    match args.output {
        Some(path) => {
            std::fs::write(&path, body).with_context(|| format!("write {}", path))?;
            println!("Wrote {}", path);
        }
        None => print!("{body}"),
    }
    Ok(())
}

async fn load_rows<E: ExtractionService>(
    llm: &E,
    args: &ImportArgs,
    kind: ImportKind,
) -> Result<Vec<Record>> {
    let path = Path::new(&args.csv);
    if args.local {
        return csv_rows::read_rows(path, kind);
    }
    Ok(import::extract_rows(llm, path, kind).await?)
}

async fn list_providers<S: EntityStore>(store: &S) -> Result<Vec<Record>> {
    store
        .list(EntityKind::Provider, None, None)
        .await
        .context("Failed loading providers")
}

pub async fn import_providers<S: EntityStore, E: ExtractionService>(
    store: &S,
    llm: &E,
    args: ImportArgs,
) -> Result<()> {
    let rows = load_rows(llm, &args, ImportKind::Providers).await?;
    tracing::info!("read {} provider rows from {}", rows.len(), args.csv);

    if !args.apply {
        let existing = list_providers(store).await?;
        for outcome in import::preview_provider_import(&existing, &rows) {
            match outcome {
                RowOutcome::Create { name } => println!("create  {name}"),
                RowOutcome::Update { name, id } => println!("update  {name} ({id})"),
                RowOutcome::Skip { reason } => println!("skip    {reason}"),
            }
        }
        println!("Dry run over {} rows. Pass --apply to write.", rows.len());
        return Ok(());
    }

    let report = import::import_providers(store, &rows).await?;
    println!("{}", report.message());
    Ok(())
}

pub async fn import_pricing<S: EntityStore, E: ExtractionService>(
    store: &S,
    llm: &E,
    args: ImportArgs,
) -> Result<()> {
    let rows = load_rows(llm, &args, ImportKind::Pricing).await?;
    tracing::info!("read {} pricing rows from {}", rows.len(), args.csv);
    let existing = list_providers(store).await?;
    let plan = import::plan_pricing_import(&existing, &rows);

    if !args.apply {
        for pending in plan.updates.values() {
            println!("{}: {} prices", pending.provider_name, pending.entries);
        }
        if plan.skipped > 0 {
            println!("skipped {} incomplete rows", plan.skipped);
        }
        if !plan.unmatched.is_empty() {
            println!("no provider named: {}", plan.unmatched.join(", "));
        }
        println!(
            "Dry run: {} providers, {} price entries. Pass --apply to write.",
            plan.updates.len(),
            plan.price_entries
        );
        return Ok(());
    }

    let report = import::pricing::apply_pricing_plan(store, plan).await;
    println!("{}", report.message());
    Ok(())
}

pub async fn round_prices<S: EntityStore>(store: &S) -> Result<()> {
    let report = pricing::round_all_prices(store).await?;
    println!("{}", report.message());
    Ok(())
}

pub async fn set_price<S: EntityStore>(store: &S, args: SetPriceArgs) -> Result<()> {
    let providers = list_providers(store).await?;
    let wanted = args.provider.trim();
    let provider = providers
        .iter()
        .find(|p| record_id(p).as_deref() == Some(wanted))
        .or_else(|| {
            providers.iter().find(|p| {
                record_str(p, "name").is_some_and(|n| n.trim().eq_ignore_ascii_case(wanted))
            })
        })
        .ok_or_else(|| anyhow!("no provider with id or name {:?}", wanted))?;
    let id = record_id(provider).ok_or_else(|| anyhow!("provider {:?} has no id", wanted))?;

    let price = if args.clear { None } else { args.price };
    let mut medications = pricing::medications_of(provider);
    pricing::set_price(&mut medications, &args.medication, &args.dosage, price);
    pricing::save_pricing(store, &id, &medications)
        .await
        .context("Failed to save pricing")?;

    match price {
        Some(p) => println!(
            "Saved {} {} at £{} for {}",
            args.medication,
            args.dosage,
            pricing::round_price(p),
            record_str(provider, "name").unwrap_or(id.as_str())
        ),
        None => println!("Cleared {} {}", args.medication, args.dosage),
    }
    Ok(())
}

pub async fn refresh_all<S: EntityStore, E: ExtractionService>(
    store: &S,
    llm: &E,
    args: ApplyArgs,
) -> Result<()> {
    let mut board = RefreshBoard::load(store)
        .await
        .context("Failed loading providers")?;
    let runner =
        SequentialRunner::default().with_progress(progress_bar("REFRESH", board.rows().len()));
    let summary = board.refresh_all(llm, &runner).await;

    for (id, proposal) in board.pending() {
        let name = board.row(id).map(|r| r.name()).unwrap_or(id);
        println!("{name}: {}", Value::Object(proposal.clone()));
    }
    for row in board.rows() {
        if let RowState::Error { message, .. } = row.state() {
            println!("{}: {}", row.name(), message);
        }
    }
    println!(
        "{} with changes, {} up to date, {} failed.",
        summary.proposals, summary.up_to_date, summary.failed
    );

    if args.apply && summary.proposals > 0 {
        let report = board.save_all(store).await;
        println!("{}", report.message());
    }
    Ok(())
}

pub async fn find_missing<S: EntityStore, E: ExtractionService>(
    store: &S,
    llm: &E,
    target: Target,
    args: ApplyArgs,
) -> Result<()> {
    let providers: Vec<Provider> = decode_all(EntityKind::Provider, list_providers(store).await?);
    let targets = discover::candidates(target, &providers);
    if targets.is_empty() {
        println!("Every provider already has a {}.", target.field());
        return Ok(());
    }

    let label = match target {
        Target::Image => "IMAGES",
        Target::Website => "WEBSITES",
    };
    let runner = SequentialRunner::default().with_progress(progress_bar(label, targets.len()));
    let findings = discover::find_all(llm, target, &targets, &runner).await;
    for finding in &findings {
        match &finding.result {
            Ok(url) => println!("{}: {}", finding.provider_name, url),
            Err(e) => println!("{}: {}", finding.provider_name, e),
        }
    }

    if args.apply {
        let report = discover::save_findings(store, target, &findings).await;
        for (name, error) in &report.failed {
            println!("{name}: {error}");
        }
        println!("{}", report.message(target));
    }
    Ok(())
}

pub async fn manage_blog<S: EntityStore>(store: &S, cmd: BlogCommand) -> Result<()> {
    match cmd {
        BlogCommand::List => {
            for post in blog::list_all(store).await.context("Failed loading posts")? {
                let status = if post.is_published() { "published" } else { "draft" };
                let date = post
                    .published_date
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    post.id.as_deref().unwrap_or("-"),
                    status,
                    date,
                    post.slug,
                    post.title
                );
            }
            Ok(())
        }
        BlogCommand::Save(args) => save_post(store, args).await,
        BlogCommand::Delete { id } => {
            blog::delete_post(store, &id)
                .await
                .context("Failed to delete post")?;
            println!("Deleted {id}");
            Ok(())
        }
    }
}

async fn save_post<S: EntityStore>(store: &S, args: BlogSaveArgs) -> Result<()> {
    let mut post = match args.id.as_deref() {
        Some(id) => blog::get_post(store, id)
            .await
            .with_context(|| format!("Failed loading post {id}"))?,
        None => BlogPost::draft(chrono::Local::now().date_naive()),
    };
    post.set_title(&args.title);
    post.content = std::fs::read_to_string(&args.content_file)
        .with_context(|| format!("read {}", args.content_file))?;
    if let Some(slug) = args.slug {
        post.slug = slug;
    }
    if let Some(excerpt) = args.excerpt {
        post.excerpt = excerpt;
    }
    if let Some(tags) = args.tags.as_deref() {
        post.set_tags_input(tags);
    }
    if args.publish {
        post.status = PostStatus::Published;
    }

    let saved = blog::save_post(store, &post)
        .await
        .context("Failed to save post")?;
    println!(
        "Saved {} ({})",
        saved.slug,
        saved.id.as_deref().unwrap_or("-")
    );
    Ok(())
}
