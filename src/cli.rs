use clap::{Parser, Subcommand, ValueEnum};

use provider_directory::constants::DEFAULT_API_BASE_URL;
use provider_directory::import::ImportKind;

#[derive(Parser, Debug)]
#[command(name = "provider-directory")]
#[command(about = "UK weight-loss provider directory: public API and admin tools", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BackendArgs {
    /// Hosted backend API root.
    #[arg(long, global = true, env = "DIRECTORY_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Application id on the hosted backend.
    #[arg(long, global = true, env = "DIRECTORY_APP_ID", default_value = "")]
    pub app_id: String,

    /// Bearer token for the signed-in user.
    #[arg(long, global = true, env = "DIRECTORY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// HTTP request timeout.
    #[arg(long, global = true, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Retries for idempotent reads on 429/5xx and transport errors.
    #[arg(long, global = true, default_value_t = 3)]
    pub max_retries: u32,

    /// Use an in-memory store seeded from this JSON file instead of the hosted backend.
    #[arg(long, global = true)]
    pub seed: Option<String>,

    /// With --seed: act as an admin with this email.
    #[arg(long, global = true, requires = "seed")]
    pub seed_admin: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the public read API.
    Serve(ServeArgs),
    /// Create or update providers from a CSV upload.
    ImportProviders(ImportArgs),
    /// Merge dosage prices from a CSV upload into existing providers.
    ImportPricing(ImportArgs),
    /// Round every fractional price to whole pounds.
    RoundPrices,
    /// Set or clear one dosage price for a provider.
    SetPrice(SetPriceArgs),
    /// Refresh provider details from their websites and review the changes.
    RefreshAll(ApplyArgs),
    /// Find logos for providers without an image.
    FindImages(ApplyArgs),
    /// Find homepages for providers without a website.
    FindWebsites(ApplyArgs),
    /// Manage blog posts.
    #[command(subcommand)]
    Blog(BlogCommand),
    /// Print a CSV template for an upload.
    SampleCsv(SampleCsvArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8787)]
    pub port: u16,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// CSV file to import.
    pub csv: String,

    /// Parse the CSV locally instead of through the hosted extraction service.
    #[arg(long)]
    pub local: bool,

    /// Write the changes. Without this only the plan is printed.
    #[arg(long)]
    pub apply: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Save the results. Without this they are only printed.
    #[arg(long)]
    pub apply: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SetPriceArgs {
    /// Provider id or exact name (case-insensitive).
    pub provider: String,

    /// Medication key, e.g. "wegovy".
    pub medication: String,

    /// Dosage label, e.g. "2.4mg".
    pub dosage: String,

    /// Price in pounds. Rounded to whole pounds on save.
    #[arg(required_unless_present = "clear")]
    pub price: Option<f64>,

    /// Mark the dosage as not offered.
    #[arg(long, conflicts_with = "price")]
    pub clear: bool,
}

#[derive(Subcommand, Debug)]
pub enum BlogCommand {
    /// List every post, newest first.
    List,
    /// Create a post, or update it when --id is given.
    Save(BlogSaveArgs),
    /// Delete a post by id.
    Delete { id: String },
}

#[derive(clap::Args, Debug, Clone)]
pub struct BlogSaveArgs {
    /// Existing post id to update.
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub title: String,

    /// Markdown file with the post body.
    #[arg(long)]
    pub content_file: String,

    /// Defaults to a slug generated from the title.
    #[arg(long)]
    pub slug: Option<String>,

    #[arg(long)]
    pub excerpt: Option<String>,

    /// Comma-separated tags.
    #[arg(long)]
    pub tags: Option<String>,

    /// Publish instead of saving as a draft.
    #[arg(long)]
    pub publish: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CsvKind {
    Providers,
    Pricing,
}

impl From<CsvKind> for ImportKind {
    fn from(kind: CsvKind) -> Self {
        match kind {
            CsvKind::Providers => ImportKind::Providers,
            CsvKind::Pricing => ImportKind::Pricing,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SampleCsvArgs {
    #[arg(value_enum)]
    pub kind: CsvKind,

    /// Write to this file instead of stdout.
    #[arg(long)]
    pub output: Option<String>,
}
