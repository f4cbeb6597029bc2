use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://app.base44.com/api";
pub const USER_AGENT: &str = "provider-directory/0.1";

/// Providers page load budget.
pub const PROVIDER_LIST_TIMEOUT: Duration = Duration::from_secs(15);
/// Home page load budget (featured providers + popular medications).
pub const HOME_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between items of a "refresh all" / "find all" batch.
pub const BATCH_ITEM_DELAY: Duration = Duration::from_millis(500);

pub const HOME_FEATURED_PROVIDERS: usize = 6;
pub const HOME_POPULAR_MEDICATIONS: usize = 4;

pub const DEFAULT_PROVIDER_SORT: &str = "-trust_score";
pub const DEFAULT_PRICE_RANGE: (f64, f64) = (0.0, 500.0);

pub const DEFAULT_TRUST_SCORE: f64 = 5.0;
pub const TRUST_SCORE_MAX: f64 = 10.0;
pub const RATING_MAX: f64 = 5.0;

pub const PROVIDER_LOAD_ERROR: &str =
    "Unable to load providers due to temporary connectivity issues. Please try again.";
pub const HOME_LOAD_ERROR: &str = "Unable to load some content due to temporary connectivity issues. Please try refreshing the page.";

pub const PROVIDER_CSV_COLUMNS: &[&str] = &[
    "name",
    "type",
    "website",
    "phone",
    "email",
    "address",
    "coverage",
    "trust_score",
    "gphc_registered",
    "cqc_regulated",
    "mhra_compliant",
    "gmc_doctors",
    "consultation_fee",
    "consultation_method",
    "bmi_requirement",
    "wait_time",
    "special_offers",
    "delivery_options",
    "rating",
    "review_count",
    "image_url",
    "description",
];

pub const PRICING_CSV_COLUMNS: &[&str] = &["provider_name", "medication_name", "dosage", "price"];
