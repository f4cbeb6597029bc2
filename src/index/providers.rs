use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::constants::DEFAULT_PRICE_RANGE;
use crate::model::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    TrustScoreDesc,
    PriceAsc,
    PriceDesc,
    RatingDesc,
    NameAsc,
    WaitTimeAsc,
}

impl Sort {
    /// Accepts the keys used in page URLs (`-trust_score`,
    /// `medication_price_low`, ...). Unknown keys leave the input order alone.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "-trust_score" => Some(Sort::TrustScoreDesc),
            "medication_price_low" => Some(Sort::PriceAsc),
            "medication_price_high" => Some(Sort::PriceDesc),
            "-rating" => Some(Sort::RatingDesc),
            "name" => Some(Sort::NameAsc),
            "wait_time" => Some(Sort::WaitTimeAsc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFilters {
    pub provider_type: Option<String>,
    pub medication: Option<String>,
    /// Inclusive `(min, max)` on the cheapest dosage. Ignored unless
    /// `medication` is set.
    pub medication_price_range: Option<(f64, f64)>,
    pub trust_score_min: f64,
    pub rating_min: f64,
    pub gphc_registered: Option<bool>,
    pub cqc_regulated: Option<bool>,
    pub mhra_compliant: Option<bool>,
    pub gmc_doctors: Option<bool>,
    pub sort: Option<Sort>,
}

impl Default for ProviderFilters {
    fn default() -> Self {
        Self {
            provider_type: None,
            medication: None,
            medication_price_range: Some(DEFAULT_PRICE_RANGE),
            trust_score_min: 0.0,
            rating_min: 0.0,
            gphc_registered: None,
            cqc_regulated: None,
            mhra_compliant: None,
            gmc_doctors: None,
            sort: Some(Sort::TrustScoreDesc),
        }
    }
}

/// Lowest numeric price listed under exactly the `medication` key, or `None`
/// when the provider does not offer it (no such key, or no numeric leaf).
/// Unlike the medication filter, the key match is case-sensitive.
pub fn cheapest_price(provider: &Provider, medication: &str) -> Option<f64> {
    provider
        .dosages_for(medication)?
        .values()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
        .min_by(|a, b| a.total_cmp(b))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle_lower))
}

fn matches_search(p: &Provider, query_lower: &str) -> bool {
    contains_ci(Some(&p.name), query_lower)
        || contains_ci(p.coverage.as_deref(), query_lower)
        || contains_ci(p.address.as_deref(), query_lower)
        || contains_ci(p.provider_type.as_deref(), query_lower)
        || contains_ci(p.description.as_deref(), query_lower)
        || p.locations
            .iter()
            .any(|loc| loc.to_lowercase().contains(query_lower))
}

fn matches_medication(p: &Provider, medication: &str) -> bool {
    let wanted = medication.to_lowercase();
    contains_ci(Some(&p.name), &wanted)
        || contains_ci(p.description.as_deref(), &wanted)
        || p.offers_medication_key(medication)
}

fn certified(flag: Option<bool>, required: Option<bool>) -> bool {
    required != Some(true) || flag == Some(true)
}

/// Price order with "not offered" last in both directions.
fn compare_prices(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_wait_times(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (non_empty(a), non_empty(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_names(a, b),
    }
}

/// Filters and orders `providers` for display.
///
/// Pure: the same inputs always give the same membership and order. Sorting
/// is stable, so providers with equal keys keep their input order.
pub fn query_providers<'a>(
    providers: &'a [Provider],
    search_query: &str,
    filters: &ProviderFilters,
) -> Vec<&'a Provider> {
    let query = search_query.trim().to_lowercase();
    let provider_type = non_empty(filters.provider_type.as_deref());
    let medication = non_empty(filters.medication.as_deref());

    let mut out: Vec<&Provider> = providers
        .iter()
        .filter(|p| query.is_empty() || matches_search(p, &query))
        .filter(|p| provider_type.is_none_or(|t| p.provider_type.as_deref() == Some(t)))
        .filter(|p| medication.is_none_or(|m| matches_medication(p, m)))
        .filter(|p| match (medication, filters.medication_price_range) {
            (Some(m), Some((min, max))) => {
                cheapest_price(p, m).is_some_and(|price| price >= min && price <= max)
            }
            _ => true,
        })
        .filter(|p| {
            filters.trust_score_min <= 0.0
                || p.trust_score.unwrap_or(0.0) >= filters.trust_score_min
        })
        .filter(|p| filters.rating_min <= 0.0 || p.rating.unwrap_or(0.0) >= filters.rating_min)
        .filter(|p| {
            certified(p.gphc_registered, filters.gphc_registered)
                && certified(p.cqc_regulated, filters.cqc_regulated)
                && certified(p.mhra_compliant, filters.mhra_compliant)
                && certified(p.gmc_doctors, filters.gmc_doctors)
        })
        .collect();

    match filters.sort {
        Some(Sort::TrustScoreDesc) => out.sort_by(|a, b| {
            b.trust_score
                .unwrap_or(0.0)
                .total_cmp(&a.trust_score.unwrap_or(0.0))
        }),
        Some(Sort::RatingDesc) => {
            out.sort_by(|a, b| b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)))
        }
        Some(sort @ (Sort::PriceAsc | Sort::PriceDesc)) => {
            if let Some(m) = medication {
                let descending = sort == Sort::PriceDesc;
                out.sort_by_cached_key(|p| PriceKey(cheapest_price(p, m), descending));
            }
        }
        Some(Sort::NameAsc) => out.sort_by(|a, b| compare_names(&a.name, &b.name)),
        Some(Sort::WaitTimeAsc) => {
            out.sort_by(|a, b| compare_wait_times(a.wait_time.as_deref(), b.wait_time.as_deref()))
        }
        None => {}
    }

    out
}

/// Cached sort key so each provider's price map is scanned once per sort.
#[derive(PartialEq)]
struct PriceKey(Option<f64>, bool);

impl Eq for PriceKey {}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_prices(self.0, other.0, self.1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub types: Vec<String>,
    pub medications: Vec<String>,
}

/// Distinct provider types and medication names, for the filter sidebar.
pub fn filter_options(providers: &[Provider]) -> FilterOptions {
    let mut types = BTreeSet::new();
    let mut medications = BTreeSet::new();
    for p in providers {
        if let Some(t) = non_empty(p.provider_type.as_deref()) {
            types.insert(t.to_string());
        }
        medications.extend(p.medications.keys().cloned());
    }
    FilterOptions {
        types: types.into_iter().collect(),
        medications: medications.into_iter().collect(),
    }
}
