pub mod blog;
pub mod lenient;
pub mod medication;
pub mod provider;

use std::collections::BTreeMap;

use serde_json::Value;

pub use blog::{BlogPost, PostStatus, parse_tags, slugify};
pub use medication::{Medication, default_catalog, medications_or_default, standard_dosages};
pub use provider::Provider;

/// Medication name → dosage label → price in GBP. Leaves stay raw JSON so
/// untouched legacy values are written back exactly as read.
pub type MedicationPrices = BTreeMap<String, BTreeMap<String, Value>>;
