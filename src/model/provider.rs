use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MedicationPrices;
use super::lenient;

/// A listed pharmacy, clinic or online doctor service.
///
/// Read-only view over a store record. Unknown fields are kept in `extra` so
/// the view serializes back to what the store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_type: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64", skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,

    #[serde(default, deserialize_with = "lenient::strict_bool", skip_serializing_if = "Option::is_none")]
    pub gphc_registered: Option<bool>,
    #[serde(default, deserialize_with = "lenient::strict_bool", skip_serializing_if = "Option::is_none")]
    pub cqc_regulated: Option<bool>,
    #[serde(default, deserialize_with = "lenient::strict_bool", skip_serializing_if = "Option::is_none")]
    pub mhra_compliant: Option<bool>,
    #[serde(default, deserialize_with = "lenient::strict_bool", skip_serializing_if = "Option::is_none")]
    pub gmc_doctors: Option<bool>,

    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub consultation_fee: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub consultation_method: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub special_offers: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub delivery_options: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub bmi_requirement: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub locations: Vec<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient::price_map")]
    pub medications: MedicationPrices,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Provider {
    /// Dosage → price entries stored under exactly `medication`.
    pub fn dosages_for(
        &self,
        medication: &str,
    ) -> Option<&std::collections::BTreeMap<String, Value>> {
        self.medications.get(medication)
    }

    pub fn offers_medication_key(&self, medication: &str) -> bool {
        let wanted = medication.to_lowercase();
        self.medications.keys().any(|k| k.to_lowercase() == wanted)
    }

    pub fn has_image(&self) -> bool {
        non_blank(self.image_url.as_deref()) || non_blank(self.logo_url.as_deref())
    }

    pub fn has_website(&self) -> bool {
        non_blank(self.website.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> bool {
    s.is_some_and(|s| !s.is_empty())
}
