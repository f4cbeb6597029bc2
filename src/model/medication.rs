use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::id_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub how_it_works: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub dosage_options: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub side_effects: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,
}

impl Medication {
    /// `id` when present, otherwise the name.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

#[allow(clippy::too_many_arguments)]
fn catalog_entry(
    id: &str,
    name: &str,
    generic_name: &str,
    description: &str,
    how_it_works: &str,
    dosages: &[&str],
    side_effects: &[&str],
    average_price: f64,
    price_range: &str,
    approval_status: &str,
    brand_color: &str,
) -> Medication {
    Medication {
        id: Some(id.to_string()),
        name: name.to_string(),
        generic_name: Some(generic_name.to_string()),
        description: Some(description.to_string()),
        how_it_works: Some(how_it_works.to_string()),
        dosage_options: dosages.iter().map(|s| s.to_string()).collect(),
        side_effects: side_effects.iter().map(|s| s.to_string()).collect(),
        average_price: Some(average_price),
        price_range: Some(price_range.to_string()),
        approval_status: Some(approval_status.to_string()),
        brand_color: Some(brand_color.to_string()),
    }
}

/// Static reference entries shown while the remote collection is empty.
pub fn default_catalog() -> Vec<Medication> {
    vec![
        catalog_entry(
            "wegovy",
            "Wegovy",
            "Semaglutide",
            "Weekly injection for chronic weight management in adults with obesity or overweight.",
            "Mimics GLP-1 hormone to slow digestion, reduce appetite, and help you feel full longer.",
            WEGOVY_DOSAGES,
            &["Nausea", "Vomiting", "Diarrhea", "Stomach pain", "Constipation"],
            199.0,
            "£179-£219",
            "MHRA Approved",
            "bg-blue-500",
        ),
        catalog_entry(
            "mounjaro",
            "Mounjaro",
            "Tirzepatide",
            "Dual-action weekly injection that targets both GLP-1 and GIP receptors.",
            "Works on two hormone pathways to provide enhanced appetite control and weight loss.",
            MOUNJARO_DOSAGES,
            &["Nausea", "Diarrhea", "Vomiting", "Constipation", "Stomach discomfort"],
            229.0,
            "£209-£249",
            "MHRA Approved",
            "bg-purple-500",
        ),
        catalog_entry(
            "saxenda",
            "Saxenda",
            "Liraglutide",
            "Daily injection for weight management in adults with BMI ≥30 or ≥27 with comorbidities.",
            "GLP-1 receptor agonist that slows gastric emptying and promotes satiety.",
            SAXENDA_DOSAGES,
            &["Nausea", "Hypoglycemia", "Diarrhea", "Constipation", "Headache"],
            159.0,
            "£139-£179",
            "MHRA Approved",
            "bg-green-500",
        ),
        catalog_entry(
            "ozempic",
            "Ozempic",
            "Semaglutide",
            "Originally for diabetes, used off-label for weight management.",
            "Same mechanism as Wegovy but licensed primarily for diabetes treatment.",
            OZEMPIC_DOSAGES,
            &["Nausea", "Vomiting", "Diarrhea", "Stomach pain", "Constipation"],
            179.0,
            "£159-£199",
            "Off-label use",
            "bg-orange-500",
        ),
    ]
}

pub fn medications_or_default(list: Vec<Medication>) -> Vec<Medication> {
    if list.is_empty() {
        default_catalog()
    } else {
        list
    }
}

const WEGOVY_DOSAGES: &[&str] = &["0.25mg", "0.5mg", "1mg", "1.7mg", "2.4mg"];
const MOUNJARO_DOSAGES: &[&str] = &["2.5mg", "5mg", "7.5mg", "10mg", "12.5mg", "15mg"];
const SAXENDA_DOSAGES: &[&str] = &["0.6mg", "1.2mg", "1.8mg", "2.4mg", "3mg"];
const OZEMPIC_DOSAGES: &[&str] = &["0.25mg", "0.5mg", "1mg"];

/// Dosage labels offered on the manual pricing grid.
pub fn standard_dosages(medication: &str) -> &'static [&'static str] {
    match medication.to_ascii_lowercase().as_str() {
        "wegovy" => WEGOVY_DOSAGES,
        "mounjaro" => MOUNJARO_DOSAGES,
        "saxenda" => SAXENDA_DOSAGES,
        "ozempic" => OZEMPIC_DOSAGES,
        _ => &[],
    }
}

pub fn standard_medications() -> [&'static str; 4] {
    ["Wegovy", "Mounjaro", "Saxenda", "Ozempic"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_four_named_entries() {
        let names: Vec<_> = default_catalog().into_iter().map(|m| m.name).collect();
        assert_eq!(names, standard_medications().to_vec());
    }

    #[test]
    fn empty_remote_list_falls_back() {
        assert_eq!(medications_or_default(Vec::new()).len(), 4);
        let remote = vec![Medication {
            name: "Orforglipron".to_string(),
            ..Default::default()
        }];
        assert_eq!(medications_or_default(remote.clone()), remote);
    }

    #[test]
    fn dosage_grid_is_case_insensitive() {
        assert_eq!(standard_dosages("MOUNJARO").len(), 6);
        assert!(standard_dosages("aspirin").is_empty());
    }
}
