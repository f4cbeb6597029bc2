//! AI refresh of provider details: ask the LLM to re-read a provider's
//! website, show the changed fields, and write them only on approval.

pub mod board;
pub mod machine;

use serde_json::{Value, json};

use crate::common::js_string;
use crate::store::Record;

pub use board::{RefreshBoard, RefreshSummary, SaveAllReport};
pub use machine::{Command, Effect, Event, LastOutcome, RefreshRow, RowState};

/// Fields the extractor is asked for, with the hint it receives for each.
pub const REFRESH_FIELDS: [(&str, &str, &str); 6] = [
    ("rating", "number", "The provider's average star rating (e.g., 4.8)."),
    ("review_count", "number", "The total number of reviews (e.g., 150)."),
    (
        "consultation_fee",
        "number",
        "The cost of an initial consultation in GBP (numeric only).",
    ),
    (
        "wait_time",
        "string",
        "The typical wait time for an appointment (e.g., 'Same day', '2-3 days').",
    ),
    (
        "special_offers",
        "string",
        "Any special offers or discounts currently advertised.",
    ),
    (
        "description",
        "string",
        "A brief, updated description of the provider's services.",
    ),
];

pub const NO_WEBSITE_ERROR: &str = "Provider has no website URL to scan.";
pub const NO_DATA_ERROR: &str =
    "AI returned no data. The website might be inaccessible or information wasn't found.";

pub fn refresh_schema() -> Value {
    let properties: serde_json::Map<String, Value> = REFRESH_FIELDS
        .iter()
        .map(|(name, ty, description)| {
            (name.to_string(), json!({ "type": ty, "description": description }))
        })
        .collect();
    json!({ "type": "object", "properties": properties })
}

pub fn refresh_prompt(website: &str, name: &str) -> String {
    format!(
        "You are a data extraction agent. Visit the provider's website at {website}. \
         Extract the following information accurately. If a piece of information is not \
         available, return null for that field. Do not guess or make up data. Focus only on \
         information present on their website.\nProvider Name: {name}"
    )
}

/// Refreshable fields whose extracted value is non-null, non-blank and renders
/// differently from the stored value. `4.8` and `"4.8"` count as equal.
pub fn diff_proposal(current: &Record, extracted: &Record) -> Record {
    let mut proposal = Record::new();
    for (field, _, _) in REFRESH_FIELDS {
        let Some(new) = extracted.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        let rendered = js_string(Some(new));
        if rendered.trim().is_empty() || rendered == js_string(current.get(field)) {
            continue;
        }
        proposal.insert(field.to_string(), new.clone());
    }
    proposal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn equal_rating_is_not_a_change() {
        let current = rec(json!({"rating": 4.8, "wait_time": "2 days"}));
        let extracted = rec(json!({"rating": "4.8", "wait_time": "Same day"}));
        let diff = diff_proposal(&current, &extracted);
        assert_eq!(diff, rec(json!({"wait_time": "Same day"})));
    }

    #[test]
    fn null_blank_and_unknown_fields_are_dropped() {
        let current = rec(json!({"consultation_fee": 25}));
        let extracted = rec(json!({
            "consultation_fee": null,
            "special_offers": "   ",
            "description": "",
            "phone": "0100",
            "review_count": 150.0
        }));
        let diff = diff_proposal(&current, &extracted);
        assert_eq!(diff, rec(json!({"review_count": 150.0})));
    }

    #[test]
    fn missing_current_value_counts_as_different() {
        let diff = diff_proposal(&Record::new(), &rec(json!({"rating": 4})));
        assert_eq!(diff, rec(json!({"rating": 4})));
    }

    #[test]
    fn schema_lists_every_refresh_field() {
        let schema = refresh_schema();
        let props = schema["properties"].as_object().unwrap();
        assert_eq!(props.len(), 6);
        assert_eq!(props["review_count"]["type"], json!("number"));
        assert_eq!(props["wait_time"]["type"], json!("string"));
    }
}
