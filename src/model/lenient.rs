//! Deserializers that read hand-edited or legacy entity data without
//! failing: anything malformed comes back as absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::MedicationPrices;

fn raw<'de, D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.unwrap_or(Value::Null))
}

pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(value_as_f64(&raw(d)?))
}

pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(value_as_f64(&raw(d)?)
        .filter(|f| *f >= 0.0)
        .map(|f| f.round() as u64))
}

/// Only a JSON boolean counts; `"true"` and friends read as absent.
pub fn strict_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match raw(d)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}

pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match raw(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

pub fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(opt_string(d)?.unwrap_or_default())
}

pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match raw(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Medication → dosage → price. Entries that are not objects are dropped;
/// price leaves are kept verbatim.
pub fn price_map<'de, D: Deserializer<'de>>(d: D) -> Result<MedicationPrices, D::Error> {
    Ok(medications_from_value(&raw(d)?))
}

pub fn medications_from_value(value: &Value) -> MedicationPrices {
    let mut out = BTreeMap::new();
    if let Value::Object(meds) = value {
        for (name, dosages) in meds {
            if let Value::Object(dosages) = dosages {
                let dosages: BTreeMap<String, Value> = dosages
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                out.insert(name.clone(), dosages);
            }
        }
    }
    out
}
