//! Bulk reconciliation of CSV rows against the provider collection.
//!
//! Rows arrive either from the hosted extraction integration (upload, then
//! schema-driven extract) or from the local CSV reader in `csv_rows`. Either
//! way they are plain JSON objects; the importers never trust their shape.

pub mod csv_rows;
pub mod pricing;
pub mod providers;

use std::path::Path;

use serde_json::{Value, json};

use crate::error::IntegrationError;
use crate::llm::ExtractionService;
use crate::store::Record;

pub use pricing::{PricingImportReport, PricingPlan, import_pricing, plan_pricing_import};
pub use providers::{ProviderImportReport, RowOutcome, import_providers, preview_provider_import};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Providers,
    Pricing,
}

impl ImportKind {
    /// JSON schema for one row, shared by remote extraction and the local
    /// CSV reader's type coercion.
    pub fn row_schema(self) -> Value {
        match self {
            ImportKind::Providers => json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "slug": { "type": "string" },
                    "type": { "type": "string" },
                    "website": { "type": "string" },
                    "phone": { "type": "string" },
                    "email": { "type": "string" },
                    "address": { "type": "string" },
                    "coverage": { "type": "string" },
                    "trust_score": { "type": "number" },
                    "gphc_registered": { "type": "boolean" },
                    "cqc_regulated": { "type": "boolean" },
                    "mhra_compliant": { "type": "boolean" },
                    "gmc_doctors": { "type": "boolean" },
                    "medications": { "type": "object" },
                    "consultation_fee": { "type": "number" },
                    "consultation_method": { "type": "string" },
                    "bmi_requirement": { "type": "string" },
                    "wait_time": { "type": "string" },
                    "special_offers": { "type": "string" },
                    "delivery_options": { "type": "string" },
                    "locations": { "type": "array", "items": { "type": "string" } },
                    "rating": { "type": "number" },
                    "review_count": { "type": "number" },
                    "image_url": { "type": "string" },
                    "description": { "type": "string" }
                }
            }),
            ImportKind::Pricing => json!({
                "type": "object",
                "properties": {
                    "provider_name": { "type": "string" },
                    "medication_name": { "type": "string" },
                    "dosage": { "type": "string" },
                    "price": { "type": "number" }
                }
            }),
        }
    }

    fn extract_failed_message(self) -> &'static str {
        match self {
            ImportKind::Providers => "Failed to extract data from CSV",
            ImportKind::Pricing => "Failed to extract pricing data from CSV",
        }
    }
}

/// Uploads `path` and asks the extraction integration for rows of `kind`.
/// A non-success status surfaces the service's `details` text.
pub async fn extract_rows<E: ExtractionService>(
    service: &E,
    path: &Path,
    kind: ImportKind,
) -> Result<Vec<Record>, IntegrationError> {
    let file_url = service.upload(path).await?;
    let extraction = service.extract(&file_url, &kind.row_schema()).await?;

    let succeeded = extraction.is_success();
    match extraction.output {
        Some(output) if succeeded => Ok(rows_from_output(output)),
        _ => Err(IntegrationError::Extraction(
            extraction
                .details
                .unwrap_or_else(|| kind.extract_failed_message().to_string()),
        )),
    }
}

fn rows_from_output(output: Value) -> Vec<Record> {
    let items = match output {
        Value::Array(items) => items,
        Value::Object(map) => vec![Value::Object(map)],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

const PROVIDER_TEMPLATE: &str = "name,type,website,phone,email,address,coverage,trust_score,gphc_registered,cqc_regulated,mhra_compliant,gmc_doctors,consultation_fee,consultation_method,bmi_requirement,wait_time,special_offers,delivery_options,rating,review_count,image_url,description
Sample Pharmacy,\"Pharmacy Chain\",https://example.com,01234567890,info@example.com,\"123 High Street, London\",UK Wide,8.5,true,true,true,true,49,Online & In-person,BMI 30+,Same day,\"First consultation free\",\"Free UK delivery\",4.8,150,https://example.com/image.jpg,\"Comprehensive weight loss support with qualified healthcare professionals\"
";

const PRICING_TEMPLATE: &str = "provider_name,medication_name,dosage,price
Sample Pharmacy,Wegovy,0.25mg,180.50
Sample Pharmacy,Wegovy,0.5mg,200.00
Sample Pharmacy,Wegovy,1mg,220.00
Sample Pharmacy,Mounjaro,2.5mg,210.00
Sample Pharmacy,Mounjaro,5mg,230.00
Sample Pharmacy,Saxenda,3mg,160.00
Sample Pharmacy,Ozempic,0.5mg,179.00
Another Provider,Wegovy,2.4mg,260.00
Another Provider,Mounjaro,15mg,280.00
";

/// Downloadable template for the given upload.
pub fn sample_csv(kind: ImportKind) -> &'static str {
    match kind {
        ImportKind::Providers => PROVIDER_TEMPLATE,
        ImportKind::Pricing => PRICING_TEMPLATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PRICING_CSV_COLUMNS, PROVIDER_CSV_COLUMNS};
    use crate::llm::Extraction;
    use crate::llm::scripted::ScriptedLlm;

    #[test]
    fn templates_use_the_documented_headers() {
        let header = sample_csv(ImportKind::Providers).lines().next().unwrap();
        assert_eq!(header, PROVIDER_CSV_COLUMNS.join(","));
        let header = sample_csv(ImportKind::Pricing).lines().next().unwrap();
        assert_eq!(header, PRICING_CSV_COLUMNS.join(","));
    }

    #[tokio::test]
    async fn successful_extraction_yields_object_rows() {
        let llm = ScriptedLlm::with_extraction(Extraction {
            status: "success".to_string(),
            output: Some(json!([{"name": "Acme"}, 7, {"name": "Beta"}])),
            details: None,
        });
        let rows = extract_rows(&llm, Path::new("providers.csv"), ImportKind::Providers)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], json!("Beta"));
    }

    #[tokio::test]
    async fn failed_extraction_surfaces_details_or_default() {
        let llm = ScriptedLlm::with_extraction(Extraction {
            status: "error".to_string(),
            output: None,
            details: Some("column price is not numeric".to_string()),
        });
        let err = extract_rows(&llm, Path::new("p.csv"), ImportKind::Pricing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "column price is not numeric");

        let silent = ScriptedLlm::default();
        let err = extract_rows(&silent, Path::new("p.csv"), ImportKind::Pricing)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to extract pricing data from CSV");
    }
}
