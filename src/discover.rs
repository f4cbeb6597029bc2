use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::common::is_http_url;
use crate::llm::ExtractionService;
use crate::model::Provider;
use crate::runner::SequentialRunner;
use crate::store::{EntityKind, EntityStore, record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Image,
    Website,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Provider has no website URL.")]
    MissingWebsite,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidUrl(&'static str),

    #[error("{message}")]
    Service { message: &'static str, detail: String },
}

impl Target {
    /// Provider field the found URL is written to.
    pub fn field(self) -> &'static str {
        match self {
            Target::Image => "image_url",
            Target::Website => "website",
        }
    }

    fn answer_key(self) -> &'static str {
        match self {
            Target::Image => "image_url",
            Target::Website => "website_url",
        }
    }

    pub fn schema(self) -> Value {
        let key = self.answer_key();
        json!({
            "type": "object",
            "properties": { key: { "type": "string", "format": "uri" } },
            "required": [key]
        })
    }

    pub fn prompt(self, provider: &Provider) -> Result<String, DiscoveryError> {
        match self {
            Target::Image => {
                let website = provider
                    .website
                    .as_deref()
                    .filter(|w| !w.is_empty())
                    .ok_or(DiscoveryError::MissingWebsite)?;
                Ok(format!(
                    "From the website {website}, find the direct URL of the company's official logo. \
                     The URL must be a direct link to an image file (ending in .png, .jpg, .jpeg, .svg, or .webp). \
                     If you cannot find a logo, find a high-quality image of their storefront or a professional \
                     corporate photo from the website. The URL should be absolute."
                ))
            }
            Target::Website => {
                let address = provider
                    .address
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .unwrap_or("Not specified");
                Ok(format!(
                    "Find the official website URL for the pharmacy or clinic named \"{}\". \
                     If they have a physical address, it is: {address}. \
                     The URL should be the main homepage of the business.",
                    provider.name
                ))
            }
        }
    }

    pub fn needs_lookup(self, provider: &Provider) -> bool {
        match self {
            Target::Image => !provider.has_image(),
            Target::Website => !provider.has_website(),
        }
    }

    fn not_found(self) -> DiscoveryError {
        match self {
            Target::Image => DiscoveryError::NotFound("Could not find a suitable image."),
            Target::Website => DiscoveryError::NotFound("Could not find a valid website URL."),
        }
    }

    fn invalid(self) -> DiscoveryError {
        match self {
            Target::Image => {
                DiscoveryError::InvalidUrl("Found an invalid image path. Please add manually.")
            }
            Target::Website => DiscoveryError::InvalidUrl("Could not find a valid website URL."),
        }
    }

    fn search_failed(self, detail: String) -> DiscoveryError {
        let message = match self {
            Target::Image => "An error occurred during search.",
            Target::Website => "An error occurred during the search.",
        };
        DiscoveryError::Service { message, detail }
    }

    fn save_failed(self) -> &'static str {
        match self {
            Target::Image => "Failed to save the image.",
            Target::Website => "Failed to save the website URL.",
        }
    }
}

/// Providers missing the target field, in input order.
pub fn candidates(target: Target, providers: &[Provider]) -> Vec<&Provider> {
    providers.iter().filter(|p| target.needs_lookup(p)).collect()
}

/// One LLM lookup. The answer must be an absolute `http…` URL.
pub async fn find_one<L: ExtractionService>(
    llm: &L,
    target: Target,
    provider: &Provider,
) -> Result<String, DiscoveryError> {
    let prompt = target.prompt(provider)?;
    let answer = llm
        .invoke(&prompt, &target.schema(), false)
        .await
        .map_err(|e| {
            tracing::warn!("Finding {} for {} failed: {}", target.field(), provider.name, e);
            target.search_failed(e.to_string())
        })?;

    let url = answer
        .get(target.answer_key())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| target.not_found())?;
    if !is_http_url(url) {
        return Err(target.invalid());
    }
    Ok(url.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub provider_id: String,
    pub provider_name: String,
    #[serde(serialize_with = "finding_result")]
    pub result: Result<String, DiscoveryError>,
}

fn finding_result<S: serde::Serializer>(
    result: &Result<String, DiscoveryError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match result {
        Ok(url) => json!({ "url": url }).serialize(serializer),
        Err(e) => json!({ "error": e.to_string() }).serialize(serializer),
    }
}

/// Looks up every provider one at a time with the runner's pause in between.
pub async fn find_all<L: ExtractionService>(
    llm: &L,
    target: Target,
    providers: &[&Provider],
    runner: &SequentialRunner,
) -> Vec<Finding> {
    runner
        .run(providers.to_vec(), |provider| async move {
            Finding {
                provider_id: provider.id.clone(),
                provider_name: provider.name.clone(),
                result: find_one(llm, target, provider).await,
            }
        })
        .await
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub saved: Vec<String>,
    /// `(provider name, error)`.
    pub failed: Vec<(String, String)>,
}

impl SaveReport {
    pub fn message(&self, target: Target) -> String {
        let noun = match target {
            Target::Image => "images",
            Target::Website => "websites",
        };
        let mut msg = format!("Saved {} {}.", self.saved.len(), noun);
        if !self.failed.is_empty() {
            msg.push_str(&format!(
                " An error occurred during bulk save. Some {noun} may not have been saved."
            ));
        }
        msg
    }
}

/// Writes every successful finding at once. Anything that is not an
/// `http…` URL is reported and not sent.
pub async fn save_findings<S: EntityStore>(
    store: &S,
    target: Target,
    findings: &[Finding],
) -> SaveReport {
    let mut report = SaveReport::default();
    let mut to_save = Vec::new();
    for finding in findings {
        match &finding.result {
            Ok(url) if is_http_url(url) => to_save.push((finding, url)),
            Ok(_) => report.failed.push((
                finding.provider_name.clone(),
                "Invalid URL. Must start with http or https.".to_string(),
            )),
            Err(_) => {}
        }
    }

    let writes = to_save.into_iter().map(|(finding, url)| async move {
        let fields = record([(target.field(), Value::String(url.clone()))]);
        let result = store
            .update(EntityKind::Provider, &finding.provider_id, fields)
            .await;
        (finding, result)
    });
    for (finding, result) in join_all(writes).await {
        match result {
            Ok(_) => report.saved.push(finding.provider_name.clone()),
            Err(e) => {
                tracing::warn!("Saving {} for {} failed: {}", target.field(), finding.provider_name, e);
                report
                    .failed
                    .push((finding.provider_name.clone(), target.save_failed().to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;
    use crate::store::{MemoryStore, Record};
    use std::time::Duration;

    fn provider(v: Value) -> Provider {
        serde_json::from_value(v).unwrap()
    }

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn candidates_skip_providers_with_either_image_field() {
        let providers = vec![
            provider(json!({"id": "a", "name": "Acme", "image_url": "https://a/logo.png"})),
            provider(json!({"id": "b", "name": "Beta", "logo_url": "https://b/logo.png"})),
            provider(json!({"id": "c", "name": "Gamma", "image_url": ""})),
        ];
        let ids: Vec<&str> = candidates(Target::Image, &providers)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(candidates(Target::Website, &providers).len(), 3);
    }

    #[test]
    fn website_prompt_falls_back_when_no_address() {
        let p = provider(json!({"id": "a", "name": "Acme"}));
        let prompt = Target::Website.prompt(&p).unwrap();
        assert!(prompt.contains("named \"Acme\""));
        assert!(prompt.contains("it is: Not specified."));
    }

    #[tokio::test]
    async fn image_lookup_validates_the_answer() {
        let no_site = provider(json!({"id": "a", "name": "Acme"}));
        let llm = ScriptedLlm::default();
        assert_eq!(
            find_one(&llm, Target::Image, &no_site).await,
            Err(DiscoveryError::MissingWebsite)
        );
        assert!(llm.prompts().is_empty());

        let site = provider(json!({"id": "a", "name": "Acme", "website": "https://acme.example"}));
        let llm = ScriptedLlm::new(vec![
            Ok(json!({"image_url": "/img/logo.png"})),
            Ok(json!({"image_url": "https://acme.example/logo.png"})),
            Ok(json!({})),
        ]);
        let invalid = find_one(&llm, Target::Image, &site).await.unwrap_err();
        assert_eq!(invalid.to_string(), "Found an invalid image path. Please add manually.");
        assert_eq!(
            find_one(&llm, Target::Image, &site).await.unwrap(),
            "https://acme.example/logo.png"
        );
        let missing = find_one(&llm, Target::Image, &site).await.unwrap_err();
        assert_eq!(missing.to_string(), "Could not find a suitable image.");
    }

    #[tokio::test]
    async fn service_errors_use_the_generic_message() {
        let p = provider(json!({"id": "a", "name": "Acme"}));
        let llm = ScriptedLlm::new(vec![Err("503".to_string())]);
        let err = find_one(&llm, Target::Website, &p).await.unwrap_err();
        assert_eq!(err.to_string(), "An error occurred during the search.");
    }

    #[tokio::test(start_paused = true)]
    async fn find_all_then_save_only_valid_urls() {
        let store = MemoryStore::new().with_records(
            EntityKind::Provider,
            vec![
                rec(json!({"id": "a", "name": "Acme"})),
                rec(json!({"id": "b", "name": "Beta"})),
                rec(json!({"id": "c", "name": "Gamma"})),
            ],
        );
        let providers: Vec<Provider> = crate::store::decode_all(
            EntityKind::Provider,
            store.list(EntityKind::Provider, None, None).await.unwrap(),
        );
        let targets = candidates(Target::Website, &providers);
        let llm = ScriptedLlm::new(vec![
            Ok(json!({"website_url": "https://acme.example"})),
            Ok(json!({"website_url": "beta.example"})),
            Err("timeout".to_string()),
        ]);
        let findings = find_all(
            &llm,
            Target::Website,
            &targets,
            &SequentialRunner::new(Duration::from_millis(500)),
        )
        .await;
        assert_eq!(findings.len(), 3);
        assert!(findings[1].result.is_err());

        let report = save_findings(&store, Target::Website, &findings).await;
        assert_eq!(report.saved, vec!["Acme"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.message(Target::Website), "Saved 1 websites.");

        let acme = store.get(EntityKind::Provider, "a").await.unwrap();
        assert_eq!(acme["website"], json!("https://acme.example"));
        let beta = store.get(EntityKind::Provider, "b").await.unwrap();
        assert!(!beta.contains_key("website"));
    }
}
