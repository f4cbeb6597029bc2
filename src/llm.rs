//! Client contract for the hosted LLM and file-extraction integrations.

use std::future::Future;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::common::truncate_for_log;
use crate::error::IntegrationError;
use crate::store::http::BackendConfig;

pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Result of a schema-driven extraction over an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub details: Option<String>,
}

impl Extraction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

pub trait ExtractionService: Send + Sync {
    /// Runs one prompt and returns JSON shaped like `schema`. A `null` result
    /// means the model produced nothing.
    fn invoke(
        &self,
        prompt: &str,
        schema: &Value,
        add_internet_context: bool,
    ) -> impl Future<Output = IntegrationResult<Value>> + Send;

    /// Uploads a local file and returns its hosted URL.
    fn upload(&self, path: &Path) -> impl Future<Output = IntegrationResult<String>> + Send;

    fn extract(
        &self,
        file_url: &str,
        schema: &Value,
    ) -> impl Future<Output = IntegrationResult<Extraction>> + Send;
}

#[derive(Clone)]
pub struct HttpExtraction {
    client: Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    file_url: String,
}

impl HttpExtraction {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/apps/{}/integration-endpoints/Core/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.app_id,
            name
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> IntegrationResult<reqwest::Response> {
        let resp = self.authed(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IntegrationError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body),
            });
        }
        Ok(resp)
    }
}

impl ExtractionService for HttpExtraction {
    async fn invoke(
        &self,
        prompt: &str,
        schema: &Value,
        add_internet_context: bool,
    ) -> IntegrationResult<Value> {
        let body = json!({
            "prompt": prompt,
            "response_json_schema": schema,
            "add_context_from_internet": add_internet_context,
        });
        let req = self.client.post(self.endpoint("InvokeLLM")).json(&body);
        let resp = self.send(req).await?;
        Ok(resp.json::<Value>().await?)
    }

    async fn upload(&self, path: &Path) -> IntegrationResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IntegrationError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let req = self.client.post(self.endpoint("UploadFile")).multipart(form);
        let resp = self.send(req).await?;
        let uploaded: UploadResponse = resp.json().await?;
        tracing::debug!("uploaded {} to {}", path.display(), uploaded.file_url);
        Ok(uploaded.file_url)
    }

    async fn extract(&self, file_url: &str, schema: &Value) -> IntegrationResult<Extraction> {
        let body = json!({ "file_url": file_url, "json_schema": schema });
        let req = self
            .client
            .post(self.endpoint("ExtractDataFromUploadedFile"))
            .json(&body);
        let resp = self.send(req).await?;
        Ok(resp.json::<Extraction>().await?)
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::{Extraction, ExtractionService, IntegrationResult};
    use crate::error::IntegrationError;

    /// Replays canned `invoke` answers in order and records every prompt.
    #[derive(Default)]
    pub struct ScriptedLlm {
        answers: Mutex<VecDeque<Result<Value, String>>>,
        prompts: Mutex<Vec<String>>,
        extraction: Option<Extraction>,
    }

    impl ScriptedLlm {
        pub fn new(answers: Vec<Result<Value, String>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                ..Default::default()
            }
        }

        pub fn with_extraction(extraction: Extraction) -> Self {
            Self {
                extraction: Some(extraction),
                ..Default::default()
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl ExtractionService for ScriptedLlm {
        async fn invoke(&self, prompt: &str, _: &Value, _: bool) -> IntegrationResult<Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.answers.lock().unwrap().pop_front();
            match next {
                Some(Ok(v)) => Ok(v),
                Some(Err(e)) => Err(IntegrationError::Extraction(e)),
                None => Ok(Value::Null),
            }
        }

        async fn upload(&self, path: &Path) -> IntegrationResult<String> {
            Ok(format!("https://files.example/{}", path.display()))
        }

        async fn extract(&self, _: &str, _: &Value) -> IntegrationResult<Extraction> {
            Ok(self.extraction.clone().unwrap_or_default())
        }
    }
}
