//! OpenAI-compatible chat completion plumbing shared by the chat-backed
//! parser and scorer.

use hireflow_shared::{HireflowError, Result};
use reqwest::Client;
use serde_json::{Value, json};

use crate::http::{check_status, read_json, send_error};

/// One `/chat/completions` endpoint plus the model and key used against it.
#[derive(Clone)]
pub(crate) struct ChatClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatClient {
    pub(crate) fn new(
        client: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user message and return the first choice's content.
    pub(crate) async fn complete(
        &self,
        capability: &str,
        prompt: String,
        temperature: f64,
    ) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(capability, e))?;
        let response = check_status(capability, response)?;
        let json: Value = read_json(capability, response).await?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                HireflowError::Rejected(format!("{capability}: chat response has no message content"))
            })
    }
}

/// Pull the outermost JSON object out of a model answer, tolerating code
/// fences and surrounding prose.
pub(crate) fn extract_json_object(content: &str) -> Result<Value> {
    let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) else {
        return Err(HireflowError::Rejected("model answer has no JSON object".into()));
    };
    if end < start {
        return Err(HireflowError::Rejected("model answer has no JSON object".into()));
    }
    serde_json::from_str(&content[start..=end])
        .map_err(|e| HireflowError::Rejected(format!("model answer is not valid JSON: {e}")))
}
