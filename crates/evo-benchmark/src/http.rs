//! OpenAI-compatible chat-completions oracle

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::oracle::{Oracle, OracleError};

/// HTTP oracle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOracleConfig {
    /// Base URL up to, not including, `/chat/completions`
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token, if any
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            model: "llama3".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            timeout_secs: 60,
            temperature: 0.0,
            max_tokens: 64,
        }
    }
}

/// Oracle backed by a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    config: HttpOracleConfig,
    api_key: Option<String>,
}

impl HttpOracle {
    /// Build client; reads the API key from the configured variable
    ///
    /// # Errors
    /// [`OracleError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Oracle for HttpOracle {
    async fn ask(&self, question: &str) -> Result<String, OracleError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": question }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(OracleError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!("status {status}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        extract_content(&json)
    }
}

/// `Retry-After` in whole seconds, as milliseconds
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1_000))
}

fn extract_content(json: &serde_json::Value) -> Result<String, OracleError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OracleError::Malformed("missing choices[0].message.content".into()))
}
