//! Memory provider client (Mem0)
//!
//! Memory retrieval is strictly best-effort. Any failure, missing key or
//! unreachable provider included, resolves to a local fallback so session
//! start is never blocked on the provider.

use std::time::Duration;

use serde_json::{Value, json};

use crate::config::Config;

/// Deadline for one provider request. Retrieval is best-effort, so a stalled
/// provider must resolve to the fallback instead of holding up session start.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Memory records recalled for the session, opaque provider JSON
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    records: Vec<Value>,
}

impl MemoryContext {
    #[must_use]
    pub const fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pretty-printed JSON for interpolation into the system instruction
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.records).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Client for the hosted memory provider
pub struct MemoryClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    user_id: String,
}

impl MemoryClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.mem0_api_key.clone(),
            base_url: config.memory_url.clone(),
            user_id: "Anshad".to_string(),
        }
    }

    /// Fetch recalled memories for the session user.
    ///
    /// Infallible: without a key the local fallback is returned, and a
    /// configured but unreachable provider falls back to a cached transcript.
    pub async fn fetch(&self) -> MemoryContext {
        let Some(key) = &self.api_key else {
            tracing::warn!("memory provider key not configured, using local fallback");
            return Self::local_fallback();
        };

        match self.fetch_remote(key).await {
            Ok(records) => {
                tracing::info!(count = records.len(), user = %self.user_id, "memories retrieved");
                MemoryContext::new(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "memory provider unreachable, using cached transcript");
                Self::transcript_fallback()
            }
        }
    }

    async fn fetch_remote(&self, key: &str) -> crate::Result<Vec<Value>> {
        let url = format!("{}/memories/?user_id={}", self.base_url, self.user_id);
        let records = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {key}"))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        Ok(records)
    }

    fn local_fallback() -> MemoryContext {
        MemoryContext::new(vec![json!({
            "memory": "Anshad likes Linkin Park",
            "updated_at": chrono::Utc::now().to_rfc3339(),
        })])
    }

    fn transcript_fallback() -> MemoryContext {
        MemoryContext::new(vec![
            json!({"role": "user", "content": "I really like ai projects."}),
            json!({"role": "assistant", "content": "That a great ."}),
            json!({"role": "user", "content": "I think so too."}),
            json!({"role": "assistant", "content": "What is your favorite job?"}),
            json!({
                "memory_summary": "User explicitly stated preference for ai projects.",
                "confidence": 0.98,
            }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_fallback_holds_the_single_cached_fact() {
        let ctx = MemoryClient::local_fallback();
        assert_eq!(ctx.len(), 1);
        assert!(ctx.to_json().contains("Anshad likes Linkin Park"));
        assert!(ctx.to_json().contains("updated_at"));
    }

    #[test]
    fn transcript_fallback_ends_with_a_summary_record() {
        let ctx = MemoryClient::transcript_fallback();
        assert_eq!(ctx.len(), 5);
        let json = ctx.to_json();
        assert!(json.contains("I really like ai projects."));
        assert!(json.contains("memory_summary"));
        assert!(json.contains("0.98"));
    }

    #[tokio::test]
    async fn unreachable_provider_resolves_to_the_transcript_fallback() {
        let config = Config {
            gemini_api_key: None,
            mem0_api_key: Some("m0-test".to_string()),
            live_url: String::new(),
            // Nothing listens on the discard port; the request fails fast
            memory_url: "http://127.0.0.1:9".to_string(),
        };

        let ctx = MemoryClient::new(&config).fetch().await;
        assert_eq!(ctx.len(), 5);
        assert!(ctx.to_json().contains("memory_summary"));
    }

    #[test]
    fn empty_context_renders_an_empty_array() {
        let ctx = MemoryContext::default();
        assert!(ctx.is_empty());
        assert_eq!(ctx.to_json(), "[]");
    }
}
