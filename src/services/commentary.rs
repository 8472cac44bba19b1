use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::services::templates::{build_prompt, local_comment, system_prompt, CommentContext};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECONDS: u64 = 20;
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 300;
const CACHE_TTL_SECONDS: u64 = 300;
const CACHE_CLEANUP_THRESHOLD: usize = 100;

struct CommentCacheEntry {
    comment: String,
    timestamp: Instant,
}

/// Produces sommelier commentary for ranked results and single wines.
/// Uses an OpenAI-compatible chat completions API when a key is
/// configured; any failure falls back to deterministic local text, so
/// callers always get a comment.
#[derive(Clone)]
pub struct CommentaryGenerator {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
    cache: Arc<RwLock<HashMap<String, CommentCacheEntry>>>,
    cache_ttl: Duration,
}

impl CommentaryGenerator {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.openai_api_key.clone(),
            api_url: format!("{}/chat/completions", config.openai_api_base),
            model: config.openai_model.clone(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECONDS),
        }
    }

    /// Generates a comment for the given context. Infallible by design:
    /// an unconfigured key, a transport error, or a malformed response
    /// all resolve to the local template text.
    pub async fn generate_comment(&self, context: &CommentContext<'_>) -> String {
        let cache_key = context.cache_key();

        if let Ok(cache) = self.cache.read() {
            if let Some(entry) = cache.get(&cache_key) {
                if entry.timestamp.elapsed() < self.cache_ttl {
                    debug!("Cache HIT for comment: {}", cache_key);
                    return entry.comment.clone();
                }
            }
        }

        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No completion API key configured, using local comment");
            return local_comment(context);
        };

        match self.request_completion(api_key, context).await {
            Ok(comment) => {
                if let Ok(mut cache) = self.cache.write() {
                    cache.insert(
                        cache_key,
                        CommentCacheEntry {
                            comment: comment.clone(),
                            timestamp: Instant::now(),
                        },
                    );
                    if cache.len() > CACHE_CLEANUP_THRESHOLD {
                        let ttl = self.cache_ttl;
                        cache.retain(|_, entry| entry.timestamp.elapsed() < ttl);
                    }
                }
                comment
            }
            Err(e) => {
                warn!("Comment generation failed ({}), using local comment", e);
                local_comment(context)
            }
        }
    }

    async fn request_completion(
        &self,
        api_key: &str,
        context: &CommentContext<'_>,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: String,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        let request = Request {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt(context),
                },
                Message {
                    role: "user",
                    content: build_prompt(context),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!("Requesting {} comment from completion API", context.kind());

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Completion API returned {}: {}",
                status, text
            )));
        }

        let parsed: Response = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::ExternalServiceError(
                    "Completion API returned no choices".to_string(),
                )
            })
    }
}
