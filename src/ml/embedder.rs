use crate::config::Config;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const CONNECTION_TIMEOUT_SECONDS: u64 = 15;

/// Capability for turning free text into a fixed-length vector.
/// Injected into the ranker; absent when no provider is configured.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Query embedder backed by the HuggingFace Inference API.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    model_url: String,
    model_name: String,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.huggingface_api_key.clone().ok_or_else(|| {
            ApiError::EmbeddingError("Missing HuggingFace API key".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.embed_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let model_url = format!(
            "{}/models/{}",
            config.huggingface_api_base, config.huggingface_model
        );

        Ok(Self {
            client,
            api_key,
            model_url,
            model_name: config.huggingface_model.clone(),
        })
    }

    async fn request_embedding(&self, input: &str) -> Result<serde_json::Value> {
        #[derive(Serialize)]
        struct Request<'a> {
            inputs: &'a str,
            options: Options,
        }

        #[derive(Serialize)]
        struct Options {
            wait_for_model: bool,
            use_cache: bool,
        }

        let request = Request {
            inputs: input,
            options: Options {
                wait_for_model: true,
                use_cache: true,
            },
        };

        let response = self
            .client
            .post(&self.model_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ApiError::EmbeddingError(format!("Failed to send request to model API: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                404 => ApiError::EmbeddingError(format!(
                    "Model not found: {}. Please check the model name in your configuration.",
                    self.model_name
                )),
                401 | 403 => ApiError::EmbeddingError(
                    "Authentication failed. Please check your HuggingFace API key.".to_string(),
                ),
                429 => ApiError::EmbeddingError(
                    "Rate limit exceeded. Please reduce the frequency of your requests."
                        .to_string(),
                ),
                _ => ApiError::EmbeddingError(format!(
                    "HuggingFace API returned non-success status: {} - {}",
                    status, text
                )),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::EmbeddingError(format!("Failed to parse response as JSON: {}", e)))
    }
}

#[async_trait]
impl TextEmbedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = preprocess_text(text);

        debug!(
            "Encoding text (length: {}): {}",
            input.len(),
            &input[..input.len().min(100)]
        );

        let response = self.request_embedding(&input).await?;
        let embedding = extract_embedding(&response)?;

        debug!("Got embedding of size {} from HuggingFace API", embedding.len());

        Ok(normalize_vector(&embedding))
    }
}

fn preprocess_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty text".to_string();
    }
    trimmed.to_string()
}

/// Pulls a single vector out of the provider response, which may be a
/// bare array, an array of arrays, or an object wrapping either under
/// an `embedding`/`embeddings` key.
fn extract_embedding(response: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = if let Some(array) = response.as_array() {
        if array.is_empty() {
            return Err(ApiError::EmbeddingError(
                "Received empty array from model".to_string(),
            ));
        }
        if let Some(first) = array[0].as_array() {
            collect_floats(first)
        } else {
            collect_floats(array)
        }
    } else if let Some(object) = response.as_object() {
        if let Some(single) = object.get("embedding").and_then(|v| v.as_array()) {
            collect_floats(single)
        } else if let Some(nested) = object
            .get("embeddings")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows.first())
            .and_then(|row| row.as_array())
        {
            collect_floats(nested)
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    if embedding.is_empty() {
        return Err(ApiError::EmbeddingError(
            "Failed to extract embedding from response".to_string(),
        ));
    }

    Ok(embedding)
}

fn collect_floats(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Normalizes a vector to unit length; a zero vector stays zero.
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let squared_sum: f32 = vector.iter().map(|&x| x * x).sum();
    let magnitude = squared_sum.sqrt();

    if magnitude > 0.0 {
        vector.iter().map(|&x| x / magnitude).collect()
    } else {
        vec![0.0; vector.len()]
    }
}
