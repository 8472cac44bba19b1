use anyhow::Result;
use dotenv::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub wine_data_path: Option<String>,
    pub wine_data_url: Option<String>,
    pub embeddings_path: Option<String>,
    pub embeddings_url: Option<String>,
    pub cache_dir: String,
    pub cache_ttl_secs: u64,
    pub max_records: usize,
    pub huggingface_api_key: Option<String>,
    pub huggingface_model: String,
    pub huggingface_api_base: String,
    pub embed_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            wine_data_path: optional_var("WINE_DATA_PATH"),
            wine_data_url: optional_var("WINE_DATA_URL"),
            embeddings_path: optional_var("WINE_EMBEDDINGS_PATH"),
            embeddings_url: optional_var("WINE_EMBEDDINGS_URL"),
            cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| ".cache".to_string()),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400),
            max_records: env::var("MAX_WINE_RECORDS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            huggingface_api_key: optional_var("HUGGINGFACE_API_KEY"),
            huggingface_model: env::var("HUGGINGFACE_MODEL")
                .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
            huggingface_api_base: env::var("HUGGINGFACE_API_BASE")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            embed_timeout_secs: env::var("EMBED_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            openai_api_base: env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        })
    }
}

/// Reads an env var, treating unset and empty as absent.
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        env::remove_var("PORT");
        env::remove_var("CACHE_TTL_SECS");
        env::remove_var("MAX_WINE_RECORDS");

        let config = Config::from_env().unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.cache_ttl_secs, 86_400);
        assert_eq!(config.max_records, 1000);
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_optional_var_ignores_empty() {
        env::set_var("TEST_OPTIONAL_EMPTY", "");
        assert_eq!(optional_var("TEST_OPTIONAL_EMPTY"), None);
        env::remove_var("TEST_OPTIONAL_EMPTY");

        env::set_var("TEST_OPTIONAL_SET", "value");
        assert_eq!(optional_var("TEST_OPTIONAL_SET"), Some("value".to_string()));
        env::remove_var("TEST_OPTIONAL_SET");
    }
}
