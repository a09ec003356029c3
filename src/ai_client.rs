use crate::config::Config;
use crate::errors::AppError;
use serde_json::json;
use std::time::Duration;

/// Client for the Gemini generation API.
///
/// Constructed once at startup and reused across requests. Sampling is
/// near-deterministic to keep pricing in the output stable between retries.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Model identifier recorded against each recommendation.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Sends exactly one generation request and returns the raw text of the
    /// first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "topP": 0.8,
                "maxOutputTokens": 2048
            }
        });

        tracing::info!("Requesting recommendation from model {}", self.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini returned status {}: {}",
                status, error_text
            )));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Gemini response: {}", e))
        })?;

        // Candidate text can live at slightly different paths depending on
        // the model version
        let text = data
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .or_else(|| {
                data.get("candidates")
                    .and_then(|c| c.get(0))
                    .and_then(|c| c.get("text"))
                    .and_then(|t| t.as_str())
            });

        match text {
            Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
            _ => {
                tracing::warn!("Gemini response carried no candidate text");
                Err(AppError::ResponseParse(
                    "Model response contained no text".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            database_url: "postgresql://test".to_string(),
            port: 3000,
            gemini_api_key: "test-key".to_string(),
            gemini_base_url: "https://example.com".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            openweather_api_key: None,
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            nominatim_base_url: "https://nominatim.openstreetmap.org".to_string(),
            ip_api_base_url: "http://ip-api.com".to_string(),
        }
    }

    #[test]
    fn client_creation() {
        let client = GeminiClient::new(&test_config());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().model_name(), "gemini-1.5-flash");
    }
}
