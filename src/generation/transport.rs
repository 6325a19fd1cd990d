use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::payload::GenerateContentRequest;

/// Raw HTTP outcome of one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body, or the raw text wrapped in `Value::String` when the
    /// body is not JSON.
    pub body: Value,
}

/// Sends one request for one model. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<TransportResponse, String>;
}

/// `generateContent` over HTTPS.
pub struct GeminiTransport {
    base_url: String,
    client: reqwest::Client,
}

impl GeminiTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn send(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<TransportResponse, String> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json; charset=utf-8")
            .json(request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(TransportResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model_and_trims_slash() {
        let transport = GeminiTransport::new("https://example.test/");
        assert_eq!(
            transport.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
