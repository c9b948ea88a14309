use super::types::TextMetadata;
use crate::error::{ReaderError, Result};

/// HTTP client for the sentence service.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    server_url: String,
    token: Option<String>,
}

impl MetadataFetcher {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into(),
            token: None,
        }
    }

    /// Attach the session token sent as the `session` cookie.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/sentence_measure", self.server_url.trim_end_matches('/'))
    }

    /// Split `raw_text` into sentences server-side.
    ///
    /// A single request with no retry: without metadata there is nothing to
    /// play, so failures go straight back to the caller.
    pub async fn fetch_metadata(&self, raw_text: &str) -> Result<TextMetadata> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&serde_json::json!({ "text": raw_text }));
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::COOKIE, format!("session={token}"));
        }

        tracing::info!(chars = raw_text.len(), "Fetching sentence metadata");
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ReaderError::Authentication);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Sentence service rejected the text");
            return Err(ReaderError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let metadata: TextMetadata = response.json().await?;
        metadata.validate()?;
        tracing::info!(
            text_id = %metadata.text_id,
            sentences = metadata.num_sentences,
            "Sentence metadata received"
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(
            MetadataFetcher::new("https://localhost:8000/").endpoint(),
            "https://localhost:8000/sentence_measure"
        );
        assert_eq!(
            MetadataFetcher::new("https://localhost:8000").endpoint(),
            "https://localhost:8000/sentence_measure"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let fetcher = MetadataFetcher::new("http://127.0.0.1:9");
        let err = fetcher.fetch_metadata("Hello there.").await.unwrap_err();
        assert!(matches!(err, ReaderError::Network(_)));
        assert!(err.is_fatal());
    }
}
