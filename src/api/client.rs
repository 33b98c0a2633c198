// Finance API HTTP client.
// Handles authentication and converts failed responses into raw errors.

use reqwest::{
    Client, Response,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::config::ApiConfig;
use crate::error::{FinError, Result};

use super::error::RawError;

/// Finance API client with optional bearer authentication.
#[derive(Debug, Clone)]
pub struct BudgetClient {
    client: Client,
    base_url: String,
}

impl BudgetClient {
    /// Create a new client from API settings.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| FinError::Other(e.to_string()))?,
            );
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("fincache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(FinError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> std::result::Result<Response, RawError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        check_response(response).await
    }
}

/// Check response status and convert failures.
async fn check_response(response: Response) -> std::result::Result<Response, RawError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.ok().filter(|b| !b.is_empty());
    tracing::debug!(status = status.as_u16(), "API returned an error status");
    Err(RawError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:3001/".to_string(),
            ..ApiConfig::default()
        };
        let client = BudgetClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001");
    }

    #[test]
    fn test_new_rejects_invalid_token() {
        let config = ApiConfig {
            token: Some("bad\ntoken".to_string()),
            ..ApiConfig::default()
        };
        assert!(matches!(BudgetClient::new(&config), Err(FinError::Other(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ApiConfig::default()
        };
        let client = BudgetClient::new(&config).unwrap();

        let result = client.get_with_params("/api/ping", &[("a", "b")]).await;
        assert!(matches!(result, Err(RawError::Network(_))));
    }
}
