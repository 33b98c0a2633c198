// Finance API endpoint functions.
// Defines the fetch-source seam and implements it for the HTTP client.

use async_trait::async_trait;

use super::client::BudgetClient;
use super::error::RawError;
use super::types::BudgetPayload;

const DISTRIBUTION_ENDPOINT: &str = "/api/distribuicao-gastos";

/// Source of yearly expense distribution data.
#[async_trait]
pub trait DistributionSource: Send + Sync {
    async fn fetch_distribution(&self, year: i32) -> Result<BudgetPayload, RawError>;
}

#[async_trait]
impl DistributionSource for BudgetClient {
    async fn fetch_distribution(&self, year: i32) -> Result<BudgetPayload, RawError> {
        let params = [("ano", year.to_string())];
        let response = self.get_with_params(DISTRIBUTION_ENDPOINT, &params).await?;
        let payload: BudgetPayload = response.json().await?;
        Ok(payload)
    }
}
