// Budget selection state.
// Month/year selection over a cached yearly payload; only year changes hit the cache.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use serde_json::Value;
use tokio::sync::watch;

use crate::api::{BudgetPayload, DistributionSource};
use crate::cache::DataCache;
use crate::error::{FinError, Result};

use super::loading::LoadState;

/// Selected month/year plus the yearly payload it is derived from.
pub struct BudgetData<S> {
    cache: DataCache<S>,
    month: u32,
    year: i32,
    state: LoadState<Arc<BudgetPayload>>,
    updates: watch::Sender<LoadState<Arc<BudgetPayload>>>,
}

impl<S: DistributionSource> BudgetData<S> {
    /// Start at the current calendar month and year.
    pub fn new(cache: DataCache<S>) -> Self {
        let today = Local::now().date_naive();
        Self::at(cache, today.month(), today.year())
    }

    /// Start at an explicit month and year.
    pub fn with_selection(cache: DataCache<S>, month: u32, year: i32) -> Result<Self> {
        validate_month(month)?;
        Ok(Self::at(cache, month, year))
    }

    fn at(cache: DataCache<S>, month: u32, year: i32) -> Self {
        let (updates, _) = watch::channel(LoadState::Idle);
        Self {
            cache,
            month,
            year,
            state: LoadState::Idle,
            updates,
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn state(&self) -> &LoadState<Arc<BudgetPayload>> {
        &self.state
    }

    pub fn data(&self) -> Option<&BudgetPayload> {
        self.state.data().map(|payload| payload.as_ref())
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Follow load state transitions, including `Loading` while a fetch runs.
    pub fn subscribe(&self) -> watch::Receiver<LoadState<Arc<BudgetPayload>>> {
        self.updates.subscribe()
    }

    /// Load the selected year, from cache when possible.
    pub async fn load(&mut self) {
        self.load_data(self.year, false).await;
    }

    /// Select another month of the already loaded year. Never fetches.
    pub fn handle_month_change(&mut self, month: u32) -> Result<()> {
        validate_month(month)?;
        self.month = month;
        Ok(())
    }

    /// Select another year and load it. Selecting the current year does nothing.
    pub async fn handle_year_change(&mut self, year: i32) {
        if year == self.year {
            return;
        }
        self.year = year;
        self.load_data(year, false).await;
    }

    /// Reload the selected year, bypassing the cache.
    ///
    /// Call after mutating data elsewhere, e.g. replicating last month's entries.
    pub async fn refresh_data(&mut self) {
        self.load_data(self.year, true).await;
    }

    async fn load_data(&mut self, year: i32, force: bool) {
        self.transition(LoadState::Loading);

        let next = match self.cache.get_distribution(year, force).await {
            Ok(payload) => {
                tracing::debug!(
                    year,
                    months = payload.available_months.len(),
                    "Budget data loaded"
                );
                LoadState::Ready(Arc::new(payload))
            }
            Err(error) => {
                tracing::warn!(year, code = %error.code, "Budget data unavailable");
                LoadState::Errored(error.message)
            }
        };
        self.transition(next);
    }

    fn transition(&mut self, next: LoadState<Arc<BudgetPayload>>) {
        self.updates.send_replace(next.clone());
        self.state = next;
    }

    /// Data for the selected month, if the payload has any.
    pub fn current_month_data(&self) -> Option<&Value> {
        self.data()?.month(self.month)
    }

    /// Whether the payload lists the selected month as available.
    pub fn has_data_for_selected_month(&self) -> bool {
        self.data()
            .map(|payload| payload.has_month(self.month))
            .unwrap_or(false)
    }

    /// Whether the selection is today's month and year.
    pub fn is_current_month_year(&self) -> bool {
        self.is_current_month_year_at(Local::now().date_naive())
    }

    pub fn is_current_month_year_at(&self, today: NaiveDate) -> bool {
        self.month == today.month() && self.year == today.year()
    }
}

fn validate_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(FinError::InvalidMonth(month))
    }
}
