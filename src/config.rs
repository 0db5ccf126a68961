use std::time::Duration;

/// Crawl tuning knobs, all defaulting to the values the export site tolerates.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    /// Retries after the initial fetch attempt, transient errors only.
    pub max_fetch_retries: u32,
    pub retry_delay: Duration,
    /// Consecutive invalid/empty days before giving up on an instrument.
    pub max_data_fails: u32,
    /// How far back the per-instrument day loop walks.
    pub num_days: u32,
    /// Wait bound for the market dropdown to appear.
    pub selector_timeout: Duration,
    /// Reset the day-loop start date to "today" after each instrument.
    pub start_date_reset: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            data_dir: "data".to_string(),
            max_fetch_retries: 10,
            retry_delay: Duration::from_secs(3),
            max_data_fails: 60,
            num_days: 30 * 365,
            selector_timeout: Duration::from_secs(3),
            start_date_reset: true,
        }
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.data_dir = dir.to_string();
        self
    }

    pub fn with_max_fetch_retries(mut self, retries: u32) -> Self {
        self.max_fetch_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_data_fails(mut self, fails: u32) -> Self {
        self.max_data_fails = fails;
        self
    }

    pub fn with_num_days(mut self, days: u32) -> Self {
        self.num_days = days;
        self
    }

    pub fn with_selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    pub fn with_start_date_reset(mut self, reset: bool) -> Self {
        self.start_date_reset = reset;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
