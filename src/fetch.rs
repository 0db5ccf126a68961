use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::debug;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

const EXPORT_BASE: &str = "http://export.finam.ru/";

/// Failures of a single-day quote fetch.
///
/// Only `Transient` is worth retrying; everything else reflects a broken
/// request or remote and is surfaced to the caller as-is.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transient network error fetching {url}: {message}")]
    Transient { url: String, message: String },

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("giving up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// One HTTP GET of a quote-export URL. Split out as a trait so the retry
/// loop and the day loop can be exercised against stubs.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpQuoteFetcher {
    client: Client,
}

impl HttpQuoteFetcher {
    pub fn new() -> crate::errors::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    fn classify(url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() || error.is_connect() {
            FetchError::Transient {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            FetchError::Request(error)
        }
    }
}

#[async_trait]
impl QuoteFetcher for HttpQuoteFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(body)
    }
}

/// Fetch a URL with a bounded retry loop: one initial attempt plus up to
/// `max_retries` retries, sleeping `retry_delay` between attempts. Only
/// transient errors are retried; exhausting the budget yields
/// `RetriesExhausted` so callers can log and move on to the next day.
pub async fn load_url<F>(
    fetcher: &F,
    url: &str,
    max_retries: u32,
    retry_delay: Duration,
) -> Result<String, FetchError>
where
    F: QuoteFetcher + ?Sized,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match fetcher.fetch(url).await {
            Ok(data) => return Ok(data),
            Err(FetchError::Transient { message, .. }) if attempts <= max_retries => {
                debug!(
                    "Transient failure on {} (attempt {}): {}",
                    url, attempts, message
                );
                sleep(retry_delay).await;
            }
            Err(FetchError::Transient { .. }) => {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts,
                })
            }
            Err(other) => return Err(other),
        }
    }
}

/// Build the single-day export URL for one instrument.
///
/// The endpoint wants the date both dotted (`%d.%m.%Y`) and compact
/// (`%y%m%d`), and 0-based month fields. The remaining flags select the
/// CSV layout the site's export form produces by default.
pub fn export_link(
    market_code: &str,
    ticker: &str,
    instrument_code: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> String {
    let from_dot = date_from.format("%d.%m.%Y").to_string();
    let to_dot = date_to.format("%d.%m.%Y").to_string();
    let from_compact = date_from.format("%y%m%d").to_string();
    let to_compact = date_to.format("%y%m%d").to_string();

    let mut url = Url::parse(EXPORT_BASE).unwrap();
    url.set_path(&format!("{}_{}_{}.csv", ticker, from_dot, to_dot));

    let pairs: Vec<(&str, String)> = vec![
        ("market", market_code.to_string()),
        ("em", instrument_code.to_string()),
        ("code", ticker.to_string()),
        ("apply", "0".to_string()),
        ("df", date_from.day().to_string()),
        ("mf", date_from.month0().to_string()),
        ("yf", date_from.year().to_string()),
        ("from", from_dot.clone()),
        ("dt", date_to.day().to_string()),
        ("mt", date_to.month0().to_string()),
        ("yt", date_to.year().to_string()),
        ("to", to_dot),
        ("p", "1".to_string()),
        ("f", format!("{}_{}_{}", ticker, from_compact, to_compact)),
        ("e", ".csv".to_string()),
        ("cn", ticker.to_string()),
        ("dtf", "1".to_string()),
        ("tmf", "1".to_string()),
        ("MSOR", "1".to_string()),
        ("mstime", "on".to_string()),
        ("mstimever", "1".to_string()),
        ("sep", "1".to_string()),
        ("sep2", "1".to_string()),
        ("datf", "6".to_string()),
        ("at", "1".to_string()),
    ];
    url.query_pairs_mut().extend_pairs(pairs);

    url.to_string()
}
