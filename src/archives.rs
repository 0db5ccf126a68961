use crate::errors::Result;
use log::{info, warn};
use reqwest::Client;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::time::Duration;
use zip::ZipArchive;

const ARCHIVE_BASE: &str = "https://www.moex.com";

/// Downloads the exchange's daily trade dumps: one zip-compressed CSV per
/// trading day, covering every listed share.
pub struct ArchiveDownloader {
    client: Client,
    base_url: String,
}

/// URL path of the archive for one day, zero-padded.
pub fn archive_path(year: i32, month: u32, day: u32) -> String {
    format!(
        "/iss/downloads/engines/stock/markets/shares/years/{year:04}/months/{month:02}/days/{day:02}/trades_micex_stock_shares_{year:04}_{month:02}_{day:02}.csv.zip"
    )
}

impl ArchiveDownloader {
    pub fn new() -> Result<Self> {
        Self::with_base_url(ARCHIVE_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch and unpack one day's trade archive.
    ///
    /// Returns every entry as filename → decompressed bytes. A body that is
    /// not a readable zip means there was no trading that day (weekends,
    /// holidays) and yields an empty map; network and HTTP errors propagate.
    pub async fn download_day_archive(
        &self,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let url = format!("{}{}", self.base_url, archive_path(year, month, day));
        info!("Downloading trade archive {}", url);

        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        match extract_entries(&bytes) {
            Ok(entries) => {
                info!("Archive holds {} file(s)", entries.len());
                Ok(entries)
            }
            Err(e) => {
                warn!("No readable archive at {}: {}", url, e);
                Ok(HashMap::new())
            }
        }
    }
}

fn extract_entries(bytes: &[u8]) -> std::result::Result<HashMap<String, Vec<u8>>, zip::result::ZipError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = HashMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content).map_err(zip::result::ZipError::Io)?;
        entries.insert(entry.name().to_string(), content);
    }
    Ok(entries)
}
