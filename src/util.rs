use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// An export response counts as data iff the first two newline-delimited
/// lines are both non-empty (header plus at least one data row).
pub fn is_valid_quote_data(data: &str) -> bool {
    match data.find('\n') {
        Some(i) if i > 0 => data[i + 1..].find('\n').map_or(false, |j| j > 0),
        _ => false,
    }
}

/// Where one day of quotes for one instrument lands on disk.
pub fn day_file_path(data_dir: &str, market: &str, ticker: &str, day: NaiveDate) -> PathBuf {
    Path::new(data_dir)
        .join(market)
        .join(ticker)
        .join(format!("{}.csv", day.format("%Y-%m-%d")))
}
