use chrono::{Local, NaiveDate};
use clap::{App, Arg, ErrorKind};
use std::ffi::OsString;

pub const USAGE: &str = "quote_harvester -m <market_from> -i <instr_from> -d <from_date, YYYY-mm-dd>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlParams {
    pub market_from: usize,
    pub instr_from: usize,
    pub date_from: NaiveDate,
    pub webdriver_url: String,
    pub data_dir: String,
}

/// CLI failures, split by the exit code they map to.
#[derive(Debug)]
pub enum CliError {
    /// Help or version was requested; exit 0 after printing.
    Help(clap::Error),
    /// Unknown or malformed flags; exit 2.
    Usage(clap::Error),
    /// A flag value failed to parse (integer/date); exit 1.
    Value(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Help(_) => 0,
            CliError::Value(_) => 1,
            CliError::Usage(_) => 2,
        }
    }
}

fn command() -> App<'static> {
    App::new("quote_harvester")
        .about("Crawl the quote-export page and save per-day CSV quote files")
        .arg(
            Arg::with_name("market")
                .short('m')
                .long("market")
                .value_name("INDEX")
                .help("Starting market index")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("instr")
                .short('i')
                .long("instr")
                .value_name("INDEX")
                .help("Starting instrument index within the first market")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("from-date")
                .short('d')
                .long("from-date")
                .value_name("YYYY-MM-DD")
                .help("Day to start walking backward from (default: today)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("webdriver-url")
                .long("webdriver-url")
                .value_name("URL")
                .help("WebDriver endpoint driving the browser")
                .takes_value(true)
                .default_value("http://localhost:9515"),
        )
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory the per-day files are written under")
                .takes_value(true)
                .default_value("data"),
        )
}

pub fn parse_args<I, T>(args: I) -> Result<CrawlParams, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Err(CliError::Help(e))
        }
        Err(e) => return Err(CliError::Usage(e)),
    };

    let market_from = matches
        .value_of("market")
        .unwrap_or("0")
        .parse::<usize>()
        .map_err(|e| CliError::Value(format!("bad market index: {}", e)))?;
    let instr_from = matches
        .value_of("instr")
        .unwrap_or("0")
        .parse::<usize>()
        .map_err(|e| CliError::Value(format!("bad instrument index: {}", e)))?;
    let date_from = match matches.value_of("from-date") {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| CliError::Value(format!("bad from-date: {}", e)))?,
        None => Local::now().date_naive(),
    };

    Ok(CrawlParams {
        market_from,
        instr_from,
        date_from,
        webdriver_url: matches.value_of("webdriver-url").unwrap_or_default().to_string(),
        data_dir: matches.value_of("data-dir").unwrap_or_default().to_string(),
    })
}
