use quote_harvester::automation::webdriver::WebDriverClient;
use quote_harvester::cli::{self, CliError, CrawlParams};
use quote_harvester::config::Config;
use quote_harvester::fetch::HttpQuoteFetcher;
use quote_harvester::services::export_service::ExportService;

use log::{debug, error};
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    let params = match cli::parse_args(std::env::args_os()) {
        Ok(params) => params,
        Err(CliError::Help(e)) => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e @ CliError::Usage(_)) => {
            eprintln!("{}", cli::USAGE);
            process::exit(e.exit_code());
        }
        Err(e @ CliError::Value(_)) => {
            if let CliError::Value(message) = &e {
                eprintln!("{}", message);
            }
            eprintln!("{}", cli::USAGE);
            process::exit(e.exit_code());
        }
    };

    debug!("Load markets from index: {}", params.market_from);
    debug!("Load instruments from index: {}", params.instr_from);
    debug!("Load data from: {}", params.date_from.format("%Y-%m-%d"));

    if let Err(e) = crawl(params).await {
        error!("Crawl failed: {}", e);
        process::exit(1);
    }
}

async fn crawl(params: CrawlParams) -> quote_harvester::Result<()> {
    debug!("Start automation session");
    let client = WebDriverClient::connect(&params.webdriver_url).await?;
    let fetcher = HttpQuoteFetcher::new()?;
    let config = Config::new().with_data_dir(&params.data_dir);

    ExportService::new(config, client, fetcher)
        .run(params.market_from, params.instr_from, params.date_from)
        .await
}
