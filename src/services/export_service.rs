use crate::automation::AutomationClient;
use crate::config::Config;
use crate::errors::Result;
use crate::fetch::{export_link, load_url, FetchError, QuoteFetcher};
use crate::models::market::{Instrument, Market};
use crate::selector::QuoteSelector;
use crate::util::{day_file_path, is_valid_quote_data};
use chrono::{Duration, Local, NaiveDate};
use log::{debug, error, info};
use std::fs;
use std::io::BufRead;

/// The interactive export crawl: walks every (market, instrument, day)
/// combination the export page offers and writes each non-empty day of
/// quotes to its own file.
pub struct ExportService<C: AutomationClient, F: QuoteFetcher> {
    config: Config,
    selector: QuoteSelector<C>,
    fetcher: F,
}

impl<C: AutomationClient, F: QuoteFetcher> ExportService<C, F> {
    pub fn new(config: Config, client: C, fetcher: F) -> Self {
        let selector = QuoteSelector::new(client, config.selector_timeout);
        Self {
            config,
            selector,
            fetcher,
        }
    }

    /// Run the crawl to completion, waiting for an Enter keypress before
    /// releasing the session. The session is closed on every exit path:
    /// crawl errors, acknowledgment errors, and normal completion.
    pub async fn run(
        self,
        market_from: usize,
        instr_from: usize,
        date_from: NaiveDate,
    ) -> Result<()> {
        self.run_with_ack(market_from, instr_from, date_from, wait_for_ack)
            .await
    }

    async fn run_with_ack<A>(
        mut self,
        market_from: usize,
        instr_from: usize,
        date_from: NaiveDate,
        ack: A,
    ) -> Result<()>
    where
        A: FnOnce() -> std::io::Result<()>,
    {
        let outcome = self.crawl(market_from, instr_from, date_from).await;
        let acked = if outcome.is_ok() { ack() } else { Ok(()) };
        debug!("Close automation session");
        let closed = self.selector.close().await;
        outcome?;
        acked?;
        closed
    }

    async fn crawl(
        &mut self,
        market_from: usize,
        mut instr_from: usize,
        mut d_start: NaiveDate,
    ) -> Result<()> {
        self.selector.open().await?;
        debug!("Looking for markets and instruments");
        let market_codes = self.selector.market_codes().await?;
        let total_markets = market_codes.len();
        info!("Total markets: {}", total_markets.saturating_sub(market_from));

        for m in market_from..total_markets {
            self.selector.select_market(m).await?;
            let instrument_codes = self.selector.instrument_codes().await?;
            let total_instruments = instrument_codes.len();

            // The page URL only reflects the market after something got
            // selected, so pick the starting instrument first.
            self.selector.select_instrument(instr_from).await?;
            let market = Market {
                code: market_codes[m].clone(),
                name: self.selector.market_name().await?,
            };
            info!(
                "Total instruments: {} for {}, index: {}",
                total_instruments.saturating_sub(instr_from),
                market.name,
                m
            );

            for i in instr_from..total_instruments {
                self.selector.select_instrument(i).await?;
                let instrument = Instrument {
                    code: instrument_codes[i].clone(),
                    name: self.selector.instrument_name().await?,
                    ticker: self.selector.instrument_ticker().await?,
                };
                info!(
                    "Market {} -> instrument {}: {} by {}, index: {}",
                    market.name, instrument.name, instrument.ticker, instrument.code, i
                );

                self.fetch_instrument_days(&market, &instrument, d_start, i, m)
                    .await?;

                // Observed behavior of the original tool: every instrument
                // after the first one starts from today.
                if self.config.start_date_reset {
                    d_start = Local::now().date_naive();
                }
            }

            instr_from = 0;
        }

        Ok(())
    }

    /// Walk one instrument's days backward from `d_start`, saving every
    /// valid response. Gives up after `max_data_fails` consecutive invalid
    /// days. Returns the number of files written.
    async fn fetch_instrument_days(
        &self,
        market: &Market,
        instrument: &Instrument,
        d_start: NaiveDate,
        instr_index: usize,
        market_index: usize,
    ) -> Result<u32> {
        let mut fails = 0u32;
        let mut saved = 0u32;

        for offset in 0..self.config.num_days {
            let day = d_start - Duration::days(offset as i64);
            let url = export_link(
                &market.code,
                &instrument.ticker,
                &instrument.code,
                day,
                day,
            );

            let data = match load_url(
                &self.fetcher,
                &url,
                self.config.max_fetch_retries,
                self.config.retry_delay,
            )
            .await
            {
                Ok(data) => data,
                Err(e @ FetchError::RetriesExhausted { .. }) => {
                    error!("Can't load url: {}", e);
                    String::new()
                }
                Err(e) => return Err(e.into()),
            };

            if is_valid_quote_data(&data) {
                fails = 0;
                info!(
                    "Saving data for {} by {}, i: {}, m: {}",
                    instrument.ticker,
                    day.format("%Y-%m-%d"),
                    instr_index,
                    market_index
                );
                let path = day_file_path(&self.config.data_dir, &market.name, &instrument.ticker, day);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &data)?;
                saved += 1;
            } else {
                fails += 1;
            }

            if fails >= self.config.max_data_fails {
                debug!(
                    "{} consecutive invalid days for {}, moving on",
                    fails, instrument.ticker
                );
                break;
            }
        }

        Ok(saved)
    }
}

fn wait_for_ack() -> std::io::Result<()> {
    println!("Press Enter to close...");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{Element, Locator};
    use crate::errors::HarvesterError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;

    const PAGE_TITLE: &str = "Финам.ru - Экспорт котировок";

    struct InstrumentFixture {
        text: &'static str,
        code: &'static str,
        slug: &'static str,
        ticker: &'static str,
    }

    struct MarketFixture {
        text: &'static str,
        code: &'static str,
        slug: &'static str,
        instruments: Vec<InstrumentFixture>,
    }

    #[derive(Default)]
    struct StubState {
        selected_market: usize,
        selected_instrument: usize,
        closed: bool,
    }

    /// Scripted stand-in for the export page: fixed dropdown contents,
    /// selection tracked through `execute_script` clicks, URL derived from
    /// the current selection.
    struct ScriptedClient {
        markets: Vec<MarketFixture>,
        state: Arc<Mutex<StubState>>,
    }

    impl ScriptedClient {
        fn fixture(state: Arc<Mutex<StubState>>) -> Self {
            Self {
                markets: vec![
                    // Ignore-listed pseudo-market, must be skipped.
                    MarketFixture {
                        text: "Отрасли",
                        code: "91",
                        slug: "otrasli",
                        instruments: vec![],
                    },
                    MarketFixture {
                        text: "МосБиржа акции",
                        code: "1",
                        slug: "moex-akcii",
                        instruments: vec![
                            InstrumentFixture {
                                text: "не выбрано",
                                code: "0",
                                slug: "none",
                                ticker: "",
                            },
                            InstrumentFixture {
                                text: "Яндекс",
                                code: "388383",
                                slug: "yandeks",
                                ticker: "YNDX",
                            },
                        ],
                    },
                ],
                state,
            }
        }

        fn current(&self) -> (usize, usize) {
            let state = self.state.lock().unwrap();
            (state.selected_market, state.selected_instrument)
        }
    }

    #[async_trait]
    impl AutomationClient for ScriptedClient {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn title(&mut self) -> Result<String> {
            Ok(PAGE_TITLE.to_string())
        }

        async fn current_url(&mut self) -> Result<String> {
            let (m, i) = self.current();
            let market = &self.markets[m];
            let slug = market.instruments.get(i).map_or("none", |inst| inst.slug);
            Ok(format!(
                "https://www.finam.ru/profile/{}/{}/export/?market={}",
                market.slug, slug, market.code
            ))
        }

        async fn find_element(&mut self, locator: &Locator) -> Result<Element> {
            let Locator::XPath(xpath) = locator;
            let id = if xpath.contains("selector-market") {
                "market-toggle"
            } else if xpath.contains("selector-quote") {
                "instrument-toggle"
            } else if xpath.contains("export-contract") {
                "ticker-field"
            } else {
                return Err(HarvesterError::AutomationError(format!(
                    "no such element: {}",
                    xpath
                )));
            };
            Ok(Element { id: id.to_string() })
        }

        async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>> {
            let Locator::XPath(xpath) = locator;
            if xpath.contains("ui-dropdown-list\")][1]") {
                Ok((0..self.markets.len())
                    .map(|k| Element {
                        id: format!("market-{}", k),
                    })
                    .collect())
            } else if xpath.contains("ui-dropdown-list\")][2]") {
                let (m, _) = self.current();
                Ok((0..self.markets[m].instruments.len())
                    .map(|k| Element {
                        id: format!("instrument-{}", k),
                    })
                    .collect())
            } else {
                Ok(Vec::new())
            }
        }

        async fn wait_until_present(
            &mut self,
            locator: &Locator,
            _timeout: StdDuration,
        ) -> Result<Element> {
            self.find_element(locator).await
        }

        async fn click(&mut self, _element: &Element) -> Result<()> {
            Ok(())
        }

        async fn execute_script(&mut self, _script: &str, element: &Element) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(k) = element.id.strip_prefix("market-") {
                state.selected_market = k.parse().unwrap();
                state.selected_instrument = 0;
            } else if let Some(k) = element.id.strip_prefix("instrument-") {
                state.selected_instrument = k.parse().unwrap();
            }
            Ok(())
        }

        async fn text(&mut self, element: &Element) -> Result<String> {
            if let Some(k) = element.id.strip_prefix("market-") {
                let k: usize = k.parse().unwrap();
                Ok(self.markets[k].text.to_string())
            } else if let Some(k) = element.id.strip_prefix("instrument-") {
                let (m, _) = self.current();
                let k: usize = k.parse().unwrap();
                Ok(self.markets[m].instruments[k].text.to_string())
            } else {
                Ok(String::new())
            }
        }

        async fn attribute(&mut self, element: &Element, _name: &str) -> Result<Option<String>> {
            if let Some(k) = element.id.strip_prefix("market-") {
                let k: usize = k.parse().unwrap();
                Ok(Some(self.markets[k].code.to_string()))
            } else if let Some(k) = element.id.strip_prefix("instrument-") {
                let (m, _) = self.current();
                let k: usize = k.parse().unwrap();
                Ok(Some(self.markets[m].instruments[k].code.to_string()))
            } else if element.id == "ticker-field" {
                let (m, i) = self.current();
                Ok(self.markets[m].instruments.get(i).map(|inst| inst.ticker.to_string()))
            } else {
                Ok(None)
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct ScriptedFetcher {
        calls: AtomicU32,
        log: Mutex<Vec<String>>,
        valid_first_n: u32,
    }

    impl ScriptedFetcher {
        fn new(valid_first_n: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                log: Mutex::new(Vec::new()),
                valid_first_n,
            }
        }
    }

    #[async_trait]
    impl QuoteFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(url.to_string());
            if call < self.valid_first_n {
                Ok("<TICKER>;<DATE>;<CLOSE>\nYNDX;20200105;42.0\n".to_string())
            } else {
                Ok("<TICKER>;<DATE>;<CLOSE>\n".to_string())
            }
        }
    }

    fn test_config(data_dir: &str) -> Config {
        Config::new()
            .with_data_dir(data_dir)
            .with_retry_delay(StdDuration::ZERO)
            .with_start_date_reset(false)
    }

    fn scratch_dir(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("quote_harvester_{}_{}", tag, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    fn market() -> Market {
        Market {
            code: "1".to_string(),
            name: "moex-akcii".to_string(),
        }
    }

    fn instrument() -> Instrument {
        Instrument {
            code: "388383".to_string(),
            name: "yandeks".to_string(),
            ticker: "YNDX".to_string(),
        }
    }

    #[tokio::test]
    async fn day_loop_stops_after_sixty_consecutive_invalid_days() {
        let state = Arc::new(Mutex::new(StubState::default()));
        let service = ExportService::new(
            test_config(&scratch_dir("dayloop")),
            ScriptedClient::fixture(state),
            ScriptedFetcher::new(0),
        );
        let d_start = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        let saved = service
            .fetch_instrument_days(&market(), &instrument(), d_start, 0, 0)
            .await
            .unwrap();

        assert_eq!(saved, 0);
        assert_eq!(service.fetcher.calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test]
    async fn valid_day_resets_failure_counter_and_writes_file() {
        let data_dir = scratch_dir("write");
        let state = Arc::new(Mutex::new(StubState::default()));
        let config = test_config(&data_dir).with_num_days(5);
        let service = ExportService::new(
            config,
            ScriptedClient::fixture(state),
            ScriptedFetcher::new(1),
        );
        let d_start = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        let saved = service
            .fetch_instrument_days(&market(), &instrument(), d_start, 0, 0)
            .await
            .unwrap();

        assert_eq!(saved, 1);
        // All five days get fetched; only the first was valid.
        assert_eq!(service.fetcher.calls.load(Ordering::SeqCst), 5);
        let path = day_file_path(&data_dir, "moex-akcii", "YNDX", d_start);
        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("<TICKER>"));
        fs::remove_dir_all(&data_dir).unwrap();
    }

    #[tokio::test]
    async fn crawl_skips_ignored_entries_and_exports_per_day_files() {
        let data_dir = scratch_dir("crawl");
        let state = Arc::new(Mutex::new(StubState::default()));
        let config = test_config(&data_dir).with_num_days(2);
        let mut service = ExportService::new(
            config,
            ScriptedClient::fixture(state),
            ScriptedFetcher::new(1),
        );
        let d_start = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        service.crawl(0, 0, d_start).await.unwrap();

        // The only crawlable pair is the non-ignored market and instrument.
        let urls = service.fetcher.log.lock().unwrap().clone();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("market=1"));
        assert!(urls[0].contains("em=388383"));
        assert!(urls[0].contains("code=YNDX"));

        let path = day_file_path(&data_dir, "moex-akcii", "YNDX", d_start);
        assert!(path.exists());
        fs::remove_dir_all(&data_dir).unwrap();
    }

    #[tokio::test]
    async fn run_closes_session_when_acknowledgment_fails() {
        let data_dir = scratch_dir("ack");
        let state = Arc::new(Mutex::new(StubState::default()));
        let config = test_config(&data_dir).with_num_days(2);
        let service = ExportService::new(
            config,
            ScriptedClient::fixture(Arc::clone(&state)),
            ScriptedFetcher::new(1),
        );
        let d_start = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        let result = service
            .run_with_ack(0, 0, d_start, || {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "stdin was not valid UTF-8",
                ))
            })
            .await;

        assert!(matches!(result, Err(HarvesterError::IoError(_))));
        assert!(state.lock().unwrap().closed);
        fs::remove_dir_all(&data_dir).unwrap();
    }

    #[tokio::test]
    async fn run_closes_session_when_crawl_errors() {
        let state = Arc::new(Mutex::new(StubState::default()));
        let service = ExportService::new(
            test_config(&scratch_dir("close")),
            ScriptedClient::fixture(Arc::clone(&state)),
            ScriptedFetcher::new(0),
        );
        let d_start = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        // Starting instrument index beyond the filtered list.
        let result = service.run(0, 7, d_start).await;

        assert!(matches!(
            result,
            Err(HarvesterError::IndexOutOfRange { what: "instrument", index: 7, .. })
        ));
        assert!(state.lock().unwrap().closed);
    }
}
