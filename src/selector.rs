use crate::automation::{AutomationClient, Element, Locator};
use crate::errors::{HarvesterError, Result};
use log::debug;
use std::time::Duration;

/// Landing page of the quote-export form.
pub const EXPORT_URL: &str = "https://www.finam.ru/profile/moex-akcii/mosenrg/export/?market=1";
const EXPORT_PAGE_TITLE: &str = "Финам.ru - Экспорт котировок";

const MARKETS_CLICK: &str = "//div[contains(@class, \"finam-ui-quote-selector-market\")]/div[1]";
const MARKETS_SELECTOR: &str = "//div[contains(@class,\"ui-dropdown-list\")][1]/div/ul/li/a";
const INSTRUMENTS_CLICK: &str = "//div[contains(@class, \"finam-ui-quote-selector-quote\")]/div[1]";
const INSTRUMENTS_SELECTOR: &str = "//div[contains(@class,\"ui-dropdown-list\")][2]/div/ul/li/a";
const TICKER_SELECTOR: &str = "//*[@id=\"issuer-profile-export-contract\"]";

// Aggregate/archival pseudo-markets on the selector that carry no
// exportable instruments.
const IGNORE_MARKETS: &[&str] = &[
    "МосБиржа топ",
    "ФОРТС Архив",
    "Сырье Архив",
    "RTS Standard Архив",
    "ММВБ Архив",
    "РТС Архив",
    "СПФБ Архив",
    "РТС-BOARD Архив",
    "Расписки Архив",
    "Отрасли",
    "РТС-GAZ",
    "Курс рубля",
];

// The "nothing selected" placeholder entry of the instrument dropdown.
const IGNORE_INSTRUMENTS: &[&str] = &["не выбрано"];

/// Drives the export page's two cascading dropdowns through an
/// [`AutomationClient`] session and reads back what got selected.
///
/// The option lists are re-enumerated from the live page on every call;
/// indices are only meaningful while the page state is unchanged.
pub struct QuoteSelector<C: AutomationClient> {
    client: C,
    wait_timeout: Duration,
}

impl<C: AutomationClient> QuoteSelector<C> {
    pub fn new(client: C, wait_timeout: Duration) -> Self {
        Self {
            client,
            wait_timeout,
        }
    }

    /// Navigate to the export form and sanity-check we got the right page.
    pub async fn open(&mut self) -> Result<()> {
        self.client.navigate(EXPORT_URL).await?;
        let title = self.client.title().await?;
        if !title.contains(EXPORT_PAGE_TITLE) {
            return Err(HarvesterError::ExportError(format!(
                "unexpected page title: {}",
                title
            )));
        }
        Ok(())
    }

    /// Open the market dropdown and collect its options, minus the
    /// ignore-listed pseudo-markets. Leaves the dropdown open.
    async fn market_elements(&mut self) -> Result<Vec<Element>> {
        let toggle = self
            .client
            .wait_until_present(&Locator::xpath(MARKETS_CLICK), self.wait_timeout)
            .await?;
        self.client.click(&toggle).await?;

        self.filtered_options(MARKETS_SELECTOR, IGNORE_MARKETS).await
    }

    /// Open the instrument dropdown and collect its options, minus the
    /// "nothing selected" sentinel. Leaves the dropdown open.
    async fn instrument_elements(&mut self) -> Result<Vec<Element>> {
        let toggle = self
            .client
            .find_element(&Locator::xpath(INSTRUMENTS_CLICK))
            .await?;
        self.client.click(&toggle).await?;

        self.filtered_options(INSTRUMENTS_SELECTOR, IGNORE_INSTRUMENTS)
            .await
    }

    async fn filtered_options(&mut self, xpath: &str, ignore: &[&str]) -> Result<Vec<Element>> {
        let all = self.client.find_elements(&Locator::xpath(xpath)).await?;
        let mut kept = Vec::with_capacity(all.len());
        for element in all {
            let text = self.client.text(&element).await?;
            if !ignore.contains(&text.as_str()) {
                kept.push(element);
            }
        }
        Ok(kept)
    }

    async fn option_codes(&mut self, elements: Vec<Element>, close_toggle: &str) -> Result<Vec<String>> {
        let mut codes = Vec::with_capacity(elements.len());
        for element in &elements {
            let value = self.client.attribute(element, "value").await?;
            codes.push(value.unwrap_or_default());
        }

        // Second click on the toggle puts the dropdown away again.
        let toggle = self.client.find_element(&Locator::xpath(close_toggle)).await?;
        self.client.click(&toggle).await?;
        Ok(codes)
    }

    /// Internal codes of all selectable markets, in page order.
    pub async fn market_codes(&mut self) -> Result<Vec<String>> {
        let elements = self.market_elements().await?;
        self.option_codes(elements, MARKETS_CLICK).await
    }

    /// Internal codes of all selectable instruments of the current market,
    /// in page order.
    pub async fn instrument_codes(&mut self) -> Result<Vec<String>> {
        let elements = self.instrument_elements().await?;
        self.option_codes(elements, INSTRUMENTS_CLICK).await
    }

    /// Click the `index`-th selectable market.
    pub async fn select_market(&mut self, index: usize) -> Result<()> {
        debug!("Selecting market {}", index);
        let elements = self.market_elements().await?;
        let element = elements
            .get(index)
            .ok_or(HarvesterError::IndexOutOfRange {
                what: "market",
                index,
                len: elements.len(),
            })?;
        self.client
            .execute_script("arguments[0].click()", element)
            .await
    }

    /// Click the `index`-th selectable instrument of the current market.
    pub async fn select_instrument(&mut self, index: usize) -> Result<()> {
        debug!("Selecting instrument {}", index);
        let elements = self.instrument_elements().await?;
        let element = elements
            .get(index)
            .ok_or(HarvesterError::IndexOutOfRange {
                what: "instrument",
                index,
                len: elements.len(),
            })?;
        self.client
            .execute_script("arguments[0].click()", element)
            .await
    }

    /// Display name of the currently selected market, taken from the URL
    /// segment after `profile/`.
    pub async fn market_name(&mut self) -> Result<String> {
        let url = self.client.current_url().await?;
        let start = url
            .find("profile/")
            .map(|p| p + "profile/".len())
            .ok_or_else(|| {
                HarvesterError::ExportError(format!("no profile segment in url {}", url))
            })?;
        let end = url[start..].find('/').map_or(url.len(), |p| start + p);
        Ok(url[start..end].to_string())
    }

    /// Display name of the currently selected instrument: the last path
    /// segment before `/export/`.
    pub async fn instrument_name(&mut self) -> Result<String> {
        let url = self.client.current_url().await?;
        let cut = url.find("/export/").ok_or_else(|| {
            HarvesterError::ExportError(format!("no export segment in url {}", url))
        })?;
        Ok(url[..cut]
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string())
    }

    /// Ticker symbol of the currently selected instrument, from the export
    /// form's contract field.
    pub async fn instrument_ticker(&mut self) -> Result<String> {
        let field = self
            .client
            .find_element(&Locator::xpath(TICKER_SELECTOR))
            .await?;
        let value = self.client.attribute(&field, "value").await?;
        Ok(value.unwrap_or_default())
    }

    /// Release the underlying automation session.
    pub async fn close(&mut self) -> Result<()> {
        self.client.close().await
    }
}
