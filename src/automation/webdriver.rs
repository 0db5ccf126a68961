use crate::automation::{AutomationClient, Element, Locator};
use crate::errors::{HarvesterError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;

// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Thin client for the W3C WebDriver wire protocol, enough to drive the
/// export page through a locally running chromedriver/geckodriver.
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    /// Open a new browser session against a WebDriver endpoint such as
    /// `http://localhost:9515`.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        debug!("Starting WebDriver session at {}", base_url);

        let body = json!({
            "capabilities": {
                "alwaysMatch": {}
            }
        });
        let response: Value = client
            .post(format!("{}/session", base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let session_id = response["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| {
                HarvesterError::AutomationError(format!("no session id in {}", response))
            })?
            .to_string();

        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response: Value = request.send().await?.json().await?;
        let value = &response["value"];

        // Protocol errors come back as {"value": {"error": ..., "message": ...}}.
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            return Err(HarvesterError::AutomationError(format!(
                "{}: {}",
                error, message
            )));
        }

        Ok(value.clone())
    }

    fn element_from_value(value: &Value) -> Result<Element> {
        let id = value[ELEMENT_KEY].as_str().ok_or_else(|| {
            HarvesterError::AutomationError(format!("no element reference in {}", value))
        })?;
        Ok(Element { id: id.to_string() })
    }

    fn locator_body(locator: &Locator) -> Value {
        match locator {
            Locator::XPath(expr) => json!({ "using": "xpath", "value": expr }),
        }
    }

    fn element_ref(element: &Element) -> Value {
        json!({ ELEMENT_KEY: element.id })
    }
}

#[async_trait]
impl AutomationClient for WebDriverClient {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigate to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        let value = self.command(Method::GET, "/title", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Element> {
        let value = self
            .command(Method::POST, "/element", Some(Self::locator_body(locator)))
            .await?;
        Self::element_from_value(&value)
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>> {
        let value = self
            .command(Method::POST, "/elements", Some(Self::locator_body(locator)))
            .await?;
        let mut elements = Vec::new();
        if let Some(list) = value.as_array() {
            for item in list {
                elements.push(Self::element_from_value(item)?);
            }
        }
        Ok(elements)
    }

    async fn wait_until_present(&mut self, locator: &Locator, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find_element(locator).await {
                Ok(element) => return Ok(element),
                Err(_) if Instant::now() < deadline => sleep(POLL_INTERVAL).await,
                Err(_) => return Err(HarvesterError::ElementNotFound(locator.to_string())),
            }
        }
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.id),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str, element: &Element) -> Result<()> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": script,
                "args": [Self::element_ref(element)],
            })),
        )
        .await?;
        Ok(())
    }

    async fn text(&mut self, element: &Element) -> Result<String> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.id), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/attribute/{}", element.id, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Closing WebDriver session {}", self.session_id);
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        self.client.delete(&url).send().await?;
        Ok(())
    }
}
