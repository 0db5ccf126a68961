use crate::errors::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

pub mod webdriver;

/// How to address an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    XPath(String),
}

impl Locator {
    pub fn xpath(expr: &str) -> Self {
        Locator::XPath(expr.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(expr) => write!(f, "xpath {}", expr),
        }
    }
}

/// Opaque element handle issued by the automation client. Only meaningful
/// for the page state it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: String,
}

/// The capability set this crate consumes from a UI-automation driver.
///
/// The crawl holds exactly one session for its whole run, so every method
/// takes `&mut self`; implementations never need to be shareable.
#[async_trait]
pub trait AutomationClient: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn title(&mut self) -> Result<String>;

    async fn current_url(&mut self) -> Result<String>;

    async fn find_element(&mut self, locator: &Locator) -> Result<Element>;

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<Element>>;

    /// Poll for an element until it shows up or the timeout elapses.
    async fn wait_until_present(&mut self, locator: &Locator, timeout: Duration) -> Result<Element>;

    async fn click(&mut self, element: &Element) -> Result<()>;

    /// Run a script with the element bound as `arguments[0]`.
    async fn execute_script(&mut self, script: &str, element: &Element) -> Result<()>;

    async fn text(&mut self, element: &Element) -> Result<String>;

    async fn attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>>;

    /// End the session. Called exactly once, on every exit path.
    async fn close(&mut self) -> Result<()>;
}
