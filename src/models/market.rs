use serde::Serialize;

/// A top-level venue/category on the export page.
///
/// The code is the internal numeric form read from the selector option's
/// `value` attribute; the name is derived from the page URL after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    pub code: String,
    pub name: String,
}

/// A tradable security within a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
    pub ticker: String,
}
