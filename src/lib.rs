// Public surface: the two jobs plus the narrow automation seam.
pub mod archives;
pub mod automation;
pub mod errors;
pub mod models;

// Kept public for the binaries; internal detail for library users.
#[doc(hidden)]
pub mod cli;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod fetch;
#[doc(hidden)]
pub mod selector;
#[doc(hidden)]
pub mod services;
#[doc(hidden)]
pub mod util;

// Re-export the types most callers want.
pub use archives::ArchiveDownloader;
pub use errors::{HarvesterError, Result};
pub use models::market::{Instrument, Market};
