//! Rendering contexts for the image extraction pipeline.
//!
//! A [`PageRenderer`] hands out one isolated [`RenderContext`] per request.
//! The production implementation, [`ChromeRenderer`], launches a dedicated
//! headless Chrome process for every context and kills it on close.
//!
//! All methods are blocking; the pipeline runs them on tokio's blocking pool.

pub mod chrome;
pub mod config;

use std::time::Duration;

use url::Url;

use crate::extract::ExtractionError;
use crate::models::RenderedImage;

pub use chrome::ChromeRenderer;
pub use config::BrowserConfig;

/// Factory for isolated rendering contexts
pub trait PageRenderer: Send + Sync {
    /// Acquire a fresh context. `timeout` is the budget left for the request.
    fn open(&self, timeout: Duration) -> Result<Box<dyn RenderContext>, ExtractionError>;
}

/// A single browser page/session owned by one request
pub trait RenderContext: Send {
    /// Start loading `url` and wait for the initial document.
    fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), ExtractionError>;

    /// Block until the main frame has had no in-flight connections for a
    /// sustained interval.
    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), ExtractionError>;

    /// Block until at least one `img` element exists.
    fn wait_for_image(&mut self, timeout: Duration) -> Result<(), ExtractionError>;

    /// Every `img` element in document order with its intrinsic size.
    fn images(&mut self) -> Result<Vec<RenderedImage>, ExtractionError>;

    /// Release the context. Called exactly once, after which the context
    /// is dropped.
    fn close(&mut self);
}
