//! HTTP service that renders a web page in headless Chrome and reports the
//! images on it whose intrinsic size exceeds 400×400 pixels.

pub mod browser;
pub mod config;
pub mod extract;
pub mod limiter;
pub mod models;
pub mod routes;

pub use browser::{BrowserConfig, ChromeRenderer, PageRenderer, RenderContext};
pub use config::{Config, ConfigError};
pub use extract::{ExtractionError, RenderStage, MAX_RENDER_TIMEOUT, MIN_DIMENSION};
pub use limiter::RenderLimiter;
pub use models::{ErrorResponse, ImageCandidate, RenderedImage};
pub use routes::{app, AppState};
