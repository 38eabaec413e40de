use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::browser::{PageRenderer, RenderContext};
use crate::limiter::RenderLimiter;
use crate::models::{ImageCandidate, RenderedImage};

// ── Constants ────────────────────────────────────────────────────────────────

/// Both intrinsic dimensions must be strictly greater than this.
pub const MIN_DIMENSION: u32 = 400;

/// Upper bound on a request's render budget.
pub const MAX_RENDER_TIMEOUT: Duration = Duration::from_secs(600);

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("render queue is full")]
    Busy,
    #[error("render failed: {0}")]
    Render(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("deadline exceeded while {0}")]
    Timeout(RenderStage),
}

// ── Pipeline stages ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Validating,
    Rendering,
    WaitingNetworkIdle,
    WaitingForImage,
    Extracting,
    TornDown,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStage::Validating => "validating",
            RenderStage::Rendering => "rendering",
            RenderStage::WaitingNetworkIdle => "waiting for network idle",
            RenderStage::WaitingForImage => "waiting for an image",
            RenderStage::Extracting => "extracting",
            RenderStage::TornDown => "tearing down",
        };
        f.write_str(name)
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn extract_images(
    renderer: Arc<dyn PageRenderer>,
    limiter: &RenderLimiter,
    url: &str,
    timeout: Duration,
) -> Result<Vec<ImageCandidate>, ExtractionError> {
    tracing::debug!(stage = %RenderStage::Validating, url = %url);
    let target = validate_url(url)?;
    let deadline = Instant::now() + timeout.min(MAX_RENDER_TIMEOUT);

    let permit = tokio::time::timeout_at(deadline.into(), limiter.acquire())
        .await
        .map_err(|_| ExtractionError::Timeout(RenderStage::Rendering))??;

    // The permit travels with the worker so the slot frees only after teardown.
    let worker = tokio::task::spawn_blocking(move || {
        let result = render_page(renderer.as_ref(), &target, deadline);
        drop(permit);
        result
    });

    let images = match tokio::time::timeout_at(deadline.into(), worker).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => {
            return Err(ExtractionError::Extraction(format!(
                "render worker crashed: {}",
                join_error
            )))
        }
        Err(_) => {
            tracing::warn!(url = %url, "render deadline exceeded, worker left to tear down");
            return Err(ExtractionError::Timeout(RenderStage::Rendering));
        }
    };

    Ok(select_large_images(images))
}

// ── URL validation ───────────────────────────────────────────────────────────

pub fn validate_url(url: &str) -> Result<Url, ExtractionError> {
    let parsed = Url::parse(url.trim()).map_err(|_| ExtractionError::InvalidUrl)?;
    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ExtractionError::InvalidUrl);
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ExtractionError::InvalidUrl),
    }
}

// ── Size policy ──────────────────────────────────────────────────────────────

/// Keep images whose intrinsic width and height both exceed
/// [`MIN_DIMENSION`], preserving document order and duplicates.
pub fn select_large_images(images: Vec<RenderedImage>) -> Vec<ImageCandidate> {
    images
        .into_iter()
        .filter(|img| img.natural_width > MIN_DIMENSION && img.natural_height > MIN_DIMENSION)
        .map(|img| ImageCandidate { src: img.src })
        .collect()
}

// ── Render pipeline ──────────────────────────────────────────────────────────

/// Closes the wrapped context when dropped, including during unwinding.
struct ContextGuard(Box<dyn RenderContext>);

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.0.close();
        tracing::debug!(stage = %RenderStage::TornDown, "render context closed");
    }
}

/// Run one render on a fresh context. Blocking; the context is always
/// closed before this returns.
pub fn render_page(
    renderer: &dyn PageRenderer,
    url: &Url,
    deadline: Instant,
) -> Result<Vec<RenderedImage>, ExtractionError> {
    tracing::debug!(stage = %RenderStage::Rendering, url = %url, "opening render context");
    let context = renderer.open(remaining(deadline, RenderStage::Rendering)?)?;
    let mut guard = ContextGuard(context);

    let result = drive(guard.0.as_mut(), url, deadline);
    drop(guard);

    if let Err(e) = &result {
        tracing::warn!(url = %url, "render pipeline failed: {}", e);
    }
    result
}

fn drive(
    context: &mut dyn RenderContext,
    url: &Url,
    deadline: Instant,
) -> Result<Vec<RenderedImage>, ExtractionError> {
    let stage = RenderStage::Rendering;
    context
        .navigate(url, remaining(deadline, stage)?)
        .map_err(|e| classify(e, deadline, stage))?;

    let stage = RenderStage::WaitingNetworkIdle;
    tracing::debug!(stage = %stage, url = %url);
    context
        .wait_for_network_idle(remaining(deadline, stage)?)
        .map_err(|e| classify(e, deadline, stage))?;

    let stage = RenderStage::WaitingForImage;
    tracing::debug!(stage = %stage, url = %url);
    context
        .wait_for_image(remaining(deadline, stage)?)
        .map_err(|e| classify(e, deadline, stage))?;

    let stage = RenderStage::Extracting;
    tracing::debug!(stage = %stage, url = %url);
    let images = context.images().map_err(|e| classify(e, deadline, stage))?;
    tracing::debug!(url = %url, count = images.len(), "collected rendered images");

    Ok(images)
}

fn remaining(deadline: Instant, stage: RenderStage) -> Result<Duration, ExtractionError> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or(ExtractionError::Timeout(stage))
}

/// A step that failed after the deadline passed is reported as a timeout.
fn classify(error: ExtractionError, deadline: Instant, stage: RenderStage) -> ExtractionError {
    match error {
        ExtractionError::Render(_) | ExtractionError::Extraction(_)
            if Instant::now() >= deadline =>
        {
            ExtractionError::Timeout(stage)
        }
        other => other,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
