use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use url::Url;

use super::config::BrowserConfig;
use super::{PageRenderer, RenderContext};
use crate::extract::{ExtractionError, RenderStage};
use crate::models::RenderedImage;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Keeps the browser connection alive past the request deadline so that
/// teardown, not the idle watchdog, ends the process.
const BROWSER_IDLE_SLACK: Duration = Duration::from_secs(10);

const COLLECT_IMAGES_SCRIPT: &str = r#"
JSON.stringify(
    Array.from(document.querySelectorAll('img')).map(img => ({
        src: img.src,
        naturalWidth: img.naturalWidth,
        naturalHeight: img.naturalHeight,
    }))
)
"#;

/// Launches one headless Chrome process per context
pub struct ChromeRenderer {
    config: BrowserConfig,
}

impl ChromeRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn build_launch_options(
        config: &BrowserConfig,
        timeout: Duration,
    ) -> Result<LaunchOptions<'_>, ExtractionError> {
        let args: Vec<&OsStr> = config.chrome_flags.iter().map(OsStr::new).collect();

        LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            .path(config.chrome_path.clone())
            .idle_browser_timeout(timeout.saturating_add(BROWSER_IDLE_SLACK))
            .args(args)
            .build()
            .map_err(|e| ExtractionError::Render(format!("invalid launch options: {}", e)))
    }
}

impl PageRenderer for ChromeRenderer {
    fn open(&self, timeout: Duration) -> Result<Box<dyn RenderContext>, ExtractionError> {
        let options = Self::build_launch_options(&self.config, timeout)?;

        let browser = Browser::new(options)
            .map_err(|e| ExtractionError::Render(format!("browser launch failed: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ExtractionError::Render(format!("tab creation failed: {}", e)))?;

        tab.set_default_timeout(timeout);
        tab.set_user_agent(&self.config.user_agent, Some("en-US,en;q=0.9"), None)
            .map_err(|e| ExtractionError::Render(format!("failed to set user agent: {}", e)))?;

        let network_idle = watch_network_idle(&tab)?;

        tracing::debug!(pid = ?browser.get_process_id(), "browser launched");

        Ok(Box::new(ChromeContext {
            browser: Some(browser),
            tab,
            network_idle,
        }))
    }
}

/// Track the main frame's lifecycle: a new document resets the flag and
/// Chrome's `networkIdle` event (zero connections for 500ms) sets it.
fn watch_network_idle(tab: &Arc<Tab>) -> Result<Arc<AtomicBool>, ExtractionError> {
    tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })
        .map_err(|e| ExtractionError::Render(format!("lifecycle events unavailable: {}", e)))?;

    let network_idle = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&network_idle);
    let main_frame = tab.get_target_id().clone();

    tab.add_event_listener(Arc::new(move |event: &Event| {
        if let Event::PageLifecycleEvent(lifecycle) = event {
            if lifecycle.params.frame_id != main_frame {
                return;
            }
            match lifecycle.params.name.as_str() {
                "init" => flag.store(false, Ordering::SeqCst),
                "networkIdle" => flag.store(true, Ordering::SeqCst),
                _ => {}
            }
        }
    }))
    .map_err(|e| ExtractionError::Render(format!("failed to attach listener: {}", e)))?;

    Ok(network_idle)
}

struct ChromeContext {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    network_idle: Arc<AtomicBool>,
}

impl RenderContext for ChromeContext {
    fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), ExtractionError> {
        self.network_idle.store(false, Ordering::SeqCst);
        self.tab.set_default_timeout(timeout);

        self.tab.navigate_to(url.as_str()).map_err(|e| {
            ExtractionError::Render(format!("failed to navigate to {}: {}", url, e))
        })?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| ExtractionError::Render(format!("navigation to {} failed: {}", url, e)))?;

        Ok(())
    }

    fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), ExtractionError> {
        let start = Instant::now();

        while !self.network_idle.load(Ordering::SeqCst) {
            if start.elapsed() > timeout {
                return Err(ExtractionError::Timeout(RenderStage::WaitingNetworkIdle));
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }

        Ok(())
    }

    fn wait_for_image(&mut self, timeout: Duration) -> Result<(), ExtractionError> {
        self.tab
            .wait_for_element_with_custom_timeout("img", timeout)
            .map(|_| ())
            .map_err(|e| ExtractionError::Render(format!("no image element appeared: {}", e)))
    }

    fn images(&mut self) -> Result<Vec<RenderedImage>, ExtractionError> {
        let result = self
            .tab
            .evaluate(COLLECT_IMAGES_SCRIPT, false)
            .map_err(|e| ExtractionError::Extraction(format!("image query failed: {}", e)))?;

        let json = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExtractionError::Extraction("image query returned no value".to_string()))?;

        serde_json::from_str(json)
            .map_err(|e| ExtractionError::Extraction(format!("malformed image data: {}", e)))
    }

    fn close(&mut self) {
        if let Err(e) = self.tab.close(false) {
            tracing::debug!("tab close failed: {}", e);
        }

        // Dropping the browser handle kills the Chrome process.
        if let Some(browser) = self.browser.take() {
            let pid = browser.get_process_id();
            drop(browser);
            tracing::debug!(pid = ?pid, "browser closed");
        }
    }
}
