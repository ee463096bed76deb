//! Wires the content, overlay and background contexts together.

use crate::background::BackgroundContext;
use crate::bus::MessageBus;
use crate::content::{ContentContext, ContentHandle};
use crate::overlay::{
    Clipboard, MemoryClipboard, OverlayContext, OverlayHandle, OverlayLaunch, OverlayLauncher,
};
use refine_core::config::OverlayConfig;
use refine_core::page::HostPage;
use refine_core::session::Viewport;
use refine_core::settings::SettingsService;
use refine_core::{ErrorReport, ErrorType, RefineError};
use refine_interaction::RewriteClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_EXTENSION_ORIGIN: &str = "refine-extension://refine";

#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    pub extension_origin: String,
    pub overlay: OverlayConfig,
    pub viewport: Viewport,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            extension_origin: DEFAULT_EXTENSION_ORIGIN.to_string(),
            overlay: OverlayConfig::default(),
            viewport: Viewport::default(),
        }
    }
}

/// Everything shared by the contexts of one browser profile.
pub struct Extension {
    settings: Arc<dyn SettingsService>,
    client: RewriteClient,
    clipboard: Arc<dyn Clipboard>,
    config: ExtensionConfig,
}

impl Extension {
    pub fn new(settings: Arc<dyn SettingsService>, client: RewriteClient) -> Self {
        Self {
            settings,
            client,
            clipboard: Arc::new(MemoryClipboard::default()),
            config: ExtensionConfig::default(),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_config(mut self, config: ExtensionConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts the background context and a content context for `page`.
    pub fn start<P: HostPage + 'static>(self, page: P) -> ExtensionHandle<P> {
        let bus = MessageBus::new();
        let (background, background_handle) =
            BackgroundContext::new(Arc::clone(&self.settings), self.client);
        let background_task = background.spawn();

        let (overlay_tx, overlays) = mpsc::unbounded_channel();
        let launcher = SpawningLauncher {
            bus: bus.clone(),
            settings: Arc::clone(&self.settings),
            clipboard: self.clipboard,
            config: self.config.overlay.clone(),
            overlays: overlay_tx,
        };

        let (notice_tx, host_notices) = mpsc::unbounded_channel();
        let (content, content_handle) = ContentContext::new(
            page,
            bus.clone(),
            self.config.extension_origin,
            background_handle,
            Box::new(launcher),
            notice_tx,
            self.config.overlay,
            self.config.viewport,
        );
        let content_task = content.spawn();
        tracing::info!("[Extension] Started");

        ExtensionHandle {
            content: content_handle,
            bus,
            overlays,
            host_notices,
            content_task,
            background_task,
        }
    }
}

/// Creates a real [`OverlayContext`] per launch and reports its handle.
struct SpawningLauncher {
    bus: MessageBus,
    settings: Arc<dyn SettingsService>,
    clipboard: Arc<dyn Clipboard>,
    config: OverlayConfig,
    overlays: mpsc::UnboundedSender<OverlayHandle>,
}

impl OverlayLauncher for SpawningLauncher {
    fn launch(&mut self, launch: OverlayLaunch) {
        let (context, handle) = OverlayContext::new(
            launch,
            self.bus.clone(),
            Arc::clone(&self.settings),
            Arc::clone(&self.clipboard),
            self.config.clone(),
        );
        context.spawn();
        if self.overlays.send(handle).is_err() {
            tracing::debug!("[Extension] Nobody is watching overlays");
        }
    }
}

pub struct ExtensionHandle<P> {
    content: ContentHandle<P>,
    bus: MessageBus,
    overlays: mpsc::UnboundedReceiver<OverlayHandle>,
    host_notices: mpsc::UnboundedReceiver<ErrorReport>,
    content_task: JoinHandle<P>,
    background_task: JoinHandle<()>,
}

impl<P: Send + 'static> ExtensionHandle<P> {
    pub fn content(&self) -> &ContentHandle<P> {
        &self.content
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Waits for the next overlay the content context opens.
    pub async fn next_overlay(&mut self) -> Option<OverlayHandle> {
        self.overlays.recv().await
    }

    /// Waits for what an improve command produced: the overlay, or the host
    /// notice explaining why none opened.
    pub async fn next_overlay_or_notice(&mut self) -> Result<OverlayHandle, ErrorReport> {
        tokio::select! {
            Some(overlay) = self.overlays.recv() => Ok(overlay),
            Some(notice) = self.host_notices.recv() => Err(notice),
            else => Err(ErrorReport::new(ErrorType::Unknown, "The extension stopped.")),
        }
    }

    pub fn try_next_overlay(&mut self) -> Option<OverlayHandle> {
        self.overlays.try_recv().ok()
    }

    /// Waits up to `wait` for a notice shown on the host page itself.
    pub async fn next_host_notice(&mut self, wait: Duration) -> Option<ErrorReport> {
        tokio::time::timeout(wait, self.host_notices.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn try_host_notice(&mut self) -> Option<ErrorReport> {
        self.host_notices.try_recv().ok()
    }

    /// Unloads the page and stops the background context; returns the page.
    pub async fn shutdown(self) -> Result<P, RefineError> {
        self.content.unload();
        let page = self
            .content_task
            .await
            .map_err(|err| RefineError::internal(format!("content context panicked: {err}")))?;
        // The background loop ends once the content context drops its handle.
        let _ = self.background_task.await;
        tracing::info!("[Extension] Stopped");
        Ok(page)
    }
}
