//! Overlay context: the isolated panel that shows the selection and result.
//!
//! Talks to its parent content context only through the [`MessageBus`]. The
//! typing animation and toast auto-hide run as cancellable timer tasks; every
//! one of them is cancelled before the overlay tears down.

use crate::bus::MessageBus;
use refine_core::config::{DEFAULT_TYPING_SPEED_MS, OverlayConfig};
use refine_core::error::{RefineError, Result};
use refine_core::protocol::{
    EndpointId, Envelope, ImproveResult, InboundGate, Message, Notice, OverlayAction,
};
use refine_core::replace::ConfirmationRequest;
use refine_core::session::{FrameMetrics, SessionToken};
use refine_core::settings::SettingsService;
use refine_core::typing::{OverlayState, RenderPlan, TypingMachine};
use refine_core::{ErrorReport, ErrorType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Local sink for the copy action.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|contents| contents.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut contents = self
            .contents
            .lock()
            .map_err(|_| RefineError::internal("clipboard lock poisoned"))?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// What the user did inside the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Accept,
    ConfirmReplace,
    DismissConfirmation,
    Copy,
    Regenerate,
    SkipAnimation,
    Undo,
    Move { left: i32, top: i32 },
    Resize { width: i32, height: i32 },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub notice: Notice,
}

/// Render model published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    pub state: OverlayState,
    pub original: Option<String>,
    pub visible: String,
    pub error: Option<ErrorReport>,
    pub latency_ms: Option<u64>,
    pub cached: bool,
    pub frame: Option<FrameMetrics>,
    pub confirmation: Option<ConfirmationRequest>,
    pub toasts: Vec<Toast>,
    pub can_accept: bool,
    pub can_copy: bool,
    pub can_regenerate: bool,
    pub pending_timers: usize,
    pub closed: bool,
}

impl OverlayView {
    fn initial() -> Self {
        Self {
            state: OverlayState::Idle,
            original: None,
            visible: String::new(),
            error: None,
            latency_ms: None,
            cached: false,
            frame: None,
            confirmation: None,
            toasts: Vec::new(),
            can_accept: false,
            can_copy: false,
            can_regenerate: false,
            pending_timers: 0,
            closed: false,
        }
    }

    pub fn has_toast(&self, message: &str) -> bool {
        self.toasts.iter().any(|toast| toast.notice.message == message)
    }
}

/// Everything an overlay needs at creation.
pub struct OverlayLaunch {
    pub endpoint: EndpointId,
    pub inbox: mpsc::UnboundedReceiver<Envelope>,
    pub parent: EndpointId,
    /// Origin of the parent document; inbound messages must come from it.
    pub origin: String,
    /// Token the parent minted for this overlay; echoed in the handshake.
    pub token: SessionToken,
}

/// Creates overlays on behalf of the content context.
pub trait OverlayLauncher: Send {
    fn launch(&mut self, launch: OverlayLaunch);
}

/// User-side handle to a running overlay.
#[derive(Clone)]
pub struct OverlayHandle {
    endpoint: EndpointId,
    ui: mpsc::UnboundedSender<UiCommand>,
    view: watch::Receiver<OverlayView>,
    live_timers: Arc<AtomicUsize>,
}

impl OverlayHandle {
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn send(&self, command: UiCommand) -> bool {
        self.ui.send(command).is_ok()
    }

    pub fn view(&self) -> OverlayView {
        self.view.borrow().clone()
    }

    /// Waits until the published view satisfies `predicate`.
    ///
    /// Returns `None` if the overlay stopped without ever reaching it.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&OverlayView) -> bool,
    ) -> Option<OverlayView> {
        self.view
            .wait_for(predicate)
            .await
            .ok()
            .map(|view| OverlayView::clone(&view))
    }

    /// Timer tasks that have not exited yet.
    pub fn live_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }
}

enum TimerEvent {
    Tick { generation: u64 },
    ToastExpired { id: u64 },
}

/// Counts a timer task as live until it is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancellable timers owned by one overlay.
struct Timers {
    root: CancellationToken,
    typing: Option<(u64, CancellationToken)>,
    toasts: HashMap<u64, CancellationToken>,
    generation: u64,
    live: Arc<AtomicUsize>,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl Timers {
    fn new(events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            root: CancellationToken::new(),
            typing: None,
            toasts: HashMap::new(),
            generation: 0,
            live: Arc::new(AtomicUsize::new(0)),
            events,
        }
    }

    /// Replaces any running ticker with a fresh one.
    fn start_typing(&mut self, interval: Duration) {
        self.cancel_typing();
        self.generation += 1;
        let generation = self.generation;
        let cancel = self.root.child_token();
        let events = self.events.clone();
        let guard = LiveGuard::new(&self.live);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if events.send(TimerEvent::Tick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.typing = Some((generation, cancel));
    }

    fn cancel_typing(&mut self) {
        if let Some((_, cancel)) = self.typing.take() {
            cancel.cancel();
        }
    }

    fn is_current_tick(&self, generation: u64) -> bool {
        self.typing
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
    }

    fn schedule_toast(&mut self, id: u64, duration: Duration) {
        let cancel = self.root.child_token();
        let events = self.events.clone();
        let guard = LiveGuard::new(&self.live);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let _ = events.send(TimerEvent::ToastExpired { id });
                }
            }
        });
        self.toasts.insert(id, cancel);
    }

    fn toast_done(&mut self, id: u64) {
        self.toasts.remove(&id);
    }

    fn cancel_all(&mut self) {
        self.root.cancel();
        self.typing = None;
        self.toasts.clear();
    }

    fn pending(&self) -> usize {
        usize::from(self.typing.is_some()) + self.toasts.len()
    }
}

pub struct OverlayContext {
    endpoint: EndpointId,
    parent: EndpointId,
    origin: String,
    launch_token: SessionToken,
    bus: MessageBus,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    ui: mpsc::UnboundedReceiver<UiCommand>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    gate: InboundGate,
    machine: TypingMachine,
    timers: Timers,
    settings: Arc<dyn SettingsService>,
    clipboard: Arc<dyn Clipboard>,
    config: OverlayConfig,
    view: watch::Sender<OverlayView>,
    frame: Option<FrameMetrics>,
    confirmation: Option<ConfirmationRequest>,
    toasts: Vec<Toast>,
    next_toast: u64,
    error: Option<ErrorReport>,
    last_result: Option<(u64, bool)>,
    closed: bool,
}

impl OverlayContext {
    pub fn new(
        launch: OverlayLaunch,
        bus: MessageBus,
        settings: Arc<dyn SettingsService>,
        clipboard: Arc<dyn Clipboard>,
        config: OverlayConfig,
    ) -> (Self, OverlayHandle) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(OverlayView::initial());
        let timers = Timers::new(timer_tx);
        let handle = OverlayHandle {
            endpoint: launch.endpoint,
            ui: ui_tx,
            view: view_rx,
            live_timers: Arc::clone(&timers.live),
        };

        let context = Self {
            endpoint: launch.endpoint,
            parent: launch.parent,
            gate: InboundGate::for_overlay(launch.parent, launch.origin.clone()),
            origin: launch.origin,
            launch_token: launch.token,
            bus,
            inbox: launch.inbox,
            ui: ui_rx,
            timer_rx,
            machine: TypingMachine::new(Duration::from_millis(DEFAULT_TYPING_SPEED_MS)),
            timers,
            settings,
            clipboard,
            config,
            view: view_tx,
            frame: None,
            confirmation: None,
            toasts: Vec::new(),
            next_toast: 0,
            error: None,
            last_result: None,
            closed: false,
        };
        (context, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        match self.settings.load().await {
            Ok(settings) => self.machine.set_interval(settings.typing_interval()),
            Err(err) => tracing::warn!(
                "[Overlay] Failed to load settings, using default typing speed: {}",
                err
            ),
        }

        let hello = Message::OverlayInit {
            token: self.launch_token.clone(),
            text: None,
            frame: None,
        };
        if !self.post(&hello) {
            tracing::warn!("[Overlay] Parent unreachable, closing");
            self.close(false);
            return;
        }
        self.publish();

        loop {
            tokio::select! {
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope),
                    None => {
                        tracing::debug!("[Overlay] Removed by parent");
                        break;
                    }
                },
                command = self.ui.recv() => match command {
                    Some(command) => {
                        self.handle_command(command);
                        if self.closed {
                            return;
                        }
                    }
                    None => break,
                },
                Some(event) = self.timer_rx.recv() => self.handle_timer(event),
            }
        }
        self.close(false);
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        let message = match self.gate.admit(&envelope) {
            Ok(message) => message,
            Err(rejection) => {
                tracing::debug!("[Overlay] Dropped inbound message: {:?}", rejection);
                return;
            }
        };

        match message {
            Message::OverlayInit { text, frame, .. } => {
                if frame.is_some() {
                    self.frame = frame;
                }
                if let Some(text) = text {
                    self.begin(text);
                }
            }
            Message::SelectionText { text, .. } => self.begin(text),
            Message::ImproveResponse { result, error, .. } => self.on_response(result, error),
            Message::OverlayFrame { frame, .. } => self.frame = Some(frame),
            Message::OverlayConfirm { request, .. } => self.confirmation = Some(request),
            Message::OverlayNotice { notice, .. } => self.show_toast(notice),
            Message::OverlayAction { .. } => {
                tracing::warn!("[Overlay] Ignoring OVERLAY_ACTION addressed to the overlay");
            }
        }
        self.publish();
    }

    fn begin(&mut self, text: String) {
        if let Err(err) = self.machine.start(text) {
            tracing::warn!("[Overlay] Cannot start: {}", err);
        }
    }

    fn on_response(&mut self, result: Option<ImproveResult>, error: Option<ErrorReport>) {
        if self.machine.state() != OverlayState::Loading {
            tracing::debug!(
                "[Overlay] Response ignored while {}",
                self.machine.state()
            );
            return;
        }

        match (result, error) {
            (Some(result), _) => {
                self.last_result = Some((result.latency_ms, result.cached));
                match self.machine.receive(&result.text) {
                    Ok(RenderPlan::Immediate) => {}
                    Ok(RenderPlan::Tick { interval }) => self.timers.start_typing(interval),
                    Err(err) => tracing::warn!("[Overlay] {}", err),
                }
            }
            (None, error) => {
                let report = error.unwrap_or_else(|| {
                    ErrorReport::new(ErrorType::Unknown, "The rewrite came back empty.")
                });
                tracing::info!("[Overlay] Rewrite failed: {}", report);
                if self.machine.fail(report.message.clone()).is_ok() {
                    self.error = Some(report);
                }
            }
        }
    }

    fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::Accept => {
                if let Some(text) = self.accepted_text() {
                    self.confirmation = None;
                    self.post_action(OverlayAction::Replace { text });
                }
            }
            UiCommand::ConfirmReplace => {
                if self.confirmation.take().is_some() {
                    if let Some(text) = self.accepted_text() {
                        self.post_action(OverlayAction::ReplaceConfirmed { text });
                    }
                }
            }
            UiCommand::DismissConfirmation => self.confirmation = None,
            UiCommand::Copy => {
                if let Some(text) = self.machine.full_result().filter(|_| self.machine.can_copy()) {
                    match self.clipboard.write_text(&text) {
                        Ok(()) => self.show_toast(Notice::info("Copied to clipboard.")),
                        Err(err) => self.show_toast(Notice::error(format!("Copy failed: {err}"))),
                    }
                }
            }
            UiCommand::Regenerate => {
                if self.machine.can_regenerate() {
                    self.timers.cancel_typing();
                    if self.machine.regenerate().is_ok() {
                        self.error = None;
                        self.confirmation = None;
                        self.last_result = None;
                        self.post_action(OverlayAction::Regenerate);
                    }
                }
            }
            UiCommand::SkipAnimation => {
                self.machine.finish();
                self.timers.cancel_typing();
            }
            UiCommand::Undo => self.post_action(OverlayAction::Undo),
            UiCommand::Move { left, top } => {
                self.post_action(OverlayAction::Position { left, top })
            }
            UiCommand::Resize { width, height } => {
                self.post_action(OverlayAction::Resize { width, height })
            }
            UiCommand::Close => {
                self.close(true);
                return;
            }
        }
        self.publish();
    }

    fn accepted_text(&self) -> Option<String> {
        if self.machine.can_accept() {
            self.machine.full_result()
        } else {
            None
        }
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { generation } => {
                if !self.timers.is_current_tick(generation) {
                    return;
                }
                if self.machine.tick() {
                    self.timers.cancel_typing();
                }
            }
            TimerEvent::ToastExpired { id } => {
                self.timers.toast_done(id);
                self.toasts.retain(|toast| toast.id != id);
            }
        }
        self.publish();
    }

    fn show_toast(&mut self, notice: Notice) {
        self.next_toast += 1;
        let id = self.next_toast;
        self.toasts.push(Toast { id, notice });
        self.timers.schedule_toast(id, self.config.toast_duration());
    }

    fn session_token(&self) -> SessionToken {
        self.gate
            .token()
            .cloned()
            .unwrap_or_else(|| self.launch_token.clone())
    }

    fn post_action(&mut self, action: OverlayAction) {
        let message = Message::OverlayAction {
            token: self.session_token(),
            action,
        };
        if !self.post(&message) {
            tracing::warn!("[Overlay] Parent unreachable, action dropped");
        }
    }

    fn post(&self, message: &Message) -> bool {
        self.bus.post(self.endpoint, self.parent, &self.origin, message)
    }

    /// Cancels every timer, optionally tells the parent, then tears down.
    fn close(&mut self, notify_parent: bool) {
        if self.closed {
            return;
        }
        self.timers.cancel_all();
        if notify_parent {
            self.post_action(OverlayAction::Close);
        }
        self.machine.reset();
        self.toasts.clear();
        self.confirmation = None;
        self.closed = true;
        self.bus.unregister(self.endpoint);
        tracing::info!("[Overlay] Closed");
        self.publish();
    }

    fn publish(&self) {
        let (latency_ms, cached) = match self.last_result {
            Some((latency_ms, cached)) => (Some(latency_ms), cached),
            None => (None, false),
        };
        let view = OverlayView {
            state: self.machine.state(),
            original: self.machine.original().map(str::to_string),
            visible: self.machine.visible(),
            error: self.error.clone(),
            latency_ms,
            cached,
            frame: self.frame,
            confirmation: self.confirmation.clone(),
            toasts: self.toasts.clone(),
            can_accept: self.machine.can_accept(),
            can_copy: self.machine.can_copy(),
            can_regenerate: self.machine.can_regenerate(),
            pending_timers: self.timers.pending(),
            closed: self.closed,
        };
        self.view.send_replace(view);
    }
}
