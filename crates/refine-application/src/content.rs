//! Content context: lives beside the host page and owns its document.
//!
//! Captures the selection, mints the session token, creates the overlay,
//! relays rewrite requests to the background context and performs
//! replacement and undo on behalf of the overlay.

use crate::background::BackgroundHandle;
use crate::bus::MessageBus;
use crate::overlay::{OverlayLaunch, OverlayLauncher};
use refine_core::config::OverlayConfig;
use refine_core::page::HostPage;
use refine_core::protocol::{
    EndpointId, Envelope, ImproveReply, ImproveRequest, InboundGate, Message, Notice, NoticeLevel,
    OverlayAction,
};
use refine_core::replace::{ReplaceOutcome, Replacer};
use refine_core::selection::{Anchor, AnchorWatch, SelectionInfo, capture, is_restricted_origin};
use refine_core::session::{FrameMetrics, Session, SessionToken, TokenAuthority, Viewport};
use refine_core::{ErrorReport, ErrorType, RefineError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type PageFn<P> = Box<dyn FnOnce(&mut P) + Send>;

/// Events raised by the host page itself.
pub enum HostEvent<P> {
    /// The user invoked the rewrite command (shortcut or context menu).
    Improve,
    /// Escape pressed on the page.
    Escape,
    /// The page is going away.
    Unload,
    /// Runs a closure against the page, e.g. to simulate user edits.
    WithPage(PageFn<P>),
}

/// Drives a running [`ContentContext`].
pub struct ContentHandle<P> {
    endpoint: EndpointId,
    tx: mpsc::UnboundedSender<HostEvent<P>>,
}

impl<P> Clone for ContentHandle<P> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint,
            tx: self.tx.clone(),
        }
    }
}

impl<P: Send + 'static> ContentHandle<P> {
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn improve(&self) -> bool {
        self.tx.send(HostEvent::Improve).is_ok()
    }

    pub fn escape(&self) -> bool {
        self.tx.send(HostEvent::Escape).is_ok()
    }

    pub fn unload(&self) -> bool {
        self.tx.send(HostEvent::Unload).is_ok()
    }

    /// Runs `f` on the page inside the content context and returns its result.
    pub async fn with_page<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut P) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let event = HostEvent::WithPage(Box::new(move |page: &mut P| {
            let _ = reply_tx.send(f(page));
        }));
        self.tx.send(event).ok()?;
        reply_rx.await.ok()
    }
}

/// State for one open overlay.
struct ActiveSession {
    session: Session,
    overlay: EndpointId,
    gate: InboundGate,
    selection: SelectionInfo,
    watch: AnchorWatch,
    replacer: Replacer,
    /// Sequence number of the newest improve request.
    latest_request: u64,
}

pub struct ContentContext<P: HostPage + 'static> {
    page: P,
    endpoint: EndpointId,
    page_origin: String,
    extension_origin: String,
    bus: MessageBus,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    events: mpsc::UnboundedReceiver<HostEvent<P>>,
    background: BackgroundHandle,
    replies_tx: mpsc::UnboundedSender<ImproveReply>,
    replies_rx: mpsc::UnboundedReceiver<ImproveReply>,
    launcher: Box<dyn OverlayLauncher>,
    host_notices: mpsc::UnboundedSender<ErrorReport>,
    authority: TokenAuthority,
    config: OverlayConfig,
    viewport: Viewport,
    active: Option<ActiveSession>,
}

impl<P: HostPage + 'static> ContentContext<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page: P,
        bus: MessageBus,
        extension_origin: impl Into<String>,
        background: BackgroundHandle,
        launcher: Box<dyn OverlayLauncher>,
        host_notices: mpsc::UnboundedSender<ErrorReport>,
        config: OverlayConfig,
        viewport: Viewport,
    ) -> (Self, ContentHandle<P>) {
        let page_origin = page.origin().to_string();
        let (endpoint, inbox) = bus.register(page_origin.clone());
        let (tx, events) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let context = Self {
            page,
            endpoint,
            page_origin,
            extension_origin: extension_origin.into(),
            bus,
            inbox,
            events,
            background,
            replies_tx,
            replies_rx,
            launcher,
            host_notices,
            authority: TokenAuthority::new(),
            config,
            viewport,
            active: None,
        };
        (context, ContentHandle { endpoint, tx })
    }

    pub fn spawn(self) -> JoinHandle<P> {
        tokio::spawn(self.run())
    }

    /// Serves host events and overlay messages until the page unloads.
    pub async fn run(mut self) -> P {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(HostEvent::Improve) => self.open(),
                    Some(HostEvent::Escape) => self.close_session(),
                    Some(HostEvent::WithPage(f)) => f(&mut self.page),
                    Some(HostEvent::Unload) | None => break,
                },
                Some(envelope) = self.inbox.recv() => self.handle_envelope(envelope),
                Some(reply) = self.replies_rx.recv() => self.handle_reply(reply),
            }
        }

        self.close_session();
        self.bus.unregister(self.endpoint);
        tracing::debug!("[Content] Unloaded");
        self.page
    }

    /// Opens a fresh overlay for the current selection.
    fn open(&mut self) {
        if self.active.is_some() {
            self.close_session();
        }

        if is_restricted_origin(&self.page_origin) {
            let err = RefineError::Permission {
                origin: self.page_origin.clone(),
            };
            tracing::info!("[Content] {}", err);
            self.host_notice(ErrorReport::from(err));
            return;
        }

        let selection = capture(&self.page);
        if !selection.is_valid {
            tracing::info!("[Content] Nothing selected");
            self.host_notice(ErrorReport::new(
                ErrorType::EmptySelection,
                "Select some text first.",
            ));
            return;
        }

        let token = self.authority.rotate();
        let frame = FrameMetrics::initial(
            self.viewport,
            self.config.min_width,
            self.config.min_height,
        );
        let (overlay, inbox) = self.bus.register(self.extension_origin.clone());
        let gate = InboundGate::for_content(overlay, self.extension_origin.clone(), token.clone());
        let watch = AnchorWatch::new(&selection, &self.page);
        tracing::info!(
            "[Content] Opening overlay ({:?}, {} chars)",
            selection.kind,
            selection.char_count()
        );

        self.active = Some(ActiveSession {
            session: Session::new(token.clone(), frame),
            overlay,
            gate,
            selection,
            watch,
            replacer: Replacer::new(
                self.config.large_replacement_threshold,
                self.config.preview_chars,
            ),
            latest_request: 0,
        });
        self.launcher.launch(OverlayLaunch {
            endpoint: overlay,
            inbox,
            parent: self.endpoint,
            origin: self.page_origin.clone(),
            token,
        });
    }

    /// Revokes the token and removes the overlay. Timers inside the overlay
    /// are cancelled when its inbox closes.
    fn close_session(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.authority.revoke();
        self.bus.unregister(active.overlay);
        tracing::info!(
            "[Content] Overlay closed after {}ms",
            (chrono::Utc::now() - active.session.opened_at).num_milliseconds()
        );
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        let Some(active) = self.active.as_mut() else {
            tracing::debug!("[Content] Message with no open overlay dropped");
            return;
        };
        let message = match active.gate.admit(&envelope) {
            Ok(message) => message,
            Err(rejection) => {
                tracing::debug!("[Content] Dropped inbound message: {:?}", rejection);
                return;
            }
        };

        match message {
            Message::OverlayInit { .. } => self.complete_handshake(),
            Message::OverlayAction { action, .. } => self.handle_action(action),
            other => {
                tracing::warn!("[Content] Unexpected {} from overlay", other.kind());
            }
        }
    }

    /// Acknowledges the overlay, hands it the selection and starts the call.
    fn complete_handshake(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let token = active.session.token.clone();
        let ack = Message::OverlayInit {
            token: token.clone(),
            text: None,
            frame: Some(active.session.frame),
        };
        let selection = Message::SelectionText {
            token,
            text: active.selection.text.clone(),
        };
        if !(self.post(&ack) && self.post(&selection)) {
            tracing::warn!("[Content] Overlay unreachable during handshake");
            return;
        }
        self.request_improve(false);
    }

    fn request_improve(&mut self, fresh: bool) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.latest_request += 1;
        let request = ImproveRequest {
            token: active.session.token.clone(),
            request_id: active.latest_request,
            text: active.selection.text.clone(),
            fresh,
        };
        if !self.background.improve(request, self.replies_tx.clone()) {
            tracing::error!("[Content] Background context is gone");
            self.forward_outcome(Err(ErrorReport::new(
                ErrorType::Unknown,
                "The extension background is not running. Reload the page and try again.",
            )));
        }
    }

    fn handle_reply(&mut self, reply: ImproveReply) {
        if !self.authority.validate(&reply.token) {
            tracing::debug!("[Content] Reply for a closed session dropped");
            return;
        }
        let latest = self.active.as_ref().map(|active| active.latest_request);
        if latest != Some(reply.request_id) {
            tracing::debug!(
                "[Content] Superseded reply {} dropped (latest {:?})",
                reply.request_id,
                latest
            );
            return;
        }
        self.forward_outcome(reply.outcome);
    }

    fn forward_outcome(
        &mut self,
        outcome: Result<refine_core::protocol::ImproveResult, ErrorReport>,
    ) {
        let Some(token) = self.current_token() else {
            return;
        };
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        let message = Message::ImproveResponse {
            token,
            result,
            error,
        };
        if !self.post(&message) {
            tracing::warn!("[Content] Overlay unreachable, response dropped");
        }
    }

    fn handle_action(&mut self, action: OverlayAction) {
        match action {
            OverlayAction::Replace { text } => self.replace(&text, false),
            OverlayAction::ReplaceConfirmed { text } => self.replace(&text, true),
            OverlayAction::Undo => self.undo(),
            OverlayAction::Close => self.close_session(),
            OverlayAction::Position { left, top } => {
                self.update_frame(|frame| frame.moved_to(left, top))
            }
            OverlayAction::Resize { width, height } => {
                self.update_frame(|frame| frame.resized_to(width, height))
            }
            OverlayAction::Regenerate => self.request_improve(true),
        }
    }

    fn replace(&mut self, text: &str, confirmed: bool) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.watch.check(&mut active.selection, &self.page) {
            self.notify(Notice::error(
                "The selected text changed on the page. Select it again.",
            ));
            return;
        }

        let outcome = active
            .replacer
            .replace(&mut self.page, &active.selection, text, confirmed);
        match outcome {
            Ok(ReplaceOutcome::Applied) => {
                cover_inserted_text(&mut active.selection, text);
                tracing::info!("[Content] Replaced selection");
                self.notify(Notice::info("Replaced."));
            }
            Ok(ReplaceOutcome::NeedsConfirmation(request)) => {
                tracing::debug!(
                    "[Content] Replacement of {} chars needs confirmation",
                    request.new_len
                );
                let token = active.session.token.clone();
                self.post_or_warn(&Message::OverlayConfirm { token, request });
            }
            Err(err) => {
                tracing::warn!("[Content] Replacement failed: {}", err);
                self.notify(Notice::error(replace_failure_message(&err)));
            }
        }
    }

    fn undo(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let notice = match active.replacer.undo(&mut self.page) {
            Ok(true) => Notice::info("Selection restored."),
            Ok(false) => Notice::info("Nothing to undo."),
            Err(err) => {
                tracing::warn!("[Content] Undo failed: {}", err);
                Notice::error(format!("Undo failed: {err}"))
            }
        };
        self.notify(notice);
    }

    fn update_frame(&mut self, change: impl FnOnce(FrameMetrics) -> FrameMetrics) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let frame = change(active.session.frame).clamped(
            self.viewport,
            self.config.min_width,
            self.config.min_height,
        );
        active.session.frame = frame;
        let token = active.session.token.clone();
        self.post_or_warn(&Message::OverlayFrame { token, frame });
    }

    /// Shows a toast in the overlay; errors fall back to the host page.
    fn notify(&mut self, notice: Notice) {
        let Some(token) = self.current_token() else {
            return;
        };
        let level = notice.level;
        let message = notice.message.clone();
        if !self.post(&Message::OverlayNotice { token, notice }) && level == NoticeLevel::Error {
            self.host_notice(ErrorReport::new(ErrorType::Unknown, message));
        }
    }

    fn host_notice(&self, report: ErrorReport) {
        if self.host_notices.send(report).is_err() {
            tracing::debug!("[Content] No host notice listener");
        }
    }

    fn current_token(&self) -> Option<SessionToken> {
        self.active
            .as_ref()
            .map(|active| active.session.token.clone())
    }

    fn post(&self, message: &Message) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        self.bus
            .post(self.endpoint, active.overlay, &self.extension_origin, message)
    }

    fn post_or_warn(&self, message: &Message) {
        if !self.post(message) {
            tracing::warn!("[Content] Overlay unreachable, {} dropped", message.kind());
        }
    }
}

/// Moves the anchor to span the text just written, so a second replace in
/// the same session overwrites it instead of inserting next to it.
fn cover_inserted_text(selection: &mut SelectionInfo, text: &str) {
    let len = text.chars().count();
    match selection.anchor.as_mut() {
        Some(Anchor::Input { start, end, .. }) => *end = *start + len,
        Some(Anchor::Range { range, .. }) => range.end = range.start + len,
        None => {}
    }
}

fn replace_failure_message(err: &RefineError) -> String {
    if err.is_dom() {
        "The selected text is no longer on the page.".to_string()
    } else {
        format!("Replace failed: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundContext;
    use refine_core::config::Settings;
    use refine_core::page::{MemoryPage, NodeId};
    use refine_core::settings::StaticSettings;
    use refine_interaction::{ClientConfig, RewriteClient, ScriptStep, ScriptedTransport};
    use std::sync::Arc;
    use std::time::Duration;

    const EXT: &str = "refine-extension://test";
    const PAGE: &str = "https://example.com";

    struct CapturingLauncher(mpsc::UnboundedSender<OverlayLaunch>);

    impl OverlayLauncher for CapturingLauncher {
        fn launch(&mut self, launch: OverlayLaunch) {
            let _ = self.0.send(launch);
        }
    }

    /// Plays the overlay side by hand.
    struct FakeOverlay {
        bus: MessageBus,
        launch: OverlayLaunch,
    }

    impl FakeOverlay {
        fn send(&self, message: &Message) -> bool {
            self.bus
                .post(self.launch.endpoint, self.launch.parent, PAGE, message)
        }

        fn action(&self, action: OverlayAction) -> bool {
            self.send(&Message::OverlayAction {
                token: self.launch.token.clone(),
                action,
            })
        }

        async fn next(&mut self) -> Message {
            let envelope = self.launch.inbox.recv().await.unwrap();
            assert_eq!(envelope.origin, PAGE);
            serde_json::from_value(envelope.data).unwrap()
        }

        fn try_next(&mut self) -> Option<Message> {
            self.launch
                .inbox
                .try_recv()
                .ok()
                .map(|envelope| serde_json::from_value(envelope.data).unwrap())
        }

        /// Sends the handshake and consumes ack plus selection text.
        async fn handshake(&mut self) -> String {
            assert!(self.send(&Message::OverlayInit {
                token: self.launch.token.clone(),
                text: None,
                frame: None,
            }));
            match self.next().await {
                Message::OverlayInit { frame, .. } => assert!(frame.is_some()),
                other => panic!("expected ack, got {other:?}"),
            }
            match self.next().await {
                Message::SelectionText { text, .. } => text,
                other => panic!("expected selection, got {other:?}"),
            }
        }
    }

    struct Harness {
        bus: MessageBus,
        content: ContentHandle<MemoryPage>,
        launches: mpsc::UnboundedReceiver<OverlayLaunch>,
        notices: mpsc::UnboundedReceiver<ErrorReport>,
        transport: ScriptedTransport,
        input: NodeId,
    }

    impl Harness {
        fn start(
            origin: &str,
            value: &str,
            selection: (usize, usize),
            steps: Vec<ScriptStep>,
        ) -> Self {
            let mut page = MemoryPage::new(origin);
            let input = page.add_text_control(value);
            page.select_in_control(input, selection.0, selection.1);

            let transport = ScriptedTransport::new(steps);
            let settings = Arc::new(StaticSettings(Settings {
                api_key: Some("sk-test".to_string()),
                ..Settings::default()
            }));
            let client = RewriteClient::new(Arc::new(transport.clone()), ClientConfig::default());
            let (background, background_handle) = BackgroundContext::new(settings, client);
            background.spawn();

            let bus = MessageBus::new();
            let (launch_tx, launches) = mpsc::unbounded_channel();
            let (notice_tx, notices) = mpsc::unbounded_channel();
            let (context, content) = ContentContext::new(
                page,
                bus.clone(),
                EXT,
                background_handle,
                Box::new(CapturingLauncher(launch_tx)),
                notice_tx,
                OverlayConfig::default(),
                Viewport::default(),
            );
            context.spawn();
            Self {
                bus,
                content,
                launches,
                notices,
                transport,
                input,
            }
        }

        async fn open(&mut self) -> FakeOverlay {
            assert!(self.content.improve());
            let launch = self.launches.recv().await.unwrap();
            FakeOverlay {
                bus: self.bus.clone(),
                launch,
            }
        }

        async fn value(&self) -> String {
            let input = self.input;
            self.content
                .with_page(move |page| page.control_value(input).unwrap_or_default())
                .await
                .unwrap()
        }
    }

    fn response_text(message: Message) -> Option<String> {
        match message {
            Message::ImproveResponse { result, .. } => result.map(|result| result.text),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_sends_selection_and_result() {
        let mut harness = Harness::start(
            PAGE,
            "please fix my code",
            (7, 18),
            vec![ScriptStep::ok("Fixed.")],
        );
        let mut overlay = harness.open().await;

        assert_eq!(overlay.handshake().await, "fix my code");
        assert_eq!(response_text(overlay.next().await).as_deref(), Some("Fixed."));
        assert_eq!(harness.transport.calls()[0].text, "fix my code");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_handshake_is_ignored() {
        let mut harness = Harness::start(PAGE, "some text", (0, 4), vec![ScriptStep::ok("Done.")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.send(&Message::OverlayInit {
            token: overlay.launch.token.clone(),
            text: None,
            frame: None,
        }));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(overlay.try_next().is_none());
        assert_eq!(harness.transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_newest_regenerate_reply_is_forwarded() {
        let mut harness = Harness::start(
            PAGE,
            "draft text",
            (0, 10),
            vec![
                ScriptStep::ok_after(Duration::from_secs(5), "First"),
                ScriptStep::ok_after(Duration::from_secs(5), "Second"),
                ScriptStep::ok("Third"),
            ],
        );
        let mut overlay = harness.open().await;
        overlay.handshake().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(overlay.action(OverlayAction::Regenerate));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(overlay.action(OverlayAction::Regenerate));

        assert_eq!(response_text(overlay.next().await).as_deref(), Some("Third"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(overlay.try_next().is_none());
        assert_eq!(harness.transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_with_wrong_token_leaves_page_untouched() {
        let mut harness = Harness::start(PAGE, "hello world", (0, 5), vec![ScriptStep::ok("Hi")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.send(&Message::OverlayAction {
            token: SessionToken::from("guessed"),
            action: OverlayAction::Replace {
                text: "pwned".to_string()
            },
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.value().await, "hello world");
        assert!(overlay.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_then_undo() {
        let mut harness =
            Harness::start(PAGE, "hello world", (6, 11), vec![ScriptStep::ok("there")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.action(OverlayAction::Replace {
            text: "there".to_string()
        }));
        match overlay.next().await {
            Message::OverlayNotice { notice, .. } => assert_eq!(notice, Notice::info("Replaced.")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(harness.value().await, "hello there");

        assert!(overlay.action(OverlayAction::Undo));
        match overlay.next().await {
            Message::OverlayNotice { notice, .. } => {
                assert_eq!(notice, Notice::info("Selection restored."))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(overlay.action(OverlayAction::Undo));
        match overlay.next().await {
            Message::OverlayNotice { notice, .. } => {
                assert_eq!(notice, Notice::info("Nothing to undo."))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_replacement_waits_for_confirmation() {
        let long = "y".repeat(1200);
        let mut harness = Harness::start(PAGE, "short", (0, 5), vec![ScriptStep::ok(&long)]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.action(OverlayAction::Replace { text: long.clone() }));
        match overlay.next().await {
            Message::OverlayConfirm { request, .. } => {
                assert_eq!(request.original_len, 5);
                assert_eq!(request.new_len, 1200);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(harness.value().await, "short");

        assert!(overlay.action(OverlayAction::ReplaceConfirmed { text: long.clone() }));
        overlay.next().await;
        assert_eq!(harness.value().await, long);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_control_reports_dom_error() {
        let mut harness = Harness::start(PAGE, "hello world", (0, 5), vec![ScriptStep::ok("Hi")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        let input = harness.input;
        harness
            .content
            .with_page(move |page| page.remove_node(input))
            .await
            .unwrap();
        assert!(overlay.action(OverlayAction::Replace {
            text: "Hi".to_string()
        }));

        match overlay.next().await {
            Message::OverlayNotice { notice, .. } => assert_eq!(notice.level, NoticeLevel::Error),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_is_clamped_and_mirrored() {
        let mut harness = Harness::start(PAGE, "hello", (0, 5), vec![ScriptStep::ok("Hi")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.action(OverlayAction::Position {
            left: -50,
            top: 5000
        }));

        match overlay.next().await {
            Message::OverlayFrame { frame, .. } => {
                let viewport = Viewport::default();
                assert_eq!(frame.left, 0);
                assert_eq!(frame.top, viewport.height - frame.height);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restricted_origin_raises_permission_notice() {
        let mut harness =
            Harness::start("chrome://settings", "hello", (0, 5), vec![ScriptStep::ok("Hi")]);
        assert!(harness.content.improve());

        let notice = harness.notices.recv().await.unwrap();
        assert_eq!(notice.error_type, ErrorType::Permission);
        assert!(harness.launches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_revokes_token() {
        let mut harness = Harness::start(PAGE, "hello", (0, 5), vec![ScriptStep::ok("Hi")]);
        let mut overlay = harness.open().await;
        overlay.handshake().await;
        overlay.next().await;

        assert!(overlay.action(OverlayAction::Close));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!harness.bus.is_registered(overlay.launch.endpoint));
        assert!(!overlay.action(OverlayAction::Undo));
    }
}
