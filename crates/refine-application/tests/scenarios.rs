//! End-to-end flows across the content, overlay and background contexts.

use refine_application::{
    Extension, ExtensionConfig, ExtensionHandle, MemoryClipboard, MessageBus, OverlayHandle,
    UiCommand,
};
use refine_core::ErrorType;
use refine_core::config::Settings;
use refine_core::page::{HostPage, MemoryPage, NodeId};
use refine_core::protocol::{Message, OverlayAction};
use refine_core::session::SessionToken;
use refine_core::settings::StaticSettings;
use refine_core::typing::OverlayState;
use refine_interaction::{ClientConfig, RewriteClient, ScriptStep, ScriptedTransport};
use std::sync::Arc;
use std::time::Duration;

const PAGE: &str = "https://example.com";

struct World {
    extension: ExtensionHandle<MemoryPage>,
    transport: ScriptedTransport,
    clipboard: MemoryClipboard,
    input: NodeId,
}

impl World {
    fn start(
        value: &str,
        selection: (usize, usize),
        typing_speed_ms: u64,
        steps: Vec<ScriptStep>,
    ) -> Self {
        let mut page = MemoryPage::new(PAGE);
        let input = page.add_text_control(value);
        page.select_in_control(input, selection.0, selection.1);

        let transport = ScriptedTransport::new(steps);
        let settings = StaticSettings(Settings {
            api_key: Some("sk-or-test".to_string()),
            typing_speed_ms,
            ..Settings::default()
        });
        let client = RewriteClient::new(Arc::new(transport.clone()), ClientConfig::default());
        let clipboard = MemoryClipboard::default();
        let extension = Extension::new(Arc::new(settings), client)
            .with_clipboard(Arc::new(clipboard.clone()))
            .with_config(ExtensionConfig::default())
            .start(page);

        Self {
            extension,
            transport,
            clipboard,
            input,
        }
    }

    async fn open(&mut self) -> OverlayHandle {
        assert!(self.extension.content().improve());
        self.extension.next_overlay().await.unwrap()
    }

    async fn value(&self) -> String {
        let input = self.input;
        self.extension
            .content()
            .with_page(move |page| page.control_value(input).unwrap_or_default())
            .await
            .unwrap()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_accept_replaces_selection_in_text_control() {
    let mut world = World::start(
        "please fix my code now",
        (7, 18),
        5,
        vec![ScriptStep::ok("Please fix my code, including tests.")],
    );
    let mut overlay = world.open().await;

    let ready = overlay
        .wait_for(|view| view.state == OverlayState::Ready)
        .await
        .unwrap();
    assert_eq!(ready.original.as_deref(), Some("fix my code"));
    assert_eq!(ready.visible, "Please fix my code, including tests.");

    overlay.send(UiCommand::Accept);
    overlay
        .wait_for(|view| view.has_toast("Replaced."))
        .await
        .unwrap();

    assert_eq!(
        world.value().await,
        "please Please fix my code, including tests. now"
    );
    assert_eq!(world.transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhausts_retries_and_shows_error() {
    let mut world = World::start(
        "some text",
        (0, 9),
        0,
        vec![ScriptStep::status(429, r#"{"error": {"message": "Rate limit exceeded"}}"#)],
    );
    let mut overlay = world.open().await;

    let failed = overlay
        .wait_for(|view| view.state == OverlayState::Error)
        .await
        .unwrap();

    let error = failed.error.unwrap();
    assert_eq!(error.error_type, ErrorType::RateLimit);
    assert_eq!(error.status_code, Some(429));
    assert!(failed.can_regenerate);
    assert_eq!(world.transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_whitespace_selection_reports_empty_selection() {
    let mut world = World::start("   hello", (0, 3), 0, vec![ScriptStep::ok("unused")]);

    assert!(world.extension.content().improve());
    let notice = world
        .extension
        .next_host_notice(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(notice.error_type, ErrorType::EmptySelection);
    assert!(world.extension.try_next_overlay().is_none());
    assert_eq!(world.transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reply_for_closed_session_is_ignored() {
    let mut world = World::start(
        "draft text",
        (0, 10),
        0,
        vec![
            ScriptStep::ok_after(Duration::from_secs(3), "Old result"),
            ScriptStep::ok("New result"),
        ],
    );
    let mut first = world.open().await;
    first
        .wait_for(|view| view.state == OverlayState::Loading)
        .await
        .unwrap();

    first.send(UiCommand::Close);
    first.wait_for(|view| view.closed).await.unwrap();
    let mut second = world.open().await;

    let ready = second
        .wait_for(|view| view.state == OverlayState::Ready)
        .await
        .unwrap();
    assert_eq!(ready.visible, "New result");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let view = second.view();
    assert_eq!(view.visible, "New result");
    assert_eq!(view.state, OverlayState::Ready);
    assert!(world.extension.try_host_notice().is_none());
    assert_eq!(world.transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_escape_cancels_every_timer() {
    let long = "z".repeat(500);
    let mut world = World::start("text here", (0, 9), 25, vec![ScriptStep::ok(&long)]);
    let mut overlay = world.open().await;
    overlay
        .wait_for(|view| view.state == OverlayState::Typing)
        .await
        .unwrap();
    assert!(overlay.live_timers() > 0);

    assert!(world.extension.content().escape());
    let closed = overlay.wait_for(|view| view.closed).await.unwrap();

    assert_eq!(closed.pending_timers, 0);
    settle().await;
    assert_eq!(overlay.live_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_forged_messages_do_not_touch_the_page() {
    let mut world = World::start("hello world", (0, 5), 0, vec![ScriptStep::ok("Howdy")]);
    let mut overlay = world.open().await;
    let before = overlay
        .wait_for(|view| view.state == OverlayState::Ready)
        .await
        .unwrap();

    let bus: MessageBus = world.extension.bus().clone();
    let (forger, _inbox) = bus.register(PAGE);
    let guessed = SessionToken::from("0123456789abcdef");
    let replace = Message::OverlayAction {
        token: guessed.clone(),
        action: OverlayAction::Replace {
            text: "pwned".to_string(),
        },
    };
    bus.post(forger, world.extension.content().endpoint(), PAGE, &replace);
    let injected = Message::SelectionText {
        token: guessed,
        text: "injected".to_string(),
    };
    bus.post(
        forger,
        overlay.endpoint(),
        refine_application::DEFAULT_EXTENSION_ORIGIN,
        &injected,
    );
    settle().await;

    assert_eq!(world.value().await, "hello world");
    assert_eq!(overlay.view(), before);
}

#[tokio::test(start_paused = true)]
async fn test_large_replacement_needs_confirmation() {
    let long = "word ".repeat(300).trim_end().to_string();
    let mut world = World::start("tiny", (0, 4), 0, vec![ScriptStep::ok(&long)]);
    let mut overlay = world.open().await;
    overlay
        .wait_for(|view| view.state == OverlayState::Ready)
        .await
        .unwrap();

    overlay.send(UiCommand::Accept);
    let pending = overlay
        .wait_for(|view| view.confirmation.is_some())
        .await
        .unwrap();
    let request = pending.confirmation.unwrap();
    assert_eq!(request.original_len, 4);
    assert_eq!(request.new_len, long.chars().count());
    assert!(request.preview.ends_with('…'));
    assert_eq!(world.value().await, "tiny");

    overlay.send(UiCommand::ConfirmReplace);
    overlay
        .wait_for(|view| view.has_toast("Replaced."))
        .await
        .unwrap();
    assert_eq!(world.value().await, long);
}

#[tokio::test(start_paused = true)]
async fn test_copy_puts_result_on_clipboard() {
    let mut world = World::start("hello", (0, 5), 0, vec![ScriptStep::ok("Hello!")]);
    let mut overlay = world.open().await;
    overlay
        .wait_for(|view| view.state == OverlayState::Ready)
        .await
        .unwrap();

    overlay.send(UiCommand::Copy);
    overlay
        .wait_for(|view| view.has_toast("Copied to clipboard."))
        .await
        .unwrap();

    assert_eq!(world.clipboard.contents().as_deref(), Some("Hello!"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_returns_the_page() {
    let world = World::start("hello", (0, 5), 0, vec![ScriptStep::ok("Hi")]);

    let page = world.extension.shutdown().await.unwrap();

    assert_eq!(page.control_value(world.input).as_deref(), Some("hello"));
}
