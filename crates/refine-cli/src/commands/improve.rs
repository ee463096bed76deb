use anyhow::{Context, Result, bail};
use clap::Args;
use refine_application::{Extension, OverlayView, UiCommand};
use refine_core::config::Settings;
use refine_core::page::{HostPage, MemoryPage};
use refine_core::settings::{SettingsService, StaticSettings};
use refine_core::typing::OverlayState;
use refine_infrastructure::FileSettingsService;
use refine_interaction::{ClientConfig, RewriteClient, ScriptedTransport};
use std::sync::Arc;

/// Origin of the in-memory page the text is placed on.
const PAGE_ORIGIN: &str = "https://refine.local";

#[derive(Args)]
pub struct ImproveArgs {
    /// Text to rewrite
    #[arg(long)]
    text: String,

    /// Accept the rewrite and print the updated text control value
    #[arg(long)]
    accept: bool,

    /// Answer every request with this text instead of calling the service
    #[arg(long, value_name = "REPLY")]
    mock: Option<String>,
}

pub async fn run(args: ImproveArgs) -> Result<()> {
    let (settings, client): (Arc<dyn SettingsService>, RewriteClient) = match &args.mock {
        Some(reply) => {
            let settings = StaticSettings(Settings {
                api_key: Some("mock".to_string()),
                typing_speed_ms: 0,
                ..Settings::default()
            });
            let transport = Arc::new(ScriptedTransport::replying(reply));
            (
                Arc::new(settings),
                RewriteClient::new(transport, ClientConfig::default()),
            )
        }
        None => {
            let settings = FileSettingsService::from_default_location()
                .context("Failed to locate settings")?;
            (
                Arc::new(settings),
                RewriteClient::over_http(ClientConfig::default()),
            )
        }
    };

    let mut page = MemoryPage::new(PAGE_ORIGIN);
    let control = page.add_text_control(args.text.as_str());
    page.select_in_control(control, 0, args.text.chars().count());

    let mut extension = Extension::new(settings, client).start(page);
    extension.content().improve();
    let mut overlay = match extension.next_overlay_or_notice().await {
        Ok(overlay) => overlay,
        Err(notice) => bail!("{}", notice.message),
    };

    let view = settled(
        overlay
            .wait_for(|view| matches!(view.state, OverlayState::Ready | OverlayState::Error))
            .await,
    )?;
    if let Some(error) = view.error {
        bail!("{error}");
    }
    match view.latency_ms {
        Some(latency) if view.cached => tracing::info!("Served from cache in {}ms", latency),
        Some(latency) => tracing::info!("Rewritten in {}ms", latency),
        None => {}
    }

    if !args.accept {
        println!("{}", view.visible);
        overlay.send(UiCommand::Close);
        extension.shutdown().await?;
        return Ok(());
    }

    overlay.send(UiCommand::Accept);
    let view = settled(
        overlay
            .wait_for(|view| view.confirmation.is_some() || !view.toasts.is_empty())
            .await,
    )?;
    if let Some(request) = view.confirmation {
        tracing::info!(
            "Confirming large replacement ({} -> {} chars)",
            request.original_len,
            request.new_len
        );
        overlay.send(UiCommand::ConfirmReplace);
        settled(overlay.wait_for(|view| !view.toasts.is_empty()).await)?;
    }
    let toast = overlay.view().toasts.into_iter().next_back();
    if let Some(toast) = toast {
        tracing::info!("{}", toast.notice.message);
    }

    overlay.send(UiCommand::Close);
    let page = extension.shutdown().await?;
    let value = page
        .control_value(control)
        .context("Text control disappeared")?;
    println!("{value}");
    Ok(())
}

fn settled(view: Option<OverlayView>) -> Result<OverlayView> {
    view.context("Overlay closed unexpectedly")
}
