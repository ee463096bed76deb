//! Background context: holds the credential and performs the remote call.

use refine_core::ErrorReport;
use refine_core::protocol::{ImproveReply, ImproveRequest};
use refine_core::session::SessionToken;
use refine_core::settings::SettingsService;
use refine_interaction::RewriteClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub enum BackgroundCommand {
    Improve {
        request: ImproveRequest,
        reply_to: mpsc::UnboundedSender<ImproveReply>,
    },
}

/// Sending side of the background context.
#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::UnboundedSender<BackgroundCommand>,
}

impl BackgroundHandle {
    pub fn improve(
        &self,
        request: ImproveRequest,
        reply_to: mpsc::UnboundedSender<ImproveReply>,
    ) -> bool {
        self.tx
            .send(BackgroundCommand::Improve { request, reply_to })
            .is_ok()
    }
}

struct InFlight {
    request_id: u64,
    cancel: CancellationToken,
}

/// Runs one remote call per request, at most one per session token.
///
/// A newer request for the same token cancels the older one. Closing a
/// session does not cancel its call; the reply simply carries a token nobody
/// accepts any more.
pub struct BackgroundContext {
    settings: Arc<dyn SettingsService>,
    client: RewriteClient,
    in_flight: Arc<Mutex<HashMap<SessionToken, InFlight>>>,
    rx: mpsc::UnboundedReceiver<BackgroundCommand>,
}

impl BackgroundContext {
    pub fn new(
        settings: Arc<dyn SettingsService>,
        client: RewriteClient,
    ) -> (Self, BackgroundHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let context = Self {
            settings,
            client,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            rx,
        };
        (context, BackgroundHandle { tx })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::debug!("[Background] Started");
        while let Some(command) = self.rx.recv().await {
            match command {
                BackgroundCommand::Improve { request, reply_to } => {
                    self.start_call(request, reply_to);
                }
            }
        }

        if let Ok(mut in_flight) = self.in_flight.lock() {
            for (_, call) in in_flight.drain() {
                call.cancel.cancel();
            }
        }
        tracing::debug!("[Background] Stopped");
    }

    fn start_call(&self, request: ImproveRequest, reply_to: mpsc::UnboundedSender<ImproveReply>) {
        let cancel = CancellationToken::new();
        if let Ok(mut in_flight) = self.in_flight.lock() {
            let previous = in_flight.insert(
                request.token.clone(),
                InFlight {
                    request_id: request.request_id,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                tracing::info!(
                    "[Background] Request {} supersedes request {}",
                    request.request_id,
                    previous.request_id
                );
                previous.cancel.cancel();
            }
        }

        tracing::debug!(
            "[Background] Improve request {} ({} chars)",
            request.request_id,
            request.text.chars().count()
        );

        let settings = Arc::clone(&self.settings);
        let client = self.client.clone();
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let outcome = match settings.load().await {
                Ok(settings) if request.fresh => {
                    client.regenerate(&request.text, &settings, &cancel).await
                }
                Ok(settings) => client.call(&request.text, &settings, &cancel).await,
                Err(err) => {
                    tracing::error!("[Background] Failed to load settings: {}", err);
                    Err(ErrorReport::from(err))
                }
            };

            if let Ok(mut in_flight) = in_flight.lock() {
                let finished = in_flight
                    .get(&request.token)
                    .is_some_and(|call| call.request_id == request.request_id);
                if finished {
                    in_flight.remove(&request.token);
                }
            }

            let reply = ImproveReply {
                token: request.token,
                request_id: request.request_id,
                outcome,
            };
            if reply_to.send(reply).is_err() {
                tracing::debug!("[Background] Requester is gone, reply dropped");
            }
        });
    }
}
