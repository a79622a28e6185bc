//! Platform adapter.
//!
//! Translates platform signals into [`WorkerEvent`]s and carries out what
//! the router asks for: delivering `Activate` after a successful install or
//! a skip-waiting request, and sending passthrough requests to the network.

use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::config::RouterConfig;
use crate::control::ControlMessage;
use crate::error::Result;
use crate::fetch::{Fetcher, Request, Response};
use crate::router::{EventOutcome, OfflineRouter, WorkerEvent};

/// Hosts one router instance.
pub struct WorkerHost {
    router: OfflineRouter,
    network: Arc<dyn Fetcher>,
}

impl WorkerHost {
    /// Build a host and its router.
    pub fn new(
        config: RouterConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let router = OfflineRouter::new(config, caches, network.clone())?;
        Ok(Self { router, network })
    }

    /// The hosted router.
    pub fn router(&self) -> &OfflineRouter {
        &self.router
    }

    /// Install, then activate if the worker asked to skip waiting.
    /// Holds until both steps have completed.
    pub async fn start(&self) -> Result<()> {
        let outcome = self.router.route(WorkerEvent::Install).await?;
        self.follow_up(outcome).await
    }

    /// Deliver the activate signal (all older pages closed).
    pub async fn activate(&self) -> Result<()> {
        self.router.route(WorkerEvent::Activate).await?;
        Ok(())
    }

    /// Intercept a page request.
    ///
    /// `Ok(None)` means the request resolved without a response.
    pub async fn fetch(&self, request: Request) -> Result<Option<Response>> {
        match self.router.route(WorkerEvent::Fetch(request)).await? {
            EventOutcome::Respond(response) => Ok(response),
            EventOutcome::Passthrough(request) => Ok(Some(self.network.fetch(&request).await?)),
            EventOutcome::Done | EventOutcome::ActivationPending => Ok(None),
        }
    }

    /// Handle a JSON message posted by the page.
    pub async fn post_message(&self, payload: &str) -> Result<()> {
        let message = ControlMessage::from_json(payload)?;
        self.send(message).await
    }

    /// Handle a typed control message.
    pub async fn send(&self, message: ControlMessage) -> Result<()> {
        let outcome = self.router.route(WorkerEvent::Message(message)).await?;
        self.follow_up(outcome).await
    }

    async fn follow_up(&self, outcome: EventOutcome) -> Result<()> {
        if let EventOutcome::ActivationPending = outcome {
            self.router.route(WorkerEvent::Activate).await?;
        }
        Ok(())
    }
}
