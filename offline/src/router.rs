//! Offline Router
//!
//! [`OfflineRouter::route`] is the single entry point for everything the
//! platform delivers to the worker: install, activate, fetch and page
//! messages. It never talks to the platform itself; the host adapter
//! ([`crate::host::WorkerHost`]) turns platform signals into
//! [`WorkerEvent`]s and acts on the returned [`EventOutcome`].

use std::sync::Arc;

use spin::{Mutex, RwLock};
use url::Url;

use crate::cache::CacheStorage;
use crate::classify::{Classifier, RouteClass};
use crate::config::RouterConfig;
use crate::control::ControlMessage;
use crate::error::Result;
use crate::fetch::{Fetcher, Request, Response};
use crate::lifecycle::{Lifecycle, LifecycleEvent, WorkerFlags, WorkerState};
use crate::manager::CacheLifecycleManager;
use crate::strategy::{self, StrategyContext};
use crate::task::BackgroundTasks;

/// Signal delivered to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(ControlMessage),
}

/// What the host should do after an event was handled.
#[derive(Debug)]
pub enum EventOutcome {
    /// Nothing further.
    Done,
    /// The worker moved to `Activating`; the host must deliver `Activate`.
    ActivationPending,
    /// The request was answered. `None` is the resolved-but-empty result.
    Respond(Option<Response>),
    /// Not intercepted; send the request to the network unmodified.
    Passthrough(Request),
}

/// Observer of lifecycle events.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// The offline cache router.
pub struct OfflineRouter {
    config: Arc<RouterConfig>,
    classifier: Classifier,
    offline_url: Url,
    manager: CacheLifecycleManager,
    strategies: StrategyContext,
    lifecycle: Mutex<Lifecycle>,
    listeners: RwLock<Vec<LifecycleListener>>,
}

impl OfflineRouter {
    /// Create a router. The configuration is validated here.
    pub fn new(
        config: RouterConfig,
        caches: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let origin = config.origin_url()?;
        let offline_url = config.resolve(&config.offline_path)?;
        let config = Arc::new(config);
        let classifier = Classifier::new(&origin, config.clone());

        Ok(Self {
            manager: CacheLifecycleManager::new(config.clone(), caches.clone(), fetcher.clone()),
            strategies: StrategyContext {
                caches,
                fetcher,
                background: BackgroundTasks::new(),
            },
            config,
            classifier,
            offline_url,
            lifecycle: Mutex::new(Lifecycle::new()),
            listeners: RwLock::new(Vec::new()),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.lifecycle.lock().state()
    }

    /// Current lifecycle flags.
    pub fn flags(&self) -> WorkerFlags {
        self.lifecycle.lock().flags()
    }

    /// Drain lifecycle events recorded so far.
    pub fn take_events(&self) -> Vec<LifecycleEvent> {
        self.lifecycle.lock().take_events()
    }

    /// Observe lifecycle events as they happen.
    ///
    /// Listeners run after the lifecycle lock is released and may call
    /// back into the router.
    pub fn on_lifecycle_event(&self, listener: impl Fn(&LifecycleEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Run `f` on the state machine, then notify listeners of whatever it
    /// recorded.
    fn with_lifecycle<T>(&self, f: impl FnOnce(&mut Lifecycle) -> T) -> T {
        let (out, pending) = {
            let mut lifecycle = self.lifecycle.lock();
            let out = f(&mut *lifecycle);
            (out, lifecycle.take_pending())
        };
        if !pending.is_empty() {
            let listeners: Vec<LifecycleListener> = self.listeners.read().clone();
            for event in &pending {
                for listener in &listeners {
                    listener(event);
                }
            }
        }
        out
    }

    /// Wait for in-flight cache write-backs.
    pub async fn settle(&self) {
        self.strategies.background.settle().await;
    }

    /// Classify a request without handling it.
    pub fn classify(&self, request: &Request) -> RouteClass {
        self.classifier.classify(request)
    }

    /// Handle one worker event.
    pub async fn route(&self, event: WorkerEvent) -> Result<EventOutcome> {
        match event {
            WorkerEvent::Install => self.install().await,
            WorkerEvent::Activate => self.activate().await,
            WorkerEvent::Fetch(request) => self.fetch(request).await,
            WorkerEvent::Message(message) => self.message(message).await,
        }
    }

    async fn install(&self) -> Result<EventOutcome> {
        self.with_lifecycle(Lifecycle::begin_install)?;
        log::info!("[SW Router] Installing");

        if let Err(e) = self.manager.on_install().await {
            log::error!("[SW Router] Install failed: {}", e);
            self.with_lifecycle(Lifecycle::fail)?;
            return Err(e.into());
        }

        let skip_waiting = self.config.skip_waiting;
        let activate_now = self.with_lifecycle(|lifecycle| {
            if skip_waiting {
                lifecycle.skip_waiting();
            }
            lifecycle.install_succeeded()
        })?;
        Ok(if activate_now {
            EventOutcome::ActivationPending
        } else {
            EventOutcome::Done
        })
    }

    async fn activate(&self) -> Result<EventOutcome> {
        self.with_lifecycle(Lifecycle::begin_activate)?;
        log::info!("[SW Router] Activating");

        if let Err(e) = self.manager.on_activate().await {
            log::error!("[SW Router] Activate failed: {}", e);
            self.with_lifecycle(Lifecycle::fail)?;
            return Err(e.into());
        }

        self.with_lifecycle(Lifecycle::activate_succeeded)?;
        log::info!("[SW Router] Active, controlling open pages");
        Ok(EventOutcome::Done)
    }

    async fn fetch(&self, request: Request) -> Result<EventOutcome> {
        if !self.lifecycle.lock().is_active() {
            return Ok(EventOutcome::Passthrough(request));
        }

        let buckets = &self.config.buckets;
        let class = self.classifier.classify(&request);
        log::trace!("[SW Router] {} {} -> {:?}", request.method, request.url, class);

        let response = match class {
            RouteClass::Skip => return Ok(EventOutcome::Passthrough(request)),
            RouteClass::Api => {
                strategy::network_first_api(&self.strategies, &buckets.api, &request).await?
            }
            RouteClass::Asset => {
                strategy::cache_first_asset(&self.strategies, &buckets.assets, &request).await?
            }
            RouteClass::Page => {
                strategy::network_first_page(
                    &self.strategies,
                    &buckets.pages,
                    &self.offline_url,
                    &request,
                )
                .await?
            }
        };
        Ok(EventOutcome::Respond(response))
    }

    async fn message(&self, message: ControlMessage) -> Result<EventOutcome> {
        log::debug!("[SW Control] Received {:?}", message);
        match message {
            ControlMessage::SkipWaiting => {
                if self.with_lifecycle(Lifecycle::skip_waiting) {
                    return Ok(EventOutcome::ActivationPending);
                }
                Ok(EventOutcome::Done)
            }
            ControlMessage::ClearCache => {
                self.manager.on_clear_all().await?;
                Ok(EventOutcome::Done)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::error::{FetchError, RouterError};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Fetcher for Echo {
        async fn fetch(&self, request: &Request) -> std::result::Result<Response, FetchError> {
            Ok(Response::new(200).with_body(request.url.path().as_bytes().to_vec()))
        }
    }

    fn router() -> OfflineRouter {
        OfflineRouter::new(
            RouterConfig::for_origin("https://memos.app"),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(Echo),
        )
        .unwrap()
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse("https://memos.app").unwrap().join(path).unwrap())
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = RouterConfig::default();
        config.api_prefix = String::from("api");
        let result = OfflineRouter::new(
            config,
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(Echo),
        );
        assert!(matches!(result, Err(RouterError::Config(_))));
    }

    #[tokio::test]
    async fn install_requests_activation() {
        let router = router();
        let outcome = router.route(WorkerEvent::Install).await.unwrap();
        assert!(matches!(outcome, EventOutcome::ActivationPending));
        assert_eq!(router.state(), WorkerState::Activating);
        assert!(router.flags().contains(WorkerFlags::SKIP_WAITING));

        router.route(WorkerEvent::Activate).await.unwrap();
        assert_eq!(router.state(), WorkerState::Active);
        assert!(router.flags().contains(WorkerFlags::CLIENTS_CLAIMED));
    }

    #[tokio::test]
    async fn fetch_before_activation_passes_through() {
        let router = router();
        let outcome = router.route(WorkerEvent::Fetch(get("/"))).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Passthrough(_)));
    }

    #[tokio::test]
    async fn second_install_rejected() {
        let router = router();
        router.route(WorkerEvent::Install).await.unwrap();
        let err = router.route(WorkerEvent::Install).await.unwrap_err();
        assert!(matches!(err, RouterError::Lifecycle(_)));
    }

    #[tokio::test]
    async fn skip_waiting_message_when_not_waiting() {
        let router = router();
        let outcome = router
            .route(WorkerEvent::Message(ControlMessage::SkipWaiting))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Done));
        assert_eq!(router.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn waiting_worker_activates_on_skip_waiting_message() {
        let mut config = RouterConfig::for_origin("https://memos.app");
        config.skip_waiting = false;
        let router = OfflineRouter::new(
            config,
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(Echo),
        )
        .unwrap();

        let outcome = router.route(WorkerEvent::Install).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Done));
        assert_eq!(router.state(), WorkerState::Waiting);
        let outcome = router.route(WorkerEvent::Fetch(get("/"))).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Passthrough(_)));

        let outcome = router
            .route(WorkerEvent::Message(ControlMessage::SkipWaiting))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::ActivationPending));
        assert_eq!(router.state(), WorkerState::Activating);

        let outcome = router
            .route(WorkerEvent::Message(ControlMessage::SkipWaiting))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Done));

        router.route(WorkerEvent::Activate).await.unwrap();
        assert_eq!(router.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn listener_can_read_router_state() {
        let router = Arc::new(router());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&router);
        let log = seen.clone();
        router.on_lifecycle_event(move |event| {
            if let Some(router) = weak.upgrade() {
                log.lock()
                    .unwrap()
                    .push((event.clone(), router.state(), router.flags()));
            }
        });

        router.route(WorkerEvent::Install).await.unwrap();
        router.route(WorkerEvent::Activate).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(
            seen[0],
            (
                LifecycleEvent::StateChange {
                    old_state: WorkerState::Parsed,
                    new_state: WorkerState::Installing,
                },
                WorkerState::Installing,
                WorkerFlags::empty(),
            )
        );
        let (event, state, flags) = &seen[4];
        assert_eq!(*event, LifecycleEvent::ControllerChange);
        assert_eq!(*state, WorkerState::Active);
        assert!(flags.contains(WorkerFlags::CLIENTS_CLAIMED));
    }

    #[tokio::test]
    async fn lifecycle_listener_sees_controller_change() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let router = router();
        let claimed = Arc::new(AtomicBool::new(false));
        let flag = claimed.clone();
        router.on_lifecycle_event(move |event| {
            if *event == LifecycleEvent::ControllerChange {
                flag.store(true, Ordering::SeqCst);
            }
        });

        router.route(WorkerEvent::Install).await.unwrap();
        router.route(WorkerEvent::Activate).await.unwrap();
        assert!(claimed.load(Ordering::SeqCst));
        assert!(router
            .take_events()
            .contains(&LifecycleEvent::ControllerChange));
    }
}
