//! The update dispatcher and its lifecycle.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::UpdateDispatcher;
//! use courier_framework::on_message;
//!
//! let dispatcher = UpdateDispatcher::builder()
//!     .parsers(my_parsers())
//!     .build(client)?;
//!
//! dispatcher.add_handler(on_message().handler(echo), 0).await?;
//! dispatcher.start().await?;
//!
//! let sender = dispatcher.sender();
//! transport.on_update(move |raw, entities| sender.send(raw, entities));
//! ```
//!
//! Registry mutations (`add_handler` and friends) are scheduled as tasks and
//! return a [`MutationHandle`]. Awaiting the handle confirms the change;
//! dropping it is fine too, failures are then logged. Handlers must not await
//! the handle: their worker is paused by the very mutation they would wait on.

use std::future::{Future, IntoFuture};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::signal;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use courier_core::{BoxedClient, EntityMaps, RawEvent};
use courier_framework::{
    ErrorHandler, ErrorHandlerTarget, ErrorRouter, EventClassifier, Handler, HandlerRegistry,
    ParserSet, RegistryError,
};

use crate::barrier::LockBarrier;
use crate::config::{ConfigLoader, CourierConfig, DispatcherConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::queue::{self, UpdateSender};
use crate::worker::{self, WorkerShared};

// =============================================================================
// MutationHandle
// =============================================================================

/// Confirmation of a scheduled registry mutation.
///
/// Await it (or call [`wait`](Self::wait)) to learn whether the mutation
/// succeeded. If the handle is dropped instead, a failure is logged at `warn`.
pub struct MutationHandle {
    operation: &'static str,
    rx: oneshot::Receiver<Result<(), RegistryError>>,
}

impl MutationHandle {
    /// Returns the name of the scheduled operation, e.g. `"add_handler"`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Waits for the mutation to be applied.
    ///
    /// Inside a handler this returns [`RegistryError::AwaitedFromHandler`]
    /// at once: the mutation needs the worker's lock, which the handler holds
    /// until it returns. The mutation itself still goes through afterwards.
    pub async fn wait(self) -> Result<(), RegistryError> {
        if let Some(worker) = worker::current_worker() {
            warn!(
                operation = self.operation,
                worker,
                "Mutation awaited from a handler, not waiting"
            );
            return Err(RegistryError::AwaitedFromHandler { worker });
        }
        self.rx.await.unwrap_or(Err(RegistryError::DispatcherGone))
    }
}

impl IntoFuture for MutationHandle {
    type Output = Result<(), RegistryError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl std::fmt::Debug for MutationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationHandle")
            .field("operation", &self.operation)
            .finish()
    }
}

// =============================================================================
// UpdateDispatcher
// =============================================================================

struct DispatcherInner {
    config: DispatcherConfig,
    shared: Arc<WorkerShared>,
    barrier: LockBarrier,
    sender: UpdateSender,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

/// Receives raw updates and delivers them to registered handlers.
///
/// Cheap to clone; all clones drive the same worker pool and registry.
#[derive(Clone)]
pub struct UpdateDispatcher {
    inner: Arc<DispatcherInner>,
}

impl UpdateDispatcher {
    /// Creates a stopped dispatcher.
    ///
    /// The classifier table is built here, once, from `parsers`.
    pub fn new(client: BoxedClient, parsers: ParserSet, config: DispatcherConfig) -> Self {
        let (sender, receiver) = queue::channel(config.no_updates);
        let shared = WorkerShared {
            client,
            classifier: EventClassifier::new(parsers),
            router: ErrorRouter::new(config.error_policy),
            registry: RwLock::new(Arc::new(HandlerRegistry::new())),
            receiver,
        };

        Self {
            inner: Arc::new(DispatcherInner {
                config,
                shared: Arc::new(shared),
                barrier: LockBarrier::new(),
                sender,
                workers: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a builder that loads configuration from files and environment.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns a handle the transport uses to enqueue updates.
    pub fn sender(&self) -> UpdateSender {
        self.inner.sender.clone()
    }

    /// Enqueues one update.
    pub fn feed(&self, raw: RawEvent, entities: impl Into<Arc<EntityMaps>>) -> RuntimeResult<()> {
        self.inner.sender.send(raw, entities)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawns the worker pool.
    ///
    /// Does nothing when updates are disabled or the pool is already running.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.inner.config.no_updates {
            debug!("Updates disabled, not starting workers");
            return Ok(());
        }

        let mut workers = self.inner.workers.lock().await;
        if !workers.is_empty() {
            warn!("Dispatcher is already running");
            return Ok(());
        }

        let locks = self.inner.barrier.install(self.inner.config.workers);
        for (index, lock) in locks.into_iter().enumerate() {
            let shared = Arc::clone(&self.inner.shared);
            workers.push(tokio::spawn(worker::run(index, lock, shared)));
        }
        self.inner.running.store(true, Ordering::SeqCst);

        info!(
            workers = workers.len(),
            error_policy = ?self.inner.config.error_policy,
            "Dispatcher started"
        );
        Ok(())
    }

    /// Stops the worker pool after every update queued so far was handled.
    ///
    /// One shutdown sentinel is enqueued per worker, then all workers are
    /// joined. Handler groups are cleared afterwards; error handlers stay.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if self.inner.config.no_updates {
            return Ok(());
        }

        let mut workers = self.inner.workers.lock().await;
        if workers.is_empty() {
            debug!("Dispatcher is not running");
            return Ok(());
        }

        info!(workers = workers.len(), "Stopping dispatcher");
        for _ in 0..workers.len() {
            self.inner.sender.shutdown_one()?;
        }

        let mut panicked = None;
        for (index, handle) in workers.drain(..).enumerate() {
            if let Err(err) = handle.await {
                error!(worker = index, "Worker terminated abnormally: {err}");
                panicked.get_or_insert(index);
            }
        }

        self.inner.barrier.reset();
        Arc::make_mut(&mut self.inner.shared.registry.write()).clear_groups();
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Dispatcher stopped");

        match panicked {
            Some(index) => Err(RuntimeError::WorkerPanicked(index)),
            None => Ok(()),
        }
    }

    /// Starts, waits for `shutdown`, then stops.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    /// Starts and runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Returns `true` while the worker pool is up.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Returns the number of live workers.
    pub fn worker_count(&self) -> usize {
        self.inner.barrier.len()
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Returns the registry as workers currently see it.
    pub fn registry(&self) -> Arc<HandlerRegistry> {
        self.inner.shared.snapshot()
    }

    /// Appends `handler` to `group`.
    ///
    /// Must be called from within a tokio runtime. From inside a handler,
    /// drop the returned handle instead of awaiting it; the change lands as
    /// soon as the current update is done.
    pub fn add_handler(&self, handler: impl Into<Handler>, group: i32) -> MutationHandle {
        let handler = handler.into();
        self.mutate("add_handler", move |registry| {
            registry.add(handler, group);
            Ok(())
        })
    }

    /// Removes the first instance of `handler` from `group`.
    pub fn remove_handler(&self, handler: impl Into<Handler>, group: i32) -> MutationHandle {
        let handler = handler.into();
        self.mutate("remove_handler", move |registry| {
            registry.remove(&handler, group)
        })
    }

    /// Registers an error handler for routing without putting it in a group.
    pub fn add_error_handler(&self, handler: ErrorHandler) -> MutationHandle {
        self.mutate("add_error_handler", move |registry| {
            registry.add_error_handler(handler);
            Ok(())
        })
    }

    pub fn remove_error_handler(&self, target: impl Into<ErrorHandlerTarget>) -> MutationHandle {
        let target = target.into();
        self.mutate("remove_error_handler", move |registry| {
            registry.remove_error_handler(&target)
        })
    }

    /// Schedules `f` to run with every worker paused.
    fn mutate<F>(&self, operation: &'static str, f: F) -> MutationHandle
    where
        F: FnOnce(&mut HandlerRegistry) -> Result<(), RegistryError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let result = apply(inner, operation, f).await;
            if let Err(Err(err)) = tx.send(result) {
                warn!(operation, "Unobserved registry mutation failed: {err}");
            }
        });

        MutationHandle { operation, rx }
    }
}

async fn apply<F>(
    inner: Weak<DispatcherInner>,
    operation: &'static str,
    f: F,
) -> Result<(), RegistryError>
where
    F: FnOnce(&mut HandlerRegistry) -> Result<(), RegistryError>,
{
    let inner = inner.upgrade().ok_or(RegistryError::DispatcherGone)?;
    let _barrier = inner.barrier.acquire_all().await;

    let result = f(Arc::make_mut(&mut inner.shared.registry.write()));
    match &result {
        Ok(()) => debug!(operation, "Registry updated"),
        Err(err) => debug!(operation, "Registry mutation rejected: {err}"),
    }
    result
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(err) => warn!("Cannot listen for SIGTERM: {err}"),
        }
    }

    if let Err(err) = signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C: {err}");
        return;
    }
    info!("Received Ctrl+C, shutting down");
}

// =============================================================================
// DispatcherBuilder
// =============================================================================

/// Builds an [`UpdateDispatcher`] from layered configuration.
///
/// Building also validates the configuration and installs the global tracing
/// subscriber described by its `logging` section.
///
/// ```rust,ignore
/// let dispatcher = UpdateDispatcher::builder()
///     .config_file("config/courier.toml")
///     .profile("production")
///     .parsers(parsers)
///     .build(client)?;
/// ```
pub struct DispatcherBuilder {
    loader: ConfigLoader,
    parsers: ParserSet,
    workers: Option<usize>,
    init_logging: bool,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            parsers: ParserSet::new(),
            workers: None,
            init_logging: true,
        }
    }

    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges programmatic overrides on top of files and environment.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    pub fn parsers(mut self, parsers: ParserSet) -> Self {
        self.parsers = parsers;
        self
    }

    /// Overrides the configured worker count, e.g. from a command-line flag.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self, client: BoxedClient) -> RuntimeResult<UpdateDispatcher> {
        let mut config = self.loader.load()?;
        if let Some(workers) = self.workers {
            config.dispatcher.workers = workers;
        }
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        info!(
            workers = config.dispatcher.workers,
            no_updates = config.dispatcher.no_updates,
            parsers = self.parsers.len(),
            "Dispatcher configured"
        );

        Ok(UpdateDispatcher::new(client, self.parsers, config.dispatcher))
    }
}
