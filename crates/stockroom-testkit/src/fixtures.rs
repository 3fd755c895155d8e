//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a scriptable executor, a store
//! with switchable faults, and a harness that wires them to a manager.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use stockroom_core::{OperationId, PendingOperation, SyncEvent};
use stockroom_store::{MemoryQueueStore, QueueLimits, QueueStore, Result as StoreResult, StoreError};
use stockroom_sync::{
    Executor, ExecutorError, ManualConnectivity, Subscription, SyncConfig, SyncManager,
};

/// Scripted result of one executor call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Status(u16),
    Transport(String),
}

impl Reply {
    fn into_result(self) -> Result<Value, ExecutorError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Status(status) => Err(ExecutorError::Status {
                status,
                body: String::new(),
            }),
            Reply::Transport(message) => Err(ExecutorError::Transport(message)),
        }
    }
}

/// Executor whose replies are scripted per endpoint.
///
/// Endpoints without a script succeed with `{"ok": true}`. Every call is
/// recorded. Calls can be held at the door with [`pause`](Self::pause) to
/// observe the engine mid-pass.
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    always: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<PendingOperation>>,
    paused: AtomicBool,
    release: Semaphore,
    entered: Notify,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            always: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            release: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Queue replies for the next calls to `endpoint`, in order.
    pub fn script(&self, endpoint: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .extend(replies);
    }

    /// Fail the next `times` calls to `endpoint` with `status`.
    pub fn fail_times(&self, endpoint: &str, status: u16, times: usize) {
        self.script(endpoint, std::iter::repeat(Reply::Status(status)).take(times));
    }

    /// Answer every unscripted call to `endpoint` with `reply`.
    pub fn always(&self, endpoint: &str, reply: Reply) {
        self.always
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), reply);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<PendingOperation> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids of every call so far, in order.
    pub fn call_ids(&self) -> Vec<OperationId> {
        self.calls().into_iter().map(|op| op.id).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Hold subsequent calls until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Let held and future calls through.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.release.add_permits(1024);
    }

    /// Wait until a call is being held.
    pub async fn wait_for_held_call(&self) {
        self.entered.notified().await;
    }

    fn next_reply(&self, endpoint: &str) -> Reply {
        if let Some(reply) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.always
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| Reply::Ok(json!({"ok": true})))
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, op: &PendingOperation) -> Result<Value, ExecutorError> {
        self.calls.lock().unwrap().push(op.clone());

        if self.paused.load(Ordering::SeqCst) {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }

        stockroom_sync::plan(op)?;
        self.next_reply(&op.endpoint).into_result()
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory store whose reads and writes can be made to fail.
pub struct FlakyStore {
    inner: MemoryQueueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::with_limits(QueueLimits::default())
    }

    pub fn with_limits(limits: QueueLimits) -> Self {
        Self {
            inner: MemoryQueueStore::with_limits(limits),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make `list` and `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `add` and `remove` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fault".into()));
        }
        Ok(())
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn add(&self, op: &PendingOperation) -> StoreResult<()> {
        self.check(&self.fail_writes)?;
        self.inner.add(op).await
    }

    async fn get(&self, id: &OperationId) -> StoreResult<Option<PendingOperation>> {
        self.check(&self.fail_reads)?;
        self.inner.get(id).await
    }

    async fn list(&self) -> StoreResult<Vec<PendingOperation>> {
        self.check(&self.fail_reads)?;
        self.inner.list().await
    }

    async fn remove(&self, id: &OperationId) -> StoreResult<bool> {
        self.check(&self.fail_writes)?;
        self.inner.remove(id).await
    }

    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> StoreResult<bool> {
        self.inner.try_acquire_lease(name, holder, ttl).await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()> {
        self.inner.release_lease(name, holder).await
    }
}

/// Manager type used by [`TestHarness`].
pub type HarnessManager = SyncManager<Arc<FlakyStore>, Arc<ScriptedExecutor>>;

/// A manager wired to a [`FlakyStore`], a [`ScriptedExecutor`] and a
/// [`ManualConnectivity`], with every event recorded.
pub struct TestHarness {
    pub manager: Arc<HarnessManager>,
    pub store: Arc<FlakyStore>,
    pub executor: Arc<ScriptedExecutor>,
    pub connectivity: ManualConnectivity,
    events: Arc<Mutex<Vec<SyncEvent>>>,
    _recorder: Subscription,
}

impl TestHarness {
    /// Online harness that does not drain on enqueue, so tests decide when
    /// passes run.
    pub fn new() -> Self {
        Self::with_config(
            SyncConfig {
                sync_on_enqueue: false,
                ..Default::default()
            },
            true,
        )
    }

    pub fn offline() -> Self {
        let harness = Self::new();
        harness.connectivity.set_online(false);
        harness
    }

    pub fn with_config(config: SyncConfig, online: bool) -> Self {
        Self::with_store(FlakyStore::new(), config, online)
    }

    pub fn with_store(store: FlakyStore, config: SyncConfig, online: bool) -> Self {
        let store = Arc::new(store);
        let executor = Arc::new(ScriptedExecutor::new());
        let connectivity = ManualConnectivity::new(online);

        let manager = Arc::new(SyncManager::new(
            Arc::clone(&store),
            Arc::clone(&executor),
            Arc::new(connectivity.clone()),
            config,
        ));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let recorder = manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        Self {
            manager,
            store,
            executor,
            connectivity,
            events,
            _recorder: recorder,
        }
    }

    /// Every event emitted so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of every event emitted so far.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(SyncEvent::name).collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
