use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};
use warden_core::clock::Clock;
use warden_core::filter::TaskFilter;
use warden_core::model::{Task, TaskKind, TaskStatus};
use warden_core::traits::TaskStore;
use warden_core::WardenError;

use crate::handle::TaskHandle;

/// The work a submitted task actually performs. Runs on a worker thread
/// with a `TaskHandle` for heartbeats and cancellation checks; its `Ok`
/// value becomes the task's final comment.
pub type Job = Box<dyn FnOnce(&TaskHandle) -> Result<String, WardenError> + Send>;

struct QueueItem {
    task_id: i64,
    job: Job,
}

/// Bounded in-process task queue with an N-thread worker pool. One
/// `TaskManager` owns the whole queue; `TaskKind` only determines FIFO
/// grouping, not separate queues, since a single shared FIFO already
/// preserves per-kind order as a subsequence of global order.
pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    tx: Sender<QueueItem>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl TaskManager {
    /// Spawn `worker_count` threads draining a queue bounded at
    /// `capacity` in-flight tasks (enqueued + running), plus a reaper
    /// thread that sweeps stale `RUNNING` rows every
    /// `reap_interval_secs`, marking anything whose heartbeat is older
    /// than `heartbeat_timeout_secs` as `DROPPED`. Drops every
    /// `RUNNING`/`ENQUEUED` row left over from a prior process lifetime
    /// before starting any worker.
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        worker_count: usize,
        capacity: usize,
        heartbeat_timeout_secs: i64,
        reap_interval_secs: u64,
    ) -> Result<Self, WardenError> {
        store.reap_all_in_flight()?;

        let (tx, rx) = unbounded::<QueueItem>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let rx: Receiver<QueueItem> = rx.clone();
            let store = store.clone();
            let clock = clock.clone();
            let in_flight = in_flight.clone();
            let handle = std::thread::Builder::new()
                .name(format!("warden-task-worker-{idx}"))
                .spawn(move || worker_loop(rx, store, clock, in_flight))
                .map_err(|e| WardenError::general(format!("failed to spawn task worker thread: {e}")))?;
            workers.push(handle);
        }

        let reaper = {
            let store = store.clone();
            let shutdown = shutdown.clone();
            let clock = clock.clone();
            std::thread::Builder::new()
                .name("warden-task-reaper".into())
                .spawn(move || reaper_loop(store, clock, shutdown, heartbeat_timeout_secs, reap_interval_secs))
                .map_err(|e| WardenError::general(format!("failed to spawn task reaper thread: {e}")))?
        };

        Ok(Self {
            store,
            tx,
            in_flight,
            capacity,
            workers,
            reaper: Some(reaper),
            shutdown,
        })
    }

    /// Enqueue `job` under `kind`. Rejected with `QueueFull` (no task row
    /// is persisted) once `capacity` tasks are already enqueued or
    /// running.
    pub fn submit(&self, kind: TaskKind, product_id: Option<i64>, summary: &str, username: &str, job: Job) -> Result<Task, WardenError> {
        if !self.try_reserve() {
            return Err(WardenError::QueueFull);
        }

        let task = match self.store.allocate_task(kind, product_id, summary, username) {
            Ok(t) => t,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };
        if let Err(e) = self.store.set_status(task.id, TaskStatus::Enqueued) {
            self.release();
            return Err(e);
        }

        if self.tx.send(QueueItem { task_id: task.id, job }).is_err() {
            self.release();
            return Err(WardenError::general("task worker pool is shut down"));
        }

        self.store.get_task(task.id)?.ok_or_else(|| WardenError::database("task vanished after enqueue"))
    }

    /// `get_task_info`: on first read of a terminal task, marks it
    /// consumed so it becomes eligible for later garbage collection.
    pub fn get_task_info(&self, task_id: i64) -> Result<Option<Task>, WardenError> {
        let Some(mut task) = self.store.get_task(task_id)? else {
            return Ok(None);
        };
        if task.status.is_terminal() && !task.consumed_flag_set {
            self.store.set_consumed_flag(task_id)?;
            task.consumed_flag_set = true;
        }
        Ok(Some(task))
    }

    /// Admin-only listing. Never marks anything consumed.
    pub fn get_tasks(&self, filter: &TaskFilter, limit: u32, offset: u32) -> Result<Vec<Task>, WardenError> {
        self.store.list_tasks(filter, limit, offset)
    }

    /// Sets the cancel flag. Returns whether this call was the one that
    /// set it (`false` for an already-cancelled or already-terminal
    /// task).
    pub fn cancel_task(&self, task_id: i64) -> Result<bool, WardenError> {
        let task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| WardenError::general(format!("no task {task_id}")))?;
        if task.cancel_flag_set || task.status.is_terminal() {
            return Ok(false);
        }
        self.store.set_cancel_flag(task_id)?;
        Ok(true)
    }

    fn try_reserve(&self) -> bool {
        loop {
            let cur = self.in_flight.load(Ordering::SeqCst);
            if cur >= self.capacity {
                return false;
            }
            if self
                .in_flight
                .compare_exchange(cur, cur + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(std::mem::replace(&mut self.tx, unbounded().0));
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(reaper) = self.reaper.take() {
            let _ = reaper.join();
        }
    }
}

fn worker_loop(rx: Receiver<QueueItem>, store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, in_flight: Arc<AtomicUsize>) {
    while let Ok(item) = rx.recv() {
        run_one(&store, &clock, item.task_id, item.job);
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("task worker thread exiting");
}

fn run_one(store: &Arc<dyn TaskStore>, clock: &Arc<dyn Clock>, task_id: i64, job: Job) {
    if let Err(e) = store.set_status(task_id, TaskStatus::Running) {
        warn!(error = %e, task_id, "failed to mark task running, dropping");
        return;
    }
    let _ = store.heartbeat(task_id, clock.now());

    let handle = TaskHandle {
        store: store.clone(),
        clock: clock.clone(),
        task_id,
    };
    let result = job(&handle);
    let cancelled = handle.is_cancelled();

    let outcome = match result {
        Ok(summary) => {
            let _ = store.set_comment(task_id, &summary);
            TaskStatus::Completed
        }
        Err(e) if cancelled => {
            let _ = store.set_comment(task_id, &e.to_string());
            TaskStatus::Cancelled
        }
        Err(e) => {
            let _ = store.set_comment(task_id, &e.to_string());
            TaskStatus::Failed
        }
    };
    if let Err(e) = store.set_status(task_id, outcome) {
        warn!(error = %e, task_id, "failed to record final task status");
    }
}

fn reaper_loop(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, shutdown: Arc<AtomicBool>, heartbeat_timeout_secs: i64, reap_interval_secs: u64) {
    let interval = Duration::from_secs(reap_interval_secs.max(1));
    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let stale_before = clock.now() - heartbeat_timeout_secs;
        match store.reap_dropped_tasks(stale_before) {
            Ok(0) => {}
            Ok(n) => debug!(count = n, "reaper dropped stale tasks"),
            Err(e) => warn!(error = %e, "reaper sweep failed"),
        }
    }
    debug!("task reaper thread exiting");
}
