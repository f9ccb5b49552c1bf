//! The task set controller: owns tasks, idle, resources, trace and the
//! tick lock, and drives the UNINIT→...→STOPPED lifecycle. Grounded on
//! `taskset.c`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Options;
use crate::domain::{SystemError, Tick};
use crate::idle::Idle;
use crate::parser::{self, TaskSpec};
use crate::resources::ResourceSet;
use crate::task::Task;
use crate::time::Timestamp;
use crate::trace::{Event, EventKind, Sink, Trace, IDLE_TASK};

/// The state shared between the controller and every task/idle thread:
/// the tick counter and trace (always mutated together, serialized by
/// `tick_lock`), the resource table, the options, and the activation
/// instant `t0`. Tasks hold this behind an `Arc`, mirroring the `task->ts`
/// back-pointer in the original.
pub struct SharedState {
    tick_lock: Mutex<Tick>,
    trace: Trace,
    pub resources: ResourceSet,
    pub options: Arc<Options>,
    t0: OnceLock<Timestamp>,
}

impl SharedState {
    fn new(resources: ResourceSet, options: Arc<Options>, sink: Option<Sink>) -> Self {
        Self {
            tick_lock: Mutex::new(1),
            trace: Trace::new(options.trace_size, sink),
            resources,
            options,
            t0: OnceLock::new(),
        }
    }

    pub fn t0(&self) -> Timestamp {
        *self.t0.get().expect("t0 is set before any task thread runs")
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The heart of the system: `tick_pp` from `task.c`, translated
    /// verbatim. Always called with the caller's own monotonically
    /// tracked `last_tick`; decides whether the calling task's step
    /// extends the pending trace event or starts a new one.
    pub fn tick_pp(&self, task_id: i32, last_tick_cell: &AtomicU64, res_id: u32, kind: EventKind) {
        let mut tick = self.tick_lock.lock().unwrap();
        let last_tick = last_tick_cell.load(Ordering::Relaxed);
        debug_assert!(*tick >= last_tick, "tick went backwards under task {task_id}");

        let pending = self.trace.pending();
        let begin_new = match &pending {
            None => true,
            Some(ev) => last_tick < *tick || (last_tick == *tick && ev.kind != kind),
        };

        if begin_new {
            let time = Timestamp::now();
            self.trace.begin_new(kind, task_id, res_id, *tick + 1, time);
        }

        *tick += 1;
        self.trace.extend_pending();
        last_tick_cell.store(*tick, Ordering::Relaxed);

        if let Some(ev) = self.trace.pending() {
            debug_assert!(ev.count > 0);
            debug_assert!(ev.count == 1 || ev.kind == EventKind::Run);
            debug_assert!(ev.count != 1 || ev.tick == *tick);
            debug_assert_eq!(ev.task_id, task_id);
            debug_assert_eq!(ev.kind, kind);
            debug_assert_eq!(ev.res_id, res_id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninit,
    Initialized,
    Created,
    Active,
    Stopping,
    Stopped,
}

/// Owns every task, the idle task, and the shared engine state; drives
/// the lifecycle state machine described in `spec.md` §4.8.
pub struct TaskSet {
    shared: Arc<SharedState>,
    tasks: Vec<Arc<Task>>,
    idle: Arc<Idle>,
    task_threads: Vec<JoinHandle<()>>,
    idle_thread: Option<JoinHandle<()>>,
    state: State,
}

impl TaskSet {
    /// Parses `source` (the task-definition grammar, §6), builds the
    /// resource table from the parsed sections, and opens the trace sink.
    /// Parse errors are logged and the offending lines skipped, matching
    /// `taskset_init_file`'s tolerant loop.
    pub fn from_source(source: &str, options: Arc<Options>, sink: Option<Sink>) -> Result<Self, SystemError> {
        let (specs, errors) = parser::parse_task_set(source);
        for e in &errors {
            log::warn!("{e}");
        }

        let sections: Vec<(u32, u32)> = specs
            .iter()
            .flat_map(|t| t.sections.iter().map(move |s| (s.resource_id, t.priority.get())))
            .collect();
        let resources = ResourceSet::build(&sections, options.mutex_protocol)?;
        log::info!(
            "taskset required {} resource(s) (excluding dummy R0)",
            resources.len()
        );

        let tasks: Vec<Arc<Task>> = specs.into_iter().map(|spec| Arc::new(Task::new(spec))).collect();
        log::info!("taskset made of {} task(s)", tasks.len());

        let shared = Arc::new(SharedState::new(resources, options, sink));

        Ok(Self {
            shared,
            tasks,
            idle: Arc::new(Idle::new()),
            task_threads: Vec::new(),
            idle_thread: None,
            state: State::Initialized,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn idle(&self) -> &Arc<Idle> {
        &self.idle
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn log_summary(&self) {
        for task in &self.tasks {
            log::info!("{task}");
        }
    }

    /// Spawns one OS thread per task, parked on its activation gate.
    pub fn create(&mut self) {
        for task in &self.tasks {
            let handle = Arc::clone(task).spawn(Arc::clone(&self.shared));
            self.task_threads.push(handle);
        }
        self.state = State::Created;
    }

    /// Records `t0`, seeds the trace's first event as an idle run (so a
    /// reader has something to show before any task's first step —
    /// scenario 3 of §8 depends on this), spawns and starts the idle
    /// thread, then releases every task's activation gate.
    pub fn activate(&mut self) {
        let t0 = Timestamp::now();
        self.shared
            .t0
            .set(t0)
            .expect("activate must only be called once");

        self.shared.trace.begin_new(EventKind::Run, IDLE_TASK, 0, 1, t0);

        let idle_handle = Arc::clone(&self.idle).spawn(Arc::clone(&self.shared));
        self.idle_thread = Some(idle_handle);

        for task in &self.tasks {
            task.gate.release();
        }

        self.state = State::Active;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active)
    }

    /// Requests every task and idle to stop at the top of their next
    /// iteration. Sleeps briefly first so idle's last coalesced RUN event
    /// gets a chance to flush before idle also quits.
    pub fn quit(&mut self) {
        self.state = State::Stopping;
        for task in &self.tasks {
            task.request_quit();
        }
        std::thread::sleep(Duration::from_millis(1));
        self.idle.request_quit();
    }

    /// Joins every task thread, then idle.
    pub fn join(&mut self) {
        for handle in self.task_threads.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.idle_thread.take() {
            let _ = handle.join();
        }
        self.state = State::Stopped;
    }

    pub fn all_done(&self) -> bool {
        self.tasks.iter().all(|t| t.is_done()) && self.idle.is_done()
    }

    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.tasks.iter().map(|t| t.spec.clone()).collect()
    }

    pub fn trace_events(&self) -> Vec<Event> {
        self.shared.trace().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    fn options() -> Arc<Options> {
        Arc::new(Options {
            with_affinity: false,
            idle_rt_sched: false,
            trace_size: 64,
            ..Options::default()
        })
    }

    #[test]
    fn parses_and_builds_resources() {
        let src = "T=100,D=100,pr=10,[(R1,avg=5,dev=0)]\nT=50,D=50,pr=20,[(R1,avg=2,dev=0)]\n";
        let ts = TaskSet::from_source(src, options(), None).unwrap();
        assert_eq!(ts.tasks().len(), 2);
        assert_eq!(ts.shared().resources.ceiling_of(1), Some(20));
    }

    #[test]
    fn single_cpu_bound_task_runs_and_produces_run_events() {
        let src = "T=50,D=50,pr=10,[(R0,avg=2000,dev=0)]\n";
        let mut ts = TaskSet::from_source(src, options(), None).unwrap();
        ts.create();
        ts.activate();
        std::thread::sleep(Duration::from_millis(300));
        ts.quit();
        ts.join();

        assert!(ts.all_done());
        let events = ts.trace_events();
        assert!(events.iter().any(|e| e.task_id == 0 && e.kind == EventKind::Run));
    }

    #[test]
    fn idle_is_visible_between_light_task_activations() {
        let src = "T=200,D=200,pr=10,[(R0,avg=50,dev=0)]\n";
        let mut ts = TaskSet::from_source(src, options(), None).unwrap();
        ts.create();
        ts.activate();
        std::thread::sleep(Duration::from_millis(450));
        ts.quit();
        ts.join();

        let events = ts.trace_events();
        assert!(events.iter().any(Event::is_idle));
    }

    #[test]
    fn clean_shutdown_marks_everyone_done() {
        let src = "T=30,D=30,pr=10,[(R0,avg=100,dev=0)]\nT=70,D=70,pr=15,[(R0,avg=100,dev=0)]\n";
        let mut ts = TaskSet::from_source(src, options(), None).unwrap();
        ts.create();
        ts.activate();
        std::thread::sleep(Duration::from_millis(200));
        ts.quit();
        ts.join();
        assert!(ts.all_done());
    }
}
