//! The idle task: lowest-priority, always-runnable work that marks CPU
//! idleness in the trace. Grounded on `idle.c`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::IDLE_TASK_PRIORITY;
use crate::sched::{apply_affinity, apply_scheduling, set_thread_name};
use crate::taskset::SharedState;
use crate::time::sleep_for;
use crate::trace::{EventKind, IDLE_TASK};

pub struct Idle {
    pub last_tick: AtomicU64,
    pub quit: AtomicBool,
    pub done: AtomicBool,
}

impl Idle {
    pub fn new() -> Self {
        Self {
            last_tick: AtomicU64::new(0),
            quit: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Relaxed)
    }

    pub fn run(&self, shared: &SharedState) {
        set_thread_name("idle");

        while !self.quit.load(Ordering::Relaxed) {
            shared.tick_pp(IDLE_TASK, &self.last_tick, 0, EventKind::Run);

            if shared.options.idle_yield {
                // SAFETY: `sched_yield` has no preconditions.
                #[allow(unsafe_code)]
                unsafe {
                    libc::sched_yield();
                }
            }
            if shared.options.idle_sleep {
                sleep_for(Duration::from_nanos(1));
            }
        }

        self.done.store(true, Ordering::Relaxed);
    }

    pub fn spawn(self: std::sync::Arc<Self>, shared: std::sync::Arc<SharedState>) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("idle".to_string())
            .spawn(move || {
                if shared.options.with_affinity {
                    if let Err(e) = apply_affinity() {
                        log::warn!("idle: {e}");
                    }
                }
                if shared.options.idle_rt_sched {
                    if let Err(e) = apply_scheduling(IDLE_TASK_PRIORITY) {
                        log::warn!("idle: {e}");
                    }
                }
                self.run(&shared);
            })
            .expect("failed to spawn idle thread")
    }
}

impl Default for Idle {
    fn default() -> Self {
        Self::new()
    }
}
