//! The bounded, append-only trace log and its formatted sink.
//!
//! The log is written exclusively by the producer side (always serialized
//! externally by `TaskSet`'s tick lock) and read concurrently by the
//! visualizer without taking that lock. Every field of every slot is
//! therefore an atomic: for committed slots this is stronger than
//! strictly necessary (the producer never touches them again once `len`
//! advances), but it is what lets the *pending* slot — the one still
//! being filled in — be peeked at safely from the reader side without
//! any `unsafe`. The producer publishes `valid` last with `Release`
//! ordering; the reader loads it first with `Acquire` and re-checks a
//! second field (`tick`) afterwards, discarding the snapshot if it
//! changed mid-read (the slot was being torn down and rebuilt under it).

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::Tick;
use crate::time::Timestamp;

pub const DEFAULT_TRACE_SIZE: usize = 10_000;

/// Marks the idle task in trace events (`task_id == IDLE_TASK`).
pub const IDLE_TASK: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Activation,
    Deadline,
    Start,
    Completion,
    Acquire,
    Release,
    Run,
}

impl EventKind {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EventKind::Activation,
            1 => EventKind::Deadline,
            2 => EventKind::Start,
            3 => EventKind::Completion,
            4 => EventKind::Acquire,
            5 => EventKind::Release,
            _ => EventKind::Run,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            EventKind::Activation => 0,
            EventKind::Deadline => 1,
            EventKind::Start => 2,
            EventKind::Completion => 3,
            EventKind::Acquire => 4,
            EventKind::Release => 5,
            EventKind::Run => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Activation => "ACTIVATION",
            EventKind::Deadline => "DEADLINE",
            EventKind::Start => "START",
            EventKind::Completion => "COMPLETION",
            EventKind::Acquire => "ACQUIRE",
            EventKind::Release => "RELEASE",
            EventKind::Run => "RUN",
        }
    }
}

/// An immutable snapshot of one slot, taken by either the producer (after
/// a `begin`) or the reader (tolerating torn pending slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub task_id: i32,
    pub res_id: u32,
    pub count: u32,
    pub tick: Tick,
    pub time: Timestamp,
}

impl Event {
    pub fn is_idle(&self) -> bool {
        self.task_id == IDLE_TASK
    }
}

/// One slot in the trace array: a struct-of-atomics so it can be
/// published by the producer and peeked at by the reader without a lock.
#[derive(Debug)]
struct EventSlot {
    valid: AtomicBool,
    kind: AtomicU8,
    task_id: AtomicI32,
    res_id: AtomicU32,
    count: AtomicU32,
    tick: AtomicU64,
    time_sec: AtomicI64,
    time_nsec: AtomicI64,
}

use std::sync::atomic::AtomicU8;

impl EventSlot {
    fn empty() -> Self {
        Self {
            valid: AtomicBool::new(false),
            kind: AtomicU8::new(0),
            task_id: AtomicI32::new(0),
            res_id: AtomicU32::new(0),
            count: AtomicU32::new(0),
            tick: AtomicU64::new(0),
            time_sec: AtomicI64::new(0),
            time_nsec: AtomicI64::new(0),
        }
    }

    /// Producer-only: start a fresh event in this slot. `count` begins at
    /// zero; the caller bumps it right after via [`EventSlot::bump`].
    fn begin(&self, kind: EventKind, task_id: i32, res_id: u32, tick: Tick, time: Timestamp) {
        self.valid.store(false, Ordering::Relaxed);
        self.kind.store(kind.as_u8(), Ordering::Relaxed);
        self.task_id.store(task_id, Ordering::Relaxed);
        self.res_id.store(res_id, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.tick.store(tick, Ordering::Relaxed);
        self.time_sec.store(time.sec, Ordering::Relaxed);
        self.time_nsec.store(time.nsec, Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
    }

    /// Producer-only: extend the coalesced run by one more step. The
    /// slot's `tick` field is left as the tick of the *first* step (set
    /// by `begin`), matching the post-invariant that only a freshly
    /// begun event (`count == 1`) has `tick == taskset.tick`.
    fn bump(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Producer-only, exact (no tearing possible: caller is the sole writer).
    fn snapshot_exact(&self) -> Event {
        Event {
            kind: EventKind::from_u8(self.kind.load(Ordering::Relaxed)),
            task_id: self.task_id.load(Ordering::Relaxed),
            res_id: self.res_id.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
            tick: self.tick.load(Ordering::Relaxed),
            time: Timestamp {
                sec: self.time_sec.load(Ordering::Relaxed),
                nsec: self.time_nsec.load(Ordering::Relaxed),
            },
        }
    }

    /// Reader-side: returns `None` if this slot has never been begun yet.
    /// Every other field is read as a plain atomic load, which is always
    /// well-defined; no slot is ever reused once begun (the trace never
    /// wraps — it halts when full), so `valid` only ever flips false→true
    /// once and a single `Acquire` load of it is enough to know whether
    /// the rest of the fields belong to a real, fully-published event.
    /// The only thing a reader can see mid-flight is `count` still
    /// growing on an already-valid RUN event, which is harmless: any
    /// value it observes was a real count at some point.
    fn snapshot_racy(&self) -> Option<Event> {
        if !self.valid.load(Ordering::Acquire) {
            return None;
        }
        Some(self.snapshot_exact())
    }
}

/// A sink that formats and writes each committed event to a stream,
/// matching `trace.c`'s `trace_evt_print` format exactly.
pub struct Sink {
    writer: Box<dyn Write + Send>,
    flush_each: bool,
    sync: Option<Mutex<()>>,
}

impl Sink {
    pub fn new(writer: Box<dyn Write + Send>, flush_each: bool, log_sync: bool) -> Self {
        Self {
            writer,
            flush_each,
            sync: log_sync.then(|| Mutex::new(())),
        }
    }

    pub fn format(ev: &Event) -> String {
        format!(
            "TRACE: [{}][tick={}] {} task={} R{} (x{})",
            ev.time,
            ev.tick,
            ev.kind.name(),
            ev.task_id,
            ev.res_id,
            ev.count
        )
    }

    fn emit(&mut self, ev: &Event) {
        let _guard = self.sync.as_ref().map(|m| m.lock().unwrap());
        let line = Self::format(ev);
        let _ = writeln!(self.writer, "{line}");
        if self.flush_each {
            let _ = self.writer.flush();
        }
        log::debug!("{line}");
    }
}

/// The bounded event log itself.
pub struct Trace {
    events: Box<[EventSlot]>,
    capacity: usize,
    len: AtomicUsize,
    full_warned: AtomicBool,
    sink: Mutex<Option<Sink>>,
}

impl Trace {
    pub fn new(capacity: usize, sink: Option<Sink>) -> Self {
        let events = (0..capacity.max(1)).map(|_| EventSlot::empty()).collect();
        Self {
            events,
            capacity: capacity.max(1),
            len: AtomicUsize::new(0),
            full_warned: AtomicBool::new(false),
            sink: Mutex::new(sink),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Producer-only: does a pending event currently exist?
    pub fn pending(&self) -> Option<Event> {
        let len = self.len.load(Ordering::Relaxed);
        if len >= self.capacity {
            return None;
        }
        let slot = &self.events[len];
        slot.valid.load(Ordering::Relaxed).then(|| slot.snapshot_exact())
    }

    /// Producer-only: extend the pending event by one coalesced step.
    /// No-op once the trace is full (mirrors [`Trace::pending`]'s guard) —
    /// there is no slot left to extend.
    pub fn extend_pending(&self) {
        let len = self.len.load(Ordering::Relaxed);
        if len >= self.capacity {
            return;
        }
        self.events[len].bump();
    }

    /// Producer-only: commit the pending event (emit it to the sink and
    /// advance `len`), then start a fresh one in the freed slot. Returns
    /// `false` if the trace was already full — tracing halts for good at
    /// that point, matching `trace_next_add`'s one-shot "trace full"
    /// behavior.
    pub fn begin_new(&self, kind: EventKind, task_id: i32, res_id: u32, tick: Tick, time: Timestamp) -> bool {
        let len = self.len.load(Ordering::Relaxed);
        if len >= self.capacity {
            if !self.full_warned.swap(true, Ordering::Relaxed) {
                log::warn!("trace is full ({} events), further events are dropped", self.capacity);
            }
            return false;
        }

        if self.events[len].valid.load(Ordering::Relaxed) {
            let committed = self.events[len].snapshot_exact();
            if let Some(sink) = self.sink.lock().unwrap().as_mut() {
                sink.emit(&committed);
            }
            let new_len = len + 1;
            if new_len >= self.capacity {
                self.len.store(new_len, Ordering::Release);
                if !self.full_warned.swap(true, Ordering::Relaxed) {
                    log::warn!("trace is full ({} events), further events are dropped", self.capacity);
                }
                return false;
            }
            self.len.store(new_len, Ordering::Release);
            self.events[new_len].begin(kind, task_id, res_id, tick, time);
        } else {
            self.events[len].begin(kind, task_id, res_id, tick, time);
        }
        true
    }

    /// Reader-side: a snapshot of all committed events plus, if present
    /// and not mid-write, the currently pending one.
    pub fn snapshot(&self) -> Vec<Event> {
        let len = self.len.load(Ordering::Acquire);
        let mut out = Vec::with_capacity(len + 1);
        for slot in &self.events[..len] {
            if let Some(ev) = slot.snapshot_racy() {
                out.push(ev);
            }
        }
        if len < self.capacity {
            if let Some(ev) = self.events[len].snapshot_racy() {
                out.push(ev);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(sec: i64) -> Timestamp {
        Timestamp { sec, nsec: 0 }
    }

    #[test]
    fn begin_then_bump_produces_one_event_with_growing_count() {
        let trace = Trace::new(4, None);
        assert!(trace.begin_new(EventKind::Run, 0, 0, 1, t(0)));
        trace.extend_pending();
        trace.extend_pending();
        let pending = trace.pending().unwrap();
        assert_eq!(pending.count, 2);
        assert_eq!(pending.kind, EventKind::Run);
    }

    #[test]
    fn begin_new_commits_previous_pending() {
        let trace = Trace::new(4, None);
        trace.begin_new(EventKind::Acquire, 0, 1, 1, t(0));
        trace.begin_new(EventKind::Run, 0, 1, 2, t(1));
        assert_eq!(trace.len(), 1);
        let committed = trace.snapshot();
        assert_eq!(committed[0].kind, EventKind::Acquire);
    }

    #[test]
    fn halts_when_full() {
        let trace = Trace::new(2, None);
        assert!(trace.begin_new(EventKind::Run, 0, 0, 1, t(0)));
        assert!(trace.begin_new(EventKind::Run, 1, 0, 2, t(1)));
        // third begin_new needs slot index 2, which is out of capacity
        assert!(!trace.begin_new(EventKind::Run, 0, 0, 3, t(2)));
    }

    #[test]
    fn sink_format_matches_wire_format() {
        let ev = Event {
            kind: EventKind::Run,
            task_id: 2,
            res_id: 1,
            count: 5,
            tick: 42,
            time: Timestamp { sec: 7, nsec: 123 },
        };
        assert_eq!(Sink::format(&ev), "TRACE: [7.000000123][tick=42] RUN task=2 R1 (x5)");
    }

    #[test]
    fn idle_task_id_constant() {
        let ev = Event {
            kind: EventKind::Run,
            task_id: IDLE_TASK,
            res_id: 0,
            count: 1,
            tick: 1,
            time: t(0),
        };
        assert!(ev.is_idle());
    }
}
