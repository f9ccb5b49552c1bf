//! The visualizer-facing reader: time-indexed lookup into the trace and
//! CPU-load estimation, grounded on `gui/trace.c`'s `evt_preceding` and
//! `get_load`. Never touches the tick lock — it only calls
//! [`crate::trace::Trace::snapshot`], which reads without locking.

use crate::bsearch::bsearch_floor;
use crate::parser::TaskSpec;
use crate::time::Timestamp;
use crate::trace::{Event, Trace};

/// A read-only view over one snapshot of the trace, time-indexed relative
/// to `t0` (the taskset's activation instant).
pub struct TraceReader<'a> {
    trace: &'a Trace,
    t0: Timestamp,
}

impl<'a> TraceReader<'a> {
    pub fn new(trace: &'a Trace, t0: Timestamp) -> Self {
        Self { trace, t0 }
    }

    fn events_ms(&self, events: &[Event]) -> Vec<i64> {
        events.iter().map(|e| e.time.diff_ms(self.t0)).collect()
    }

    /// The index of the last committed (or pending) event whose time is
    /// `<= t0 + time_ms`, or `0` if the trace is empty or every event is
    /// later than the query. Mirrors `evt_preceding`'s binary search,
    /// generalized via [`bsearch_floor`] instead of `bsearch_left`.
    pub fn evt_preceding(&self, time_ms: i64) -> usize {
        let events = self.trace.snapshot();
        if events.is_empty() {
            return 0;
        }
        let times = self.events_ms(&events);
        bsearch_floor(&times, &time_ms, |a, b| a.cmp(b))
    }

    /// CPU load over the trailing `window_ms` ending at `time_ms`:
    /// `1 - idle_time / window`, where idle time is summed from any
    /// stretch in `[time_ms - window_ms, time_ms]` during which the idle
    /// task (`task_id == -1`) was the one running. `None` if there isn't
    /// enough trace yet to cover the window.
    pub fn cpu_load(&self, time_ms: i64, window_ms: i64) -> Option<f64> {
        let events = self.trace.snapshot();
        if events.len() <= 1 || window_ms <= 0 {
            return None;
        }
        let start_time = time_ms - window_ms;
        if start_time < 0 {
            return None;
        }
        let times = self.events_ms(&events);

        let start_idx = bsearch_floor(&times, &start_time, |a, b| a.cmp(b));
        let mut total_idle = 0i64;
        let mut prev: Option<(&Event, i64)> = None;

        for (evt, &evt_time) in events[start_idx..].iter().zip(&times[start_idx..]) {
            if let Some((prev_evt, prev_time)) = prev {
                if prev_evt.is_idle() {
                    let lo = prev_time.max(start_time);
                    let hi = evt_time.min(time_ms);
                    if hi > lo {
                        total_idle += hi - lo;
                    }
                }
            }
            if evt_time > time_ms {
                break;
            }
            prev = Some((evt, evt_time));
        }

        if let Some((last_evt, last_time)) = prev {
            if last_evt.is_idle() && last_time < time_ms {
                total_idle += time_ms - last_time.max(start_time);
            }
        }

        let total_idle = total_idle.min(window_ms);
        Some(1.0 - total_idle as f64 / window_ms as f64)
    }

    /// Periodic activation instants of `task` within `[from_ms, to_ms]`,
    /// computed from its period/phase rather than read from the trace —
    /// the trace only records what actually ran. Grounded on `disp_at_dt`.
    pub fn activations_in(&self, task: &TaskSpec, from_ms: i64, to_ms: i64) -> Vec<i64> {
        periodic_instants(task.phase_ms as i64, task.period_ms as i64, from_ms, to_ms)
    }

    /// Deadline instants of `task` within `[from_ms, to_ms]`.
    pub fn deadlines_in(&self, task: &TaskSpec, from_ms: i64, to_ms: i64) -> Vec<i64> {
        let offset = task.phase_ms as i64 + task.deadline_ms as i64 - task.period_ms as i64;
        periodic_instants(offset, task.period_ms as i64, from_ms, to_ms)
    }
}

fn periodic_instants(phase: i64, period: i64, from_ms: i64, to_ms: i64) -> Vec<i64> {
    if period <= 0 {
        return Vec::new();
    }
    let mut t = if phase >= from_ms {
        phase
    } else {
        phase + period * ((from_ms - phase + period - 1) / period)
    };
    let mut out = Vec::new();
    while t <= to_ms {
        if t >= 0 {
            out.push(t);
        }
        t += period;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::EventKind;

    fn t(ms: i64) -> Timestamp {
        Timestamp { sec: ms / 1000, nsec: (ms % 1000) * 1_000_000 }
    }

    fn build_trace(times_ms: &[i64]) -> Trace {
        let trace = Trace::new(16, None);
        for (i, &ms) in times_ms.iter().enumerate() {
            trace.begin_new(EventKind::Run, 0, 0, i as u64 + 1, t(ms));
            trace.extend_pending();
        }
        trace
    }

    #[test]
    fn evt_preceding_matches_reference_values() {
        let trace = build_trace(&[100, 200, 300, 400, 500]);
        let reader = TraceReader::new(&trace, t(0));
        assert_eq!(reader.evt_preceding(50), 0);
        assert_eq!(reader.evt_preceding(100), 0);
        assert_eq!(reader.evt_preceding(250), 1);
        assert_eq!(reader.evt_preceding(500), 4);
        assert_eq!(reader.evt_preceding(1_000_000_000), 4);
    }

    #[test]
    fn evt_preceding_on_empty_trace_is_zero() {
        let trace = Trace::new(4, None);
        let reader = TraceReader::new(&trace, t(0));
        assert_eq!(reader.evt_preceding(100), 0);
    }

    #[test]
    fn activations_respect_phase_and_period() {
        let spec = TaskSpec {
            id: 0,
            period_ms: 100,
            deadline_ms: 100,
            priority: crate::domain::Priority::new(10).unwrap(),
            phase_ms: 20,
            sections: vec![],
        };
        let reader_times = periodic_instants(20, 100, 0, 250);
        assert_eq!(reader_times, vec![20, 120, 220]);
        let _ = spec;
    }

    #[test]
    fn cpu_load_is_one_when_no_idle_in_window() {
        let trace = Trace::new(16, None);
        trace.begin_new(EventKind::Run, 0, 0, 1, t(0));
        trace.extend_pending();
        trace.begin_new(EventKind::Run, 0, 0, 2, t(200));
        trace.extend_pending();
        let reader = TraceReader::new(&trace, t(0));
        let load = reader.cpu_load(200, 200).unwrap();
        assert!((load - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_load_accounts_for_idle_stretch() {
        let trace = Trace::new(16, None);
        trace.begin_new(EventKind::Run, -1, 0, 1, t(0)); // idle for [0,100)
        trace.extend_pending();
        trace.begin_new(EventKind::Run, 0, 0, 2, t(100)); // task runs [100,200)
        trace.extend_pending();
        trace.begin_new(EventKind::Run, -1, 0, 3, t(200)); // idle again, pending
        trace.extend_pending();
        let reader = TraceReader::new(&trace, t(0));
        let load = reader.cpu_load(200, 200).unwrap();
        assert!((load - 0.5).abs() < 1e-9, "load was {load}");
    }
}
