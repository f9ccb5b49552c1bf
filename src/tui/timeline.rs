//! Timeline view: the tail of the trace, one row per event, colored by
//! resource. Grounded on `hud/src/tui/timeline.rs`'s per-row layout and
//! `gui/trace.c`'s `disp_trace` (the original's scrolling event log).

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::{resource_color, HUD_GREEN, INFO_DIM};
use crate::time::Timestamp;
use crate::trace::{Event, IDLE_TASK};

pub struct TimelineView;

impl TimelineView {
    pub fn render(f: &mut Frame, area: Rect, events: &[Event], t0: Timestamp) {
        let rows = area.height.saturating_sub(2) as usize;
        let tail = if events.len() > rows {
            &events[events.len() - rows..]
        } else {
            events
        };

        let mut lines = vec![Line::from(Span::styled(
            "  t(ms)   task   kind        res  x",
            Style::default().fg(INFO_DIM).add_modifier(Modifier::BOLD),
        ))];

        for ev in tail {
            let task_label = if ev.task_id == IDLE_TASK {
                "idle".to_string()
            } else {
                format!("task{}", ev.task_id)
            };
            lines.push(Line::from(vec![
                Span::raw(format!("  {:>6}", ev.time.diff_ms(t0))),
                Span::styled(format!("  {task_label:<6}"), Style::default().fg(HUD_GREEN)),
                Span::raw(format!(" {:<11}", ev.kind.name())),
                Span::styled(format!(" R{:<3}", ev.res_id), Style::default().fg(resource_color(ev.res_id))),
                Span::raw(format!(" x{}", ev.count)),
            ]));
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Timeline")
                .border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(paragraph, area);
    }
}
