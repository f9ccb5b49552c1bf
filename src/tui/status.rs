//! Status panel: per-task run-state summary plus an overall CPU load
//! gauge, grounded on `hud/src/tui/status.rs`'s layout and fed by
//! [`crate::task::Task`]'s counters and [`crate::reader::TraceReader::cpu_load`].

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::{gauge_bar, load_color, CAUTION_AMBER, HUD_CYAN, HUD_GREEN, INFO_DIM};
use crate::task::Task;

pub struct StatusPanel;

impl StatusPanel {
    pub fn render(f: &mut Frame, area: Rect, tasks: &[std::sync::Arc<Task>], load: Option<f64>) {
        let mut lines = Vec::new();

        let (load_text, load_pct) = match load {
            Some(l) => (format!("{:.0}%", l * 100.0), l * 100.0),
            None => ("n/a".to_string(), 0.0),
        };
        lines.push(Line::from(vec![
            Span::styled(" CPU load ", Style::default().fg(INFO_DIM)),
            Span::styled(gauge_bar(load_pct, 16), Style::default().fg(load_color(load_pct))),
            Span::styled(format!(" {load_text}"), Style::default().fg(load_color(load_pct))),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " task   T/D(ms)    prio  jobs  dmiss",
            Style::default().fg(INFO_DIM).add_modifier(Modifier::BOLD),
        )));

        for task in tasks {
            let dmiss = task.deadline_misses();
            let color = if dmiss > 0 { CAUTION_AMBER } else { HUD_GREEN };
            lines.push(Line::from(vec![
                Span::styled(format!(" task{:<2}", task.spec.id), Style::default().fg(HUD_CYAN)),
                Span::raw(format!(
                    "  {:>4}/{:<4}",
                    task.spec.period_ms, task.spec.deadline_ms
                )),
                Span::raw(format!("  {:>3}", task.priority())),
                Span::styled(format!("  {:>4}", task.jobs_completed()), Style::default().fg(HUD_GREEN)),
                Span::styled(format!("  {dmiss:>4}"), Style::default().fg(color)),
            ]));
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Status")
                .border_style(Style::default().fg(HUD_GREEN)),
        );
        f.render_widget(paragraph, area);
    }
}
