//! Bundled visualizer: a `ratatui` + `crossterm` front-end driven
//! entirely through [`crate::taskset::TaskSet`]'s public surface and
//! [`crate::reader::TraceReader`], never reaching into the tick lock.
//! Grounded on `hud/src/tui.rs`'s setup/teardown and draw-loop shape.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

mod status;
mod theme;
mod timeline;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};

use crate::reader::TraceReader;
use crate::taskset::TaskSet;
use crate::time::Timestamp;
use theme::{HUD_GREEN, INFO_DIM};

const LOAD_WINDOW_MS: i64 = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the live view until the user quits or `taskset` is no longer
/// active. Sets up and tears down the terminal itself.
///
/// # Errors
/// Returns an error if terminal setup, drawing, or input polling fails.
pub fn run(taskset: &TaskSet) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, taskset);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, taskset: &TaskSet) -> Result<()> {
    let t0 = taskset.shared().t0();
    let options = &taskset.shared().options;
    let configured = Rect::new(0, 0, options.gui_w, options.gui_h);
    let mut undersized_warned = false;

    loop {
        let events = taskset.trace_events();
        let reader = TraceReader::new(taskset.shared().trace(), t0);
        let now_ms = Timestamp::now().diff_ms(t0);
        let load = reader.cpu_load(now_ms, LOAD_WINDOW_MS);

        terminal.draw(|f| {
            // The bundled view never grows past the configured `gui_w`x`gui_h`
            // (matching the original's fixed Allegro window size, common.h);
            // a smaller real terminal clips it further.
            let area = f.area().intersection(configured);
            if (area.width < configured.width || area.height < configured.height) && !undersized_warned {
                log::warn!(
                    "terminal ({}x{}) is smaller than the configured {}x{} view, display will be clipped",
                    f.area().width,
                    f.area().height,
                    configured.width,
                    configured.height
                );
                undersized_warned = true;
            }

            let outer = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)])
                .split(area);

            let header = Paragraph::new(Line::from(vec![
                Span::styled("scheduletrace", Style::default().fg(HUD_GREEN).add_modifier(Modifier::BOLD)),
                Span::raw("   t="),
                Span::styled(format!("{now_ms}ms"), Style::default().fg(HUD_GREEN)),
                Span::raw("   events="),
                Span::styled(format!("{}", events.len()), Style::default().fg(INFO_DIM)),
                Span::raw("   [q] quit"),
            ]))
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(header, outer[0]);

            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                .split(outer[1]);

            status::StatusPanel::render(f, cols[0], taskset.tasks(), load);
            timeline::TimelineView::render(f, cols[1], &events, t0);
        })?;

        if event::poll(POLL_INTERVAL)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q' | 'Q') | KeyCode::Esc) {
                    break;
                }
            }
        }

        if !taskset.is_active() {
            break;
        }
    }

    Ok(())
}
