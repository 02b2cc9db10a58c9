use super::app::App;
use super::surface::TerminalSurface;
use crate::timeline::ticks;
use crate::tree::rows::format_duration;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header line
            Constraint::Length(1), // Divider
            Constraint::Min(0),    // Timeline
            Constraint::Length(1), // Time axis
            Constraint::Length(1), // Search bar or divider
            Constraint::Length(1), // Footer line
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_divider(f, chunks[1]);
    draw_timeline(f, app, chunks[2]);
    draw_axis(f, app, chunks[3]);

    if app.search_state.active {
        draw_search_bar(f, app, chunks[4]);
    } else {
        draw_divider(f, chunks[4]);
    }
    draw_footer(f, app, chunks[5]);

    if app.tooltip.is_some() {
        draw_tooltip(f, app, chunks[2]);
    }

    // Draw help modal on top if active
    if app.show_help {
        draw_help(f);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let file_name = app
        .file_path
        .as_ref()
        .and_then(|p| std::path::Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("trace");

    let summary = &app.summary;
    let mut header_text = format!(
        "tracetree-tui: {} | Nodes: {} | Depth: {} | Duration: {} | DML: {} | SOQL: {} | Thrown: {} | Zoom: {:.1}x",
        file_name,
        summary.total_nodes,
        summary.max_depth,
        format_duration(summary.duration),
        summary.dml_count,
        summary.soql_count,
        summary.thrown_count,
        app.zoom_factor(),
    );
    if summary.issue_count > 0 {
        header_text.push_str(&format!(" | Issues: {}", summary.issue_count));
    }

    let header = Paragraph::new(header_text).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    f.render_widget(header, area);
}

fn draw_divider(f: &mut Frame, area: Rect) {
    let divider = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray));

    f.render_widget(divider, area);
}

fn draw_timeline(f: &mut Frame, app: &mut App, area: Rect) {
    app.update_timeline_area(area);

    // The terminal redraws every cell each frame, so a frame drawn for a
    // non-timeline change still needs the timeline repainted
    if !app.session.is_redraw_pending() {
        app.session.request_redraw();
    }
    let mut surface = TerminalSurface::new(f.buffer_mut(), area);
    app.session.render(&mut surface);
}

fn draw_axis(f: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;
    let mut line: Vec<char> = vec![' '; width];

    for tick in ticks(app.session.viewport(), app.session.config().tick_gap) {
        let col = tick.x.floor();
        if col < 0.0 || col as usize >= width {
            continue;
        }
        let col = col as usize;
        line[col] = if tick.major { '┃' } else { '│' };

        // Labels only where they fit without overwriting another tick
        let label: Vec<char> = tick.label.chars().collect();
        let end = col + 1 + label.len();
        if end < width && line[col + 1..=end].iter().all(|c| *c == ' ') {
            line[col + 1..end].copy_from_slice(&label);
        }
    }

    let axis = Paragraph::new(line.into_iter().collect::<String>())
        .style(Style::default().fg(Color::Gray));
    f.render_widget(axis, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut footer_text = match app.status_line() {
        Some(status) => status,
        None => String::from(
            "←→/hl: Pan | ↑↓/jk: Depth | +/-: Zoom | 0: Reset | /: Search | q: Quit | ?: Help",
        ),
    };

    if app.skipped_lines > 0 {
        footer_text.push_str(&format!(" | Skipped lines: {}", app.skipped_lines));
    }

    let footer = Paragraph::new(footer_text).style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, area);
}

fn draw_search_bar(f: &mut Frame, app: &App, area: Rect) {
    let search = &app.search_state;
    let match_info = if search.total_matches == 0 {
        if search.query.is_empty() {
            String::new()
        } else {
            "No matches".to_string()
        }
    } else {
        format!(
            "Match {}/{}",
            app.session.find().current_index(),
            search.total_matches
        )
    };
    let case = if search.match_case { " [Aa]" } else { "" };

    let text = if match_info.is_empty() {
        format!(
            "Search: {}█{}  Enter:accept Esc:cancel Tab:case ^N:next ^P:prev",
            search.query, case
        )
    } else {
        format!(
            "Search: {}█{}  [{}]  Enter:accept Esc:cancel Tab:case ^N:next ^P:prev",
            search.query, case, match_info
        )
    };

    let paragraph = Paragraph::new(text).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    f.render_widget(paragraph, area);
}

fn draw_tooltip(f: &mut Frame, app: &App, timeline: Rect) {
    let Some(tooltip) = &app.tooltip else {
        return;
    };

    let content_width = tooltip
        .lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);
    let width = (content_width as u16 + 2).min(timeline.width);
    let height = (tooltip.lines.len() as u16 + 2).min(timeline.height);
    if width < 3 || height < 3 {
        return;
    }

    // Below-right of the pointer, flipped when it would leave the timeline
    let anchor_x = timeline.x + tooltip.x.max(0.0) as u16;
    let anchor_y = timeline.y + tooltip.y.max(0.0) as u16;
    let x = if anchor_x + 1 + width <= timeline.x + timeline.width {
        anchor_x + 1
    } else {
        (timeline.x + timeline.width).saturating_sub(width)
    };
    let y = if anchor_y + 1 + height <= timeline.y + timeline.height {
        anchor_y + 1
    } else {
        anchor_y.saturating_sub(height).max(timeline.y)
    };
    let area = Rect::new(x, y, width, height);

    let lines: Vec<Line> = tooltip
        .lines
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let style = if i == 0 {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(truncate_line(text, width as usize - 2), style))
        })
        .collect();

    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn draw_help(f: &mut Frame) {
    let help_text = vec![
        Line::from(Span::styled(
            "tracetree-tui Help",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Navigation:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  ←/h →/l     Pan left / right"),
        Line::from("  ↑/k ↓/j     Show deeper / shallower calls"),
        Line::from("  +/=         Zoom in"),
        Line::from("  -           Zoom out"),
        Line::from("  0/Home      Fit the whole trace"),
        Line::from(""),
        Line::from(Span::styled(
            "Mouse:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  Wheel       Zoom at pointer"),
        Line::from("  Shift+Wheel Pan"),
        Line::from("  Drag        Pan"),
        Line::from("  Hover       Show call details"),
        Line::from("  Click       Select call or issue"),
        Line::from(""),
        Line::from(Span::styled(
            "Search:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  /           Start search"),
        Line::from("  n           Next match"),
        Line::from("  N           Previous match"),
        Line::from("  Tab         Toggle match case (while searching)"),
        Line::from("  Enter       Accept search"),
        Line::from("  Esc         Clear search"),
        Line::from(""),
        Line::from(Span::styled(
            "Other:",
            Style::default().add_modifier(Modifier::UNDERLINED),
        )),
        Line::from("  q/Q         Quit"),
        Line::from("  ?           Toggle this help"),
        Line::from("  Ctrl+C      Force quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press ? or Esc to close help",
            Style::default().fg(Color::Yellow),
        )),
    ];

    let help = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true });

    let area = centered_rect(60, 80, f.area());
    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

/// Progress screen shown while the trace loads
pub fn draw_loading(f: &mut Frame, file_name: &str, lines_read: usize) {
    let text = vec![
        Line::from(Span::styled(
            format!("Loading {}", file_name),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("{} lines read", lines_read)),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or q to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let area = centered_rect(50, 30, f.area());
    let loading = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    f.render_widget(loading, area);
}

fn truncate_line(s: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    // Count actual character width (not bytes)
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= width {
        s.to_string()
    } else {
        let truncate_at = width.saturating_sub(3);
        let truncated: String = chars.iter().take(truncate_at).collect();
        format!("{}...", truncated)
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::parser::{EventKind, LogEvent};
    use crate::timeline::TraceSession;
    use crate::tree::build_tree;
    use crate::tree::rows::TraceSummary;
    use ratatui::{Terminal, backend::TestBackend};
    use std::sync::Arc;

    fn app() -> App {
        let tree = build_tree([
            LogEvent::new("METHOD_ENTRY", EventKind::Entry, 0)
                .with_text("Outer.run()")
                .closing("METHOD_EXIT"),
            LogEvent::new("METHOD_EXIT", EventKind::Exit, 1_000_000),
        ]);
        let summary = TraceSummary::from_tree(&tree);
        let session = TraceSession::new(Arc::new(tree), TimelineConfig::default()).unwrap();
        App::new(session, summary, Some("/tmp/apex.log".into()), 2)
    }

    fn row(terminal: &Terminal<TestBackend>, y: u16) -> String {
        let buf = terminal.backend().buffer();
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn test_draw_layout() {
        let mut terminal = Terminal::new(TestBackend::new(120, 10)).unwrap();
        let mut app = app();

        terminal.draw(|f| draw(f, &mut app)).unwrap();

        assert!(row(&terminal, 0).starts_with("tracetree-tui: apex.log | Nodes: 1"));
        assert_eq!(app.timeline_area, Rect::new(0, 2, 120, 5));
        // The single call spans the whole width on the bottom timeline row
        assert!(row(&terminal, 6).contains("Outer.run()"));
        assert!(row(&terminal, 9).contains("Skipped lines: 2"));
        assert!(!app.session.is_redraw_pending());
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("short", 10), "short");
        assert_eq!(truncate_line("a longer line", 8), "a lon...");
        assert_eq!(truncate_line("anything", 0), "");
    }
}
