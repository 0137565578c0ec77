pub mod record_table;
pub mod screen;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use walktest::{
    metric::MetricKey,
    view::{format_value, minute_label, MinuteBadge, SessionView},
    window::FINAL_MINUTE,
    Phase,
};

use crate::{App, Overlay, RecoveryField};

const HORIZONTAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);

    match &app.overlay {
        Some(Overlay::Entry { key, input }) => render_entry_dialog(app, *key, input, f),
        Some(Overlay::ConfirmReset) => render_confirm_reset(f),
        None => {}
    }

    render_toasts(app, f);
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::NotStarted => dim(),
        Phase::Running => bold().fg(Color::Green),
        Phase::Paused => bold().fg(Color::Yellow),
        Phase::Completed => bold().fg(Color::Cyan),
    }
}

fn badge_span(badge: &MinuteBadge) -> Span<'static> {
    let label = format!(" {} ", minute_label(badge.minute));
    let style = if badge.active {
        bold().fg(Color::Black).bg(Color::Green)
    } else if badge.completed {
        bold().fg(Color::Green)
    } else if badge.partial {
        Style::default().fg(Color::Yellow)
    } else {
        dim()
    };
    Span::styled(label, style)
}

pub fn render_measurement(app: &App, f: &mut Frame) {
    let view = SessionView::from(&app.session);
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(area);

    let header = Paragraph::new(vec![
        Line::from(Span::styled(view.clock.clone(), bold().fg(Color::White))),
        Line::from(vec![
            Span::styled(view.phase.to_string(), phase_style(view.phase)),
            Span::styled(format!("  ({} preset)", app.preset), dim()),
        ]),
        Line::from(Span::styled(
            view.cue.to_string(),
            Style::default().fg(Color::Yellow),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" 6-minute walk test "),
    );
    f.render_widget(header, chunks[0]);

    let mut badge_spans = Vec::new();
    for badge in &view.badges {
        badge_spans.push(badge_span(badge));
        badge_spans.push(Span::raw(" "));
    }
    let badges = Paragraph::new(Line::from(badge_spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Minutes "));
    f.render_widget(badges, chunks[1]);

    let panel_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(chunks[2]);
    for (i, panel) in view.panels.iter().enumerate() {
        let widget = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(panel.current.clone(), bold())),
            Line::from(Span::styled(panel.status.to_string(), dim())),
        ])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" [{}] {} ", i + 1, panel.key.label())),
        );
        f.render_widget(widget, panel_areas[i]);
    }

    let control_style = if view.control.enabled() {
        bold().fg(Color::Green)
    } else {
        dim()
    };
    let commit_style = if view.commit_enabled { bold() } else { dim() };
    let reset_style = if view.reset_enabled { bold() } else { dim() };
    let controls = Paragraph::new(Line::from(vec![
        Span::styled(format!("(space) {}", view.control), control_style),
        Span::raw("    "),
        Span::styled("(enter) Record", commit_style),
        Span::raw("    "),
        Span::styled("(r) Reset", reset_style),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(controls, chunks[3]);

    let hints = Paragraph::new(Span::styled(
        "(1-4) enter value / (?) help / (q) quit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(hints, chunks[4]);
}

pub fn render_completion(app: &App, f: &mut Frame) {
    let session = &app.session;
    let view = SessionView::from(session);
    let metrics = &session.protocol().metrics;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Min(1),
        ])
        .split(f.area());

    let final_lines: Vec<Line> = MetricKey::ALL
        .iter()
        .map(|key| {
            let value = session
                .recorded(*key, FINAL_MINUTE)
                .map(|v| format_value(v, metrics.get(*key)))
                .unwrap_or_else(|| "--".to_string());
            Line::from(vec![
                Span::styled(format!("{:>10}  ", key.label()), dim()),
                Span::styled(value, bold()),
            ])
        })
        .collect();
    let summary = Paragraph::new(final_lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Test complete: values at 6 min "),
        );
    f.render_widget(summary, chunks[0]);

    let stopwatch_style = if view.recovery_running {
        bold().fg(Color::Green)
    } else {
        bold()
    };
    let stopwatch = Paragraph::new(vec![
        Line::from(Span::styled(view.recovery_clock.clone(), stopwatch_style)),
        Line::from(Span::styled(
            if view.recovery_running {
                "(s) stop"
            } else {
                "(s) start"
            },
            dim(),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Recovery stopwatch "),
    );
    f.render_widget(stopwatch, chunks[1]);

    let field = |label: &str, value: &str, focused: bool| {
        let style = if focused {
            bold().fg(Color::Black).bg(Color::Yellow)
        } else {
            bold()
        };
        vec![
            Span::styled(format!("{label} "), dim()),
            Span::styled(format!("[{value:>2}]"), style),
        ]
    };
    let entry = &app.recovery_entry;
    let mut entry_spans = field(
        "min",
        &entry.minutes,
        entry.focus == RecoveryField::Minutes,
    );
    entry_spans.push(Span::raw("   "));
    entry_spans.extend(field(
        "sec",
        &entry.seconds,
        entry.focus == RecoveryField::Seconds,
    ));
    let saved = walktest::view::format_recovery(view.recovery_time);
    let recovery = Paragraph::new(vec![
        Line::from(entry_spans),
        Line::from(Span::styled(format!("saved: {saved}"), dim())),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Recovery time "),
    );
    f.render_widget(recovery, chunks[2]);

    let hints = Paragraph::new(Span::styled(
        "(tab) switch field / (enter) save / (t) records / (x) export / (r) reset / (q) quit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(hints, chunks[3]);
}

pub fn render_help(app: &App, f: &mut Frame) {
    let rows = [
        ("1-4", "enter SpO₂, pulse, distance, Borg"),
        ("up/down", "step the value in the entry dialog"),
        ("space", "start, stop or resume the timer"),
        ("enter", "record values in the open window"),
        ("r", "reset the measurement"),
        ("s", "recovery stopwatch (after the test)"),
        ("t", "record table (after the test)"),
        ("x", "export records as CSV and JSON"),
        ("q / esc", "quit"),
    ];
    let mut lines: Vec<Line> = rows
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{key:>9}  "), bold().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Recording windows ({} preset)", app.preset),
        bold(),
    )));
    let windows = app
        .session
        .protocol()
        .windows
        .iter()
        .map(|(minute, w)| format!("{minute}: {}-{}s", w.start, w.end))
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(Line::from(Span::styled(windows, dim())));

    let help = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Keys (any key to close) "),
    );
    f.render_widget(help, centered_rect(60, 60, f.area()));
}

fn render_entry_dialog(app: &App, key: MetricKey, input: &str, f: &mut Frame) {
    let metric = app.session.protocol().metrics.get(key);
    let area = centered_rect(40, 30, f.area());
    let lines = vec![
        Line::from(Span::styled(
            format!("{input}{}", metric.unit),
            bold().fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{} to {}, step {}",
                format_value(metric.min, metric),
                format_value(metric.max, metric),
                metric.step
            ),
            dim(),
        )),
        Line::from(Span::styled("(enter) set / (esc) cancel", dim())),
    ];
    let dialog = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", key.label())),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn render_confirm_reset(f: &mut Frame) {
    let area = centered_rect(40, 20, f.area());
    let dialog = Paragraph::new(vec![
        Line::from("Discard all values and restart?"),
        Line::from(""),
        Line::from(Span::styled("(y) reset / any other key cancels", dim())),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Reset "),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn render_toasts(app: &App, f: &mut Frame) {
    let Some(toast) = app.toasts.last() else {
        return;
    };
    let area = f.area();
    if area.height < 3 {
        return;
    }
    let rect = Rect::new(area.x, area.bottom() - 3, area.width, 3);
    let widget = Paragraph::new(toast.message.as_str())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    f.render_widget(Clear, rect);
    f.render_widget(widget, rect);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}
