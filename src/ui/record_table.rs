use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use walktest::{
    clock::Clock,
    view::{format_recovery, minute_label, missing_for_minute, record_rows, RecordRow},
    window::{required_metrics, MINUTES},
    MetricKey, Session,
};

use crate::App;

/// Pure presenter for one minute of the record table.
/// Cells a minute does not require are dimmed; required but missing ones are red.
pub fn present_row(row: &RecordRow) -> Row<'static> {
    let required = required_metrics(row.minute);
    let mut cells = vec![Cell::from(row.label.clone())
        .style(Style::default().add_modifier(Modifier::BOLD))];

    for (key, value) in MetricKey::ALL.iter().zip(&row.cells) {
        let missing = value == "--";
        let style = match (required.contains(key), missing) {
            (false, _) => Style::default().add_modifier(Modifier::DIM),
            (true, true) => Style::default().fg(Color::Red),
            (true, false) => Style::default().fg(Color::Green),
        };
        cells.push(Cell::from(value.clone()).style(style));
    }

    Row::new(cells)
}

pub fn render_record_table(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Records
            Constraint::Length(3), // Gaps
            Constraint::Length(3), // Instructions
        ])
        .split(f.area());

    let title = Paragraph::new(format!(
        "Recovery time: {}",
        format_recovery(app.session.recovery_time())
    ))
    .block(Block::default().borders(Borders::ALL).title("Records"))
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let mut header_cells = vec![Cell::from("Minute")];
    header_cells.extend(MetricKey::ALL.iter().map(|key| Cell::from(key.label())));
    let header = Row::new(header_cells).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = record_rows(&app.session).iter().map(present_row).collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Min(6),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL))
        .column_spacing(2);
    f.render_widget(table, chunks[1]);

    let gaps = Paragraph::new(gap_summary(&app.session))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray))
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(gaps, chunks[2]);

    let instructions = Paragraph::new("(b/backspace) back  (x) export  (q) quit")
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(instructions, chunks[3]);
}

/// "3 min: SpO₂, Pulse; 6 min: Distance" for minutes with required values missing
pub fn gap_summary<C: Clock>(session: &Session<C>) -> String {
    let gaps: Vec<String> = MINUTES
        .filter_map(|minute| {
            let missing = missing_for_minute(session, minute);
            if missing.is_empty() {
                return None;
            }
            let labels: Vec<&str> = missing.iter().map(|k| k.label()).collect();
            Some(format!("{}: {}", minute_label(minute), labels.join(", ")))
        })
        .collect();
    if gaps.is_empty() {
        "All required values recorded".to_string()
    } else {
        format!("Missing {}", gaps.join("; "))
    }
}
