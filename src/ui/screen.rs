use ratatui::Frame;

use crate::{
    ui::{record_table::render_record_table, render_completion, render_help, render_measurement},
    App, AppState,
};

/// A UI Screen boundary: renders one top-level view of the app
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Live measurement: clock, minute badges, metric panels
pub struct MeasurementScreen;

impl Screen for MeasurementScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_measurement(app, f);
    }
}

/// Final values plus the recovery stopwatch and entry
pub struct CompletionScreen;

impl Screen for CompletionScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_completion(app, f);
    }
}

pub struct RecordsScreen;

impl Screen for RecordsScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_record_table(app, f);
    }
}

pub struct HelpScreen;

impl Screen for HelpScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_help(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Measurement => Box::new(MeasurementScreen),
        AppState::Completion => Box::new(CompletionScreen),
        AppState::Records => Box::new(RecordsScreen),
        AppState::Help => Box::new(HelpScreen),
    }
}
