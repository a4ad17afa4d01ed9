pub mod chart;
pub mod dashboard;
pub mod format;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::event::AppEvent;
use crate::model::performance::{PerformanceTable, SortKey};
use crate::model::period::Period;
use crate::model::symbol::{SectorEtf, Symbol};

use chart::{FlowHistoryChart, SortBarChart};
use dashboard::{
    IndicatorPanel, InsightsPanel, KeybindBar, LogPanel, PerformancePanel, StaleBanner, StatusBar,
};

const DEFAULT_MAX_LOG_MESSAGES: usize = 200;

/// What the order-flow history panel plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryView {
    Hidden,
    Net,
    Selected,
}

impl HistoryView {
    pub fn next(self) -> Self {
        match self {
            HistoryView::Hidden => HistoryView::Net,
            HistoryView::Net => HistoryView::Selected,
            HistoryView::Selected => HistoryView::Hidden,
        }
    }
}

/// Why the table on screen is not from the latest refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleInfo {
    pub error: String,
    pub at: DateTime<Utc>,
}

pub struct AppState {
    pub watchlist: Vec<SectorEtf>,
    pub periods: Vec<Period>,
    pub table: Option<Arc<PerformanceTable>>,
    pub stale: Option<StaleInfo>,
    pub sort_key: SortKey,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    pub refreshing: bool,
    pub show_insights: bool,
    pub show_indicators: bool,
    pub history_view: HistoryView,
    pub scroll: usize,
    pub log_messages: Vec<String>,
    pub max_log_messages: usize,
}

impl AppState {
    pub fn new(
        watchlist: Vec<SectorEtf>,
        periods: Vec<Period>,
        sort_key: SortKey,
        auto_refresh: bool,
        refresh_interval_secs: u64,
    ) -> Self {
        Self {
            watchlist,
            periods,
            table: None,
            stale: None,
            sort_key,
            auto_refresh,
            refresh_interval_secs,
            refreshing: false,
            show_insights: true,
            show_indicators: false,
            history_view: HistoryView::Hidden,
            scroll: 0,
            log_messages: Vec::new(),
            max_log_messages: DEFAULT_MAX_LOG_MESSAGES,
        }
    }

    pub fn with_max_log_messages(mut self, max: usize) -> Self {
        self.max_log_messages = max.max(1);
        self
    }

    pub fn push_log(&mut self, msg: String) {
        self.log_messages.push(msg);
        if self.log_messages.len() > self.max_log_messages {
            let excess = self.log_messages.len() - self.max_log_messages;
            self.log_messages.drain(..excess);
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }

    pub fn cycle_sort(&mut self) {
        self.sort_key = self.sort_key.next(&self.periods);
        self.scroll = 0;
    }

    pub fn cycle_history(&mut self) {
        self.history_view = self.history_view.next();
    }

    /// Top visible row of the table in the current sort order.
    pub fn selected_symbol(&self) -> Option<&Symbol> {
        let table = self.table.as_deref()?;
        table
            .sorted_rows(self.sort_key)
            .get(self.scroll)
            .map(|row| &row.symbol)
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let rows = self
            .table
            .as_ref()
            .map(|t| t.rows.len() + t.missing.len())
            .unwrap_or(0);
        self.scroll = (self.scroll + 1).min(rows.saturating_sub(1));
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::RefreshStarted { trigger, .. } => {
                self.refreshing = true;
                self.push_log(format!("Refreshing ({})", trigger));
            }
            AppEvent::RefreshCompleted(table) => {
                self.refreshing = false;
                self.stale = None;
                for (symbol, err) in &table.missing {
                    self.push_log(format!("[WARN] {}: {}", symbol, err));
                }
                self.push_log(format!(
                    "Loaded {} symbols as of {} ({} missing)",
                    table.rows.len(),
                    table.as_of,
                    table.missing.len()
                ));
                self.table = Some(table);
            }
            AppEvent::RefreshFailed { error, at } => {
                self.refreshing = false;
                self.push_log(format!("[ERR] {}", error));
                self.stale = Some(StaleInfo { error, at });
            }
            AppEvent::AutoRefreshChanged(enabled) => {
                self.auto_refresh = enabled;
                self.push_log(format!(
                    "Auto-refresh {}",
                    if enabled { "enabled" } else { "disabled" }
                ));
            }
            AppEvent::LogMessage(msg) => {
                self.push_log(msg);
            }
            AppEvent::Error(msg) => {
                self.push_log(format!("[ERR] {}", msg));
            }
        }
    }
}

pub fn render(frame: &mut Frame, state: &AppState) {
    let table = state.table.as_deref();
    let insights_height = if state.show_insights { 7 } else { 0 };
    let show_history = state.history_view != HistoryView::Hidden;
    let detail_height = if state.show_indicators || show_history { 10 } else { 0 };
    let stale_height = if state.is_stale() { 1 } else { 0 };

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),               // status bar
            Constraint::Length(stale_height),    // stale banner
            Constraint::Min(8),                  // table + chart
            Constraint::Length(insights_height), // insights
            Constraint::Length(detail_height),   // flow history + technicals
            Constraint::Length(5),               // system log
            Constraint::Length(1),               // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            table,
            auto_refresh: state.auto_refresh,
            interval_secs: state.refresh_interval_secs,
            refreshing: state.refreshing,
            stale: state.is_stale(),
        },
        outer[0],
    );

    if let Some(stale) = &state.stale {
        frame.render_widget(
            StaleBanner {
                stale,
                has_table: table.is_some(),
            },
            outer[1],
        );
    }

    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(60), Constraint::Length(34)])
        .split(outer[2]);

    frame.render_widget(
        PerformancePanel::new(table, &state.watchlist, &state.periods, state.sort_key)
            .scroll(state.scroll),
        main_area[0],
    );
    frame.render_widget(SortBarChart::new(table, state.sort_key), main_area[1]);

    if state.show_insights {
        let insights: &[String] = table.map(|t| t.insights.as_slice()).unwrap_or(&[]);
        frame.render_widget(InsightsPanel::new(insights), outer[3]);
    }

    if detail_height > 0 {
        let selected = state.selected_symbol();
        let constraints = match (show_history, state.show_indicators) {
            (true, true) => [Constraint::Min(30), Constraint::Length(66)],
            (true, false) => [Constraint::Min(30), Constraint::Length(0)],
            _ => [Constraint::Length(0), Constraint::Min(30)],
        };
        let detail = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(outer[4]);
        if show_history {
            let points = table.map(|t| t.flow_history.as_slice()).unwrap_or(&[]);
            let focus = match state.history_view {
                HistoryView::Selected => selected,
                _ => None,
            };
            frame.render_widget(FlowHistoryChart::new(points).symbol(focus), detail[0]);
        }
        if state.show_indicators {
            let indicators = selected.and_then(|s| table.and_then(|t| t.indicators.get(s)));
            frame.render_widget(IndicatorPanel::new(selected, indicators), detail[1]);
        }
    }

    frame.render_widget(LogPanel::new(&state.log_messages), outer[5]);
    frame.render_widget(KeybindBar, outer[6]);
}
