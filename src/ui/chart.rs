use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Widget},
};

use crate::history::{symbol_history, FlowHistoryPoint};
use crate::model::performance::{OrderFlowScore, PerformanceTable, SortKey};
use crate::model::symbol::Symbol;

/// Horizontal bars of the active sort metric, one per symbol, centred on zero.
pub struct SortBarChart<'a> {
    table: Option<&'a PerformanceTable>,
    sort_key: SortKey,
}

impl<'a> SortBarChart<'a> {
    pub fn new(table: Option<&'a PerformanceTable>, sort_key: SortKey) -> Self {
        Self { table, sort_key }
    }
}

impl Widget for SortBarChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" {} ", self.sort_key.label()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(table) = self.table else {
            return;
        };
        // 6 cols of label, 1 gap, at least 3 cols per side of the axis.
        if inner.height == 0 || inner.width < 14 {
            return;
        }

        let values: Vec<(String, Option<f64>)> = table
            .sorted_rows(self.sort_key)
            .into_iter()
            .map(|row| (row.symbol.to_string(), table.sort_value(row, self.sort_key)))
            .collect();

        let abs_max = values
            .iter()
            .filter_map(|(_, v)| *v)
            .filter(|v| v.is_finite())
            .map(f64::abs)
            .fold(0.0_f64, f64::max);
        let abs_max = if abs_max < f64::EPSILON { 1.0 } else { abs_max };

        let label_width = 7u16;
        let bar_area = inner.width - label_width;
        let half = (bar_area / 2) as f64;
        let axis_x = inner.x + label_width + bar_area / 2;

        for (i, (symbol, value)) in values.iter().enumerate() {
            let y = inner.y + i as u16;
            if y >= inner.y + inner.height {
                break;
            }
            buf.set_string(inner.x, y, format!("{:<6}", symbol), Style::default().fg(Color::Cyan));
            buf.set_string(axis_x, y, "|", Style::default().fg(Color::DarkGray));

            let Some(v) = value.filter(|v| v.is_finite()) else {
                buf.set_string(axis_x + 1, y, "n/a", Style::default().fg(Color::DarkGray));
                continue;
            };
            let len = ((v.abs() / abs_max) * half).round() as u16;
            if len == 0 {
                continue;
            }
            if v > 0.0 {
                let bar = "#".repeat(len.min(inner.x + inner.width - axis_x - 1) as usize);
                buf.set_string(axis_x + 1, y, bar, Style::default().fg(Color::Green));
            } else {
                let len = len.min(axis_x - (inner.x + label_width));
                buf.set_string(axis_x - len, y, "#".repeat(len as usize), Style::default().fg(Color::Red));
            }
        }
    }
}

/// Daily short- and long-term order flow, either the cross-sector net or one
/// symbol's own scores. Oldest on the left; points are sampled to fit.
pub struct FlowHistoryChart<'a> {
    points: &'a [FlowHistoryPoint],
    symbol: Option<&'a Symbol>,
}

impl<'a> FlowHistoryChart<'a> {
    pub fn new(points: &'a [FlowHistoryPoint]) -> Self {
        Self {
            points,
            symbol: None,
        }
    }

    pub fn symbol(mut self, symbol: Option<&'a Symbol>) -> Self {
        self.symbol = symbol;
        self
    }
}

impl Widget for FlowHistoryChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let series: Vec<OrderFlowScore> = match self.symbol {
            Some(symbol) => symbol_history(self.points, symbol)
                .into_iter()
                .map(|(_, s)| s)
                .collect(),
            None => self.points.iter().map(|p| p.net).collect(),
        };
        let title = match (self.symbol, self.points.first(), self.points.last()) {
            (Some(symbol), Some(first), Some(last)) => {
                format!(" {} order flow {}..{} ", symbol, first.date, last.date)
            }
            (None, Some(first), Some(last)) => {
                format!(" net order flow {}..{} ", first.date, last.date)
            }
            _ => " order flow history ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        if series.is_empty() {
            buf.set_string(inner.x, inner.y, "n/a", Style::default().fg(Color::DarkGray));
            return;
        }
        // 8 cols of y-axis labels on the right.
        if inner.height < 3 || inner.width < 16 {
            return;
        }
        let plot_width = (inner.width - 8) as usize;
        let chart_height = inner.height as usize;

        let abs_max = series
            .iter()
            .flat_map(|s| [s.short_term, s.long_term])
            .filter(|v| v.is_finite())
            .map(f64::abs)
            .fold(0.0_f64, f64::max);
        let abs_max = if abs_max < f64::EPSILON { 1.0 } else { abs_max };
        let row_of = |v: f64| -> u16 {
            let normalized = (v.clamp(-abs_max, abs_max) + abs_max) / (2.0 * abs_max);
            let y_pos = chart_height - 1 - ((normalized * (chart_height - 1) as f64).round() as usize).min(chart_height - 1);
            inner.y + y_pos as u16
        };

        let zero_y = row_of(0.0);
        buf.set_string(
            inner.x,
            zero_y,
            "-".repeat(plot_width),
            Style::default().fg(Color::DarkGray),
        );

        let columns = plot_width.min(series.len());
        for col in 0..columns {
            // Last column always shows the newest point.
            let idx = if columns == 1 {
                series.len() - 1
            } else {
                col * (series.len() - 1) / (columns - 1)
            };
            let score = series[idx];
            let x = inner.x + col as u16;
            if score.short_term.is_finite() {
                buf.set_string(x, row_of(score.short_term), "s", Style::default().fg(Color::Yellow));
            }
            if score.long_term.is_finite() {
                buf.set_string(x, row_of(score.long_term), "l", Style::default().fg(Color::Cyan));
            }
        }

        let label_x = inner.x + plot_width as u16 + 1;
        buf.set_string(label_x, inner.y, format!("{:+.2}", abs_max), Style::default().fg(Color::DarkGray));
        buf.set_string(
            label_x,
            inner.y + inner.height - 1,
            format!("{:+.2}", -abs_max),
            Style::default().fg(Color::DarkGray),
        );
    }
}
