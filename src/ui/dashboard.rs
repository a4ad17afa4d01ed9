use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::indicators::{Bias, TechnicalIndicators};
use crate::model::performance::{PerformanceTable, SortKey};
use crate::model::period::Period;
use crate::model::symbol::{SectorEtf, Symbol};

use super::format::{fmt_cell, fmt_price, fmt_score, fmt_volume, NOT_AVAILABLE, NO_DATA};
use super::StaleInfo;

fn signed_color(value: Option<f64>) -> Color {
    match value {
        Some(v) if v > 0.0 => Color::Green,
        Some(v) if v < 0.0 => Color::Red,
        Some(_) => Color::White,
        None => Color::DarkGray,
    }
}

pub struct PerformancePanel<'a> {
    table: Option<&'a PerformanceTable>,
    watchlist: &'a [SectorEtf],
    periods: &'a [Period],
    sort_key: SortKey,
    scroll: usize,
}

impl<'a> PerformancePanel<'a> {
    pub fn new(
        table: Option<&'a PerformanceTable>,
        watchlist: &'a [SectorEtf],
        periods: &'a [Period],
        sort_key: SortKey,
    ) -> Self {
        Self {
            table,
            watchlist,
            periods,
            sort_key,
            scroll: 0,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    fn sector_of(&self, symbol: &str) -> &str {
        self.watchlist
            .iter()
            .find(|e| e.symbol.as_str() == symbol)
            .map(|e| e.sector.as_str())
            .unwrap_or("")
    }

    fn header(&self) -> Line<'static> {
        let mut text = format!("{:<6} {:<22} {:>9}", "ETF", "Sector", "Last");
        for period in self.periods {
            text.push_str(&format!(" {:>8}", period.label()));
        }
        text.push_str(&format!(" {:>9} {:>6} {:>6}", "Vol", "Short", "Long"));
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
    }
}

impl Widget for PerformancePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.table {
            Some(t) => format!(" Performance as of {} | sort: {} ", t.as_of, self.sort_key.label()),
            None => " Performance ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let mut lines = vec![self.header()];
        let Some(table) = self.table else {
            lines.push(Line::from(Span::styled(
                "Loading sector data...",
                Style::default().fg(Color::DarkGray),
            )));
            Paragraph::new(lines).block(block).render(area, buf);
            return;
        };

        let mut body: Vec<Line> = Vec::with_capacity(table.rows.len() + table.missing.len());
        for row in table.sorted_rows(self.sort_key) {
            let sector = row
                .sector
                .as_deref()
                .unwrap_or_else(|| self.sector_of(row.symbol.as_str()));
            let mut spans = vec![
                Span::styled(
                    format!("{:<6} ", row.symbol),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<22} ", truncate(sector, 22)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>9}", fmt_price(row.latest_close)),
                    Style::default().fg(Color::White),
                ),
            ];
            for period in self.periods {
                let cell = row.changes.get(period);
                spans.push(Span::styled(
                    format!(" {:>8}", fmt_cell(cell)),
                    Style::default().fg(signed_color(row.change_pct(*period))),
                ));
            }
            let score = table.order_flow.get(&row.symbol);
            let short = score.map(|s| s.short_term);
            let long = score.map(|s| s.long_term);
            spans.push(Span::styled(
                format!(" {:>9}", fmt_volume(row.latest_volume)),
                Style::default().fg(Color::DarkGray),
            ));
            spans.push(Span::styled(
                format!(" {:>6}", fmt_score(short)),
                Style::default().fg(signed_color(short)),
            ));
            spans.push(Span::styled(
                format!(" {:>6}", fmt_score(long)),
                Style::default().fg(signed_color(long)),
            ));
            body.push(Line::from(spans));
        }
        for symbol in table.missing.keys() {
            body.push(Line::from(vec![
                Span::styled(
                    format!("{:<6} ", symbol),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<22} ", truncate(self.sector_of(symbol.as_str()), 22)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:>9}", NO_DATA), Style::default().fg(Color::Red)),
            ]));
        }

        let scroll = self.scroll.min(body.len().saturating_sub(1));
        lines.extend(body.into_iter().skip(scroll));
        Paragraph::new(lines).block(block).render(area, buf);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).chain(std::iter::once('~')).collect()
    }
}

pub struct InsightsPanel<'a> {
    insights: &'a [String],
}

impl<'a> InsightsPanel<'a> {
    pub fn new(insights: &'a [String]) -> Self {
        Self { insights }
    }
}

impl Widget for InsightsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = if self.insights.is_empty() {
            vec![Line::from(Span::styled(
                NOT_AVAILABLE,
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            self.insights
                .iter()
                .map(|s| {
                    Line::from(vec![
                        Span::styled("- ", Style::default().fg(Color::DarkGray)),
                        Span::styled(s.as_str(), Style::default().fg(Color::White)),
                    ])
                })
                .collect()
        };

        let block = Block::default()
            .title(" Market Insights ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}

fn bias_color(bias: Bias) -> Color {
    match bias {
        Bias::Bullish => Color::Green,
        Bias::Bearish => Color::Red,
        Bias::Neutral => Color::White,
    }
}

/// Technical readings for the selected symbol.
pub struct IndicatorPanel<'a> {
    symbol: Option<&'a Symbol>,
    indicators: Option<&'a TechnicalIndicators>,
}

impl<'a> IndicatorPanel<'a> {
    pub fn new(symbol: Option<&'a Symbol>, indicators: Option<&'a TechnicalIndicators>) -> Self {
        Self { symbol, indicators }
    }
}

impl Widget for IndicatorPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.symbol {
            Some(symbol) => format!(" {} technicals ", symbol),
            None => " Technicals ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let Some(ind) = self.indicators else {
            Paragraph::new(Line::from(Span::styled(
                NOT_AVAILABLE,
                Style::default().fg(Color::DarkGray),
            )))
            .block(block)
            .render(area, buf);
            return;
        };

        let mut lines: Vec<Line> = ind
            .readings
            .iter()
            .map(|r| {
                let value = r
                    .value
                    .map(|v| format!("{:>8.2}", v))
                    .unwrap_or_else(|| format!("{:>8}", NOT_AVAILABLE));
                Line::from(vec![
                    Span::styled(format!("{:<14}", r.kind.label()), Style::default().fg(Color::Cyan)),
                    Span::styled(value, Style::default().fg(bias_color(r.bias))),
                    Span::styled(format!("  {}", r.interpretation), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect();
        lines.push(Line::from(vec![
            Span::styled(format!("{:<14}", "Overall"), Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("{:>+8.1}", ind.sentiment_score),
                Style::default().fg(bias_color(ind.overall)),
            ),
            Span::styled(
                format!("  {}", ind.overall_label()),
                Style::default()
                    .fg(bias_color(ind.overall))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct LogPanel<'a> {
    messages: &'a [String],
}

impl<'a> LogPanel<'a> {
    pub fn new(messages: &'a [String]) -> Self {
        Self { messages }
    }
}

impl Widget for LogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_height = area.height.saturating_sub(2) as usize;
        let start = self.messages.len().saturating_sub(inner_height);
        let lines: Vec<Line> = self.messages[start..]
            .iter()
            .map(|m| {
                let color = if m.starts_with("[ERR]") {
                    Color::Red
                } else if m.starts_with("[WARN]") {
                    Color::Yellow
                } else {
                    Color::DarkGray
                };
                Line::from(Span::styled(m.as_str(), Style::default().fg(color)))
            })
            .collect();

        let block = Block::default()
            .title(" System Log ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct StatusBar<'a> {
    pub table: Option<&'a PerformanceTable>,
    pub auto_refresh: bool,
    pub interval_secs: u64,
    pub refreshing: bool,
    pub stale: bool,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let auto = if self.auto_refresh {
            Span::styled(
                format!("AUTO {}s", self.interval_secs),
                Style::default().fg(Color::Green),
            )
        } else {
            Span::styled("MANUAL", Style::default().fg(Color::DarkGray))
        };

        let state = if self.refreshing {
            Span::styled(
                " REFRESHING ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else if self.stale {
            Span::styled(
                " STALE ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(" IDLE ", Style::default().fg(Color::Green))
        };

        let updated = self
            .table
            .map(|t| format!("updated {}", t.generated_at.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_else(|| "no data yet".to_string());

        let line = Line::from(vec![
            Span::styled(
                " sector-monitor ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(updated, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            auto,
            Span::styled(" |", Style::default().fg(Color::DarkGray)),
            state,
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct StaleBanner<'a> {
    pub stale: &'a StaleInfo,
    pub has_table: bool,
}

impl Widget for StaleBanner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lead = if self.has_table {
            " STALE DATA: last refresh failed, showing previous results "
        } else {
            " NO DATA: refresh failed "
        };
        let line = Line::from(vec![
            Span::styled(
                lead,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    " {} ({})",
                    self.stale.error,
                    self.stale.at.format("%H:%M:%S UTC")
                ),
                Style::default().fg(Color::Red),
            ),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" [Q]", Style::default().fg(Color::Yellow)),
            Span::styled("uit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[R]", Style::default().fg(Color::Yellow)),
            Span::styled("efresh  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[A]", Style::default().fg(Color::Yellow)),
            Span::styled("uto-refresh  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[S]", Style::default().fg(Color::Yellow)),
            Span::styled("ort  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[I]", Style::default().fg(Color::Yellow)),
            Span::styled("nsights  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[T]", Style::default().fg(Color::Yellow)),
            Span::styled("echnicals  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[H]", Style::default().fg(Color::Yellow)),
            Span::styled("istory  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[J/K]", Style::default().fg(Color::Yellow)),
            Span::styled(" scroll", Style::default().fg(Color::DarkGray)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
