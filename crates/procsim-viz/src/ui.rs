use crate::app::{App, Overlay};
use crate::theme::{viz_theme, VizTheme};
use procsim_core::{
    card::{CardTone, CardView, ProcessAction},
    timeline::{reconstruct, AxisLayout, IntervalStyle, Plot, Timeline},
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

/// Columns reserved for `P<id>` labels left of the time axis.
const CHART_LABEL_WIDTH: u16 = 8;
const CHART_RIGHT_MARGIN: u16 = 2;
const CHART_ROW_HEIGHT: u16 = 3;
const EMPTY_CHART_NOTE: &str = "Start at least one process to see the chart.";

pub fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    let size = frame.size();
    let theme = viz_theme();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(size);
    frame.render_widget(render_header(app, theme, size.width), layout[0]);
    frame.render_widget(render_cards(app, theme, layout[1].width), layout[1]);

    match app.overlay {
        Overlay::None => {}
        Overlay::Menu => render_menu_overlay(frame, app, theme),
        Overlay::Help => render_help_overlay(frame, theme),
        Overlay::Chart => render_chart_overlay(frame, app, theme),
    }
}

fn render_header(app: &App, theme: VizTheme, width: u16) -> Paragraph<'static> {
    let inner_width = width.saturating_sub(4) as usize;
    let link = if app.connected {
        "online"
    } else if app.source_done {
        "done"
    } else {
        "offline"
    };
    let limit = if app.gate.is_locked() {
        " (limit reached)"
    } else {
        ""
    };
    let status_line = format!(
        "Source: {}  Link: {link}  Processes: {}/{}{limit}",
        app.config.source_label(),
        app.cache.len(),
        app.gate.max_processes(),
    );
    let note = app.status_note.as_deref();
    let action_text = match note {
        Some(note) => format!("Last Action: {note}"),
        None => "Last Action: ready (a add, S start all, Enter actions, g chart, ? help)".to_string(),
    };
    let note_color = note.map(|note| theme.note_color(note)).unwrap_or(theme.muted);

    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            ellipsize(&status_line, inner_width.max(12)),
            Style::default().fg(theme.text),
        )),
        Line::from(Span::styled(
            ellipsize(&action_text, inner_width.max(12)),
            Style::default().fg(note_color),
        )),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .style(Style::default().bg(theme.bg))
            .title(Span::styled("Simulator", theme.title_style())),
    )
}

fn render_cards(app: &App, theme: VizTheme, width: u16) -> Paragraph<'static> {
    let bar_width = (width.saturating_sub(48) as usize).clamp(6, 30);
    let mut lines: Vec<Line<'static>> = app
        .cache
        .entries()
        .enumerate()
        .map(|(index, entry)| {
            card_line(&CardView::project(entry), index == app.selected, bar_width, theme)
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No processes yet. Press a to add one.",
            Style::default().fg(theme.muted),
        )));
    }

    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .style(Style::default().bg(theme.surface))
                .title(Span::styled("Processes", theme.title_style())),
        )
}

fn card_line(card: &CardView, selected: bool, bar_width: usize, theme: VizTheme) -> Line<'static> {
    let marker = if selected { ">> " } else { "   " };
    let mut id_style = Style::default()
        .fg(theme.tone_border(card.tone))
        .add_modifier(Modifier::BOLD);
    if card.tone == CardTone::Active {
        id_style = id_style.fg(theme.title);
    }
    let mut spans = vec![
        Span::styled(marker, Style::default().fg(theme.accent)),
        Span::styled(format!("P{:<4}", card.id), id_style),
        Span::styled(
            format!("{:<14}", card.state.as_str()),
            Style::default().fg(theme.state_color(card.state)),
        ),
    ];
    spans.extend(progress_bar_spans(card.percent, bar_width, theme));
    spans.push(Span::styled(
        format!(" {:>5.1}%", card.percent),
        Style::default().fg(theme.text),
    ));
    spans.push(Span::styled(
        format!("  last burst {:.0} ms", card.burst_ms),
        Style::default().fg(theme.muted),
    ));
    if selected {
        for span in &mut spans {
            span.style = span.style.add_modifier(Modifier::REVERSED);
        }
    }
    Line::from(spans)
}

fn progress_bar_spans(percent: f64, width: usize, theme: VizTheme) -> Vec<Span<'static>> {
    let width = width.max(6);
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let mut spans = vec![Span::styled("[", Style::default().fg(theme.muted))];
    if filled > 0 {
        spans.push(Span::styled("#".repeat(filled), Style::default().fg(theme.ok)));
    }
    if width > filled {
        spans.push(Span::styled(
            "-".repeat(width - filled),
            Style::default().fg(theme.muted),
        ));
    }
    spans.push(Span::styled("]", Style::default().fg(theme.muted)));
    spans
}

fn render_menu_overlay(frame: &mut ratatui::Frame, app: &App, theme: VizTheme) {
    let Some(card) = app.selected_entry().map(CardView::project) else {
        return;
    };
    let area = centered_rect(40, 40, frame.size());
    let mut lines = vec![Line::from(Span::styled(
        format!("P{}  {}", card.id, card.state.as_str()),
        theme.section_style(),
    ))];
    for action in ProcessAction::ALL {
        let key = match action {
            ProcessAction::Start => 's',
            ProcessAction::Block => 'b',
            ProcessAction::Unblock => 'u',
            ProcessAction::Stop => 'x',
        };
        let style = if card.allows(action) {
            Style::default().fg(theme.text)
        } else {
            Style::default().fg(theme.border)
        };
        lines.push(Line::from(Span::styled(
            format!("  {key}  {}", action.label()),
            style,
        )));
    }
    lines.push(Line::from(Span::styled(
        "  Esc close",
        Style::default().fg(theme.muted),
    )));
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.border))
                    .style(Style::default().bg(theme.surface))
                    .title(Span::styled("Actions", theme.title_style())),
            ),
        area,
    );
}

fn render_help_overlay(frame: &mut ratatui::Frame, theme: VizTheme) {
    let area = centered_rect(70, 70, frame.size());
    let lines = vec![
        Line::from(Span::styled("Processes", theme.section_style())),
        Line::from("  j/k      select process"),
        Line::from("  Enter/m  actions for selected process (s/b/u/x)"),
        Line::from("  a        add process (until the limit is reached)"),
        Line::from("  S        start all"),
        Line::from("  R        reset all (once the limit is reached)"),
        Line::from(""),
        Line::from(Span::styled("Timeline", theme.section_style())),
        Line::from("  g        open/close Gantt chart"),
        Line::from(""),
        Line::from(Span::styled("Session & Exit", theme.section_style())),
        Line::from("  ? or F1  toggle this help"),
        Line::from("  Esc      close overlay"),
        Line::from("  q        quit"),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.border))
                    .style(Style::default().bg(theme.surface))
                    .title(Span::styled("Help", theme.title_style())),
            )
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_chart_overlay(frame: &mut ratatui::Frame, app: &App, theme: VizTheme) {
    let area = centered_rect(92, 86, frame.size());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.surface))
        .title(Span::styled(
            if app.chart_timer_armed() {
                "Timeline (live)"
            } else {
                "Timeline"
            },
            theme.title_style(),
        ));
    let inner = block.inner(area);
    let timeline = reconstruct(&app.chart_snapshots(), app.chart_now, chart_layout(inner.width));
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);
    frame.render_widget(GanttChart::new(&timeline, theme), inner);
}

fn chart_layout(width: u16) -> AxisLayout {
    AxisLayout {
        width: f64::from(width),
        label_width: f64::from(CHART_LABEL_WIDTH),
        right_margin: f64::from(CHART_RIGHT_MARGIN),
    }
}

/// Paints a reconstructed [`Timeline`] into terminal cells. One column per
/// axis unit; each process row is three lines tall.
pub struct GanttChart<'a> {
    timeline: &'a Timeline,
    theme: VizTheme,
}

impl<'a> GanttChart<'a> {
    pub fn new(timeline: &'a Timeline, theme: VizTheme) -> Self {
        Self { timeline, theme }
    }
}

impl Widget for GanttChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        match self.timeline.plot() {
            Some(plot) if area.height >= 3 => paint_plot(plot, area, buf, self.theme),
            Some(_) => {}
            None => {
                let y = area.y + area.height / 2;
                let line = Line::from(Span::styled(
                    EMPTY_CHART_NOTE,
                    Style::default().fg(self.theme.muted),
                ))
                .alignment(Alignment::Center);
                line.render(Rect::new(area.x, y, area.width, 1), buf);
            }
        }
    }
}

fn paint_plot(plot: &Plot, area: Rect, buf: &mut Buffer, theme: VizTheme) {
    let legend_y = area.bottom() - 1;
    let rows_top = area.y + 1;
    let grid_style = Style::default().fg(theme.border);

    for tick in &plot.ticks {
        let Some(x) = column(area, tick.x) else {
            continue;
        };
        for y in rows_top..legend_y {
            buf.get_mut(x, y).set_symbol("┊").set_style(grid_style);
        }
        let label = format!("{:.0}s", tick.offset);
        buf.set_stringn(
            x,
            area.y,
            label,
            usize::from(area.right() - x),
            Style::default().fg(theme.muted),
        );
    }

    for (index, row) in plot.rows.iter().enumerate() {
        let top = rows_top + index as u16 * CHART_ROW_HEIGHT;
        if top + CHART_ROW_HEIGHT > legend_y {
            break;
        }
        buf.set_stringn(
            area.x,
            top + 1,
            format!("P{}", row.process_id),
            usize::from(CHART_LABEL_WIDTH.saturating_sub(1).min(area.width)),
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        );
        for interval in row.intervals.iter().filter(|interval| !interval.is_empty()) {
            let Some((start, end)) = visible_columns(interval.x0, interval.x1, area.width) else {
                continue;
            };
            let style = Style::default().fg(theme.interval_color(interval.style));
            for offset in start..end {
                paint_cell(buf, area.x + offset, top, interval.style, style);
            }
        }
    }

    let legend = Line::from(vec![
        Span::styled("█", Style::default().fg(theme.interval_color(IntervalStyle::Solid))),
        Span::raw(" run  "),
        Span::styled("█", Style::default().fg(theme.interval_color(IntervalStyle::Narrow))),
        Span::raw(" blk  "),
        Span::styled("╌", Style::default().fg(theme.interval_color(IntervalStyle::Dashed))),
        Span::raw(" rdy  "),
        Span::styled(
            format!("span {:.0}s, grid {:.0}s", plot.duration, plot.tick_spacing),
            Style::default().fg(theme.muted),
        ),
    ]);
    legend.render(Rect::new(area.x, legend_y, area.width, 1), buf);
}

fn paint_cell(buf: &mut Buffer, x: u16, top: u16, style: IntervalStyle, color: Style) {
    let cells: &[(u16, &str)] = match style {
        IntervalStyle::Solid => &[(0, "▄"), (1, "█"), (2, "▀")],
        IntervalStyle::Narrow => &[(1, "█")],
        IntervalStyle::Dashed => &[(1, "╌")],
    };
    for (dy, symbol) in cells {
        buf.get_mut(x, top + dy).set_symbol(symbol).set_style(color);
    }
}

/// Clips `[x0, x1)` to `[0, width)` in f64 before converting to columns.
/// A sliver narrower than one column still gets one.
fn visible_columns(x0: f64, x1: f64, width: u16) -> Option<(u16, u16)> {
    let limit = f64::from(width);
    if !x0.is_finite() || !x1.is_finite() {
        return None;
    }
    let start = x0.round().clamp(0.0, limit);
    let end = x1.round().clamp(0.0, limit);
    if start >= limit {
        return None;
    }
    let start = start as u16;
    let end = (end as u16).max(start.saturating_add(1)).min(width);
    Some((start, end))
}

fn column(area: Rect, x: f64) -> Option<u16> {
    if !x.is_finite() || x < 0.0 {
        return None;
    }
    let offset = x.round();
    if offset >= f64::from(area.width) {
        return None;
    }
    Some(area.x + offset as u16)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}

fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = input.chars().take(keep).collect();
    out.push_str("...");
    out
}
