use std::{io, time::{Duration, Instant}};

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine},
        Bar, BarChart, BarGroup, Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table,
        Tabs, Wrap,
    },
    Frame, Terminal,
};
use tracing::info;

use crate::app::{App, Tab};
use crate::chart::{ProfitChart, Projection, ValueRange};
use crate::config::Config;
use crate::constants::{CHART_PADDING, TICK_RATE_MS};
use crate::error::Result;
use crate::export::DownloadStatus;
use crate::report::{row_cells, HEADERS};
use crate::util::{format_money, spinner};

pub fn run(config: &Config) -> Result<()> {
    let app = App::new(config)?;

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!("dashboard started");
    let res = run_app_loop(&mut terminal, app);

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!("dashboard stopped");

    res.map_err(Into::into)
}

fn run_app_loop<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(TICK_RATE_MS);

    loop {
        terminal.draw(|f| draw(f, &app))?;

        // Handle input
        let timeout = tick_rate.checked_sub(app.last_tick.elapsed()).unwrap_or_else(|| Duration::from_secs(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.on_key(key);
            }
        }
        if app.should_quit {
            return Ok(());
        }
        if app.last_tick.elapsed() >= tick_rate {
            app.on_tick();
            app.last_tick = Instant::now();
        }
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    // ============= whole screen layout ============
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Active panel
            Constraint::Length(1), // Status bar
        ])
        .split(f.size());

    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|t| Line::from(format!(" {} {} ", t.index() + 1, t.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Profit Dashboard ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, main_chunks[0]);

    match app.tab {
        Tab::Bars => draw_bars(f, app, main_chunks[1]),
        Tab::Profit => draw_profit(f, &app.chart, main_chunks[1]),
        Tab::Export => draw_export(f, app, main_chunks[1]),
    }

    draw_status(f, app, main_chunks[2]);
}

// ============= Bars ============
fn draw_bars(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(5)])
        .split(area);

    let shown = app.bars.shown();
    let items = app.bars.item_nb.value as u16;
    let series = shown.len().max(1) as u16;
    let inner_width = chunks[0].width.saturating_sub(2);
    let bar_width = (inner_width / (series * (items + 1))).max(1);
    let palette = [Color::Cyan, Color::Magenta, Color::Green, Color::Yellow, Color::Blue];

    let mut chart = BarChart::default()
        .block(
            Block::default()
                .title(" Bar Animation ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .bar_width(bar_width)
        .bar_gap(0)
        .group_gap(bar_width);
    for (i, s) in shown.iter().enumerate() {
        let color = palette[i % palette.len()];
        let bars: Vec<Bar> = s
            .values
            .iter()
            .map(|v| {
                Bar::default()
                    .value(v.max(0.0).round() as u64)
                    .text_value(format!("{v:.0}"))
                    .style(Style::default().fg(color))
            })
            .collect();
        chart = chart.data(BarGroup::default().label(Line::from(s.label.clone())).bars(&bars));
    }
    f.render_widget(chart, chunks[0]);

    let check = if app.bars.skip_animation { "[x]" } else { "[ ]" };
    let controls = vec![
        Line::from(vec![
            Span::styled("Number of items:  ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:>2}", app.bars.item_nb.value), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  ({}-{}, ←/→)", app.bars.item_nb.min, app.bars.item_nb.max)),
        ]),
        Line::from(vec![
            Span::styled("Number of series: ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:>2}", app.bars.series_nb.value), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  ({}-{}, ↓/↑)", app.bars.series_nb.min, app.bars.series_nb.max)),
        ]),
        Line::from(format!("{check} Skip Animation (a)")),
    ];
    f.render_widget(
        Paragraph::new(controls).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        chunks[1],
    );
}

// ============= Profit ============
fn draw_profit(f: &mut Frame, chart: &ProfitChart, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(6), Constraint::Length(1)])
        .split(area);

    let totals = chart.totals();
    let profit_color = if totals.profit > 0.0 { Color::Green } else { Color::Gray };
    let loss_color = if totals.loss > 0.0 { Color::Red } else { Color::Gray };
    let stats = Line::from(vec![
        Span::styled(
            format!(" Total Profit: {} ", format_money(totals.profit)),
            Style::default().fg(profit_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            format!(" Total Loss: {} ", format_money(totals.loss)),
            Style::default().fg(loss_color).add_modifier(Modifier::BOLD),
        ),
    ]);
    f.render_widget(Paragraph::new(stats), chunks[0]);

    let block = Block::default()
        .title(" Trading Index ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = block.inner(chunks[1]);
    // Braille cells are 2x4 dots
    let width = f64::from(inner.width) * 2.0;
    let height = f64::from(inner.height) * 4.0;
    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| paint_chart(ctx, chart, width, height));
    f.render_widget(canvas, chunks[1]);

    let enabled = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let disabled = Style::default().fg(Color::DarkGray);
    let window = chart.window();
    let controls = Line::from(vec![
        Span::styled(
            " [o] View Older Data ",
            if chart.can_view_older() { enabled } else { disabled },
        ),
        Span::raw("  "),
        Span::styled(
            " [n] View Newer Data ",
            if chart.can_view_newer() { enabled } else { disabled },
        ),
        Span::styled(
            format!("  offset {} of {} samples", window.offset(), chart.history_len()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            chart.baseline().map(|b| format!("  baseline {b:.2}")).unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(Paragraph::new(controls), chunks[2]);
}

fn paint_chart(ctx: &mut Context, chart: &ProfitChart, width: f64, height: f64) {
    let data = chart.display();
    let range = chart.range();
    // the grid only depends on the surface, so it is drawn even without data
    let p = Projection {
        width,
        height,
        padding: CHART_PADDING,
        range: range.unwrap_or(ValueRange { min: 0.0, max: 1.0 }),
        count: data.len(),
    };
    let (left, right) = (p.padding, width - p.padding);

    for y in p.grid() {
        ctx.draw(&CanvasLine { x1: left, y1: y, x2: right, y2: y, color: Color::DarkGray });
    }
    ctx.layer();

    let Some(range) = range else {
        return;
    };

    let points: Vec<(f64, f64)> = data.iter().enumerate().map(|(i, &v)| (p.x(i), p.y(v))).collect();
    for w in points.windows(2) {
        ctx.draw(&CanvasLine { x1: w[0].0, y1: w[0].1, x2: w[1].0, y2: w[1].1, color: Color::Green });
    }

    if let Some((index, value)) = chart.current() {
        let (cx, cy) = (p.x(index), p.y(value));
        // dashed 5 on / 5 off
        let mut x = left;
        while x < right {
            let end = (x + 5.0).min(right);
            ctx.draw(&CanvasLine { x1: x, y1: cy, x2: end, y2: cy, color: Color::LightRed });
            x += 10.0;
        }
        ctx.draw(&CanvasLine { x1: cx, y1: p.padding, x2: cx, y2: height - p.padding, color: Color::LightRed });

        let label = format!("Current Value: {value:.2}");
        let label_x = (cx - label.len() as f64 * 2.0 - 2.0).max(0.0);
        ctx.print(label_x, (cy + 2.0).min(height), Span::styled(label, Style::default().fg(Color::LightRed)));
    }

    ctx.print(0.0, height - p.padding, Span::styled(format!("{:.2}", range.max), Style::default().fg(Color::Gray)));
    ctx.print(0.0, p.padding, Span::styled(format!("{:.2}", range.min), Style::default().fg(Color::Gray)));
}

// ============= Export ============
fn draw_export(f: &mut Frame, app: &App, area: Rect) {
    let export = &app.export;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Length(1), Constraint::Min(5)])
        .split(area);

    let input_style = if export.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let placeholder = export.input.is_empty() && !export.editing;
    let text = if placeholder {
        Line::from(Span::styled("Enter JSON Body", Style::default().fg(Color::DarkGray)))
    } else if export.editing {
        Line::from(format!("{}_", export.input))
    } else {
        Line::from(export.input.clone())
    };
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(" JSON Body (e to edit, Enter/Esc to finish) ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(input_style),
        ),
        chunks[0],
    );

    let actions = Line::from(vec![
        Span::styled(" [d] Download CSV ", Style::default().bg(Color::Blue).fg(Color::White)),
        Span::raw("  "),
        Span::styled(" [p] Download Report as PDF ", Style::default().bg(Color::Blue).fg(Color::White)),
        Span::styled(
            match export.logs().iter().rev().find_map(|e| e.file.as_ref()) {
                Some(file) => format!("  last saved: {}", file.display()),
                None => format!("  -> {}", export.download_dir().display()),
            },
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(Paragraph::new(actions), chunks[1]);

    let header_cells = HEADERS
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).style(Style::default().bg(Color::Rgb(40, 40, 40))).height(1);
    let rows = export.logs().iter().rev().map(|entry| {
        let status_color = match entry.status {
            DownloadStatus::Success => Color::Green,
            DownloadStatus::Failed => Color::Red,
        };
        let cells = row_cells(entry);
        Row::new(
            cells
                .into_iter()
                .enumerate()
                .map(|(i, c)| if i == 0 { Cell::from(c).style(Style::default().fg(status_color)) } else { Cell::from(c) }),
        )
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(" Download Logs ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(table, chunks[2]);

    if let Some(elapsed) = export.elapsed_label() {
        let popup = centered(area, 30, 5);
        let body = vec![
            Line::from(format!("{}  Downloading", spinner(app.frame))),
            Line::from(Span::styled(elapsed, Style::default().add_modifier(Modifier::BOLD))),
            Line::from(Span::styled("[c] Cancel", Style::default().fg(Color::Red))),
        ];
        f.render_widget(Clear, popup);
        f.render_widget(
            Paragraph::new(body)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded)),
            popup,
        );
    }

    if let Some(notice) = export.notice() {
        let popup = centered(area, 50, 5);
        f.render_widget(Clear, popup);
        f.render_widget(
            Paragraph::new(vec![Line::from(notice.to_string()), Line::from(""), Line::from("press any key")])
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(Style::default().fg(Color::Yellow)),
                ),
            popup,
        );
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

// ============ Bottom Status Bar ============
fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" {} ", app.tab.title().to_uppercase()),
        Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD),
    )];
    match (app.feed_error(), app.last_update()) {
        (Some(err), _) => spans.push(Span::styled(format!(" feed error: {err} "), Style::default().fg(Color::Red))),
        (None, Some(at)) => spans.push(Span::styled(format!(" updated @{at} "), Style::default().fg(Color::DarkGray))),
        (None, None) => spans.push(Span::styled(" waiting for data ", Style::default().fg(Color::DarkGray))),
    }
    spans.push(Span::raw(" | Tab/1-3 switch | Press 'q' to quit"));
    f.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(20, 20, 20))), area);
}
