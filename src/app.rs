use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::warn;

use crate::bars::{BarPanel, BarPayload};
use crate::chart::ProfitChart;
use crate::config::Config;
use crate::error::Result;
use crate::export::ExportPanel;
use crate::feed::Poller;
use crate::report::write_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Bars,
    Profit,
    Export,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Bars, Tab::Profit, Tab::Export];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Bars => "Bars",
            Tab::Profit => "Profit",
            Tab::Export => "Export",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tab::Bars => 0,
            Tab::Profit => 1,
            Tab::Export => 2,
        }
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

// Main application state
pub struct App {
    pub tab: Tab,
    pub bars: BarPanel,
    pub chart: ProfitChart,
    pub export: ExportPanel,
    bar_feed: Option<Poller<BarPayload>>,
    chart_feed: Option<Poller<Vec<f64>>>,
    pub frame: u64,
    pub last_tick: Instant,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: &Config) -> Result<App> {
        let client = config.http_client()?;
        let bar_feed = Poller::start(client.clone(), config.profit_url.to_string(), config.bar_interval);
        let chart_feed =
            Poller::start(client.clone(), config.profit_url.to_string(), config.chart_interval);
        let export = ExportPanel::new(client, config.export_url.to_string(), config.download_dir.clone());

        let mut app = App::with_export(export);
        app.bar_feed = Some(bar_feed);
        app.chart_feed = Some(chart_feed);
        Ok(app)
    }

    /// App without background polling.
    pub fn with_export(export: ExportPanel) -> App {
        App {
            tab: Tab::Profit,
            bars: BarPanel::default(),
            chart: ProfitChart::default(),
            export,
            bar_feed: None,
            chart_feed: None,
            frame: 0,
            last_tick: Instant::now(),
            should_quit: false,
        }
    }

    pub fn on_tick(&mut self) {
        if let Some(payload) = self.bar_feed.as_mut().and_then(Poller::take_update) {
            self.bars.apply(payload);
        }
        if let Some(samples) = self.chart_feed.as_mut().and_then(Poller::take_update) {
            self.chart.apply(samples);
        }
        self.bars.animate();
        self.export.poll();
        self.frame = self.frame.wrapping_add(1);
    }

    /// Last poll error of either feed, for the status bar.
    pub fn feed_error(&self) -> Option<String> {
        self.chart_feed
            .as_ref()
            .and_then(Poller::last_error)
            .or_else(|| self.bar_feed.as_ref().and_then(Poller::last_error))
    }

    pub fn last_update(&self) -> Option<String> {
        self.chart_feed
            .as_ref()
            .and_then(Poller::updated_at)
            .map(|t| t.format("%H:%M:%S").to_string())
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.export.notice().is_some() {
            self.export.dismiss_notice();
            return;
        }
        if self.tab == Tab::Export && self.export.editing {
            self.edit_filter(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Char('1') => self.tab = Tab::Bars,
            KeyCode::Char('2') => self.tab = Tab::Profit,
            KeyCode::Char('3') => self.tab = Tab::Export,
            code => match self.tab {
                Tab::Bars => self.bars_key(code),
                Tab::Profit => self.profit_key(code),
                Tab::Export => self.export_key(code),
            },
        }
    }

    fn bars_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Left => self.bars.item_nb.decrement(),
            KeyCode::Right => self.bars.item_nb.increment(),
            KeyCode::Down => self.bars.series_nb.decrement(),
            KeyCode::Up => self.bars.series_nb.increment(),
            KeyCode::Char('a') => self.bars.toggle_animation(),
            _ => {}
        }
    }

    fn profit_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('o') => {
                self.chart.view_older();
            }
            KeyCode::Char('n') => {
                self.chart.view_newer();
            }
            _ => {}
        }
    }

    fn export_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('e') if !self.export.is_busy() => self.export.editing = true,
            KeyCode::Char('d') => {
                if let Err(err) = self.export.start_download() {
                    warn!(%err, "download not started");
                }
            }
            KeyCode::Char('c') | KeyCode::Esc => self.export.cancel(),
            KeyCode::Char('p') => {
                match write_report(self.export.logs(), self.export.download_dir()) {
                    Ok(path) => self.export.set_notice(format!("Report saved to {}", path.display())),
                    Err(err) => {
                        warn!(%err, "report failed");
                        self.export.set_notice(format!("Report failed: {err}"));
                    }
                }
            }
            _ => {}
        }
    }

    fn edit_filter(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.export.editing = false,
            KeyCode::Backspace => {
                self.export.input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.export.input.push(c);
            }
            _ => {}
        }
    }
}
