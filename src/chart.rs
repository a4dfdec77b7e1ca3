//! Windowed profit chart model.
//!
//! The chart keeps the full polled history, shows `history[offset..]` and
//! measures profit and loss of that slice against the first sample ever seen.

use crate::constants::{GRID_LINES, INITIAL_WINDOW_OFFSET, WINDOW_STEP};

/// Offset into the history marking the first rendered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    offset: usize,
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self { offset: INITIAL_WINDOW_OFFSET }
    }
}

impl ViewWindow {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn can_view_older(&self, len: usize) -> bool {
        self.offset + WINDOW_STEP < len
    }

    pub fn can_view_newer(&self) -> bool {
        self.offset > WINDOW_STEP
    }

    pub fn view_older(&mut self, len: usize) -> bool {
        if !self.can_view_older(len) {
            return false;
        }
        self.offset += WINDOW_STEP;
        true
    }

    pub fn view_newer(&mut self) -> bool {
        if !self.can_view_newer() {
            return false;
        }
        self.offset -= WINDOW_STEP;
        true
    }

    pub fn visible<'a>(&self, data: &'a [f64]) -> &'a [f64] {
        data.get(self.offset..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn of(samples: &[f64]) -> Option<Self> {
        let first = *samples.first()?;
        Some(samples.iter().fold(Self { min: first, max: first }, |r, &v| Self {
            min: r.min.min(v),
            max: r.max.max(v),
        }))
    }

    /// Height of the range, never zero.
    pub fn span(&self) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            1.0
        } else {
            span
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfitLoss {
    pub profit: f64,
    pub loss: f64,
}

pub fn profit_and_loss(samples: &[f64], baseline: f64) -> ProfitLoss {
    samples.iter().fold(ProfitLoss::default(), |mut acc, &v| {
        if v >= baseline {
            acc.profit += v - baseline;
        } else {
            acc.loss += baseline - v;
        }
        acc
    })
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Linear mapping from (index, value) to plot coordinates with the origin in
/// the bottom-left corner of a `width` x `height` surface.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub range: ValueRange,
    pub count: usize,
}

impl Projection {
    pub fn y_scale(&self) -> f64 {
        (self.height - 2.0 * self.padding) / self.range.span()
    }

    pub fn x_scale(&self) -> f64 {
        let steps = self.count.saturating_sub(1).max(1) as f64;
        (self.width - 2.0 * self.padding) / steps
    }

    pub fn x(&self, index: usize) -> f64 {
        self.padding + index as f64 * self.x_scale()
    }

    pub fn y(&self, value: f64) -> f64 {
        self.padding + (value - self.range.min) * self.y_scale()
    }

    /// Heights of the horizontal grid lines, bottom to top.
    pub fn grid(&self) -> Vec<f64> {
        let step = (self.height - 2.0 * self.padding) / GRID_LINES as f64;
        (0..=GRID_LINES).map(|i| self.padding + i as f64 * step).collect()
    }
}

#[derive(Debug, Default)]
pub struct ProfitChart {
    history: Vec<f64>,
    display: Vec<f64>,
    baseline: Option<f64>,
    window: ViewWindow,
    totals: ProfitLoss,
}

impl ProfitChart {
    /// Replaces the history with a freshly polled array.
    pub fn apply(&mut self, samples: Vec<f64>) {
        self.history = samples.into_iter().map(round2).collect();
        if self.baseline.is_none() {
            self.baseline = self.history.first().copied();
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        let visible = self.window.visible(&self.history);
        if !visible.is_empty() {
            self.display = visible.to_vec();
        }
        if let Some(baseline) = self.baseline {
            self.totals = profit_and_loss(visible, baseline);
        }
    }

    pub fn view_older(&mut self) -> bool {
        let moved = self.window.view_older(self.history.len());
        if moved {
            self.refresh();
        }
        moved
    }

    pub fn view_newer(&mut self) -> bool {
        let moved = self.window.view_newer();
        if moved {
            self.refresh();
        }
        moved
    }

    pub fn can_view_older(&self) -> bool {
        self.window.can_view_older(self.history.len())
    }

    pub fn can_view_newer(&self) -> bool {
        self.window.can_view_newer()
    }

    pub fn window(&self) -> ViewWindow {
        self.window
    }

    pub fn display(&self) -> &[f64] {
        &self.display
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn totals(&self) -> ProfitLoss {
        self.totals
    }

    /// Index within the displayed slice and value of the newest sample.
    pub fn current(&self) -> Option<(usize, f64)> {
        self.display.last().map(|&v| (self.display.len() - 1, v))
    }

    pub fn range(&self) -> Option<ValueRange> {
        ValueRange::of(&self.display)
    }
}
