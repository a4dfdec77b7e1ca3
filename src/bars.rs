use serde::Deserialize;

use crate::constants::{
    ANIMATION_EASE, ITEMS_DEFAULT, ITEMS_MAX, ITEMS_MIN, SERIES_DEFAULT, SERIES_MAX, SERIES_MIN,
};

/// Body of the profit endpoint as seen by the bar panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BarPayload {
    Nested(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

impl BarPayload {
    pub fn series(&self, series_nb: usize, item_nb: usize) -> Vec<Series> {
        let rows: Vec<Vec<f64>> = match self {
            BarPayload::Nested(rows) => rows
                .iter()
                .take(series_nb)
                .map(|row| row.iter().take(item_nb).copied().collect())
                .collect(),
            BarPayload::Flat(samples) => {
                let want = series_nb * item_nb;
                let tail = &samples[samples.len().saturating_sub(want)..];
                tail.chunks(item_nb.max(1)).map(<[f64]>::to_vec).collect()
            }
        };
        rows.into_iter()
            .enumerate()
            .map(|(i, values)| Series { label: format!("Series {}", i + 1), values })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slider {
    pub value: usize,
    pub min: usize,
    pub max: usize,
}

impl Slider {
    pub fn new(value: usize, min: usize, max: usize) -> Self {
        Self { value: value.clamp(min, max), min, max }
    }

    pub fn set(&mut self, value: usize) {
        self.value = value.clamp(self.min, self.max);
    }

    pub fn increment(&mut self) {
        self.set(self.value.saturating_add(1));
    }

    pub fn decrement(&mut self) {
        self.set(self.value.saturating_sub(1));
    }
}

pub struct BarPanel {
    pub series_nb: Slider,
    pub item_nb: Slider,
    pub skip_animation: bool,
    payload: Option<BarPayload>,
    shown: Vec<Series>,
}

impl Default for BarPanel {
    fn default() -> Self {
        Self {
            series_nb: Slider::new(SERIES_DEFAULT, SERIES_MIN, SERIES_MAX),
            item_nb: Slider::new(ITEMS_DEFAULT, ITEMS_MIN, ITEMS_MAX),
            skip_animation: false,
            payload: None,
            shown: Vec::new(),
        }
    }
}

impl BarPanel {
    pub fn apply(&mut self, payload: BarPayload) {
        self.payload = Some(payload);
    }

    pub fn toggle_animation(&mut self) {
        self.skip_animation = !self.skip_animation;
    }

    pub fn targets(&self) -> Vec<Series> {
        self.payload
            .as_ref()
            .map(|p| p.series(self.series_nb.value, self.item_nb.value))
            .unwrap_or_default()
    }

    /// Moves the shown bars one frame toward their targets.
    pub fn animate(&mut self) {
        let targets = self.targets();
        if self.skip_animation {
            self.shown = targets;
            return;
        }
        let previous = std::mem::take(&mut self.shown);
        self.shown = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| {
                let values = target
                    .values
                    .iter()
                    .enumerate()
                    .map(|(j, &goal)| {
                        let from = previous
                            .get(i)
                            .and_then(|s| s.values.get(j))
                            .copied()
                            .unwrap_or(0.0);
                        ease(from, goal)
                    })
                    .collect();
                Series { label: target.label, values }
            })
            .collect();
    }

    pub fn shown(&self) -> &[Series] {
        &self.shown
    }
}

fn ease(from: f64, to: f64) -> f64 {
    let next = from + (to - from) * ANIMATION_EASE;
    if (to - next).abs() < 0.5 {
        to
    } else {
        next
    }
}
