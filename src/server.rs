//! Demo profit backend.
//!
//! Generates a bounded random walk on a timer and serves it as
//! `GET /api/profit`, plus a CSV export of the same history at
//! `POST /v1/transactions/csvExport`.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::oneshot, time::interval};
use tracing::{info, warn};

use crate::config::ServeArgs;
use crate::error::{DashboardError, Result};

const MAX_PROFIT: f64 = 5000.0;
const MIN_PROFIT: f64 = 4.0;
const FIRST_PROFIT_CEIL: f64 = 10.0;
const FLUCTUATION_PROBABILITY: f64 = 0.25;
const LOSS_PROBABILITY: f64 = 0.20;
const MAX_FLUCTUATION: f64 = 5.0;
const MAX_LOSS: f64 = 8.0;

pub struct ProfitGenerator {
    rng: StdRng,
    history: Vec<f64>,
}

impl ProfitGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng, history: Vec::new() }
    }

    pub fn step(&mut self) -> f64 {
        let next = match self.history.last() {
            None => self.rng.gen_range(MIN_PROFIT..FIRST_PROFIT_CEIL),
            Some(&last) => {
                let mut increment: f64 = self.rng.gen_range(0.0..2.0);
                if self.rng.gen_bool(FLUCTUATION_PROBABILITY) && self.rng.gen_bool(0.5) {
                    increment = -increment;
                }
                if self.rng.gen_bool(LOSS_PROBABILITY) {
                    increment -= self.rng.gen_range(0.0..MAX_LOSS);
                }
                let increment = increment.clamp(-MAX_FLUCTUATION, MAX_FLUCTUATION);
                (last + increment).clamp(MIN_PROFIT, MAX_PROFIT)
            }
        };
        self.history.push(next);
        next
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }
}

#[derive(Clone)]
struct ServerState {
    generator: Arc<Mutex<ProfitGenerator>>,
}

impl ServerState {
    fn new(rng: StdRng) -> Self {
        Self { generator: Arc::new(Mutex::new(ProfitGenerator::new(rng))) }
    }

    fn tick(&self) {
        self.generator.lock().unwrap_or_else(PoisonError::into_inner).step();
    }

    fn snapshot(&self) -> Vec<f64> {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history()
            .to_vec()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvFilters {
    from: Option<usize>,
    to: Option<usize>,
    min_profit: Option<f64>,
    max_profit: Option<f64>,
}

impl CsvFilters {
    fn rows(&self, history: &[f64]) -> String {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(history.len()).min(history.len());
        let mut csv = String::from("index,profit\n");
        for (i, v) in history.iter().enumerate().take(to).skip(from) {
            if self.min_profit.is_some_and(|min| *v < min) || self.max_profit.is_some_and(|max| *v > max) {
                continue;
            }
            csv.push_str(&format!("{i},{v:.2}\n"));
        }
        csv
    }
}

async fn profit_handler(State(state): State<ServerState>) -> Json<Vec<f64>> {
    Json(state.snapshot())
}

async fn csv_export_handler(State(state): State<ServerState>, Json(body): Json<Value>) -> Response {
    if !body.is_object() {
        return (StatusCode::BAD_REQUEST, "filter body must be a JSON object").into_response();
    }
    let filters: CsvFilters = match serde_json::from_value(body) {
        Ok(filters) => filters,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    let csv = filters.rows(&state.snapshot());
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"transactions.csv\""),
        ],
        csv,
    )
        .into_response()
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/profit", get(profit_handler))
        .route("/v1/transactions/csvExport", post(csv_export_handler))
        .with_state(state)
}

pub fn run(args: &ServeArgs) -> Result<()> {
    if args.tick_ms == 0 {
        return Err(DashboardError::Config("tick-ms must be greater than zero".to_string()));
    }
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(args.addr, Duration::from_millis(args.tick_ms)))
}

async fn serve(addr: SocketAddr, tick: Duration) -> Result<()> {
    let state = ServerState::new(StdRng::from_entropy());

    let ticker = state.clone();
    tokio::spawn(async move {
        let mut timer = interval(tick);
        loop {
            timer.tick().await;
            ticker.tick();
        }
    });

    let (tx, rx) = oneshot::channel::<()>();
    let tx = Mutex::new(Some(tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(());
        }
    })
    .map_err(std::io::Error::other)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, ?tick, "profit backend listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if rx.await.is_err() {
                warn!("shutdown signal dropped");
            }
        })
        .await?;
    info!("profit backend stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(ticks: usize) -> ServerState {
        let state = ServerState::new(StdRng::seed_from_u64(7));
        for _ in 0..ticks {
            state.tick();
        }
        state
    }

    #[test]
    fn walk_stays_in_bounds() {
        let mut generator = ProfitGenerator::new(StdRng::seed_from_u64(42));
        let first = generator.step();
        assert!((MIN_PROFIT..FIRST_PROFIT_CEIL).contains(&first));
        for _ in 0..5000 {
            generator.step();
        }
        let history = generator.history();
        assert_eq!(history.len(), 5001);
        assert!(history.iter().all(|v| (MIN_PROFIT..=MAX_PROFIT).contains(v)));
        assert!(history.windows(2).all(|w| (w[1] - w[0]).abs() <= MAX_FLUCTUATION + 1e-9));
    }

    #[tokio::test]
    async fn profit_endpoint_returns_history_copy() {
        let state = seeded(25);
        let Json(values) = profit_handler(State(state.clone())).await;
        assert_eq!(values.len(), 25);
        state.tick();
        assert_eq!(values.len(), 25);
        assert_eq!(state.snapshot().len(), 26);
    }

    #[tokio::test]
    async fn csv_export_honours_filters() {
        let state = seeded(10);
        let history = state.snapshot();
        let response =
            csv_export_handler(State(state), Json(serde_json::json!({"from": 2, "to": 5, "ignored": true})))
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"transactions.csv\""
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "index,profit");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], format!("2,{:.2}", history[2]));
    }

    #[tokio::test]
    async fn csv_export_rejects_non_object() {
        let response = csv_export_handler(State(seeded(1)), Json(serde_json::json!([1, 2]))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn min_profit_filter_drops_rows() {
        let filters = CsvFilters { min_profit: Some(5.0), ..CsvFilters::default() };
        assert_eq!(filters.rows(&[4.0, 6.0, 5.0]), "index,profit\n1,6.00\n2,5.00\n");
    }
}
