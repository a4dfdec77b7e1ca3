use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::Duration,
};

use chrono::{DateTime, Local};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};

// From poll thread to UI thread
pub struct FeedState<T> {
    pub latest: Option<T>,
    pub generation: u64,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self { latest: None, generation: 0, last_error: None, updated_at: None }
    }
}

pub fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(DashboardError::Status(status.as_u16()));
    }
    let bytes = response.bytes()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Background thread that GETs `url` every `interval` and publishes the
/// decoded payload. Dropping the poller stops the thread at its next wake-up.
pub struct Poller<T> {
    state: Arc<Mutex<FeedState<T>>>,
    stop: Arc<AtomicBool>,
    seen_generation: u64,
}

impl<T: DeserializeOwned + Send + 'static> Poller<T> {
    pub fn start(client: Client, url: String, interval: Duration) -> Self {
        let state = Arc::new(Mutex::new(FeedState::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_state = Arc::clone(&state);
        let thread_stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                match fetch_json::<T>(&client, &url) {
                    Ok(payload) => {
                        let mut s = thread_state.lock().unwrap_or_else(PoisonError::into_inner);
                        s.latest = Some(payload);
                        s.generation += 1;
                        s.last_error = None;
                        s.updated_at = Some(Local::now());
                        debug!(%url, generation = s.generation, "poll ok");
                    }
                    Err(err) => {
                        warn!(%url, %err, "Error fetching data");
                        let mut s = thread_state.lock().unwrap_or_else(PoisonError::into_inner);
                        s.last_error = Some(err.to_string());
                    }
                }
                thread::sleep(interval);
            }
            debug!(%url, "poller stopped");
        });

        Self { state, stop, seen_generation: 0 }
    }
}

impl<T> Poller<T> {
    /// Takes the newest payload if one arrived since the last call.
    pub fn take_update(&mut self) -> Option<T> {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if s.generation == self.seen_generation {
            return None;
        }
        self.seen_generation = s.generation;
        s.latest.take()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).last_error.clone()
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).updated_at
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
