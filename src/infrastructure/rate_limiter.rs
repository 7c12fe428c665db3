//! Вежливость к хостам: не больше одного запроса за раз и пауза между ними.
//!
//! Each host gets its own async mutex plus the time of the last request.
//! Acquiring the lease waits out `min_delay + jitter` since the previous
//! request to the same host. Dropping the lease releases the host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::OwnedMutexGuard;

type HostState = Arc<tokio::sync::Mutex<Option<Instant>>>;

pub struct HostRateLimiter {
    hosts: Mutex<HashMap<String, HostState>>,
    min_delay: Duration,
    jitter_ms: u64,
}

/// Держатель хоста. Drop освобождает его для следующего запроса.
pub struct HostLease {
    _guard: OwnedMutexGuard<Option<Instant>>,
}

impl HostRateLimiter {
    pub fn new(min_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            min_delay: Duration::from_millis(min_delay_ms),
            jitter_ms,
        }
    }

    pub async fn acquire(&self, url: &str) -> HostLease {
        let state = {
            let mut hosts = self.hosts.lock().unwrap();
            hosts.entry(host_key(url)).or_default().clone()
        };

        let mut guard = state.lock_owned().await;

        let delay = self.min_delay + Duration::from_millis(self.jitter());
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }

        *guard = Some(Instant::now());
        HostLease { _guard: guard }
    }

    fn jitter(&self) -> u64 {
        if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        }
    }
}

fn host_key(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}
