//! Per-host request throttling.
//!
//! Every outbound feed fetch passes through [`DomainThrottle::acquire`]
//! before touching the network, guaranteeing that two requests to the same
//! host are separated by at least the configured minimum interval no matter
//! how many feeds share that host. Requests to distinct hosts never wait on
//! each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A minimum-interval gate keyed by network host.
///
/// Each host owns a `Mutex<Option<Instant>>` holding the timestamp of the
/// last request released to that host. `acquire` locks the host entry,
/// sleeps out the remainder of the interval, records the new timestamp, and
/// only then releases the lock, so concurrent callers for the same host
/// queue up and each departure is measured from the previous caller's
/// recorded timestamp, not from when the waiter arrived.
pub struct DomainThrottle {
    min_interval: Duration,
    hosts: Mutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>,
}

impl DomainThrottle {
    /// The interval is clamped by the shell before construction; any value
    /// handed in here is taken at face value.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// request to `host`, then records now as that host's last-request time.
    ///
    /// The outer map lock is held only long enough to clone the host entry,
    /// so a long wait on one host never blocks lookups for another.
    pub async fn acquire(&self, host: &str) {
        let slot = {
            let mut hosts = self.hosts.lock().await;
            hosts
                .entry(host.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        };

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(host = %host, wait_ms = (ready_at - now).as_millis() as u64, "throttling request");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
