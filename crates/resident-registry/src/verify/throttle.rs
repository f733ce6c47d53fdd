use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window lookup counter keyed by caller address. Bounds how fast an
/// unauthenticated party can guess at valid tokens.
pub struct LookupThrottle {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

/// Once this many addresses are tracked, expired windows are swept before
/// admitting a new one, keeping the map bounded by active callers.
const PRUNE_THRESHOLD: usize = 1024;

impl LookupThrottle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one lookup from `addr`; false means the caller is over budget
    /// for the current window.
    pub fn allow(&self, addr: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.windows.lock().expect("throttle mutex poisoned");
        if guard.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            guard.retain(|_, entry| now.duration_since(entry.0) < window);
        }
        let entry = guard.entry(addr.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.limit {
            return false;
        }
        entry.1 += 1;
        true
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows.lock().expect("throttle mutex poisoned").len()
    }
}
