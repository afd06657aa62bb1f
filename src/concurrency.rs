//! Lock release notification
//!
//! Blocked lock acquirers in this process park on a per-path condition
//! variable instead of spinning. Releases wake every waiter on that path; a
//! waiter that misses a wake-up still returns when its timeout slice elapses,
//! so acquisition never depends on a notification arriving.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Waiter {
    /// Bumped on every release of the path.
    generation: Mutex<u64>,
    released: Condvar,
}

/// Per-path release notification registry.
pub struct LockWaiters {
    waiters: Arc<RwLock<HashMap<String, Arc<Waiter>>>>,
}

impl LockWaiters {
    pub fn new() -> Self {
        Self {
            waiters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn waiter_for(&self, path: &str) -> Arc<Waiter> {
        {
            let map = self.waiters.read();
            if let Some(waiter) = map.get(path) {
                return waiter.clone();
            }
        }

        let mut map = self.waiters.write();
        // Another thread may have inserted it between the two locks
        map.entry(path.to_string())
            .or_insert_with(|| {
                Arc::new(Waiter {
                    generation: Mutex::new(0),
                    released: Condvar::new(),
                })
            })
            .clone()
    }

    /// Block until `path` is released or `timeout` elapses.
    ///
    /// Returns true when woken by a release.
    pub fn wait_for_release(&self, path: &str, timeout: Duration) -> bool {
        let waiter = self.waiter_for(path);
        let deadline = Instant::now() + timeout;
        let woken = {
            let mut generation = waiter.generation.lock();
            let seen = *generation;
            while *generation == seen {
                if waiter
                    .released
                    .wait_until(&mut generation, deadline)
                    .timed_out()
                {
                    break;
                }
            }
            *generation != seen
        };
        self.prune(path, &waiter);
        woken
    }

    /// Remove the entry for `path` when `held` is its only user besides the map.
    fn prune(&self, path: &str, held: &Arc<Waiter>) {
        let mut map = self.waiters.write();
        if let Some(entry) = map.get(path) {
            if Arc::ptr_eq(entry, held) && Arc::strong_count(entry) == 2 {
                map.remove(path);
            }
        }
    }

    /// Wake all waiters on `path`.
    pub fn notify_released(&self, path: &str) {
        let waiter = {
            let map = self.waiters.read();
            map.get(path).cloned()
        };
        if let Some(waiter) = waiter {
            *waiter.generation.lock() += 1;
            waiter.released.notify_all();
        }

        // Drop entries nobody is waiting on
        let mut map = self.waiters.write();
        if let Some(entry) = map.get(path) {
            if Arc::strong_count(entry) == 1 {
                map.remove(path);
            }
        }
    }
}

impl Default for LockWaiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_wait_times_out_without_release() {
        let waiters = LockWaiters::new();
        let started = Instant::now();
        assert!(!waiters.wait_for_release("/a", Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_release_wakes_waiter() {
        let waiters = Arc::new(LockWaiters::new());
        let woken = Arc::new(AtomicBool::new(false));

        let handle = {
            let waiters = waiters.clone();
            let woken = woken.clone();
            thread::spawn(move || {
                let result = waiters.wait_for_release("/a", Duration::from_secs(5));
                woken.store(result, Ordering::SeqCst);
            })
        };

        // Keep notifying until the waiter has registered and observed a release
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            waiters.notify_released("/a");
            thread::sleep(Duration::from_millis(5));
        }
        handle.join().unwrap();
        assert!(woken.load(Ordering::SeqCst));
    }

    #[test]
    fn test_release_on_other_path_does_not_wake() {
        let waiters = Arc::new(LockWaiters::new());
        let handle = {
            let waiters = waiters.clone();
            thread::spawn(move || waiters.wait_for_release("/a", Duration::from_millis(100)))
        };
        for _ in 0..5 {
            waiters.notify_released("/b");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn test_timed_out_wait_leaves_no_entry() {
        let waiters = LockWaiters::new();
        for path in ["/a", "/b", "/c"] {
            assert!(!waiters.wait_for_release(path, Duration::from_millis(1)));
        }
        assert!(waiters.waiters.read().is_empty());
    }

    #[test]
    fn test_concurrent_waiter_keeps_entry() {
        let waiters = Arc::new(LockWaiters::new());
        let long = {
            let waiters = waiters.clone();
            thread::spawn(move || waiters.wait_for_release("/a", Duration::from_millis(300)))
        };
        // Let the long waiter register before the short one times out
        thread::sleep(Duration::from_millis(50));
        waiters.wait_for_release("/a", Duration::from_millis(1));
        assert!(waiters.waiters.read().contains_key("/a"));

        waiters.notify_released("/a");
        assert!(long.join().unwrap());
        assert!(waiters.waiters.read().is_empty());
    }

    #[test]
    fn test_idle_entries_are_pruned() {
        let waiters = LockWaiters::new();
        waiters.wait_for_release("/a", Duration::from_millis(1));
        waiters.notify_released("/a");
        assert!(waiters.waiters.read().is_empty());
    }
}
