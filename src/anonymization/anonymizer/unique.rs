//! Per-run uniqueness pool

use crate::domain::{DbAnonError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Values already handed out in this run, by uniqueness class
///
/// One pool is shared by every scope of a run, so uniqueness holds across
/// tenants as well.
pub struct UniquePool {
    used: Mutex<HashMap<String, HashSet<String>>>,
    max_attempts: usize,
}

impl UniquePool {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            used: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw a value from `generate` that `class` has not seen yet
    ///
    /// # Errors
    ///
    /// [`DbAnonError::UniqueGenerationExhausted`] once `max_attempts`
    /// consecutive candidates collided.
    pub fn draw(&self, class: &str, mut generate: impl FnMut() -> String) -> Result<String> {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        let seen = used.entry(class.to_string()).or_default();

        for _ in 0..self.max_attempts {
            let candidate = generate();
            if seen.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(DbAnonError::UniqueGenerationExhausted {
            class: class.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Number of values handed out for `class`
    pub fn len(&self, class: &str) -> usize {
        self.used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(class)
            .map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_on_collision() {
        let pool = UniquePool::new(10);
        let mut candidates = vec!["a", "a", "b"].into_iter();
        let mut next = || candidates.next().unwrap_or("z").to_string();

        assert_eq!(pool.draw("login", &mut next).unwrap(), "a");
        assert_eq!(pool.draw("login", &mut next).unwrap(), "b");
        assert_eq!(pool.len("login"), 2);
    }

    #[test]
    fn test_classes_are_independent() {
        let pool = UniquePool::new(1);
        assert!(pool.draw("login", || "same".to_string()).is_ok());
        assert!(pool.draw("email", || "same".to_string()).is_ok());
    }

    #[test]
    fn test_exhaustion() {
        let pool = UniquePool::new(3);
        pool.draw("login", || "same".to_string()).unwrap();

        let mut calls = 0;
        let err = pool
            .draw("login", || {
                calls += 1;
                "same".to_string()
            })
            .unwrap_err();

        assert_eq!(calls, 3);
        assert!(matches!(
            err,
            DbAnonError::UniqueGenerationExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_pool_shared_across_threads() {
        let pool = std::sync::Arc::new(UniquePool::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let mut n = 0u32;
                    for _ in 0..50 {
                        pool.draw("n", || {
                            n += 1;
                            n.to_string()
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.len("n"), 200);
    }
}
