//! Process-wide task instance identifiers, used to name per-instance statistics and to tag logs.
//! Tasks may be started concurrently, so allocation is a single atomic increment.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out strictly increasing identifiers starting at 0. Identifiers are never reused, even
/// after the instance holding one is dropped.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    next: AtomicU32,
}

impl InstanceRegistry {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Identifiers for every task created in this process.
static TASK_INSTANCES: InstanceRegistry = InstanceRegistry::new();

pub(crate) fn next_task_id() -> u32 {
    TASK_INSTANCES.next_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_zero() {
        let registry = InstanceRegistry::new();
        assert_eq!(registry.next_id(), 0);
        assert_eq!(registry.next_id(), 1);
        assert_eq!(registry.next_id(), 2);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let registry = Arc::new(InstanceRegistry::new());
        let handles = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || (0..100).map(|_| registry.next_id()).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            // each thread observes its own allocations in increasing order
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            seen.extend(ids);
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(seen.iter().max(), Some(&799));
    }

    #[test]
    fn test_global_ids_increase() {
        let first = next_task_id();
        let second = next_task_id();
        assert!(second > first);
    }
}
