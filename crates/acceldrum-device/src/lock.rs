use std::sync::{Arc, Mutex, MutexGuard};

/// State shared between the scheduler thread and a worker thread.
///
/// Every access goes through a scoped guard, released on every exit path.
/// A panic on one side does not lock the other side out: poisoning is
/// ignored and the inner value is handed out as is.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn worker_and_owner_see_same_value() {
        let shared = Shared::new(0u32);
        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    shared.with(|v| *v += 1);
                }
            })
        };
        for _ in 0..1000 {
            *shared.lock() += 1;
        }
        worker.join().expect("worker should finish");
        assert_eq!(*shared.lock(), 2000);
    }

    #[test]
    fn guard_released_on_early_return() {
        fn bump_if_small(shared: &Shared<u32>) -> bool {
            let mut guard = shared.lock();
            if *guard > 5 {
                return false;
            }
            *guard += 1;
            true
        }

        let shared = Shared::new(5u32);
        assert!(bump_if_small(&shared));
        assert!(!bump_if_small(&shared));
        assert_eq!(*shared.lock(), 6);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = Shared::new(vec![1, 2, 3]);
        let poisoner = shared.clone();
        let result = thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("worker failure");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(shared.lock().len(), 3);
    }
}
