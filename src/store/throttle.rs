//! Leading/trailing emission throttle
//!
//! The first call in an idle window is delivered immediately and opens a
//! window of fixed length. Calls made while the window is open replace the
//! pending value; when the window closes the latest pending value (if any) is
//! delivered and the throttle goes idle again. The trailing delivery does not
//! open a new window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

enum ThrottleState<T> {
    Idle,
    Open { pending: Option<T> },
}

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Throttle<T> {
    window: Duration,
    state: Arc<Mutex<ThrottleState<T>>>,
    sink: Sink<T>,
}

impl<T: Send + 'static> Throttle<T> {
    pub fn new<F>(window: Duration, sink: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            window,
            state: Arc::new(Mutex::new(ThrottleState::Idle)),
            sink: Arc::new(sink),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Must be called from within a tokio runtime; closing the window is a
    /// spawned timer task.
    pub fn call(&self, value: T) {
        {
            let mut state = lock(&self.state);
            if let ThrottleState::Open { pending } = &mut *state {
                *pending = Some(value);
                return;
            }
            *state = ThrottleState::Open { pending: None };
        }

        (self.sink)(value);
        self.close_after_window();
    }

    pub fn is_idle(&self) -> bool {
        matches!(*lock(&self.state), ThrottleState::Idle)
    }

    fn close_after_window(&self) {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let pending = match std::mem::replace(&mut *lock(&state), ThrottleState::Idle) {
                ThrottleState::Open { pending } => pending,
                ThrottleState::Idle => None,
            };
            if let Some(value) = pending {
                sink(value);
            }
        });
    }
}

fn lock<T>(state: &Mutex<ThrottleState<T>>) -> MutexGuard<'_, ThrottleState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
