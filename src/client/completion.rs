//! One-shot bridge letting a blocking caller wait for an async completion.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::{Error, Result};

struct Slot<T> {
    finished: bool,
    value: Option<Result<T>>,
}

pub struct Completion<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                finished: false,
                value: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Stores the result and wakes the waiter. Only the first call counts.
    pub fn finish(&self, value: Result<T>) -> bool {
        {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.finished {
                return false;
            }
            slot.finished = true;
            slot.value = Some(value);
        }
        self.done.notify_all();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished
    }

    /// Blocks until [`finish`](Self::finish) has run, then takes the result.
    pub fn wait(&self) -> Result<T> {
        let mut slot = self
            .done
            .wait_while(
                self.slot.lock().unwrap_or_else(PoisonError::into_inner),
                |slot| !slot.finished,
            )
            .unwrap_or_else(PoisonError::into_inner);
        slot.value.take().unwrap_or(Err(Error::Cancelled))
    }
}

/// The completing side. Dropping it unfinished completes with
/// [`Error::Cancelled`], so a waiter is never stranded.
pub struct Signal<T> {
    completion: Option<Arc<Completion<T>>>,
}

impl<T> Signal<T> {
    pub fn new(completion: Arc<Completion<T>>) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    pub fn finish(mut self, value: Result<T>) {
        if let Some(completion) = self.completion.take() {
            completion.finish(value);
        }
    }
}

impl<T> Drop for Signal<T> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.finish(Err(Error::Cancelled));
        }
    }
}
