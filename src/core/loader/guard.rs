use std::cell::RefCell;

thread_local! {
    static IN_FLIGHT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Per-thread marker for the request currently being delegated.
///
/// Entering with the signature that is already in flight on this thread
/// fails, which breaks delegation cycles without taking a lock. Dropping the
/// guard restores whatever was in flight before.
#[derive(Debug)]
pub struct ReentryGuard {
    previous: Option<String>,
}

impl ReentryGuard {
    pub fn enter(signature: &str) -> Option<Self> {
        IN_FLIGHT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.as_deref() == Some(signature) {
                return None;
            }
            let previous = slot.replace(signature.to_string());
            Some(Self { previous })
        })
    }

    pub fn is_in_flight(signature: &str) -> bool {
        IN_FLIGHT.with(|slot| slot.borrow().as_deref() == Some(signature))
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        IN_FLIGHT.with(|slot| *slot.borrow_mut() = previous);
    }
}
