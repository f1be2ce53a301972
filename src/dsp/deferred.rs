//! A single cancellable deferred action, scheduled on a sample clock.

/// Holds at most one pending action. Scheduling a new one replaces (and so
/// cancels) whatever was pending.
#[derive(Debug, Clone, PartialEq)]
pub struct Deferred<A> {
    pending: Option<(u64, A)>,
}

impl<A> Default for Deferred<A> {
    fn default() -> Self {
        Deferred { pending: None }
    }
}

impl<A> Deferred<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the action that was displaced, if any.
    pub fn schedule(&mut self, due: u64, action: A) -> Option<A> {
        self.pending.replace((due, action)).map(|(_, a)| a)
    }

    pub fn cancel(&mut self) -> Option<A> {
        self.pending.take().map(|(_, a)| a)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due(&self) -> Option<u64> {
        self.pending.as_ref().map(|(due, _)| *due)
    }

    /// Take the action if it is due at or before `now`.
    pub fn poll(&mut self, now: u64) -> Option<A> {
        match self.pending {
            Some((due, _)) if due <= now => self.pending.take().map(|(_, a)| a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_due() {
        let mut d = Deferred::new();
        d.schedule(100, "revert");
        assert_eq!(d.poll(99), None);
        assert_eq!(d.poll(100), Some("revert"));
        assert_eq!(d.poll(200), None);
    }

    #[test]
    fn reschedule_replaces_pending() {
        let mut d = Deferred::new();
        d.schedule(100, 1);
        assert_eq!(d.schedule(300, 2), Some(1));
        assert_eq!(d.poll(150), None);
        assert_eq!(d.due(), Some(300));
        assert_eq!(d.poll(300), Some(2));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut d = Deferred::new();
        d.schedule(10, ());
        assert_eq!(d.cancel(), Some(()));
        assert_eq!(d.cancel(), None);
        assert!(!d.is_pending());
    }
}
