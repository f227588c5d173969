use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use super::AbortSignal;

/// Cloneable handle that fires the abort channel from anywhere
/// (Ctrl-C handler, simulation script, a button thread).
#[derive(Clone, Debug)]
pub struct AbortTrigger {
    tx: Sender<()>,
}

impl AbortTrigger {
    /// Returns false once the receiving side is gone.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// True while a fired trigger has not been polled yet.
    pub fn is_pending(&self) -> bool {
        !self.tx.is_empty()
    }
}

/// Polled abort signal backed by a crossbeam channel.
///
/// A trigger stays latched until it is polled once, like a "was pressed"
/// button flag.
#[derive(Debug)]
pub struct AbortChannel {
    rx: Receiver<()>,
    tx: Sender<()>,
}

impl AbortChannel {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { rx, tx }
    }

    pub fn trigger(&self) -> AbortTrigger {
        AbortTrigger {
            tx: self.tx.clone(),
        }
    }
}

impl Default for AbortChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal for AbortChannel {
    fn abort_requested(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => {
                // Presses that queued up behind this one belong to the same abort.
                while self.rx.try_recv().is_ok() {}
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    fn clear_abort(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_latches_until_polled() {
        let mut channel = AbortChannel::new();
        assert!(!channel.abort_requested());

        let trigger = channel.trigger();
        assert!(trigger.fire());
        assert!(trigger.fire());

        assert!(channel.abort_requested());
        assert!(!channel.abort_requested());
    }

    #[test]
    fn test_trigger_from_another_thread() {
        let mut channel = AbortChannel::new();
        let trigger = channel.trigger();

        std::thread::spawn(move || {
            trigger.fire();
        })
        .join()
        .unwrap();

        assert!(channel.abort_requested());
    }

    #[test]
    fn test_pending_until_polled() {
        let mut channel = AbortChannel::new();
        let trigger = channel.trigger();
        assert!(!trigger.is_pending());

        trigger.fire();
        assert!(trigger.is_pending());
        assert!(channel.abort_requested());
        assert!(!trigger.is_pending());
    }

    #[test]
    fn test_clear_drops_pending_triggers() {
        let mut channel = AbortChannel::new();
        channel.trigger().fire();
        channel.clear_abort();
        assert!(!channel.abort_requested());
    }
}
