use tokio::sync::watch;

/// Handshake lifecycle transitions observable by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A discovery cycle has started (emitted before any network
    /// attempt completes)
    Connecting,
    /// A discovery cycle obtained a well-formed peer key
    Connected,
}

/// Current handshake state, tagged with the discovery cycle that set it
///
/// Cycles only move forward: a fresh `connect()` bumps the cycle and
/// supersedes any in-flight one. There is no reverse transition within
/// a cycle; `connected` fires at most once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Connecting {
        cycle: u64,
    },
    Connected {
        cycle: u64,
    },
}

/// Single-fire view over the handshake state machine
///
/// Replaces callback subscription lists with watch-backed futures:
/// [`Lifecycle::wait`] resolves the first time the state reaches (or
/// has already passed) the requested event, then never again blocks
/// for it.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    rx: watch::Receiver<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new(rx: watch::Receiver<LifecycleState>) -> Self {
        Self { rx }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LifecycleState {
        *self.rx.borrow()
    }

    /// Fresh receiver over every subsequent state transition
    pub fn watch(&self) -> watch::Receiver<LifecycleState> {
        self.rx.clone()
    }

    /// Resolve once the given event has fired
    ///
    /// Resolves immediately if the event already fired this cycle. Also
    /// resolves if the discovery side is dropped, so callers cannot
    /// deadlock on a bridge that no longer exists.
    pub async fn wait(&self, event: LifecycleEvent) {
        let mut rx = self.rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            let reached = match event {
                LifecycleEvent::Connecting => !matches!(state, LifecycleState::Idle),
                LifecycleEvent::Connected => matches!(state, LifecycleState::Connected { .. }),
            };
            if reached {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Resolve once a cycle at least as new as `min_cycle` has connected
    pub(crate) async fn wait_connected_from(&self, min_cycle: u64) {
        let mut rx = self.rx.clone();
        loop {
            if let LifecycleState::Connected { cycle } = *rx.borrow_and_update() {
                if cycle >= min_cycle {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_on_already_fired_event() {
        let (tx, rx) = watch::channel(LifecycleState::Connected { cycle: 1 });
        let lifecycle = Lifecycle::new(rx);

        // both events already fired; no new transitions needed
        lifecycle.wait(LifecycleEvent::Connecting).await;
        lifecycle.wait(LifecycleEvent::Connected).await;
        drop(tx);
    }

    #[tokio::test]
    async fn test_wait_blocks_until_transition() {
        let (tx, rx) = watch::channel(LifecycleState::Idle);
        let lifecycle = Lifecycle::new(rx);

        let waiter = tokio::spawn({
            let lifecycle = lifecycle.clone();
            async move { lifecycle.wait(LifecycleEvent::Connected).await }
        });

        tx.send(LifecycleState::Connecting { cycle: 1 }).unwrap();
        assert!(!waiter.is_finished());

        tx.send(LifecycleState::Connected { cycle: 1 }).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_connected_from_skips_stale_cycles() {
        let (tx, rx) = watch::channel(LifecycleState::Connected { cycle: 1 });
        let lifecycle = Lifecycle::new(rx);

        let waiter = tokio::spawn({
            let lifecycle = lifecycle.clone();
            async move { lifecycle.wait_connected_from(2).await }
        });

        tx.send(LifecycleState::Connecting { cycle: 2 }).unwrap();
        assert!(!waiter.is_finished());

        tx.send(LifecycleState::Connected { cycle: 2 }).unwrap();
        waiter.await.unwrap();
    }
}
