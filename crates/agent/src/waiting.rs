//! Waiting-state tracker: infers "the model has started responding" from
//! the event stream of a turn.
//!
//! Two states. `Armed` is initial. The first `ToolCallStarted` or content
//! chunk moves it to `Fired`, exactly once; further triggers are ignored
//! until the Runner calls [`WaitingTracker::arm`] at the start of its next
//! turn. Each arm-to-fire span is a numbered cycle, which is what
//! [`BusySignal`] observers wait on.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitingState {
    Armed,
    Fired,
}

/// Events that can end the waiting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    ToolCallStarted,
    ContentChunk,
}

/// Outcome of feeding a trigger to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This trigger moved the tracker from `Armed` to `Fired`.
    Fired,
    /// Already fired this cycle; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    cycle: u64,
    state: WaitingState,
}

pub struct WaitingTracker {
    tx: watch::Sender<Snapshot>,
}

impl WaitingTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot {
            cycle: 1,
            state: WaitingState::Armed,
        });
        Self { tx }
    }

    pub fn state(&self) -> WaitingState {
        self.tx.borrow().state
    }

    /// The current cycle number. Starts at 1.
    pub fn cycle(&self) -> u64 {
        self.tx.borrow().cycle
    }

    /// Start a new cycle if the current one has fired. Arming an already
    /// armed tracker keeps the current cycle, so observers waiting on it
    /// are still woken by the next trigger.
    pub fn arm(&self) {
        self.tx.send_if_modified(|snapshot| match snapshot.state {
            WaitingState::Armed => false,
            WaitingState::Fired => {
                snapshot.cycle += 1;
                snapshot.state = WaitingState::Armed;
                true
            }
        });
    }

    /// Feed a trigger. Fires at most once per cycle.
    pub fn transition(&self, trigger: Trigger) -> Transition {
        let fired = self.tx.send_if_modified(|snapshot| {
            if snapshot.state == WaitingState::Armed {
                snapshot.state = WaitingState::Fired;
                true
            } else {
                false
            }
        });
        if fired {
            tracing::debug!(?trigger, cycle = self.cycle(), "Waiting state fired");
            Transition::Fired
        } else {
            Transition::Ignored
        }
    }

    /// Observe busy transitions from now on.
    pub fn subscribe(&self) -> BusySignal {
        let rx = self.tx.subscribe();
        let current = *rx.borrow();
        let seen = match current.state {
            WaitingState::Armed => current.cycle - 1,
            WaitingState::Fired => current.cycle,
        };
        BusySignal { rx, seen }
    }
}

impl Default for WaitingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for cycles to fire.
pub struct BusySignal {
    rx: watch::Receiver<Snapshot>,
    seen: u64,
}

impl BusySignal {
    /// Resolve once a cycle this signal has not reported yet fires, and
    /// return that cycle's number. Returns `None` if the tracker is gone.
    pub async fn busy(&mut self) -> Option<u64> {
        let seen = self.seen;
        let snapshot = *self
            .rx
            .wait_for(|s| s.state == WaitingState::Fired && s.cycle > seen)
            .await
            .ok()?;
        self.seen = snapshot.cycle;
        Some(snapshot.cycle)
    }
}
