//! Worker Lifecycle
//!
//! Explicit state machine for the worker's install/activate phases.
//!
//! ```text
//! Parsed -> Installing -> Waiting -> Activating -> Active
//!              |            |            |           |
//!              +------------+------------+-----------+--> Redundant
//! ```

use bitflags::bitflags;

use crate::error::LifecycleError;

/// Worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Script loaded, install not yet started
    #[default]
    Parsed,
    /// Install event running (seeding caches)
    Installing,
    /// Installed, waiting for older versions to release their pages
    Waiting,
    /// Activate event running (dropping stale buckets)
    Activating,
    /// Active and intercepting requests
    Active,
    /// Failed or replaced
    Redundant,
}

bitflags! {
    /// Side requests recorded on the worker.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WorkerFlags: u8 {
        /// Activate as soon as install completes.
        const SKIP_WAITING = 1 << 0;
        /// Open pages were taken over on activation.
        const CLIENTS_CLAIMED = 1 << 1;
    }
}

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// State change
    StateChange {
        old_state: WorkerState,
        new_state: WorkerState,
    },
    /// The worker took control of open pages.
    ControllerChange,
}

/// Lifecycle state machine.
///
/// Listeners are not stored here. The owner drains
/// [`Lifecycle::take_pending`] after releasing whatever lock guards the
/// machine and notifies its listeners itself.
#[derive(Debug)]
pub struct Lifecycle {
    state: WorkerState,
    flags: WorkerFlags,
    /// Event log, drained by [`Lifecycle::take_events`].
    events: Vec<LifecycleEvent>,
    /// Events not yet handed to listeners.
    pending: Vec<LifecycleEvent>,
}

impl Lifecycle {
    /// Create a new state machine in `Parsed`.
    pub fn new() -> Self {
        Self {
            state: WorkerState::Parsed,
            flags: WorkerFlags::empty(),
            events: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Current flags
    pub fn flags(&self) -> WorkerFlags {
        self.flags
    }

    /// Whether fetches should be intercepted.
    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Active
    }

    /// Drain the recorded events.
    pub fn take_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drain events that still have to be delivered to listeners.
    pub fn take_pending(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.pending)
    }

    fn dispatch(&mut self, event: LifecycleEvent) {
        self.pending.push(event.clone());
        self.events.push(event);
    }

    /// Transition to `new_state` if the move is legal.
    pub fn transition(&mut self, new_state: WorkerState) -> Result<(), LifecycleError> {
        let old_state = self.state;
        if !is_valid_transition(old_state, new_state) {
            return Err(LifecycleError {
                from: old_state,
                to: new_state,
            });
        }

        log::debug!("[SW Lifecycle] {:?} -> {:?}", old_state, new_state);
        self.state = new_state;
        self.dispatch(LifecycleEvent::StateChange {
            old_state,
            new_state,
        });
        Ok(())
    }

    /// Install signal: `Parsed -> Installing`.
    pub fn begin_install(&mut self) -> Result<(), LifecycleError> {
        self.transition(WorkerState::Installing)
    }

    /// Install finished: `Installing -> Waiting`, or straight on to
    /// `Activating` when skip-waiting was requested. Returns whether
    /// activation should run now.
    pub fn install_succeeded(&mut self) -> Result<bool, LifecycleError> {
        self.transition(WorkerState::Waiting)?;
        if self.flags.contains(WorkerFlags::SKIP_WAITING) {
            self.transition(WorkerState::Activating)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Install or activate failed. The worker is never used again.
    pub fn fail(&mut self) -> Result<(), LifecycleError> {
        self.transition(WorkerState::Redundant)
    }

    /// Record a skip-waiting request. If the worker is waiting it moves to
    /// `Activating` and `true` is returned. Safe to call in any state.
    pub fn skip_waiting(&mut self) -> bool {
        self.flags.insert(WorkerFlags::SKIP_WAITING);
        if self.state == WorkerState::Waiting {
            // Waiting -> Activating is always legal
            return self.transition(WorkerState::Activating).is_ok();
        }
        false
    }

    /// Activate signal. A waiting worker is moved to `Activating` first.
    pub fn begin_activate(&mut self) -> Result<(), LifecycleError> {
        if self.state == WorkerState::Waiting {
            self.transition(WorkerState::Activating)?;
        }
        if self.state != WorkerState::Activating {
            return Err(LifecycleError {
                from: self.state,
                to: WorkerState::Activating,
            });
        }
        Ok(())
    }

    /// Activation finished: `Activating -> Active`, then claim open pages.
    pub fn activate_succeeded(&mut self) -> Result<(), LifecycleError> {
        self.transition(WorkerState::Active)?;
        self.claim()
    }

    /// Take control of open pages.
    pub fn claim(&mut self) -> Result<(), LifecycleError> {
        if self.state != WorkerState::Active {
            return Err(LifecycleError {
                from: self.state,
                to: WorkerState::Active,
            });
        }
        self.flags.insert(WorkerFlags::CLIENTS_CLAIMED);
        self.dispatch(LifecycleEvent::ControllerChange);
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Waiting)
            | (Installing, Redundant) // install failed
            | (Waiting, Activating)
            | (Waiting, Redundant)
            | (Activating, Active)
            | (Activating, Redundant) // activate failed
            | (Active, Redundant) // replaced by a newer version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle_without_skip_waiting() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        assert_eq!(lc.state(), WorkerState::Installing);
        assert!(!lc.install_succeeded().unwrap());
        assert_eq!(lc.state(), WorkerState::Waiting);
        lc.begin_activate().unwrap();
        assert_eq!(lc.state(), WorkerState::Activating);
        lc.activate_succeeded().unwrap();
        assert!(lc.is_active());
        assert!(lc.flags().contains(WorkerFlags::CLIENTS_CLAIMED));
    }

    #[test]
    fn test_skip_waiting_during_install() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        assert!(!lc.skip_waiting());
        assert!(lc.install_succeeded().unwrap());
        assert_eq!(lc.state(), WorkerState::Activating);
    }

    #[test]
    fn test_skip_waiting_while_waiting() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        lc.install_succeeded().unwrap();
        assert!(lc.skip_waiting());
        assert_eq!(lc.state(), WorkerState::Activating);
        // Idempotent
        assert!(!lc.skip_waiting());
        assert_eq!(lc.state(), WorkerState::Activating);
    }

    #[test]
    fn test_skip_waiting_when_active_is_noop() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        lc.skip_waiting();
        lc.install_succeeded().unwrap();
        lc.begin_activate().unwrap();
        lc.activate_succeeded().unwrap();
        assert!(!lc.skip_waiting());
        assert!(lc.is_active());
    }

    #[test]
    fn test_invalid_transition_parsed_to_active() {
        let mut lc = Lifecycle::new();
        let err = lc.transition(WorkerState::Active).unwrap_err();
        assert_eq!(err.from, WorkerState::Parsed);
        assert_eq!(err.to, WorkerState::Active);
    }

    #[test]
    fn test_activate_before_install_rejected() {
        let mut lc = Lifecycle::new();
        assert!(lc.begin_activate().is_err());
        assert_eq!(lc.state(), WorkerState::Parsed);
    }

    #[test]
    fn test_install_failure_is_terminal() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        lc.fail().unwrap();
        assert_eq!(lc.state(), WorkerState::Redundant);
        assert!(lc.begin_install().is_err());
        assert!(lc.begin_activate().is_err());
    }

    #[test]
    fn test_claim_requires_active() {
        let mut lc = Lifecycle::new();
        assert!(lc.claim().is_err());
    }

    #[test]
    fn test_events_and_pending_queue() {
        let mut lc = Lifecycle::new();
        lc.begin_install().unwrap();
        assert_eq!(lc.take_pending().len(), 1);
        assert!(lc.take_pending().is_empty());

        lc.skip_waiting();
        lc.install_succeeded().unwrap();
        lc.activate_succeeded().unwrap();

        let events = lc.take_events();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            LifecycleEvent::StateChange {
                old_state: WorkerState::Parsed,
                new_state: WorkerState::Installing,
            }
        );
        assert_eq!(events[4], LifecycleEvent::ControllerChange);
        assert!(lc.take_events().is_empty());
        // Draining the log does not drop undelivered events.
        assert_eq!(lc.take_pending().len(), 4);
    }
}
