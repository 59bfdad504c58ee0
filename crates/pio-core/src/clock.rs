//! Two-phase master clock and the driving-gear thread that runs it.
//!
//! A full cycle is `P1_STABLE -> P0_IN_PROGRESS -> P0_STABLE ->
//! P1_IN_PROGRESS -> P1_STABLE`. Listeners see the rising edge while phase 0
//! is in progress and the falling edge while phase 1 is in progress; the wall
//! clock increments once phase 1 completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Default target frequency in 1/8 Hz units (1 kHz).
pub const DEFAULT_FREQUENCY: u32 = 8_000;

/// Poll interval of the gear while idle in single-step mode.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Clock phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Phase {
    /// Rising edge listeners are running.
    Phase0InProgress = 0,
    /// Phase 0 done; waiting for phase 1.
    Phase0Stable = 1,
    /// Falling edge listeners are running.
    Phase1InProgress = 2,
    /// Phase 1 done; waiting for the next cycle.
    Phase1Stable = 3,
}

impl Phase {
    /// Numeric register value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// `true` for the two stable phases.
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(self, Self::Phase0Stable | Self::Phase1Stable)
    }
}

/// Clock driving mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ClockMode {
    /// Transitions happen only on explicit triggers.
    #[default]
    SingleStep = 0,
    /// Free-running, paced to the target frequency.
    TargetFrequency = 1,
}

impl ClockMode {
    /// Decodes a register value. Anything but 0 is free-running.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        if value == 0 {
            Self::SingleStep
        } else {
            Self::TargetFrequency
        }
    }

    /// Register value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Receives clock edges.
pub trait ClockListener: Send + Sync {
    /// Phase 0 is in progress.
    fn raising_edge(&self, wall_clock: u64);
    /// Phase 1 is in progress.
    fn falling_edge(&self, wall_clock: u64);
}

#[derive(Debug)]
struct ClockState {
    phase: Phase,
    mode: ClockMode,
    frequency: u32,
    wall_clock: u64,
    requested: Option<Phase>,
    reference: (u64, Instant),
}

impl ClockState {
    fn reset_reference(&mut self) {
        self.reference = (self.wall_clock, Instant::now());
    }

    /// Instant at which the next cycle may start.
    fn next_deadline(&self) -> Option<Instant> {
        if self.frequency == 0 {
            return None;
        }
        let (ref_wall, ref_instant) = self.reference;
        let cycles = self.wall_clock.saturating_sub(ref_wall);
        let nanos = u128::from(cycles) * 8 * 1_000_000_000 / u128::from(self.frequency);
        let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
        ref_instant.checked_add(Duration::from_nanos(nanos))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The global clock.
pub struct MasterClock {
    state: Mutex<ClockState>,
    trigger: Condvar,
    phase_changed: Condvar,
    listeners: Mutex<Vec<Weak<dyn ClockListener>>>,
}

impl std::fmt::Debug for MasterClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MasterClock")
            .field("phase", &state.phase)
            .field("mode", &state.mode)
            .field("frequency", &state.frequency)
            .field("wall_clock", &state.wall_clock)
            .finish_non_exhaustive()
    }
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::new(ClockMode::SingleStep, DEFAULT_FREQUENCY)
    }
}

impl MasterClock {
    /// Creates a clock resting in `P1_STABLE` with wall clock 0.
    #[must_use]
    pub fn new(mode: ClockMode, frequency: u32) -> Self {
        Self {
            state: Mutex::new(ClockState {
                phase: Phase::Phase1Stable,
                mode,
                frequency,
                wall_clock: 0,
                requested: None,
                reference: (0, Instant::now()),
            }),
            trigger: Condvar::new(),
            phase_changed: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers a listener without taking ownership of it.
    pub fn add_listener(&self, listener: &Arc<dyn ClockListener>) {
        lock(&self.listeners).push(Arc::downgrade(listener));
    }

    /// Unregisters a listener (and prunes dropped ones).
    pub fn remove_listener(&self, listener: &Arc<dyn ClockListener>) {
        let target = Arc::downgrade(listener);
        lock(&self.listeners)
            .retain(|registered| registered.strong_count() > 0 && !registered.ptr_eq(&target));
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners)
            .iter()
            .filter(|registered| registered.strong_count() > 0)
            .count()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// Completed cycles.
    #[must_use]
    pub fn wall_clock(&self) -> u64 {
        lock(&self.state).wall_clock
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> ClockMode {
        lock(&self.state).mode
    }

    /// Switches mode and restarts frequency pacing.
    pub fn set_mode(&self, mode: ClockMode) {
        let mut state = lock(&self.state);
        if state.mode != mode {
            info!(?mode, "clock mode changed");
        }
        state.mode = mode;
        state.requested = None;
        state.reset_reference();
        self.trigger.notify_all();
    }

    /// Target frequency in 1/8 Hz units (`0` = unbounded).
    #[must_use]
    pub fn frequency(&self) -> u32 {
        lock(&self.state).frequency
    }

    /// Changes the target frequency and restarts pacing.
    pub fn set_frequency(&self, frequency: u32) {
        let mut state = lock(&self.state);
        state.frequency = frequency;
        state.reset_reference();
        info!(frequency, "clock frequency changed");
        self.trigger.notify_all();
    }

    /// Requests the transition into `target` (`Phase0InProgress` or
    /// `Phase1InProgress`). Only honoured in single-step mode and only from
    /// the opposite stable phase.
    pub fn trigger(&self, target: Phase) -> bool {
        let mut state = lock(&self.state);
        let accepted = state.mode == ClockMode::SingleStep
            && state.requested.is_none()
            && match target {
                Phase::Phase0InProgress => state.phase == Phase::Phase1Stable,
                Phase::Phase1InProgress => state.phase == Phase::Phase0Stable,
                Phase::Phase0Stable | Phase::Phase1Stable => false,
            };
        if accepted {
            state.requested = Some(target);
            self.trigger.notify_all();
        }
        accepted
    }

    /// Performs one half-cycle transition on the calling thread and notifies
    /// listeners. Waits if another transition is in progress.
    pub fn advance(&self) {
        let (raising, wall_clock) = {
            let mut state = lock(&self.state);
            while !state.phase.is_stable() {
                state = self
                    .phase_changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            let raising = state.phase == Phase::Phase1Stable;
            state.phase = if raising {
                Phase::Phase0InProgress
            } else {
                Phase::Phase1InProgress
            };
            self.phase_changed.notify_all();
            (raising, state.wall_clock)
        };

        for listener in self.live_listeners() {
            if raising {
                listener.raising_edge(wall_clock);
            } else {
                listener.falling_edge(wall_clock);
            }
        }

        let mut state = lock(&self.state);
        if raising {
            state.phase = Phase::Phase0Stable;
        } else {
            state.phase = Phase::Phase1Stable;
            state.wall_clock += 1;
        }
        self.phase_changed.notify_all();
    }

    /// Runs `cycles` full cycles on the calling thread.
    pub fn step_cycles(&self, cycles: u64) {
        for _ in 0..cycles {
            self.complete_cycle();
        }
    }

    /// Advances until the clock rests in `P1_STABLE` after one more falling
    /// edge.
    pub fn complete_cycle(&self) {
        if self.phase() == Phase::Phase1Stable {
            self.advance();
        }
        self.advance();
    }

    /// Blocks until the phase changes or `timeout` elapses. Returns the wall
    /// clock observed afterwards.
    pub fn wait_phase_change(&self, timeout: Duration) -> u64 {
        let state = lock(&self.state);
        let phase = state.phase;
        let wall_clock = state.wall_clock;
        let (state, _) = self
            .phase_changed
            .wait_timeout_while(state, timeout, |s| s.phase == phase && s.wall_clock == wall_clock)
            .unwrap_or_else(PoisonError::into_inner);
        state.wall_clock
    }

    fn live_listeners(&self) -> Vec<Arc<dyn ClockListener>> {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|registered| registered.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }

    /// Blocks the gear until the next transition may run. Returns `false`
    /// when `stop` was raised.
    fn await_permission(&self, stop: &AtomicBool) -> bool {
        let mut state = lock(&self.state);
        loop {
            if stop.load(Ordering::Acquire) {
                return false;
            }
            match state.mode {
                ClockMode::SingleStep => {
                    if state.requested.take().is_some() {
                        return true;
                    }
                    state = self
                        .trigger
                        .wait_timeout(state, IDLE_POLL)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                ClockMode::TargetFrequency => {
                    if state.phase != Phase::Phase1Stable {
                        return true;
                    }
                    let Some(deadline) = state.next_deadline() else {
                        return true;
                    };
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    let wait = (deadline - now).min(IDLE_POLL);
                    state = self
                        .trigger
                        .wait_timeout(state, wait)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    fn wake(&self) {
        let _state = lock(&self.state);
        self.trigger.notify_all();
    }
}

/// Background thread that runs the clock's phase loop.
#[derive(Debug)]
pub struct DrivingGear {
    clock: Arc<MasterClock>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DrivingGear {
    /// Spawns the gear thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub fn start(clock: Arc<MasterClock>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name("pio-driving-gear".into()).spawn({
            let clock = Arc::clone(&clock);
            let stop = Arc::clone(&stop);
            move || {
                debug!("driving gear started");
                while clock.await_permission(&stop) {
                    clock.advance();
                }
                debug!("driving gear stopped");
            }
        })?;
        Ok(Self {
            clock,
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it to finish.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.clock.wake();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DrivingGear {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::{ClockListener, ClockMode, DrivingGear, MasterClock, Phase};

    #[derive(Default)]
    struct Counter {
        raising: AtomicU64,
        falling: AtomicU64,
    }

    impl ClockListener for Counter {
        fn raising_edge(&self, _wall_clock: u64) {
            self.raising.fetch_add(1, Ordering::SeqCst);
        }

        fn falling_edge(&self, _wall_clock: u64) {
            self.falling.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wall_clock_counts_completed_phase_one() {
        let clock = MasterClock::default();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn ClockListener> = counter.clone();
        clock.add_listener(&listener);

        clock.advance();
        assert_eq!(clock.phase(), Phase::Phase0Stable);
        assert_eq!(clock.wall_clock(), 0);
        clock.advance();
        assert_eq!(clock.phase(), Phase::Phase1Stable);
        assert_eq!(clock.wall_clock(), 1);
        clock.step_cycles(4);
        assert_eq!(clock.wall_clock(), 5);
        assert_eq!(counter.raising.load(Ordering::SeqCst), 5);
        assert_eq!(counter.falling.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let clock = MasterClock::default();
        let listener: Arc<dyn ClockListener> = Arc::new(Counter::default());
        clock.add_listener(&listener);
        assert_eq!(clock.listener_count(), 1);
        drop(listener);
        clock.advance();
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn remove_listener_stops_notifications() {
        let clock = MasterClock::default();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn ClockListener> = counter.clone();
        clock.add_listener(&listener);
        clock.remove_listener(&listener);
        clock.step_cycles(2);
        assert_eq!(counter.raising.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn triggers_require_opposite_stable_phase() {
        let clock = MasterClock::default();
        assert!(!clock.trigger(Phase::Phase1InProgress));
        assert!(clock.trigger(Phase::Phase0InProgress));
        assert!(!clock.trigger(Phase::Phase0InProgress));
        clock.set_mode(ClockMode::TargetFrequency);
        assert!(!clock.trigger(Phase::Phase0InProgress));
    }

    #[test]
    fn gear_follows_single_step_triggers() {
        let clock = Arc::new(MasterClock::default());
        let gear = DrivingGear::start(Arc::clone(&clock)).expect("spawn gear");
        assert!(clock.trigger(Phase::Phase0InProgress));
        let deadline = Instant::now() + Duration::from_secs(5);
        while clock.phase() != Phase::Phase0Stable && Instant::now() < deadline {
            clock.wait_phase_change(Duration::from_millis(10));
        }
        assert_eq!(clock.phase(), Phase::Phase0Stable);
        assert!(clock.trigger(Phase::Phase1InProgress));
        while clock.wall_clock() < 1 && Instant::now() < deadline {
            clock.wait_phase_change(Duration::from_millis(10));
        }
        assert_eq!(clock.wall_clock(), 1);
        drop(gear);
    }

    #[test]
    fn unbounded_frequency_free_runs() {
        let clock = Arc::new(MasterClock::new(ClockMode::TargetFrequency, 0));
        let gear = DrivingGear::start(Arc::clone(&clock)).expect("spawn gear");
        let deadline = Instant::now() + Duration::from_secs(5);
        while clock.wall_clock() < 1_000 && Instant::now() < deadline {
            clock.wait_phase_change(Duration::from_millis(10));
        }
        drop(gear);
        assert!(clock.wall_clock() >= 1_000);
    }
}
