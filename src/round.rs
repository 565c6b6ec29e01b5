use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::command::Command;
use crate::types::RoundOutcome;

#[derive(Debug)]
struct RoundInner {
    running: bool,
    outcome: RoundOutcome,
    pending_input: Option<Command>,
    save_requested: bool,
}

/// Coordination point for one level attempt. Every state change broadcasts,
/// so a worker parked in any wait re-checks `running` and can leave.
#[derive(Debug)]
pub struct RoundState {
    inner: Mutex<RoundInner>,
    signal: Condvar,
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RoundInner {
                running: true,
                outcome: RoundOutcome::Continue,
                pending_input: None,
                save_requested: false,
            }),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoundInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn outcome(&self) -> RoundOutcome {
        self.lock().outcome
    }

    pub fn save_requested(&self) -> bool {
        self.lock().save_requested
    }

    /// Records a final outcome and stops the round. The first final outcome
    /// wins; returns whether this call set it.
    pub fn resolve(&self, outcome: RoundOutcome) -> bool {
        if !outcome.is_final() {
            return false;
        }
        let mut inner = self.lock();
        let won = !inner.outcome.is_final();
        if won {
            inner.outcome = outcome;
        }
        inner.running = false;
        drop(inner);
        self.signal.notify_all();
        won
    }

    /// Like `resolve`, but leaves a round that was already stopped alone, so
    /// a pending save is not turned into another outcome.
    pub fn resolve_if_running(&self, outcome: RoundOutcome) -> bool {
        if !outcome.is_final() {
            return false;
        }
        let mut inner = self.lock();
        if !inner.running || inner.outcome.is_final() {
            return false;
        }
        inner.outcome = outcome;
        inner.running = false;
        drop(inner);
        self.signal.notify_all();
        true
    }

    /// Stops a running round for a save. Returns false if the round had
    /// already stopped.
    pub fn request_save(&self) -> bool {
        let mut inner = self.lock();
        if !inner.running {
            return false;
        }
        inner.save_requested = true;
        inner.running = false;
        drop(inner);
        self.signal.notify_all();
        true
    }

    pub fn stop(&self) {
        self.lock().running = false;
        self.signal.notify_all();
    }

    /// Publishes the latest interactive command, replacing any unconsumed one.
    pub fn publish_input(&self, command: Command) {
        self.lock().pending_input = Some(command);
        self.signal.notify_all();
    }

    /// Wakes every waiter without changing state.
    pub fn nudge(&self) {
        let _inner = self.lock();
        self.signal.notify_all();
    }

    /// Blocks until input is pending. Returns `None` once the round stops or
    /// `interrupted` reports true on a wake-up.
    pub fn wait_for_input(&self, interrupted: impl Fn() -> bool) -> Option<Command> {
        let mut inner = self.lock();
        loop {
            if !inner.running || interrupted() {
                return None;
            }
            if let Some(command) = inner.pending_input.take() {
                return Some(command);
            }
            inner = self
                .signal
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleeps for one tick or until the round stops. Returns whether the
    /// round is still running.
    pub fn pause(&self, tick: Duration) -> bool {
        let inner = self.lock();
        if tick.is_zero() {
            return inner.running;
        }
        let (inner, _) = self
            .signal
            .wait_timeout_while(inner, tick, |inner| inner.running)
            .unwrap_or_else(PoisonError::into_inner);
        inner.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, EndCause};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn first_final_outcome_wins() {
        let round = RoundState::new();
        assert!(round.resolve(RoundOutcome::NextLevel));
        assert!(!round.resolve(RoundOutcome::Terminated {
            cause: EndCause::PacmanDied
        }));
        assert!(!round.resolve(RoundOutcome::Continue));
        assert_eq!(round.outcome(), RoundOutcome::NextLevel);
        assert!(!round.is_running());
    }

    #[test]
    fn racing_resolvers_agree_on_a_single_winner() {
        let round = Arc::new(RoundState::new());
        let handles: Vec<_> = (0..8)
            .map(|idx| {
                let round = round.clone();
                thread::spawn(move || {
                    let outcome = if idx % 2 == 0 {
                        RoundOutcome::NextLevel
                    } else {
                        RoundOutcome::Terminated {
                            cause: EndCause::Quit,
                        }
                    };
                    (round.resolve(outcome), outcome)
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("resolver thread"))
            .collect();
        let winners: Vec<_> = results.iter().filter(|(won, _)| *won).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(round.outcome(), winners[0].1);
    }

    #[test]
    fn save_request_stops_without_final_outcome() {
        let round = RoundState::new();
        assert!(round.request_save());
        assert!(round.save_requested());
        assert!(!round.is_running());
        assert_eq!(round.outcome(), RoundOutcome::Continue);
    }

    #[test]
    fn late_resolve_keeps_a_pending_save() {
        let round = RoundState::new();
        assert!(round.request_save());
        assert!(!round.request_save());
        assert!(!round.resolve_if_running(RoundOutcome::Terminated {
            cause: EndCause::Quit
        }));
        assert_eq!(round.outcome(), RoundOutcome::Continue);
        assert!(round.save_requested());

        let running = RoundState::new();
        assert!(running.resolve_if_running(RoundOutcome::NextLevel));
        assert_eq!(running.outcome(), RoundOutcome::NextLevel);
        assert!(!running.is_running());
    }

    #[test]
    fn latest_input_wins() {
        let round = RoundState::new();
        round.publish_input(Command::step(Direction::Up));
        round.publish_input(Command::step(Direction::Left));
        assert_eq!(
            round.wait_for_input(|| false),
            Some(Command::step(Direction::Left))
        );
    }

    #[test]
    fn stop_releases_blocked_input_waiters() {
        let round = Arc::new(RoundState::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let round = round.clone();
                thread::spawn(move || round.wait_for_input(|| false))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        round.stop();
        for waiter in waiters {
            assert_eq!(waiter.join().expect("waiter thread"), None);
        }
    }

    #[test]
    fn nudge_lets_interrupted_waiter_leave() {
        let round = Arc::new(RoundState::new());
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let waiter = {
            let round = round.clone();
            let flag = flag.clone();
            thread::spawn(move || {
                round.wait_for_input(|| flag.load(std::sync::atomic::Ordering::SeqCst))
            })
        };
        thread::sleep(Duration::from_millis(20));
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        round.nudge();
        assert_eq!(waiter.join().expect("waiter thread"), None);
        assert!(round.is_running());
    }

    #[test]
    fn pause_returns_early_when_stopped() {
        let round = Arc::new(RoundState::new());
        let stopper = {
            let round = round.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                round.stop();
            })
        };
        let started = Instant::now();
        assert!(!round.pause(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().expect("stopper thread");
    }

    #[test]
    fn pause_times_out_while_running() {
        let round = RoundState::new();
        assert!(round.pause(Duration::from_millis(5)));
        assert!(round.pause(Duration::ZERO));
    }
}
