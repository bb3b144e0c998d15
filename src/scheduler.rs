use crossbeam::channel::{tick, Receiver};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::Channel;

pub const POSITION_MIN: i32 = 0;
pub const POSITION_MAX: i32 = 100;
pub const POSITION_CENTER: i32 = 50;
pub const POSITION_STEP: i32 = 2;
/// Position steps in one centre-to-edge traversal, i.e. one beat.
pub const STEPS_PER_BEAT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StimulationEffect {
    /// The marker bounced; play a cue on the (new) active channel.
    Cue(Channel),
    /// Fresh position for the presentation layer.
    Frame { position: i32, channel: Channel },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulationState {
    pub position: i32,
    pub direction: Direction,
    pub active_channel: Channel,
}

impl Default for StimulationState {
    fn default() -> Self {
        Self {
            position: POSITION_CENTER,
            direction: Direction::Forward,
            active_channel: Channel::Left,
        }
    }
}

impl StimulationState {
    /// One oscillation step. Pure: the caller installs the returned state and
    /// then carries out the effects.
    pub fn advance(self) -> (StimulationState, Vec<StimulationEffect>) {
        let mut next = self;
        let mut effects = Vec::with_capacity(2);
        next.position += next.direction.sign() * POSITION_STEP;

        if next.position >= POSITION_MAX {
            next.position = POSITION_MAX;
            next.direction = Direction::Backward;
            next.active_channel = next.active_channel.flip();
            effects.push(StimulationEffect::Cue(next.active_channel));
        } else if next.position <= POSITION_MIN {
            next.position = POSITION_MIN;
            next.direction = Direction::Forward;
            next.active_channel = next.active_channel.flip();
            effects.push(StimulationEffect::Cue(next.active_channel));
        }

        effects.push(StimulationEffect::Frame {
            position: next.position,
            channel: next.active_channel,
        });
        (next, effects)
    }
}

/// `(60000 / bpm) / 50` milliseconds.
pub fn tick_interval_ms(bpm: u32) -> f64 {
    (60_000.0 / bpm as f64) / STEPS_PER_BEAT as f64
}

pub fn tick_interval(bpm: u32) -> Duration {
    Duration::from_secs_f64(tick_interval_ms(bpm) / 1000.0)
}

/// Drives the oscillating marker.
///
/// `bpm` must already be validated (see [`crate::models::validate_bpm`]); the
/// scheduler takes whatever rate it is given. The timer is a crossbeam tick
/// channel: dropping the receiver is the cancellation, so there is never more
/// than one live oscillation timer.
pub struct StimulationScheduler {
    state: StimulationState,
    interval: Duration,
    timer: Option<Receiver<Instant>>,
}

impl StimulationScheduler {
    pub fn new(bpm: u32) -> Self {
        Self {
            state: StimulationState::default(),
            interval: tick_interval(bpm),
            timer: None,
        }
    }

    pub fn configure(&mut self, bpm: u32) {
        self.interval = tick_interval(bpm);
    }

    pub fn start(&mut self) {
        self.timer = None;
        self.timer = Some(tick(self.interval));
        debug!(interval_us = self.interval.as_micros() as u64, "oscillation timer installed");
    }

    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            debug!("oscillation timer cancelled");
        }
    }

    /// Change the rate. A running timer is replaced; position, direction and
    /// channel carry over untouched.
    pub fn reconfigure(&mut self, bpm: u32) {
        self.configure(bpm);
        if self.is_running() {
            self.stop();
            self.start();
        }
    }

    pub fn reset(&mut self) {
        self.state = StimulationState::default();
    }

    /// Apply one tick. Ignored when the timer is not installed, so a tick that
    /// was already in flight when `stop` ran cannot move the marker.
    pub fn on_tick(&mut self) -> Vec<StimulationEffect> {
        if !self.is_running() {
            return Vec::new();
        }
        let (next, effects) = self.state.advance();
        self.state = next;
        effects
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn timer(&self) -> Option<&Receiver<Instant>> {
        self.timer.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> StimulationState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(effects: &[StimulationEffect]) -> Vec<Channel> {
        effects
            .iter()
            .filter_map(|e| match e {
                StimulationEffect::Cue(ch) => Some(*ch),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interval_is_one_fiftieth_of_a_beat() {
        assert!((tick_interval_ms(120) - 10.0).abs() < 1e-12);
        assert_eq!(tick_interval(120), Duration::from_millis(10));
        for bpm in (60..=200).step_by(5) {
            let expected = (60_000.0 / bpm as f64) / 50.0;
            assert!((tick_interval_ms(bpm) - expected).abs() < 1e-12);
            let actual_ms = tick_interval(bpm).as_secs_f64() * 1000.0;
            assert!((actual_ms - expected).abs() < 1e-5, "bpm {bpm}");
        }
    }

    #[test]
    fn twenty_five_ticks_from_center_hit_the_right_edge_once() {
        let mut state = StimulationState::default();
        let mut all = Vec::new();
        for _ in 0..24 {
            let (next, effects) = state.advance();
            state = next;
            all.extend(cues(&effects));
        }
        assert_eq!(state.position, 98);
        assert!(all.is_empty());

        let (state, effects) = state.advance();
        assert_eq!(state.position, 100);
        assert_eq!(state.direction, Direction::Backward);
        assert_eq!(state.active_channel, Channel::Right);
        assert_eq!(cues(&effects), vec![Channel::Right]);
    }

    #[test]
    fn full_cycle_flips_twice_and_returns_to_center() {
        let mut state = StimulationState::default();
        let mut emitted = Vec::new();
        // 25 up, 50 down, 25 back up
        for _ in 0..100 {
            let (next, effects) = state.advance();
            assert!((POSITION_MIN..=POSITION_MAX).contains(&next.position));
            state = next;
            emitted.extend(cues(&effects));
        }
        assert_eq!(state.position, POSITION_CENTER);
        assert_eq!(state.direction, Direction::Forward);
        assert_eq!(state.active_channel, Channel::Left);
        assert_eq!(emitted, vec![Channel::Right, Channel::Left]);
    }

    #[test]
    fn every_tick_reports_a_frame() {
        let (state, effects) = StimulationState::default().advance();
        assert_eq!(
            effects.last(),
            Some(&StimulationEffect::Frame {
                position: state.position,
                channel: Channel::Left
            })
        );
    }

    #[test]
    fn stopped_scheduler_ignores_ticks() {
        let mut sched = StimulationScheduler::new(120);
        assert!(sched.on_tick().is_empty());
        sched.start();
        assert!(!sched.on_tick().is_empty());
        sched.stop();
        assert!(sched.on_tick().is_empty());
        assert_eq!(sched.state().position, 52);
    }

    #[test]
    fn reconfigure_keeps_phase_and_swaps_timer() {
        let mut sched = StimulationScheduler::new(120);
        sched.start();
        for _ in 0..30 {
            sched.on_tick();
        }
        let before = sched.state();
        sched.reconfigure(60);
        assert!(sched.is_running());
        assert_eq!(sched.interval(), Duration::from_millis(20));
        assert_eq!(sched.state(), before);

        sched.stop();
        sched.reconfigure(200);
        assert!(!sched.is_running());
        assert_eq!(sched.interval(), tick_interval(200));
    }

    #[test]
    fn installed_timer_actually_ticks() {
        let mut sched = StimulationScheduler::new(200);
        sched.start();
        let timer = sched.timer().cloned().unwrap();
        assert!(timer.recv_timeout(Duration::from_secs(1)).is_ok());
    }
}
