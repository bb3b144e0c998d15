//! Session lifecycle.
//!
//! [`SessionEngine`] owns the stimulation state, the elapsed counter and both
//! timers. It is driven from a single thread: the control calls below plus the
//! two timer callbacks, which the runtime invokes when the matching receiver
//! fires.

use chrono::Local;
use crossbeam::channel::{bounded, tick, Receiver, Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::emitter::CueEmitter;
use crate::error::{Result, SessionError};
use crate::journal::JournalSink;
use crate::models::{Channel, JournalHandoff, SessionHistoryRecord};
use crate::profiles::{profile, CueId};
use crate::scheduler::{StimulationEffect, StimulationScheduler, StimulationState};

pub const HISTORY_LIMIT: usize = 10;
const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { bpm: u32 },
    Frame { position: i32, channel: Channel },
    Elapsed(u64),
    BpmChanged(u32),
    Stopped { record: Option<SessionHistoryRecord> },
}

/// Newest-first list of completed sessions, capped at [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    records: VecDeque<SessionHistoryRecord>,
}

impl SessionHistory {
    pub fn push(&mut self, record: SessionHistoryRecord) {
        self.records.push_front(record);
        self.records.truncate(HISTORY_LIMIT);
    }

    pub fn latest(&self) -> Option<&SessionHistoryRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionHistoryRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<SessionHistoryRecord> {
        self.records.iter().cloned().collect()
    }
}

pub struct SessionEngine {
    phase: SessionPhase,
    bpm: u32,
    cue: CueId,
    elapsed_seconds: u64,
    scheduler: StimulationScheduler,
    duration_timer: Option<Receiver<Instant>>,
    before_note: Option<String>,
    history: SessionHistory,
    emitter: Arc<dyn CueEmitter>,
    journal: Box<dyn JournalSink>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl SessionEngine {
    /// `bpm` must already be validated.
    pub fn new(
        bpm: u32,
        cue: CueId,
        emitter: Arc<dyn CueEmitter>,
        journal: Box<dyn JournalSink>,
    ) -> Self {
        Self {
            phase: SessionPhase::Idle,
            bpm,
            cue,
            elapsed_seconds: 0,
            scheduler: StimulationScheduler::new(bpm),
            duration_timer: None,
            before_note: None,
            history: SessionHistory::default(),
            emitter,
            journal,
            subscribers: Vec::new(),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Idle {
            warn!(phase = ?self.phase, "start rejected");
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "start",
            });
        }
        self.scheduler.reset();
        self.elapsed_seconds = 0;
        self.scheduler.configure(self.bpm);
        self.scheduler.start();
        self.duration_timer = Some(tick(Duration::from_secs(1)));
        self.phase = SessionPhase::Running;
        info!(bpm = self.bpm, cue = %self.cue, "session started");
        self.publish(SessionEvent::Started { bpm: self.bpm });
        Ok(())
    }

    /// Apply run settings and start, as one step. While a run is live this is
    /// rejected like `start` and nothing is applied. `bpm` must already be
    /// validated.
    pub fn start_with(&mut self, bpm: u32, cue: CueId, before_note: Option<String>) -> Result<()> {
        if self.phase != SessionPhase::Idle {
            warn!(phase = ?self.phase, "start rejected");
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "start",
            });
        }
        self.set_bpm(bpm);
        self.set_cue(cue);
        self.set_before_note(before_note);
        self.start()
    }

    /// End the run. Returns the history record when one was written, which
    /// only happens if at least one second elapsed.
    pub fn stop(&mut self) -> Result<Option<SessionHistoryRecord>> {
        if self.phase != SessionPhase::Running {
            warn!(phase = ?self.phase, "stop rejected");
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                action: "stop",
            });
        }
        self.cancel_timers();

        let record = if self.elapsed_seconds > 0 {
            let record = SessionHistoryRecord {
                date: Local::now(),
                duration_seconds: self.elapsed_seconds,
                bpm: self.bpm,
            };
            self.history.push(record.clone());
            self.journal.hand_off(JournalHandoff {
                duration_seconds: self.elapsed_seconds,
                bpm: self.bpm,
                before_text: self.before_note.clone(),
            });
            Some(record)
        } else {
            None
        };

        info!(
            duration_seconds = self.elapsed_seconds,
            recorded = record.is_some(),
            "session stopped"
        );
        self.elapsed_seconds = 0;
        self.scheduler.reset();
        self.phase = SessionPhase::Idle;
        self.publish(SessionEvent::Stopped {
            record: record.clone(),
        });
        Ok(record)
    }

    /// `bpm` must already be validated. Applies immediately while running,
    /// otherwise on the next `start`.
    pub fn set_bpm(&mut self, bpm: u32) {
        if bpm == self.bpm {
            return;
        }
        self.bpm = bpm;
        if self.phase == SessionPhase::Running {
            self.scheduler.reconfigure(bpm);
        } else {
            self.scheduler.configure(bpm);
        }
        debug!(bpm, "bpm changed");
        self.publish(SessionEvent::BpmChanged(bpm));
    }

    pub fn set_cue(&mut self, cue: CueId) {
        self.cue = cue;
    }

    /// Note captured before the run. It rides along with every completed
    /// session until a journal entry is saved and the note is cleared.
    pub fn set_before_note(&mut self, note: Option<String>) {
        self.before_note = note.filter(|n| !n.is_empty());
    }

    pub fn clear_before_note(&mut self) {
        self.before_note = None;
    }

    pub fn before_note(&self) -> Option<&str> {
        self.before_note.as_deref()
    }

    /// Play the selected cue once, outside of any run.
    pub fn preview_cue(&self, side: Channel) {
        self.emitter.emit(profile(self.cue), side);
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = bounded(SUBSCRIBER_BUFFER);
        self.subscribers.push(tx);
        rx
    }

    /// Oscillation timer callback.
    pub fn on_oscillation_tick(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        for effect in self.scheduler.on_tick() {
            match effect {
                StimulationEffect::Cue(side) => self.emitter.emit(profile(self.cue), side),
                StimulationEffect::Frame { position, channel } => {
                    self.publish(SessionEvent::Frame { position, channel })
                }
            }
        }
    }

    /// 1 Hz timer callback.
    pub fn on_duration_tick(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.elapsed_seconds += 1;
        self.publish(SessionEvent::Elapsed(self.elapsed_seconds));
    }

    /// Cancel both timers without recording anything. Used when the owning
    /// runtime goes away mid-run.
    pub fn teardown(&mut self) {
        if self.phase == SessionPhase::Running {
            warn!(
                duration_seconds = self.elapsed_seconds,
                "session torn down while running"
            );
        }
        self.cancel_timers();
        self.elapsed_seconds = 0;
        self.scheduler.reset();
        self.phase = SessionPhase::Idle;
    }

    fn cancel_timers(&mut self) {
        self.scheduler.stop();
        self.duration_timer = None;
    }

    fn publish(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn oscillation_timer(&self) -> Option<&Receiver<Instant>> {
        self.scheduler.timer()
    }

    pub fn duration_timer(&self) -> Option<&Receiver<Instant>> {
        self.duration_timer.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn cue(&self) -> CueId {
        self.cue
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn stimulation(&self) -> StimulationState {
        self.scheduler.state()
    }

    pub fn tick_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }
}
