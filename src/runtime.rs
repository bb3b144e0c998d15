//! Event loop that owns a [`SessionEngine`].
//!
//! Everything the engine does happens on one thread. Each pass of the loop
//! selects over the control channel and whichever timers the engine has
//! installed at that moment, so a cancelled or replaced timer is never
//! waited on again.

use crossbeam::channel::{bounded, never, select, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::models::{Channel, SessionHistoryRecord};
use crate::profiles::CueId;
use crate::session::{SessionEngine, SessionEvent, SessionPhase};

enum Control {
    Start(Sender<Result<()>>),
    StartWith {
        bpm: u32,
        cue: CueId,
        before_note: Option<String>,
        reply: Sender<Result<()>>,
    },
    Stop(Sender<Result<Option<SessionHistoryRecord>>>),
    SetBpm(u32),
    SetCue(CueId),
    SetBeforeNote(Option<String>),
    PreviewCue(Channel),
    Subscribe(Sender<Receiver<SessionEvent>>),
    Phase(Sender<SessionPhase>),
    History(Sender<Vec<SessionHistoryRecord>>),
    Shutdown,
}

/// Handle to a session running on its own thread.
pub struct SessionHandle {
    tx: Sender<Control>,
    thread: Option<JoinHandle<SessionEngine>>,
}

impl SessionHandle {
    pub fn spawn(engine: SessionEngine) -> Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("session-engine".to_string())
            .spawn(move || run(engine, rx))?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    pub fn start(&self) -> Result<()> {
        self.request(Control::Start)?
    }

    /// Apply bpm, cue and note then start, in one step on the engine thread.
    /// Rejected untouched while a run is live. `bpm` must already be
    /// validated.
    pub fn start_with(&self, bpm: u32, cue: CueId, before_note: Option<String>) -> Result<()> {
        self.request(|reply| Control::StartWith {
            bpm,
            cue,
            before_note,
            reply,
        })?
    }

    pub fn stop(&self) -> Result<Option<SessionHistoryRecord>> {
        self.request(Control::Stop)?
    }

    /// `bpm` must already be validated.
    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        self.send(Control::SetBpm(bpm))
    }

    pub fn set_cue(&self, cue: CueId) -> Result<()> {
        self.send(Control::SetCue(cue))
    }

    pub fn set_before_note(&self, note: Option<String>) -> Result<()> {
        self.send(Control::SetBeforeNote(note))
    }

    pub fn clear_before_note(&self) -> Result<()> {
        self.send(Control::SetBeforeNote(None))
    }

    pub fn preview_cue(&self, side: Channel) -> Result<()> {
        self.send(Control::PreviewCue(side))
    }

    pub fn subscribe(&self) -> Result<Receiver<SessionEvent>> {
        self.request(Control::Subscribe)
    }

    pub fn phase(&self) -> Result<SessionPhase> {
        self.request(Control::Phase)
    }

    pub fn history(&self) -> Result<Vec<SessionHistoryRecord>> {
        self.request(Control::History)
    }

    /// Stop the loop and get the engine back. A run still in progress is torn
    /// down without a history record.
    pub fn shutdown(mut self) -> Result<SessionEngine> {
        let _ = self.tx.send(Control::Shutdown);
        let thread = self.thread.take().ok_or(SessionError::RuntimeStopped)?;
        thread.join().map_err(|_| SessionError::RuntimeStopped)
    }

    fn send(&self, cmd: Control) -> Result<()> {
        self.tx.send(cmd).map_err(|_| SessionError::RuntimeStopped)
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Control) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(make(reply_tx))?;
        reply_rx.recv().map_err(|_| SessionError::RuntimeStopped)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Control::Shutdown);
            let _ = thread.join();
        }
    }
}

fn run(mut engine: SessionEngine, rx: Receiver<Control>) -> SessionEngine {
    debug!("session loop started");
    loop {
        let oscillation = engine.oscillation_timer().cloned().unwrap_or_else(never);
        let seconds = engine.duration_timer().cloned().unwrap_or_else(never);

        select! {
            recv(rx) -> msg => match msg {
                Ok(Control::Shutdown) | Err(_) => break,
                Ok(cmd) => handle(&mut engine, cmd),
            },
            recv(oscillation) -> _ => engine.on_oscillation_tick(),
            recv(seconds) -> _ => engine.on_duration_tick(),
        }
    }
    engine.teardown();
    info!("session loop finished");
    engine
}

fn handle(engine: &mut SessionEngine, cmd: Control) {
    match cmd {
        Control::Start(reply) => {
            let _ = reply.send(engine.start());
        }
        Control::StartWith {
            bpm,
            cue,
            before_note,
            reply,
        } => {
            let _ = reply.send(engine.start_with(bpm, cue, before_note));
        }
        Control::Stop(reply) => {
            let _ = reply.send(engine.stop());
        }
        Control::SetBpm(bpm) => engine.set_bpm(bpm),
        Control::SetCue(cue) => engine.set_cue(cue),
        Control::SetBeforeNote(note) => engine.set_before_note(note),
        Control::PreviewCue(side) => engine.preview_cue(side),
        Control::Subscribe(reply) => {
            let _ = reply.send(engine.subscribe());
        }
        Control::Phase(reply) => {
            let _ = reply.send(engine.phase());
        }
        Control::History(reply) => {
            let _ = reply.send(engine.history().to_vec());
        }
        Control::Shutdown => {}
    }
}
