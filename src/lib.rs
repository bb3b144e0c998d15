//! Bilateral stimulation backend.
//!
//! An oscillating marker bounces between the edges of a 0–100 track at a
//! chosen bpm; every bounce plays a short cue hard-panned to the side the
//! marker is now heading from. Sessions are timed and completed runs are kept
//! in a short history and handed to the journal.

#[cfg(not(target_arch = "wasm32"))]
pub mod audio_io;
pub mod command;
pub mod config;
pub mod dsp;
pub mod emitter;
pub mod error;
pub mod journal;
pub mod mixer;
pub mod models;
pub mod profiles;
pub mod render;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod voices;

pub use emitter::{CueEmitter, NullEmitter, StreamEmitter};
pub use error::{Result, SessionError};
pub use journal::{Journal, JournalSink};
pub use models::{validate_bpm, Channel, JournalEntry, JournalHandoff, SessionHistoryRecord};
pub use profiles::{profile, CueId, SoundProfile};
pub use runtime::SessionHandle;
pub use session::{SessionEngine, SessionEvent, SessionPhase};

#[cfg(feature = "python")]
mod python {
    use once_cell::sync::Lazy;
    use parking_lot::Mutex;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use std::sync::Arc;

    use crate::audio_io::{open_output, OutputStream};
    use crate::config::CONFIG;
    use crate::emitter::{CueEmitter, NullEmitter};
    use crate::journal::Journal;
    use crate::models::validate_bpm;
    use crate::profiles::CueId;
    use crate::runtime::SessionHandle;
    use crate::session::SessionEngine;
    use crate::SessionError;

    struct PySession {
        handle: SessionHandle,
        _output: Option<OutputStream>,
    }

    static SESSION: Lazy<Mutex<Option<PySession>>> = Lazy::new(|| Mutex::new(None));

    fn to_py(e: SessionError) -> PyErr {
        match e {
            SessionError::InvalidBpm(_) | SessionError::UnknownCue(_) => {
                PyValueError::new_err(e.to_string())
            }
            other => PyRuntimeError::new_err(other.to_string()),
        }
    }

    fn spawn_session(bpm: u32, cue: CueId) -> Result<PySession, SessionError> {
        let (output, emitter): (Option<OutputStream>, Arc<dyn CueEmitter>) =
            match open_output(CONFIG.cue_queue_capacity, CONFIG.master_gain) {
                Ok((output, emitter)) => (Some(output), Arc::new(emitter)),
                Err(e) => {
                    tracing::warn!("audio unavailable, running silent: {e}");
                    (None, Arc::new(NullEmitter))
                }
            };
        let engine = SessionEngine::new(bpm, cue, emitter, Box::new(Journal::new()));
        Ok(PySession {
            handle: SessionHandle::spawn(engine)?,
            _output: output,
        })
    }

    #[pyfunction]
    #[pyo3(signature = (bpm, cue=None, before_note=None))]
    fn start_session(bpm: u32, cue: Option<String>, before_note: Option<String>) -> PyResult<()> {
        let bpm = validate_bpm(bpm).map_err(to_py)?;
        let cue = match cue {
            Some(name) => name.parse::<CueId>().map_err(to_py)?,
            None => CONFIG.cue,
        };
        let mut guard = SESSION.lock();
        if guard.is_none() {
            *guard = Some(spawn_session(bpm, cue).map_err(to_py)?);
        }
        let session = guard
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("session unavailable"))?;
        session
            .handle
            .start_with(bpm, cue, before_note)
            .map_err(to_py)
    }

    /// Returns the recorded duration in seconds, or `None` for a zero-length run.
    #[pyfunction]
    fn stop_session() -> PyResult<Option<u64>> {
        let guard = SESSION.lock();
        let session = guard
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("no session started"))?;
        let record = session.handle.stop().map_err(to_py)?;
        Ok(record.map(|r| r.duration_seconds))
    }

    #[pyfunction]
    fn set_bpm(bpm: u32) -> PyResult<()> {
        let bpm = validate_bpm(bpm).map_err(to_py)?;
        if let Some(session) = SESSION.lock().as_ref() {
            session.handle.set_bpm(bpm).map_err(to_py)?;
        }
        Ok(())
    }

    #[pymodule]
    fn bilateral_backend(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(start_session, m)?)?;
        m.add_function(wrap_pyfunction!(stop_session, m)?)?;
        m.add_function(wrap_pyfunction!(set_bpm, m)?)?;
        Ok(())
    }
}
