//! Cue emission.
//!
//! The session never waits on audio: an emitter either hands a freshly built
//! voice to the output callback or quietly drops it.

use parking_lot::Mutex;
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use tracing::debug;

use crate::command::Command;
use crate::models::Channel;
use crate::profiles::SoundProfile;
use crate::voices::CueVoice;

pub trait CueEmitter: Send + Sync {
    /// Play one cue on `side`. Fire-and-forget: failures are swallowed.
    fn emit(&self, profile: &SoundProfile, side: Channel);
}

/// Feeds cue voices into a running cpal stream through a lock-free ring.
pub struct StreamEmitter {
    producer: Mutex<HeapProd<Command>>,
    sample_rate: f32,
}

impl StreamEmitter {
    pub fn new(producer: HeapProd<Command>, sample_rate: u32) -> Self {
        Self {
            producer: Mutex::new(producer),
            sample_rate: sample_rate as f32,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }

    pub fn set_master_gain(&self, gain: f32) {
        if self.producer.lock().try_push(Command::SetMasterGain(gain)).is_err() {
            debug!(gain, "command queue full, gain change dropped");
        }
    }
}

impl CueEmitter for StreamEmitter {
    fn emit(&self, profile: &SoundProfile, side: Channel) {
        let voice = CueVoice::new(profile, side, self.sample_rate);
        if self.producer.lock().try_push(Command::Trigger(voice)).is_err() {
            debug!(cue = profile.name, ?side, "command queue full, cue dropped");
        }
    }
}

/// Used when no output device could be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl CueEmitter for NullEmitter {
    fn emit(&self, profile: &SoundProfile, side: Channel) {
        debug!(cue = profile.name, ?side, "audio unavailable, cue skipped");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::profiles::CueId;
    use std::sync::Arc;

    /// Remembers every emission for assertions.
    #[derive(Default, Clone)]
    pub struct RecordingEmitter {
        pub emitted: Arc<Mutex<Vec<(CueId, Channel)>>>,
    }

    impl RecordingEmitter {
        pub fn sides(&self) -> Vec<Channel> {
            self.emitted.lock().iter().map(|(_, side)| *side).collect()
        }

        pub fn len(&self) -> usize {
            self.emitted.lock().len()
        }
    }

    impl CueEmitter for RecordingEmitter {
        fn emit(&self, profile: &SoundProfile, side: Channel) {
            self.emitted.lock().push((profile.id, side));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::CueMixer;
    use crate::profiles::{profile, CueId};
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::HeapRb;

    #[test]
    fn stream_emitter_queues_voices_for_the_callback() {
        let (prod, mut cons) = HeapRb::<Command>::new(4).split();
        let emitter = StreamEmitter::new(prod, 44_100);
        emitter.emit(profile(CueId::Bell), Channel::Left);
        emitter.emit(profile(CueId::Bell), Channel::Right);

        let mut mixer = CueMixer::new(1.0);
        while let Some(cmd) = cons.try_pop() {
            mixer.handle_command(cmd);
        }
        assert_eq!(mixer.active_voices(), 2);
    }

    #[test]
    fn full_queue_drops_cues_without_panicking() {
        let (prod, mut cons) = HeapRb::<Command>::new(2).split();
        let emitter = StreamEmitter::new(prod, 44_100);
        for _ in 0..10 {
            emitter.emit(profile(CueId::Click), Channel::Left);
        }
        emitter.set_master_gain(0.2);
        let mut queued = 0;
        while cons.try_pop().is_some() {
            queued += 1;
        }
        assert_eq!(queued, 2);
    }

    #[test]
    fn null_emitter_is_silent() {
        NullEmitter.emit(profile(CueId::Drum), Channel::Right);
    }
}
