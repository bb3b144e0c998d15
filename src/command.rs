use crate::voices::CueVoice;

/// Messages from the control side into the audio callback.
pub enum Command {
    Trigger(CueVoice),
    SetMasterGain(f32),
}
