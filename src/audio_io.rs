use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam::channel::{bounded, Sender};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

use crate::command::Command;
use crate::emitter::StreamEmitter;
use crate::error::{Result, SessionError};
use crate::mixer::CueMixer;

/// Largest device block mixed in one pass; longer callbacks are mixed in
/// pieces so the scratch buffer never grows on the audio thread.
const MAX_BLOCK_FRAMES: usize = 4096;

/// Keeps the cpal stream alive on its own thread. Dropping it closes the device.
pub struct OutputStream {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl OutputStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Open the default output device and return the stream guard together with
/// an emitter that feeds it.
pub fn open_output(queue_capacity: usize, master_gain: f32) -> Result<(OutputStream, StreamEmitter)> {
    let (prod, cons) = HeapRb::<Command>::new(queue_capacity.max(1)).split();
    let (init_tx, init_rx) = bounded::<Result<u32>>(1);
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let thread = thread::Builder::new()
        .name("cue-output".to_string())
        .spawn(move || {
            let stream = match build_stream(cons, master_gain) {
                Ok((stream, rate)) => {
                    let _ = init_tx.send(Ok(rate));
                    stream
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let _ = stop_rx.recv();
            drop(stream);
            info!("audio output closed");
        })?;

    let sample_rate = init_rx
        .recv()
        .map_err(|_| SessionError::Audio("audio thread terminated during init".to_string()))??;

    info!(sample_rate, "audio output ready");
    Ok((
        OutputStream {
            stop_tx,
            thread: Some(thread),
            sample_rate,
        },
        StreamEmitter::new(prod, sample_rate),
    ))
}

fn build_stream(mut cons: HeapCons<Command>, master_gain: f32) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SessionError::Audio("no output device available".to_string()))?;
    let supported_config = device
        .default_output_config()
        .map_err(|e| SessionError::Audio(e.to_string()))?;
    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    if sample_format != SampleFormat::F32 {
        return Err(SessionError::Audio(format!(
            "unsupported sample format {sample_format:?}"
        )));
    }

    let mut mixer = CueMixer::new(master_gain);
    let mut stereo = vec![0.0f32; MAX_BLOCK_FRAMES * 2];
    let audio_callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        while let Some(cmd) = cons.try_pop() {
            mixer.handle_command(cmd);
        }
        fill_device_block(&mut mixer, &mut stereo, data, channels);
    };
    let err_fn = |err| error!("stream error: {err}");

    let stream = device
        .build_output_stream(&config, audio_callback, err_fn, None)
        .map_err(|e| SessionError::Audio(e.to_string()))?;
    stream
        .play()
        .map_err(|e| SessionError::Audio(e.to_string()))?;
    Ok((stream, sample_rate))
}

/// Mix into `out` through the fixed `stereo` scratch, one scratch-sized piece
/// at a time.
fn fill_device_block(mixer: &mut CueMixer, stereo: &mut [f32], out: &mut [f32], channels: usize) {
    let scratch_frames = stereo.len() / 2;
    if channels == 0 || scratch_frames == 0 {
        out.fill(0.0);
        return;
    }
    for piece in out.chunks_mut(scratch_frames * channels) {
        let frames = piece.len() / channels;
        let block = &mut stereo[..frames * 2];
        mixer.process_block(block);
        spread_stereo(block, piece, channels);
    }
}

/// Map interleaved stereo onto a device with `channels` outputs.
fn spread_stereo(stereo: &[f32], out: &mut [f32], channels: usize) {
    match channels {
        0 => {}
        1 => {
            for (o, frame) in out.iter_mut().zip(stereo.chunks_exact(2)) {
                *o = 0.5 * (frame[0] + frame[1]);
            }
        }
        n => {
            for (o, frame) in out.chunks_exact_mut(n).zip(stereo.chunks_exact(2)) {
                o[0] = frame[0];
                o[1] = frame[1];
                o[2..].fill(0.0);
            }
        }
    }
}
