//! cpal-backed microphone.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated worker
//! thread for the length of one recording and is dropped there on stop.

use crate::error::AppError;
use crate::managers::audio::{ChunkSender, MicrophoneSource};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use log::{debug, error, info};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const STREAM_START_TIMEOUT: Duration = Duration::from_secs(3);

struct Worker {
    stop_tx: mpsc::Sender<()>,
    join_handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct CpalMicrophone {
    worker: Option<Worker>,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self::default()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    sink: ChunkSender,
) -> Result<cpal::Stream, String>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| {
                        frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                    })
                    .collect();
                // Receiver is gone once the recording has been stopped.
                let _ = sink.send(mono);
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}

fn run_stream(
    sink: ChunkSender,
    ready_tx: mpsc::Sender<Result<u32, String>>,
    stop_rx: mpsc::Receiver<()>,
) -> Result<(), String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "No input device available".to_string())?;
    if let Ok(name) = device.name() {
        debug!("Using input device: {}", name);
    }

    let supported = device.default_input_config().map_err(|e| e.to_string())?;
    let config: StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0;

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, sink)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, sink)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, sink)?,
        other => return Err(format!("Unsupported sample format: {:?}", other)),
    };
    stream.play().map_err(|e| e.to_string())?;
    let _ = ready_tx.send(Ok(sample_rate));

    let _ = stop_rx.recv();
    drop(stream);
    Ok(())
}

impl MicrophoneSource for CpalMicrophone {
    fn open(&mut self, sink: ChunkSender) -> Result<u32, AppError> {
        self.close();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

        let join_handle = thread::spawn(move || {
            if let Err(err) = run_stream(sink, ready_tx.clone(), stop_rx) {
                let _ = ready_tx.send(Err(err));
            }
        });

        let started = match ready_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(result) => result,
            Err(_) => Err("Timed out starting the audio stream".to_string()),
        };

        match started {
            Ok(sample_rate) => {
                self.worker = Some(Worker {
                    stop_tx,
                    join_handle,
                });
                info!("Microphone opened at {} Hz", sample_rate);
                Ok(sample_rate)
            }
            Err(err) => {
                error!("Failed to open microphone: {}", err);
                // The worker may still be stuck in device start; it sees the
                // stop signal once that returns, so it is left to exit alone.
                let _ = stop_tx.send(());
                drop(join_handle);
                Err(AppError::DeviceAccess(err))
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.join_handle.join().is_err() {
                error!("Audio worker thread panicked");
            }
            debug!("Microphone released");
        }
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.close();
    }
}
