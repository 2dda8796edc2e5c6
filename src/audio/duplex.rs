use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use audio_thread_priority::RtPriorityHandle;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use serde::Serialize;

use crate::config::FirStreamConfig;
use crate::error::{FirError, Result, StreamFault};
use crate::processing::{BlockStatus, StreamOrchestrator, StreamState};

/// Block periods `close` waits for the playback callback to stop
const STOP_WAIT_BLOCKS: u32 = 8;

/// Notification from the audio callbacks to the control thread
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The orchestrator entered `Faulted`
    Faulted(StreamFault),
    /// The backend reported the device gone
    DeviceLost,
    /// Recoverable backend error
    Backend(String),
}

/// Counters shared with the callbacks
#[derive(Debug, Default)]
struct StreamStatus {
    processed: AtomicU64,
    late: AtomicU64,
    degraded: AtomicU64,
    underruns: AtomicU64,
    overflows: AtomicU64,
}

/// Point-in-time copy of the stream counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusSnapshot {
    pub processed: u64,
    pub late: u64,
    pub degraded: u64,
    pub underruns: u64,
    pub overflows: u64,
}

/// Stop handshake between the control thread and the playback callback
#[derive(Debug, Default)]
struct StopSignal {
    requested: AtomicBool,
    acknowledged: AtomicBool,
}

/// Playback side of the duplex stream: pops captured blocks and runs the
/// orchestrator, which it owns
struct PlaybackCallback<C> {
    orchestrator: StreamOrchestrator,
    consumer: C,
    input_block: Vec<f32>,
    status: Arc<StreamStatus>,
    device_lost: Arc<AtomicBool>,
    stop: Arc<StopSignal>,
    events: Sender<StreamEvent>,
    reported: bool,
}

impl<C: Consumer<Item = f32>> PlaybackCallback<C> {
    fn render(&mut self, data: &mut [f32]) {
        if self.stop.requested.load(Ordering::Acquire) {
            if !self.stop.acknowledged.load(Ordering::Relaxed) {
                if let Err(e) = self.orchestrator.stop() {
                    log::debug!("Stop: {}", e);
                }
                self.stop.acknowledged.store(true, Ordering::Release);
            }
            data.fill(0.0);
            return;
        }

        let block_len = self.input_block.len();
        let status = if self.device_lost.load(Ordering::Relaxed) {
            self.orchestrator.degrade(StreamFault::DeviceLost, data)
        } else if self.consumer.occupied_len() >= block_len {
            self.consumer.pop_slice(&mut self.input_block);
            self.orchestrator.process(&self.input_block, data)
        } else {
            self.status.underruns.fetch_add(1, Ordering::Relaxed);
            self.orchestrator.degrade(StreamFault::InputUnderrun, data)
        };

        let counter = match status {
            BlockStatus::Processed => &self.status.processed,
            BlockStatus::Late => &self.status.late,
            BlockStatus::Degraded(_) | BlockStatus::Silent => &self.status.degraded,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if !self.reported && self.orchestrator.state() == StreamState::Faulted {
            self.reported = true;
            let fault = self.orchestrator.fault().unwrap_or(StreamFault::Device);
            notify(&self.events, StreamEvent::Faulted(fault));
        }
    }
}

fn notify(tx: &Sender<StreamEvent>, event: StreamEvent) {
    if let Err(TrySendError::Full(event)) = tx.try_send(event) {
        log::debug!("Event queue full, dropped {:?}", event);
    }
}

/// Capture and playback on the default devices with the filter in between
///
/// The capture callback pushes interleaved samples into a lock-free ring.
/// The playback callback pops one block per call and runs the orchestrator,
/// which it owns. Dropping the handle stops both streams.
pub struct DuplexStream {
    input: cpal::Stream,
    output: cpal::Stream,
    status: Arc<StreamStatus>,
    device_lost: Arc<AtomicBool>,
    stop: Arc<StopSignal>,
    block_duration: Duration,
    events: Receiver<StreamEvent>,
    _rt_handle: Option<RtPriorityHandle>,
}

impl DuplexStream {
    pub fn open(config: &FirStreamConfig, mut orchestrator: StreamOrchestrator) -> Result<Self> {
        let host = cpal::default_host();
        let input_device = host
            .default_input_device()
            .ok_or_else(|| FirError::AudioDevice("No input device found".into()))?;
        let output_device = host
            .default_output_device()
            .ok_or_else(|| FirError::AudioDevice("No output device found".into()))?;

        match input_device.description() {
            Ok(desc) => log::info!("Input device: {:?}", desc),
            Err(_) => log::info!("Input device: Unknown"),
        }
        match output_device.description() {
            Ok(desc) => log::info!("Output device: {:?}", desc),
            Err(_) => log::info!("Output device: Unknown"),
        }

        let audio = &config.audio;
        let stream_config = cpal::StreamConfig {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(audio.block_size as u32),
        };

        let block_len = audio.block_size * audio.channels as usize;
        let ring = HeapRb::<f32>::new(block_len * config.stream.input_ring_blocks);
        let (mut producer, consumer) = ring.split();
        // One block of lead so playback does not start on an underrun
        producer.push_slice(&vec![0.0f32; block_len]);

        let status = Arc::new(StreamStatus::default());
        let device_lost = Arc::new(AtomicBool::new(false));
        let (event_tx, events) = crossbeam_channel::bounded(16);

        let input_status = Arc::clone(&status);
        let input = input_device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if producer.push_slice(data) < data.len() {
                        input_status.overflows.fetch_add(1, Ordering::Relaxed);
                    }
                },
                error_callback(Arc::clone(&device_lost), event_tx.clone()),
                None,
            )
            .map_err(|e| FirError::AudioStream(format!("{}", e)))?;

        let stop = Arc::new(StopSignal::default());
        orchestrator.start()?;
        let mut playback = PlaybackCallback {
            orchestrator,
            consumer,
            input_block: vec![0.0f32; block_len],
            status: Arc::clone(&status),
            device_lost: Arc::clone(&device_lost),
            stop: Arc::clone(&stop),
            events: event_tx.clone(),
            reported: false,
        };

        let output = output_device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.render(data),
                error_callback(Arc::clone(&device_lost), event_tx),
                None,
            )
            .map_err(|e| FirError::AudioStream(format!("{}", e)))?;

        // Attempt to promote to real-time priority
        let rt_handle = match audio_thread_priority::promote_current_thread_to_real_time(
            audio.block_size as u32,
            audio.sample_rate,
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not set real-time priority: {}", e);
                None
            }
        };

        input
            .play()
            .map_err(|e| FirError::AudioStream(format!("{}", e)))?;
        output
            .play()
            .map_err(|e| FirError::AudioStream(format!("{}", e)))?;

        Ok(Self {
            input,
            output,
            status,
            device_lost,
            stop,
            block_duration: audio.block_duration(),
            events,
            _rt_handle: rt_handle,
        })
    }

    /// Fault and device notifications from the callbacks
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }

    pub fn device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            processed: self.status.processed.load(Ordering::Relaxed),
            late: self.status.late.load(Ordering::Relaxed),
            degraded: self.status.degraded.load(Ordering::Relaxed),
            underruns: self.status.underruns.load(Ordering::Relaxed),
            overflows: self.status.overflows.load(Ordering::Relaxed),
        }
    }

    /// Move the orchestrator to `Stopped`, then stop both streams
    ///
    /// Waits a few block periods for the playback callback to acknowledge;
    /// a stalled device is closed regardless.
    pub fn close(self) -> StatusSnapshot {
        self.stop.requested.store(true, Ordering::Release);
        let deadline = Instant::now() + self.block_duration * STOP_WAIT_BLOCKS;
        while !self.stop.acknowledged.load(Ordering::Acquire) && Instant::now() < deadline {
            std::thread::sleep(self.block_duration / 4);
        }
        if !self.stop.acknowledged.load(Ordering::Acquire) {
            log::warn!("Playback callback did not acknowledge stop");
        }

        let status = self.status();
        drop(self);
        status
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        let _ = self.input.pause();
        let _ = self.output.pause();
    }
}

fn error_callback(
    device_lost: Arc<AtomicBool>,
    tx: Sender<StreamEvent>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            if !device_lost.swap(true, Ordering::Relaxed) {
                log::error!("Audio device not available");
                notify(&tx, StreamEvent::DeviceLost);
            }
        }
        other => {
            log::warn!("Audio stream error: {}", other);
            notify(&tx, StreamEvent::Backend(other.to_string()));
        }
    }
}
