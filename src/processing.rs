use std::time::{Duration, Instant};

use rolling_stats::Stats;
use serde::Serialize;

use crate::config::{DegradeMode, StreamConfig};
use crate::error::{FaultSeverity, FirError, Result, StreamFault};
use crate::session::StreamSession;

/// Lifecycle of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Idle,
    Streaming,
    Faulted,
    Stopped,
}

/// What happened to one output block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Filtered output
    Processed,
    /// Filtered output that missed its deadline
    Late,
    /// Repeated or silent output standing in for a failed block
    Degraded(StreamFault),
    /// Silence; the stream is not running
    Silent,
}

/// Summary of a rolling statistic
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSummary {
    pub count: usize,
    pub mean: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
}

impl StatsSummary {
    pub fn from_stats(stats: &Stats<f32>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

/// Counters kept by the orchestrator
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StreamCounters {
    pub processed_blocks: u64,
    pub degraded_blocks: u64,
    pub deadline_overruns: u64,
    pub transient_faults: u64,
}

/// Drives a [`StreamSession`] block by block
///
/// Owns the state machine, the degraded-output policy and block timing. In
/// any state other than `Streaming` every block is silence.
pub struct StreamOrchestrator {
    session: StreamSession,
    state: StreamState,
    degrade: DegradeMode,
    max_degraded_blocks: usize,
    consecutive_degraded: usize,
    last_output: Vec<f32>,
    last_output_len: usize,
    budget: Duration,
    block_time_us: Stats<f32>,
    counters: StreamCounters,
    fault: Option<StreamFault>,
}

impl StreamOrchestrator {
    pub fn new(session: StreamSession, config: &StreamConfig) -> Self {
        let capacity = session.max_output_frames() * session.num_channels();
        let budget = Duration::from_secs_f64(
            session.block_size() as f64 / session.sample_rate() as f64,
        );

        Self {
            session,
            state: StreamState::Idle,
            degrade: config.degrade,
            max_degraded_blocks: config.max_degraded_blocks,
            consecutive_degraded: 0,
            last_output: vec![0.0; capacity],
            last_output_len: 0,
            budget,
            block_time_us: Stats::new(),
            counters: StreamCounters::default(),
            fault: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Persistent fault that moved the stream to `Faulted`
    pub fn fault(&self) -> Option<StreamFault> {
        self.fault
    }

    pub fn counters(&self) -> StreamCounters {
        self.counters
    }

    /// Per-block processing time in microseconds
    pub fn block_timing(&self) -> Option<StatsSummary> {
        StatsSummary::from_stats(&self.block_time_us)
    }

    /// Real-time budget for one block
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Override the per-block deadline
    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }

    fn transition(&mut self, to: StreamState) -> Result<()> {
        use StreamState::*;
        let allowed = matches!(
            (self.state, to),
            (Idle, Streaming) | (Streaming, Stopped) | (Streaming, Faulted) | (Faulted, Stopped)
        );
        if !allowed {
            return Err(FirError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        log::debug!("Stream {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(StreamState::Streaming)?;
        log::info!(
            "Streaming: {} ch, block {} frames, budget {:.2} ms",
            self.session.num_channels(),
            self.session.block_size(),
            self.budget.as_secs_f64() * 1000.0
        );
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transition(StreamState::Stopped)
    }

    /// Move to `Faulted` with `fault` as the cause
    pub fn fail(&mut self, fault: StreamFault) -> Result<()> {
        self.transition(StreamState::Faulted)?;
        log::warn!("Stream faulted: {}", fault);
        self.fault = Some(fault);
        Ok(())
    }

    /// Produce one output block from one input block
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> BlockStatus {
        if self.state != StreamState::Streaming {
            output.fill(0.0);
            return BlockStatus::Silent;
        }

        let started = Instant::now();
        let result = self.session.process_block(input, output);
        let elapsed = started.elapsed();
        self.block_time_us.update(elapsed.as_secs_f32() * 1e6);

        match result {
            Ok(()) => {
                self.remember(output);
                self.counters.processed_blocks += 1;
                if elapsed > self.budget {
                    // The block is usable but late; it still counts against the budget
                    self.counters.deadline_overruns += 1;
                    if self.note_transient(StreamFault::DeadlineOverrun) {
                        self.escalate(output);
                        return BlockStatus::Silent;
                    }
                    BlockStatus::Late
                } else {
                    self.consecutive_degraded = 0;
                    BlockStatus::Processed
                }
            }
            Err(fault) => self.degrade(fault, output),
        }
    }

    /// Fill `output` for a block that could not be processed
    ///
    /// Transient faults repeat the last block or emit silence, up to
    /// `max_degraded_blocks` in a row. Persistent faults and an exhausted
    /// budget move the stream to `Faulted`.
    pub fn degrade(&mut self, fault: StreamFault, output: &mut [f32]) -> BlockStatus {
        if self.state != StreamState::Streaming {
            output.fill(0.0);
            return BlockStatus::Silent;
        }

        if fault.severity() == FaultSeverity::Persistent {
            output.fill(0.0);
            let _ = self.fail(fault);
            return BlockStatus::Silent;
        }

        if self.note_transient(fault) {
            self.escalate(output);
            return BlockStatus::Silent;
        }

        match self.degrade {
            DegradeMode::RepeatLast => {
                let n = self.last_output_len.min(output.len());
                output[..n].copy_from_slice(&self.last_output[..n]);
                output[n..].fill(0.0);
            }
            DegradeMode::Silence => output.fill(0.0),
        }
        self.counters.degraded_blocks += 1;
        BlockStatus::Degraded(fault)
    }

    /// Count a transient fault; true once the degraded budget is exceeded
    fn note_transient(&mut self, fault: StreamFault) -> bool {
        self.counters.transient_faults += 1;
        self.consecutive_degraded += 1;
        if self.consecutive_degraded == 1 {
            log::warn!("Transient stream fault: {}", fault);
        } else {
            log::debug!(
                "Transient stream fault: {} ({} in a row)",
                fault,
                self.consecutive_degraded
            );
        }
        self.consecutive_degraded > self.max_degraded_blocks
    }

    fn escalate(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let _ = self.fail(StreamFault::Exhausted {
            consecutive: self.consecutive_degraded,
        });
    }

    fn remember(&mut self, output: &[f32]) {
        let n = output.len().min(self.last_output.len());
        self.last_output[..n].copy_from_slice(&output[..n]);
        self.last_output_len = n;
    }

    /// Filter a whole interleaved signal in `block_size` chunks
    ///
    /// The final partial chunk is zero-padded; the output has the input's
    /// length. Stops early and returns the fault if the stream faults.
    pub fn process_signal(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let chunk_len = self.session.block_size() * self.session.num_channels();
        let mut output = vec![0.0f32; interleaved.len()];
        let mut input_block = vec![0.0f32; chunk_len];
        let mut output_block = vec![0.0f32; chunk_len];

        for (chunk, out) in interleaved
            .chunks(chunk_len)
            .zip(output.chunks_mut(chunk_len))
        {
            input_block[..chunk.len()].copy_from_slice(chunk);
            input_block[chunk.len()..].fill(0.0);

            self.process(&input_block, &mut output_block);
            if self.state == StreamState::Faulted {
                let fault = self.fault.unwrap_or(StreamFault::Device);
                return Err(FirError::StreamFault(fault));
            }
            out.copy_from_slice(&output_block[..out.len()]);
        }

        Ok(output)
    }
}
