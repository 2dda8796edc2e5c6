/// How an update reconciled the incoming block with the expected length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Exact,
    /// The block was short by `missing` samples; the front was padded with its first sample
    Padded { missing: usize },
    /// The block was long by `dropped` samples; its oldest samples were discarded
    Truncated { dropped: usize },
}

impl UpdateOutcome {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }
}

/// Sliding window over the most recent upsampled samples of one channel
///
/// Holds `taps + block - 1` samples so a valid-mode convolution over the
/// whole window yields exactly one block of output. Every update advances
/// the window by exactly `block` samples.
pub struct ChannelRingBuffer {
    buffer: Vec<f32>,
    block: usize,
}

impl ChannelRingBuffer {
    pub fn new(num_taps: usize, block: usize) -> Self {
        Self {
            buffer: vec![0.0; num_taps + block - 1],
            block,
        }
    }

    /// Shift out the oldest `block` samples and append `new`
    ///
    /// A block of the wrong length is corrected at its least-recent edge so
    /// the newest samples always land at the end of the window.
    pub fn update(&mut self, new: &[f32]) -> UpdateOutcome {
        let m = self.block;
        let len = self.buffer.len();
        self.buffer.copy_within(m.., 0);
        let tail = &mut self.buffer[len - m..];

        if new.len() == m {
            tail.copy_from_slice(new);
            UpdateOutcome::Exact
        } else if new.len() > m {
            let dropped = new.len() - m;
            tail.copy_from_slice(&new[dropped..]);
            UpdateOutcome::Truncated { dropped }
        } else {
            let missing = m - new.len();
            let fill = new.first().copied().unwrap_or(0.0);
            tail[..missing].fill(fill);
            tail[missing..].copy_from_slice(new);
            UpdateOutcome::Padded { missing }
        }
    }

    /// Window contents, oldest first
    pub fn as_slice(&self) -> &[f32] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Samples appended per update
    pub fn block(&self) -> usize {
        self.block
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}
