use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::WavReader;

use crate::error::Result;

/// Interleaved samples of a whole WAV file, normalised to [-1, 1]
pub struct WavFileSource {
    samples: Vec<f32>,
    position: usize,
    channels: u16,
    sample_rate: u32,
}

impl WavFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();
        let samples = Self::read_samples(reader, &spec)?;

        log::info!(
            "Loaded {}: {} ch, {} Hz, {} frames",
            path.as_ref().display(),
            spec.channels,
            spec.sample_rate,
            samples.len() / spec.channels.max(1) as usize
        );

        Ok(Self {
            samples,
            position: 0,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }

    fn read_samples(
        mut reader: WavReader<BufReader<File>>,
        spec: &hound::WavSpec,
    ) -> Result<Vec<f32>> {
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_val = 2_i64.pow(spec.bits_per_sample as u32 - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(samples)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// All interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Next `frames` interleaved frames; the last block may be shorter
    pub fn next_block(&mut self, frames: usize) -> Option<&[f32]> {
        if self.position >= self.samples.len() {
            return None;
        }

        let end = (self.position + frames * self.channels as usize).min(self.samples.len());
        let block = &self.samples[self.position..end];
        self.position = end;
        Some(block)
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::save_wav;

    #[test]
    fn test_wav_round_trip_in_blocks() {
        let path = std::env::temp_dir().join(format!("firstream_source_{}.wav", std::process::id()));
        let samples: Vec<f32> = (0..30).map(|i| i as f32 / 100.0).collect();
        save_wav(&path, &samples, 48000, 3).unwrap();

        let mut source = WavFileSource::open(&path).unwrap();
        assert_eq!(source.channels(), 3);
        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.frames(), 10);

        let mut blocks = Vec::new();
        while let Some(block) = source.next_block(4) {
            blocks.push(block.len());
        }
        assert_eq!(blocks, vec![12, 12, 6]);

        source.rewind();
        assert_eq!(source.next_block(10).unwrap(), samples.as_slice());
        std::fs::remove_file(&path).ok();
    }
}
