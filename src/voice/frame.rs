//! Fixed-size audio frames and the utterances built from them

use std::time::Duration;

use crate::{Error, Result};

/// A block of mono samples in `[-1.0, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    energy: f32,
}

impl AudioFrame {
    #[must_use]
    pub fn new(samples: Vec<f32>) -> Self {
        let energy = mean_abs(&samples);
        Self { samples, energy }
    }

    /// Mean absolute amplitude
    #[must_use]
    pub const fn energy(&self) -> f32 {
        self.energy
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Speech bounded by a loud start frame and a silence run (or the ceiling)
///
/// Never empty; built only by the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    frames: Vec<AudioFrame>,
    sample_rate: u32,
}

impl Utterance {
    pub(crate) const fn new(frames: Vec<AudioFrame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    #[must_use]
    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// All samples, frame after frame
    #[must_use]
    pub fn samples(&self) -> Vec<f32> {
        self.frames
            .iter()
            .flat_map(|f| f.samples().iter().copied())
            .collect()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        let samples: usize = self.frames.iter().map(AudioFrame::len).sum();
        Duration::from_secs_f64(samples as f64 / f64::from(self.sample_rate))
    }

    /// Encode as 16-bit PCM mono WAV for STT APIs
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples(), self.sample_rate)
    }
}

/// Cuts arbitrary-length sample drains into equal frames
///
/// A partial tail is held back until the next drain completes it.
#[derive(Debug, Clone)]
pub struct FrameChunker {
    frame_len: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    /// # Panics
    ///
    /// Panics if `frame_len` is zero
    #[must_use]
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be positive");
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        }
    }

    /// Append samples and return every frame that is now complete
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);
        let complete = self.pending.len() / self.frame_len;
        let mut frames = Vec::with_capacity(complete);
        let mut rest = self.pending.split_off(complete * self.frame_len);
        std::mem::swap(&mut rest, &mut self.pending);
        for chunk in rest.chunks_exact(self.frame_len) {
            frames.push(AudioFrame::new(chunk.to_vec()));
        }
        frames
    }

    /// Samples waiting for a full frame
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Mean absolute amplitude of a block
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

/// Encoding happens in memory, so a failure costs one utterance, not the session
fn wav_error(err: hound::Error) -> Error {
    Error::Recognition(format!("wav encoding failed: {err}"))
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(wav_error)?;
        }

        writer
            .finalize()
            .map_err(wav_error)?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_failure_is_recoverable() {
        let err = wav_error(hound::Error::TooWide);
        assert!(matches!(err, Error::Recognition(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_energy_is_mean_absolute() {
        assert!(mean_abs(&[]).abs() < f32::EPSILON);
        let frame = AudioFrame::new(vec![0.5, -0.5, 0.25, -0.25]);
        assert!((frame.energy() - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_chunker_carries_partial_tail() {
        let mut chunker = FrameChunker::new(4);
        assert!(chunker.push(&[0.1; 3]).is_empty());
        assert_eq!(chunker.pending(), 3);

        let frames = chunker.push(&[0.2; 6]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[0.1, 0.1, 0.1, 0.2]);
        assert_eq!(frames[1].samples(), &[0.2; 4]);
        assert_eq!(chunker.pending(), 1);
    }

    #[test]
    fn test_utterance_duration_and_wav() {
        let frames = vec![AudioFrame::new(vec![0.1; 1600]); 5];
        let utterance = Utterance::new(frames, 16000);
        assert_eq!(utterance.duration(), Duration::from_millis(500));

        let wav = utterance.to_wav().unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 8000);
    }
}
