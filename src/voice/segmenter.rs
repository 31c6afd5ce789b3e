//! Volume-based utterance segmentation
//!
//! Two states. `Idle` drops frames until one is louder than `min_volume`;
//! that frame opens an utterance and every following frame is appended,
//! loud or not. A run of quiet frames lasting `max_silence` closes the
//! utterance, silent tail included. `max_duration` closes it regardless.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::{AudioFrame, Utterance};
use crate::{Error, Result};

/// Tolerance when converting durations to whole frame counts
const FRAME_ROUNDING: f64 = 1e-9;

/// Segmentation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Length of one frame
    pub frame_duration: Duration,

    /// Mean absolute amplitude a frame must exceed to count as speech
    pub min_volume: f32,

    /// Quiet time that ends an utterance
    pub max_silence: Duration,

    /// Hard ceiling on one utterance
    pub max_duration: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_duration: Duration::from_millis(100),
            min_volume: 0.012,
            max_silence: Duration::from_millis(1500),
            max_duration: Duration::from_secs(10),
        }
    }
}

impl SegmenterConfig {
    /// Samples per frame
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn frame_len(&self) -> usize {
        (f64::from(self.sample_rate) * self.frame_duration.as_secs_f64()).round() as usize
    }

    /// Consecutive quiet frames that close an utterance
    #[must_use]
    pub fn silence_frames(&self) -> usize {
        self.frames_for(self.max_silence)
    }

    /// Frames after which an utterance is closed no matter what
    #[must_use]
    pub fn max_frames(&self) -> usize {
        self.frames_for(self.max_duration)
    }

    /// Smallest frame count whose total length reaches `span`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn frames_for(&self, span: Duration) -> usize {
        let ratio = span.as_secs_f64() / self.frame_duration.as_secs_f64();
        ((ratio - FRAME_ROUNDING).ceil() as usize).max(1)
    }

    /// # Errors
    ///
    /// Returns error for zero durations, a silence window longer than the
    /// ceiling, or a threshold outside `[0, 1)`
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        if self.frame_duration.is_zero() || self.frame_len() == 0 {
            return Err(Error::Config("frame duration must be positive".to_string()));
        }
        if self.max_silence.is_zero() || self.max_duration.is_zero() {
            return Err(Error::Config(
                "silence and duration limits must be positive".to_string(),
            ));
        }
        if self.max_silence > self.max_duration {
            return Err(Error::Config(
                "max silence must not exceed max duration".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_volume) {
            return Err(Error::Config(format!(
                "min volume {} must be within [0, 1)",
                self.min_volume
            )));
        }
        Ok(())
    }
}

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for a loud frame
    Idle,
    /// Buffering an utterance
    Capturing,
}

/// Turns a frame stream into utterances
#[derive(Debug, Clone)]
pub struct AudioSegmenter {
    config: SegmenterConfig,
    state: SegmenterState,
    buffer: Vec<AudioFrame>,
    silent_run: usize,
    silence_frames: usize,
    max_frames: usize,
}

impl AudioSegmenter {
    #[must_use]
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            silence_frames: config.silence_frames(),
            max_frames: config.max_frames(),
            config,
            state: SegmenterState::Idle,
            buffer: Vec::new(),
            silent_run: 0,
        }
    }

    /// Feed one frame; returns an utterance when this frame closes one
    pub fn push(&mut self, frame: AudioFrame) -> Option<Utterance> {
        let loud = frame.energy() > self.config.min_volume;

        match self.state {
            SegmenterState::Idle => {
                if !loud {
                    return None;
                }
                tracing::trace!(energy = frame.energy(), "speech started");
                self.state = SegmenterState::Capturing;
                self.buffer.clear();
                self.buffer.push(frame);
                self.silent_run = 0;
            }
            SegmenterState::Capturing => {
                self.buffer.push(frame);
                if loud {
                    self.silent_run = 0;
                } else {
                    self.silent_run += 1;
                }
            }
        }

        if self.silent_run >= self.silence_frames {
            tracing::debug!(
                frames = self.buffer.len(),
                silent = self.silent_run,
                "utterance closed by silence"
            );
            return self.emit();
        }
        if self.buffer.len() >= self.max_frames {
            tracing::debug!(frames = self.buffer.len(), "utterance closed by duration ceiling");
            return self.emit();
        }

        None
    }

    /// End of stream: hand over a partial utterance if one is open
    pub fn finish(&mut self) -> Option<Utterance> {
        match self.state {
            SegmenterState::Idle => None,
            SegmenterState::Capturing => {
                tracing::debug!(frames = self.buffer.len(), "utterance closed by end of stream");
                self.emit()
            }
        }
    }

    /// Drop any buffered audio and go back to `Idle`
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.buffer.clear();
        self.silent_run = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Frames buffered so far
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn emit(&mut self) -> Option<Utterance> {
        self.state = SegmenterState::Idle;
        self.silent_run = 0;
        let frames = std::mem::take(&mut self.buffer);
        (!frames.is_empty()).then(|| Utterance::new(frames, self.config.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32) -> AudioFrame {
        AudioFrame::new(vec![level; 160])
    }

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            sample_rate: 1600,
            frame_duration: Duration::from_millis(100),
            min_volume: 0.05,
            max_silence: Duration::from_millis(300),
            max_duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_frame_counts() {
        let cfg = SegmenterConfig::default();
        assert_eq!(cfg.frame_len(), 1600);
        assert_eq!(cfg.silence_frames(), 15);
        assert_eq!(cfg.max_frames(), 100);

        let odd = SegmenterConfig {
            max_silence: Duration::from_millis(250),
            ..cfg
        };
        assert_eq!(odd.silence_frames(), 3);
    }

    #[test]
    fn test_validate() {
        assert!(SegmenterConfig::default().validate().is_ok());
        let inverted = SegmenterConfig {
            max_silence: Duration::from_secs(20),
            ..SegmenterConfig::default()
        };
        assert!(inverted.validate().is_err());
        let zero = SegmenterConfig {
            frame_duration: Duration::ZERO,
            ..SegmenterConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut seg = AudioSegmenter::new(config());
        assert!(seg.push(frame(0.05)).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
        assert!(seg.push(frame(0.06)).is_none());
        assert_eq!(seg.state(), SegmenterState::Capturing);
    }

    #[test]
    fn test_loud_frame_resets_silence_run() {
        let mut seg = AudioSegmenter::new(config());
        seg.push(frame(0.3));
        seg.push(frame(0.0));
        seg.push(frame(0.0));
        seg.push(frame(0.3));
        seg.push(frame(0.0));
        assert!(seg.push(frame(0.0)).is_none());
        let utterance = seg.push(frame(0.0)).unwrap();
        assert_eq!(utterance.frame_count(), 7);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_finish_and_reset() {
        let mut seg = AudioSegmenter::new(config());
        assert!(seg.finish().is_none());

        seg.push(frame(0.3));
        seg.push(frame(0.3));
        assert_eq!(seg.finish().map(|u| u.frame_count()), Some(2));

        seg.push(frame(0.3));
        seg.reset();
        assert_eq!(seg.buffered(), 0);
        assert!(seg.finish().is_none());
    }
}
