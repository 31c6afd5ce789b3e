//! Audio capture from microphone

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Anything that delivers mono samples while started
///
/// `drain` must never block the producer; it only swaps out what has
/// accumulated since the last call.
pub trait FrameSource {
    /// Begin producing samples
    ///
    /// # Errors
    ///
    /// Returns error if the underlying device cannot be opened
    fn start(&mut self) -> Result<()>;

    /// Stop producing samples and release the device
    fn stop(&mut self);

    /// Samples accumulated since the previous drain
    fn drain(&mut self) -> Vec<f32>;

    /// Sample rate of delivered audio
    fn sample_rate(&self) -> u32;
}

/// Keeps a source running for a scope and stops it on drop
///
/// Dropping covers early returns, errors and a cancelled future alike.
pub struct ActiveSource<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> ActiveSource<'a, S> {
    /// Start `source` and tie its lifetime to the returned guard
    ///
    /// # Errors
    ///
    /// Returns error if the source fails to start
    pub fn start(source: &'a mut S) -> Result<Self> {
        source.start()?;
        Ok(Self { source })
    }

    pub fn drain(&mut self) -> Vec<f32> {
        self.source.drain()
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }
}

impl<S: FrameSource + ?Sized> Drop for ActiveSource<'_, S> {
    fn drop(&mut self) {
        self.source.stop();
    }
}

/// Captures audio from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Resource("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Resource(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Resource("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Get captured audio buffer without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl FrameSource for AudioCapture {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        // Audio from before this start must not leak into the new capture
        self.clear_buffer();
        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Resource("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // The consumer only holds this lock for a swap
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Resource(e.to_string()))?;

        stream.play().map_err(|e| Error::Resource(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    fn drain(&mut self) -> Vec<f32> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
