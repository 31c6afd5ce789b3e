//! Polling loop that turns a live source into one utterance

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::capture::{ActiveSource, FrameSource};
use super::frame::{FrameChunker, Utterance};
use super::segmenter::{AudioSegmenter, SegmenterConfig};
use crate::Result;

/// Capture until one utterance is complete or `timeout` elapses
///
/// The source runs only for the duration of this call and is stopped on
/// every exit path, including when the returned future is dropped. Frames
/// are checked once per frame duration, so boundaries are detected at most
/// one frame late. On timeout a partially captured utterance is returned;
/// if no speech started, `None`.
///
/// # Errors
///
/// Returns error if the source cannot be started
pub async fn listen<S: FrameSource + ?Sized>(
    source: &mut S,
    config: &SegmenterConfig,
    timeout: Duration,
) -> Result<Option<Utterance>> {
    let mut active = ActiveSource::start(source)?;
    if active.sample_rate() != config.sample_rate {
        tracing::warn!(
            source = active.sample_rate(),
            configured = config.sample_rate,
            "source sample rate differs from segmenter config"
        );
    }

    let mut chunker = FrameChunker::new(config.frame_len());
    let mut segmenter = AudioSegmenter::new(*config);
    let deadline = Instant::now() + timeout;

    let mut ticker = tokio::time::interval(config.frame_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(timeout_ms = timeout.as_millis(), "listening");

    loop {
        ticker.tick().await;

        for frame in chunker.push(&active.drain()) {
            if let Some(utterance) = segmenter.push(frame) {
                tracing::debug!(
                    frames = utterance.frame_count(),
                    duration_ms = utterance.duration().as_millis(),
                    "utterance captured"
                );
                return Ok(Some(utterance));
            }
        }

        if Instant::now() >= deadline {
            let partial = segmenter.finish();
            tracing::debug!(captured = partial.is_some(), "listen timed out");
            return Ok(partial);
        }
    }
}
