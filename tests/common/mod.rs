//! Shared test utilities

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voxarm::agent::{Conversation, Planner, RobotResponse, Session};
use voxarm::voice::{FrameSource, SegmenterConfig, Speaker, Transcriber};
use voxarm::world::{CommandDispatcher, WorldModel, WorldSettings};
use voxarm::{Error, InstantClock, Result};

/// Samples per frame under [`test_segmenter`]
pub const FRAME_LEN: usize = 160;

/// Small, fast segmentation: 100 ms frames of 160 samples, 3 quiet frames
/// end an utterance, 20 frames is the ceiling
#[must_use]
pub fn test_segmenter() -> SegmenterConfig {
    SegmenterConfig {
        sample_rate: 1600,
        frame_duration: Duration::from_millis(100),
        min_volume: 0.05,
        max_silence: Duration::from_millis(300),
        max_duration: Duration::from_secs(2),
    }
}

/// One frame of a 440 Hz tone
#[must_use]
pub fn loud_frame() -> Vec<f32> {
    (0..FRAME_LEN)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / 1600.0;
            0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

#[must_use]
pub fn quiet_frame() -> Vec<f32> {
    vec![0.001; FRAME_LEN]
}

/// Start/stop bookkeeping visible after the source is moved away
#[derive(Debug, Default)]
pub struct SourceStats {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub running: AtomicBool,
}

impl SourceStats {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Hands out one queued chunk per drain while running
pub struct ScriptedSource {
    chunks: VecDeque<Vec<f32>>,
    stats: Arc<SourceStats>,
    fail_start: bool,
}

impl ScriptedSource {
    pub fn new(chunks: impl IntoIterator<Item = Vec<f32>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            stats: Arc::default(),
            fail_start: false,
        }
    }

    /// A source whose device cannot be opened
    pub fn broken() -> Self {
        Self {
            fail_start: true,
            ..Self::new([])
        }
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl FrameSource for ScriptedSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(Error::Resource("no input device available".to_string()));
        }
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        self.stats.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stats.running.swap(false, Ordering::SeqCst) {
            self.stats.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn drain(&mut self) -> Vec<f32> {
        if self.stats.running() {
            self.chunks.pop_front().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn sample_rate(&self) -> u32 {
        1600
    }
}

/// Returns queued transcripts in order; an exhausted queue is a failure
#[derive(Default)]
pub struct ScriptedTranscriber {
    replies: Mutex<VecDeque<Result<String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, wav: &[u8], _language: Option<&str>) -> Result<String> {
        assert!(wav.starts_with(b"RIFF"), "transcriber expects WAV input");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Recognition("empty transcript".to_string())))
    }
}

/// Replies with queued responses and records what it was asked
#[derive(Default)]
pub struct ScriptedPlanner {
    replies: Mutex<VecDeque<Result<RobotResponse>>>,
    pub seen: Mutex<Vec<(usize, String)>>,
}

impl ScriptedPlanner {
    pub fn new(replies: impl IntoIterator<Item = RobotResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            seen: Mutex::default(),
        }
    }

    /// A planner that is always unreachable
    pub fn offline() -> Self {
        Self::default()
    }

    /// History length and world summary passed on each call
    pub fn seen(&self) -> Vec<(usize, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(
        &self,
        conversation: &Conversation,
        world_summary: &str,
    ) -> Result<RobotResponse> {
        self.seen
            .lock()
            .unwrap()
            .push((conversation.len(), world_summary.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Planning("planner unreachable".to_string())))
    }
}

/// Remembers every spoken line
#[derive(Default)]
pub struct RecordingSpeaker {
    lines: RefCell<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }
}

/// Session on the seeded world with instant actuation
pub fn test_session(planner: ScriptedPlanner) -> Session<ScriptedPlanner, RecordingSpeaker> {
    Session::new(
        "Jarvis",
        planner,
        RecordingSpeaker::default(),
        CommandDispatcher::new(Arc::new(InstantClock::new())),
        WorldModel::seeded(WorldSettings::default()),
    )
}
