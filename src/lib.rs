//! voxarm - Voice control for a simulated robot arm
//!
//! This library provides the pieces of the voice-to-motion pipeline:
//! - Voice processing (segmentation, wake phrase matching, STT, TTS)
//! - Planning through a chat model that answers with structured directives
//! - A deterministic world model and the dispatcher that executes plans
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Voice                          │
//! │  Capture │ Segmenter │ Wake Phrase │ STT │ TTS      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ text
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Agent                           │
//! │  Conversation │ Planner │ Session                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ directives
//! ┌────────────────────▼────────────────────────────────┐
//! │                     World                           │
//! │  Dispatcher │ World Model │ Clock                   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod voice;
pub mod world;

pub use agent::{Planner, RobotResponse, Session, Turn};
pub use clock::{Clock, InstantClock, TokioClock};
pub use config::Config;
pub use daemon::{CycleOutcome, Daemon, VoiceLoop};
pub use error::{DirectiveError, Error, Result};
pub use world::{ActionDirective, CommandDispatcher, ExecutionReport, WorldModel};
