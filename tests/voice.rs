//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::time::Duration;

use voxarm::agent::{ACK_LINE, DONE_LINE, GOODBYE_LINE, REPEAT_LINE, RobotResponse};
use voxarm::config::AudioConfig;
use voxarm::voice::{
    AudioSegmenter, FrameChunker, MatchTier, SegmenterState, WakePhraseMatcher, listen,
};
use voxarm::world::ActionDirective;
use voxarm::{CycleOutcome, Error, VoiceLoop};

mod common;

use common::{
    FRAME_LEN, ScriptedPlanner, ScriptedSource, ScriptedTranscriber, loud_frame, quiet_frame,
    test_segmenter, test_session,
};

/// A loud burst followed by enough quiet to close it
fn burst(loud: usize) -> Vec<Vec<f32>> {
    let mut chunks = vec![loud_frame(); loud];
    chunks.extend(vec![quiet_frame(); 3]);
    chunks
}

fn audio() -> AudioConfig {
    AudioConfig {
        segmenter: test_segmenter(),
        wake_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(1),
    }
}

fn pick_green() -> RobotResponse {
    RobotResponse {
        commands: vec![ActionDirective::new("pick").target("green_block")],
        ..RobotResponse::say("Picking up the green block.")
    }
}

#[test]
fn test_quiet_stream_never_emits() {
    let mut chunker = FrameChunker::new(FRAME_LEN);
    let mut segmenter = AudioSegmenter::new(test_segmenter());

    // Odd drain sizes exercise the carried tail
    let quiet: Vec<f32> = quiet_frame().into_iter().cycle().take(FRAME_LEN * 40).collect();
    for drain in quiet.chunks(97) {
        for frame in chunker.push(drain) {
            assert!(segmenter.push(frame).is_none());
        }
    }
    assert_eq!(segmenter.state(), SegmenterState::Idle);
    assert!(segmenter.finish().is_none());
}

#[test]
fn test_burst_then_silence_emits_once() {
    let mut segmenter = AudioSegmenter::new(test_segmenter());
    let mut chunker = FrameChunker::new(FRAME_LEN);

    let mut samples = quiet_frame().repeat(2);
    for chunk in burst(4) {
        samples.extend(chunk);
    }
    samples.extend(quiet_frame().repeat(5));

    let utterances: Vec<_> = chunker
        .push(&samples)
        .into_iter()
        .filter_map(|frame| segmenter.push(frame))
        .collect();

    assert_eq!(utterances.len(), 1);
    let utterance = &utterances[0];
    // first loud frame through the end of the silent run
    assert_eq!(utterance.frame_count(), 7);
    assert!(utterance.frames()[0].energy() > 0.05);
    assert!(utterance.frames()[6].energy() <= 0.05);
    assert!((utterance.duration().as_secs_f64() - 0.7).abs() < 1e-6);
}

#[test]
fn test_ceiling_emits_without_silence() {
    let mut segmenter = AudioSegmenter::new(test_segmenter());
    let mut emitted = Vec::new();
    for _ in 0..45 {
        if let Some(u) = segmenter.push(voxarm::voice::AudioFrame::new(loud_frame())) {
            emitted.push(u.frame_count());
        }
    }
    assert_eq!(emitted, vec![20, 20]);
    assert_eq!(segmenter.buffered(), 5);
}

#[test]
fn test_matcher_case_insensitive_keeps_transcript() {
    let matcher = WakePhraseMatcher::new(vec!["jarvis".into()], vec![]).unwrap();
    let hit = matcher.check("Hey JARVIS now");
    assert!(hit.matched);
    assert_eq!(hit.phrase.as_deref(), Some("jarvis"));
    assert_eq!(hit.tier, Some(MatchTier::Exact));

    let miss = matcher.check("Good morning");
    assert!(!miss.matched);
    assert_eq!(miss.transcript, "Good morning");
}

#[tokio::test(start_paused = true)]
async fn test_listen_returns_first_utterance_and_stops() {
    let mut chunks = vec![quiet_frame()];
    chunks.extend(burst(2));
    chunks.push(loud_frame());
    let mut source = ScriptedSource::new(chunks);
    let stats = source.stats();

    let utterance = listen(&mut source, &test_segmenter(), Duration::from_secs(5))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(utterance.frame_count(), 5);
    assert_eq!(source.remaining(), 1);
    assert_eq!(stats.starts(), 1);
    assert_eq!(stats.stops(), 1);
    assert!(!stats.running());
}

#[tokio::test(start_paused = true)]
async fn test_listen_timeout_without_speech() {
    let mut source = ScriptedSource::new(vec![quiet_frame(); 50]);
    let stats = source.stats();

    let started = tokio::time::Instant::now();
    let result = listen(&mut source, &test_segmenter(), Duration::from_secs(1))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!stats.running());
}

#[tokio::test(start_paused = true)]
async fn test_listen_timeout_returns_partial_utterance() {
    let mut source = ScriptedSource::new(vec![loud_frame(); 50]);

    let partial = listen(&mut source, &test_segmenter(), Duration::from_millis(500))
        .await
        .unwrap()
        .unwrap();

    // cut by the timeout, well before the 20-frame ceiling
    assert!((1..20).contains(&partial.frame_count()));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_listen_releases_source() {
    let mut source = ScriptedSource::new(vec![quiet_frame(); 50]);
    let stats = source.stats();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(250),
        listen(&mut source, &test_segmenter(), Duration::from_secs(5)),
    )
    .await;

    assert!(cancelled.is_err());
    assert_eq!(stats.starts(), 1);
    assert_eq!(stats.stops(), 1);
    assert!(!stats.running());
}

#[tokio::test(start_paused = true)]
async fn test_listen_device_failure() {
    let mut source = ScriptedSource::broken();
    let err = listen(&mut source, &test_segmenter(), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test(start_paused = true)]
async fn test_wake_then_command() {
    let mut chunks = burst(2);
    chunks.extend(burst(3));
    let source = ScriptedSource::new(chunks);
    let stats = source.stats();

    let mut voice = VoiceLoop::new(
        source,
        ScriptedTranscriber::new(["Hey Jarvis", "pick up the green block"]),
        WakePhraseMatcher::with_defaults(),
        audio(),
        Some("en".into()),
        test_session(ScriptedPlanner::new([pick_green()])),
    );

    let CycleOutcome::Handled(turn) = voice.cycle().await.unwrap() else {
        panic!("expected a handled command");
    };
    assert_eq!(turn.report.map(|r| (r.succeeded, r.total)), Some((1, 1)));

    let session = voice.session();
    assert_eq!(
        session.world().robot().holding_object.as_deref(),
        Some("green_block")
    );
    assert_eq!(
        session.speaker().lines(),
        [ACK_LINE, "Picking up the green block.", DONE_LINE]
    );
    assert_eq!(session.conversation().messages()[0].content, "pick up the green block");
    assert_eq!(stats.starts(), 2);
    assert!(!stats.running());
}

#[tokio::test(start_paused = true)]
async fn test_command_inside_wake_utterance() {
    let source = ScriptedSource::new(burst(4));
    let stats = source.stats();
    let transcriber = ScriptedTranscriber::new(["Jarvis, pick up the green block."]);

    let mut voice = VoiceLoop::new(
        source,
        transcriber,
        WakePhraseMatcher::with_defaults(),
        audio(),
        None,
        test_session(ScriptedPlanner::new([pick_green()])),
    );

    assert!(matches!(
        voice.cycle().await.unwrap(),
        CycleOutcome::Handled(_)
    ));
    // no second capture, no acknowledgment
    assert_eq!(stats.starts(), 1);
    assert!(!voice.session().speaker().lines().contains(&ACK_LINE.to_string()));
    assert_eq!(
        voice.session().conversation().messages()[0].content,
        "pick up the green block."
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_wake_phrase_stays_idle() {
    let mut voice = VoiceLoop::new(
        ScriptedSource::new(burst(2)),
        ScriptedTranscriber::new(["what's the weather like"]),
        WakePhraseMatcher::new(vec!["jarvis".into()], vec![]).unwrap(),
        audio(),
        None,
        test_session(ScriptedPlanner::new([pick_green()])),
    );

    assert_eq!(voice.cycle().await.unwrap(), CycleOutcome::Idle);
    assert!(voice.session().speaker().lines().is_empty());
    assert!(voice.session().conversation().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_silence_after_wake_asks_to_repeat() {
    let mut voice = VoiceLoop::new(
        ScriptedSource::new(burst(2)),
        ScriptedTranscriber::new(["jarvis"]),
        WakePhraseMatcher::with_defaults(),
        audio(),
        None,
        test_session(ScriptedPlanner::offline()),
    );

    assert_eq!(voice.cycle().await.unwrap(), CycleOutcome::NoCommand);
    assert_eq!(voice.session().speaker().lines(), [ACK_LINE, REPEAT_LINE]);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_command_asks_to_repeat() {
    let mut chunks = burst(2);
    chunks.extend(burst(2));
    let mut voice = VoiceLoop::new(
        ScriptedSource::new(chunks),
        // second transcription fails: queue exhausted
        ScriptedTranscriber::new(["jarvis"]),
        WakePhraseMatcher::with_defaults(),
        audio(),
        None,
        test_session(ScriptedPlanner::offline()),
    );

    assert_eq!(voice.cycle().await.unwrap(), CycleOutcome::NoCommand);
    assert_eq!(voice.session().speaker().lines(), [ACK_LINE, REPEAT_LINE]);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_shutdown() {
    let source = ScriptedSource::new(vec![quiet_frame(); 200]);
    let stats = source.stats();
    let voice = VoiceLoop::new(
        source,
        ScriptedTranscriber::default(),
        WakePhraseMatcher::with_defaults(),
        AudioConfig {
            wake_timeout: Duration::from_secs(1),
            ..audio()
        },
        None,
        test_session(ScriptedPlanner::offline()),
    );

    let session = voice
        .run(tokio::time::sleep(Duration::from_millis(2500)))
        .await
        .unwrap();

    let lines = session.speaker().lines();
    assert!(lines[0].starts_with("Hello. I'm Jarvis."));
    assert_eq!(lines.last().map(String::as_str), Some(GOODBYE_LINE));
    assert!(stats.starts() >= 3);
    assert_eq!(stats.starts(), stats.stops());
    assert!(!stats.running());
}

#[tokio::test(start_paused = true)]
async fn test_run_ends_on_device_failure() {
    let voice = VoiceLoop::new(
        ScriptedSource::broken(),
        ScriptedTranscriber::default(),
        WakePhraseMatcher::with_defaults(),
        audio(),
        None,
        test_session(ScriptedPlanner::offline()),
    );

    let result = voice.run(std::future::pending()).await;
    assert!(matches!(result, Err(Error::Resource(_))));
}
