use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use voxarm::agent::Session;
use voxarm::daemon::{build_session, build_speaker, build_transcriber};
use voxarm::voice::{
    AudioCapture, FrameSource, PrintSpeaker, Speaker, Transcriber, mean_abs,
};
use voxarm::world::WorldModel;
use voxarm::{Config, Daemon, Planner, Turn};

/// voxarm - talk to a simulated robot arm
#[derive(Parser)]
#[command(name = "voxarm", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voxarm/config.toml)
    #[arg(short, long, env = "VOXARM_CONFIG")]
    config: Option<PathBuf>,

    /// Robot name, used in the greeting and the planner's identity
    #[arg(short, long, env = "VOXARM_NAME")]
    name: Option<String>,

    /// Skip simulated actuation delays
    #[arg(long)]
    fast: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the voice session (default)
    Run,
    /// Type commands instead of speaking them
    Chat,
    /// Send a WAV file through STT, then plan and execute it
    Transcribe {
        /// Path to a WAV recording
        path: PathBuf,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Print the initial world state
    State,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxarm=info",
        1 => "info,voxarm=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(name) = cli.name {
        config.robot_name = name;
    }
    if cli.fast {
        config.world.realtime = false;
    }
    config.validate()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(name = %config.robot_name, "starting voxarm");
            Daemon::new(config).run().await?;
            Ok(())
        }
        Command::Chat => chat(&config).await,
        Command::Transcribe { path } => transcribe(&config, &path).await,
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestTts { text } => {
            build_speaker(&config).speak(&text).await;
            Ok(())
        }
        Command::State => {
            println!("{}", WorldModel::seeded(config.world.settings));
            Ok(())
        }
    }
}

/// Messages shown by the `history` chat command
const HISTORY_LINES: usize = 10;

/// Read commands from stdin and handle each as a turn
#[allow(clippy::future_not_send)]
async fn chat(config: &Config) -> anyhow::Result<()> {
    let mut session = build_session(config, PrintSpeaker)?;
    println!(
        "Talking to {}. Commands: state, history, reset, quit",
        session.name()
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "quit" | "exit" => break,
            "state" => println!("{}", session.world()),
            "history" => println!("{}", session.conversation().summary(HISTORY_LINES)),
            "reset" => {
                session.reset_conversation();
                println!("Conversation cleared.");
            }
            text => {
                let turn = session.respond(text).await;
                print_turn(&session, &turn);
            }
        }
    }

    session.farewell().await;
    Ok(())
}

/// Transcribe a recording and act on it
#[allow(clippy::future_not_send)]
async fn transcribe(config: &Config, path: &std::path::Path) -> anyhow::Result<()> {
    let wav = tokio::fs::read(path).await?;
    let transcriber = build_transcriber(config)?;
    let text = transcriber
        .transcribe(&wav, config.stt.language.as_deref())
        .await?;
    println!("Heard: {text}");

    let mut session = build_session(config, build_speaker(config))?;
    let turn = session.respond(&text).await;
    print_turn(&session, &turn);
    Ok(())
}

fn print_turn<P: Planner, S: Speaker>(session: &Session<P, S>, turn: &Turn) {
    if let Some(question) = turn
        .response
        .clarification_question
        .as_deref()
        .filter(|_| turn.awaiting_clarification())
    {
        println!("? {question}");
    }
    if let Some(report) = &turn.report {
        for outcome in &report.outcomes {
            let mark = if outcome.success { "ok" } else { "FAILED" };
            println!(
                "  [{}] {} {}: {}",
                outcome.index, outcome.action, mark, outcome.message
            );
        }
        println!("{report}");
        println!("{}", session.world());
    }
}

/// Test microphone input against the speech threshold
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    let threshold = config.audio.segmenter.min_volume;
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone! Speech threshold: {threshold:.4}\n");

    let mut capture = AudioCapture::new(config.audio.segmenter.sample_rate)?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = mean_abs(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 500.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        let speech = if energy > threshold { "speech" } else { "quiet" };

        println!(
            "[{:2}s] level: {:.4} | peak: {:.4} | [{}] {}",
            i + 1,
            energy,
            peak,
            meter,
            speech
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If the level never crosses the threshold while you speak,");
    println!("lower [audio] min_volume in the config file or check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}
