use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use luna_voice::audio::{MicCapture, PlaybackScheduler, codec};
use luna_voice::audio::{CaptureSource, PLAYBACK_SAMPLE_RATE};
use luna_voice::memory::MemoryClient;
use luna_voice::session::wire::{ClientMessage, RealtimeInput};
use luna_voice::{Config, SessionController, prompt};

/// LUNA - Real-time voice assistant session manager
#[derive(Parser)]
#[command(name = "luna", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Print the assembled system instruction and exit
    PrintPrompt,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,luna_voice=info",
        1 => "info,luna_voice=debug",
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
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::PrintPrompt => print_prompt().await,
        };
    }

    let config = Config::load();
    let mut controller = SessionController::with_default_devices(config)?;

    // Log status transitions as they happen
    let mut status_rx = controller.status_watch();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow();
            println!("[STATUS] {status}");
        }
    });

    tracing::info!("starting voice session (ctrl-c to stop)");
    controller.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                controller.stop().await;
                break;
            }
            active = controller.pump() => {
                if !active {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Capture for a few seconds and show a level meter per second
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let mut capture = MicCapture::new();
    capture.acquire()?;
    capture.start(tx)?;

    println!("Sample rate: {} Hz", codec::CAPTURE_SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let ClientMessage::RealtimeInput(RealtimeInput {
                media: Some(envelope),
                ..
            }) = msg
            {
                if let Ok(mut channels) = codec::decode_envelope(&envelope, 1) {
                    samples.append(&mut channels.remove(0));
                }
            }
        }

        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut scheduler = PlaybackScheduler::new()?;
    scheduler.activate()?;

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!(
        "Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...",
        samples.len()
    );

    let mut envelope = codec::encode(&samples);
    envelope.mime_type = format!("audio/pcm;rate={PLAYBACK_SAMPLE_RATE}");
    scheduler.on_frame_received(&envelope)?;

    while scheduler.active_handles() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    scheduler.release();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Fetch memories and print the system instruction that would be sent
async fn print_prompt() -> anyhow::Result<()> {
    let config = Config::load();
    let memories = MemoryClient::new(&config).fetch().await;
    println!("{}", prompt::build_instruction(&memories));
    Ok(())
}
