use anyhow::Result;
use clap::{Parser, Subcommand};
use global_hotkey::GlobalHotKeyEvent;
use std::sync::Arc;
use std::time::Duration;

use scribekey::audio::cues::CueSink;
use scribekey::audio::{cleanup, RecordingSession};
use scribekey::clipboard::SystemClipboard;
use scribekey::hotkey::{HotkeyToggle, DEFAULT_KEY, DEFAULT_MODIFIERS};
use scribekey::model::ModelManager;
use scribekey::{setup, telemetry};

#[derive(Parser)]
#[command(name = "scribekey", about = "Hotkey dictation: record, transcribe, copy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record and transcribe on the global hotkey (default)
    Run,
    /// Choose and download a transcription model
    Setup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        // Setup stays off the async runtime; its downloads use blocking I/O
        Command::Setup => run_setup(),
        Command::Run => run(),
    }
}

fn run_setup() -> Result<()> {
    telemetry::init(false)?;
    let manager = ModelManager::new()?;
    // Cancel is a normal exit; only failures propagate a non-zero code
    setup::run(&manager).map(|_| ())
}

#[tokio::main]
async fn run() -> Result<()> {
    telemetry::init(true)?;
    tracing::info!("scribekey starting");

    cleanup::sweep_transient_files();

    let manager = Arc::new(ModelManager::new()?);

    let usable = manager
        .current_tier()
        .is_some_and(|tier| manager.locate_model(tier).is_some());
    if !usable {
        eprintln!("No transcription model is set up. Run `scribekey setup` first.");
        anyhow::bail!("no usable model tier");
    }

    let hotkey = HotkeyToggle::register(DEFAULT_MODIFIERS, DEFAULT_KEY)?;
    let mut session = RecordingSession::new(
        Arc::clone(&manager),
        CueSink::new(),
        Box::new(SystemClipboard::new()),
    );

    println!("ScribeKey is running in the background.");
    println!("Press Cmd+Shift+9 from any application to start/stop recording.");
    println!("Press Ctrl+C to exit.");

    let receiver = GlobalHotKeyEvent::receiver();
    loop {
        while let Ok(event) = receiver.try_recv() {
            if hotkey.is_toggle(&event) {
                session.toggle();
            }
        }

        session.pump();
        session.tick();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }

    // Ordered teardown: capture stream, bounded worker join, resident
    // model, leftover transient files.
    session.shutdown();
    manager.unload();
    cleanup::sweep_transient_files();

    tracing::info!("shutdown complete");
    Ok(())
}
