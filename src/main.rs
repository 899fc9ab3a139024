use anyhow::Result;
use clap::Parser;
use meetdocs::{
    audio::{list_input_devices, AudioCaptureEngine, CaptureSettings, CpalInputDevice},
    cli::Cli,
    config::Config,
    export::MarkdownExporter,
    meet::{validate_meet_url, BrowserMeetSession},
    pipeline::{OrchestratorSettings, PipelineOrchestrator},
    summarize::GeminiSummaryProvider,
    transcription::WhisperCliProvider,
    translate::{HttpTranslationProvider, TranscriptTranslator, TranslationProvider},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if cli.list_devices {
        return print_devices();
    }

    let Some(meet_url) = cli.meet_url.clone() else {
        eprintln!("Error: a meeting URL is required");
        eprintln!("Use --help for usage information");
        std::process::exit(1);
    };

    if let Err(e) = validate_meet_url(&meet_url) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("Configuration validation failed:");
        for error in &errors {
            eprintln!("  - {error}");
        }
        std::process::exit(1);
    }

    config.ensure_directories()?;

    info!("MeetDocs starting...");
    info!("Meet URL: {}", meet_url);
    info!("Output directory: {:?}", config.export.output_dir);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut orchestrator = build_orchestrator(&config, cancel)?;
    let outcome = orchestrator.run(&meet_url).await;

    if outcome.succeeded() {
        println!();
        println!("Meeting documentation generated successfully!");
        if let Some(path) = &outcome.document_path {
            println!("Output file: {}", path.display());
        }
        return Ok(());
    }

    let interrupted = outcome.error.as_ref().is_some_and(|e| e.is_interrupt());
    if let Some(error) = &outcome.error {
        eprintln!();
        eprintln!(
            "Error: pipeline failed during the {} stage: {}",
            error.stage(),
            error
        );
    }
    if outcome.chunks_preserved > 0 {
        eprintln!(
            "Preserved on disk: {} audio chunks in {:?}",
            outcome.chunks_preserved, config.audio.audio_dir
        );
    }
    if let Some(path) = &outcome.transcript_path {
        eprintln!("Preserved on disk: transcript at {}", path.display());
    }

    // 130 is the conventional exit code for an interrupted run.
    std::process::exit(if interrupted { 130 } else { 1 });
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(device) = cli.audio_device {
        config.audio.device_index = Some(device);
    }
    if let Some(duration) = cli.chunk_duration {
        config.audio.chunk_duration_seconds = duration;
    }
    if let Some(output_dir) = &cli.output_dir {
        config.export.output_dir = output_dir.clone();
    }
    if let Some(max_duration) = cli.max_duration {
        config.limits.max_duration_seconds = Some(max_duration);
    }
}

fn build_orchestrator(config: &Config, cancel: CancellationToken) -> Result<PipelineOrchestrator> {
    let session = Box::new(BrowserMeetSession::new(
        config.meeting.helper_command.clone(),
    ));

    let opener = Arc::new(CpalInputDevice::new(
        config.audio.sample_rate,
        config.audio.channels,
    ));
    let capture = AudioCaptureEngine::new(
        opener,
        CaptureSettings::from_config(&config.audio, &config.capture),
    );

    let transcription = Box::new(WhisperCliProvider::new(&config.transcription)?);

    let translation_provider: Option<Box<dyn TranslationProvider>> = config
        .translation
        .endpoint
        .clone()
        .map(|endpoint| Box::new(HttpTranslationProvider::new(endpoint)) as _);
    if translation_provider.is_none() {
        warn!("No translation endpoint configured; transcript passes through untranslated");
    }
    let translator = TranscriptTranslator::new(translation_provider, &config.translation);

    let summarizer = Box::new(GeminiSummaryProvider::new(&config.summary)?);
    let exporter = Box::new(MarkdownExporter::new(config.export.output_dir.clone()));

    Ok(PipelineOrchestrator::new(
        session,
        capture,
        transcription,
        translator,
        summarizer,
        exporter,
        OrchestratorSettings::from_config(config),
        cancel,
    ))
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping run...");
            cancel.cancel();
        }
    });
}

fn print_devices() -> Result<()> {
    println!("\nAvailable audio input devices:");
    println!("{}", "-".repeat(60));
    for device in list_input_devices()? {
        println!("[{}] {}", device.index, device.name);
        println!(
            "    Channels: {}, Sample rate: {}",
            device.channels, device.sample_rate
        );
    }
    println!("{}", "-".repeat(60));
    Ok(())
}
