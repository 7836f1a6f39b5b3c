//! Game Maker terminal client - composition root.
//!
//! 1. Resolve and load configuration (CLI > env > TOML file > defaults)
//! 2. Check backend health and start a session
//! 3. Start the dictation engine, its renderer, and the transcript bridge
//! 4. Read lines from stdin until `/quit`

mod bridge;
mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use gamemaker_core::config::GameMakerConfig;
use gamemaker_dictation::{DictationEngine, DictationHandle, RecognitionSettings, TokioScheduler};
use gamemaker_session::{HttpDispatcher, SessionController};

use crate::bridge::TranscriptCommitBridge;
use crate::cli::CliArgs;
use crate::console::LineCapability;

const HELP: &str = "Commands: /voice (start or stop dictation), /reset (new game), /game (show link), /quit";

/// Read stdin and dispatch commands, typed turns, or dictated lines.
async fn repl(
    controller: Arc<SessionController<HttpDispatcher>>,
    dictation: DictationHandle,
    capability: LineCapability,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/voice" => {
                if !dictation.toggle() {
                    tracing::warn!("Dictation engine is not running");
                }
            }
            "/reset" => {
                // Outcome is rendered from the event stream.
                let _ = controller.reset().await;
            }
            "/game" => match controller.session_id() {
                Some(id) if controller.is_complete() => {
                    println!("{}", controller.backend().artifact_url(&id));
                }
                _ => println!("Your game isn't ready yet."),
            },
            text if capability.is_listening() => {
                capability.feed_line(text);
            }
            text => {
                // Accepted turns are echoed from the event stream.
                let controller = Arc::clone(&controller);
                let text = text.to_string();
                tokio::spawn(async move {
                    let outcome = controller.submit_turn(&text).await;
                    if let Some(feedback) = console::render_rejection(&outcome) {
                        println!("{}", feedback);
                    }
                });
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Loaded before tracing so the configured log level applies.
    let config_path = args.resolve_config_path();
    let (mut config, load_error) = if config_path.exists() {
        match GameMakerConfig::load(&config_path) {
            Ok(config) => (config, None),
            Err(e) => (GameMakerConfig::default(), Some(e)),
        }
    } else {
        (GameMakerConfig::default(), None)
    };

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Game Maker client v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Invalid configuration, using defaults"
        ),
        None => tracing::info!(path = %config_path.display(), "Configuration loaded"),
    }

    if let Some(url) = args.resolve_backend_url() {
        config.backend.base_url = url;
    }
    config.validate()?;

    // Backend.
    let dispatcher = HttpDispatcher::new(config.backend.clone())?;
    match dispatcher.health().await {
        Ok(health) => tracing::info!(
            status = %health.status,
            version = health.version.as_deref().unwrap_or("unknown"),
            "Backend reachable"
        ),
        Err(e) => tracing::warn!(
            url = %config.backend.base_url,
            error = %e,
            "Backend health check failed"
        ),
    }

    let controller = Arc::new(SessionController::new(dispatcher));
    let session_renderer = tokio::spawn(console::print_session_events(
        controller.subscribe(),
        config.backend.base_url.clone(),
    ));

    // Dictation.
    let (dictation, inputs) = gamemaker_dictation::channel();
    let settings = RecognitionSettings::from(&config.dictation);
    tracing::info!(
        language = %settings.language,
        continuous = settings.continuous,
        interim_results = settings.interim_results,
        max_alternatives = settings.max_alternatives,
        "Speech recognition configured"
    );
    let capability = LineCapability::new(dictation.clone(), settings);
    let engine = DictationEngine::from_config(
        &config.dictation,
        capability.clone(),
        TokioScheduler::new(dictation.clone()),
    );
    let dictation_renderer = tokio::spawn(console::print_dictation_events(engine.subscribe()));
    let bridge = TranscriptCommitBridge::new(Arc::clone(&controller)).spawn(engine.subscribe());
    let engine_task = tokio::spawn(engine.run(inputs));

    // Failure is rendered from the event stream; /reset retries.
    let _ = controller.start().await;
    println!("{}", HELP);

    repl(Arc::clone(&controller), dictation.clone(), capability).await?;

    // Shutdown: the engine drops its event sender on exit, which ends the
    // bridge and the dictation renderer.
    dictation.shutdown();
    let _ = engine_task.await;
    let _ = bridge.await;
    let _ = dictation_renderer.await;
    session_renderer.abort();

    tracing::info!("Game Maker client stopped");
    Ok(())
}
