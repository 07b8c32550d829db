use hand_capture::session::{spawn_stdin_commands, DecisionPolicy, Session};
use hand_capture::store::{preview_path, FsCaptureStore};
use hand_capture::trigger::CaptureStateMachine;
use hand_capture::{detector, source};
use hand_capture_common::config::Config;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.source.mode,
        detector = config.detector.mode,
        dwell_ms = config.capture.dwell_ms,
        margin = config.capture.margin,
        region_side = config.capture.region_side,
        decision = config.session.decision,
        "starting hand capture"
    );

    // Reject bad trigger settings before any frame is read.
    let machine = match CaptureStateMachine::from_config(&config.capture) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "invalid capture settings");
            std::process::exit(1);
        }
    };

    let store = match FsCaptureStore::open(&config.storage) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open capture store");
            std::process::exit(1);
        }
    };

    let hand_detector = match detector::from_config(&config.detector).await {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to start hand detector");
            std::process::exit(1);
        }
    };

    let session = match Session::from_config(&config.session, machine, store, hand_detector) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid session settings");
            std::process::exit(1);
        }
    };

    let preview = preview_path(&config.storage);
    let session = session.with_preview(move |image: &image::RgbImage| match image.save(&preview) {
        Ok(()) => info!(path = %preview.display(), "crop preview written"),
        Err(e) => warn!(error = %e, "failed to write crop preview"),
    });

    let frames = match source::spawn(&config.source) {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "failed to start frame source");
            std::process::exit(1);
        }
    };

    let commands = if config.session.decision.parse::<DecisionPolicy>().ok() == Some(DecisionPolicy::Prompt) {
        spawn_stdin_commands()
    } else {
        mpsc::channel(1).1
    };

    if let Err(e) = session.run(frames, commands).await {
        error!(error = %e, "capture session ended with an error");
        std::process::exit(1);
    }
}
