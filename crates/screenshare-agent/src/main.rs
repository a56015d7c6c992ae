//! On-device screen sharing agent entry point: parses the CLI, bootstraps
//! the three-socket session against the peer's abstract-namespace
//! endpoint, and hands off to the controller loop.

use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod agent;
mod clipboard;
mod config;
mod controller;
mod device_state;
mod error;
mod input_injector;
mod session;
mod settings;

use agent::Agent;
use agent_display::CodecInfo;
use config::{Cli, FLAG_START_VIDEO_STREAM};
use error::{ExitCode, Fatal};

/// Maps a `--codec` short name to the encoder descriptor the streamer's
/// video-size and bit-rate arithmetic needs.
fn codec_candidates_for(short_name: &str) -> Result<Vec<CodecInfo>, Fatal> {
    let mime_type = match short_name {
        "h264" => "video/avc",
        "vp8" => "video/x-vnd.on2.vp8",
        "vp9" => "video/x-vnd.on2.vp9",
        "av01" => "video/av01",
        other => {
            return Err(Fatal::new(
                ExitCode::NoEncoder,
                format!("unsupported codec `{other}`"),
            ))
        }
    };

    Ok(vec![CodecInfo {
        mime_type: mime_type.to_string(),
        name: short_name.to_string(),
        max_resolution: (3840, 3840),
        size_alignment: (2, 2),
        max_frame_rate: 60,
    }])
}

fn run(cli: Cli) -> Result<(), Fatal> {
    let settings_path = settings::default_config_path();
    let loaded = settings::load(&settings_path)
        .map_err(|e| Fatal::new(ExitCode::InvalidCli, format!("loading config: {e}")))?;
    tracing::debug!(?settings_path, encode = ?loaded.encode, "settings loaded");

    let codec_candidates = codec_candidates_for(&cli.codec)?;

    let sockets = session::bootstrap(&cli.socket, &cli.codec)?;

    let display_manager = agent::default_display_manager();
    let agent = Arc::new(Agent::new(
        &cli,
        sockets.video,
        codec_candidates,
        display_manager,
    ));

    if cli.has_flag(FLAG_START_VIDEO_STREAM) {
        for display_id in agent.display_manager().get_display_ids() {
            agent.start_video_stream(display_id, 0, 0);
        }
    }

    let mut controller = controller::Controller::new(&cli, sockets.control, Arc::clone(&agent))?;
    let result = controller.run();
    agent.shutdown();
    result
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log.as_filter())),
        )
        .init();

    match run(cli) {
        Ok(()) => ProcessExitCode::SUCCESS,
        Err(fatal) => {
            tracing::error!(code = fatal.code as i32, "{}", fatal.message);
            ProcessExitCode::from(fatal.code as u8)
        }
    }
}
