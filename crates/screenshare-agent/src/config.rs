//! Command-line configuration: socket name, log level, initial video
//! geometry, the feature-flag bitmask, and encoder selection.

use clap::Parser;

/// Bit 0: begin streaming video immediately instead of waiting for a
/// `StartVideoStream` control message.
pub const FLAG_START_VIDEO_STREAM: u32 = 1 << 0;
/// Bit 1: turn the physical display off once streaming starts.
pub const FLAG_TURN_OFF_DISPLAY: u32 = 1 << 1;
/// Bit 2: start the audio pipeline alongside video.
pub const FLAG_STREAM_AUDIO: u32 = 1 << 2;
/// Bit 3: inject input through kernel uinput virtual devices instead of the
/// platform input-injection accessor.
pub const FLAG_USE_UINPUT: u32 = 1 << 3;
/// Bit 4: reset the UI (dismiss dialogs, etc.) automatically on connect.
pub const FLAG_AUTO_RESET_UI: u32 = 1 << 4;
/// Bit 5: draw debug layout overlays.
pub const FLAG_DEBUG_LAYOUT: u32 = 1 << 5;
/// Bit 6: advertise gesture navigation to the peer.
pub const FLAG_GESTURE_NAV: u32 = 1 << 6;

/// Default bit rate cap (bits/sec) when `--max_bit_rate` is 0 or absent.
pub const DEFAULT_MAX_BIT_RATE: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Verbose | Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// On-device screen sharing agent.
///
/// Streams a display's video over an abstract-namespace socket, accepts
/// input/control commands back over a second channel, and keeps both in
/// sync with clipboard, rotation, and device-state changes.
#[derive(Parser, Debug, Clone)]
#[command(name = "screenshare-agent", version, about)]
pub struct Cli {
    /// Abstract socket name the peer is already listening on; three
    /// channels (video/audio/control) are opened against it.
    #[arg(long)]
    pub socket: String,

    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log: LogLevel,

    /// Maximum video resolution as `W,H`.
    #[arg(long, value_parser = parse_size)]
    pub max_size: Option<(i32, i32)>,

    /// Initial video orientation in quadrants (masked to 0..=3).
    #[arg(long, default_value_t = 0)]
    pub orientation: i32,

    /// Feature-flag bitmask (see `FLAG_*` constants).
    #[arg(long, default_value_t = 0)]
    pub flags: u32,

    /// Maximum bit rate in bits/sec; 0 selects the default (10 Mbit/s).
    #[arg(long, default_value_t = 0)]
    pub max_bit_rate: i64,

    /// Short encoder codec name: `h264`, `vp8`, `vp9`, or `av01`.
    #[arg(long, default_value = "h264")]
    pub codec: String,
}

fn parse_size(s: &str) -> Result<(i32, i32), String> {
    let (w, h) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `W,H`, got `{s}`"))?;
    let w: i32 = w.trim().parse().map_err(|_| format!("invalid width in `{s}`"))?;
    let h: i32 = h.trim().parse().map_err(|_| format!("invalid height in `{s}`"))?;
    if w <= 0 || h <= 0 {
        return Err(format!("max_size dimensions must be positive, got {w},{h}"));
    }
    Ok((w, h))
}

impl Cli {
    #[must_use]
    pub fn effective_max_bit_rate(&self) -> i64 {
        if self.max_bit_rate > 0 {
            self.max_bit_rate
        } else {
            DEFAULT_MAX_BIT_RATE
        }
    }

    #[must_use]
    pub fn effective_max_size(&self) -> (i32, i32) {
        self.max_size.unwrap_or((i32::MAX, i32::MAX))
    }

    #[must_use]
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_max_size() {
        assert_eq!(parse_size("1080,2400"), Ok((1080, 2400)));
        assert!(parse_size("1080").is_err());
        assert!(parse_size("0,100").is_err());
    }

    #[test]
    fn default_bit_rate_applies_when_zero() {
        let cli = Cli {
            socket: "x".into(),
            log: LogLevel::Info,
            max_size: None,
            orientation: 0,
            flags: 0,
            max_bit_rate: 0,
            codec: "h264".into(),
        };
        assert_eq!(cli.effective_max_bit_rate(), DEFAULT_MAX_BIT_RATE);
    }
}
