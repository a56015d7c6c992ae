//! Optional TOML tuning file for knobs that don't belong on the hot CLI
//! path. CLI flags (`config::Cli`) always take precedence over whatever is
//! loaded here; this file only fills in defaults for things nobody is
//! expected to pass on every invocation.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EncodeTuning {
    pub i_frame_interval_secs: u32,
    pub repeat_frame_after_ms: u32,
    pub dequeue_error_threshold: u32,
    pub video_write_deadline_secs: u64,
}

impl Default for EncodeTuning {
    fn default() -> Self {
        Self {
            i_frame_interval_secs: 10,
            repeat_frame_after_ms: 100,
            dequeue_error_threshold: 5,
            video_write_deadline_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct AgentSettings {
    pub encode: EncodeTuning,
}

/// Loads settings from `path` if it exists; a missing file is not an error
/// (the defaults apply), but a malformed one is, since the caller presumably
/// meant to change something.
pub fn load(path: &Path) -> anyhow::Result<AgentSettings> {
    if !path.exists() {
        return Ok(AgentSettings::default());
    }
    let text = std::fs::read_to_string(path)?;
    let settings: AgentSettings = toml::from_str(&text)?;
    Ok(settings)
}

/// Default config file location: `$XDG_CONFIG_HOME/screenshare-agent/config.toml`.
#[must_use]
pub fn default_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("screenshare-agent")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load(Path::new("/nonexistent/screenshare-agent.toml")).unwrap();
        assert_eq!(settings.encode.i_frame_interval_secs, 10);
    }

    #[test]
    fn partial_toml_fills_in_remaining_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "screenshare-agent-settings-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[encode]\ndequeue_error_threshold = 3\n").unwrap();

        let settings = load(&path).unwrap();
        assert_eq!(settings.encode.dequeue_error_threshold, 3);
        assert_eq!(settings.encode.repeat_frame_after_ms, 100);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }
}
