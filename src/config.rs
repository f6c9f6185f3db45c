use crate::defaults;
use crate::error::{PodgenError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub episode: EpisodeConfig,
    pub synthesis: SynthesisConfig,
    pub output: OutputConfig,
}

/// Episode layout: jingles and the pause between prompt and response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EpisodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_jingle: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outro_jingle: Option<PathBuf>,
    pub pause_duration_secs: f64,
}

/// Speech synthesis service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub voice: String,
    pub speed: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub speakers: Vec<SpeakerConfig>,
}

/// A named dialogue speaker and the voice that reads their lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakerConfig {
    pub name: String,
    pub voice: String,
}

/// Rendered episode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub normalization_target_lufs: f64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            intro_jingle: None,
            outro_jingle: None,
            pause_duration_secs: defaults::PAUSE_DURATION_SECS,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::SYNTHESIS_ENDPOINT.to_string(),
            voice: defaults::DEFAULT_VOICE.to_string(),
            speed: defaults::DEFAULT_SPEED,
            timeout_secs: defaults::SYNTHESIS_TIMEOUT_SECS,
            max_retries: defaults::SYNTHESIS_MAX_RETRIES,
            backoff_ms: defaults::SYNTHESIS_BACKOFF_MS,
            max_backoff_ms: defaults::SYNTHESIS_MAX_BACKOFF_MS,
            speakers: vec![
                SpeakerConfig {
                    name: defaults::HOST_NAME.to_string(),
                    voice: defaults::HOST_VOICE.to_string(),
                },
                SpeakerConfig {
                    name: defaults::CO_HOST_NAME.to_string(),
                    voice: defaults::CO_HOST_VOICE.to_string(),
                },
            ],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
            normalization_target_lufs: defaults::NORMALIZATION_TARGET_LUFS,
        }
    }
}

impl EpisodeConfig {
    pub fn pause_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.pause_duration_secs).unwrap_or(Duration::ZERO)
    }
}

impl SynthesisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Voice configured for a dialogue speaker, matched case-sensitively.
    pub fn voice_for(&self, speaker: &str) -> Option<&str> {
        self.speakers
            .iter()
            .find(|s| s.name == speaker)
            .map(|s| s.voice.as_str())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PODGEN_TTS_URL → synthesis.endpoint
    /// - PODGEN_VOICE → synthesis.voice
    /// - PODGEN_INTRO_JINGLE → episode.intro_jingle
    /// - PODGEN_OUTRO_JINGLE → episode.outro_jingle
    /// - PODGEN_OUTPUT_DIR → output.dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PODGEN_TTS_URL")
            && !url.is_empty()
        {
            self.synthesis.endpoint = url;
        }

        if let Ok(voice) = std::env::var("PODGEN_VOICE")
            && !voice.is_empty()
        {
            self.synthesis.voice = voice;
        }

        if let Ok(path) = std::env::var("PODGEN_INTRO_JINGLE")
            && !path.is_empty()
        {
            self.episode.intro_jingle = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("PODGEN_OUTRO_JINGLE")
            && !path.is_empty()
        {
            self.episode.outro_jingle = Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("PODGEN_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.dir = PathBuf::from(dir);
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let pause = self.episode.pause_duration_secs;
        if !pause.is_finite() || pause < 0.0 {
            return Err(invalid(
                "episode.pause_duration_secs",
                format!("must be a non-negative number, got {pause}"),
            ));
        }

        if self.synthesis.endpoint.trim().is_empty() {
            return Err(invalid("synthesis.endpoint", "must not be empty"));
        }

        if self.synthesis.voice.trim().is_empty() {
            return Err(invalid("synthesis.voice", "must not be empty"));
        }

        let speed = self.synthesis.speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(invalid(
                "synthesis.speed",
                format!("must be positive, got {speed}"),
            ));
        }

        if self.synthesis.timeout_secs == 0 {
            return Err(invalid(
                "synthesis.timeout_secs",
                "must be at least 1 second",
            ));
        }

        if self.synthesis.max_backoff_ms < self.synthesis.backoff_ms {
            return Err(invalid(
                "synthesis.max_backoff_ms",
                format!(
                    "must be at least backoff_ms ({})",
                    self.synthesis.backoff_ms
                ),
            ));
        }

        if let Some(speaker) = self.synthesis.speakers.iter().find(|s| s.name.is_empty()) {
            return Err(invalid(
                "synthesis.speakers",
                format!("speaker with voice '{}' has an empty name", speaker.voice),
            ));
        }

        let target = self.output.normalization_target_lufs;
        if !target.is_finite() || !(-70.0..=defaults::PEAK_CEILING_DBFS).contains(&target) {
            return Err(invalid(
                "output.normalization_target_lufs",
                format!(
                    "must be between -70 and {} LUFS, got {target}",
                    defaults::PEAK_CEILING_DBFS
                ),
            ));
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/podgen/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("podgen")
            .join("config.toml")
    }

    /// Render the effective configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PodgenError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Commented template with every default, suitable for `config.toml`.
    pub fn dump_template() -> String {
        let body = Config::default()
            .to_display_toml()
            .unwrap_or_else(|e| format!("# failed to render defaults: {e}\n"));
        format!(
            "# podgen configuration\n\
             #\n\
             # Optional jingles (omitted from the episode when unset):\n\
             # [episode]\n\
             # intro_jingle = \"show-elements/mixed/mixed-intro.mp3\"\n\
             # outro_jingle = \"show-elements/mixed/mixed-outro.mp3\"\n\
             \n{body}"
        )
    }
}

fn invalid(key: &str, message: impl Into<String>) -> PodgenError {
    PodgenError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_podgen_env() {
        for key in [
            "PODGEN_TTS_URL",
            "PODGEN_VOICE",
            "PODGEN_INTRO_JINGLE",
            "PODGEN_OUTRO_JINGLE",
            "PODGEN_OUTPUT_DIR",
        ] {
            remove_env(key);
        }
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.episode.intro_jingle, None);
        assert_eq!(config.episode.outro_jingle, None);
        assert_eq!(config.episode.pause_duration_secs, 1.0);

        assert_eq!(config.synthesis.endpoint, "http://localhost:8880");
        assert_eq!(config.synthesis.voice, "am_adam");
        assert_eq!(config.synthesis.timeout_secs, 300);
        assert_eq!(config.synthesis.max_retries, 3);
        assert_eq!(config.synthesis.voice_for("Herman"), Some("am_adam"));
        assert_eq!(config.synthesis.voice_for("Emma"), Some("bf_emma"));

        assert_eq!(config.output.normalization_target_lufs, -16.0);
        assert_eq!(config.output.dir, PathBuf::from("episodes"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [episode]
            intro_jingle = "jingles/intro.mp3"
            outro_jingle = "jingles/outro.mp3"
            pause_duration_secs = 2.5

            [synthesis]
            endpoint = "http://tts.local:9000"
            voice = "bf_emma"
            speed = 1.1
            timeout_secs = 60
            max_retries = 5

            [[synthesis.speakers]]
            name = "Corn"
            voice = "bm_george"

            [output]
            dir = "/srv/episodes"
            normalization_target_lufs = -19.0
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(
            config.episode.intro_jingle,
            Some(PathBuf::from("jingles/intro.mp3"))
        );
        assert_eq!(config.episode.pause_duration(), Duration::from_millis(2500));
        assert_eq!(config.synthesis.endpoint, "http://tts.local:9000");
        assert_eq!(config.synthesis.voice, "bf_emma");
        assert_eq!(config.synthesis.timeout(), Duration::from_secs(60));
        assert_eq!(config.synthesis.max_retries, 5);
        assert_eq!(config.synthesis.speakers.len(), 1);
        assert_eq!(config.synthesis.voice_for("Corn"), Some("bm_george"));
        assert_eq!(config.synthesis.voice_for("Herman"), None);
        assert_eq!(config.output.dir, PathBuf::from("/srv/episodes"));
        assert_eq!(config.output.normalization_target_lufs, -19.0);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [synthesis]
            voice = "af_bella"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.synthesis.voice, "af_bella");
        assert_eq!(config.synthesis.timeout_secs, 300);
        assert_eq!(config.synthesis.speakers.len(), 2);
        assert_eq!(config.episode, EpisodeConfig::default());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_env_override_voice_and_endpoint() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_VOICE", "bm_lewis");
        set_env("PODGEN_TTS_URL", "http://gpu-box:8880");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.voice, "bm_lewis");
        assert_eq!(config.synthesis.endpoint, "http://gpu-box:8880");
        assert_eq!(config.episode.intro_jingle, None);

        clear_podgen_env();
    }

    #[test]
    fn test_env_override_jingles_and_output_dir() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_INTRO_JINGLE", "/assets/intro.wav");
        set_env("PODGEN_OUTRO_JINGLE", "/assets/outro.wav");
        set_env("PODGEN_OUTPUT_DIR", "/tmp/out");
        let config = Config::default().with_env_overrides();

        assert_eq!(
            config.episode.intro_jingle,
            Some(PathBuf::from("/assets/intro.wav"))
        );
        assert_eq!(
            config.episode.outro_jingle,
            Some(PathBuf::from("/assets/outro.wav"))
        );
        assert_eq!(config.output.dir, PathBuf::from("/tmp/out"));

        clear_podgen_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_VOICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.voice, "am_adam");

        clear_podgen_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [episode
            intro_jingle = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_podgen_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_path_ends_with_podgen_config() {
        let path = Config::default_path();
        assert!(path.ends_with("podgen/config.toml"));
    }

    #[test]
    fn test_validate_rejects_negative_pause() {
        let mut config = Config::default();
        config.episode.pause_duration_secs = -1.0;

        match config.validate() {
            Err(PodgenError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "episode.pause_duration_secs");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.synthesis.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_target_above_peak_ceiling() {
        let mut config = Config::default();
        config.output.normalization_target_lufs = 0.0;
        assert!(config.validate().is_err());

        config.output.normalization_target_lufs = -23.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_pause_is_valid() {
        let mut config = Config::default();
        config.episode.pause_duration_secs = 0.0;
        assert!(config.validate().is_ok());
        assert_eq!(config.episode.pause_duration(), Duration::ZERO);
    }

    #[test]
    fn test_dump_template_round_trips_to_defaults() {
        let template = Config::dump_template();
        assert!(template.starts_with("# podgen configuration"));

        let parsed: Config = toml::from_str(&template).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
