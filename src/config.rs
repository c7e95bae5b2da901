use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub captures: CapturesConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturesConfig {
    /// Root directory for capture files ({root}/{date}/{device}/{id}.{ext})
    pub capture_dir: String,

    /// Sample rate assumed for raw PCM uploads and streamed frames
    pub sample_rate: u32,
}

/// Tuning for the conversation boundary detector
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// RMS threshold above which a window counts as speech (0.0 to 1.0)
    pub speech_threshold: f32,

    /// Trailing silence that closes a conversation, in seconds
    pub silence_duration_secs: f64,

    /// Speech runs shorter than this are discarded, in seconds
    pub min_speech_secs: f64,

    /// Analysis window length in milliseconds
    pub window_ms: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.02,
            silence_duration_secs: 30.0,
            min_speech_secs: 1.0,
            window_ms: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
