//! Voice activity gate for the conversation boundary detector.
//!
//! RMS-based thresholding with state machine logic to ride out silence
//! intervals inside a conversation. Clocked by audio time (seconds since
//! capture start), not wall time, so results are a pure function of the
//! byte stream.

/// Configuration for the voice activity gate.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Silence that must elapse after the last voiced window before the
    /// activity run is considered ended, in seconds.
    pub hang_secs: f64,
}

/// Current state of voice activity detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech detected.
    Idle,
    /// Speech is being detected.
    Speaking,
    /// Silence after speech, waiting to confirm the run has ended.
    TrailingSilence,
}

/// Events emitted per analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadEvent {
    /// No activity.
    Silence,
    /// A new activity run started at the window's start time.
    SpeechStart,
    /// Ongoing activity.
    Speech,
    /// The activity run ended; `last_voice_end` holds its end time.
    SpeechEnd,
}

/// Voice activity state machine over fixed analysis windows.
pub struct Vad {
    config: VadConfig,
    state: VadState,
    last_voice_end: f64,
}

impl Vad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Idle,
            last_voice_end: 0.0,
        }
    }

    /// Process one analysis window covering `[start_secs, end_secs)` of the
    /// capture timeline.
    pub fn process_window(&mut self, samples: &[i16], _start_secs: f64, end_secs: f64) -> VadEvent {
        let is_speech = calculate_rms(samples) > self.config.speech_threshold;

        match self.state {
            VadState::Idle => {
                if is_speech {
                    self.state = VadState::Speaking;
                    self.last_voice_end = end_secs;
                    VadEvent::SpeechStart
                } else {
                    VadEvent::Silence
                }
            }
            VadState::Speaking => {
                if is_speech {
                    self.last_voice_end = end_secs;
                    VadEvent::Speech
                } else {
                    self.state = VadState::TrailingSilence;
                    VadEvent::Silence
                }
            }
            VadState::TrailingSilence => {
                if is_speech {
                    self.state = VadState::Speaking;
                    self.last_voice_end = end_secs;
                    VadEvent::Speech
                } else if end_secs - self.last_voice_end >= self.config.hang_secs {
                    self.state = VadState::Idle;
                    VadEvent::SpeechEnd
                } else {
                    VadEvent::Silence
                }
            }
        }
    }

    /// End time of the most recent voiced window.
    pub fn last_voice_end(&self) -> f64 {
        self.last_voice_end
    }

    /// Whether an activity run is open (speaking or inside its hang time).
    pub fn is_active(&self) -> bool {
        self.state != VadState::Idle
    }

    /// Force any open activity run closed, returning its end time.
    pub fn finish(&mut self) -> Option<f64> {
        if self.is_active() {
            self.state = VadState::Idle;
            Some(self.last_voice_end)
        } else {
            None
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }
}

/// Calculates the Root Mean Square of audio samples, normalized so that
/// 0.0 is silence and 1.0 is maximum amplitude.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
