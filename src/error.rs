use std::path::PathBuf;

use thiserror::Error;

/// Invalid spectrogram parameters.
///
/// Every violation found during validation is collected, so one failure
/// reports everything wrong with the configuration at once.
#[derive(Debug, Error)]
#[error("invalid spectrogram parameters: {}", .violations.join("; "))]
pub struct ConfigError {
    pub violations: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SpectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The analysis window is longer than the input signal. Recoverable when
    /// making per-syllable spectrograms; fatal on a whole-recording pass.
    #[error("window is longer than input signal")]
    WindowTooLong,
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error(transparent)]
    Spect(#[from] SpectError),

    #[error("could not find an annotation file for {}", .path.display())]
    AnnotationNotFound { path: PathBuf },

    #[error(
        "segmenting parameter '{param}' ({given}) does not match the value \
         recorded in the annotation file ({from_file})"
    )]
    ConfigMismatch {
        param: &'static str,
        given: f64,
        from_file: f64,
    },

    #[error(
        "segment {index} has offset sample {offset} at or before its onset \
         sample {onset}"
    )]
    SegmentOutOfOrder {
        index: usize,
        onset: usize,
        offset: usize,
    },

    #[error("syllable spectrogram width must be a positive number of seconds, but is {width}")]
    InvalidWidth { width: f64 },

    #[error(
        "syllable {index} with label '{label}' is {duration} samples long, \
         greater than the width of {width} samples requested for all \
         syllable spectrograms"
    )]
    SyllableTooLong {
        index: usize,
        label: char,
        duration: usize,
        width: usize,
    },

    #[error(
        "requested syllable spectrogram width ({width} samples) is longer \
         than the recording ({len} samples)"
    )]
    WidthExceedsRecording { width: usize, len: usize },

    #[error("selection mask not set; call set_syls_to_use before extracting syllables")]
    SelectionNotSet,

    #[error("use_annotation is false but no {missing} were provided; they are required to find segments")]
    MissingParams { missing: &'static str },

    #[error("failed to read audio from {}: {source}", .path.display())]
    Audio {
        path: PathBuf,
        source: hound::Error,
    },
}
