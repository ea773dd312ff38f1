//! Spectrogram construction and syllable segmentation for birdsong
//! recordings.
//!
//! The pipeline runs waveform → spectrogram → amplitude envelope →
//! threshold-crossing segmentation → per-syllable windowing. A [`Recording`]
//! ties the stages together for one audio file, taking its segments either
//! from an annotation file (via a format-specific loader) or by segmenting
//! the waveform itself.

pub mod audio;
pub mod dsp;
pub mod error;
pub mod recording;
pub mod types;

pub use audio::annot::{AnnotUnits, Annotation, AnnotationLoader, AudioLoader, FormatLoader};
pub use audio::wav::WavLoader;
pub use dsp::segment::{compute_amp, segment_song, SegmentParams};
pub use dsp::spectrogram::{Preset, SpectBackend, SpectConfig, SpectParams};
pub use error::{ConfigError, RecordingError, SpectError};
pub use recording::{LabelFilter, Recording, Syllable};
pub use types::{AudioData, Spect, SpectMatrix};
