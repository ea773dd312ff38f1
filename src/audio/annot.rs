use std::path::Path;

use crate::dsp::segment::SegmentParams;
use crate::error::RecordingError;
use crate::types::AudioData;

/// Units the onset/offset arrays of an annotation are expressed in.
///
/// Annotation formats differ: some store times in seconds (or milliseconds,
/// converted by the loader), others store raw sample indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotUnits {
    Seconds,
    Samples,
}

/// Segment annotation for one recording, as produced by a format-specific
/// loader: parallel onset/offset/label arrays, plus the segmentation
/// parameters the annotation was made with when the format records them.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub onsets: Vec<f64>,
    pub offsets: Vec<f64>,
    pub labels: Vec<char>,
    pub units: AnnotUnits,
    /// Parameters embedded in the annotation file, in seconds. `None` for
    /// formats that do not store them.
    pub segment_params: Option<SegmentParams>,
}

/// Loads raw waveforms. Implemented per file format.
pub trait AudioLoader {
    fn load_audio(&self, path: &Path) -> Result<AudioData, RecordingError>;
}

/// Loads segment annotations. Implementations return
/// [`RecordingError::AnnotationNotFound`] when no annotation exists for the
/// given recording.
pub trait AnnotationLoader {
    fn load_annotation(&self, path: &Path) -> Result<Annotation, RecordingError>;
}

/// A file format that can supply both the waveform and its annotation.
pub trait FormatLoader: AudioLoader + AnnotationLoader {}

impl<T: AudioLoader + AnnotationLoader> FormatLoader for T {}
