use std::path::{Path, PathBuf};

use crate::audio::annot::{AnnotUnits, Annotation, FormatLoader};
use crate::dsp::segment::{compute_amp, segment_song, SegmentParams};
use crate::dsp::spectrogram::SpectConfig;
use crate::error::{RecordingError, SpectError};
use crate::types::{AudioData, Spect};

/// One segmented unit of vocalization, carrying its audio slice and
/// spectrogram for downstream feature extraction.
///
/// Created only by syllable extraction on a [`Recording`]; immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct Syllable {
    pub audio: Vec<f32>,
    pub sample_rate: u32,
    /// `None` when the slice was too short for the configured window; the
    /// sentinel lets siblings in the batch keep their spectrograms.
    pub spect: Option<Spect>,
    /// FFT segment length the spectrogram was made with.
    pub nperseg: usize,
    /// FFT segment overlap the spectrogram was made with.
    pub noverlap: usize,
    /// Frequency band the spectrogram was limited to, if any.
    pub freq_cutoffs: Option<(u32, u32)>,
    /// Index of this syllable within the recording's annotation.
    pub index: usize,
    pub label: char,
}

/// Which labelled syllables to select for extraction.
#[derive(Clone, Debug)]
pub enum LabelFilter {
    All,
    /// Syllables whose label appears in the set, e.g. "iab" selects labels
    /// 'i', 'a' and 'b'.
    Labels(String),
}

/// A loaded recording with its segment annotation.
///
/// Lifecycle: construct (annotated, either loaded or self-segmented), then
/// `set_syls_to_use`, then extract syllables. Extraction reruns freely with
/// different parameters and replaces the stored syllable list.
#[derive(Clone, Debug)]
pub struct Recording {
    pub filename: PathBuf,
    pub audio: AudioData,
    /// Segment boundaries in seconds.
    pub onsets_s: Vec<f64>,
    pub offsets_s: Vec<f64>,
    /// Segment boundaries as sample indices into the waveform.
    pub onsets_hz: Vec<usize>,
    pub offsets_hz: Vec<usize>,
    /// One label per segment; '-' placeholders for self-segmented songs.
    pub labels: Vec<char>,
    syls_to_use: Option<Vec<bool>>,
    syllables: Vec<Syllable>,
}

impl Recording {
    /// Build a recording from an externally loaded annotation.
    ///
    /// When the annotation file embeds the segmentation parameters it was
    /// made with and the caller supplies their own, every field must agree;
    /// a silent mismatch would make the segments incomparable across the
    /// data set.
    pub fn from_annotation(
        filename: impl Into<PathBuf>,
        audio: AudioData,
        annot: Annotation,
        segment_params: Option<&SegmentParams>,
    ) -> Result<Self, RecordingError> {
        if let (Some(given), Some(from_file)) = (segment_params, annot.segment_params.as_ref()) {
            check_segment_params(given, from_file)?;
        }

        let fs = audio.sample_rate as f64;
        let (onsets_s, offsets_s, onsets_hz, mut offsets_hz) = match annot.units {
            AnnotUnits::Seconds => {
                // Onset sample is one before the rounded position: the first
                // sample of the segment, not the boundary after it.
                let onsets_hz: Vec<usize> = annot
                    .onsets
                    .iter()
                    .map(|&s| ((s * fs).round() as i64 - 1).max(0) as usize)
                    .collect();
                let offsets_hz: Vec<usize> = annot
                    .offsets
                    .iter()
                    .map(|&s| (s * fs).round().max(0.0) as usize)
                    .collect();
                (annot.onsets, annot.offsets, onsets_hz, offsets_hz)
            }
            AnnotUnits::Samples => {
                let onsets_s = annot.onsets.iter().map(|&n| n / fs).collect();
                let offsets_s = annot.offsets.iter().map(|&n| n / fs).collect();
                let onsets_hz = annot.onsets.iter().map(|&n| n.max(0.0) as usize).collect();
                let offsets_hz = annot.offsets.iter().map(|&n| n.max(0.0) as usize).collect();
                (onsets_s, offsets_s, onsets_hz, offsets_hz)
            }
        };

        // Annotation files routinely run a sample or two past the waveform
        // after rounding or file truncation; clamp those. An offset at or
        // before its onset is corrupt, not a rounding artifact.
        let n_samples = audio.samples.len();
        for (index, (&onset, offset)) in
            onsets_hz.iter().zip(offsets_hz.iter_mut()).enumerate()
        {
            if *offset > n_samples {
                log::warn!(
                    "segment {index} offset at sample {offset} runs past the end of \
                     the waveform ({n_samples} samples); clamping"
                );
                *offset = n_samples;
            }
            if onset >= *offset {
                return Err(RecordingError::SegmentOutOfOrder {
                    index,
                    onset,
                    offset: *offset,
                });
            }
        }

        Ok(Self {
            filename: filename.into(),
            audio,
            onsets_s,
            offsets_s,
            onsets_hz,
            offsets_hz,
            labels: annot.labels,
            syls_to_use: None,
            syllables: Vec::new(),
        })
    }

    /// Build a recording by segmenting the waveform itself: whole-recording
    /// spectrogram, amplitude envelope, threshold crossing.
    ///
    /// Labels are '-' placeholders until the syllables are classified. A
    /// `WindowTooLong` here is fatal; there is nothing per-syllable to skip.
    pub fn from_segmentation(
        filename: impl Into<PathBuf>,
        audio: AudioData,
        spect_config: &SpectConfig,
        segment_params: &SegmentParams,
    ) -> Result<Self, RecordingError> {
        let spect = spect_config.make(&audio.samples, audio.sample_rate)?;
        let amp = compute_amp(&spect.matrix);
        let (onsets_s, offsets_s) = segment_song(&amp, &spect.time_bins, segment_params);

        let fs = audio.sample_rate as f64;
        let onsets_hz = onsets_s.iter().map(|&s| (s * fs).round() as usize).collect();
        let offsets_hz = offsets_s.iter().map(|&s| (s * fs).round() as usize).collect();
        let labels = vec!['-'; onsets_s.len()];

        Ok(Self {
            filename: filename.into(),
            audio,
            onsets_s,
            offsets_s,
            onsets_hz,
            offsets_hz,
            labels,
            syls_to_use: None,
            syllables: Vec::new(),
        })
    }

    /// Load a recording through a format loader, taking segments either from
    /// an annotation file or by segmenting the audio.
    ///
    /// With `use_annotation`, a missing annotation file propagates as
    /// [`RecordingError::AnnotationNotFound`]. Without it, both
    /// `segment_params` and `spect_config` are required.
    pub fn open(
        path: impl AsRef<Path>,
        loader: &dyn FormatLoader,
        use_annotation: bool,
        segment_params: Option<&SegmentParams>,
        spect_config: Option<&SpectConfig>,
    ) -> Result<Self, RecordingError> {
        let path = path.as_ref();
        let audio = loader.load_audio(path)?;

        if use_annotation {
            let annot = loader.load_annotation(path)?;
            Self::from_annotation(path, audio, annot, segment_params)
        } else {
            let segment_params = segment_params.ok_or(RecordingError::MissingParams {
                missing: "segment_params",
            })?;
            let spect_config = spect_config.ok_or(RecordingError::MissingParams {
                missing: "spect_params",
            })?;
            Self::from_segmentation(path, audio, spect_config, segment_params)
        }
    }

    /// Number of annotated segments.
    pub fn n_segments(&self) -> usize {
        self.onsets_s.len()
    }

    /// Compute the boolean selection mask from a label filter. Must be
    /// called before extracting syllables.
    pub fn set_syls_to_use(&mut self, filter: &LabelFilter) {
        let mask = match filter {
            LabelFilter::All => vec![true; self.labels.len()],
            LabelFilter::Labels(set) => self.labels.iter().map(|l| set.contains(*l)).collect(),
        };
        self.syls_to_use = Some(mask);
    }

    pub fn syls_to_use(&self) -> Option<&[bool]> {
        self.syls_to_use.as_deref()
    }

    /// Syllables from the most recent extraction.
    pub fn syllables(&self) -> &[Syllable] {
        &self.syllables
    }

    /// Slice out each selected syllable and make its spectrogram, storing
    /// the records on the recording. Rerunning with different parameters
    /// replaces the stored list.
    ///
    /// `syl_spect_width`, when given, fixes every slice to that many seconds
    /// of audio with the syllable centered inside (for classifiers that need
    /// constant-size inputs); see [`RecordingError::SyllableTooLong`] for
    /// syllables that cannot fit.
    pub fn make_syl_spects(
        &mut self,
        spect_config: &SpectConfig,
        syl_spect_width: Option<f64>,
    ) -> Result<&[Syllable], RecordingError> {
        let syls = self.build_syllables(spect_config, syl_spect_width)?;
        self.syllables = syls;
        Ok(&self.syllables)
    }

    /// Compute syllable records without touching the stored list, e.g. to
    /// try different spectrogram parameters against syllables that have
    /// already been set.
    pub fn syl_spects(
        &self,
        spect_config: &SpectConfig,
        syl_spect_width: Option<f64>,
    ) -> Result<Vec<Syllable>, RecordingError> {
        self.build_syllables(spect_config, syl_spect_width)
    }

    fn build_syllables(
        &self,
        spect_config: &SpectConfig,
        syl_spect_width: Option<f64>,
    ) -> Result<Vec<Syllable>, RecordingError> {
        let mask = self
            .syls_to_use
            .as_ref()
            .ok_or(RecordingError::SelectionNotSet)?;

        let n_samples = self.audio.samples.len();
        let width_hz: Option<usize> = match syl_spect_width {
            Some(width_s) => {
                if width_s.is_nan() || width_s <= 0.0 {
                    return Err(RecordingError::InvalidWidth { width: width_s });
                }
                if width_s > 1.0 {
                    log::warn!(
                        "syl_spect_width of {width_s} s is unusually wide; syllables are \
                         centered within it and memory use grows with it"
                    );
                }
                let width = (width_s * self.audio.sample_rate as f64) as usize;
                if width > n_samples {
                    return Err(RecordingError::WidthExceedsRecording {
                        width,
                        len: n_samples,
                    });
                }
                Some(width)
            }
            None => None,
        };

        let mut syls = Vec::new();
        for (ind, ((&onset, &offset), &label)) in self
            .onsets_hz
            .iter()
            .zip(self.offsets_hz.iter())
            .zip(self.labels.iter())
            .enumerate()
        {
            if !mask.get(ind).copied().unwrap_or(false) {
                continue;
            }

            let syl_audio: &[f32] = match width_hz {
                Some(width) => {
                    let duration = offset - onset;
                    if duration > width {
                        return Err(RecordingError::SyllableTooLong {
                            index: ind,
                            label,
                            duration,
                            width,
                        });
                    }
                    // Center the syllable: half the leftover width on each
                    // side, clamped at the recording boundaries.
                    let width_diff = width - duration;
                    let mut left = (width_diff as f64 / 2.0).round() as usize;
                    let mut right = width_diff - left;
                    if left > onset {
                        left = 0;
                        right = width_diff;
                        if offset + right > n_samples {
                            right = n_samples - offset;
                        }
                    } else if offset + right > n_samples {
                        right = n_samples - offset;
                        left = width_diff - right;
                    }
                    &self.audio.samples[onset - left..offset + right]
                }
                None => &self.audio.samples[onset..offset.min(n_samples)],
            };

            let spect = match spect_config.make(syl_audio, self.audio.sample_rate) {
                Ok(spect) => Some(spect),
                Err(SpectError::WindowTooLong) => {
                    log::warn!(
                        "segment {ind} with label '{label}' in {} is not long enough for \
                         the window function; no spectrogram recorded",
                        self.filename.display()
                    );
                    None
                }
                Err(err) => return Err(err.into()),
            };

            syls.push(Syllable {
                audio: syl_audio.to_vec(),
                sample_rate: self.audio.sample_rate,
                spect,
                nperseg: spect_config.nperseg(),
                noverlap: spect_config.noverlap(),
                freq_cutoffs: spect_config.freq_cutoffs(),
                index: ind,
                label,
            });
        }

        Ok(syls)
    }
}

fn check_segment_params(
    given: &SegmentParams,
    from_file: &SegmentParams,
) -> Result<(), RecordingError> {
    let fields = [
        ("threshold", given.threshold, from_file.threshold),
        ("min_syl_dur", given.min_syl_dur, from_file.min_syl_dur),
        (
            "min_silent_dur",
            given.min_silent_dur,
            from_file.min_silent_dur,
        ),
    ];
    for (param, given, from_file) in fields {
        if given != from_file {
            return Err(RecordingError::ConfigMismatch {
                param,
                given,
                from_file,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::spectrogram::SpectParams;

    fn sine(freq: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (2.0 * std::f64::consts::PI * freq * t).sin() as f32
            })
            .collect()
    }

    fn small_config() -> SpectConfig {
        let params = SpectParams {
            nperseg: Some(64),
            noverlap: Some(32),
            log_transform_spect: Some(false),
            ..SpectParams::default()
        };
        SpectConfig::from_params(&params).unwrap()
    }

    /// Recording with three annotated syllables ('a', 'b', 'a') at known
    /// sample positions in a 32 kHz, 1 s waveform.
    fn annotated_recording() -> Recording {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![1000.0, 10000.0, 20000.0],
            offsets: vec![4000.0, 14000.0, 24000.0],
            labels: vec!['a', 'b', 'a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        Recording::from_annotation("song1.wav", audio, annot, None).unwrap()
    }

    #[test]
    fn test_samples_annotation_converted_to_seconds() {
        let rec = annotated_recording();
        assert_eq!(rec.onsets_hz, vec![1000, 10000, 20000]);
        assert!((rec.onsets_s[0] - 1000.0 / 32000.0).abs() < 1e-12);
        assert!((rec.offsets_s[2] - 24000.0 / 32000.0).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_annotation_converted_to_samples() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![0.125, 0.5],
            offsets: vec![0.25, 0.625],
            labels: vec!['a', 'b'],
            units: AnnotUnits::Seconds,
            segment_params: None,
        };
        let rec = Recording::from_annotation("song2.wav", audio, annot, None).unwrap();
        // Onset sample index is round(s * fs) - 1
        assert_eq!(rec.onsets_hz, vec![3999, 15999]);
        assert_eq!(rec.offsets_hz, vec![8000, 20000]);
    }

    #[test]
    fn test_config_mismatch_detected() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![1000.0],
            offsets: vec![4000.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: Some(SegmentParams {
                threshold: 3000.0,
                ..SegmentParams::default()
            }),
        };
        let given = SegmentParams::default();
        match Recording::from_annotation("song3.wav", audio, annot, Some(&given)) {
            Err(RecordingError::ConfigMismatch { param, .. }) => assert_eq!(param, "threshold"),
            other => panic!("expected ConfigMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_matching_embedded_params_accepted() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![1000.0],
            offsets: vec![4000.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: Some(SegmentParams::default()),
        };
        let given = SegmentParams::default();
        assert!(Recording::from_annotation("song4.wav", audio, annot, Some(&given)).is_ok());
    }

    #[test]
    fn test_extraction_requires_selection() {
        let mut rec = annotated_recording();
        match rec.make_syl_spects(&small_config(), None) {
            Err(RecordingError::SelectionNotSet) => {}
            other => panic!("expected SelectionNotSet, got {other:?}"),
        }
    }

    #[test]
    fn test_label_filter_masks_selection() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::Labels("a".to_string()));
        assert_eq!(rec.syls_to_use(), Some(&[true, false, true][..]));

        let syls = rec.make_syl_spects(&small_config(), None).unwrap();
        assert_eq!(syls.len(), 2);
        assert_eq!(syls[0].index, 0);
        assert_eq!(syls[1].index, 2);
        assert!(syls.iter().all(|s| s.label == 'a'));
    }

    #[test]
    fn test_select_all() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        let syls = rec.make_syl_spects(&small_config(), None).unwrap();
        assert_eq!(syls.len(), 3);
        // Unwindowed slices keep their annotated duration
        assert_eq!(syls[0].audio.len(), 3000);
    }

    #[test]
    fn test_syllables_carry_spect_and_params() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        rec.make_syl_spects(&small_config(), None).unwrap();

        for syl in rec.syllables() {
            let spect = syl.spect.as_ref().expect("long-enough slice");
            assert_eq!(spect.matrix.n_rows(), spect.freq_bins.len());
            assert_eq!(spect.matrix.n_cols(), spect.time_bins.len());
            assert_eq!(syl.nperseg, 64);
            assert_eq!(syl.noverlap, 32);
        }
    }

    #[test]
    fn test_fixed_width_centers_syllable() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);

        // 0.25 s = 8000 samples; syllable 1 is 4000 samples, so 2000 of
        // padding on each side.
        let start_sample = rec.audio.samples[10000 - 2000];
        let syls = rec.make_syl_spects(&small_config(), Some(0.25)).unwrap();
        assert!(syls.iter().all(|s| s.audio.len() == 8000));
        assert_eq!(syls[1].audio[0], start_sample);
    }

    #[test]
    fn test_fixed_width_odd_difference_splits_left_heavy() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        // 999-sample syllable in a 2000-sample window: diff = 1001,
        // left = round(1001/2) = 501, right = 500.
        let annot = Annotation {
            onsets: vec![10000.0],
            offsets: vec![10999.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        let mut rec = Recording::from_annotation("odd.wav", audio, annot, None).unwrap();
        rec.set_syls_to_use(&LabelFilter::All);
        let start_sample = rec.audio.samples[10000 - 501];
        let syls = rec.make_syl_spects(&small_config(), Some(0.0625)).unwrap();
        assert_eq!(syls[0].audio.len(), 2000);
        assert_eq!(syls[0].audio[0], start_sample);
    }

    #[test]
    fn test_fixed_width_clamps_at_recording_start() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![0.0],
            offsets: vec![1000.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        let mut rec = Recording::from_annotation("start.wav", audio, annot, None).unwrap();
        rec.set_syls_to_use(&LabelFilter::All);

        // Width 2000 samples; syllable at sample 0, so all padding lands on
        // the right: slice is [0, 2000).
        let start_sample = rec.audio.samples[0];
        let syls = rec.make_syl_spects(&small_config(), Some(0.0625)).unwrap();
        assert_eq!(syls[0].audio.len(), 2000);
        assert_eq!(syls[0].audio[0], start_sample);
    }

    #[test]
    fn test_fixed_width_clamps_at_recording_end() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![31000.0],
            offsets: vec![32000.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        let mut rec = Recording::from_annotation("end.wav", audio, annot, None).unwrap();
        rec.set_syls_to_use(&LabelFilter::All);

        // All padding shifts to the left: slice is [30000, 32000).
        let start_sample = rec.audio.samples[30000];
        let syls = rec.make_syl_spects(&small_config(), Some(0.0625)).unwrap();
        assert_eq!(syls[0].audio.len(), 2000);
        assert_eq!(syls[0].audio[0], start_sample);
    }

    #[test]
    fn test_offset_past_waveform_end_is_clamped() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        // Offset one sample past the 32000-sample waveform, as a rounded-up
        // annotation can produce.
        let annot = Annotation {
            onsets: vec![31000.0],
            offsets: vec![32001.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        let mut rec = Recording::from_annotation("past.wav", audio, annot, None).unwrap();
        assert_eq!(rec.offsets_hz, vec![32000]);

        rec.set_syls_to_use(&LabelFilter::All);
        let syls = rec.make_syl_spects(&small_config(), Some(0.0625)).unwrap();
        assert_eq!(syls[0].audio.len(), 2000);
    }

    #[test]
    fn test_inverted_segment_rejected() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        let annot = Annotation {
            onsets: vec![4000.0],
            offsets: vec![1000.0],
            labels: vec!['a'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        match Recording::from_annotation("inverted.wav", audio, annot, None) {
            Err(RecordingError::SegmentOutOfOrder { index, onset, offset }) => {
                assert_eq!(index, 0);
                assert_eq!(onset, 4000);
                assert_eq!(offset, 1000);
            }
            other => panic!("expected SegmentOutOfOrder, got {other:?}"),
        }
    }

    #[test]
    fn test_nonpositive_width_rejected() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        for bad in [-1.0, 0.0, f64::NAN] {
            match rec.make_syl_spects(&small_config(), Some(bad)) {
                Err(RecordingError::InvalidWidth { .. }) => {}
                other => panic!("expected InvalidWidth for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_syllable_longer_than_width_errors() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);

        // 0.05 s = 1600 samples, shorter than every syllable
        match rec.make_syl_spects(&small_config(), Some(0.05)) {
            Err(RecordingError::SyllableTooLong { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected SyllableTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_width_longer_than_recording_errors() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        match rec.make_syl_spects(&small_config(), Some(2.0)) {
            Err(RecordingError::WidthExceedsRecording { .. }) => {}
            other => panic!("expected WidthExceedsRecording, got {other:?}"),
        }
    }

    #[test]
    fn test_too_short_syllable_gets_sentinel_not_failure() {
        let sample_rate = 32000;
        let audio = AudioData::new(sine(2000.0, sample_rate, 32000), sample_rate);
        // First syllable is 32 samples, shorter than the 64-sample window;
        // second is long enough.
        let annot = Annotation {
            onsets: vec![100.0, 10000.0],
            offsets: vec![132.0, 14000.0],
            labels: vec!['a', 'b'],
            units: AnnotUnits::Samples,
            segment_params: None,
        };
        let mut rec = Recording::from_annotation("short.wav", audio, annot, None).unwrap();
        rec.set_syls_to_use(&LabelFilter::All);

        let syls = rec.make_syl_spects(&small_config(), None).unwrap();
        assert_eq!(syls.len(), 2);
        assert!(syls[0].spect.is_none(), "sentinel for the short slice");
        assert!(syls[1].spect.is_some(), "sibling keeps its spectrogram");
    }

    #[test]
    fn test_rerun_overwrites_stored_syllables() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        rec.make_syl_spects(&small_config(), None).unwrap();
        assert_eq!(rec.syllables().len(), 3);

        rec.set_syls_to_use(&LabelFilter::Labels("b".to_string()));
        rec.make_syl_spects(&small_config(), None).unwrap();
        assert_eq!(rec.syllables().len(), 1);
        assert_eq!(rec.syllables()[0].label, 'b');
    }

    #[test]
    fn test_syl_spects_does_not_mutate() {
        let mut rec = annotated_recording();
        rec.set_syls_to_use(&LabelFilter::All);
        rec.make_syl_spects(&small_config(), None).unwrap();

        let independent = rec.syl_spects(&small_config(), Some(0.25)).unwrap();
        assert_eq!(independent.len(), 3);
        assert_eq!(independent[0].audio.len(), 8000);
        // Stored list untouched
        assert_eq!(rec.syllables()[0].audio.len(), 3000);
    }

    #[test]
    fn test_from_segmentation_finds_injected_syllables() {
        // Two loud tone bursts separated by silence
        let sample_rate = 32000u32;
        let mut samples = vec![0.0f32; 32000];
        let burst = |samples: &mut [f32], start: usize, end: usize| {
            for (i, s) in samples[start..end].iter_mut().enumerate() {
                let t = i as f64 / sample_rate as f64;
                *s = (2.0 * std::f64::consts::PI * 3000.0 * t).sin() as f32 * 10000.0;
            }
        };
        burst(&mut samples, 4000, 8000);
        burst(&mut samples, 16000, 20000);
        let audio = AudioData::new(samples, sample_rate);

        let params = SpectParams {
            nperseg: Some(512),
            noverlap: Some(480),
            window: Some("Hann".to_string()),
            log_transform_spect: Some(false),
            ..SpectParams::default()
        };
        let config = SpectConfig::from_params(&params).unwrap();
        let seg_params = SegmentParams {
            threshold: 1000.0,
            min_syl_dur: 0.02,
            min_silent_dur: 0.002,
        };

        let rec =
            Recording::from_segmentation("synth.wav", audio, &config, &seg_params).unwrap();
        assert_eq!(rec.n_segments(), 2);
        assert_eq!(rec.labels, vec!['-', '-']);
        // Boundaries within ~2 hops of the injected bursts
        let tol = 2.0 * 32.0 / sample_rate as f64 + 512.0 / sample_rate as f64;
        assert!((rec.onsets_s[0] - 4000.0 / sample_rate as f64).abs() < tol);
        assert!((rec.offsets_s[1] - 20000.0 / sample_rate as f64).abs() < tol);
    }

    struct StubLoader {
        annotated: bool,
    }

    impl crate::audio::annot::AudioLoader for StubLoader {
        fn load_audio(&self, _path: &std::path::Path) -> Result<AudioData, RecordingError> {
            Ok(AudioData::new(sine(2000.0, 32000, 32000), 32000))
        }
    }

    impl crate::audio::annot::AnnotationLoader for StubLoader {
        fn load_annotation(&self, path: &std::path::Path) -> Result<Annotation, RecordingError> {
            if !self.annotated {
                return Err(RecordingError::AnnotationNotFound {
                    path: path.to_path_buf(),
                });
            }
            Ok(Annotation {
                onsets: vec![1000.0],
                offsets: vec![4000.0],
                labels: vec!['a'],
                units: AnnotUnits::Samples,
                segment_params: None,
            })
        }
    }

    #[test]
    fn test_open_with_annotation() {
        let loader = StubLoader { annotated: true };
        let rec = Recording::open("bird0.wav", &loader, true, None, None).unwrap();
        assert_eq!(rec.n_segments(), 1);
        assert_eq!(rec.labels, vec!['a']);
    }

    #[test]
    fn test_open_missing_annotation_propagates() {
        let loader = StubLoader { annotated: false };
        match Recording::open("bird1.wav", &loader, true, None, None) {
            Err(RecordingError::AnnotationNotFound { path }) => {
                assert_eq!(path, std::path::PathBuf::from("bird1.wav"));
            }
            other => panic!("expected AnnotationNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_open_without_annotation_requires_params() {
        let loader = StubLoader { annotated: false };
        match Recording::open("bird2.wav", &loader, false, None, None) {
            Err(RecordingError::MissingParams { missing }) => {
                assert_eq!(missing, "segment_params");
            }
            other => panic!("expected MissingParams, got {other:?}"),
        }
    }

    #[test]
    fn test_from_segmentation_window_too_long_is_fatal() {
        let audio = AudioData::new(sine(2000.0, 32000, 100), 32000);
        let big = SpectParams {
            nperseg: Some(512),
            noverlap: Some(480),
            ..SpectParams::default()
        };
        let big_config = SpectConfig::from_params(&big).unwrap();
        match Recording::from_segmentation("tiny.wav", audio, &big_config, &SegmentParams::default())
        {
            Err(RecordingError::Spect(SpectError::WindowTooLong)) => {}
            other => panic!("expected WindowTooLong, got {other:?}"),
        }
    }
}
