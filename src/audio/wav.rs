use std::path::Path;

use crate::audio::annot::AudioLoader;
use crate::error::RecordingError;
use crate::types::AudioData;

/// WAV waveform loader.
///
/// Samples come back at their raw integer scale (an i16 file yields values in
/// the +/-32768 range) rather than normalized to +/-1, so amplitude
/// thresholds mean the same thing here as they do in annotation files
/// produced by the recording software. Multi-channel files are mixed down to
/// mono by averaging, since segmentation runs on a single waveform.
#[derive(Clone, Copy, Debug, Default)]
pub struct WavLoader;

impl AudioLoader for WavLoader {
    fn load_audio(&self, path: &Path) -> Result<AudioData, RecordingError> {
        let mut reader = hound::WavReader::open(path).map_err(|source| RecordingError::Audio {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|source| RecordingError::Audio {
                    path: path.to_path_buf(),
                    source,
                })?,
            hound::SampleFormat::Int => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32))
                .collect::<Result<_, _>>()
                .map_err(|source| RecordingError::Audio {
                    path: path.to_path_buf(),
                    source,
                })?,
        };

        let samples = if spec.channels > 1 {
            let ch = spec.channels as usize;
            samples
                .chunks(ch)
                .map(|frame| frame.iter().sum::<f32>() / ch as f32)
                .collect()
        } else {
            samples
        };

        Ok(AudioData::new(samples, spec.sample_rate))
    }
}
