use serde::{Deserialize, Serialize};

use crate::types::SpectMatrix;

/// Parameters for dividing a song into syllables by amplitude threshold
/// crossing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Amplitude above which a time bin counts as part of a syllable.
    pub threshold: f64,
    /// Minimum syllable duration in seconds. Default 0.02 (20 ms).
    pub min_syl_dur: f64,
    /// Minimum silent gap between syllables in seconds. Default 0.002 (2 ms).
    pub min_silent_dur: f64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            threshold: 5000.0,
            min_syl_dur: 0.02,
            min_silent_dur: 0.002,
        }
    }
}

/// Amplitude of a spectrogram: the sum over frequency bins in each time bin.
///
/// Assumes power spectral density values. On a complex matrix the magnitudes
/// are summed instead, but segmenting on complex STFT output is not
/// meaningful; supplying PSD data is the caller's responsibility.
pub fn compute_amp(spect: &SpectMatrix) -> Vec<f64> {
    let mut amp = vec![0.0; spect.n_cols()];
    match spect {
        SpectMatrix::Power(rows) => {
            for row in rows {
                for (a, v) in amp.iter_mut().zip(row.iter()) {
                    *a += v;
                }
            }
        }
        SpectMatrix::Complex(rows) => {
            for row in rows {
                for (a, v) in amp.iter_mut().zip(row.iter()) {
                    *a += v.norm();
                }
            }
        }
    }
    amp
}

/// Divide a song into segments based on threshold crossings of amplitude.
///
/// Returns onset and offset times in seconds, one offset per onset, in
/// ascending order. An amplitude already above threshold at the first bin
/// counts as an onset there; one still above threshold at the last bin
/// closes at the last bin, so the two sequences always stay aligned.
///
/// Silent gaps no longer than `min_silent_dur` are merged away (the
/// offset/onset pair bounding the gap is dropped), then any segment no
/// longer than `min_syl_dur` is discarded.
pub fn segment_song(
    amp: &[f64],
    time_bins: &[f64],
    params: &SegmentParams,
) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(amp.len(), time_bins.len());

    let mut onsets = Vec::new();
    let mut offsets = Vec::new();
    let mut above = false;
    for (i, &a) in amp.iter().enumerate() {
        let now_above = a > params.threshold;
        if now_above && !above {
            onsets.push(time_bins[i]);
        } else if !now_above && above {
            offsets.push(time_bins[i]);
        }
        above = now_above;
    }
    if above {
        if let Some(&last) = time_bins.last() {
            offsets.push(last);
        }
    }

    // Merge across short silent gaps: keep a boundary only when the gap
    // after it is strictly longer than min_silent_dur.
    let mut merged_onsets = Vec::with_capacity(onsets.len());
    let mut merged_offsets = Vec::with_capacity(offsets.len());
    for i in 0..onsets.len() {
        if i == 0 {
            merged_onsets.push(onsets[0]);
        } else if onsets[i] - offsets[i - 1] > params.min_silent_dur {
            merged_offsets.push(offsets[i - 1]);
            merged_onsets.push(onsets[i]);
        }
    }
    if let Some(&last) = offsets.last() {
        merged_offsets.push(last);
    }

    // Keep only segments strictly longer than min_syl_dur.
    let mut kept_onsets = Vec::with_capacity(merged_onsets.len());
    let mut kept_offsets = Vec::with_capacity(merged_offsets.len());
    for (&on, &off) in merged_onsets.iter().zip(merged_offsets.iter()) {
        if off - on > params.min_syl_dur {
            kept_onsets.push(on);
            kept_offsets.push(off);
        }
    }

    (kept_onsets, kept_offsets)
}
