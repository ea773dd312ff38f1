use std::cell::RefCell;

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

use crate::dsp::window::{dpss_window, hann_window};
use crate::error::{ConfigError, SpectError};
use crate::types::{Spect, SpectMatrix};

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f64>> = RefCell::new(RealFftPlanner::new());
}

/// DPSS shape parameter numerator: the presets use a window bandwidth of
/// `4 / nperseg`, as in Koumura & Okanoya 2016.
const DPSS_WIDTH_NUMERATOR: f64 = 4.0;

/// Raw spectrogram parameters as they arrive from a config file.
///
/// Nothing here is trusted; `SpectConfig::from_params` validates the whole
/// bundle and resolves it into a canonical [`SpectConfig`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectParams {
    /// Named preset: "tachibana" or "koumura". Mutually exclusive with the
    /// explicit parameters; explicit values win with a warning if both are
    /// given.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    /// Samples per FFT segment, e.g. 512.
    pub nperseg: Option<i64>,
    /// Overlapping samples between consecutive segments.
    pub noverlap: Option<i64>,
    /// Frequency band to keep, `[low, high)` in Hz.
    pub freq_cutoffs: Option<Vec<i64>>,
    /// Window applied to each segment: "Hann" or "dpss".
    pub window: Option<String>,
    /// Pre-filter applied to the raw audio: "diff" for a first difference.
    pub filter_func: Option<String>,
    /// Spectrogram backend: "psd" or "stft".
    pub spect_func: Option<String>,
    /// Apply log10 to the spectrogram to increase its range.
    pub log_transform_spect: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowFn {
    Hann,
    Dpss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterFn {
    Diff,
}

/// Which transform produces the matrix.
///
/// `Psd` gives a one-sided power spectral density (what amplitude
/// segmentation expects). `ComplexStft` gives unscaled complex STFT columns
/// for features that need the frequency spectrum before any magnitude or log
/// step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpectBackend {
    Psd,
    ComplexStft,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Tachibana, Oosugi & Okanoya 2014: 256/192, Hann, first-difference
    /// filter, complex STFT, no log transform.
    Tachibana,
    /// Koumura & Okanoya 2016: 512/480, DPSS, 1-8 kHz band, PSD, log
    /// transform.
    Koumura,
}

/// Canonical, validated spectrogram configuration.
///
/// Constructed once via [`SpectConfig::preset`] or
/// [`SpectConfig::from_params`]; immutable afterwards, so `noverlap <
/// nperseg` and band ordering hold for the lifetime of the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpectConfig {
    nperseg: usize,
    noverlap: usize,
    freq_cutoffs: Option<(u32, u32)>,
    window: Option<WindowFn>,
    filter: Option<FilterFn>,
    backend: SpectBackend,
    log_transform: bool,
}

impl SpectConfig {
    pub fn preset(preset: Preset) -> SpectConfig {
        match preset {
            Preset::Tachibana => SpectConfig {
                nperseg: 256,
                noverlap: 192,
                freq_cutoffs: None,
                window: Some(WindowFn::Hann),
                filter: Some(FilterFn::Diff),
                backend: SpectBackend::ComplexStft,
                log_transform: false,
            },
            Preset::Koumura => SpectConfig {
                nperseg: 512,
                noverlap: 480,
                freq_cutoffs: Some((1000, 8000)),
                window: Some(WindowFn::Dpss),
                filter: None,
                backend: SpectBackend::Psd,
                log_transform: true,
            },
        }
    }

    /// Validate raw parameters and resolve them into a config.
    ///
    /// All violations are collected before failing, so a bad config file is
    /// reported in full rather than one field at a time.
    pub fn from_params(params: &SpectParams) -> Result<SpectConfig, ConfigError> {
        let mut violations = Vec::new();

        let base = match params.reference.as_deref() {
            Some("tachibana") => Some(Self::preset(Preset::Tachibana)),
            Some("koumura") => Some(Self::preset(Preset::Koumura)),
            Some(other) => {
                violations.push(format!(
                    "'{other}' is not a valid value for 'ref'; valid values: 'tachibana', 'koumura'"
                ));
                None
            }
            None => None,
        };

        let has_explicit = params.nperseg.is_some()
            || params.noverlap.is_some()
            || params.freq_cutoffs.is_some()
            || params.window.is_some()
            || params.filter_func.is_some()
            || params.spect_func.is_some()
            || params.log_transform_spect.is_some();
        if base.is_some() && has_explicit {
            log::warn!(
                "spectrogram parameters name both a preset and explicit values; \
                 explicit values take precedence for the fields they set"
            );
        }

        let nperseg = match (params.nperseg, &base) {
            (Some(n), _) if n > 0 => n as usize,
            (Some(n), _) => {
                violations.push(format!("nperseg must be a positive integer, but is {n}"));
                0
            }
            (None, Some(b)) => b.nperseg,
            (None, None) => {
                violations.push("nperseg requires a value".to_string());
                0
            }
        };

        let noverlap = match (params.noverlap, &base) {
            (Some(n), _) if n >= 0 => n as usize,
            (Some(n), _) => {
                violations.push(format!("noverlap must be a non-negative integer, but is {n}"));
                0
            }
            (None, Some(b)) => b.noverlap,
            (None, None) => {
                violations.push("noverlap requires a value".to_string());
                0
            }
        };

        if nperseg > 0 && noverlap >= nperseg {
            violations.push(format!(
                "noverlap ({noverlap}) must be less than nperseg ({nperseg})"
            ));
        }

        let freq_cutoffs = match (&params.freq_cutoffs, &base) {
            (Some(cutoffs), _) => {
                if cutoffs.len() != 2 {
                    violations.push(format!(
                        "freq_cutoffs should have 2 elements, but has {}",
                        cutoffs.len()
                    ));
                    None
                } else if cutoffs[0] < 0 || cutoffs[1] < 0 || cutoffs[0] >= cutoffs[1] {
                    violations.push(format!(
                        "freq_cutoffs must be an ascending pair of non-negative \
                         frequencies, but is [{}, {}]",
                        cutoffs[0], cutoffs[1]
                    ));
                    None
                } else {
                    Some((cutoffs[0] as u32, cutoffs[1] as u32))
                }
            }
            (None, Some(b)) => b.freq_cutoffs,
            (None, None) => None,
        };

        let window = match (params.window.as_deref(), &base) {
            (Some("Hann"), _) => Some(WindowFn::Hann),
            (Some("dpss"), _) => Some(WindowFn::Dpss),
            (Some(other), _) => {
                violations.push(format!(
                    "'{other}' is not a valid specification for window; \
                     valid values: 'Hann', 'dpss'"
                ));
                None
            }
            (None, Some(b)) => b.window,
            (None, None) => None,
        };

        let filter = match (params.filter_func.as_deref(), &base) {
            (Some("diff"), _) => Some(FilterFn::Diff),
            (Some(other), _) => {
                violations.push(format!(
                    "'{other}' is not valid for filter_func; the only valid value is 'diff'"
                ));
                None
            }
            (None, Some(b)) => b.filter,
            (None, None) => None,
        };

        let backend = match (params.spect_func.as_deref(), &base) {
            (Some("psd"), _) => SpectBackend::Psd,
            (Some("stft"), _) => SpectBackend::ComplexStft,
            (Some(other), _) => {
                violations.push(format!(
                    "'{other}' is not valid for spect_func; valid values: 'psd', 'stft'"
                ));
                SpectBackend::Psd
            }
            (None, Some(b)) => b.backend,
            (None, None) => SpectBackend::Psd,
        };

        let log_transform = match (params.log_transform_spect, &base) {
            (Some(flag), _) => flag,
            (None, Some(b)) => b.log_transform,
            (None, None) => true,
        };

        if violations.is_empty() {
            Ok(SpectConfig {
                nperseg,
                noverlap,
                freq_cutoffs,
                window,
                filter,
                backend,
                log_transform,
            })
        } else {
            Err(ConfigError { violations })
        }
    }

    pub fn nperseg(&self) -> usize {
        self.nperseg
    }

    pub fn noverlap(&self) -> usize {
        self.noverlap
    }

    pub fn freq_cutoffs(&self) -> Option<(u32, u32)> {
        self.freq_cutoffs
    }

    pub fn backend(&self) -> SpectBackend {
        self.backend
    }

    /// Make a spectrogram from a raw waveform.
    ///
    /// Returns the matrix plus its frequency axis (Hz) and time axis (s).
    /// The frequency axis and matrix rows are reversed together as the last
    /// step, so row 0 is the highest retained frequency.
    pub fn make(&self, samples: &[f32], sample_rate: u32) -> Result<Spect, SpectError> {
        let signal: Vec<f64> = match self.filter {
            // First-difference filter, which shortens the signal by one
            // sample.
            Some(FilterFn::Diff) => samples
                .windows(2)
                .map(|pair| (pair[1] - pair[0]) as f64)
                .collect(),
            None => samples.iter().map(|&s| s as f64).collect(),
        };

        if signal.len() < self.nperseg {
            return Err(SpectError::WindowTooLong);
        }

        let window = self.window.map(|w| match w {
            WindowFn::Hann => hann_window(self.nperseg),
            WindowFn::Dpss => {
                dpss_window(self.nperseg, DPSS_WIDTH_NUMERATOR / self.nperseg as f64)
            }
        });

        let (mut matrix, mut freq_bins, time_bins) = match self.backend {
            SpectBackend::Psd => psd_transform(
                &signal,
                sample_rate,
                self.nperseg,
                self.noverlap,
                window.as_deref(),
            ),
            SpectBackend::ComplexStft => stft_transform(
                &signal,
                sample_rate,
                self.nperseg,
                self.noverlap,
                window.as_deref(),
            ),
        };

        if self.log_transform {
            matrix.log10_in_place();
        }

        if let Some((low, high)) = self.freq_cutoffs {
            // Half-open band [low, high): with the koumura preset this keeps
            // exactly 112 bins, the count downstream feature extractors
            // expect.
            let start = freq_bins
                .iter()
                .position(|&f| f >= low as f64)
                .unwrap_or(freq_bins.len());
            let end = freq_bins
                .iter()
                .position(|&f| f >= high as f64)
                .unwrap_or(freq_bins.len());
            matrix.band_rows(start, end);
            freq_bins.truncate(end);
            freq_bins.drain(..start);
        }

        // Flip so the lowest retained frequency ends up in the last row; the
        // axis and matrix move together.
        freq_bins.reverse();
        matrix.reverse_rows();

        Ok(Spect {
            matrix,
            freq_bins,
            time_bins,
        })
    }
}

fn fill_frame(input: &mut [f64], frame: &[f64], window: Option<&[f64]>) {
    match window {
        Some(w) => {
            for (inp, (&s, &wv)) in input.iter_mut().zip(frame.iter().zip(w.iter())) {
                *inp = s * wv;
            }
        }
        None => input.copy_from_slice(frame),
    }
}

fn frequency_axis(nperseg: usize, fs: f64) -> Vec<f64> {
    (0..nperseg / 2 + 1)
        .map(|k| k as f64 * fs / nperseg as f64)
        .collect()
}

/// One-sided PSD spectrogram: `Sxx[k] = |X[k]|^2 / (fs * sum(w^2))`, doubled
/// at every bin except DC and Nyquist. Time bins are frame centers.
fn psd_transform(
    samples: &[f64],
    sample_rate: u32,
    nperseg: usize,
    noverlap: usize,
    window: Option<&[f64]>,
) -> (SpectMatrix, Vec<f64>, Vec<f64>) {
    let hop = nperseg - noverlap;
    let n_bins = nperseg / 2 + 1;
    let fs = sample_rate as f64;

    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(nperseg));
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    // A missing window is rectangular: sum(w^2) = nperseg.
    let win_norm: f64 = match window {
        Some(w) => w.iter().map(|v| v * v).sum(),
        None => nperseg as f64,
    };
    let scale = 1.0 / (fs * win_norm);

    let mut rows: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    let mut time_bins = Vec::new();

    let mut pos = 0;
    while pos + nperseg <= samples.len() {
        fill_frame(&mut input, &samples[pos..pos + nperseg], window);
        fft.process(&mut input, &mut spectrum).expect("FFT failed");
        for (k, row) in rows.iter_mut().enumerate() {
            let mut v = spectrum[k].norm_sqr() * scale;
            if k != 0 && !(nperseg % 2 == 0 && k == nperseg / 2) {
                v *= 2.0;
            }
            row.push(v);
        }
        time_bins.push((pos + nperseg / 2) as f64 / fs);
        pos += hop;
    }

    (
        SpectMatrix::Power(rows),
        frequency_axis(nperseg, fs),
        time_bins,
    )
}

/// Complex STFT spectrogram: raw windowed rFFT columns with no scaling, for
/// downstream features that need the spectrum before any magnitude step.
fn stft_transform(
    samples: &[f64],
    sample_rate: u32,
    nperseg: usize,
    noverlap: usize,
    window: Option<&[f64]>,
) -> (SpectMatrix, Vec<f64>, Vec<f64>) {
    let hop = nperseg - noverlap;
    let n_bins = nperseg / 2 + 1;
    let fs = sample_rate as f64;

    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(nperseg));
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut rows: Vec<Vec<Complex<f64>>> = vec![Vec::new(); n_bins];
    let mut time_bins = Vec::new();

    let mut pos = 0;
    while pos + nperseg <= samples.len() {
        fill_frame(&mut input, &samples[pos..pos + nperseg], window);
        fft.process(&mut input, &mut spectrum).expect("FFT failed");
        for (k, row) in rows.iter_mut().enumerate() {
            row.push(spectrum[k]);
        }
        time_bins.push((pos + nperseg / 2) as f64 / fs);
        pos += hop;
    }

    (
        SpectMatrix::Complex(rows),
        frequency_axis(nperseg, fs),
        time_bins,
    )
}
