use realfft::num_complex::Complex;

#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_secs = samples.len() as f64 / sample_rate as f64;
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }
}

/// Time-frequency matrix indexed `[frequency bin][time bin]`.
///
/// The PSD backend produces `Power`; the complex-STFT backend produces
/// `Complex`, which keeps phase for downstream features that need the raw
/// frequency spectrum rather than power.
#[derive(Clone, Debug)]
pub enum SpectMatrix {
    Power(Vec<Vec<f64>>),
    Complex(Vec<Vec<Complex<f64>>>),
}

impl SpectMatrix {
    pub fn n_rows(&self) -> usize {
        match self {
            SpectMatrix::Power(rows) => rows.len(),
            SpectMatrix::Complex(rows) => rows.len(),
        }
    }

    pub fn n_cols(&self) -> usize {
        match self {
            SpectMatrix::Power(rows) => rows.first().map_or(0, Vec::len),
            SpectMatrix::Complex(rows) => rows.first().map_or(0, Vec::len),
        }
    }

    /// Keep only rows `start..end`.
    pub(crate) fn band_rows(&mut self, start: usize, end: usize) {
        match self {
            SpectMatrix::Power(rows) => {
                rows.truncate(end);
                rows.drain(..start);
            }
            SpectMatrix::Complex(rows) => {
                rows.truncate(end);
                rows.drain(..start);
            }
        }
    }

    pub(crate) fn reverse_rows(&mut self) {
        match self {
            SpectMatrix::Power(rows) => rows.reverse(),
            SpectMatrix::Complex(rows) => rows.reverse(),
        }
    }

    /// Elementwise log10. Zero power becomes -inf and is passed through
    /// untouched, never clamped.
    pub(crate) fn log10_in_place(&mut self) {
        match self {
            SpectMatrix::Power(rows) => {
                for row in rows {
                    for v in row {
                        *v = v.log10();
                    }
                }
            }
            SpectMatrix::Complex(rows) => {
                let ln10 = std::f64::consts::LN_10;
                for row in rows {
                    for v in row {
                        *v = v.ln() / ln10;
                    }
                }
            }
        }
    }
}

/// Spectrogram with its axes.
///
/// Rows and `freq_bins` stay in lockstep through band selection and the
/// final reversal, so `freq_bins[i]` is always the frequency of row `i`.
/// After `SpectConfig::make` the frequency axis runs high to low.
#[derive(Clone, Debug)]
pub struct Spect {
    pub matrix: SpectMatrix,
    /// Frequency of each row, in Hz.
    pub freq_bins: Vec<f64>,
    /// Time at the center of each column, in seconds.
    pub time_bins: Vec<f64>,
}
