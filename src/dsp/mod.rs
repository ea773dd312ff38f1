pub mod segment;
pub mod spectrogram;
pub mod window;
