//! Short-time Fourier transform, trimmed to what the feature pipeline
//! needs: a centered, Hann-windowed forward transform.

use crate::fft::RealFftPlan;
use crate::window;
use ndarray::Array2;
use num_complex::Complex32;

/// STFT parameters.
#[derive(Debug, Clone)]
pub struct StftConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    /// Center each frame on its timestamp by zero-padding the signal.
    pub center: bool,
    pub window: Vec<f32>,
}

impl Default for StftConfig {
    fn default() -> Self {
        let n_fft = 2048;
        Self {
            n_fft,
            hop_length: n_fft / 4,
            win_length: n_fft,
            center: true,
            window: window::hann(n_fft),
        }
    }
}

impl StftConfig {
    /// Hann-windowed config with matching FFT and window lengths.
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            win_length: n_fft,
            center: true,
            window: window::hann(n_fft),
        }
    }
}

fn pad_window(window: &[f32], n_fft: usize) -> Vec<f32> {
    if window.len() == n_fft {
        return window.to_vec();
    }
    let mut padded = vec![0.0f32; n_fft];
    let start = (n_fft - window.len()) / 2;
    padded[start..start + window.len()].copy_from_slice(window);
    padded
}

fn pad_center(y: &[f32], n_fft: usize, center: bool) -> Vec<f32> {
    if !center {
        return y.to_vec();
    }
    let pad = n_fft / 2;
    let mut out = vec![0.0f32; y.len() + 2 * pad];
    out[pad..pad + y.len()].copy_from_slice(y);
    out
}

fn valid_audio(y: &[f32]) -> crate::Result<()> {
    if y.is_empty() {
        return Err(crate::Error::EmptyAudio);
    }
    if !y.iter().all(|&v| v.is_finite()) {
        return Err(crate::Error::NonFiniteAudio);
    }
    Ok(())
}

/// Compute the Short-Time Fourier Transform.
///
/// # Returns
/// Complex matrix of shape (n_fft/2 + 1, n_frames).
///
/// # Errors
/// Returns an error if the audio is empty or non-finite, or if
/// `n_fft`/`hop_length` is zero.
pub fn stft(y: &[f32], config: &StftConfig) -> crate::Result<Array2<Complex32>> {
    valid_audio(y)?;
    if config.n_fft == 0 {
        return Err(crate::Error::InvalidParameter {
            name: "n_fft",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }
    if config.hop_length == 0 {
        return Err(crate::Error::InvalidParameter {
            name: "hop_length",
            value: "0".into(),
            reason: "must be > 0".into(),
        });
    }

    let window = pad_window(&config.window, config.n_fft);
    let padded = pad_center(y, config.n_fft, config.center);
    let n_frames = if padded.len() < config.n_fft {
        0
    } else {
        (padded.len() - config.n_fft) / config.hop_length + 1
    };

    let fft = RealFftPlan::new(config.n_fft);
    let n_freq = fft.output_len();

    let mut stft_matrix = Array2::<Complex32>::zeros((n_freq, n_frames));
    let mut frame_buf = vec![0.0f32; config.n_fft];
    let mut spectrum = fft.make_output_vec();
    for frame in 0..n_frames {
        let start = frame * config.hop_length;
        for (i, slot) in frame_buf.iter_mut().enumerate() {
            let sample = padded.get(start + i).copied().unwrap_or(0.0);
            *slot = sample * window[i];
        }
        fft.forward(&mut frame_buf, &mut spectrum);
        for f in 0..n_freq {
            stft_matrix[(f, frame)] = spectrum[f];
        }
    }

    Ok(stft_matrix)
}

/// Magnitude spectrogram (|STFT|), shape (n_fft/2 + 1, n_frames).
pub fn magnitude_spectrogram(y: &[f32], config: &StftConfig) -> crate::Result<Array2<f32>> {
    let complex = stft(y, config)?;
    Ok(complex.mapv(|v| (v.re * v.re + v.im * v.im).sqrt()))
}
