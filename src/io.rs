//! Audio input for the alignment pipeline.
//!
//! The alignment engine works on an in-memory mono waveform at the
//! configured working sample rate; this module decodes local files
//! (WAV/MP3/FLAC/OGG via symphonia), mixes down to mono, crops to an
//! optional start/end range, and resamples. It performs no network I/O:
//! remote audio must be fetched by an external collaborator first.

use hound::{SampleFormat, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("hound error: {0}")]
    Hound(#[from] hound::Error),
    #[error("symphonia error: {0}")]
    Symphonia(SymphoniaError),
    #[error("no audio track found")]
    NoAudioTrack,
    #[error("unsupported number of channels")]
    UnsupportedChannels,
    #[error("resampling error: {0}")]
    Resample(String),
}

impl From<SymphoniaError> for AudioError {
    fn from(err: SymphoniaError) -> Self {
        Self::Symphonia(err)
    }
}

/// Decode an audio file into a mono waveform at `target_sr`.
///
/// `start`/`end` crop the decoded audio (in seconds, at the source rate)
/// before resampling; `end = None` reads to the end of the file.
///
/// # Errors
/// Returns [`AudioError`] if the file cannot be decoded, has no audio
/// track, or resampling fails.
pub fn load_waveform<P: AsRef<Path>>(
    path: P,
    target_sr: u32,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<Vec<f32>, AudioError> {
    let path_ref = path.as_ref();
    let mut hint = Hint::new();
    if let Some(ext) = path_ref.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let file = std::fs::File::open(path_ref).map_err(SymphoniaError::IoError)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or(AudioError::NoAudioTrack)?
        .clone();

    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);
    if channels == 0 || sample_rate == 0 {
        return Err(AudioError::UnsupportedChannels);
    }

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(audio) => audio,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let mut sb = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sb.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sb.samples());
    }

    // Mono mixdown.
    let total_frames = samples.len() / channels;
    let mut mono = Vec::with_capacity(total_frames);
    for frame in 0..total_frames {
        let mut acc = 0.0f32;
        for ch in 0..channels {
            acc += samples[frame * channels + ch];
        }
        mono.push(acc / channels as f32);
    }

    // Crop in source-rate samples.
    let start_frame = match start {
        Some(s) => ((s * sample_rate as f64) as usize).min(mono.len()),
        None => 0,
    };
    let end_frame = match end {
        Some(e) => ((e * sample_rate as f64) as usize + 1).min(mono.len()),
        None => mono.len(),
    };
    let cropped = mono[start_frame..end_frame.max(start_frame)].to_vec();

    if sample_rate == target_sr {
        return Ok(cropped);
    }
    resample(&cropped, sample_rate, target_sr)
}

/// Resample a mono waveform with a windowed-sinc resampler.
pub fn resample(data: &[f32], src_sr: u32, dst_sr: u32) -> Result<Vec<f32>, AudioError> {
    if src_sr == dst_sr || data.is_empty() {
        return Ok(data.to_vec());
    }

    let resample_ratio = dst_sr as f64 / src_sr as f64;
    let chunk_size = 1024usize;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut output: Vec<f32> = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        let mut buf = vec![0.0f32; chunk_size];
        buf[..end - offset].copy_from_slice(&data[offset..end]);

        let chunk_out = resampler
            .process(&[buf], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&chunk_out[0]);
        offset = end;
    }

    let expected = ((data.len() as f64) * resample_ratio).round() as usize;
    output.truncate(expected);
    Ok(output)
}

/// Save a mono waveform as 16-bit PCM WAV. Used by tests and diagnostics.
pub fn save_wav<P: AsRef<Path>>(path: P, data: &[f32], sample_rate: u32) -> crate::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(AudioError::Hound)?;
    for &sample in data {
        let s = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(s).map_err(AudioError::Hound)?;
    }
    writer.finalize().map_err(AudioError::Hound)?;
    Ok(())
}

/// Generate a pure tone.
pub fn tone(frequency: f32, sr: u32, duration: f32) -> Vec<f32> {
    let n_samples = (duration * sr as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sr as f32;
    (0..n_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect()
}

/// Generate a click signal with clicks at the given times (seconds).
pub fn clicks(
    times: &[f32],
    sr: u32,
    length: Option<usize>,
    click_duration: f32,
    click_freq: f32,
) -> Vec<f32> {
    let len = length.unwrap_or_else(|| {
        times.iter().fold(0.0f32, |a, &b| a.max(b)).ceil() as usize * sr as usize
    });
    let mut y = vec![0.0f32; len];

    let click_samples = (click_duration * sr as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * click_freq / sr as f32;

    for &time in times {
        let start = (time * sr as f32) as usize;
        if start >= len {
            continue;
        }
        for i in 0..click_samples {
            let idx = start + i;
            if idx >= len {
                break;
            }
            let t = i as f32;
            let envelope = (-t / (click_samples as f32 * 0.1)).exp();
            y[idx] += envelope * (angular_freq * t).sin();
        }
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_amplitude() {
        let signal = tone(440.0, 22050, 0.1);
        assert_eq!(signal.len(), 2205);
        assert!(signal.iter().any(|&x| x.abs() > 0.9));
    }

    #[test]
    fn test_clicks_places_energy() {
        let sr = 22050;
        let signal = clicks(&[0.0, 0.5], sr, Some(sr as usize), 0.01, 1000.0);
        assert_eq!(signal.len(), sr as usize);
        let click_pos = (0.5 * sr as f32) as usize;
        let window = &signal[click_pos..click_pos + 50];
        assert!(window.iter().any(|&x| x.abs() > 0.01));
    }

    #[test]
    fn test_resample_identity() {
        let signal = tone(440.0, 22050, 0.1);
        let out = resample(&signal, 22050, 22050).unwrap();
        assert_eq!(out.len(), signal.len());
    }

    #[test]
    fn test_resample_halves_length() {
        let signal = tone(440.0, 44100, 0.5);
        let out = resample(&signal, 44100, 22050).unwrap();
        let expected = signal.len() / 2;
        assert!((out.len() as i64 - expected as i64).abs() < 16);
    }

    #[test]
    fn test_save_and_load_wav_roundtrip() {
        let sr = 22050;
        let path = std::env::temp_dir().join("taktsync_io_roundtrip.wav");
        let signal = tone(440.0, sr, 0.25);
        save_wav(&path, &signal, sr).unwrap();

        let loaded = load_waveform(&path, sr, None, None).unwrap();
        assert!((loaded.len() as i64 - signal.len() as i64).abs() < 4);
        // 16-bit quantization: samples should still be close.
        for (a, b) in signal.iter().zip(loaded.iter()).take(1000) {
            assert!((a - b).abs() < 1e-3);
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_waveform_crop() {
        let sr = 22050;
        let path = std::env::temp_dir().join("taktsync_io_crop.wav");
        let signal = tone(440.0, sr, 1.0);
        save_wav(&path, &signal, sr).unwrap();

        let loaded = load_waveform(&path, sr, Some(0.25), Some(0.75)).unwrap();
        let expected = (0.5 * sr as f64) as i64;
        assert!((loaded.len() as i64 - expected).abs() < 4);
        let _ = std::fs::remove_file(path);
    }
}
