use std::io::Cursor;

use anyhow::{ensure, Context};
use serde::Serialize;

/// Size of the canonical RIFF/WAVE header written in front of raw PCM.
pub const WAV_HEADER_LEN: usize = 44;

/// Largest PCM payload whose RIFF size field (`36 + len`) still fits in a u32.
pub const MAX_PCM_LEN: usize = (u32::MAX - 36) as usize;

/// Sample layout of a raw PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// What the speech endpoint returns: signed 16-bit little endian, mono, 24 kHz.
    pub const GEMINI_TTS: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bytes_per_sample() as u32
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::GEMINI_TTS
    }
}

/// Build the 44 byte header describing `data_len` bytes of PCM in `format`.
pub fn wav_header(data_len: u32, format: PcmFormat) -> [u8; WAV_HEADER_LEN] {
    let riff_size: u32 = 36u32.saturating_add(data_len);

    let mut header = [0u8; WAV_HEADER_LEN];
    let mut at = 0usize;
    let mut put = |bytes: &[u8]| {
        header[at..at + bytes.len()].copy_from_slice(bytes);
        at += bytes.len();
    };

    // RIFF descriptor
    put(b"RIFF");
    put(&riff_size.to_le_bytes());
    put(b"WAVE");

    // fmt sub-chunk
    put(b"fmt ");
    put(&16u32.to_le_bytes()); // fmt chunk size
    put(&1u16.to_le_bytes()); // PCM
    put(&format.channels.to_le_bytes());
    put(&format.sample_rate.to_le_bytes());
    put(&format.byte_rate().to_le_bytes());
    put(&format.block_align().to_le_bytes());
    put(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    put(b"data");
    put(&data_len.to_le_bytes());

    header
}

/// Data length to declare for `len` bytes of PCM.
fn declared_len(len: usize) -> anyhow::Result<u32> {
    ensure!(
        len <= MAX_PCM_LEN,
        "PCM payload of {len} bytes is too large for a WAV container"
    );
    Ok(len as u32)
}

/// Wrap raw PCM bytes in a RIFF/WAVE container.
///
/// The declared data length is always `pcm.len()`, so the output is exactly
/// `pcm.len() + 44` bytes. An empty buffer yields a header-only, silent file.
/// Payloads beyond [`MAX_PCM_LEN`] are refused rather than given a header
/// that lies about their size.
pub fn wrap_pcm(pcm: &[u8], format: PcmFormat) -> anyhow::Result<Vec<u8>> {
    let data_len = declared_len(pcm.len())?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&wav_header(data_len, format));
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Decoded facts about a WAV container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WavInfo {
    pub format: PcmFormat,
    /// Samples per channel.
    pub frames: u32,
    pub duration_secs: f64,
}

/// Parse a container with a standard decoder and report what it declares.
pub fn inspect(container: &[u8]) -> anyhow::Result<WavInfo> {
    let reader = hound::WavReader::new(Cursor::new(container))
        .context("container is not a readable WAV file")?;
    let spec = reader.spec();
    let frames = reader.duration();
    let duration_secs = if spec.sample_rate > 0 {
        frames as f64 / spec.sample_rate as f64
    } else {
        0.0
    };

    Ok(WavInfo {
        format: PcmFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        },
        frames,
        duration_secs,
    })
}

/// Playback length of `pcm_len` raw bytes in `format`.
pub fn pcm_duration_secs(pcm_len: usize, format: PcmFormat) -> f64 {
    let rate = format.byte_rate();
    if rate == 0 {
        return 0.0;
    }
    pcm_len as f64 / rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_thousand_zero_bytes() {
        let out = wrap_pcm(&[0u8; 1000], PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(out.len(), 1044);
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WAVE");
        assert_eq!(&out[36..40], b"data");
        assert_eq!(le_u32(&out, 40), 1000);
        assert_eq!(le_u32(&out, 4), 1036);
    }

    #[test]
    fn test_header_fields_follow_format() {
        let header = wav_header(480, PcmFormat::GEMINI_TTS);
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(le_u32(&header, 16), 16);
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 1);
        assert_eq!(le_u32(&header, 24), 24_000);
        assert_eq!(le_u32(&header, 28), 48_000);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 2);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
    }

    #[test]
    fn test_length_is_always_data_plus_header() {
        for n in [0usize, 1, 2, 17, 4096, 48_000] {
            let pcm = vec![7u8; n];
            let out = wrap_pcm(&pcm, PcmFormat::GEMINI_TTS).unwrap();
            assert_eq!(out.len(), n + WAV_HEADER_LEN);
            assert_eq!(le_u32(&out, 40) as usize, n);
            assert_eq!(&out[WAV_HEADER_LEN..], pcm.as_slice());
        }
    }

    #[test]
    fn test_empty_input_is_silent_header() {
        let out = wrap_pcm(&[], PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(out.len(), WAV_HEADER_LEN);
        let info = inspect(&out).unwrap();
        assert_eq!(info.frames, 0);
        assert_eq!(info.duration_secs, 0.0);
    }

    #[test]
    fn test_decoder_accepts_container() {
        // one second of a quiet ramp
        let pcm: Vec<u8> = (0..24_000i32)
            .flat_map(|i| ((i % 200) as i16 - 100).to_le_bytes())
            .collect();
        let out = wrap_pcm(&pcm, PcmFormat::GEMINI_TTS).unwrap();

        let info = inspect(&out).unwrap();
        assert_eq!(info.format, PcmFormat::GEMINI_TTS);
        assert_eq!(info.frames, 24_000);
        assert!((info.duration_secs - 1.0).abs() < 1e-9);

        let mut reader = hound::WavReader::new(Cursor::new(&out)).unwrap();
        let first: Vec<i16> = reader.samples::<i16>().take(3).map(|s| s.unwrap()).collect();
        assert_eq!(first, vec![-100, -99, -98]);
    }

    #[test]
    fn test_inspect_rejects_garbage() {
        assert!(inspect(b"not audio at all").is_err());
    }

    #[test]
    fn test_oversized_payload_is_refused() {
        assert_eq!(declared_len(MAX_PCM_LEN).unwrap(), u32::MAX - 36);
        assert!(declared_len(MAX_PCM_LEN + 1).is_err());
        assert!(declared_len(u32::MAX as usize).is_err());
        // the size fields of the largest accepted header still agree with each other
        let header = wav_header(declared_len(MAX_PCM_LEN).unwrap(), PcmFormat::GEMINI_TTS);
        assert_eq!(le_u32(&header, 4), u32::MAX);
        assert_eq!(le_u32(&header, 40), u32::MAX - 36);
    }

    #[test]
    fn test_pcm_duration() {
        assert_eq!(pcm_duration_secs(48_000, PcmFormat::GEMINI_TTS), 1.0);
        assert_eq!(pcm_duration_secs(0, PcmFormat::GEMINI_TTS), 0.0);
    }
}
