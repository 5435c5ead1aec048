use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;

use crate::wav::{self, PcmFormat, WAV_HEADER_LEN};

/// What a payload looks like on the wire, judged from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Wav,
    Mpeg,
    Ogg,
    Webm,
    Mp4,
    /// Headerless samples that still need wrapping.
    RawPcm,
}

impl ContainerKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => ContainerKind::Wav,
            [b'I', b'D', b'3', ..] => ContainerKind::Mpeg,
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => ContainerKind::Mpeg,
            [b'O', b'g', b'g', b'S', ..] => ContainerKind::Ogg,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => ContainerKind::Webm,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => ContainerKind::Mp4,
            _ => ContainerKind::RawPcm,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerKind::Wav | ContainerKind::RawPcm => "audio/wav",
            ContainerKind::Mpeg => "audio/mpeg",
            ContainerKind::Ogg => "audio/ogg",
            ContainerKind::Webm => "audio/webm",
            ContainerKind::Mp4 => "audio/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerKind::Wav | ContainerKind::RawPcm => "wav",
            ContainerKind::Mpeg => "mp3",
            ContainerKind::Ogg => "ogg",
            ContainerKind::Webm => "webm",
            ContainerKind::Mp4 => "mp4",
        }
    }
}

fn is_raw_pcm_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("audio/l16") || essence.eq_ignore_ascii_case("audio/pcm")
}

/// Audio attached to an assistant message.
///
/// Only the payload is kept. The playable container is derived on demand and
/// never cached, so its header always agrees with the payload it wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    payload: Vec<u8>,
    kind: ContainerKind,
    format: PcmFormat,
}

impl AudioAsset {
    /// Headerless samples as returned by the speech endpoint.
    pub fn pcm(payload: Vec<u8>, format: PcmFormat) -> Self {
        Self {
            payload,
            kind: ContainerKind::RawPcm,
            format,
        }
    }

    /// Payload of unknown origin; the leading bytes decide whether it needs wrapping.
    ///
    /// Raw PCM can begin with bytes that look like an MPEG frame sync, so
    /// speech output should go through [`AudioAsset::pcm`] instead.
    pub fn sniffed(payload: Vec<u8>, format: PcmFormat) -> Self {
        let kind = ContainerKind::sniff(&payload);
        Self { payload, kind, format }
    }

    /// Decode the Base64 `audioData` string sent by the relay.
    pub fn from_base64(data: &str, format: PcmFormat) -> anyhow::Result<Self> {
        let payload = general_purpose::STANDARD
            .decode(data.trim())
            .context("audio payload is not valid base64")?;
        Ok(Self::pcm(payload, format))
    }

    /// Decode Base64 audio labelled with `declared_mime`.
    ///
    /// Unlabelled payloads and raw PCM labels (`audio/L16`, `audio/pcm`) are
    /// wrapped as-is. Any other label means the bytes should already carry a
    /// container, so their leading bytes decide.
    pub fn from_base64_declared(
        data: &str,
        declared_mime: Option<&str>,
        format: PcmFormat,
    ) -> anyhow::Result<Self> {
        let asset = Self::from_base64(data, format)?;
        match declared_mime {
            Some(mime) if !is_raw_pcm_mime(mime) => Ok(Self::sniffed(asset.payload, format)),
            _ => Ok(asset),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Bytes a standard decoder can play.
    pub fn container(&self) -> anyhow::Result<Vec<u8>> {
        match self.kind {
            ContainerKind::RawPcm => wav::wrap_pcm(&self.payload, self.format),
            _ => Ok(self.payload.clone()),
        }
    }

    pub fn container_len(&self) -> usize {
        match self.kind {
            ContainerKind::RawPcm => self.payload.len() + WAV_HEADER_LEN,
            _ => self.payload.len(),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Known only for PCM based payloads; other codecs report `None`.
    pub fn duration(&self) -> Option<Duration> {
        match self.kind {
            ContainerKind::RawPcm => Some(Duration::from_secs_f64(wav::pcm_duration_secs(
                self.payload.len(),
                self.format,
            ))),
            ContainerKind::Wav => wav::inspect(&self.payload)
                .ok()
                .map(|info| Duration::from_secs_f64(info.duration_secs)),
            _ => None,
        }
    }

    /// File name offered when the asset is downloaded.
    pub fn download_name(&self, timestamp_ms: i64) -> String {
        format!("psych-ai-audio-{}.{}", timestamp_ms, self.kind.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_known_headers() {
        let wav = wav::wrap_pcm(&[0, 0], PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(ContainerKind::sniff(&wav), ContainerKind::Wav);
        assert_eq!(ContainerKind::sniff(&[0xFF, 0xFB, 0x90, 0x00]), ContainerKind::Mpeg);
        assert_eq!(ContainerKind::sniff(b"ID3\x04rest"), ContainerKind::Mpeg);
        assert_eq!(ContainerKind::sniff(b"OggS\x00\x02"), ContainerKind::Ogg);
        assert_eq!(ContainerKind::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), ContainerKind::Webm);
        assert_eq!(ContainerKind::sniff(b"\x00\x00\x00\x20ftypM4A "), ContainerKind::Mp4);
    }

    #[test]
    fn test_sniff_defaults_to_raw_pcm() {
        assert_eq!(ContainerKind::sniff(&[]), ContainerKind::RawPcm);
        assert_eq!(ContainerKind::sniff(&[0x01, 0x00, 0x02, 0x00]), ContainerKind::RawPcm);
        // RIFF without WAVE is not something we can play as-is
        assert_eq!(ContainerKind::sniff(b"RIFF\x00\x00\x00\x00AVI "), ContainerKind::RawPcm);
    }

    #[test]
    fn test_raw_pcm_is_wrapped_every_time() {
        let asset = AudioAsset::pcm(vec![0u8; 1000], PcmFormat::GEMINI_TTS);
        let first = asset.container().unwrap();
        let second = asset.container().unwrap();
        assert_eq!(first.len(), 1044);
        assert_eq!(first, second);
        assert_eq!(asset.container_len(), 1044);
        assert_eq!(asset.mime_type(), "audio/wav");
    }

    #[test]
    fn test_existing_container_is_left_alone() {
        let wav = wav::wrap_pcm(&[1, 0, 2, 0], PcmFormat::GEMINI_TTS).unwrap();
        let asset = AudioAsset::sniffed(wav.clone(), PcmFormat::GEMINI_TTS);
        assert_eq!(asset.kind(), ContainerKind::Wav);
        assert_eq!(asset.container().unwrap(), wav);
    }

    #[test]
    fn test_pcm_never_sniffed() {
        // -1 as i16 looks like an MPEG frame sync
        let asset = AudioAsset::pcm(vec![0xFF, 0xFF, 0x00, 0x00], PcmFormat::GEMINI_TTS);
        assert_eq!(asset.kind(), ContainerKind::RawPcm);
        assert_eq!(asset.container().unwrap().len(), 48);
    }

    #[test]
    fn test_from_base64() {
        let asset = AudioAsset::from_base64("AAAAAA==", PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(asset.payload(), &[0, 0, 0, 0]);
        assert!(AudioAsset::from_base64("***", PcmFormat::GEMINI_TTS).is_err());
    }

    #[test]
    fn test_declared_mime_decides_sniffing() {
        let wav = wav::wrap_pcm(&[0u8; 8], PcmFormat::GEMINI_TTS).unwrap();
        let b64 = general_purpose::STANDARD.encode(&wav);
        let labelled = AudioAsset::from_base64_declared(&b64, Some("audio/wav"), PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(labelled.kind(), ContainerKind::Wav);
        assert_eq!(labelled.container_len(), wav.len());

        // samples that happen to look like an MPEG frame sync stay PCM
        let pcm = general_purpose::STANDARD.encode([0xFF, 0xFB, 0x00, 0x00]);
        for mime in [None, Some("audio/L16;codec=pcm;rate=24000"), Some("audio/pcm")] {
            let asset = AudioAsset::from_base64_declared(&pcm, mime, PcmFormat::GEMINI_TTS).unwrap();
            assert_eq!(asset.kind(), ContainerKind::RawPcm);
        }
        let mp3 = AudioAsset::from_base64_declared(&pcm, Some("audio/mpeg"), PcmFormat::GEMINI_TTS).unwrap();
        assert_eq!(mp3.kind(), ContainerKind::Mpeg);
    }

    #[test]
    fn test_duration_and_download_name() {
        let asset = AudioAsset::pcm(vec![0u8; 96_000], PcmFormat::GEMINI_TTS);
        assert_eq!(asset.duration(), Some(Duration::from_secs(2)));
        assert_eq!(asset.download_name(1700000000000), "psych-ai-audio-1700000000000.wav");

        let mp3 = AudioAsset::sniffed(vec![0xFF, 0xFB, 0, 0], PcmFormat::GEMINI_TTS);
        assert_eq!(mp3.duration(), None);
        assert!(mp3.download_name(1).ends_with(".mp3"));
    }
}
