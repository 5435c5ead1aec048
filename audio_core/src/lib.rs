//! Playable audio from the raw PCM returned by speech synthesis.
//!
//! The speech endpoint hands back headerless 16-bit mono samples. Generic
//! decoders need a container, so [`wav::wrap_pcm`] prepends a RIFF/WAVE header
//! whose declared sizes always match the buffer it describes.

pub mod asset;
pub mod player;
pub mod store;
pub mod wav;

pub use asset::{AudioAsset, ContainerKind};
pub use player::{format_time, PlaybackState, PlayerStatus};
pub use store::AssetStore;
pub use wav::{inspect, wrap_pcm, PcmFormat, WavInfo, MAX_PCM_LEN, WAV_HEADER_LEN};
