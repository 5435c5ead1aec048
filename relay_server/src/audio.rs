// Playable audio resources built from synthesized PCM

use audio_core::{format_time, AudioAsset, PcmFormat, MAX_PCM_LEN, WAV_HEADER_LEN};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAudioRequest {
    audio_data: Option<String>,
    /// Label of `audio_data`; absent means raw speech PCM.
    mime_type: Option<String>,
    /// Resource this one supersedes; released before the new one is stored.
    previous_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAudio {
    pub id: Uuid,
    pub url: String,
    pub mime_type: &'static str,
    pub duration_ms: Option<u64>,
    /// `m:ss`, as shown next to the seek bar.
    pub duration_label: String,
    pub bytes: usize,
}

#[derive(Deserialize)]
pub struct FetchParams {
    #[serde(default)]
    download: Option<String>,
}

impl FetchParams {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some("1") | Some("true"))
    }
}

/// POST /audio: wrap Base64 audio in a playable container and keep it until
/// released or superseded.
pub async fn store_audio(
    State(state): State<AppState>,
    Json(req): Json<StoreAudioRequest>,
) -> Result<Json<StoredAudio>, ApiError> {
    let data = req
        .audio_data
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("audioData is required".to_string()))?;
    let previous = req
        .previous_id
        .as_deref()
        .map(|id| {
            Uuid::parse_str(id).map_err(|_| ApiError::InvalidInput(format!("Invalid previousId: {id}")))
        })
        .transpose()?;
    let asset = AudioAsset::from_base64_declared(&data, req.mime_type.as_deref(), PcmFormat::GEMINI_TTS)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid audio data: {e}")))?;
    if asset.container_len() > WAV_HEADER_LEN + MAX_PCM_LEN {
        return Err(ApiError::InvalidInput("Audio data is too large".to_string()));
    }

    let duration = asset.duration();
    let stored = StoredAudio {
        id: Uuid::nil(),
        url: String::new(),
        mime_type: asset.mime_type(),
        duration_ms: duration.map(|d| d.as_millis() as u64),
        duration_label: format_time(duration.map_or(0.0, |d| d.as_secs_f64())),
        bytes: asset.container_len(),
    };
    let id = state.audio.replace(previous.as_ref(), asset).await;
    match previous {
        Some(previous) => info!("Stored audio {} ({} bytes), replacing {}", id, stored.bytes, previous),
        None => info!("Stored audio {} ({} bytes)", id, stored.bytes),
    }

    Ok(Json(StoredAudio {
        id,
        url: format!("/api/audio/{id}"),
        ..stored
    }))
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound(format!("Audio {id} not found")))
}

/// GET /audio/{id}: the container bytes, as an attachment with `?download=1`.
pub async fn fetch_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FetchParams>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let asset = state
        .audio
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Audio {id} not found")))?;

    let container = asset
        .container()
        .map_err(|e| ApiError::InternalError(format!("Audio {id} cannot be served: {e}")))?;
    let content_type = [(header::CONTENT_TYPE, asset.mime_type().to_string())];
    if params.wants_download() {
        let name = asset.download_name(chrono::Utc::now().timestamp_millis());
        let disposition = format!("attachment; filename=\"{name}\"");
        Ok((
            content_type,
            [(header::CONTENT_DISPOSITION, disposition)],
            container,
        )
            .into_response())
    } else {
        Ok((content_type, container).into_response())
    }
}

/// DELETE /audio/{id}: explicit release.
pub async fn release_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.audio.release(&id).await {
        info!("Released audio {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Audio {id} not found")))
    }
}
