use axum::{
    extract::{Path, State},
    response::Json,
};
use switchyard_core::proxy::ProbeResult;
use switchyard_types::ChannelMetrics;

use super::ApiError;
use crate::state::AppState;

/// Probe a channel now, including disabled ones.
pub async fn test_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<ProbeResult>, ApiError> {
    let result = state.gateway().test_channel(&channel_id).await?;
    tracing::info!(
        "Manual probe of channel {}: success={} latency={}ms",
        channel_id,
        result.success,
        result.latency_ms
    );
    Ok(Json(result))
}

pub async fn channel_metrics(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelMetrics>, ApiError> {
    Ok(Json(state.gateway().channel_metrics(&channel_id)?))
}
