/*!
 * Bluetooth routes
 * Adapter MAC → object path, then a query or a single command
 */

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::{AppState, MessageResponse};
use crate::bluetooth::{paths, Adapter, Device};

#[derive(Debug, Serialize, Deserialize)]
pub struct AdaptersResponse {
    pub adapters: Vec<Adapter>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustedDevicesResponse {
    pub trusted_devices: Vec<Device>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectedDevicesResponse {
    pub connected_devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// Validates a MAC from the URL and upper-cases it, matching BlueZ object paths.
fn parse_mac(kind: &str, raw: &str) -> ApiResult<String> {
    if raw.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "{} MAC address parameter is required",
            kind
        )));
    }
    if !paths::is_valid_mac(raw) {
        return Err(ApiError::BadRequest(format!(
            "invalid {} MAC address: {}",
            kind, raw
        )));
    }
    Ok(raw.to_ascii_uppercase())
}

/// Turns the `{adapter}` segment into an object path.
///
/// A MAC is looked up among the live adapters. A short name such as `hci0`
/// maps straight to its path under the BlueZ root without touching the bus.
async fn resolve_adapter(state: &AppState, raw: &str) -> ApiResult<String> {
    if !raw.is_empty() && !paths::is_valid_mac(raw) {
        if let Some(path) = paths::adapter_path_from_name(raw) {
            return Ok(path);
        }
    }
    let mac = parse_mac("adapter", raw)?;
    state
        .bluetooth
        .adapter_path_by_mac(&mac)
        .await
        .map_err(|e| ApiError::bluetooth("failed to resolve adapter", e))
}

fn toggle(body: Result<Json<ToggleRequest>, JsonRejection>) -> ApiResult<bool> {
    body.map(|Json(req)| req.enabled)
        .map_err(|_| ApiError::BadRequest("invalid request body".into()))
}

pub async fn get_adapters(State(state): State<AppState>) -> ApiResult<Json<AdaptersResponse>> {
    let adapters = state
        .bluetooth
        .adapters()
        .await
        .map_err(|e| ApiError::bluetooth("failed to get adapters", e))?;
    Ok(Json(AdaptersResponse { adapters }))
}

pub async fn set_discoverable(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let enabled = toggle(body)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .set_discoverable(&adapter_path, enabled)
        .await
        .map_err(|e| {
            ApiError::bluetooth(&format!("failed to set discoverable on {}", adapter), e)
        })?;
    Ok(Json(MessageResponse::new("adapter discoverable updated")))
}

pub async fn set_discovering(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let enabled = toggle(body)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .set_discovering(&adapter_path, enabled)
        .await
        .map_err(|e| {
            ApiError::bluetooth(&format!("failed to set discovering on {}", adapter), e)
        })?;
    Ok(Json(MessageResponse::new("adapter discovery updated")))
}

pub async fn get_devices(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
) -> ApiResult<Json<DevicesResponse>> {
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    let devices = state
        .bluetooth
        .devices(&adapter_path)
        .await
        .map_err(|e| ApiError::bluetooth("failed to get devices", e))?;
    Ok(Json(DevicesResponse { devices }))
}

pub async fn get_trusted_devices(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
) -> ApiResult<Json<TrustedDevicesResponse>> {
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    let trusted_devices = state
        .bluetooth
        .trusted_devices(&adapter_path)
        .await
        .map_err(|e| ApiError::bluetooth("failed to get trusted devices", e))?;
    Ok(Json(TrustedDevicesResponse { trusted_devices }))
}

pub async fn get_connected_devices(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
) -> ApiResult<Json<ConnectedDevicesResponse>> {
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    let connected_devices = state
        .bluetooth
        .connected_devices(&adapter_path)
        .await
        .map_err(|e| ApiError::bluetooth("failed to get connected devices", e))?;
    Ok(Json(ConnectedDevicesResponse { connected_devices }))
}

pub async fn pair_device(
    State(state): State<AppState>,
    Path((adapter, mac)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let mac = parse_mac("device", &mac)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .pair_device(&adapter_path, &mac)
        .await
        .map_err(|e| ApiError::bluetooth("failed to pair device", e))?;
    Ok(Json(MessageResponse::new("device pairing initiated successfully")))
}

pub async fn connect_device(
    State(state): State<AppState>,
    Path((adapter, mac)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let mac = parse_mac("device", &mac)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .connect_device(&adapter_path, &mac)
        .await
        .map_err(|e| ApiError::bluetooth("failed to connect device", e))?;
    Ok(Json(MessageResponse::new(
        "device connection initiated successfully",
    )))
}

pub async fn trust_device(
    State(state): State<AppState>,
    Path((adapter, mac)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let mac = parse_mac("device", &mac)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .trust_device(&adapter_path, &mac)
        .await
        .map_err(|e| ApiError::bluetooth("failed to trust device", e))?;
    Ok(Json(MessageResponse::new("device trusted successfully")))
}

pub async fn remove_device(
    State(state): State<AppState>,
    Path((adapter, mac)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let mac = parse_mac("device", &mac)?;
    let adapter_path = resolve_adapter(&state, &adapter).await?;
    state
        .bluetooth
        .remove_device(&adapter_path, &mac)
        .await
        .map_err(|e| ApiError::bluetooth("failed to remove device", e))?;
    Ok(Json(MessageResponse::new("device removed successfully")))
}
