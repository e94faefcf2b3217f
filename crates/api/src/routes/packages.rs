//! Package lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{PackageStatus, ProductId, TrackingCode, UserId};
use domain::Transition;
use serde::{Deserialize, Serialize};
use store::{Package, PackageStore, PackageWithDetails};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub product_id: i64,
    pub destination_address: String,
    pub user_id: i64,
    pub notes: Option<String>,
}

/// Body for every lifecycle transition: only the acting user.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub id: i64,
    pub tracking_code: TrackingCode,
    pub user_id: i64,
    pub destination_address: String,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<Package> for PackageResponse {
    fn from(p: Package) -> Self {
        Self {
            id: p.id.as_i64(),
            tracking_code: p.tracking_code,
            user_id: p.user_id.as_i64(),
            destination_address: p.destination_address,
            status: p.status,
            created_at: p.created_at,
            shipped_at: p.shipped_at,
            delivered_at: p.delivered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShipmentEventResponse {
    pub label: String,
    pub location: String,
    pub notes: String,
    pub user_id: Option<i64>,
    pub event_timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PackageProductResponse {
    pub product_id: i64,
    pub quantity: i32,
}

/// Full tracking view: the package, its audit history (newest first), and
/// the products it carries.
#[derive(Debug, Serialize)]
pub struct PackageDetailsResponse {
    #[serde(flatten)]
    pub package: PackageResponse,
    pub history: Vec<ShipmentEventResponse>,
    pub products: Vec<PackageProductResponse>,
}

impl From<PackageWithDetails> for PackageDetailsResponse {
    fn from(details: PackageWithDetails) -> Self {
        Self {
            package: details.package.into(),
            history: details
                .history
                .into_iter()
                .map(|e| ShipmentEventResponse {
                    label: e.label,
                    location: e.location,
                    notes: e.notes,
                    user_id: e.user_id.map(|u| u.as_i64()),
                    event_timestamp: e.event_timestamp,
                })
                .collect(),
            products: details
                .products
                .into_iter()
                .map(|p| PackageProductResponse {
                    product_id: p.product_id.as_i64(),
                    quantity: p.quantity,
                })
                .collect(),
        }
    }
}

pub async fn create_package<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreatePackageRequest>,
) -> Result<(StatusCode, Json<PackageResponse>), ApiError> {
    if req.destination_address.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "destination_address must not be empty".to_string(),
        ));
    }

    let package = state
        .package_service
        .create_package(
            ProductId::new(req.product_id),
            &req.destination_address,
            UserId::new(req.user_id),
            req.notes.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(package.into())))
}

pub async fn get_package<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_code): Path<String>,
) -> Result<Json<PackageDetailsResponse>, ApiError> {
    let tracking_code = TrackingCode::new(tracking_code);
    let details = state
        .package_service
        .get_package(&tracking_code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("package not found: {tracking_code}")))?;

    Ok(Json(details.into()))
}

async fn apply_transition<S: PackageStore + Clone + 'static>(
    state: &AppState<S>,
    tracking_code: String,
    req: TransitionRequest,
    edge: Transition,
) -> Result<Json<PackageResponse>, ApiError> {
    let tracking_code = TrackingCode::new(tracking_code);
    let package = state
        .package_service
        .transition(&tracking_code, UserId::new(req.user_id), edge)
        .await?;
    Ok(Json(package.into()))
}

pub async fn mark_ready<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_code): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<PackageResponse>, ApiError> {
    apply_transition(&state, tracking_code, req, Transition::ReadyForShipping).await
}

pub async fn mark_in_transit<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_code): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<PackageResponse>, ApiError> {
    apply_transition(&state, tracking_code, req, Transition::InTransit).await
}

pub async fn mark_delivered<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_code): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<PackageResponse>, ApiError> {
    apply_transition(&state, tracking_code, req, Transition::Delivered).await
}

pub async fn return_to_warehouse<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tracking_code): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<PackageResponse>, ApiError> {
    apply_transition(&state, tracking_code, req, Transition::ReturnedToWarehouse).await
}
