use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{AppState, Payload};
use crate::error::{AppError, ErrorBody};
use crate::models::{Task, Vehicle};
use crate::reports::round_cents;
use crate::routing::{plan_route, GeoPoint, Stop};
use crate::storage::RecordReader;

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub vehicle_id: u64,
    /// Tasks to route. Defaults to the tasks already assigned to the vehicle.
    #[serde(default)]
    pub task_ids: Option<Vec<u64>>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub vehicle_id: u64,
    /// Task ids in visiting order.
    pub task_ids: Vec<u64>,
    pub distance_km: f64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/optimize", post(optimize_route))
}

/// Assign the tasks to the vehicle and persist their visiting order.
#[utoipa::path(
    post,
    path = "/api/tasks/optimize",
    tag = "fleet",
    security(("bearer" = [])),
    request_body = OptimizeRequest,
    responses(
        (status = 200, body = OptimizeResponse),
        (status = 404, description = "Unknown vehicle or task", body = ErrorBody)
    )
)]
pub async fn optimize_route(
    State(state): State<Arc<AppState>>,
    Payload(request): Payload<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    let scope = state.storage.write();
    let vehicle = scope
        .get::<Vehicle>(request.vehicle_id)?
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

    let mut tasks: BTreeMap<u64, Task> = BTreeMap::new();
    match request.task_ids {
        Some(ids) => {
            for id in ids {
                let task = scope
                    .get::<Task>(id)?
                    .ok_or_else(|| AppError::NotFound(format!("Task {id} not found")))?;
                tasks.insert(id, task);
            }
        }
        None => {
            for task in scope.list::<Task>()? {
                if task.vehicle_id == Some(vehicle.id) {
                    tasks.insert(task.id, task);
                }
            }
        }
    }

    let stops: Vec<Stop> = tasks
        .values()
        .map(|task| Stop {
            id: task.id,
            priority: task.priority,
            location: GeoPoint::from_parts(task.lat, task.lng),
        })
        .collect();
    let plan = plan_route(GeoPoint::from_parts(vehicle.lat, vehicle.lng), &stops);

    for (index, id) in plan.order.iter().enumerate() {
        if let Some(mut task) = tasks.remove(id) {
            task.vehicle_id = Some(vehicle.id);
            task.order_index = index as i64;
            scope.update(task.id, task)?;
        }
    }

    info!(vehicle_id = vehicle.id, stops = plan.order.len(), distance_km = plan.distance_km, "route planned");
    Ok(Json(OptimizeResponse {
        vehicle_id: vehicle.id,
        task_ids: plan.order,
        distance_km: round_cents(plan.distance_km),
    }))
}
