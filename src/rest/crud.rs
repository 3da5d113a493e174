//! List/create/replace/delete for resource kinds that need no wire
//! translation: the stored record is the request and response body.

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

use super::{Ack, AppState, Payload, RecordId};
use crate::error::AppError;
use crate::models::{Brand, Contract, Invoice, ServiceOrder, Task, Transaction, User, Vehicle};
use crate::storage::{Record, RecordReader};

/// A record kind served by the generic handlers.
pub trait Resource: Record {
    /// Reject a create or replace before anything is written.
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        Ok(())
    }

    /// Carry server-owned fields over from the stored version on replace.
    fn preserve(&mut self, _previous: &Self) {}
}

fn required(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

fn non_negative(value: f64, message: &str) -> Result<(), AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::Validation(message.to_string()))
    }
}

impl Resource for Brand {
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.name, "Brand name is required")
    }
}

impl Resource for Vehicle {
    fn validate(&self, reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.name, "Vehicle name is required")?;
        if let Some(driver_id) = self.driver_id {
            if reader.get::<User>(driver_id)?.is_none() {
                return Err(AppError::Validation("Unknown driver".to_string()));
            }
        }
        Ok(())
    }
}

impl Resource for Task {
    fn validate(&self, reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.description, "Task description is required")?;
        if let Some(vehicle_id) = self.vehicle_id {
            if reader.get::<Vehicle>(vehicle_id)?.is_none() {
                return Err(AppError::Validation("Unknown vehicle".to_string()));
            }
        }
        Ok(())
    }
}

impl Resource for Transaction {
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.description, "Description is required")?;
        non_negative(self.amount, "Amount must be a non-negative number")
    }
}

impl Resource for Invoice {
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.customer_name, "Customer name is required")?;
        non_negative(self.total_amount, "Total must be a non-negative number")?;
        non_negative(self.vat_amount, "VAT must be a non-negative number")
    }
}

impl Resource for Contract {
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.customer_name, "Customer name is required")?;
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => Err(AppError::Validation(
                "Contract cannot end before it starts".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Resource for ServiceOrder {
    fn validate(&self, _reader: &impl RecordReader) -> Result<(), AppError> {
        required(&self.customer_name, "Customer name is required")
    }

    fn preserve(&mut self, previous: &Self) {
        self.created_at = previous.created_at;
    }
}

pub fn routes<T: Resource>(path: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, get(list::<T>).post(create::<T>))
        .route(&format!("{path}/:id"), put(update::<T>).delete(remove::<T>))
}

async fn list<T: Resource>(State(state): State<Arc<AppState>>) -> Result<Json<Vec<T>>, AppError> {
    Ok(Json(state.storage.list::<T>()?))
}

async fn create<T: Resource>(
    State(state): State<Arc<AppState>>,
    Payload(record): Payload<T>,
) -> Result<Json<Ack>, AppError> {
    let scope = state.storage.write();
    record.validate(&scope)?;
    let stored = scope.insert(record)?;
    Ok(Json(Ack::created(stored.id())))
}

async fn update<T: Resource>(
    State(state): State<Arc<AppState>>,
    RecordId(id): RecordId,
    Payload(mut record): Payload<T>,
) -> Result<Json<Ack>, AppError> {
    let scope = state.storage.write();
    let previous = scope
        .get::<T>(id)?
        .ok_or_else(|| AppError::NotFound(format!("{} record {id} not found", T::TABLE)))?;
    record.preserve(&previous);
    record.validate(&scope)?;
    scope.update(id, record)?;
    Ok(Json(Ack::ok()))
}

async fn remove<T: Resource>(
    State(state): State<Arc<AppState>>,
    RecordId(id): RecordId,
) -> Result<Json<Ack>, AppError> {
    state.storage.delete::<T>(id)?;
    Ok(Json(Ack::ok()))
}
