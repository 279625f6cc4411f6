// Parking System - Web Server
// REST API over the same SQLite database the desk uses

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use parking_system::{
    db, lifecycle::normalize_registration, list_open_tickets, list_spots, logger, open_database,
    seed_spots, EntryReceipt, ExitReceipt, ParkingError, ParkingService, ParkingSpot,
    ParkingType, SqliteSpotStore, SqliteTicketStore, Ticket, TicketStore,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "parking-server")]
#[command(about = "REST API for the parking desk")]
struct ServerArgs {
    /// SQLite database file
    #[arg(long, env = "PARKING_DB", default_value = "parking.db")]
    db: PathBuf,

    /// CSV facility layout (`number,parking_type`)
    #[arg(long, env = "PARKING_LAYOUT")]
    layout: Option<PathBuf>,

    #[arg(long, env = "PARKING_ADDR", default_value = "127.0.0.1:3000")]
    addr: String,
}

/// Shared application state. The single connection serializes every entry and
/// exit, so no spot can be handed out twice.
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

struct ApiError(ParkingError);

impl From<ParkingError> for ApiError {
    fn from(err: ParkingError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &ParkingError) -> StatusCode {
    match err {
        ParkingError::InvalidInput(_)
        | ParkingError::UnknownVehicleType(_)
        | ParkingError::InvalidInterval { .. } => StatusCode::BAD_REQUEST,
        ParkingError::TicketNotFound(_) | ParkingError::SpotNotFound(_) => StatusCode::NOT_FOUND,
        ParkingError::NoSpotAvailable(_)
        | ParkingError::VehicleAlreadyParked(_)
        | ParkingError::SpotAlreadyAllocated(_) => StatusCode::CONFLICT,
        ParkingError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self.0);
        }
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
struct EntryRequest {
    vehicle_reg: String,
    parking_type: String,
}

#[derive(Debug, Deserialize)]
struct ExitRequest {
    vehicle_reg: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/spots - All spots with availability
async fn get_spots(State(state): State<AppState>) -> ApiResult<Vec<ParkingSpot>> {
    let conn = state.conn();
    Ok(Json(ApiResponse::ok(list_spots(&conn)?)))
}

/// GET /api/tickets/open - Vehicles currently parked
async fn get_open_tickets(State(state): State<AppState>) -> ApiResult<Vec<Ticket>> {
    let conn = state.conn();
    Ok(Json(ApiResponse::ok(list_open_tickets(&conn)?)))
}

/// GET /api/tickets/:vehicle_reg/events - Audit trail of a vehicle's open ticket
async fn get_ticket_events(
    State(state): State<AppState>,
    Path(vehicle_reg): Path<String>,
) -> ApiResult<Vec<db::Event>> {
    let conn = state.conn();
    let tickets = SqliteTicketStore::new(&conn);
    let reg = normalize_registration(&vehicle_reg)?;

    let ticket = tickets
        .get_open_ticket(&reg)?
        .ok_or(ParkingError::TicketNotFound(reg))?;
    let id = ticket.id.map(|id| id.to_string()).unwrap_or_default();

    Ok(Json(ApiResponse::ok(db::get_events_for_entity(&conn, "ticket", &id)?)))
}

/// POST /api/entry - Allocate a spot and open a ticket
async fn post_entry(
    State(state): State<AppState>,
    Json(request): Json<EntryRequest>,
) -> ApiResult<EntryReceipt> {
    let parking_type: ParkingType = request.parking_type.parse()?;

    let conn = state.conn();
    let service = ParkingService::new(
        SqliteSpotStore::new(&conn),
        SqliteTicketStore::with_actor(&conn, "api"),
    );
    let receipt = service.process_entry(&request.vehicle_reg, parking_type)?;

    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/exit - Close the ticket, compute the fare and free the spot
async fn post_exit(
    State(state): State<AppState>,
    Json(request): Json<ExitRequest>,
) -> ApiResult<ExitReceipt> {
    let conn = state.conn();
    let service = ParkingService::new(
        SqliteSpotStore::new(&conn),
        SqliteTicketStore::with_actor(&conn, "api"),
    );
    let receipt = service.process_exit(&request.vehicle_reg)?;

    Ok(Json(ApiResponse::ok(receipt)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/spots", get(get_spots))
        .route("/tickets/open", get(get_open_tickets))
        .route("/tickets/:vehicle_reg/events", get(get_ticket_events))
        .route("/entry", post(post_entry))
        .route("/exit", post(post_exit))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutdown signal received");
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    logger::init_json_logger();

    let conn = open_database(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;
    let spots = match &args.layout {
        Some(path) => parking_system::load_layout_csv(path)?,
        None => parking_system::default_layout(),
    };
    seed_spots(&conn, &spots)?;
    info!(db = %args.db.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;
    info!(addr = %args.addr, "parking server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            status_for(&ParkingError::NoSpotAvailable(ParkingType::Car)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ParkingError::TicketNotFound("X".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ParkingError::UnknownVehicleType("TRUCK".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ParkingError::store(std::io::Error::new(
                std::io::ErrorKind::Other,
                "boom"
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
