// Parking error taxonomy
//
// Every failure of an entry/exit operation surfaces here; nothing is retried
// by the core.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ParkingType;

#[derive(Error, Debug)]
pub enum ParkingError {
    /// Exit time absent or earlier than entry time
    #[error("Out time provided is incorrect: {}", format_out_time(.out_time))]
    InvalidInterval { out_time: Option<DateTime<Utc>> },

    #[error("Unknown parking type: {0}")]
    UnknownVehicleType(String),

    #[error("No {0} spot available, parking is full")]
    NoSpotAvailable(ParkingType),

    /// Lost the conditional flip on a spot another operation just claimed.
    /// Also the outcome of a reservation that kept losing while spots were free.
    #[error("Parking spot {0} is already allocated")]
    SpotAlreadyAllocated(i64),

    #[error("Parking spot {0} does not exist")]
    SpotNotFound(i64),

    #[error("No open ticket for vehicle {0}")]
    TicketNotFound(String),

    #[error("Vehicle {0} is already parked")]
    VehicleAlreadyParked(String),

    #[error("Entered input is invalid: {0}")]
    InvalidInput(String),

    #[error("Store failure: {0}")]
    StoreFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn format_out_time(out_time: &Option<DateTime<Utc>>) -> String {
    match out_time {
        Some(t) => t.to_rfc3339(),
        None => "none".to_string(),
    }
}

impl ParkingError {
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ParkingError::StoreFailure(Box::new(err))
    }

    /// True for errors caused by the request itself rather than the store
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ParkingError::StoreFailure(_))
    }
}

impl From<rusqlite::Error> for ParkingError {
    fn from(err: rusqlite::Error) -> Self {
        ParkingError::store(err)
    }
}

impl From<csv::Error> for ParkingError {
    fn from(err: csv::Error) -> Self {
        ParkingError::store(err)
    }
}

impl From<serde_json::Error> for ParkingError {
    fn from(err: serde_json::Error) -> Self {
        ParkingError::store(err)
    }
}

impl From<std::io::Error> for ParkingError {
    fn from(err: std::io::Error) -> Self {
        ParkingError::store(err)
    }
}

pub type Result<T> = std::result::Result<T, ParkingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_invalid_interval_message_names_out_time() {
        let out_time = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let err = ParkingError::InvalidInterval { out_time: Some(out_time) };
        assert!(err.to_string().contains("2024-03-01T09:00:00"));

        let err = ParkingError::InvalidInterval { out_time: None };
        assert!(err.to_string().contains("none"));
    }

    #[test]
    fn test_store_failure_is_not_a_rejection() {
        let err: ParkingError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(!err.is_rejection());
        assert!(ParkingError::TicketNotFound("AB-123".into()).is_rejection());
    }
}
