// 🅿️ Parking model - spots and tickets
//
// A spot's number is its identity (stable, unique).
// A ticket references its spot by number only; the store owns both records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParkingError;

// ============================================================================
// PARKING TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParkingType {
    Car,
    Bike,
}

impl ParkingType {
    pub const ALL: [ParkingType; 2] = [ParkingType::Car, ParkingType::Bike];

    /// Tag as persisted in the spot table
    pub fn as_str(&self) -> &'static str {
        match self {
            ParkingType::Car => "CAR",
            ParkingType::Bike => "BIKE",
        }
    }
}

impl fmt::Display for ParkingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParkingType {
    type Err = ParkingError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CAR" => Ok(ParkingType::Car),
            "BIKE" => Ok(ParkingType::Bike),
            _ => Err(ParkingError::UnknownVehicleType(tag.to_string())),
        }
    }
}

// ============================================================================
// PARKING SPOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub number: i64,
    pub parking_type: ParkingType,
    pub available: bool,
}

impl ParkingSpot {
    pub fn new(number: i64, parking_type: ParkingType, available: bool) -> Self {
        ParkingSpot {
            number,
            parking_type,
            available,
        }
    }
}

// ============================================================================
// TICKET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketState {
    Open,
    Closed,
}

/// One vehicle's stay, from entry to exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Assigned by the ticket store on save
    pub id: Option<i64>,
    pub spot_number: i64,
    pub parking_type: ParkingType,
    pub vehicle_reg: String,
    pub in_time: DateTime<Utc>,
    pub out_time: Option<DateTime<Utc>>,
    /// None until the fare is computed at exit
    pub price: Option<f64>,
}

impl Ticket {
    /// Fresh open ticket for a vehicle entering on `spot`
    pub fn open(spot: &ParkingSpot, vehicle_reg: &str, in_time: DateTime<Utc>) -> Self {
        Ticket {
            id: None,
            spot_number: spot.number,
            parking_type: spot.parking_type,
            vehicle_reg: vehicle_reg.to_string(),
            in_time,
            out_time: None,
            price: None,
        }
    }

    pub fn state(&self) -> TicketState {
        match self.out_time {
            Some(_) => TicketState::Closed,
            None => TicketState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == TicketState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parking_type_parsing() {
        assert_eq!("CAR".parse::<ParkingType>().unwrap(), ParkingType::Car);
        assert_eq!(" bike ".parse::<ParkingType>().unwrap(), ParkingType::Bike);

        match "TRUCK".parse::<ParkingType>() {
            Err(ParkingError::UnknownVehicleType(tag)) => assert_eq!(tag, "TRUCK"),
            other => panic!("expected UnknownVehicleType, got {:?}", other),
        }
        assert!("".parse::<ParkingType>().is_err());
    }

    #[test]
    fn test_parking_type_serde_uses_tags() {
        let json = serde_json::to_string(&ParkingType::Bike).unwrap();
        assert_eq!(json, "\"BIKE\"");
        let parsed: ParkingType = serde_json::from_str("\"CAR\"").unwrap();
        assert_eq!(parsed, ParkingType::Car);
    }

    #[test]
    fn test_ticket_opens_without_exit_or_price() {
        let spot = ParkingSpot::new(4, ParkingType::Bike, true);
        let ticket = Ticket::open(&spot, "BK-77", Utc::now());

        assert_eq!(ticket.spot_number, 4);
        assert_eq!(ticket.parking_type, ParkingType::Bike);
        assert_eq!(ticket.state(), TicketState::Open);
        assert!(ticket.price.is_none());
        assert!(ticket.id.is_none());
    }
}
