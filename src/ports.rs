// Collaborator contracts consumed by the allocator and the ticket lifecycle
//
// The stores own physical persistence and exchange records by value.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use crate::error::Result;
use crate::model::{ParkingSpot, ParkingType, Ticket};

/// Source of the attendant's answers
pub trait InputSource {
    fn read_vehicle_type(&mut self) -> Result<ParkingType>;
    fn read_vehicle_registration(&mut self) -> Result<String>;
}

/// Registry of parking spots and their availability
pub trait SpotStore {
    /// Lowest-numbered available spot of the given type
    fn next_available(&self, parking_type: ParkingType) -> Result<Option<ParkingSpot>>;

    /// Set the availability flag. Returns false when the flag already had
    /// that value (another operation got there first).
    fn update_availability(&self, number: i64, available: bool) -> Result<bool>;

    fn get_spot(&self, number: i64) -> Result<Option<ParkingSpot>>;
}

pub trait TicketStore {
    /// Persist a new ticket and return its id
    fn save(&self, ticket: &Ticket) -> Result<i64>;

    /// Most recent open ticket for the registration
    fn get_open_ticket(&self, vehicle_reg: &str) -> Result<Option<Ticket>>;

    fn count_prior_closed_tickets(&self, vehicle_reg: &str) -> Result<u32>;

    /// Overwrite the stored ticket with the same id. Closing a ticket that
    /// is no longer open fails with `TicketNotFound`.
    fn update(&self, ticket: &Ticket) -> Result<()>;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<S: SpotStore + ?Sized> SpotStore for &S {
    fn next_available(&self, parking_type: ParkingType) -> Result<Option<ParkingSpot>> {
        (**self).next_available(parking_type)
    }

    fn update_availability(&self, number: i64, available: bool) -> Result<bool> {
        (**self).update_availability(number, available)
    }

    fn get_spot(&self, number: i64) -> Result<Option<ParkingSpot>> {
        (**self).get_spot(number)
    }
}

impl<T: TicketStore + ?Sized> TicketStore for &T {
    fn save(&self, ticket: &Ticket) -> Result<i64> {
        (**self).save(ticket)
    }

    fn get_open_ticket(&self, vehicle_reg: &str) -> Result<Option<Ticket>> {
        (**self).get_open_ticket(vehicle_reg)
    }

    fn count_prior_closed_tickets(&self, vehicle_reg: &str) -> Result<u32> {
        (**self).count_prior_closed_tickets(vehicle_reg)
    }

    fn update(&self, ticket: &Ticket) -> Result<()> {
        (**self).update(ticket)
    }
}
