// 🎫 Ticket lifecycle - vehicle entry and exit
//
// NONE → OPEN → CLOSED, one transition per operation.
//
// Entry: claim a spot, then persist the ticket (spot released again if the
// ticket cannot be saved).
// Exit: compute the fare on a copy of the open ticket, persist it, then
// release the spot (ticket reopened again if the spot cannot be released).
// A failed operation leaves tickets and spots as they were.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::allocator::SpotAllocator;
use crate::error::{ParkingError, Result};
use crate::fare::FareCalculator;
use crate::model::{ParkingType, Ticket};
use crate::ports::{Clock, InputSource, SpotStore, SystemClock, TicketStore};

#[derive(Debug, Clone, Serialize)]
pub struct EntryReceipt {
    pub ticket: Ticket,
    /// At least one earlier stay was closed for this registration
    pub recurring_user: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExitReceipt {
    pub ticket: Ticket,
    pub price: f64,
    pub recurring_user: bool,
}

pub struct ParkingService<S, T, C = SystemClock> {
    allocator: SpotAllocator<S>,
    tickets: T,
    fares: FareCalculator,
    clock: C,
}

impl<S: SpotStore, T: TicketStore> ParkingService<S, T, SystemClock> {
    pub fn new(spots: S, tickets: T) -> Self {
        Self::with_clock(spots, tickets, SystemClock)
    }
}

impl<S: SpotStore, T: TicketStore, C: Clock> ParkingService<S, T, C> {
    pub fn with_clock(spots: S, tickets: T, clock: C) -> Self {
        Self {
            allocator: SpotAllocator::new(spots),
            tickets,
            fares: FareCalculator::new(),
            clock,
        }
    }

    pub fn allocator(&self) -> &SpotAllocator<S> {
        &self.allocator
    }

    pub fn tickets(&self) -> &T {
        &self.tickets
    }

    // ========================================================================
    // INPUT-DRIVEN OPERATIONS
    // ========================================================================

    pub fn process_incoming_vehicle<I: InputSource + ?Sized>(
        &self,
        input: &mut I,
    ) -> Result<EntryReceipt> {
        let parking_type = input.read_vehicle_type()?;
        let vehicle_reg = input.read_vehicle_registration()?;
        self.process_entry(&vehicle_reg, parking_type)
    }

    pub fn process_exiting_vehicle<I: InputSource + ?Sized>(
        &self,
        input: &mut I,
    ) -> Result<ExitReceipt> {
        let vehicle_reg = input.read_vehicle_registration()?;
        self.process_exit(&vehicle_reg)
    }

    // ========================================================================
    // ENTRY
    // ========================================================================

    pub fn process_entry(&self, vehicle_reg: &str, parking_type: ParkingType) -> Result<EntryReceipt> {
        let vehicle_reg = normalize_registration(vehicle_reg)?;

        if let Some(open) = self.tickets.get_open_ticket(&vehicle_reg)? {
            warn!(vehicle = %vehicle_reg, spot = open.spot_number, "entry rejected, vehicle already parked");
            return Err(ParkingError::VehicleAlreadyParked(vehicle_reg));
        }

        let recurring_user = self.is_recurring_user(&vehicle_reg)?;

        let spot = self.allocator.reserve(parking_type).map_err(|e| {
            warn!(vehicle = %vehicle_reg, %parking_type, "entry rejected: {}", e);
            e
        })?;

        let mut ticket = Ticket::open(&spot, &vehicle_reg, self.clock.now());
        match self.tickets.save(&ticket) {
            Ok(id) => ticket.id = Some(id),
            Err(e) => {
                warn!(vehicle = %vehicle_reg, spot = spot.number, "ticket not saved, releasing spot: {}", e);
                if let Err(release_err) = self.allocator.release(spot.number) {
                    error!(
                        spot = spot.number,
                        "spot left occupied without a ticket, needs reconciliation: {}",
                        release_err
                    );
                }
                return Err(e);
            }
        }

        info!(
            vehicle = %vehicle_reg,
            spot = spot.number,
            %parking_type,
            recurring_user,
            "ticket opened"
        );

        Ok(EntryReceipt {
            ticket,
            recurring_user,
        })
    }

    // ========================================================================
    // EXIT
    // ========================================================================

    pub fn process_exit(&self, vehicle_reg: &str) -> Result<ExitReceipt> {
        let vehicle_reg = normalize_registration(vehicle_reg)?;

        let open = self
            .tickets
            .get_open_ticket(&vehicle_reg)?
            .ok_or_else(|| ParkingError::TicketNotFound(vehicle_reg.clone()))?;

        let recurring_user = self.is_recurring_user(&vehicle_reg)?;

        let mut closing = open.clone();
        closing.out_time = Some(self.clock.now());
        let price = self.fares.compute_fare(&mut closing, recurring_user).map_err(|e| {
            warn!(vehicle = %vehicle_reg, "fare not computed, ticket stays open: {}", e);
            e
        })?;

        self.tickets.update(&closing)?;

        if let Err(e) = self.allocator.release(closing.spot_number) {
            warn!(vehicle = %vehicle_reg, spot = closing.spot_number, "spot not released, reopening ticket: {}", e);
            if let Err(revert_err) = self.tickets.update(&open) {
                error!(
                    vehicle = %vehicle_reg,
                    "ticket closed but spot still occupied, needs reconciliation: {}",
                    revert_err
                );
            }
            return Err(e);
        }

        info!(
            vehicle = %vehicle_reg,
            spot = closing.spot_number,
            price,
            recurring_user,
            "ticket closed"
        );

        Ok(ExitReceipt {
            ticket: closing,
            price,
            recurring_user,
        })
    }

    pub fn is_recurring_user(&self, vehicle_reg: &str) -> Result<bool> {
        Ok(self.tickets.count_prior_closed_tickets(vehicle_reg)? > 0)
    }
}

/// Registrations are compared trimmed and upper-cased
pub fn normalize_registration(vehicle_reg: &str) -> Result<String> {
    let normalized = vehicle_reg.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(ParkingError::InvalidInput(
            "vehicle registration number is empty".to_string(),
        ));
    }
    Ok(normalized)
}
