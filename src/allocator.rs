// Spot allocation: lowest free number of the requested type wins.

use tracing::{debug, warn};

use crate::error::{ParkingError, Result};
use crate::model::{ParkingSpot, ParkingType};
use crate::ports::SpotStore;

/// Attempts at claiming a spot when other operations keep winning the flip
pub const MAX_CLAIM_ATTEMPTS: usize = 8;

pub struct SpotAllocator<S> {
    store: S,
}

impl<S: SpotStore> SpotAllocator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn find_available(&self, parking_type: ParkingType) -> Result<ParkingSpot> {
        self.store
            .next_available(parking_type)?
            .ok_or(ParkingError::NoSpotAvailable(parking_type))
    }

    /// Mark a spot taken. Fails if it is already taken.
    pub fn allocate(&self, number: i64) -> Result<()> {
        if self.store.update_availability(number, false)? {
            debug!(spot = number, "spot allocated");
            Ok(())
        } else {
            Err(ParkingError::SpotAlreadyAllocated(number))
        }
    }

    /// Mark a spot free again. Releasing a free spot is a no-op.
    pub fn release(&self, number: i64) -> Result<()> {
        if !self.store.update_availability(number, true)? {
            warn!(spot = number, "released a spot that was already free");
        } else {
            debug!(spot = number, "spot released");
        }
        Ok(())
    }

    /// Find and claim a spot in one step.
    ///
    /// When a concurrent operation claims the spot between the lookup and the
    /// flip, the lookup is repeated. After `MAX_CLAIM_ATTEMPTS` lost flips the
    /// last lost spot is reported as `SpotAlreadyAllocated`; `NoSpotAvailable`
    /// only means no spot of the type was free.
    pub fn reserve(&self, parking_type: ParkingType) -> Result<ParkingSpot> {
        let mut last_lost = None;
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let mut spot = self.find_available(parking_type)?;
            match self.allocate(spot.number) {
                Ok(()) => {
                    spot.available = false;
                    return Ok(spot);
                }
                Err(ParkingError::SpotAlreadyAllocated(number)) => {
                    debug!(spot = number, "lost spot to a concurrent entry, retrying");
                    last_lost = Some(number);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(%parking_type, "gave up claiming a spot after {} attempts", MAX_CLAIM_ATTEMPTS);
        match last_lost {
            Some(number) => Err(ParkingError::SpotAlreadyAllocated(number)),
            None => Err(ParkingError::NoSpotAvailable(parking_type)),
        }
    }
}
