// 💶 Fare Calculator
//
// price = duration_hours × rate, where the rate depends on the parking type
// and on whether the stay is within the first thirty minutes.
// Recurring users get a 5% loyalty discount.

use tracing::debug;

use crate::error::{ParkingError, Result};
use crate::model::{ParkingType, Ticket};

// ============================================================================
// RATES
// ============================================================================

pub const CAR_RATE_FIRST_THIRTY_MINUTES: f64 = 0.0;
pub const CAR_RATE_PER_HOUR: f64 = 1.5;
pub const BIKE_RATE_FIRST_THIRTY_MINUTES: f64 = 0.0;
pub const BIKE_RATE_PER_HOUR: f64 = 1.0;

pub const RECURRING_USER_DISCOUNT: f64 = 0.95;

/// Stays up to and including this many hours use the first-thirty-minutes rate
pub const FIRST_THIRTY_MINUTES_HOURS: f64 = 0.5;

// ============================================================================
// FARE CALCULATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FareCalculator;

impl FareCalculator {
    pub fn new() -> Self {
        FareCalculator
    }

    /// Compute the fare of a ticket whose exit time is set, store it in
    /// `ticket.price` and return it.
    ///
    /// Fails with `InvalidInterval` when the exit time is absent or earlier
    /// than the entry time. The ticket is left untouched on failure.
    pub fn compute_fare(&self, ticket: &mut Ticket, recurring_user: bool) -> Result<f64> {
        let hours = duration_hours(ticket)?;
        let rate = hourly_rate(ticket.parking_type, hours);

        let mut price = hours * rate;
        if recurring_user {
            price *= RECURRING_USER_DISCOUNT;
        }

        debug!(
            vehicle = %ticket.vehicle_reg,
            parking_type = %ticket.parking_type,
            hours,
            rate,
            recurring_user,
            price,
            "fare computed"
        );

        ticket.price = Some(price);
        Ok(price)
    }
}

/// Whole minutes parked, as a fraction of an hour.
///
/// The sub-minute remainder is truncated: 59 seconds count as 0 minutes.
pub fn duration_hours(ticket: &Ticket) -> Result<f64> {
    let out_time = match ticket.out_time {
        Some(out_time) if out_time >= ticket.in_time => out_time,
        other => return Err(ParkingError::InvalidInterval { out_time: other }),
    };

    let minutes = (out_time - ticket.in_time).num_minutes();
    Ok(minutes as f64 / 60.0)
}

pub fn hourly_rate(parking_type: ParkingType, hours: f64) -> f64 {
    let first_thirty = hours <= FIRST_THIRTY_MINUTES_HOURS;
    match (parking_type, first_thirty) {
        (ParkingType::Car, true) => CAR_RATE_FIRST_THIRTY_MINUTES,
        (ParkingType::Car, false) => CAR_RATE_PER_HOUR,
        (ParkingType::Bike, true) => BIKE_RATE_FIRST_THIRTY_MINUTES,
        (ParkingType::Bike, false) => BIKE_RATE_PER_HOUR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParkingSpot;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn in_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn parked_for(parking_type: ParkingType, stay: Duration) -> Ticket {
        let spot = ParkingSpot::new(1, parking_type, false);
        let mut ticket = Ticket::open(&spot, "ABCDEF", in_time());
        ticket.out_time = Some(in_time() + stay);
        ticket
    }

    fn assert_price(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected price {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_car_parked_one_hour() {
        let mut ticket = parked_for(ParkingType::Car, Duration::minutes(60));
        let price = FareCalculator::new().compute_fare(&mut ticket, false).unwrap();

        assert_price(price, CAR_RATE_PER_HOUR);
        assert_eq!(ticket.price, Some(price));
    }

    #[test]
    fn test_bike_parked_one_hour() {
        let mut ticket = parked_for(ParkingType::Bike, Duration::minutes(60));
        let price = FareCalculator::new().compute_fare(&mut ticket, false).unwrap();

        assert_price(price, BIKE_RATE_PER_HOUR);
    }

    #[test]
    fn test_exactly_thirty_minutes_uses_first_thirty_minutes_rate() {
        for parking_type in ParkingType::ALL {
            let mut ticket = parked_for(parking_type, Duration::minutes(30));
            let price = FareCalculator::new().compute_fare(&mut ticket, false).unwrap();

            let first_rate = match parking_type {
                ParkingType::Car => CAR_RATE_FIRST_THIRTY_MINUTES,
                ParkingType::Bike => BIKE_RATE_FIRST_THIRTY_MINUTES,
            };
            assert_price(price, 0.5 * first_rate);
            assert_price(price, 0.0);
        }
    }

    #[test]
    fn test_thirty_one_minutes_starts_charging() {
        let mut ticket = parked_for(ParkingType::Car, Duration::minutes(31));
        let price = FareCalculator::new().compute_fare(&mut ticket, false).unwrap();

        assert_price(price, 31.0 / 60.0 * CAR_RATE_PER_HOUR);
    }

    #[test]
    fn test_forty_five_minutes_is_three_quarters_of_hourly_rate() {
        let mut car = parked_for(ParkingType::Car, Duration::minutes(45));
        let mut bike = parked_for(ParkingType::Bike, Duration::minutes(45));
        let calculator = FareCalculator::new();

        assert_price(calculator.compute_fare(&mut car, false).unwrap(), 0.75 * CAR_RATE_PER_HOUR);
        assert_price(calculator.compute_fare(&mut bike, false).unwrap(), 0.75 * BIKE_RATE_PER_HOUR);
    }

    #[test]
    fn test_recurring_user_gets_five_percent_off() {
        let mut ticket = parked_for(ParkingType::Car, Duration::minutes(45));
        let price = FareCalculator::new().compute_fare(&mut ticket, true).unwrap();

        assert_price(price, 0.75 * CAR_RATE_PER_HOUR * 0.95);
    }

    #[test]
    fn test_car_parked_a_whole_day() {
        let mut ticket = parked_for(ParkingType::Car, Duration::hours(24));
        let price = FareCalculator::new().compute_fare(&mut ticket, false).unwrap();

        assert_price(price, 24.0 * CAR_RATE_PER_HOUR);
    }

    #[test]
    fn test_sub_minute_remainder_is_truncated() {
        let ticket = parked_for(ParkingType::Car, Duration::seconds(59));
        assert_eq!(duration_hours(&ticket).unwrap(), 0.0);

        let ticket = parked_for(ParkingType::Car, Duration::seconds(60 * 45 + 59));
        assert_eq!(duration_hours(&ticket).unwrap(), 0.75);
    }

    #[test]
    fn test_exit_before_entry_fails_for_every_type() {
        for parking_type in ParkingType::ALL {
            let mut ticket = parked_for(parking_type, Duration::minutes(-60));
            let result = FareCalculator::new().compute_fare(&mut ticket, false);

            assert!(matches!(
                result,
                Err(ParkingError::InvalidInterval { out_time: Some(_) })
            ));
            assert!(ticket.price.is_none(), "failed computation must not set a price");
        }
    }

    #[test]
    fn test_missing_exit_time_fails_for_every_type() {
        for parking_type in ParkingType::ALL {
            let spot = ParkingSpot::new(1, parking_type, false);
            let mut ticket = Ticket::open(&spot, "ABCDEF", in_time());
            let result = FareCalculator::new().compute_fare(&mut ticket, true);

            assert!(matches!(
                result,
                Err(ParkingError::InvalidInterval { out_time: None })
            ));
        }
    }

    #[test]
    fn test_unknown_vehicle_type_never_reaches_a_rate() {
        for tag in ["TRUCK", "bus", ""] {
            assert!(matches!(
                tag.parse::<ParkingType>(),
                Err(ParkingError::UnknownVehicleType(_))
            ));
        }
    }
}
