// End-to-end parking flows against a database file, the way the desk and the
// server use it

use chrono::{Duration, TimeZone, Utc};
use parking_system::{
    get_events_for_entity, list_open_tickets, list_spots, open_database, seed_spots,
    ManualClock, ParkingError, ParkingService, ParkingSpot, ParkingType, SpotStore,
    SqliteSpotStore, SqliteTicketStore, TicketStore, CAR_RATE_PER_HOUR,
};
use std::collections::HashSet;
use std::path::Path;
use std::thread;

fn assert_price(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected price {}, got {}",
        expected,
        actual
    );
}

fn car_spots(count: i64) -> Vec<ParkingSpot> {
    (1..=count)
        .map(|number| ParkingSpot::new(number, ParkingType::Car, true))
        .collect()
}

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
}

#[test]
fn test_car_stays_a_whole_day() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_database(&dir.path().join("parking.db")).unwrap();
    seed_spots(&conn, &parking_system::default_layout()).unwrap();
    let clock = start_clock();
    let service = ParkingService::with_clock(
        SqliteSpotStore::new(&conn),
        SqliteTicketStore::new(&conn),
        &clock,
    );

    let entry = service.process_entry("ABCDEF", ParkingType::Car).unwrap();
    clock.advance(Duration::hours(24));
    let exit = service.process_exit("ABCDEF").unwrap();

    assert_price(exit.price, 24.0 * CAR_RATE_PER_HOUR);
    assert_eq!(exit.ticket.id, entry.ticket.id);
    assert_eq!(exit.ticket.price, Some(exit.price));

    let id = exit.ticket.id.unwrap().to_string();
    let events = get_events_for_entity(&conn, "ticket", &id).unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["ticket_opened", "ticket_closed"]);
}

#[test]
fn test_state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parking.db");
    let clock = start_clock();

    {
        let conn = open_database(&path).unwrap();
        seed_spots(&conn, &parking_system::default_layout()).unwrap();
        let service = ParkingService::with_clock(
            SqliteSpotStore::new(&conn),
            SqliteTicketStore::new(&conn),
            &clock,
        );
        service.process_entry("BK-42", ParkingType::Bike).unwrap();
    }

    clock.advance(Duration::minutes(45));

    let conn = open_database(&path).unwrap();
    // Re-seeding on restart must not free the occupied spot
    seed_spots(&conn, &parking_system::default_layout()).unwrap();
    assert!(!SqliteSpotStore::new(&conn).get_spot(4).unwrap().unwrap().available);

    let service = ParkingService::with_clock(
        SqliteSpotStore::new(&conn),
        SqliteTicketStore::new(&conn),
        &clock,
    );
    let exit = service.process_exit("BK-42").unwrap();
    assert_price(exit.price, 0.75 * parking_system::BIKE_RATE_PER_HOUR);
    assert!(list_open_tickets(&conn).unwrap().is_empty());
}

#[test]
fn test_full_facility_rejects_entry_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_database(&dir.path().join("parking.db")).unwrap();
    seed_spots(&conn, &car_spots(1)).unwrap();
    let service = ParkingService::new(SqliteSpotStore::new(&conn), SqliteTicketStore::new(&conn));

    service.process_entry("FIRST", ParkingType::Car).unwrap();
    let result = service.process_entry("SECOND", ParkingType::Car);

    assert!(matches!(result, Err(ParkingError::NoSpotAvailable(ParkingType::Car))));
    assert!(SqliteTicketStore::new(&conn).get_open_ticket("SECOND").unwrap().is_none());
    assert_eq!(list_open_tickets(&conn).unwrap().len(), 1);

    // No bike spots at all in this facility
    assert!(matches!(
        service.process_entry("BIKER", ParkingType::Bike),
        Err(ParkingError::NoSpotAvailable(ParkingType::Bike))
    ));
}

fn park_from_own_connection(path: &Path, vehicle_reg: &str) -> i64 {
    let conn = open_database(path).unwrap();
    let service = ParkingService::new(SqliteSpotStore::new(&conn), SqliteTicketStore::new(&conn));
    service
        .process_entry(vehicle_reg, ParkingType::Car)
        .unwrap()
        .ticket
        .spot_number
}

#[test]
fn test_concurrent_entries_never_share_a_spot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parking.db");
    {
        let conn = open_database(&path).unwrap();
        seed_spots(&conn, &car_spots(12)).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                (0..3)
                    .map(|n| park_from_own_connection(&path, &format!("CAR-{}-{}", worker, n)))
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut spots = Vec::new();
    for handle in handles {
        spots.extend(handle.join().unwrap());
    }

    let unique: HashSet<i64> = spots.iter().copied().collect();
    assert_eq!(spots.len(), 12);
    assert_eq!(unique.len(), 12, "Two vehicles were given the same spot: {:?}", spots);

    let conn = open_database(&path).unwrap();
    assert!(list_spots(&conn).unwrap().iter().all(|spot| !spot.available));
    assert_eq!(list_open_tickets(&conn).unwrap().len(), 12);
}
