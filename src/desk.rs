// Interactive parking desk: the attendant's menu loop.
//
// A failed entry or exit is reported and the menu comes back; the attendant
// decides whether to try again.

use std::io::{BufRead, Write};
use tracing::{error, info, warn};

use crate::error::{ParkingError, Result};
use crate::input::{ConsoleInput, MenuChoice};
use crate::lifecycle::ParkingService;
use crate::ports::{Clock, SpotStore, TicketStore};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeskSummary {
    pub entries: usize,
    pub exits: usize,
    pub failures: usize,
}

/// Run the menu until the attendant shuts the system down or input ends
pub fn run_desk<S, T, C, R, W>(
    service: &ParkingService<S, T, C>,
    console: &mut ConsoleInput<R, W>,
) -> Result<DeskSummary>
where
    S: SpotStore,
    T: TicketStore,
    C: Clock,
    R: BufRead,
    W: Write,
{
    let mut summary = DeskSummary::default();
    writeln!(console.writer(), "Welcome to Parking System!")?;

    loop {
        let choice = match console.read_menu_selection() {
            Ok(choice) => choice,
            Err(_) if console.is_exhausted() => break,
            Err(e) => {
                writeln!(console.writer(), "{}", e)?;
                continue;
            }
        };

        match choice {
            MenuChoice::IncomingVehicle => match service.process_incoming_vehicle(console) {
                Ok(receipt) => {
                    summary.entries += 1;
                    let ticket = &receipt.ticket;
                    let out = console.writer();
                    if receipt.recurring_user {
                        writeln!(
                            out,
                            "Welcome back! As a recurring user of our parking lot, you'll benefit from a 5% discount."
                        )?;
                    }
                    writeln!(out, "Generated Ticket and saved in DB")?;
                    writeln!(out, "Please park your vehicle in spot number: {}", ticket.spot_number)?;
                    writeln!(
                        out,
                        "Recorded in-time for vehicle number: {} is: {}",
                        ticket.vehicle_reg,
                        ticket.in_time.format("%Y-%m-%d %H:%M:%S")
                    )?;
                }
                Err(e) => {
                    summary.failures += 1;
                    log_failure("incoming vehicle", &e);
                    writeln!(console.writer(), "Unable to process incoming vehicle: {}", e)?;
                }
            },
            MenuChoice::ExitingVehicle => match service.process_exiting_vehicle(console) {
                Ok(receipt) => {
                    summary.exits += 1;
                    let out = console.writer();
                    writeln!(out, "Please pay the parking fare: {:.2}", receipt.price)?;
                    if let Some(out_time) = receipt.ticket.out_time {
                        writeln!(
                            out,
                            "Recorded out-time for vehicle number: {} is: {}",
                            receipt.ticket.vehicle_reg,
                            out_time.format("%Y-%m-%d %H:%M:%S")
                        )?;
                    }
                }
                Err(e) => {
                    summary.failures += 1;
                    log_failure("exiting vehicle", &e);
                    writeln!(console.writer(), "Unable to process exiting vehicle: {}", e)?;
                }
            },
            MenuChoice::Shutdown => {
                writeln!(console.writer(), "Exiting from the system!")?;
                break;
            }
        }
    }

    info!(
        entries = summary.entries,
        exits = summary.exits,
        failures = summary.failures,
        "desk closed"
    );
    Ok(summary)
}

fn log_failure(operation: &str, err: &ParkingError) {
    if err.is_rejection() {
        warn!("{} not processed: {}", operation, err);
    } else {
        error!("{} not processed: {}", operation, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{default_layout, seed_spots, setup_database, SqliteSpotStore, SqliteTicketStore};
    use crate::ports::SystemClock;
    use rusqlite::Connection;
    use std::io::Cursor;

    fn run_script(conn: &Connection, script: &str) -> (DeskSummary, String) {
        let service = ParkingService::with_clock(
            SqliteSpotStore::new(conn),
            SqliteTicketStore::new(conn),
            SystemClock,
        );
        let mut console = ConsoleInput::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());

        let summary = run_desk(&service, &mut console).unwrap();
        let output = String::from_utf8(console.writer().clone()).unwrap();
        (summary, output)
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_spots(&conn, &default_layout()).unwrap();
        conn
    }

    #[test]
    fn test_park_and_leave_through_the_menu() {
        let conn = test_db();

        // enter car ABCDEF, exit ABCDEF, shutdown
        let (summary, output) = run_script(&conn, "1\n1\nABCDEF\n2\nABCDEF\n3\n");

        assert_eq!(
            summary,
            DeskSummary {
                entries: 1,
                exits: 1,
                failures: 0
            }
        );
        assert!(output.contains("Please park your vehicle in spot number: 1"));
        // Immediate exit falls in the free first thirty minutes
        assert!(output.contains("Please pay the parking fare: 0.00"));
        assert!(output.contains("Exiting from the system!"));
    }

    #[test]
    fn test_failures_are_reported_and_menu_continues() {
        let conn = test_db();

        // bad menu option, exit of unknown vehicle, bad vehicle type, then EOF
        let (summary, output) = run_script(&conn, "9\n2\nGHOST\n1\n5\n");

        assert_eq!(summary.failures, 2);
        assert_eq!(summary.entries, 0);
        assert!(output.contains("unknown menu option '9'"));
        assert!(output.contains("No open ticket for vehicle GHOST"));
        assert!(output.contains("unknown vehicle type option '5'"));
    }

    #[test]
    fn test_recurring_user_is_welcomed_back() {
        let conn = test_db();

        let (_, output) = run_script(&conn, "1\n2\nBK-1\n2\nBK-1\n1\n2\nBK-1\n3\n");

        assert!(output.contains("Welcome back!"));
        assert!(output.contains("spot number: 4"));
    }
}
