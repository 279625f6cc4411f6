use anyhow::{Context, Result};
use clap::Parser;
use std::io;

use parking_system::config::{Cli, Command};
use parking_system::{
    list_open_tickets, list_spots, logger, open_database, run_desk, seed_spots, ConsoleInput,
    ParkingService, ParkingType, SqliteSpotStore, SqliteTicketStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    let conn = open_database(cli.db_path())
        .with_context(|| format!("Failed to open database {}", cli.db_path().display()))?;
    let spots = cli.layout_spots().context("Failed to load facility layout")?;
    seed_spots(&conn, &spots)?;

    match cli.command() {
        Command::Desk => run_desk_mode(&conn),
        Command::Init => {
            println!("✓ Database ready at {}", cli.db_path().display());
            println!("✓ Facility has {} spots", list_spots(&conn)?.len());
            Ok(())
        }
        Command::Status => print_status(&conn),
        #[cfg(feature = "tui")]
        Command::Tui => run_ui_mode(&conn),
    }
}

fn run_desk_mode(conn: &rusqlite::Connection) -> Result<()> {
    let service = ParkingService::new(SqliteSpotStore::new(conn), SqliteTicketStore::new(conn));
    let stdin = io::stdin();
    let mut console = ConsoleInput::new(stdin.lock(), io::stdout());

    run_desk(&service, &mut console)?;
    Ok(())
}

fn print_status(conn: &rusqlite::Connection) -> Result<()> {
    let spots = list_spots(conn)?;
    let open = list_open_tickets(conn)?;

    println!("🅿️  Parking status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for parking_type in ParkingType::ALL {
        let total = spots.iter().filter(|s| s.parking_type == parking_type).count();
        let free = spots
            .iter()
            .filter(|s| s.parking_type == parking_type && s.available)
            .count();
        println!("{:<5} {} free / {} spots", parking_type, free, total);
    }

    println!("\n🎫 Open tickets: {}", open.len());
    for ticket in &open {
        println!(
            "  spot {:>3}  {:<12} since {}",
            ticket.spot_number,
            ticket.vehicle_reg,
            ticket.in_time.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &rusqlite::Connection) -> Result<()> {
    let mut app = parking_system::ui::App::load(conn)?;
    parking_system::ui::run_ui(&mut app, conn)?;
    Ok(())
}
