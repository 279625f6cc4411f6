use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::db::{default_layout, load_layout_csv};
use crate::error::Result;
use crate::model::ParkingSpot;

#[derive(Debug, Clone, Parser)]
#[command(name = "parking-system")]
#[command(about = "Parking desk: spot allocation, tickets and fares")]
pub struct Cli {
    /// SQLite database file
    #[arg(long, env = "PARKING_DB", default_value = "parking.db")]
    pub db: PathBuf,

    /// CSV facility layout (`number,parking_type`); defaults to 3 car and 2 bike spots
    #[arg(long, env = "PARKING_LAYOUT")]
    pub layout: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Interactive attendant menu (default)
    Desk,
    /// Create the schema and seed the facility layout
    Init,
    /// Print spot occupancy and open tickets
    Status,
    /// Read-only terminal dashboard
    #[cfg(feature = "tui")]
    Tui,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Desk)
    }

    /// Spots described by `--layout`, or the default facility
    pub fn layout_spots(&self) -> Result<Vec<ParkingSpot>> {
        match &self.layout {
            Some(path) => load_layout_csv(path),
            None => Ok(default_layout()),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_desk_mode() {
        let cli = Cli::try_parse_from(["parking-system", "--db", "test.db"]).unwrap();

        assert_eq!(cli.command(), Command::Desk);
        assert_eq!(cli.db_path(), Path::new("test.db"));
        assert_eq!(cli.layout_spots().unwrap().len(), 5);
    }

    #[test]
    fn test_parses_subcommand_and_flags() {
        let cli = Cli::try_parse_from(["parking-system", "-v", "--db", "x.db", "status"]).unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.command(), Command::Status);
    }

    #[test]
    fn test_missing_layout_file_is_a_store_failure() {
        let cli = Cli::try_parse_from([
            "parking-system",
            "--db",
            "x.db",
            "--layout",
            "/nonexistent/layout.csv",
        ])
        .unwrap();

        assert!(matches!(
            cli.layout_spots(),
            Err(crate::error::ParkingError::StoreFailure(_))
        ));
    }
}
