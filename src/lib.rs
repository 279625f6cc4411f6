// Parking System - Core Library
// Spot allocation, ticket lifecycle and fare computation, shared by the
// desk CLI, the dashboard and the API server

pub mod allocator;
pub mod config;
pub mod db;
pub mod desk;
pub mod error;
pub mod fare;
pub mod input;
pub mod lifecycle;
pub mod logger;
pub mod model;
pub mod ports;

// Only compile the dashboard when the TUI feature is enabled
#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use allocator::SpotAllocator;
pub use db::{
    default_layout, get_events_for_entity, insert_event, list_open_tickets, list_spots,
    load_layout_csv, open_database, seed_spots, setup_database, Event, SqliteSpotStore,
    SqliteTicketStore,
};
pub use desk::{run_desk, DeskSummary};
pub use error::{ParkingError, Result};
pub use fare::{
    FareCalculator, BIKE_RATE_FIRST_THIRTY_MINUTES, BIKE_RATE_PER_HOUR,
    CAR_RATE_FIRST_THIRTY_MINUTES, CAR_RATE_PER_HOUR, RECURRING_USER_DISCOUNT,
};
pub use input::{ConsoleInput, MenuChoice};
pub use lifecycle::{EntryReceipt, ExitReceipt, ParkingService};
pub use model::{ParkingSpot, ParkingType, Ticket, TicketState};
pub use ports::{Clock, InputSource, ManualClock, SpotStore, SystemClock, TicketStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
