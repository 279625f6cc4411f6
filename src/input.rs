use std::io::{self, BufRead, Write};

use crate::error::{ParkingError, Result};
use crate::lifecycle::normalize_registration;
use crate::model::ParkingType;
use crate::ports::InputSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    IncomingVehicle,
    ExitingVehicle,
    Shutdown,
}

/// Attendant console: prompts on `writer`, answers come line by line from `reader`
pub struct ConsoleInput<R, W> {
    reader: R,
    writer: W,
    exhausted: bool,
}

impl<R: BufRead, W: Write> ConsoleInput<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            exhausted: false,
        }
    }

    /// True once the reader hit end of input
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn read_menu_selection(&mut self) -> Result<MenuChoice> {
        writeln!(self.writer, "Please select an option. Enter the number to proceed.")?;
        writeln!(self.writer, "1 New Vehicle Entering - Allocate Parking Space")?;
        writeln!(self.writer, "2 Vehicle Exiting - Generate Ticket Price")?;
        writeln!(self.writer, "3 Shutdown System")?;

        match self.read_line()?.as_str() {
            "1" => Ok(MenuChoice::IncomingVehicle),
            "2" => Ok(MenuChoice::ExitingVehicle),
            "3" => Ok(MenuChoice::Shutdown),
            other => Err(ParkingError::InvalidInput(format!("unknown menu option '{}'", other))),
        }
    }

    /// Next line without its line ending. EOF is an input error.
    fn read_line(&mut self) -> Result<String> {
        self.writer.flush()?;
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => {
                ParkingError::InvalidInput("input is not valid UTF-8".to_string())
            }
            _ => ParkingError::from(e),
        })?;
        if read == 0 {
            self.exhausted = true;
            return Err(ParkingError::InvalidInput("end of input".to_string()));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> InputSource for ConsoleInput<R, W> {
    fn read_vehicle_type(&mut self) -> Result<ParkingType> {
        writeln!(self.writer, "Please select vehicle type from menu")?;
        writeln!(self.writer, "1 CAR")?;
        writeln!(self.writer, "2 BIKE")?;

        match self.read_line()?.as_str() {
            "1" => Ok(ParkingType::Car),
            "2" => Ok(ParkingType::Bike),
            other => Err(ParkingError::InvalidInput(format!("unknown vehicle type option '{}'", other))),
        }
    }

    fn read_vehicle_registration(&mut self) -> Result<String> {
        writeln!(
            self.writer,
            "Please type the vehicle registration number and press enter key"
        )?;
        let line = self.read_line()?;
        normalize_registration(&line)
    }
}
