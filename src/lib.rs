/* Copyright (C) 2024 by Sam Rodgers
 *
 * This file is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Host-side control for the Epomaker RT100 keyboard.
//!
//! The protocol encoding lives in the `epomaker-protocol` crate; this crate
//! supplies everything around it: configuration, the keymap, the HID
//! transport, the high-level controller and the telemetry daemon.

// ----- Crates -----

#[macro_use]
extern crate log;

// ----- Modules -----

pub mod config;
pub mod controller;
pub mod device;
pub mod keys;
pub mod logging;
pub mod sensors;
pub mod udev;

#[cfg(test)]
mod test;

// ----- Functions -----

use epomaker_protocol::ProtocolError;
use lazy_static::lazy_static;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

lazy_static! {
    /// Cooperative shutdown flag; cleared by the signal handler so that send
    /// loops abandon in-flight commands and the device closes cleanly.
    pub static ref RUNNING: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
}

// ----- Enumerations -----

/// Controller-level errors
#[derive(Debug)]
pub enum Error {
    /// Missing or malformed configuration, or an unknown keymap name
    Config(String),
    /// No HID device matched the configured vendor/product set
    DeviceNotFound(String),
    /// OS-level HID open or write failure
    DeviceIo(String),
    /// A signal arrived mid-command; the command was abandoned
    Interrupted,
    /// Encoding failure from the protocol layer
    Protocol(ProtocolError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::DeviceNotFound(msg) => write!(f, "device not found: {}", msg),
            Error::DeviceIo(msg) => write!(f, "device I/O error: {}", msg),
            Error::Interrupted => write!(f, "interrupted by signal"),
            Error::Protocol(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Error {
        Error::Protocol(e)
    }
}

impl From<hidapi::HidError> for Error {
    fn from(e: hidapi::HidError) -> Error {
        Error::DeviceIo(e.to_string())
    }
}
