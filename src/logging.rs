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

//! Logging setup.
//!
//! Two profiles. The daemon writes rotated log files under the controller's
//! own config directory (`~/.epomaker-controller/logs/`) so a long-running
//! session leaves a trail next to its config; one-shot commands only log to
//! stderr. `RUST_LOG` overrides the default level of either profile.

// ----- Crates -----

use crate::config;
use flexi_logger::{Cleanup, Criterion, Duplicate, Logger, Naming};
use std::fs;
use std::io;

// ----- Constants -----

/// Subdirectory of the config directory holding daemon logs
const LOG_DIR_NAME: &str = "logs";
/// Rotate after this many bytes
const LOG_ROTATE_BYTES: u64 = 500_000;
/// Rotated files kept before cleanup
const LOG_KEEP_FILES: usize = 3;

// ----- Functions -----

/// Daemon logging: rotated files plus stderr
///
/// # Remarks
/// The telemetry daemon runs unattended for days; the rotation cap keeps the
/// trail bounded. Failure to set up logging is reported to the caller, not
/// fatal, so the daemon still runs on a read-only home directory.
pub fn setup_logging() -> Result<(), io::Error> {
    let directory = config::config_dir().join(LOG_DIR_NAME);
    fs::create_dir_all(&directory)?;

    Logger::with_env_or_str("info")
        .log_to_file()
        .directory(&directory)
        .format_for_files(flexi_logger::detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(LOG_KEEP_FILES),
        )
        .duplicate_to_stderr(Duplicate::Info)
        .start()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("could not start logger: {}", e),
            )
        })?;

    info!("Epomaker RT100 controller starting, logging to {:?}", directory);
    Ok(())
}

/// One-shot command logging: stderr only, warnings and up by default
pub fn setup_logging_lite() -> Result<(), io::Error> {
    Logger::with_env_or_str("warn")
        .format(flexi_logger::colored_default_format)
        .start()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("could not start logger: {}", e),
            )
        })?;
    Ok(())
}
