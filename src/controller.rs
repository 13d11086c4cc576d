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

//! High-level keyboard operations and the telemetry daemon.

// ----- Crates -----

use crate::config::MainConfig;
use crate::device::{Transport, IMAGE_REPORT_DELAY, REPORT_DELAY};
use crate::keys::KeyboardKeys;
use crate::sensors::TelemetrySource;
use crate::{Error, RUNNING};
use chrono::Local;
use epomaker_protocol::commands::{self, KeyMap, KeyboardRgbFrame, Profile, TELEMETRY_MAX};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

// ----- Constants -----

/// Minimum daemon cycle duration; the LCD refreshes no faster than this
pub const DAEMON_MIN_CYCLE: Duration = Duration::from_millis(1600);

/// Frame time used when setting static key colours
const STATIC_FRAME_TIME_MS: u8 = 50;

// ----- Structs -----

/// Scope guard enforcing a minimum elapsed duration
///
/// Started at the top of a daemon cycle; [`CadenceGuard::wait`] sleeps off
/// whatever the cycle body left of the minimum.
pub struct CadenceGuard {
    min: Duration,
    started: Instant,
}

impl CadenceGuard {
    pub fn start(min: Duration) -> CadenceGuard {
        CadenceGuard {
            min,
            started: Instant::now(),
        }
    }

    pub fn wait(self) {
        let elapsed = self.started.elapsed();
        if elapsed < self.min {
            thread::sleep(self.min - elapsed);
        }
    }
}

/// One opened keyboard plus the loaded keymap
pub struct Controller {
    config: MainConfig,
    keys: KeyboardKeys,
    transport: Transport,
}

impl Controller {
    /// Load the keymap and open the device (or a dry-run transport)
    ///
    /// # Remarks
    /// On a 2.4 GHz configuration the dongle is woken and negotiated before
    /// the controller is handed back; commands sent to a sleeping dongle
    /// vanish silently.
    pub fn open(config: MainConfig, dry_run: bool) -> Result<Controller, Error> {
        let keys = KeyboardKeys::load(Path::new(&config.conf_keymap_path))?;
        let transport = if dry_run {
            Transport::dry_run()
        } else {
            Transport::open(&config)?
        };

        let mut controller = Controller {
            config,
            keys,
            transport,
        };
        if controller.config.use_wireless {
            controller.connect_wireless()?;
        }
        Ok(controller)
    }

    pub fn config(&self) -> &MainConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyboardKeys {
        &self.keys
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Wake the dongle (polls) and run the negotiation sequence
    fn connect_wireless(&mut self) -> Result<(), Error> {
        info!("Negotiating 2.4 GHz dongle state");
        self.transport.send(&commands::poll()?, REPORT_DELAY)?;
        self.transport.send(&commands::poll()?, REPORT_DELAY)?;
        self.transport.send(&commands::wireless_init()?, REPORT_DELAY)?;
        self.transport.send(&commands::poll()?, REPORT_DELAY)
    }

    /// Push an image file to the LCD
    pub fn send_image(&mut self, path: &Path) -> Result<(), Error> {
        let command = commands::image(path)?;
        info!("Uploading {:?} as {} reports", path, command.len());
        self.transport.send(&command, IMAGE_REPORT_DELAY)
    }

    /// Set the LCD clock to the given local time
    pub fn send_time(&mut self, time: chrono::NaiveDateTime) -> Result<(), Error> {
        self.transport.send(&commands::time(&time)?, REPORT_DELAY)
    }

    /// Set the LCD clock to now
    pub fn send_time_now(&mut self) -> Result<(), Error> {
        self.send_time(Local::now().naive_local())
    }

    /// Push a temperature reading (0..=99 C) to the LCD
    pub fn send_temperature(&mut self, celsius: u8) -> Result<(), Error> {
        self.transport
            .send(&commands::temperature(celsius)?, REPORT_DELAY)
    }

    /// Push a CPU usage reading (0..=99 %) to the LCD
    pub fn send_cpu(&mut self, percent: u8) -> Result<(), Error> {
        self.transport.send(&commands::cpu(percent)?, REPORT_DELAY)
    }

    /// Drive per-key RGB with prepared animation frames
    pub fn send_key_frames(&mut self, frames: &[KeyboardRgbFrame]) -> Result<(), Error> {
        self.transport
            .send(&commands::key_rgb(frames)?, REPORT_DELAY)
    }

    /// Set every key in the keymap to one colour
    pub fn set_rgb_all_keys(&mut self, r: u8, g: u8, b: u8) -> Result<(), Error> {
        let mut key_map = KeyMap::new();
        for key in self.keys.iter() {
            key_map.set(key.value, (r, g, b))?;
        }
        let frames = [KeyboardRgbFrame::new(key_map, STATIC_FRAME_TIME_MS, 0)];
        self.send_key_frames(&frames)
    }

    /// Select a built-in lighting profile
    pub fn set_profile(&mut self, profile: &Profile) -> Result<(), Error> {
        self.transport
            .send(&commands::profile(profile)?, REPORT_DELAY)
    }

    /// Remap an internal key index to a USB HID usage code
    pub fn remap_key(&mut self, key_index: u8, key_combo: u8) -> Result<(), Error> {
        self.transport
            .send(&commands::remap_key(key_index, key_combo)?, REPORT_DELAY)
    }

    /// Reset the LCD image
    pub fn clear_screen(&mut self) -> Result<(), Error> {
        self.transport
            .send(&commands::clear_screen()?, REPORT_DELAY)
    }

    /// Release the device handle
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Periodic time/CPU/temperature push until a signal arrives
    ///
    /// # Arguments
    /// * `source` - where CPU and temperature readings come from
    /// * `temp_key` - hwmon sensor key to report, if any
    ///
    /// # Remarks
    /// A send failure ends the session; an out-of-range reading is logged and
    /// skipped. The transport closes on every way out of the loop.
    pub fn start_daemon(
        &mut self,
        source: &dyn TelemetrySource,
        temp_key: Option<&str>,
    ) -> Result<(), Error> {
        info!("Telemetry daemon starting, minimum cycle {:?}", DAEMON_MIN_CYCLE);
        let result = self.daemon_loop(source, temp_key);
        self.close();
        result
    }

    fn daemon_loop(
        &mut self,
        source: &dyn TelemetrySource,
        temp_key: Option<&str>,
    ) -> Result<(), Error> {
        self.send_time_now()?;

        while RUNNING.load(Ordering::SeqCst) {
            let guard = CadenceGuard::start(DAEMON_MIN_CYCLE);

            match source.cpu_usage() {
                // The device field caps at 99; saturate rather than skip a beat
                Some(percent) => self.send_cpu(percent.min(u32::from(TELEMETRY_MAX)) as u8)?,
                None => warn!("CPU usage unavailable this cycle"),
            }

            if let Some(key) = temp_key {
                match source.device_temperature(key) {
                    Some(t) if (0..=i64::from(TELEMETRY_MAX)).contains(&t) => {
                        self.send_temperature(t as u8)?
                    }
                    Some(t) => warn!("Temperature {} C for {:?} out of range, skipping", t, key),
                    None => warn!("Temperature key {:?} not found, skipping", key),
                }
            }

            guard.wait();
        }

        info!("Telemetry daemon stopping");
        Ok(())
    }
}
