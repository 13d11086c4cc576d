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

//! HID transport.
//!
//! Enumerates the keyboard by vendor/product ID, picks the one interface
//! that accepts feature reports without disturbing keystroke input, and
//! writes prepared commands report by report. The keyboard never answers;
//! transmission is fire and forget.
//!
//! The keyboard enumerates several HID interfaces. On Linux the usable one is
//! found by walking `/sys/class/input/event*/device/name`, matching the
//! configured description regex, and resolving the entry's `B-P:C.I` HID path
//! component back to a hidraw node. On other hosts the first VID/PID match is
//! taken.

// ----- Crates -----

use crate::config::MainConfig;
use crate::{Error, RUNNING};
use epomaker_protocol::{Command, REPORT_LEN};
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::ffi::{CStr, CString};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

// ----- Constants -----

/// Inter-report delay for image uploads; the endpoint drops reports when the
/// 1002-report burst arrives unthrottled
pub const IMAGE_REPORT_DELAY: Duration = Duration::from_millis(10);
/// Inter-report delay for everything else
pub const REPORT_DELAY: Duration = Duration::from_millis(1);

// ----- Structs -----

/// Exclusively-owned handle to the keyboard's control interface
///
/// # Remarks
/// Closing is idempotent and also runs on drop, so the handle is released on
/// every exit path including the signal-triggered ones.
pub struct Transport {
    device: Option<HidDevice>,
    dry_run: bool,
    reports_sent: usize,
}

impl Transport {
    /// Enumerate, select an interface and open it
    pub fn open(config: &MainConfig) -> Result<Transport, Error> {
        let api = HidApi::new()?;
        let path = find_device_path(&api, config)?;
        info!("Opening HID device {:?}", path);
        let device = api.open_path(&path)?;

        if let Ok(Some(product)) = device.get_product_string() {
            info!("Product: {}", product);
        }
        if let Ok(Some(manufacturer)) = device.get_manufacturer_string() {
            info!("Manufacturer: {}", manufacturer);
        }

        Ok(Transport {
            device: Some(device),
            dry_run: false,
            reports_sent: 0,
        })
    }

    /// Transport that validates and logs every report without a device
    pub fn dry_run() -> Transport {
        Transport {
            device: None,
            dry_run: true,
            reports_sent: 0,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Reports written (or logged, in dry-run mode) since opening
    pub fn reports_sent(&self) -> usize {
        self.reports_sent
    }

    /// Write a prepared command, one feature report at a time
    ///
    /// # Arguments
    /// * `command` - must be prepared; unprepared commands never reach the wire
    /// * `delay` - pause between consecutive reports
    ///
    /// # Remarks
    /// Reports go out in strict slot order. A pending shutdown signal aborts
    /// between reports; the device is left to time out the partial command.
    pub fn send(&mut self, command: &Command, delay: Duration) -> Result<(), Error> {
        for report in command.report_bytes().map_err(Error::Protocol)? {
            if !RUNNING.load(Ordering::SeqCst) {
                self.close();
                return Err(Error::Interrupted);
            }

            debug_assert_eq!(report.len(), REPORT_LEN);
            match &self.device {
                Some(device) => {
                    device.send_feature_report(report)?;
                    trace!("Sent {} bytes", report.len());
                    trace!("{:02x?}", &report[..]);
                }
                None if self.dry_run => {
                    debug!("Dry run: {:02x?}", &report[..]);
                }
                None => {
                    return Err(Error::DeviceIo("device already closed".to_string()));
                }
            }
            self.reports_sent += 1;

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        Ok(())
    }

    /// Release the device handle; safe to call any number of times
    pub fn close(&mut self) {
        if self.device.take().is_some() {
            info!("HID device closed");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

// ----- Functions -----

/// Human-readable one-liner for an enumerated interface
fn device_name(device_info: &DeviceInfo) -> String {
    let mut string = format!(
        "[{:04x}:{:04x}] I:{} {:?} ",
        device_info.vendor_id(),
        device_info.product_id(),
        device_info.interface_number(),
        device_info.path(),
    );
    if let Some(m) = device_info.manufacturer_string() {
        string += m;
    }
    if let Some(p) = device_info.product_string() {
        string += &format!(" {}", p);
    }
    string
}

/// List every interface matching the configured vendor/product set
pub fn list_interfaces(config: &MainConfig) -> Result<Vec<String>, Error> {
    let api = HidApi::new()?;
    let mut lines = Vec::new();
    for device_info in api.device_list() {
        if device_info.vendor_id() != config.vendor_id {
            continue;
        }
        let pid = device_info.product_id();
        if config.product_ids_wired.contains(&pid) || config.product_ids_24g.contains(&pid) {
            lines.push(device_name(device_info));
        }
    }
    Ok(lines)
}

/// Pick the HID path to open for the active (wired or 2.4 GHz) configuration
fn find_device_path(api: &HidApi, config: &MainConfig) -> Result<CString, Error> {
    let products = if config.use_wireless {
        &config.product_ids_24g
    } else {
        &config.product_ids_wired
    };

    // First product ID that enumerates anything wins
    for &pid in products {
        let candidates: Vec<&DeviceInfo> = api
            .device_list()
            .filter(|d| d.vendor_id() == config.vendor_id && d.product_id() == pid)
            .collect();
        if candidates.is_empty() {
            continue;
        }
        debug!("Found {} interface(s) for {:04x}:{:04x}", candidates.len(), config.vendor_id, pid);
        for candidate in &candidates {
            debug!("  {}", device_name(candidate));
        }

        if let Some(path) = select_interface(&candidates, config)? {
            return Ok(path.to_owned());
        }
        warn!("Interface description match failed, falling back to the first interface");
        return Ok(candidates[0].path().to_owned());
    }

    Err(Error::DeviceNotFound(format!(
        "no HID device for vendor {:04x} with products {:04x?}",
        config.vendor_id, products
    )))
}

/// Resolve the control interface via the input-device description (Linux)
#[cfg(target_os = "linux")]
fn select_interface<'a>(
    candidates: &[&'a DeviceInfo],
    config: &MainConfig,
) -> Result<Option<&'a CStr>, Error> {
    use regex::Regex;
    use std::fs;

    let description = Regex::new(&config.device_description_regex)
        .map_err(|e| Error::Config(format!("bad DEVICE_DESCRIPTION_REGEX: {}", e)))?;
    // B-P:C.I, e.g. "1-2:1.1" (bus-port : configuration . interface)
    let hid_component = Regex::new(r"\d+-[\d.]+:\d+\.\d+").expect("static regex");
    let flavour = if config.use_wireless { "Wireless" } else { "Wired" };

    let entries = match fs::read_dir("/sys/class/input") {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot walk /sys/class/input: {}", e);
            return Ok(None);
        }
    };

    // Collect (name, hid path component) for inputs matching the regex
    let mut matches: Vec<(String, String)> = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("event") {
            continue;
        }
        let name = match fs::read_to_string(entry.path().join("device/name")) {
            Ok(name) => name.trim().to_string(),
            Err(_) => continue,
        };
        if !description.is_match(&name) {
            continue;
        }
        let resolved = match fs::canonicalize(entry.path()) {
            Ok(resolved) => resolved.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        if let Some(component) = hid_component.find(&resolved) {
            debug!("Input {:?} -> {}", name, component.as_str());
            matches.push((name, component.as_str().to_string()));
        }
    }

    // Prefer the interface whose description names the active link type
    matches.sort_by_key(|(name, _)| !name.contains(flavour));
    for (name, component) in &matches {
        for candidate in candidates {
            if let Some(sysfs) = hidraw_sysfs_path(candidate.path()) {
                if sysfs.contains(component) {
                    info!("Selected interface {:?} via {:?}", candidate.path(), name);
                    return Ok(Some(candidate.path()));
                }
            }
        }
    }

    Ok(None)
}

/// Substituted enumerator for non-Linux hosts; the description predicate has
/// nothing to match against here, so the first candidate is used
#[cfg(not(target_os = "linux"))]
fn select_interface<'a>(
    _candidates: &[&'a DeviceInfo],
    _config: &MainConfig,
) -> Result<Option<&'a CStr>, Error> {
    Ok(None)
}

/// Map a hidraw device node to its sysfs device path
#[cfg(target_os = "linux")]
fn hidraw_sysfs_path(dev_path: &CStr) -> Option<String> {
    let node = dev_path.to_str().ok()?.strip_prefix("/dev/")?;
    std::fs::canonicalize(format!("/sys/class/hidraw/{}/device", node))
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}
