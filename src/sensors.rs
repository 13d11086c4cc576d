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

//! System telemetry for the daemon.
//!
//! CPU usage comes from `/proc/stat` deltas, temperatures from
//! `/sys/class/hwmon`. Sensor keys are `{device}-{index}`, one per temperature
//! input, so a chip with several probes exposes each of them. Non-Linux hosts
//! report nothing; the daemon logs and carries on.

// ----- Crates -----

use rand::Rng;
#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::thread;
#[cfg(target_os = "linux")]
use std::time::Duration;

// ----- Constants -----

/// Sampling window for a CPU usage reading
#[cfg(target_os = "linux")]
const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

// ----- Traits -----

/// Where the daemon's readings come from
pub trait TelemetrySource {
    /// Current CPU usage percentage
    fn cpu_usage(&self) -> Option<u32>;
    /// Current temperature in whole degrees C for a sensor key
    fn device_temperature(&self, key: &str) -> Option<i64>;
}

// ----- Structs -----

/// Real sensors read from the running system
pub struct SystemSensors;

impl TelemetrySource for SystemSensors {
    fn cpu_usage(&self) -> Option<u32> {
        cpu_usage()
    }

    fn device_temperature(&self, key: &str) -> Option<i64> {
        let sensors = temperature_sensors();
        match sensors.iter().find(|(name, _)| name == key) {
            Some((_, temp)) => Some(temp.round() as i64),
            None => {
                let available: Vec<&str> = sensors.iter().map(|(name, _)| name.as_str()).collect();
                warn!("Temperature key {:?} not found. Available keys: {:?}", key, available);
                None
            }
        }
    }
}

/// Random readings for exercising the daemon without real hardware load
pub struct TestSensors;

impl TelemetrySource for TestSensors {
    fn cpu_usage(&self) -> Option<u32> {
        Some(rand::thread_rng().gen_range(0..=99))
    }

    fn device_temperature(&self, _key: &str) -> Option<i64> {
        Some(rand::thread_rng().gen_range(0..=99))
    }
}

#[cfg(target_os = "linux")]
struct CpuSample {
    busy: u64,
    total: u64,
}

// ----- Functions -----

/// CPU usage over a short sampling window
#[cfg(target_os = "linux")]
pub fn cpu_usage() -> Option<u32> {
    let first = read_proc_stat()?;
    thread::sleep(CPU_SAMPLE_WINDOW);
    let second = read_proc_stat()?;

    let busy = second.busy.saturating_sub(first.busy) as f64;
    let total = second.total.saturating_sub(first.total) as f64;
    if total <= 0.0 {
        return Some(0);
    }
    Some((busy / total * 100.0).round() as u32)
}

/// No portable CPU counters off Linux; the daemon logs and carries on
#[cfg(not(target_os = "linux"))]
pub fn cpu_usage() -> Option<u32> {
    None
}

#[cfg(target_os = "linux")]
fn read_proc_stat() -> Option<CpuSample> {
    let stat = fs::read_to_string("/proc/stat").ok()?;
    // Aggregate "cpu" line: user nice system idle iowait irq softirq ...
    let line = stat.lines().next()?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }

    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuSample {
        busy: total - idle,
        total,
    })
}

/// Every temperature sensor as `({device}-{index}, degrees C)`
#[cfg(target_os = "linux")]
pub fn temperature_sensors() -> Vec<(String, f64)> {
    let mut sensors = Vec::new();
    let entries = match fs::read_dir("/sys/class/hwmon") {
        Ok(entries) => entries,
        Err(_) => return sensors,
    };

    let mut devices: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    devices.sort();

    for device in devices {
        let name = match fs::read_to_string(device.join("name")) {
            Ok(name) => name.trim().to_string(),
            Err(_) => continue,
        };

        let mut inputs: Vec<_> = match fs::read_dir(&device) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|f| {
                            let f = f.to_string_lossy();
                            f.starts_with("temp") && f.ends_with("_input")
                        })
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => continue,
        };
        inputs.sort();

        for (index, input) in inputs.iter().enumerate() {
            if let Ok(raw) = fs::read_to_string(input) {
                if let Ok(millidegrees) = raw.trim().parse::<i64>() {
                    sensors.push((format!("{}-{}", name, index), millidegrees as f64 / 1000.0));
                }
            }
        }
    }

    sensors
}

#[cfg(not(target_os = "linux"))]
pub fn temperature_sensors() -> Vec<(String, f64)> {
    Vec::new()
}

/// Print sensor keys and their current readings
pub fn print_temperature_sensors() {
    let sensors = temperature_sensors();
    if sensors.is_empty() {
        println!("No temperature sensors found.");
        return;
    }

    let width = sensors.iter().map(|(key, _)| key.len()).max().unwrap_or(0) + 10;
    println!("{:width$} CURRENT TEMPERATURE", "DEVICE KEY", width = width);
    for (key, temp) in sensors {
        println!("{:width$} {:.1} C", key, temp, width = width);
    }
}
