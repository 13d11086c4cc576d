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

#![cfg(test)]

// ----- Modules -----

use crate::config::{self, MainConfig};
use crate::controller::{CadenceGuard, Controller};
use crate::keys::KeyboardKeys;
use crate::sensors::{TelemetrySource, TestSensors};
use crate::udev;
use crate::Error;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

// ----- Tests -----

/// A missing config file is created with the full default record
#[test]
fn default_config_created_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    config::setup_config_file(&path).unwrap();
    assert!(path.exists());

    let config = config::read_config_file(&path).unwrap();
    assert_eq!(config, MainConfig::default());
    assert_eq!(config.vendor_id, 0x3151);
    assert_eq!(config.product_ids_wired, vec![0x4010, 0x4015]);
    assert_eq!(config.product_ids_24g, vec![0x4011, 0x4016]);
}

/// Keys missing from the file are merged from the defaults and the file is
/// rewritten with the complete record
#[test]
fn partial_config_merged_and_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "USE_WIRELESS": true }"#).unwrap();

    let config = config::read_config_file(&path).unwrap();
    assert!(config.use_wireless);
    assert_eq!(config.vendor_id, 0x3151);

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("VENDOR_ID"));
    assert!(rewritten.contains("DEVICE_DESCRIPTION_REGEX"));
}

#[test]
fn unknown_config_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "NOT_A_KEY": 1 }"#).unwrap();

    assert!(matches!(config::read_config_file(&path), Err(Error::Config(_))));
}

#[test]
fn malformed_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "definitely not json").unwrap();

    assert!(matches!(config::read_config_file(&path), Err(Error::Config(_))));
}

/// The embedded RT100 table: 99 keys over sparse indices 0..=101
#[test]
fn embedded_keymap_loads() {
    let table = KeyboardKeys::embedded().unwrap();
    assert_eq!(table.len(), 99);

    assert_eq!(table.get("A").unwrap().value, 9);
    assert_eq!(table.get("ESC").unwrap().value, 0);
    assert_eq!(table.get("NUMPAD_ENTER").unwrap().value, 101);
    assert_eq!(table.get("ESC").unwrap().display(), "Esc");
    assert!(table.get("NO_SUCH_KEY").is_err());

    // Matrix gaps are absent, not zero-filled
    let values: Vec<u8> = table.iter().map(|k| k.value).collect();
    for gap in [29, 35, 47] {
        assert!(!values.contains(&gap));
    }
}

#[test]
fn keymap_duplicate_names_rejected() {
    let raw = r#"[
        { "name": "ESC", "value": 0 },
        { "name": "ESC", "value": 1 }
    ]"#;
    assert!(matches!(KeyboardKeys::from_json(raw), Err(Error::Config(_))));
}

/// Dry-run image upload: 1002 reports validated and logged, no device opened
#[test]
fn dry_run_image_upload() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("picture.png");
    let source = image::RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8, y as u8, 0x80]));
    source.save(&png).unwrap();

    let mut controller = Controller::open(MainConfig::default(), true).unwrap();
    assert!(controller.transport().is_dry_run());
    controller.send_image(&png).unwrap();
    assert_eq!(controller.transport().reports_sent(), 1002);
}

/// Out-of-range telemetry is rejected before anything touches the transport
#[test]
fn range_error_never_touches_transport() {
    let mut controller = Controller::open(MainConfig::default(), true).unwrap();

    assert!(matches!(
        controller.send_temperature(100),
        Err(Error::Protocol(_))
    ));
    assert!(matches!(controller.send_cpu(200), Err(Error::Protocol(_))));
    assert_eq!(controller.transport().reports_sent(), 0);
}

/// Wireless configurations negotiate the dongle on open: poll, poll, the
/// 24-report init sequence, poll
#[test]
fn wireless_dry_run_connect_sequence() {
    let config = MainConfig {
        use_wireless: true,
        ..MainConfig::default()
    };
    let controller = Controller::open(config, true).unwrap();
    assert_eq!(controller.transport().reports_sent(), 1 + 1 + 24 + 1);
}

/// All-keys colour fill is one starter plus seven frame reports
#[test]
fn set_rgb_all_keys_report_count() {
    let mut controller = Controller::open(MainConfig::default(), true).unwrap();
    controller.set_rgb_all_keys(30, 60, 90).unwrap();
    assert_eq!(controller.transport().reports_sent(), 8);
}

/// The cadence guard pads short cycles up to the minimum duration
#[test]
fn cadence_guard_enforces_minimum() {
    let started = Instant::now();
    let guard = CadenceGuard::start(Duration::from_millis(50));
    guard.wait();
    assert!(started.elapsed() >= Duration::from_millis(50));
}

/// Generated udev rules cover every configured product ID
#[test]
fn udev_rules_cover_all_products() {
    let rules = udev::generate_rules(&MainConfig::default());
    assert!(rules.contains("\"3151\""));
    for pid in ["4010", "4015", "4011", "4016"] {
        assert!(rules.contains(&format!("\"{}\"", pid)), "missing {}", pid);
    }
    assert!(rules.contains("hidraw"));
}

/// Test-mode telemetry stays inside the device's accepted range
#[test]
fn test_sensors_stay_in_range() {
    let source = TestSensors;
    for _ in 0..50 {
        let cpu = source.cpu_usage().unwrap();
        assert!(cpu <= 99);
        let temp = source.device_temperature("any").unwrap();
        assert!((0..=99).contains(&temp));
    }
}

/// Layout entries parse as key names or geometry overrides
#[test]
fn layout_entries_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.json");
    fs::write(
        &path,
        r#"[
            ["ESC", { "w": 1.5 }, "TAB"],
            [{ "x": 0.5, "y": 1.0 }, "A"]
        ]"#,
    )
    .unwrap();

    let layout = config::load_layout(&path).unwrap();
    assert_eq!(layout.len(), 2);
    assert_eq!(layout[0].len(), 3);
    match &layout[0][1] {
        config::LayoutEntry::Geometry(geometry) => assert_eq!(geometry.w, Some(1.5)),
        other => panic!("expected geometry entry, got {:?}", other),
    }
}

/// The embedded layout covers the embedded keymap exactly, one entry per key
#[test]
fn embedded_layout_matches_keymap() {
    let table = KeyboardKeys::embedded().unwrap();
    // The default path is not on disk in a fresh checkout; this exercises the
    // embedded fallback as well
    let layout = config::load_layout(Path::new(&MainConfig::default().conf_layout_path)).unwrap();

    let mut names = Vec::new();
    for row in &layout {
        for entry in row {
            if let config::LayoutEntry::Key(name) = entry {
                assert!(table.get(name).is_ok(), "layout names unknown key {:?}", name);
                names.push(name.clone());
            }
        }
    }
    names.sort();
    names.dedup();
    assert_eq!(names.len(), table.len());
}
