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

//! On-disk configuration.
//!
//! The main config is a single JSON object under `~/.epomaker-controller/`.
//! A missing file is created with defaults; keys missing from an existing
//! file are filled in from the defaults and the file is rewritten so the user
//! always sees the full set. Unknown keys are an error rather than silently
//! carried along.

// ----- Crates -----

use crate::Error;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// ----- Constants -----

pub const CONFIG_DIR_NAME: &str = ".epomaker-controller";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Keymap shipped inside the crate, used when the configured path names it
/// but no such file exists on disk
pub const DEFAULT_KEYMAP_FILE: &str = "EpomakerRT100.json";
pub const DEFAULT_LAYOUT_FILE: &str = "EpomakerRT100-UK-ISO.json";

/// Layout shipped inside the crate, same fallback rule as the keymap
const DEFAULT_LAYOUT_JSON: &str = include_str!("configs/layouts/EpomakerRT100-UK-ISO.json");

// ----- Structs -----

/// The main configuration record, immutable after load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MainConfig {
    #[serde(rename = "VENDOR_ID", default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(rename = "PRODUCT_IDS_WIRED", default = "default_wired_ids")]
    pub product_ids_wired: Vec<u16>,
    #[serde(rename = "PRODUCT_IDS_24G", default = "default_24g_ids")]
    pub product_ids_24g: Vec<u16>,
    #[serde(rename = "USE_WIRELESS", default)]
    pub use_wireless: bool,
    #[serde(
        rename = "DEVICE_DESCRIPTION_REGEX",
        default = "default_description_regex"
    )]
    pub device_description_regex: String,
    #[serde(rename = "CONF_LAYOUT_PATH", default = "default_layout_path")]
    pub conf_layout_path: String,
    #[serde(rename = "CONF_KEYMAP_PATH", default = "default_keymap_path")]
    pub conf_keymap_path: String,
}

fn default_vendor_id() -> u16 {
    0x3151
}

fn default_wired_ids() -> Vec<u16> {
    vec![0x4010, 0x4015]
}

fn default_24g_ids() -> Vec<u16> {
    vec![0x4011, 0x4016]
}

fn default_description_regex() -> String {
    "ROYUAN .* System Control".to_string()
}

fn default_layout_path() -> String {
    DEFAULT_LAYOUT_FILE.to_string()
}

fn default_keymap_path() -> String {
    DEFAULT_KEYMAP_FILE.to_string()
}

impl Default for MainConfig {
    fn default() -> MainConfig {
        MainConfig {
            vendor_id: default_vendor_id(),
            product_ids_wired: default_wired_ids(),
            product_ids_24g: default_24g_ids(),
            use_wireless: false,
            device_description_regex: default_description_regex(),
            conf_layout_path: default_layout_path(),
            conf_keymap_path: default_keymap_path(),
        }
    }
}

/// Per-key geometry override inside a layout row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyGeometry {
    #[serde(default)]
    pub w: Option<f32>,
    #[serde(default)]
    pub h: Option<f32>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

/// One entry of a layout row: a key name, or a geometry override applying to
/// the following key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LayoutEntry {
    Key(String),
    Geometry(KeyGeometry),
}

/// Physical layout, rows of keys; display concern only, never touches the
/// wire bytes
pub type Layout = Vec<Vec<LayoutEntry>>;

// ----- Functions -----

/// Directory holding the main config file
pub fn config_dir() -> PathBuf {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(CONFIG_DIR_NAME)
}

/// Path of the main config file
pub fn config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Create the config directory and a default config file if absent
pub fn setup_config_file(path: &Path) -> Result<(), Error> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            info!("Creating config directory at {:?}", dir);
            fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("cannot create {:?}: {}", dir, e)))?;
        }
    }
    if !path.exists() {
        info!("Creating default config file at {:?}", path);
        write_config(path, &MainConfig::default())?;
    }
    Ok(())
}

/// Parse a config file, merging missing keys from the defaults and rewriting
/// the file with the merged result
pub fn read_config_file(path: &Path) -> Result<MainConfig, Error> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {:?}: {}", path, e)))?;
    let config: MainConfig = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("malformed config {:?}: {}", path, e)))?;

    // Serde filled any missing keys from the defaults; write the full record
    // back so the file on disk always carries every key.
    write_config(path, &config)?;
    Ok(config)
}

fn write_config(path: &Path, config: &MainConfig) -> Result<(), Error> {
    let pretty = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
    fs::write(path, pretty).map_err(|e| Error::Config(format!("cannot write {:?}: {}", path, e)))
}

/// Load (creating if necessary) the main configuration
pub fn load_main_config() -> Result<MainConfig, Error> {
    let path = config_file();
    setup_config_file(&path)?;
    read_config_file(&path)
}

/// Load a layout file
///
/// # Remarks
/// A configured path naming the default layout with no file on disk falls
/// back to the embedded copy, like the keymap does. Layouts only drive
/// display arrangement (`show-keymap --layout`); they never affect the wire
/// bytes.
pub fn load_layout(path: &Path) -> Result<Layout, Error> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read layout {:?}: {}", path, e)))?;
        return parse_layout(&raw);
    }
    if path.file_name().map(|n| n == DEFAULT_LAYOUT_FILE).unwrap_or(false) {
        debug!("Layout {:?} not on disk, using the embedded default", path);
        return parse_layout(DEFAULT_LAYOUT_JSON);
    }
    Err(Error::Config(format!("layout file {:?} does not exist", path)))
}

fn parse_layout(raw: &str) -> Result<Layout, Error> {
    serde_json::from_str(raw).map_err(|e| Error::Config(format!("malformed layout: {}", e)))
}
