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

//! Keymap: human key names to device-internal key indices.
//!
//! The RT100 addresses keys by a sparse index in 0..=101 (a few values are
//! unused gaps in the matrix). The table is loaded from JSON and immutable
//! afterwards.

// ----- Crates -----

use crate::config::DEFAULT_KEYMAP_FILE;
use crate::Error;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ----- Constants -----

/// The RT100 keymap shipped with the crate
const DEFAULT_KEYMAP_JSON: &str = include_str!("configs/keymaps/EpomakerRT100.json");

// ----- Structs -----

/// One physical key: name, internal index and display label
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyboardKey {
    pub name: String,
    pub value: u8,
    #[serde(default)]
    pub display_str: Option<String>,
}

impl KeyboardKey {
    /// Label for human-facing output; falls back to the name
    pub fn display(&self) -> &str {
        self.display_str.as_deref().unwrap_or(&self.name)
    }
}

/// The full key table with name lookup
#[derive(Debug, Clone)]
pub struct KeyboardKeys {
    all: Vec<KeyboardKey>,
    by_name: HashMap<String, usize>,
}

impl KeyboardKeys {
    /// Load a keymap file
    ///
    /// # Remarks
    /// A path that names the default keymap but does not exist on disk falls
    /// back to the copy embedded in the crate, so a fresh install works
    /// without unpacking data files.
    pub fn load(path: &Path) -> Result<KeyboardKeys, Error> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("cannot read keymap {:?}: {}", path, e)))?;
            return KeyboardKeys::from_json(&raw);
        }
        if path.file_name().map(|n| n == DEFAULT_KEYMAP_FILE).unwrap_or(false) {
            debug!("Keymap {:?} not on disk, using the embedded default", path);
            return KeyboardKeys::from_json(DEFAULT_KEYMAP_JSON);
        }
        Err(Error::Config(format!("keymap file {:?} does not exist", path)))
    }

    /// Parse a keymap from JSON, enforcing unique names
    pub fn from_json(raw: &str) -> Result<KeyboardKeys, Error> {
        let all: Vec<KeyboardKey> = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("malformed keymap: {}", e)))?;

        let mut by_name = HashMap::with_capacity(all.len());
        for (at, key) in all.iter().enumerate() {
            if by_name.insert(key.name.clone(), at).is_some() {
                return Err(Error::Config(format!("duplicate key name {:?}", key.name)));
            }
        }

        Ok(KeyboardKeys { all, by_name })
    }

    /// The embedded RT100 table
    pub fn embedded() -> Result<KeyboardKeys, Error> {
        KeyboardKeys::from_json(DEFAULT_KEYMAP_JSON)
    }

    /// Key by name, or a config error naming the unknown key
    pub fn get(&self, name: &str) -> Result<&KeyboardKey, Error> {
        self.by_name
            .get(name)
            .map(|&at| &self.all[at])
            .ok_or_else(|| Error::Config(format!("unknown key name {:?}", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyboardKey> {
        self.all.iter()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
