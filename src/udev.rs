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

//! udev rule generation for unprivileged hidraw access.

// ----- Crates -----

use crate::config::MainConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// ----- Constants -----

/// Where the generated rule file is installed
pub const RULE_FILE_PATH: &str = "/etc/udev/rules.d/99-epomaker-rt100.rules";

// ----- Functions -----

/// Render the hidraw access rules for every configured product ID
pub fn generate_rules(config: &MainConfig) -> String {
    let mut rules = String::from("# Epomaker RT100: unprivileged hidraw access\n");
    let products = config
        .product_ids_wired
        .iter()
        .chain(config.product_ids_24g.iter());
    for pid in products {
        rules += &format!(
            "SUBSYSTEM==\"hidraw\", ATTRS{{idVendor}}==\"{:04x}\", ATTRS{{idProduct}}==\"{:04x}\", MODE=\"0666\", TAG+=\"uaccess\"\n",
            config.vendor_id, pid
        );
    }
    rules
}

/// Write the rule file; needs root
///
/// The caller reminds the user to reload udev (`udevadm control --reload`)
/// and replug the keyboard.
pub fn install_rules(config: &MainConfig) -> io::Result<PathBuf> {
    let path = Path::new(RULE_FILE_PATH);
    fs::write(path, generate_rules(config))?;
    Ok(path.to_path_buf())
}
