/* Copyright (C) 2024 by Sam Rodgers
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
 * THE SOFTWARE.
 */

//! The keyboard's command set.
//!
//! One constructor per operation, each returning a prepared [`Command`].
//! Layouts were captured from the vendor software's USB traffic; the byte
//! templates here must stay bit-exact or the device renders garbage, or
//! worse, stops accepting reports until replugged.

// ----- Modules -----

pub mod profile;

#[cfg(test)]
mod test;

// ----- Crates -----

use crate::codec;
use crate::{Command, CommandStructure, ProtocolError, Report, REPORT_LEN};
use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

pub use profile::{Brightness, Dazzle, LightOption, Mode, Profile, Speed};

// ----- Constants -----

/// Header length of the image and per-key RGB data reports
pub const DATA_HEADER_LEN: usize = 8;
/// Payload bytes carried by each data report
pub const DATA_PAYLOAD_LEN: usize = REPORT_LEN - DATA_HEADER_LEN;

/// Data reports per per-key RGB frame
pub const KEY_FRAME_REPORTS: usize = 7;
/// Colour buffer owned by one frame: 7 reports x 56 bytes
pub const KEY_FRAME_BYTES: usize = KEY_FRAME_REPORTS * DATA_PAYLOAD_LEN;
/// Highest key index addressable inside the frame buffer
pub const MAX_KEY_INDEX: u8 = (KEY_FRAME_BYTES / 3 - 1) as u8;

/// Upper bound for the CPU and temperature telemetry bytes
pub const TELEMETRY_MAX: u8 = 99;

/// Number of data reports in an image upload
const IMAGE_DATA_REPORTS: usize = 1000;

const IMAGE_STARTER: [u8; 12] = [
    0xA5, 0x00, 0x01, 0x00, 0xF4, 0xDA, 0x00, 0x8B, 0x00, 0x00, 0xA2, 0xAD,
];
// Terminator flag of the image data header: 0x38 keeps the device buffering,
// 0x34 commits the frame to the panel.
const IMAGE_CONTINUE: u8 = 0x38;
const IMAGE_COMMIT: u8 = 0x34;

const KEY_RGB_STARTER: [u8; 8] = [0x18, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE7];

/// Dongle negotiation sequence: eight-byte writes alternating with one-byte
/// `FC` status reads, verbatim from capture.
pub const WIRELESS_INIT_CHUNKS: &[&[u8]] = &[
    &[0xF6, 0x0A],
    &[0x8F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x70],
    &[0xFC],
    &[0x87, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x78],
    &[0xFC],
    &[0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7F],
    &[0xFC],
    &[0xAD, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x52],
    &[0xFC],
    &[0x84, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7B],
    &[0xFC],
    &[0x85, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7A],
    &[0xFC],
    &[0x87, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x78],
    &[0xFC],
    &[0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79],
    &[0xFC],
    &[0x91, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x6E],
    &[0xFC],
    &[0x92, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x6D],
    &[0xFC],
    &[0x97, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x68],
    &[0xFC],
];

// ----- Structs -----

/// Colour assignment for a set of keys, by internal key index
///
/// Keys not present stay black (0, 0, 0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    colours: BTreeMap<u8, (u8, u8, u8)>,
}

impl KeyMap {
    pub fn new() -> KeyMap {
        KeyMap::default()
    }

    /// Assign a colour to a key
    ///
    /// # Arguments
    /// * `key_index` - device-internal key index (see the keymap config)
    /// * `rgb` - 8-bit colour triple
    pub fn set(&mut self, key_index: u8, rgb: (u8, u8, u8)) -> Result<(), ProtocolError> {
        if key_index > MAX_KEY_INDEX {
            return Err(ProtocolError::Range {
                what: "key index",
                value: key_index.into(),
                max: MAX_KEY_INDEX.into(),
            });
        }
        self.colours.insert(key_index, rgb);
        Ok(())
    }

    pub fn get(&self, key_index: u8) -> Option<(u8, u8, u8)> {
        self.colours.get(&key_index).copied()
    }

    /// Assignments in ascending key-index order
    pub fn iter(&self) -> impl Iterator<Item = (u8, (u8, u8, u8))> + '_ {
        self.colours.iter().map(|(&k, &rgb)| (k, rgb))
    }

    pub fn len(&self) -> usize {
        self.colours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colours.is_empty()
    }
}

/// One animation frame: colours plus how long the device displays it
///
/// The device interpolates between consecutive frames over `time_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardRgbFrame {
    pub key_map: KeyMap,
    pub time_ms: u8,
    pub index: u8,
}

impl KeyboardRgbFrame {
    pub fn new(key_map: KeyMap, time_ms: u8, index: u8) -> KeyboardRgbFrame {
        KeyboardRgbFrame {
            key_map,
            time_ms,
            index,
        }
    }
}

// ----- Functions -----

/// Upload an image file to the LCD
///
/// Decodes and orients the image, then carves it into the 1002-report upload
/// sequence.
pub fn image(path: &Path) -> Result<Command, ProtocolError> {
    image_from_stream(&codec::prepare_image(path)?)
}

/// Carve an already-packed RGB565 stream into an image upload command
///
/// # Arguments
/// * `stream` - exactly [`codec::IMAGE_BYTES`] bytes, big-endian RGB565
///
/// # Remarks
/// Structure (1, 1000, 1). The footer carries the final 52 image bytes plus
/// zero padding; its terminator byte commits the frame.
pub fn image_from_stream(stream: &[u8]) -> Result<Command, ProtocolError> {
    if stream.len() != codec::IMAGE_BYTES {
        return Err(ProtocolError::State("image stream must be W*H*2 bytes"));
    }

    let structure = CommandStructure {
        starters: 1,
        data: IMAGE_DATA_REPORTS,
        footers: 1,
    };
    let mut command = Command::new(Report::new(&IMAGE_STARTER, 0, None)?, structure)?;

    // NOTE: the sequence index pair is LITTLE-endian (low byte first) while
    // everything else on this wire is big-endian. Device-mandated; swapping
    // the pair scrambles the scanline order on the panel.
    for (seq, chunk) in stream.chunks(DATA_PAYLOAD_LEN).enumerate() {
        let terminator = if seq == IMAGE_DATA_REPORTS {
            IMAGE_COMMIT
        } else {
            IMAGE_CONTINUE
        };
        let header = [
            0x25,
            0x00,
            0x01,
            0x00,
            (seq & 0xFF) as u8,
            (seq >> 8) as u8,
            terminator,
        ];
        let mut report = Report::open(&header, seq + 1, Some(7))?;
        report.append_payload(chunk)?;
        command.insert(report)?;
    }

    debug!("Image carved into {} reports", command.len());
    Ok(command)
}

/// Drive per-key RGB from a sequence of animation frames
///
/// # Remarks
/// Structure (1, 7F, 0) for F frames. Each frame owns a 392-byte colour
/// buffer; key `k` occupies buffer offsets `3k..3k+3`, and the buffer is
/// sliced across seven sub-indexed reports. A key whose triple straddles a
/// 56-byte slice boundary splits between two reports.
pub fn key_rgb(frames: &[KeyboardRgbFrame]) -> Result<Command, ProtocolError> {
    if frames.is_empty() {
        return Err(ProtocolError::State("at least one frame is required"));
    }
    if frames.len() > usize::from(u8::MAX) {
        return Err(ProtocolError::Range {
            what: "frame count",
            value: frames.len() as u32,
            max: u8::MAX.into(),
        });
    }

    let structure = CommandStructure {
        starters: 1,
        data: frames.len() * KEY_FRAME_REPORTS,
        footers: 0,
    };
    let mut command = Command::new(Report::new(&KEY_RGB_STARTER, 0, None)?, structure)?;

    let total_frames = frames.len() as u8;
    let mut slot = 1;
    for frame in frames {
        let mut buffer = [0u8; KEY_FRAME_BYTES];
        for (key, (r, g, b)) in frame.key_map.iter() {
            let at = usize::from(key) * 3;
            buffer[at] = r;
            buffer[at + 1] = g;
            buffer[at + 2] = b;
        }

        for (sub, chunk) in buffer.chunks(DATA_PAYLOAD_LEN).enumerate() {
            let header = [
                0x19,
                sub as u8,
                frame.index,
                total_frames,
                frame.time_ms,
                0x00,
                0x00,
            ];
            let mut report = Report::open(&header, slot, Some(7))?;
            report.append_payload(chunk)?;
            command.insert(report)?;
            slot += 1;
        }
    }

    debug!("{} frame(s) carved into {} reports", frames.len(), command.len());
    Ok(command)
}

/// Set the LCD clock
pub fn time(t: &NaiveDateTime) -> Result<Command, ProtocolError> {
    let year = t.year() as u16;
    let header = [
        0x28,
        0x00,
        0x00,
        0x00,
        0x00,
        0x00,
        0x00,
        0xD7,
        (year >> 8) as u8,
        (year & 0xFF) as u8,
        t.month() as u8,
        t.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
    ];
    Command::single(Report::new(&header, 0, None)?)
}

/// Update the LCD temperature readout, 0..=99 degrees C
pub fn temperature(celsius: u8) -> Result<Command, ProtocolError> {
    if celsius > TELEMETRY_MAX {
        return Err(ProtocolError::Range {
            what: "temperature",
            value: celsius.into(),
            max: TELEMETRY_MAX.into(),
        });
    }
    let header = [0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xD5, celsius];
    Command::single(Report::new(&header, 0, None)?)
}

/// Update the LCD CPU gauge, 0..=99 percent
pub fn cpu(percent: u8) -> Result<Command, ProtocolError> {
    if percent > TELEMETRY_MAX {
        return Err(ProtocolError::Range {
            what: "cpu percentage",
            value: percent.into(),
            max: TELEMETRY_MAX.into(),
        });
    }
    let header = [
        0x22, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xDD, 0x63, 0x00, 0x7F, 0x00, 0x04, 0x00, 0x08,
        0x00, percent,
    ];
    Command::single(Report::new(&header, 0, None)?)
}

/// Select a built-in lighting profile
pub fn profile(profile: &Profile) -> Result<Command, ProtocolError> {
    let (r, g, b) = profile.rgb;
    let header = [
        0x07,
        profile.mode.into(),
        profile.speed.value(),
        profile.brightness.value(),
        profile.option.bits() | u8::from(profile.dazzle),
        r,
        g,
        b,
    ];
    Command::single(Report::new(&header, 0, Some(8))?)
}

/// Remap an internal key index to a USB HID usage code
///
/// # Arguments
/// * `key_index` - index used internally by the keyboard (keymap config)
/// * `key_combo` - target USB HID usage code
pub fn remap_key(key_index: u8, key_combo: u8) -> Result<Command, ProtocolError> {
    // Inline complement over command byte + key index; this layout predates
    // the trailing-checksum slot and the device checks it verbatim.
    let check = 0xFFu8.wrapping_sub(0x13u8.wrapping_add(key_index));
    let header = [
        0x13, 0x00, key_index, 0x00, 0x00, 0x00, 0x00, check, 0x00, 0x00, key_combo,
    ];
    Command::single(Report::new(&header, 0, None)?)
}

/// Reset the LCD image; telemetry readouts are unaffected
pub fn clear_screen() -> Result<Command, ProtocolError> {
    let header = [0xAC, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x53];
    Command::single(Report::new(&header, 0, None)?)
}

/// Liveness probe for the 2.4 GHz dongle
pub fn poll() -> Result<Command, ProtocolError> {
    Command::single(Report::new(&[0xF7], 0, None)?)
}

/// Dongle state negotiation for 2.4 GHz connections
pub fn wireless_init() -> Result<Command, ProtocolError> {
    let structure = CommandStructure {
        starters: 1,
        data: WIRELESS_INIT_CHUNKS.len(),
        footers: 0,
    };
    let mut command = Command::new(Report::new(&[0xFE, 0x40], 0, None)?, structure)?;
    for (i, chunk) in WIRELESS_INIT_CHUNKS.iter().enumerate() {
        command.insert(Report::new(chunk, i + 1, None)?)?;
    }
    Ok(command)
}
