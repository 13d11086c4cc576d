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

//! Command encoder for the Epomaker RT100 keyboard.
//!
//! Every operation the keyboard understands is expressed as a [`Command`]: an
//! ordered sequence of fixed-width 64-byte HID feature reports. This crate
//! builds those byte streams; it performs no device I/O. The transport layer
//! in `epomaker-rt100` takes a prepared command and writes each report out in
//! order.

// ----- Modules -----

pub mod codec;
pub mod commands;

#[cfg(test)]
mod test;

// ----- Crates -----

use core::fmt;

// ----- Constants -----

/// Every feature report the keyboard accepts is exactly this long.
pub const REPORT_LEN: usize = 64;

// ----- Enumerations -----

/// Encoder errors
///
/// # Remarks
/// Raised synchronously while building a command; nothing is ever sent for a
/// command that failed to encode.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    /// Header plus payload would exceed [`REPORT_LEN`]
    Overflow { len: usize },
    /// Report or command used out of order (duplicate slot, payload after
    /// padding, transmission before prepared)
    State(&'static str),
    /// Scalar argument outside its documented range
    Range {
        what: &'static str,
        value: u32,
        max: u32,
    },
    /// Image could not be read or has zero dimensions
    Decode(String),
    /// Image file extension is not one of the supported raster formats
    UnsupportedFormat(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Overflow { len } => {
                write!(f, "report length {} exceeds the maximum of {}", len, REPORT_LEN)
            }
            ProtocolError::State(msg) => write!(f, "invalid state: {}", msg),
            ProtocolError::Range { what, value, max } => {
                write!(f, "{} out of range: {} (maximum {})", what, value, max)
            }
            ProtocolError::Decode(msg) => write!(f, "image decode failed: {}", msg),
            ProtocolError::UnsupportedFormat(ext) => {
                write!(f, "unsupported image format: {:?}", ext)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

// ----- Functions -----

/// 8-bit one's-complement checksum over a header region
///
/// # Remarks
/// `(0xFF - (sum(header) & 0xFF)) & 0xFF`. Covers the header bytes only,
/// never the payload. The device rejects reports whose checksum byte does not
/// complement the header sum to 0xFF.
pub fn checksum(header: &[u8]) -> u8 {
    let sum: u32 = header.iter().map(|&b| u32::from(b)).sum();
    (0xFF - (sum & 0xFF)) as u8
}

// ----- Structs -----

/// One fixed-width 64-byte HID feature report
///
/// # Remarks
/// Layout order: header bytes, optional 1-byte checksum, optional payload,
/// zero padding out to [`REPORT_LEN`]. A report built without a payload slot
/// is padded immediately; a report expecting a payload stays open until
/// [`Report::append_payload`] runs, after which it pads and freezes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    buf: [u8; REPORT_LEN],
    len: usize,
    header_len: usize,
    checksum_index: Option<usize>,
    index: usize,
    padded: bool,
}

impl Report {
    /// Construct a payload-less report; pads to 64 bytes straight away
    ///
    /// # Arguments
    /// * `header` - literal header bytes
    /// * `index` - slot in the owning command
    /// * `checksum_index` - where the checksum byte goes, if any; must equal
    ///   the header length
    pub fn new(
        header: &[u8],
        index: usize,
        checksum_index: Option<usize>,
    ) -> Result<Report, ProtocolError> {
        let mut report = Report::open(header, index, checksum_index)?;
        report.pad();
        Ok(report)
    }

    /// Construct a report that still expects payload bytes
    ///
    /// Stays unpadded until [`Report::append_payload`] is called.
    pub fn open(
        header: &[u8],
        index: usize,
        checksum_index: Option<usize>,
    ) -> Result<Report, ProtocolError> {
        if let Some(at) = checksum_index {
            // The checksum always lands directly after the header region it
            // covers; any other position is a builder bug.
            if at != header.len() {
                return Err(ProtocolError::State("checksum index must equal header length"));
            }
        }
        let total = header.len() + usize::from(checksum_index.is_some());
        if total > REPORT_LEN {
            return Err(ProtocolError::Overflow { len: total });
        }

        let mut buf = [0u8; REPORT_LEN];
        buf[..header.len()].copy_from_slice(header);
        let mut len = header.len();
        if checksum_index.is_some() {
            buf[len] = checksum(header);
            len += 1;
        }

        Ok(Report {
            buf,
            len,
            header_len: header.len(),
            checksum_index,
            index,
            padded: false,
        })
    }

    /// Append payload bytes, then pad to the full report width
    ///
    /// # Remarks
    /// Legal exactly once, and only on a report built with [`Report::open`].
    pub fn append_payload(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if self.padded {
            return Err(ProtocolError::State("payload appended after padding"));
        }
        let total = self.len + data.len();
        if total > REPORT_LEN {
            return Err(ProtocolError::Overflow { len: total });
        }
        self.buf[self.len..total].copy_from_slice(data);
        self.len = total;
        self.pad();
        Ok(())
    }

    fn pad(&mut self) {
        // Buffer is zero-initialized; padding is just freezing the length.
        self.len = REPORT_LEN;
        self.padded = true;
    }

    /// Full 64-byte wire image
    pub fn bytes(&self) -> &[u8; REPORT_LEN] {
        &self.buf
    }

    /// Header bytes only (excludes the checksum byte and payload)
    pub fn header(&self) -> &[u8] {
        &self.buf[..self.header_len]
    }

    /// Checksum byte, if this report carries one
    pub fn checksum_byte(&self) -> Option<u8> {
        self.checksum_index.map(|at| self.buf[at])
    }

    /// Slot in the owning command
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the report is frozen at the full wire width
    pub fn is_padded(&self) -> bool {
        self.padded
    }
}

/// Shape of a command: starter / data / footer report counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStructure {
    pub starters: usize,
    pub data: usize,
    pub footers: usize,
}

impl CommandStructure {
    /// The common single-report shape
    pub const SINGLE: CommandStructure = CommandStructure {
        starters: 1,
        data: 0,
        footers: 0,
    };

    pub fn total(&self) -> usize {
        self.starters + self.data + self.footers
    }
}

/// An ordered sequence of reports forming one keyboard operation
///
/// # Remarks
/// Reports occupy contiguous slots `0..total`. A command is prepared once
/// every slot is filled and every report is padded; only prepared commands
/// may be serialized for transmission.
#[derive(Debug, Clone)]
pub struct Command {
    structure: CommandStructure,
    reports: Vec<Report>,
}

impl Command {
    /// Start a command from its initial (starter) report
    pub fn new(initial: Report, structure: CommandStructure) -> Result<Command, ProtocolError> {
        let mut command = Command {
            structure,
            reports: Vec::with_capacity(structure.total()),
        };
        command.insert(initial)?;
        Ok(command)
    }

    /// Single-report command, prepared on construction
    pub fn single(report: Report) -> Result<Command, ProtocolError> {
        Command::new(report, CommandStructure::SINGLE)
    }

    /// Insert a report into its declared slot
    ///
    /// # Remarks
    /// Duplicate slots are rejected; two builders racing for one slot is a
    /// programming bug, not a condition to paper over.
    pub fn insert(&mut self, report: Report) -> Result<(), ProtocolError> {
        if report.index() >= self.structure.total() {
            return Err(ProtocolError::State("report index exceeds command structure"));
        }
        match self
            .reports
            .binary_search_by_key(&report.index(), |r| r.index())
        {
            Ok(_) => Err(ProtocolError::State("report index already filled")),
            Err(pos) => {
                self.reports.insert(pos, report);
                Ok(())
            }
        }
    }

    pub fn structure(&self) -> CommandStructure {
        self.structure
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Every declared slot filled and frozen at the wire width
    pub fn is_prepared(&self) -> bool {
        self.reports.len() == self.structure.total() && self.reports.iter().all(Report::is_padded)
    }

    /// Reports in ascending slot order
    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    /// Report by slot
    pub fn report(&self, index: usize) -> Option<&Report> {
        self.reports
            .binary_search_by_key(&index, |r| r.index())
            .ok()
            .map(|pos| &self.reports[pos])
    }

    /// 64-byte wire images in transmission order
    ///
    /// # Remarks
    /// Only callable once prepared; the device has no recovery protocol for a
    /// half-delivered command, so an unprepared command must never reach the
    /// transport.
    pub fn report_bytes(
        &self,
    ) -> Result<impl Iterator<Item = &[u8; REPORT_LEN]>, ProtocolError> {
        if !self.is_prepared() {
            return Err(ProtocolError::State("command transmitted before prepared"));
        }
        Ok(self.reports.iter().map(Report::bytes))
    }
}
