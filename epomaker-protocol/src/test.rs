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

#![cfg(test)]

// ----- Modules -----

use super::*;
use crate::codec;
use flexi_logger::Logger;

// ----- Functions -----

/// Lite logging setup
fn setup_logging_lite() {
    Logger::with_env_or_str("")
        .format(flexi_logger::colored_default_format)
        .start()
        .ok();
}

/// Asserts two colours are within the RGB565 round-trip tolerance
fn assert_colour_close(original: (u8, u8, u8), decoded: (u8, u8, u8)) {
    let pairs = [
        (original.0, decoded.0),
        (original.1, decoded.1),
        (original.2, decoded.2),
    ];
    for (o, d) in pairs {
        let delta = i16::from(o) - i16::from(d);
        assert!(
            delta.abs() <= 8,
            "channel drifted past the lossy bound: {:?} -> {:?}",
            original,
            decoded
        );
    }
}

// ----- Tests -----

/// Every report is exactly 64 bytes regardless of header/payload shape
#[test]
fn report_width_is_fixed() {
    setup_logging_lite();

    let plain = Report::new(&[0xF7], 0, None).unwrap();
    assert_eq!(plain.bytes().len(), REPORT_LEN);

    let mut with_data = Report::open(&[0x25, 0x00, 0x01, 0x00, 0x00, 0x00, 0x38], 1, Some(7)).unwrap();
    with_data.append_payload(&[0xAB; 56]).unwrap();
    assert_eq!(with_data.bytes().len(), REPORT_LEN);
    assert!(with_data.is_padded());
}

/// The checksum byte complements the header sum to 0xFF
#[test]
fn checksum_complements_header() {
    setup_logging_lite();

    // Captured cycle-light-modes profile header
    let header = [0x07, 0x01, 0x04, 0x04, 0x07, 0xB4, 0xB4, 0xB4];
    let report = Report::new(&header, 0, Some(8)).unwrap();

    let check = report.checksum_byte().unwrap();
    assert_eq!(check, 0xCC);

    let sum: u32 = report.bytes()[..8].iter().map(|&b| u32::from(b)).sum();
    assert_eq!((sum + u32::from(check)) & 0xFF, 0xFF);
}

#[test]
fn checksum_index_must_follow_header() {
    let err = Report::new(&[0x07, 0x01], 0, Some(7)).unwrap_err();
    assert!(matches!(err, ProtocolError::State(_)));
}

#[test]
fn overlong_header_rejected() {
    let header = [0u8; REPORT_LEN + 1];
    let err = Report::new(&header, 0, None).unwrap_err();
    assert!(matches!(err, ProtocolError::Overflow { .. }));
}

#[test]
fn overlong_payload_rejected() {
    let mut report = Report::open(&[0x19; 8], 0, None).unwrap();
    let err = report.append_payload(&[0u8; 57]).unwrap_err();
    assert!(matches!(err, ProtocolError::Overflow { .. }));
}

#[test]
fn payload_after_padding_rejected() {
    let mut report = Report::new(&[0xF7], 0, None).unwrap();
    let err = report.append_payload(&[0x01]).unwrap_err();
    assert_eq!(err, ProtocolError::State("payload appended after padding"));
}

/// Duplicate slots are a programming bug and must be rejected
#[test]
fn duplicate_slot_rejected() {
    let structure = CommandStructure {
        starters: 1,
        data: 2,
        footers: 0,
    };
    let mut command = Command::new(Report::new(&[0x18], 0, None).unwrap(), structure).unwrap();
    command.insert(Report::new(&[0x19], 1, None).unwrap()).unwrap();
    let err = command.insert(Report::new(&[0x19], 1, None).unwrap()).unwrap_err();
    assert_eq!(err, ProtocolError::State("report index already filled"));
}

#[test]
fn slot_outside_structure_rejected() {
    let mut command = Command::single(Report::new(&[0xF7], 0, None).unwrap()).unwrap();
    let err = command.insert(Report::new(&[0x00], 1, None).unwrap()).unwrap_err();
    assert!(matches!(err, ProtocolError::State(_)));
}

/// Unfilled slots block serialization; filling them unblocks it
#[test]
fn unprepared_command_refuses_serialization() {
    let structure = CommandStructure {
        starters: 1,
        data: 1,
        footers: 0,
    };
    let mut command = Command::new(Report::new(&[0x18], 0, None).unwrap(), structure).unwrap();
    assert!(!command.is_prepared());
    assert!(command.report_bytes().is_err());

    command.insert(Report::new(&[0x19], 1, None).unwrap()).unwrap();
    assert!(command.is_prepared());
    assert_eq!(command.report_bytes().unwrap().count(), 2);
}

/// Iteration yields ascending slot order no matter the insertion order
#[test]
fn reports_iterate_in_slot_order() {
    let structure = CommandStructure {
        starters: 1,
        data: 3,
        footers: 0,
    };
    let mut command = Command::new(Report::new(&[0x18], 0, None).unwrap(), structure).unwrap();
    for index in [3, 1, 2] {
        command.insert(Report::new(&[0x19, index as u8], index, None).unwrap()).unwrap();
    }

    let order: Vec<usize> = command.reports().map(Report::index).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

/// RGB565 round trip stays within 8 LSB per channel
#[test]
fn rgb565_round_trip_bound() {
    setup_logging_lite();

    for r in (0u16..=255).step_by(5) {
        for g in (0u16..=255).step_by(5) {
            for b in (0u16..=255).step_by(5) {
                let rgb = (r as u8, g as u8, b as u8);
                let packed = codec::pack_rgb565(rgb.0, rgb.1, rgb.2);
                assert_colour_close(rgb, codec::unpack_rgb565(packed));
            }
        }
    }

    // Full-scale corners must survive the bit replication exactly
    assert_eq!(codec::unpack_rgb565(codec::pack_rgb565(255, 255, 255)), (255, 255, 255));
    assert_eq!(codec::unpack_rgb565(codec::pack_rgb565(0, 0, 0)), (0, 0, 0));
}

#[test]
fn rgb565_known_values() {
    let packed = codec::pack_rgb565(100, 5, 69);
    assert_eq!(packed, 0x6028);
    assert_eq!(codec::unpack_rgb565(packed), (99, 4, 66));
}

#[test]
fn u16_split_is_big_endian() {
    assert_eq!(codec::split_u16_be(&[0x1234, 0xABCD]), vec![0x12, 0x34, 0xAB, 0xCD]);
}

/// Any input image produces the fixed-size panel stream
#[test]
fn packed_image_has_panel_size() {
    setup_logging_lite();

    let source = image::RgbImage::from_fn(320, 240, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let stream = codec::pack_image(&image::DynamicImage::ImageRgb8(source)).unwrap();
    assert_eq!(stream.len(), codec::IMAGE_BYTES);
}

#[test]
fn unsupported_extension_rejected() {
    let err = codec::prepare_image(std::path::Path::new("capture.txt")).unwrap_err();
    assert!(matches!(err, ProtocolError::UnsupportedFormat(_)));
}

#[test]
fn unreadable_image_rejected() {
    let err = codec::prepare_image(std::path::Path::new("/nonexistent/missing.png")).unwrap_err();
    assert!(matches!(err, ProtocolError::Decode(_)));
}
