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
use chrono::NaiveDate;

// ----- Functions -----

/// Synthetic panel stream with a recognizable byte pattern
fn test_stream() -> Vec<u8> {
    (0..codec::IMAGE_BYTES).map(|i| (i % 251) as u8).collect()
}

// ----- Tests -----

/// Image upload carves into exactly 1002 reports with the captured headers
#[test]
fn image_carve_layout() {
    let stream = test_stream();
    let command = image_from_stream(&stream).unwrap();

    assert_eq!(command.len(), 1002);
    assert!(command.is_prepared());

    // Starter is the literal init sequence, zero padded
    let starter = command.report(0).unwrap();
    assert_eq!(&starter.bytes()[..12], &IMAGE_STARTER);
    assert!(starter.bytes()[12..].iter().all(|&b| b == 0));

    // First data report: sequence 0, continue flag
    let first = command.report(1).unwrap();
    assert_eq!(&first.bytes()[..7], &[0x25, 0x00, 0x01, 0x00, 0x00, 0x00, 0x38]);
    assert_eq!(first.checksum_byte(), Some(0xA1));

    // Footer: sequence 1000 little-endian (E8 03), commit flag
    let footer = command.report(1001).unwrap();
    assert_eq!(&footer.bytes()[..7], &[0x25, 0x00, 0x01, 0x00, 0xE8, 0x03, 0x34]);
}

/// Data/footer payloads concatenate back to the original stream
#[test]
fn image_payloads_concatenate_to_stream() {
    let stream = test_stream();
    let command = image_from_stream(&stream).unwrap();

    let mut payload = Vec::new();
    for report in command.reports().skip(1) {
        payload.extend_from_slice(&report.bytes()[DATA_HEADER_LEN..]);
    }

    assert!(payload.len() >= codec::IMAGE_BYTES);
    assert_eq!(&payload[..codec::IMAGE_BYTES], &stream[..]);
    // Trailing delivery padding is all zero
    assert!(payload[codec::IMAGE_BYTES..].iter().all(|&b| b == 0));
}

#[test]
fn image_stream_length_validated() {
    let err = image_from_stream(&[0u8; 100]).unwrap_err();
    assert!(matches!(err, ProtocolError::State(_)));
}

/// End-to-end through an image file on disk, no device involved
#[test]
fn image_command_from_file() {
    let path = std::env::temp_dir().join(format!("epomaker-protocol-{}.png", std::process::id()));
    let source = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([x as u8, y as u8, 0x40]));
    source.save(&path).unwrap();

    let command = image(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(command.len(), 1002);
    let order: Vec<usize> = command.reports().map(crate::Report::index).collect();
    assert!(order.windows(2).all(|w| w[1] == w[0] + 1));
}

/// Single frame, single key: key value 9 lands at buffer offset 27
#[test]
fn key_rgb_single_key() {
    let mut key_map = KeyMap::new();
    key_map.set(9, (255, 0, 0)).unwrap();
    let frames = [KeyboardRgbFrame::new(key_map, 50, 0)];
    let command = key_rgb(&frames).unwrap();

    assert_eq!(command.len(), 1 + KEY_FRAME_REPORTS);

    let first = command.report(1).unwrap();
    assert_eq!(&first.bytes()[..7], &[0x19, 0x00, 0x00, 0x01, 0x32, 0x00, 0x00]);
    assert_eq!(first.checksum_byte(), Some(0xB3));
    assert_eq!(first.bytes()[DATA_HEADER_LEN + 27], 0xFF);
    assert_eq!(first.bytes()[DATA_HEADER_LEN + 28], 0x00);
    assert_eq!(first.bytes()[DATA_HEADER_LEN + 29], 0x00);

    // Remaining sub-reports carry nothing for this frame
    for sub in 2..=KEY_FRAME_REPORTS {
        let report = command.report(sub).unwrap();
        assert!(report.bytes()[DATA_HEADER_LEN..].iter().all(|&b| b == 0));
    }
}

/// Key value 18 straddles the 56-byte slice boundary: two bytes in
/// sub-report 0, one in sub-report 1
#[test]
fn key_rgb_straddles_sub_report_boundary() {
    let mut key_map = KeyMap::new();
    key_map.set(18, (10, 20, 30)).unwrap();
    let frames = [KeyboardRgbFrame::new(key_map, 50, 0)];
    let command = key_rgb(&frames).unwrap();

    let first = command.report(1).unwrap();
    assert_eq!(first.bytes()[DATA_HEADER_LEN + 54], 10);
    assert_eq!(first.bytes()[DATA_HEADER_LEN + 55], 20);

    let second = command.report(2).unwrap();
    assert_eq!(second.bytes()[DATA_HEADER_LEN], 30);
    assert_eq!(second.bytes()[..2], [0x19, 0x01]);
}

/// Frame and sub-report counters appear in every data header
#[test]
fn key_rgb_multi_frame_headers() {
    let frames = [
        KeyboardRgbFrame::new(KeyMap::new(), 100, 0),
        KeyboardRgbFrame::new(KeyMap::new(), 200, 1),
    ];
    let command = key_rgb(&frames).unwrap();

    assert_eq!(command.len(), 1 + 2 * KEY_FRAME_REPORTS);
    for (slot, report) in command.reports().skip(1).enumerate() {
        let frame_index = (slot / KEY_FRAME_REPORTS) as u8;
        let sub_index = (slot % KEY_FRAME_REPORTS) as u8;
        let time_ms = if frame_index == 0 { 100 } else { 200 };
        assert_eq!(
            &report.bytes()[..5],
            &[0x19, sub_index, frame_index, 0x02, time_ms]
        );
    }
}

#[test]
fn key_rgb_rejects_index_outside_frame_buffer() {
    let mut key_map = KeyMap::new();
    let err = key_map.set(MAX_KEY_INDEX + 1, (1, 2, 3)).unwrap_err();
    assert!(matches!(err, ProtocolError::Range { .. }));
}

#[test]
fn key_rgb_requires_frames() {
    assert!(key_rgb(&[]).is_err());
}

/// Date and time serialize as two-byte year then single bytes, all
/// big-endian, starting at byte 8
#[test]
fn time_layout() {
    let t = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(12, 45, 48)
        .unwrap();
    let command = time(&t).unwrap();
    let report = command.report(0).unwrap();

    assert_eq!(&report.bytes()[..8], &[0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xD7]);
    assert_eq!(&report.bytes()[8..15], &[0x07, 0xE8, 0x01, 0x0F, 0x0C, 0x2D, 0x30]);
    assert!(report.bytes()[15..].iter().all(|&b| b == 0));
}

/// Out-of-range telemetry never produces a command
#[test]
fn temperature_range_enforced() {
    assert!(matches!(
        temperature(100).unwrap_err(),
        ProtocolError::Range { value: 100, .. }
    ));

    let command = temperature(99).unwrap();
    let bytes = command.report(0).unwrap().bytes();
    assert_eq!(&bytes[..9], &[0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xD5, 0x63]);
}

#[test]
fn cpu_range_enforced() {
    assert!(cpu(100).is_err());

    let command = cpu(42).unwrap();
    let bytes = command.report(0).unwrap().bytes();
    assert_eq!(
        &bytes[..17],
        &[0x22, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xDD, 0x63, 0x00, 0x7F, 0x00, 0x04, 0x00, 0x08, 0x00, 42]
    );
}

/// Option and dazzle OR into one flags byte; checksum covers all eight
/// header bytes (captured cycle-light-modes report)
#[test]
fn profile_layout() {
    let selection = Profile {
        mode: Mode::AlwaysOn,
        speed: Speed::DEFAULT,
        brightness: Brightness::DEFAULT,
        dazzle: Dazzle::Off,
        option: LightOption::OFF,
        rgb: (180, 180, 180),
    };
    let command = profile(&selection).unwrap();
    let report = command.report(0).unwrap();

    assert_eq!(&report.bytes()[..8], &[0x07, 0x01, 0x04, 0x04, 0x07, 0xB4, 0xB4, 0xB4]);
    assert_eq!(report.checksum_byte(), Some(0xCC));
}

#[test]
fn profile_option_flags_or_with_dazzle() {
    let selection = Profile {
        mode: Mode::Drift,
        speed: Speed::MIN,
        brightness: Brightness::MAX,
        dazzle: Dazzle::On,
        option: LightOption::DRIFT_UP,
        rgb: (0, 0, 0),
    };
    let command = profile(&selection).unwrap();
    assert_eq!(command.report(0).unwrap().bytes()[4], 0x30 | 0x08);
}

#[test]
fn speed_and_brightness_validated() {
    assert!(Speed::new(6).is_err());
    assert!(Brightness::new(5).is_err());
    assert_eq!(Speed::new(5).unwrap(), Speed::MAX);
}

/// Remap carries its complement inline rather than a trailing checksum
#[test]
fn remap_inline_complement() {
    let command = remap_key(9, 0x04).unwrap();
    let bytes = command.report(0).unwrap().bytes();
    assert_eq!(
        &bytes[..11],
        &[0x13, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00, 0xE3, 0x00, 0x00, 0x04]
    );
}

#[test]
fn clear_screen_layout() {
    let command = clear_screen().unwrap();
    let bytes = command.report(0).unwrap().bytes();
    assert_eq!(&bytes[..8], &[0xAC, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x53]);
}

#[test]
fn poll_is_single_padded_byte() {
    let command = poll().unwrap();
    let bytes = command.report(0).unwrap().bytes();
    assert_eq!(bytes[0], 0xF7);
    assert!(bytes[1..].iter().all(|&b| b == 0));
}

/// Dongle negotiation mirrors the captured chunk table exactly
#[test]
fn wireless_init_chunk_table() {
    let command = wireless_init().unwrap();
    assert_eq!(command.len(), 1 + WIRELESS_INIT_CHUNKS.len());

    let starter = command.report(0).unwrap();
    assert_eq!(&starter.bytes()[..2], &[0xFE, 0x40]);

    for (i, chunk) in WIRELESS_INIT_CHUNKS.iter().enumerate() {
        let report = command.report(i + 1).unwrap();
        assert_eq!(&report.bytes()[..chunk.len()], *chunk);
    }
}
