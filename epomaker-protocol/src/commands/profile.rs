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

//! Built-in lighting profile fields.
//!
//! Mode and dazzle values are unique on the wire and get proper enums. Speed,
//! brightness and the option flags reuse numeric values under several names
//! (e.g. drift direction and stream direction share 0x10), so those are
//! newtypes over the raw byte with named constants.

// ----- Crates -----

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ----- Enumerations -----

/// Built-in lighting animation
///
/// # Remarks
/// 0x0D and 0x14 are reserved gaps in the firmware's table.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Mode {
    AlwaysOn = 0x01,
    DynamicBreathing = 0x02,
    SpectrumCycle = 0x03,
    Drift = 0x04,
    WavesRipple = 0x05,
    StarsTwinkle = 0x06,
    SteadyStream = 0x07,
    Shadowing = 0x08,
    PeaksRising = 0x09,
    SineWave = 0x0A,
    CaispringSurging = 0x0B,
    FlowersBlooming = 0x0C,
    Laser = 0x0E,
    PeakTurn = 0x0F,
    InclinedRain = 0x10,
    Snow = 0x11,
    Meteor = 0x12,
    ThroughTheSnow = 0x13,
    LightShadow = 0x15,
}

impl Mode {
    /// Every selectable mode, in wire order
    pub const ALL: [Mode; 19] = [
        Mode::AlwaysOn,
        Mode::DynamicBreathing,
        Mode::SpectrumCycle,
        Mode::Drift,
        Mode::WavesRipple,
        Mode::StarsTwinkle,
        Mode::SteadyStream,
        Mode::Shadowing,
        Mode::PeaksRising,
        Mode::SineWave,
        Mode::CaispringSurging,
        Mode::FlowersBlooming,
        Mode::Laser,
        Mode::PeakTurn,
        Mode::InclinedRain,
        Mode::Snow,
        Mode::Meteor,
        Mode::ThroughTheSnow,
        Mode::LightShadow,
    ];
}

/// Per-key rainbow ("dazzle") toggle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Dazzle {
    Off = 0x07,
    On = 0x08,
}

// ----- Structs -----

/// Animation speed, 0..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed(u8);

impl Speed {
    pub const MIN: Speed = Speed(0x00);
    pub const MAX: Speed = Speed(0x05);
    /// A few effects cap out one step early
    pub const MAX_SPECIAL: Speed = Speed(0x04);
    pub const DEFAULT: Speed = Speed(0x04);

    pub fn new(value: u8) -> Result<Speed, ProtocolError> {
        if value > Speed::MAX.0 {
            return Err(ProtocolError::Range {
                what: "speed",
                value: value.into(),
                max: Speed::MAX.0.into(),
            });
        }
        Ok(Speed(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Backlight brightness, 0..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

impl Brightness {
    pub const MIN: Brightness = Brightness(0x00);
    pub const MAX: Brightness = Brightness(0x04);
    pub const DEFAULT: Brightness = Brightness(0x04);

    pub fn new(value: u8) -> Result<Brightness, ProtocolError> {
        if value > Brightness::MAX.0 {
            return Err(ProtocolError::Range {
                what: "brightness",
                value: value.into(),
                max: Brightness::MAX.0.into(),
            });
        }
        Ok(Brightness(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Direction flags for the modes that take one
///
/// ORed together with the dazzle byte into the profile's flags field. Which
/// constant applies depends on the selected [`Mode`]; the shared values are
/// deliberate, the firmware keys the meaning off the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightOption(u8);

impl LightOption {
    pub const OFF: LightOption = LightOption(0x00);
    pub const ON: LightOption = LightOption(0x01);
    pub const DEFAULT: LightOption = LightOption(0x00);
    pub const DRIFT_RIGHT: LightOption = LightOption(0x00);
    pub const DRIFT_LEFT: LightOption = LightOption(0x10);
    pub const DRIFT_DOWN: LightOption = LightOption(0x20);
    pub const DRIFT_UP: LightOption = LightOption(0x30);
    pub const STEADY_STREAM_ZIG_ZAG: LightOption = LightOption(0x00);
    pub const STEADY_STREAM_RETURN: LightOption = LightOption(0x10);
    pub const CAISPRING_SURGING_OUT: LightOption = LightOption(0x00);
    pub const CAISPRING_SURGING_IN: LightOption = LightOption(0x10);
    pub const FLOWERS_BLOOMING_RIGHT: LightOption = LightOption(0x00);
    pub const FLOWERS_BLOOMING_LEFT: LightOption = LightOption(0x10);
    pub const PEAK_TURN_ANTI_CLOCKWISE: LightOption = LightOption(0x00);
    pub const PEAK_TURN_CLOCKWISE: LightOption = LightOption(0x10);

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Complete lighting profile selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub mode: Mode,
    pub speed: Speed,
    pub brightness: Brightness,
    pub dazzle: Dazzle,
    pub option: LightOption,
    pub rgb: (u8, u8, u8),
}
