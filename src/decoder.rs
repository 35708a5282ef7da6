//! Mode S message field decoding
//!
//! The demodulator hands this module validated raw frames; everything here
//! is plain bit-field arithmetic over those 112 bits: ICAO address, downlink
//! format, type code, callsign, velocity and the raw CPR position fields.

use std::fmt;

use crate::cpr::CprPayload;
use crate::crc;

/// Constants for message sizes
pub const MODES_LONG_MSG_BITS: usize = 112;
pub const MODES_SHORT_MSG_BITS: usize = 56;
pub const MODES_LONG_MSG_BYTES: usize = 14;

/// AIS charset for callsign decoding
const AIS_CHARSET: &[u8; 64] = b"?ABCDEFGHIJKLMNOPQRSTUVWXYZ????? ???????????????0123456789??????";

/// A demodulated 112-bit Mode S frame.
///
/// Always stored at full extended-squitter length; frames that validated
/// only as a 56-bit short squitter keep their trailing bytes as captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    bytes: [u8; MODES_LONG_MSG_BYTES],
}

impl RawMessage {
    pub fn new(bytes: [u8; MODES_LONG_MSG_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; MODES_LONG_MSG_BYTES] {
        &mut self.bytes
    }

    /// All 28 hex digits, leading zeros preserved.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(MODES_LONG_MSG_BYTES * 2);
        for b in &self.bytes {
            s.push_str(&format!("{:02X}", b));
        }
        s
    }

    /// Parse a 28-digit hex frame (used by replay tooling and tests).
    #[allow(dead_code)]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.len() != MODES_LONG_MSG_BYTES * 2 {
            return None;
        }

        let mut bytes = [0u8; MODES_LONG_MSG_BYTES];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let high = hex_digit_val(chunk[0])?;
            let low = hex_digit_val(chunk[1])?;
            bytes[i] = (high << 4) | low;
        }
        Some(Self { bytes })
    }
}

impl fmt::Display for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bytes {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

fn hex_digit_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// CPR frame parity, from the format bit of a position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

/// Message category, decoded once at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Type code 4: aircraft identification (callsign)
    Identity,
    /// Type code 19: airborne velocity
    Velocity,
    /// Type code 11: airborne position, keyed by CPR parity
    Position(Parity),
    /// Anything else: counted, no state slot
    Other,
}

/// Speed source reported by a velocity message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedSource {
    GroundSpeed,
    Airspeed,
}

impl SpeedSource {
    /// Numeric tag used in the snapshot table.
    pub fn as_u8(self) -> u8 {
        match self {
            SpeedSource::GroundSpeed => 0,
            SpeedSource::Airspeed => 1,
        }
    }
}

/// Decoded airborne velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    /// Speed in knots
    pub speed: f64,
    /// Track/heading in degrees, 0..360
    pub heading: f64,
    /// Vertical rate in feet per minute, negative descending
    pub vertical_rate: i32,
    pub source: SpeedSource,
}

/// Downlink format (first 5 bits).
pub fn downlink_format(msg: &RawMessage) -> u8 {
    msg.bytes[0] >> 3
}

/// Extended-squitter type code (first 5 bits of the ME field).
pub fn type_code(msg: &RawMessage) -> u8 {
    msg.bytes[4] >> 3
}

/// Single bit by position, bit 0 being the MSB of the first byte.
pub fn bit_at(msg: &RawMessage, index: usize) -> u8 {
    (msg.bytes[index / 8] >> (7 - (index % 8))) & 1
}

/// Frame length in bits implied by the downlink format.
pub fn message_len_by_type(df: u8) -> usize {
    match df {
        16 | 17 | 19 | 20 | 21 => MODES_LONG_MSG_BITS,
        _ => MODES_SHORT_MSG_BITS,
    }
}

/// The 24-bit ICAO address, if the frame carries one we can trust.
///
/// DF11/17/18 carry the address in bytes 1-3. DF0/4/5/16/20/21 overlay it
/// on the parity field, so it comes back as the CRC residual. Anything
/// else, or an all-zero result, is unresolvable.
pub fn icao(msg: &RawMessage) -> Option<u32> {
    let df = downlink_format(msg);
    let addr = match df {
        11 | 17 | 18 => {
            ((msg.bytes[1] as u32) << 16) | ((msg.bytes[2] as u32) << 8) | (msg.bytes[3] as u32)
        }
        0 | 4 | 5 | 16 | 20 | 21 => {
            crc::residual(msg.bytes(), message_len_by_type(df)) & 0xFF_FFFF
        }
        _ => return None,
    };

    if addr == 0 { None } else { Some(addr) }
}

/// Classify a frame into the categories the aircraft state cares about.
pub fn classify(msg: &RawMessage) -> MessageClass {
    match type_code(msg) {
        4 => MessageClass::Identity,
        19 => MessageClass::Velocity,
        11 => {
            // CPR format flag, bit 53 of the frame
            if bit_at(msg, 53) == 1 {
                MessageClass::Position(Parity::Odd)
            } else {
                MessageClass::Position(Parity::Even)
            }
        }
        _ => MessageClass::Other,
    }
}

/// Decode the 8-character callsign from an identification message.
pub fn decode_callsign(msg: &RawMessage) -> String {
    let b = &msg.bytes;
    let char_indices = [
        (b[5] >> 2) as usize,
        (((b[5] & 0x03) << 4) | (b[6] >> 4)) as usize,
        (((b[6] & 0x0F) << 2) | (b[7] >> 6)) as usize,
        (b[7] & 0x3F) as usize,
        (b[8] >> 2) as usize,
        (((b[8] & 0x03) << 4) | (b[9] >> 4)) as usize,
        (((b[9] & 0x0F) << 2) | (b[10] >> 6)) as usize,
        (b[10] & 0x3F) as usize,
    ];

    let chars: String = char_indices
        .iter()
        .map(|&idx| AIS_CHARSET[idx] as char)
        .collect();

    chars.trim().to_string()
}

/// Decode an airborne velocity message (type code 19, subtypes 1-4).
///
/// Subtypes 1/2 report ground speed as east-west / north-south components;
/// subtypes 3/4 report airspeed and magnetic heading. Subtypes 2/4 are the
/// supersonic variants with a 4x speed scale.
pub fn decode_velocity(msg: &RawMessage) -> Option<Velocity> {
    let b = &msg.bytes;
    let subtype = b[4] & 0x07;

    let scale = match subtype {
        1 | 3 => 1.0,
        2 | 4 => 4.0,
        _ => return None,
    };

    let (speed, heading, source) = if subtype <= 2 {
        let ew_dir = (b[5] & 0x04) >> 2;
        let ew_raw = (((b[5] & 0x03) as u16) << 8) | (b[6] as u16);
        let ns_dir = (b[7] & 0x80) >> 7;
        let ns_raw = (((b[7] & 0x7F) as u16) << 3) | (((b[8] & 0xE0) >> 5) as u16);

        // Raw zero means "no velocity information" in either component
        if ew_raw == 0 || ns_raw == 0 {
            return None;
        }

        let vew = (ew_raw - 1) as f64 * scale * if ew_dir != 0 { -1.0 } else { 1.0 };
        let vns = (ns_raw - 1) as f64 * scale * if ns_dir != 0 { -1.0 } else { 1.0 };

        let speed = (vew * vew + vns * vns).sqrt();
        let mut heading = vew.atan2(vns).to_degrees();
        if heading < 0.0 {
            heading += 360.0;
        }

        (speed, heading, SpeedSource::GroundSpeed)
    } else {
        let heading =
            ((((b[5] & 0x03) as u16) << 5) | ((b[6] >> 3) as u16)) as f64 * (360.0 / 128.0);
        let spd_raw = (((b[7] & 0x7F) as u16) << 3) | (((b[8] & 0xE0) >> 5) as u16);
        if spd_raw == 0 {
            return None;
        }

        ((spd_raw - 1) as f64 * scale, heading, SpeedSource::Airspeed)
    };

    let vr_sign = (b[8] & 0x08) >> 3;
    let vr_raw = (((b[8] & 0x07) as i32) << 6) | (((b[9] & 0xFC) >> 2) as i32);
    let vertical_rate = if vr_raw == 0 {
        0
    } else {
        (vr_raw - 1) * 64 * if vr_sign != 0 { -1 } else { 1 }
    };

    Some(Velocity {
        speed,
        heading,
        vertical_rate,
        source,
    })
}

/// Extract the raw 17-bit CPR latitude/longitude fields of a position message.
pub fn cpr_payload(msg: &RawMessage) -> CprPayload {
    let b = &msg.bytes;
    CprPayload {
        lat: (((b[6] & 0x03) as u32) << 15) | ((b[7] as u32) << 7) | ((b[8] >> 1) as u32),
        lon: (((b[8] & 0x01) as u32) << 16) | ((b[9] as u32) << 8) | (b[10] as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(hex: &str) -> RawMessage {
        RawMessage::from_hex(hex).unwrap()
    }

    #[test]
    fn test_hex_round_trip() {
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(m.to_hex(), "8D4840D6202CC371C32CE0576098");
        assert!(RawMessage::from_hex("8D4840D6").is_none());
        assert!(RawMessage::from_hex("8D4840D6202CC371C32CE05760ZZ").is_none());
    }

    #[test]
    fn test_downlink_format_and_type_code() {
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(downlink_format(&m), 17);
        assert_eq!(type_code(&m), 4);
    }

    #[test]
    fn test_icao_direct() {
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(icao(&m), Some(0x4840D6));
    }

    #[test]
    fn test_icao_unresolvable() {
        // DF24 carries no recoverable address
        let m = RawMessage::new([0xC0; 14]);
        assert_eq!(icao(&m), None);
    }

    #[test]
    fn test_decode_callsign() {
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(decode_callsign(&m), "KLM1023");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&msg("8D4840D6202CC371C32CE0576098")),
            MessageClass::Identity
        );
        assert_eq!(
            classify(&msg("8D485020994409940838175B284F")),
            MessageClass::Velocity
        );
        assert_eq!(
            classify(&msg("8D40621D58C382D690C8AC2863A7")),
            MessageClass::Position(Parity::Even)
        );
        assert_eq!(
            classify(&msg("8D40621D58C386435CC412692AD6")),
            MessageClass::Position(Parity::Odd)
        );
    }

    #[test]
    fn test_decode_velocity_ground_speed() {
        let v = decode_velocity(&msg("8D485020994409940838175B284F")).unwrap();
        assert!((v.speed - 159.20).abs() < 0.01);
        assert!((v.heading - 182.88).abs() < 0.01);
        assert_eq!(v.vertical_rate, -832);
        assert_eq!(v.source, SpeedSource::GroundSpeed);
        assert_eq!(v.source.as_u8(), 0);
    }

    #[test]
    fn test_cpr_payload_fields() {
        let even = cpr_payload(&msg("8D40621D58C382D690C8AC2863A7"));
        assert_eq!((even.lat, even.lon), (93000, 51372));

        let odd = cpr_payload(&msg("8D40621D58C386435CC412692AD6"));
        assert_eq!((odd.lat, odd.lon), (74158, 50194));
    }
}
