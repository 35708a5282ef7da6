//! Aircraft registry and per-aircraft message accumulation
//!
//! Each accepted message is routed to the state record owning its ICAO
//! address. A record keeps the newest payload per category (identity,
//! velocity, even/odd position) and derives position and velocity snapshots
//! on demand; position needs one frame of each CPR parity.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::debug;

use crate::cpr;
use crate::decoder::{self, MessageClass, Parity, RawMessage, Velocity};

/// Raw messages kept per aircraft for diagnostics; the display count is a
/// monotonic counter, so this ring can stay small.
const RECENT_MESSAGES: usize = 16;

/// Accumulated state for one airframe.
#[derive(Debug, Clone)]
pub struct AircraftState {
    /// ICAO 24-bit address
    pub addr: u32,
    /// Hex address string
    pub hex_addr: String,
    /// Callsign, decoded from the latest identification message
    pub callsign: Option<String>,
    /// Latest velocity payload, decoded lazily on query
    pub last_velocity: Option<RawMessage>,
    /// Latest even-parity position payload
    pub even_position: Option<RawMessage>,
    /// Latest odd-parity position payload
    pub odd_position: Option<RawMessage>,
    /// Wall-clock time of the last accepted message
    pub last_seen: DateTime<Local>,
    /// Messages accepted for this aircraft over the whole run
    pub message_count: u64,
    recent: VecDeque<RawMessage>,
}

impl AircraftState {
    pub fn new(addr: u32) -> Self {
        Self {
            addr,
            hex_addr: format!("{:06X}", addr),
            callsign: None,
            last_velocity: None,
            even_position: None,
            odd_position: None,
            last_seen: Local::now(),
            message_count: 0,
            recent: VecDeque::with_capacity(RECENT_MESSAGES),
        }
    }

    /// Fold one accepted message into the state.
    ///
    /// Exactly one payload slot changes per message class; every message
    /// bumps the counter and refreshes the timestamp.
    pub fn update(&mut self, msg: RawMessage) {
        match decoder::classify(&msg) {
            MessageClass::Identity => self.callsign = Some(decoder::decode_callsign(&msg)),
            MessageClass::Velocity => self.last_velocity = Some(msg.clone()),
            MessageClass::Position(Parity::Even) => self.even_position = Some(msg.clone()),
            MessageClass::Position(Parity::Odd) => self.odd_position = Some(msg.clone()),
            MessageClass::Other => {}
        }

        self.message_count += 1;
        self.last_seen = Local::now();

        if self.recent.len() == RECENT_MESSAGES {
            self.recent.pop_front();
        }
        self.recent.push_back(msg);
    }

    /// Decoded position, when an even/odd CPR pair is on hand.
    pub fn position(&self) -> Option<(f64, f64)> {
        let even = self.even_position.as_ref()?;
        let odd = self.odd_position.as_ref()?;

        cpr::global_position(decoder::cpr_payload(odd), decoder::cpr_payload(even))
    }

    /// Decoded velocity, when a velocity payload is on hand.
    pub fn velocity(&self) -> Option<Velocity> {
        decoder::decode_velocity(self.last_velocity.as_ref()?)
    }

    /// Recently accepted raw frames, oldest first.
    #[allow(dead_code)]
    pub fn recent_messages(&self) -> impl Iterator<Item = &RawMessage> {
        self.recent.iter()
    }

    /// Materialize the table row for this aircraft. Absent position and
    /// velocity render as zeros.
    pub fn snapshot_row(&self) -> SnapshotRow {
        let (lat, lon) = self.position().unwrap_or((0.0, 0.0));
        let (speed, heading, vertical_rate, speed_type) = match self.velocity() {
            Some(v) => (v.speed, v.heading, v.vertical_rate, v.source.as_u8()),
            None => (0.0, 0.0, 0, 0),
        };

        SnapshotRow {
            icao: self.hex_addr.clone(),
            callsign: self.callsign.clone().unwrap_or_default(),
            lat,
            lon,
            speed,
            heading,
            vertical_rate,
            speed_type,
            last_message_time: self.last_seen.format("%H:%M:%S").to_string(),
            message_count: self.message_count,
        }
    }
}

/// One row of the rendered/persisted aircraft table.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub icao: String,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub heading: f64,
    pub vertical_rate: i32,
    pub speed_type: u8,
    pub last_message_time: String,
    pub message_count: u64,
}

/// Sole owner of the address → state mapping.
#[derive(Default)]
pub struct AircraftRegistry {
    aircraft: HashMap<u32, AircraftState>,
}

impl AircraftRegistry {
    pub fn new() -> Self {
        Self {
            aircraft: HashMap::new(),
        }
    }

    /// Route one accepted message to its owning record, creating the record
    /// on first contact. Messages without a resolvable ICAO address are
    /// dropped without touching any state.
    pub fn ingest(&mut self, msg: RawMessage) {
        let Some(addr) = decoder::icao(&msg) else {
            debug!(hex = %msg, "dropping frame without resolvable ICAO address");
            return;
        };

        self.aircraft
            .entry(addr)
            .or_insert_with(|| AircraftState::new(addr))
            .update(msg);
    }

    #[allow(dead_code)]
    pub fn get(&self, addr: u32) -> Option<&AircraftState> {
        self.aircraft.get(&addr)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// Table rows for every known aircraft, ICAO ascending.
    pub fn snapshot(&self) -> Vec<SnapshotRow> {
        let mut states: Vec<&AircraftState> = self.aircraft.values().collect();
        states.sort_by_key(|a| a.addr);
        states.iter().map(|a| a.snapshot_row()).collect()
    }
}
