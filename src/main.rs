//! flightradar-rs: a live aircraft table from a 1090 MHz receiver
//!
//! Amplitude samples in, aircraft out: preamble detection, PPM bit
//! recovery, CRC validation, and per-aircraft accumulation of identity,
//! velocity and CPR position messages, rendered as a table once per
//! acquisition cycle.

mod aircraft;
mod config;
mod cpr;
mod crc;
mod decoder;
mod demodulator;
mod detector;
mod magnitude;
mod source;

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::unbounded;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::aircraft::AircraftRegistry;
use crate::config::Config;
use crate::demodulator::Demodulator;
use crate::source::{AcquireError, SampleSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    // Log to stderr only when the table does not own the screen
    if config.raw {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
        info!("flightradar-rs starting...");
        info!("Configuration: {:?}", config);
    }

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let shutdown = Arc::new(AtomicBool::new(false));
        {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                shutdown.store(true, Ordering::SeqCst);
            });
        }

        let mut source = SampleSource::open(&config).await?;
        let mut registry = AircraftRegistry::new();
        let mut demodulator = Demodulator::new(config.fix_errors);

        run_cycles(
            &config,
            &mut source,
            &mut demodulator,
            &mut registry,
            &shutdown,
        )
        .await?;

        source.close().await;

        // A finished capture file keeps the final table up until Ctrl+C
        if config.filename.is_some() && !config.raw && !shutdown.load(Ordering::SeqCst) {
            println!("\nFile processing complete. Press Ctrl+C to exit...");
            tokio::signal::ctrl_c().await.ok();
        }

        if config.stats {
            eprintln!("{:#?}", demodulator.stats);
        }

        info!(
            "shutting down: {} blocks processed, {} messages accepted",
            demodulator.stats.blocks,
            demodulator.stats.accepted()
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}

/// The acquisition loop: one cycle pulls a sample block, runs it through
/// detection, recovery, validation and dispatch, then renders and persists
/// the snapshot. The shutdown flag is checked once per cycle boundary.
async fn run_cycles(
    config: &Config,
    source: &mut SampleSource,
    demodulator: &mut Demodulator,
    registry: &mut AircraftRegistry,
    shutdown: &AtomicBool,
) -> Result<(), AcquireError> {
    let (msg_tx, msg_rx) = unbounded();

    while !shutdown.load(Ordering::SeqCst) {
        let Some(block) = source.read_block(config.block_samples).await? else {
            break; // end of capture file
        };

        demodulator.process_block(&block, &msg_tx);

        while let Ok(msg) = msg_rx.try_recv() {
            if config.raw {
                println!("*{};", msg);
            }
            registry.ingest(msg);
        }

        if !config.raw {
            render_table(registry, config.max_rows);
        }

        if let Some(path) = &config.save_path {
            if let Err(e) = save_snapshot(path, registry) {
                warn!("failed to write snapshot {}: {}", path, e);
            }
        }
    }

    Ok(())
}

/// Clear the screen and print the aircraft table.
fn render_table(registry: &AircraftRegistry, max_rows: usize) {
    print!("\x1B[2J\x1B[H");

    const BOLD: &str = "\x1B[1m";
    const RESET: &str = "\x1B[0m";

    println!(
        "{BOLD}{:<6} {:<9} {:>9} {:>10} {:>7} {:>8} {:>13} {:>10} {:>17} {:>13}{RESET}",
        "icao",
        "callsign",
        "lat",
        "lon",
        "speed",
        "heading",
        "vertical_rate",
        "speed_type",
        "last_message_time",
        "message_count"
    );
    println!("{}", "-".repeat(112));

    let rows = registry.snapshot();
    for row in rows.iter().take(max_rows) {
        println!(
            "{:<6} {:<9} {:>9.4} {:>10.4} {:>7.1} {:>8.2} {:>13} {:>10} {:>17} {:>13}",
            row.icao,
            row.callsign,
            row.lat,
            row.lon,
            row.speed,
            row.heading,
            row.vertical_rate,
            row.speed_type,
            row.last_message_time,
            row.message_count
        );
    }

    println!("{}", "-".repeat(112));
    println!("Aircraft: {} | Press Ctrl+C to exit", rows.len());

    io::stdout().flush().ok();
}

/// Dump the snapshot rows as JSON, overwriting in place. Best-effort: the
/// caller logs failures and moves on.
fn save_snapshot(path: &str, registry: &AircraftRegistry) -> io::Result<()> {
    let json = serde_json::to_string_pretty(&registry.snapshot())?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MODES_LONG_MSG_BITS, RawMessage};
    use crate::detector::PREAMBLE_SAMPLES;

    /// Write the preamble pulses and PPM-encoded payload of `bytes` into
    /// `block` at `offset`.
    fn embed_frame(block: &mut [f32], offset: usize, bytes: &[u8; 14], level: f32) {
        for &p in &[0, 2, 7, 9] {
            block[offset + p] = level;
        }
        for bit in 0..MODES_LONG_MSG_BITS {
            let set = (bytes[bit / 8] >> (7 - (bit % 8))) & 1 == 1;
            let slot = offset + PREAMBLE_SAMPLES + bit * 2;
            if set {
                block[slot] = level;
            } else {
                block[slot + 1] = level;
            }
        }
    }

    fn seal_crc(bytes: &mut [u8; 14]) {
        let parity = crate::crc::modes_checksum(bytes, MODES_LONG_MSG_BITS);
        bytes[11] = (parity >> 16) as u8;
        bytes[12] = (parity >> 8) as u8;
        bytes[13] = parity as u8;
    }

    /// Run one synthetic sample block through the whole pipeline.
    fn run_block(block: &[f32], registry: &mut AircraftRegistry) {
        let mut demodulator = Demodulator::new(false);
        let (tx, rx) = unbounded();
        demodulator.process_block(block, &tx);
        while let Ok(msg) = rx.try_recv() {
            registry.ingest(msg);
        }
    }

    #[test]
    fn test_end_to_end_identification() {
        // DF17 identification frame for ICAO A12345, callsign TEST1234
        let mut bytes: [u8; 14] = [
            0x8D, 0xA1, 0x23, 0x45, 0x20, 0x50, 0x54, 0xD4, 0xC7, 0x2C, 0xF4, 0, 0, 0,
        ];
        seal_crc(&mut bytes);

        let mut block = vec![0.0f32; 40_000];
        embed_frame(&mut block, 1_000, &bytes, 1.0);

        let mut registry = AircraftRegistry::new();
        run_block(&block, &mut registry);

        assert_eq!(registry.len(), 1);
        let rows = registry.snapshot();
        let row = &rows[0];
        assert_eq!(row.icao, "A12345");
        assert_eq!(row.callsign, "TEST1234");
        assert_eq!(row.lat, 0.0);
        assert_eq!(row.lon, 0.0);
        assert_eq!(row.speed, 0.0);
        assert_eq!(row.heading, 0.0);
        assert_eq!(row.vertical_rate, 0);
        assert_eq!(row.speed_type, 0);
        assert_eq!(row.message_count, 1);
    }

    #[test]
    fn test_end_to_end_position_pair() {
        // Captured even/odd CPR pair for ICAO 40621D
        let even = RawMessage::from_hex("8D40621D58C382D690C8AC2863A7").unwrap();
        let odd = RawMessage::from_hex("8D40621D58C386435CC412692AD6").unwrap();

        let mut block = vec![0.0f32; 40_000];
        let mut even_bytes = [0u8; 14];
        even_bytes.copy_from_slice(even.bytes());
        let mut odd_bytes = [0u8; 14];
        odd_bytes.copy_from_slice(odd.bytes());
        embed_frame(&mut block, 1_000, &even_bytes, 1.0);
        embed_frame(&mut block, 2_000, &odd_bytes, 1.0);

        let mut registry = AircraftRegistry::new();
        run_block(&block, &mut registry);

        let state = registry.get(0x40621D).unwrap();
        assert_eq!(state.message_count, 2);

        let (lat, lon) = state.position().unwrap();
        assert!((lat - 52.2572021484375).abs() < 1e-6);
        assert!((lon - 3.91937255859375).abs() < 1e-6);
    }
}
