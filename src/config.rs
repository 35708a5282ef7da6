//! Configuration and command-line argument parsing

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    // Device settings
    pub dev_index: u32,
    pub gain: f64,
    pub freq: u32,

    // Input
    pub filename: Option<String>,
    pub loop_file: bool,
    /// Amplitude samples pulled per acquisition cycle
    pub block_samples: usize,

    // Processing
    pub fix_errors: bool,

    // Output
    pub raw: bool,
    pub max_rows: usize,
    /// Registry snapshot written as JSON once per cycle
    pub save_path: Option<String>,
    pub stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dev_index: 0,
            gain: 38.6,
            freq: 1_090_000_000,
            filename: None,
            loop_file: false,
            // ~2 seconds of samples at 2 MHz
            block_samples: 4_096_000,
            fix_errors: true,
            raw: false,
            max_rows: 30,
            save_path: None,
            stats: false,
        }
    }
}

impl Config {
    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--device-index" => {
                    i += 1;
                    config.dev_index = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
                }
                "--gain" => {
                    i += 1;
                    config.gain = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(38.6);
                }
                "--freq" => {
                    i += 1;
                    config.freq = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(1_090_000_000);
                }
                "--ifile" => {
                    i += 1;
                    config.filename = args.get(i).cloned();
                }
                "--loop" => config.loop_file = true,
                "--block-size" => {
                    i += 1;
                    config.block_samples = args
                        .get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(4_096_000);
                }
                "--no-fix" => config.fix_errors = false,
                "--raw" => config.raw = true,
                "--rows" => {
                    i += 1;
                    config.max_rows = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
                }
                "--save" => {
                    i += 1;
                    config.save_path = args.get(i).cloned();
                }
                "--stats" => config.stats = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"flightradar-rs - live ADS-B aircraft table for RTL-SDR devices

Usage: flightradar-rs [OPTIONS]

Options:
  --device-index <N>     Select RTL device (default: 0)
  --gain <db>            Set tuner gain (default: 38.6)
  --freq <hz>            Set frequency (default: 1090 MHz)
  --ifile <filename>     Read raw I/Q data from file (use '-' for stdin)
  --loop                 With --ifile, read the same file in a loop
  --block-size <N>       Amplitude samples per acquisition cycle (default: 4096000)
  --no-fix               Disable single-bit error correction
  --raw                  Print accepted messages instead of the table
  --rows <N>             Max rows in the aircraft table (default: 30)
  --save <path>          Dump the aircraft snapshot as JSON each cycle
  --stats                Print demodulator statistics at exit
  --help                 Show this help
"#
    );
}
