//! Sample acquisition
//!
//! Supplies the processing loop with fixed-size blocks of real amplitude
//! samples, either from an `rtl_sdr` subprocess tuned to 1090 MHz or from a
//! raw I/Q capture file (use '-' for stdin). Acquisition failures are fatal
//! to the caller; end of input is not.

use std::io;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::config::Config;
use crate::magnitude::AmplitudeLut;

/// Sample rate expected by the demodulator (2 MHz, 2 samples/µs)
const SAMPLE_RATE: u32 = 2_000_000;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("failed to spawn rtl_sdr (is rtl-sdr installed?): {0}")]
    Spawn(#[source] io::Error),
    #[error("rtl_sdr did not expose a stdout pipe")]
    MissingStdout,
    #[error("sample stream error: {0}")]
    Io(#[from] io::Error),
}

enum Backend {
    Stream {
        reader: Box<dyn AsyncRead + Unpin + Send>,
        path: Option<String>,
        loop_file: bool,
    },
    RtlSdr {
        child: Child,
        stdout: ChildStdout,
    },
}

/// A source of amplitude-sample blocks at the fixed 2 MHz rate.
pub struct SampleSource {
    backend: Backend,
    lut: AmplitudeLut,
    buf: BytesMut,
}

impl SampleSource {
    /// Open the source selected by the configuration.
    pub async fn open(config: &Config) -> Result<Self, AcquireError> {
        let backend = if let Some(filename) = &config.filename {
            let reader: Box<dyn AsyncRead + Unpin + Send> = if filename == "-" {
                Box::new(tokio::io::stdin())
            } else {
                Box::new(tokio::fs::File::open(filename).await?)
            };
            debug!(file = %filename, "reading I/Q samples from file");
            Backend::Stream {
                reader,
                path: (filename != "-").then(|| filename.clone()),
                loop_file: config.loop_file,
            }
        } else {
            let mut cmd = Command::new("rtl_sdr");
            cmd.arg("-f")
                .arg(config.freq.to_string())
                .arg("-s")
                .arg(SAMPLE_RATE.to_string())
                .arg("-g")
                .arg(format!("{}", config.gain))
                .arg("-d")
                .arg(config.dev_index.to_string())
                .arg("-")
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::null())
                .kill_on_drop(true);

            let mut child = cmd.spawn().map_err(AcquireError::Spawn)?;
            let stdout = child.stdout.take().ok_or(AcquireError::MissingStdout)?;
            info!(freq = config.freq, gain = config.gain, "rtl_sdr started");
            Backend::RtlSdr { child, stdout }
        };

        Ok(Self {
            backend,
            lut: AmplitudeLut::new(),
            buf: BytesMut::new(),
        })
    }

    /// Read one block of up to `samples` amplitudes.
    ///
    /// Blocks until the device delivers a full block; only the final block
    /// of a file may come back short. `Ok(None)` signals end of input,
    /// `Err` a fatal acquisition failure.
    pub async fn read_block(&mut self, samples: usize) -> Result<Option<Vec<f32>>, AcquireError> {
        let byte_len = samples * 2; // interleaved I/Q, one byte each

        loop {
            self.buf.clear();
            self.buf.reserve(byte_len);

            let mut eof = false;
            while self.buf.len() < byte_len {
                let reader: &mut (dyn AsyncRead + Unpin + Send) = match &mut self.backend {
                    Backend::Stream { reader, .. } => reader.as_mut(),
                    Backend::RtlSdr { stdout, .. } => stdout,
                };

                let want = (byte_len - self.buf.len()) as u64;
                let n = reader.take(want).read_buf(&mut self.buf).await?;
                if n == 0 {
                    eof = true;
                    break;
                }
            }

            if eof && self.buf.is_empty() {
                // Exhausted input; replaying files may start over
                if let Backend::Stream {
                    reader,
                    path: Some(path),
                    loop_file: true,
                } = &mut self.backend
                {
                    debug!(file = %path, "looping capture file");
                    *reader = Box::new(tokio::fs::File::open(path.as_str()).await?);
                    continue;
                }
                return Ok(None);
            }

            return Ok(Some(self.lut.amplitudes(&self.buf)));
        }
    }

    /// Release the underlying device or stream.
    pub async fn close(self) {
        if let Backend::RtlSdr { mut child, .. } = self.backend {
            child.kill().await.ok();
            info!("rtl_sdr stopped");
        }
    }
}
