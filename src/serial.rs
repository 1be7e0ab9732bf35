//! ==============================================================================
//! serial.rs - serial ingestion loop
//! ==============================================================================
//!
//! purpose:
//!     owns the device boundary. opens the configured serial port, then runs
//!     a dedicated OS thread that assembles raw bytes into text lines, feeds
//!     them through the pairing accumulator, and appends completed readings
//!     to the shared store.
//!
//! link lifecycle:
//!     Disconnected -> Connected (open succeeds; an open failure is reported
//!     once and no retry is attempted) -> Reading (poll cycle) -> Error on a
//!     device-level I/O failure, which terminates the loop -> Disconnected.
//!
//! shutdown:
//!     stop() raises an atomic flag checked every poll iteration and joins
//!     the thread, so the loop never outlives the process teardown path.
//!
//! relationships:
//!     - uses: parser.rs (Accumulator), store.rs (ReadingStore::append)
//!     - spawned by: main.rs
//!
//! ==============================================================================

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serialport::SerialPort;

use crate::config::SerialConfig;
use crate::parser::Accumulator;
use crate::store::ReadingStore;

/// poll interval while the device has nothing buffered
const IDLE_POLL: Duration = Duration::from_millis(100);

/// longest partial line carried between reads; anything longer is discarded
const MAX_LINE_BYTES: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq)]
enum LinkState {
    Connected,
    Reading,
    Error,
    Disconnected,
}

/// handle to the background ingestion thread
pub struct SerialIngest {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    port_name: String,
}

impl SerialIngest {
    /// resolve and open the device, then start the read loop on its own
    /// thread. an open failure is returned to the caller; the loop is never
    /// started and no retry is attempted.
    pub fn spawn(config: &SerialConfig, store: ReadingStore) -> Result<Self> {
        let port_name = resolve_port(&config.port)?;
        let port = serialport::new(&port_name, config.baud)
            .timeout(IDLE_POLL)
            .open()
            .with_context(|| format!("failed to open {} at {} baud", port_name, config.baud))?;

        tracing::info!(port = %port_name, baud = config.baud, "serial link connected");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let loop_port_name = port_name.clone();
        let handle = thread::Builder::new()
            .name("serial-ingest".into())
            .spawn(move || read_loop(port, store, stop_flag, &loop_port_name))
            .context("failed to spawn serial ingestion thread")?;

        Ok(Self {
            stop,
            handle: Some(handle),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// signal the read loop and wait for it to exit
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("serial ingestion thread panicked");
            }
        }
    }
}

/// pick the configured port when present, otherwise the first enumerated one
fn resolve_port(configured: &str) -> Result<String> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    tracing::debug!(ports = ?names, "available serial ports");

    if names.iter().any(|n| n == configured) {
        return Ok(configured.to_string());
    }
    match names.into_iter().next() {
        Some(first) => {
            tracing::info!(
                configured,
                fallback = %first,
                "configured port not present, using first available"
            );
            Ok(first)
        }
        None => Err(anyhow!("no serial ports found")),
    }
}

fn read_loop(
    mut port: Box<dyn SerialPort>,
    store: ReadingStore,
    stop: Arc<AtomicBool>,
    port_name: &str,
) {
    let mut state = LinkState::Connected;
    let mut assembler = LineAssembler::new();
    let mut window = Accumulator::new();
    let mut chunk = [0u8; 256];

    transition(&mut state, LinkState::Reading, port_name);

    while !stop.load(Ordering::Relaxed) {
        match port.bytes_to_read() {
            Ok(0) => {
                thread::sleep(IDLE_POLL);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(port = %port_name, error = %e, "serial status check failed");
                transition(&mut state, LinkState::Error, port_name);
                break;
            }
        }

        let n = match port.read(&mut chunk) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                tracing::error!(port = %port_name, error = %e, "serial read failed");
                transition(&mut state, LinkState::Error, port_name);
                break;
            }
        };

        for line in assembler.push(&chunk[..n]) {
            tracing::debug!(port = %port_name, line = %line, "serial line received");
            if let Some(reading) = window.observe(&line, Local::now()) {
                if store.append(reading.clone()) {
                    tracing::info!(
                        temperature = reading.temperature,
                        humidity = reading.humidity,
                        total = store.len(),
                        "reading stored"
                    );
                }
            }
        }
    }

    transition(&mut state, LinkState::Disconnected, port_name);
}

fn transition(state: &mut LinkState, next: LinkState, port_name: &str) {
    if *state != next {
        tracing::info!(port = %port_name, from = ?state, to = ?next, "serial link state");
        *state = next;
    }
}

/// assembles raw serial bytes into decoded text lines. partial input is
/// carried between reads; an oversized line is dropped up to its newline.
struct LineAssembler {
    buf: Vec<u8>,
    overflowed: bool,
}

impl LineAssembler {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                if self.overflowed {
                    self.overflowed = false;
                    self.buf.clear();
                    continue;
                }
                if self.buf.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                self.buf.clear();
                if !line.is_empty() {
                    lines.push(line);
                }
            } else if self.overflowed {
                continue;
            } else if self.buf.len() == MAX_LINE_BYTES {
                tracing::warn!("discarding oversized serial line");
                self.buf.clear();
                self.overflowed = true;
            } else {
                self.buf.push(b);
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_newline_terminated_lines() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"Temperature: 23.5\nHumidity: 61\n");
        assert_eq!(lines, vec!["Temperature: 23.5", "Humidity: 61"]);
    }

    #[test]
    fn handles_crlf_and_blank_lines() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"Humidity: 61\r\n\r\n\nTemperature: 20\r\n");
        assert_eq!(lines, vec!["Humidity: 61", "Temperature: 20"]);
    }

    #[test]
    fn carries_partial_lines_between_reads() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"Temperat").is_empty());
        assert!(assembler.push(b"ure: 23.5").is_empty());
        let lines = assembler.push(b"\n");
        assert_eq!(lines, vec!["Temperature: 23.5"]);
    }

    #[test]
    fn decodes_invalid_utf8_lossily() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"Humidity: 61\xff\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Humidity: 61"));
    }

    #[test]
    fn drops_oversized_lines_up_to_the_next_newline() {
        let mut assembler = LineAssembler::new();
        let long = vec![b'x'; MAX_LINE_BYTES + 10];
        assert!(assembler.push(&long).is_empty());
        assert!(assembler.push(b"tail\n").is_empty());

        let lines = assembler.push(b"Humidity: 61\n");
        assert_eq!(lines, vec!["Humidity: 61"]);
    }
}
