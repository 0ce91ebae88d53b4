//! # AT transaction engine
//!
//! A transaction sends one command and polls the receive buffer until a frame containing the
//! expected response substring arrives, or the timeout is exhausted. The timeout is counted
//! down by the poll interval on every iteration, so it is measured in whole sleep periods
//! and not in wall-clock time.
//!
//! Every frame read while polling is forwarded unmodified to the diagnostic relay. Outside of
//! transactions [AtClient::relay] forwards pending frames. As both require `&mut AtClient`, the
//! engine and the relay never consume the same frame.
use crate::commands::CommandErrorHandler;
use crate::config::Config;
use crate::transport::{InboundFrame, Transport};
use crate::wifi::ErrorCode;
use atat::AtatCmd;
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::delay::DelayNs;
use embedded_io::{Error as _, ErrorKind, Write};
use fugit::MillisDurationU32;
use heapless::{String, Vec};
use log::{debug, trace, warn};

/// Size of the buffer typed commands get encoded to. Also limits the length of raw command lines.
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Max. length of the command text kept by [Transaction]
pub const MAX_COMMAND_TEXT: usize = 128;

/// Max. length of the expected response kept by [Transaction]
pub const MAX_EXPECTED_TEXT: usize = 32;

/// Terminates every AT command
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// A transaction whose expected response was not observed in time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Sent command without line terminator. Truncated if longer than [MAX_COMMAND_TEXT].
    pub command: String<MAX_COMMAND_TEXT>,

    /// Awaited response substring. Truncated if longer than [MAX_EXPECTED_TEXT].
    pub expected: String<MAX_EXPECTED_TEXT>,

    /// Timeout in milliseconds
    pub timeout_ms: u32,
}

impl Transaction {
    pub(crate) fn new(command: &[u8], expected: &str, timeout_ms: u32) -> Self {
        Self {
            command: truncated(command.strip_suffix(LINE_TERMINATOR).unwrap_or(command)),
            expected: truncated(expected.as_bytes()),
            timeout_ms,
        }
    }
}

/// Errors of a single transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionError {
    /// Expected response was not received within the timeout
    Timeout(Transaction),

    /// Writing the command to the serial link failed
    Transport(ErrorKind),

    /// Command may exceed [COMMAND_BUFFER_SIZE], nothing was sent
    CommandOverflow,

    /// Wait was aborted by the cancellation flag
    Cancelled,
}

impl TransactionError {
    /// Returns the coarse classification of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            TransactionError::Timeout(_) => ErrorCode::Timeout,
            _ => ErrorCode::Error,
        }
    }
}

/// Polling AT client
///
/// RX_SIZE: Capacity in bytes for storing the last response frame. Longer frames get truncated
/// when stored, matching is always done on the full frame.
pub struct AtClient<T: Transport, D: DelayNs, R: Write, const RX_SIZE: usize> {
    /// Serial link to the module
    pub(crate) transport: T,

    /// Delay used for polling and reset timings
    pub(crate) delay: D,

    /// Diagnostic sink receiving a copy of all inbound frames
    pub(crate) relay: R,

    /// Sleep time between two polls
    poll_interval: MillisDurationU32,

    /// Aborts running waits if set
    cancel: Option<&'static AtomicBool>,

    /// Last frame received during a transaction
    last_response: Vec<u8, RX_SIZE>,
}

impl<T: Transport, D: DelayNs, R: Write, const RX_SIZE: usize> AtClient<T, D, R, RX_SIZE> {
    pub fn new(transport: T, delay: D, relay: R, config: &Config) -> Self {
        Self {
            transport,
            delay,
            relay,
            poll_interval: config.poll_interval,
            cancel: None,
            last_response: Vec::new(),
        }
    }

    /// Registers a flag which aborts running waits with [TransactionError::Cancelled] once set
    pub fn set_cancel_flag(&mut self, flag: &'static AtomicBool) {
        self.cancel = Some(flag);
    }

    /// Sends the command and waits until a frame containing `expected` is received.
    ///
    /// If `expected` is None or the timeout is zero, the command is sent without waiting for
    /// any response and the transaction always succeeds.
    pub fn send_and_wait(&mut self, command: &str, expected: Option<&str>, timeout_ms: u32) -> Result<(), TransactionError> {
        if command.len() + LINE_TERMINATOR.len() > COMMAND_BUFFER_SIZE {
            warn!("Command of {} bytes exceeds line limit", command.len());
            return Err(TransactionError::CommandOverflow);
        }

        self.relay();
        self.transmit_line(command.as_bytes())?;

        match expected {
            Some(expected) if timeout_ms > 0 => {
                self.await_response(command.as_bytes(), expected, timeout_ms, &mut |_: &[u8]| {})
            }
            _ => Ok(()),
        }
    }

    /// Sends a typed command and waits for its confirmation
    pub fn send_command<Cmd: AtatCmd + CommandErrorHandler>(&mut self, command: &Cmd) -> Result<(), TransactionError> {
        self.send_command_inspecting(command, |_| {})
    }

    /// Sends a typed command and passes every frame received until confirmation to `inspect`.
    /// Frames are passed in full length, independent of RX_SIZE.
    pub fn send_command_inspecting<Cmd, F>(
        &mut self,
        command: &Cmd,
        mut inspect: F,
    ) -> Result<(), TransactionError>
    where
        Cmd: AtatCmd + CommandErrorHandler,
        F: FnMut(&[u8]),
    {
        let mut buffer = [0x0; COMMAND_BUFFER_SIZE];
        if Cmd::MAX_LEN > buffer.len() {
            warn!("Command of up to {} bytes exceeds encode buffer", Cmd::MAX_LEN);
            return Err(TransactionError::CommandOverflow);
        }

        let length = command.write(&mut buffer);
        let encoded = &buffer[..length];

        self.relay();
        debug!("AT > {}", printable(encoded));
        self.transmit(encoded)?;
        self.await_response(encoded, Cmd::EXPECTED, Cmd::MAX_TIMEOUT_MS, &mut inspect)
    }

    /// Waits for a frame containing `expected` without sending anything
    pub fn wait_for(&mut self, expected: &str, timeout_ms: u32) -> Result<(), TransactionError> {
        self.await_response(&[], expected, timeout_ms, &mut |_: &[u8]| {})
    }

    /// Forwards a pending frame to the diagnostic relay and releases the receive buffer.
    /// Returns true if a frame was pending.
    pub fn relay(&mut self) -> bool {
        let Some(frame) = InboundFrame::take(&mut self.transport) else {
            return false;
        };

        trace!("AT < {} (relayed)", printable(&frame));
        Self::forward(&mut self.relay, &frame);
        true
    }

    /// Returns the last frame received during a transaction
    pub fn last_response(&self) -> &[u8] {
        &self.last_response
    }

    /// Releases the owned peripherals
    pub fn release(self) -> (T, D, R) {
        (self.transport, self.delay, self.relay)
    }

    /// Writes raw bytes, bypassing the command layer
    pub(crate) fn transmit(&mut self, data: &[u8]) -> Result<(), TransactionError> {
        self.transport
            .write_all(data)
            .and_then(|_| self.transport.flush())
            .map_err(|error| TransactionError::Transport(error.kind()))
    }

    /// Blocks for the given duration
    pub(crate) fn sleep(&mut self, duration: MillisDurationU32) {
        self.delay.delay_ms(duration.to_millis());
    }

    /// Sends the command followed by the line terminator
    fn transmit_line(&mut self, command: &[u8]) -> Result<(), TransactionError> {
        debug!("AT > {}", printable(command));
        self.transport
            .write_all(command)
            .and_then(|_| self.transport.write_all(LINE_TERMINATOR))
            .and_then(|_| self.transport.flush())
            .map_err(|error| TransactionError::Transport(error.kind()))
    }

    /// Polls the receive buffer until a frame contains `expected` or the timeout is exhausted
    fn await_response(
        &mut self,
        command: &[u8],
        expected: &str,
        timeout_ms: u32,
        inspect: &mut dyn FnMut(&[u8]),
    ) -> Result<(), TransactionError> {
        let interval = self.poll_interval.to_millis().max(1);
        let mut remaining = timeout_ms;

        while remaining > 0 {
            if self.is_cancelled() {
                warn!("Waiting for \"{}\" was cancelled", expected);
                return Err(TransactionError::Cancelled);
            }

            if self.poll(expected.as_bytes(), inspect) {
                return Ok(());
            }

            remaining = remaining.saturating_sub(interval);
            self.delay.delay_ms(interval);
        }

        warn!("No \"{}\" received within {} ms", expected, timeout_ms);
        Err(TransactionError::Timeout(Transaction::new(command, expected, timeout_ms)))
    }

    /// Takes a pending frame, relays and stores it. Returns true if the frame contains the needle.
    fn poll(&mut self, needle: &[u8], inspect: &mut dyn FnMut(&[u8])) -> bool {
        let Some(frame) = InboundFrame::take(&mut self.transport) else {
            return false;
        };

        trace!("AT < {}", printable(&frame));
        Self::forward(&mut self.relay, &frame);
        inspect(&frame[..]);

        let stored = frame.len().min(RX_SIZE);
        self.last_response.clear();
        let _ = self.last_response.extend_from_slice(&frame[..stored]);

        contains(&frame, needle)
    }

    /// Copies the frame to the relay. Errors are only logged, as relaying must not affect the transaction.
    fn forward(relay: &mut R, frame: &[u8]) {
        if let Err(error) = relay.write_all(frame) {
            warn!("Relaying {} bytes failed: {:?}", frame.len(), error.kind());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.map(|flag| flag.load(Ordering::Acquire)).unwrap_or(false)
    }
}

/// Returns true if the needle occurs anywhere in the haystack
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Valid UTF-8 prefix of the given bytes for logging
fn printable(data: &[u8]) -> &str {
    match core::str::from_utf8(data) {
        Ok(text) => text,
        Err(error) => core::str::from_utf8(&data[..error.valid_up_to()]).unwrap_or_default(),
    }
}

/// Copies as many characters as fit
fn truncated<const N: usize>(data: &[u8]) -> String<N> {
    let mut text = String::new();
    for character in printable(data).chars() {
        if text.push(character).is_err() {
            break;
        }
    }

    text
}
