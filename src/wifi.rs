//! # WIFI module adapter
//!
//! Discrete operations of the ATK-MW8266D module: reset, self test, echo and mode control,
//! joining a network, address retrieval, opening the TCP tunnel, passthrough mode and the
//! ATK cloud service. Every operation is a single transaction (or a fixed chain of
//! transactions) of the [AtClient] and fails with a named [Error].
//!
//! Operations do not depend on each other. The ordered bring-up sequence is implemented by
//! [Provisioner](crate::provision::Provisioner).
//!
//! ## Example
//!
//! ````
//! # use esp_at_link::example::{ExampleDelay, ExampleResetPin, ExampleTransport};
//! use core::net::{Ipv4Addr, SocketAddrV4};
//! use esp_at_link::config::Config;
//! use esp_at_link::transport::NullRelay;
//! use esp_at_link::wifi::{Adapter, WifiMode};
//!
//! let transport = ExampleTransport::default();
//! let mut adapter: Adapter<_, _, _, _, 128> =
//!     Adapter::new(transport, ExampleDelay, ExampleResetPin, NullRelay, Config::default());
//!
//! adapter.hardware_reset().unwrap();
//! adapter.set_wifi_mode(WifiMode::Station).unwrap();
//! adapter.join("test_wifi", "secret").unwrap();
//! assert_eq!(Ipv4Addr::new(10, 0, 0, 181), adapter.get_address().unwrap());
//!
//! adapter.connect_tcp(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5555)).unwrap();
//! adapter.enter_passthrough().unwrap();
//! assert!(adapter.data_link().is_ok());
//! ````
use crate::client::{AtClient, TransactionError};
use crate::commands::{
    AccessPointConnectCommand, CloudConnectCommand, CloudDisconnectCommand, CommandErrorHandler, ConnectCommand,
    EchoOffCommand, EchoOnCommand, ObtainLocalAddressCommand, PassthroughSendCommand, RestartCommand,
    RestoreCommand, SelfTestCommand, TransmissionModeCommand, WifiModeCommand,
};
use crate::config::{CloudCredentials, Config};
use crate::transport::Transport;
use atat::AtatCmd;
use core::net::{Ipv4Addr, SocketAddrV4};
use core::str::FromStr;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_io::{ErrorKind, Write};
use log::{debug, info, warn};

/// Escape sequence for leaving passthrough mode. Sent without line terminator.
const PASSTHROUGH_ESCAPE: &[u8] = b"+++";

/// Max. length of the address token in the `AT+CIFSR` response
pub const MAX_ADDRESS_LENGTH: usize = 16;

/// WIFI operation mode of the module
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WifiMode {
    /// Station mode, joining an access point
    Station = 1,
    /// SoftAP mode
    AccessPoint = 2,
    /// SoftAP + station mode
    AccessPointStation = 3,
}

impl TryFrom<u8> for WifiMode {
    type Error = Error;

    fn try_from(mode: u8) -> Result<Self, Error> {
        match mode {
            1 => Ok(Self::Station),
            2 => Ok(Self::AccessPoint),
            3 => Ok(Self::AccessPointStation),
            _ => Err(Error::InvalidWifiMode(mode)),
        }
    }
}

/// Errors of module operations
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// `AT` was not confirmed within all self test attempts. Contains the error of the last attempt.
    SelfTestFailed(TransactionError),

    /// Restoring the factory defaults failed
    RestoreFailed(TransactionError),

    /// Software reset was not confirmed
    ResetFailed(TransactionError),

    /// Error while setting the echo mode
    EchoError(TransactionError),

    /// Error while setting the WIFI mode
    ModeError(TransactionError),

    /// Joining the access point failed or no IP was assigned
    JoinError(TransactionError),

    /// CIFSR command failed
    AddressError(TransactionError),

    /// Response of CIFSR command contains no quoted IPv4 address
    AddressParseError,

    /// TCP connect command failed
    ConnectError(TransactionError),

    /// Switching to passthrough mode failed
    PassthroughError(TransactionError),

    /// Connecting to the cloud service failed
    CloudConnectError(TransactionError),

    /// Disconnecting from the cloud service failed
    CloudDisconnectError(TransactionError),

    /// Echo configuration is neither 0 (off) nor 1 (on)
    InvalidEchoMode(u8),

    /// WIFI mode is not 1 (station), 2 (AP) or 3 (AP + station)
    InvalidWifiMode(u8),

    /// Given SSID is longer then the max. size of 32 chars
    InvalidSSIDLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,

    /// Cloud device id or password is longer then 32 chars
    InvalidCloudCredentials,

    /// Driving the reset line failed
    ResetPinError,

    /// Raw data link is only available in passthrough mode
    NotInPassthrough,

    /// AT commands are not accepted in passthrough mode, leave it by [Adapter::exit_passthrough] first
    InPassthrough,

    /// Writing to the serial link failed outside of a transaction
    Transport(ErrorKind),
}

/// Coarse error classification
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Expected response was not observed in time
    Timeout,

    /// Caller supplied an out-of-range parameter, nothing was sent
    InvalidParameter,

    /// Generic failure of the named operation
    Error,
}

impl Error {
    /// Returns the coarse classification of this error. Failed transactions of a named
    /// operation are reported as [ErrorCode::Error], including timeouts.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidEchoMode(_)
            | Error::InvalidWifiMode(_)
            | Error::InvalidSSIDLength
            | Error::InvalidPasswordLength
            | Error::InvalidCloudCredentials => ErrorCode::InvalidParameter,
            _ => ErrorCode::Error,
        }
    }
}

/// Central client of the WIFI module
///
/// RX_SIZE: Capacity in bytes for storing the last response frame, s. [AtClient].
pub struct Adapter<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize> {
    /// Transaction engine
    pub(crate) client: AtClient<T, D, R, RX_SIZE>,

    /// Reset line of the module, active low
    reset_pin: P,

    /// Timings
    config: Config,

    /// True if the module is in passthrough mode
    passthrough: bool,
}

impl<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize> Adapter<T, D, P, R, RX_SIZE> {
    /// Creates a new adapter. The diagnostic relay receives a copy of every inbound frame.
    pub fn new(transport: T, delay: D, reset_pin: P, relay: R, config: Config) -> Self {
        Self {
            client: AtClient::new(transport, delay, relay, &config),
            reset_pin,
            config,
            passthrough: false,
        }
    }

    /// Resets the module by pulling the reset line low and waits until it has booted
    pub fn hardware_reset(&mut self) -> Result<(), Error> {
        self.reset_pin.set_low().map_err(|_| Error::ResetPinError)?;
        self.client.sleep(self.config.reset_pulse);
        self.reset_pin.set_high().map_err(|_| Error::ResetPinError)?;
        self.client.sleep(self.config.boot_delay);

        self.passthrough = false;
        info!("Module hardware reset");
        Ok(())
    }

    /// Restores the factory defaults. Succeeds once the module reports `ready`.
    pub fn restore(&mut self) -> Result<(), Error> {
        self.send_command(&RestoreCommand)?;
        self.passthrough = false;
        Ok(())
    }

    /// Tests the AT interface. Succeeds on the first confirmed attempt.
    pub fn self_test(&mut self) -> Result<(), Error> {
        let attempts = self.config.self_test_attempts.max(1);
        let mut result = Ok(());

        for attempt in 1..=attempts {
            result = self.send_command(&SelfTestCommand);
            if result.is_ok() {
                return result;
            }

            debug!("Self test attempt {} failed", attempt);
        }

        warn!("Self test failed after {} attempts", attempts);
        result
    }

    /// Software reset. Waits the configured settle time after confirmation.
    pub fn software_reset(&mut self) -> Result<(), Error> {
        self.send_command(&RestartCommand)?;
        self.client.sleep(self.config.reset_settle);

        self.passthrough = false;
        info!("Module software reset");
        Ok(())
    }

    /// Sets the echo mode: 0 disables, 1 enables echoing of commands
    pub fn set_echo(&mut self, config: u8) -> Result<(), Error> {
        match config {
            0 => self.send_command(&EchoOffCommand),
            1 => self.send_command(&EchoOnCommand),
            _ => Err(Error::InvalidEchoMode(config)),
        }
    }

    /// Sets the WIFI mode: 1 station, 2 AP, 3 AP + station
    pub fn set_mode(&mut self, mode: u8) -> Result<(), Error> {
        let mode = WifiMode::try_from(mode)?;
        self.set_wifi_mode(mode)
    }

    /// Sets the WIFI mode
    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> Result<(), Error> {
        self.send_command(&WifiModeCommand::new(mode))
    }

    /// Joins the access point. Succeeds once an IP was assigned.
    pub fn join(&mut self, ssid: &str, key: &str) -> Result<(), Error> {
        let command = AccessPointConnectCommand::new(ssid, key)?;
        self.send_command(&command)?;

        info!("Joined network {}", ssid);
        Ok(())
    }

    /// Returns the IPv4 address, which is the first quoted token of the CIFSR response.
    /// The token is taken from the full frames, so it is not limited by RX_SIZE.
    pub fn get_address(&mut self) -> Result<Ipv4Addr, Error> {
        let mut address = None;

        self.send_command_inspecting(&ObtainLocalAddressCommand, |frame| {
            if address.is_none() {
                address = extract_quoted(frame).map(parse_address);
            }
        })?;

        address.ok_or(Error::AddressParseError)?
    }

    /// Opens the TCP connection to the given server
    pub fn connect_tcp(&mut self, server: SocketAddrV4) -> Result<(), Error> {
        self.send_command(&ConnectCommand::tcp_v4(server))?;

        info!("TCP tunnel to {} opened", server);
        Ok(())
    }

    /// Switches to passthrough mode. Both the mode change and the send start need to be confirmed.
    pub fn enter_passthrough(&mut self) -> Result<(), Error> {
        self.send_command(&TransmissionModeCommand::passthrough())?;
        self.send_command(&PassthroughSendCommand)?;

        self.passthrough = true;
        info!("Passthrough mode entered");
        Ok(())
    }

    /// Leaves passthrough mode by sending the escape sequence and waiting the guard time
    pub fn exit_passthrough(&mut self) -> Result<(), Error> {
        self.client.transmit(PASSTHROUGH_ESCAPE).map_err(|error| match error {
            TransactionError::Transport(kind) => Error::Transport(kind),
            _ => Error::Transport(ErrorKind::Other),
        })?;
        self.client.sleep(self.config.passthrough_guard);

        self.passthrough = false;
        info!("Passthrough mode left");
        Ok(())
    }

    /// Connects to the ATK cloud service
    pub fn connect_cloud(&mut self, credentials: &CloudCredentials) -> Result<(), Error> {
        let command = CloudConnectCommand::new(credentials.id.as_str(), credentials.password.as_str())?;
        self.send_command(&command)
    }

    /// Disconnects from the ATK cloud service
    pub fn disconnect_cloud(&mut self) -> Result<(), Error> {
        self.send_command(&CloudDisconnectCommand)
    }

    /// Forwards a pending inbound frame to the diagnostic relay. Returns true if a frame was pending.
    pub fn relay(&mut self) -> bool {
        self.client.relay()
    }

    /// Returns true if the module is in passthrough mode
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Returns the raw serial link for sending data through the tunnel.
    /// Fails with [Error::NotInPassthrough] unless passthrough mode was entered.
    pub fn data_link(&mut self) -> Result<&mut T, Error> {
        if !self.passthrough {
            return Err(Error::NotInPassthrough);
        }

        Ok(&mut self.client.transport)
    }

    /// Returns the transaction engine, e.g. for sending custom commands.
    /// Commands sent this way are not checked against passthrough mode.
    pub fn client(&mut self) -> &mut AtClient<T, D, R, RX_SIZE> {
        &mut self.client
    }

    /// Sends a command and maps the error if the command failed
    pub(crate) fn send_command<Cmd: AtatCmd + CommandErrorHandler>(&mut self, command: &Cmd) -> Result<(), Error> {
        self.send_command_inspecting(command, |_| {})
    }

    /// Sends a command and passes all received frames to `inspect`.
    /// Rejected with [Error::InPassthrough] while in passthrough mode, as the module would
    /// forward the command to the TCP peer.
    fn send_command_inspecting<Cmd, F>(&mut self, command: &Cmd, inspect: F) -> Result<(), Error>
    where
        Cmd: AtatCmd + CommandErrorHandler,
        F: FnMut(&[u8]),
    {
        if self.passthrough {
            warn!("Command rejected in passthrough mode");
            return Err(Error::InPassthrough);
        }

        self.client
            .send_command_inspecting(command, inspect)
            .map_err(|error| command.command_error(error))
    }
}

/// Returns the text between the first double quote and the next one
pub(crate) fn extract_quoted(frame: &[u8]) -> Option<&str> {
    let start = frame.iter().position(|byte| *byte == b'"')? + 1;
    let length = frame[start..].iter().position(|byte| *byte == b'"')?;

    core::str::from_utf8(&frame[start..start + length]).ok()
}

/// Parses the address token of the CIFSR response
fn parse_address(token: &str) -> Result<Ipv4Addr, Error> {
    if token.len() > MAX_ADDRESS_LENGTH {
        return Err(Error::AddressParseError);
    }

    Ipv4Addr::from_str(token).map_err(|_| Error::AddressParseError)
}
