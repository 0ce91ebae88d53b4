use crate::client::TransactionError;
use crate::config::{MAX_CLOUD_CREDENTIAL_LENGTH, MAX_PASSWORD_LENGTH, MAX_SSID_LENGTH};
use crate::responses::NoResponse;
use crate::wifi::{Error, WifiMode};
use atat::atat_derive::AtatCmd;
use atat::heapless::String;
use core::fmt::Write;
use core::net::SocketAddrV4;

/// Trait for matching command responses and mapping command errors
pub trait CommandErrorHandler {
    /// Substring of the module's response confirming the command
    const EXPECTED: &'static str;

    /// Maps a failed transaction to the error of the named operation
    fn command_error(&self, error: TransactionError) -> Error;
}

/// Copies the given value to a bounded string. Returns None if value does not fit.
fn bounded<const N: usize>(value: &str) -> Option<String<N>> {
    let mut string = String::new();
    string.push_str(value).ok()?;
    Some(string)
}

/// Plain `AT` for testing the command interface
#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 500)]
pub struct SelfTestCommand;

impl CommandErrorHandler for SelfTestCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::SelfTestFailed(error)
    }
}

/// Restores the factory defaults. Module restarts afterwards.
#[derive(Clone, AtatCmd)]
#[at_cmd("+RESTORE", NoResponse, timeout_ms = 3_000)]
pub struct RestoreCommand;

impl CommandErrorHandler for RestoreCommand {
    const EXPECTED: &'static str = "ready";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::RestoreFailed(error)
    }
}

/// Software reset of the module
#[derive(Clone, AtatCmd)]
#[at_cmd("+RST", NoResponse, timeout_ms = 500)]
pub struct RestartCommand;

impl CommandErrorHandler for RestartCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::ResetFailed(error)
    }
}

/// Disables echoing of received commands
#[derive(Clone, AtatCmd)]
#[at_cmd("E0", NoResponse, timeout_ms = 500)]
pub struct EchoOffCommand;

impl CommandErrorHandler for EchoOffCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::EchoError(error)
    }
}

/// Enables echoing of received commands
#[derive(Clone, AtatCmd)]
#[at_cmd("E1", NoResponse, timeout_ms = 500)]
pub struct EchoOnCommand;

impl CommandErrorHandler for EchoOnCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::EchoError(error)
    }
}

/// Sets the WIFI mode
#[derive(Clone, AtatCmd)]
#[at_cmd("+CWMODE", NoResponse, timeout_ms = 500)]
pub struct WifiModeCommand {
    /// WIFI mode:
    ///     1: Station mode.
    ///     2: SoftAP mode.
    ///     3: SoftAP+Station mode.
    #[at_arg(position = 0)]
    mode: u8,
}

impl WifiModeCommand {
    pub fn new(mode: WifiMode) -> Self {
        Self { mode: mode as u8 }
    }
}

impl CommandErrorHandler for WifiModeCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::ModeError(error)
    }
}

/// Command for joining the target WIFI access point. Confirmed once an IP got assigned.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CWJAP", NoResponse, timeout_ms = 10_000)]
pub struct AccessPointConnectCommand {
    /// The SSID of the target access point
    #[at_arg(position = 0)]
    ssid: String<MAX_SSID_LENGTH>,

    /// The password/key of the target access point
    #[at_arg(position = 1)]
    password: String<64>,
}

impl AccessPointConnectCommand {
    pub fn new(ssid: &str, password: &str) -> Result<Self, Error> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(Error::InvalidPasswordLength);
        }

        Ok(Self {
            ssid: bounded(ssid).ok_or(Error::InvalidSSIDLength)?,
            password: bounded(password).ok_or(Error::InvalidPasswordLength)?,
        })
    }
}

impl CommandErrorHandler for AccessPointConnectCommand {
    const EXPECTED: &'static str = "WIFI GOT IP";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::JoinError(error)
    }
}

/// Queries the local IP and MAC addresses
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIFSR", NoResponse, timeout_ms = 500)]
pub struct ObtainLocalAddressCommand;

impl CommandErrorHandler for ObtainLocalAddressCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::AddressError(error)
    }
}

/// Establishes the single TCP connection used by the tunnel
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTART", NoResponse, timeout_ms = 5_000)]
pub struct ConnectCommand {
    /// Connection type, e.g. TCP, UDP, SSL
    #[at_arg(position = 0)]
    connection_type: String<5>,

    /// Remote IPv4 address
    #[at_arg(position = 1)]
    remote_host: String<15>,

    /// Remote port
    #[at_arg(position = 2)]
    port: u16,
}

impl ConnectCommand {
    /// Establishes a IPv4 TCP connection
    pub fn tcp_v4(remote: SocketAddrV4) -> Self {
        let mut remote_host = String::new();
        // Dotted IPv4 notation has at most 15 characters
        let _ = write!(remote_host, "{}", remote.ip());

        let mut connection_type = String::new();
        let _ = connection_type.push_str("TCP");

        Self {
            connection_type,
            remote_host,
            port: remote.port(),
        }
    }
}

impl CommandErrorHandler for ConnectCommand {
    const EXPECTED: &'static str = "CONNECT";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::ConnectError(error)
    }
}

/// Sets the transmission mode
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPMODE", NoResponse, timeout_ms = 500)]
pub struct TransmissionModeCommand {
    /// 0: normal transmission mode
    /// 1: passthrough (transparent) mode
    #[at_arg(position = 0)]
    mode: u8,
}

impl TransmissionModeCommand {
    pub fn passthrough() -> Self {
        Self { mode: 1 }
    }
}

impl CommandErrorHandler for TransmissionModeCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::PassthroughError(error)
    }
}

/// Starts sending in passthrough mode. Confirmed by the `>` prompt.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSEND", NoResponse, timeout_ms = 500)]
pub struct PassthroughSendCommand;

impl CommandErrorHandler for PassthroughSendCommand {
    const EXPECTED: &'static str = ">";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::PassthroughError(error)
    }
}

/// Connects to the ATK cloud service
#[derive(Clone, AtatCmd)]
#[at_cmd("+ATKCLDSTA", NoResponse, timeout_ms = 10_000)]
pub struct CloudConnectCommand {
    /// Cloud device number
    #[at_arg(position = 0)]
    id: String<MAX_CLOUD_CREDENTIAL_LENGTH>,

    /// Cloud device password
    #[at_arg(position = 1)]
    password: String<MAX_CLOUD_CREDENTIAL_LENGTH>,
}

impl CloudConnectCommand {
    pub fn new(id: &str, password: &str) -> Result<Self, Error> {
        Ok(Self {
            id: bounded(id).ok_or(Error::InvalidCloudCredentials)?,
            password: bounded(password).ok_or(Error::InvalidCloudCredentials)?,
        })
    }
}

impl CommandErrorHandler for CloudConnectCommand {
    const EXPECTED: &'static str = "CLOUD CONNECTED";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::CloudConnectError(error)
    }
}

/// Closes the connection to the ATK cloud service
#[derive(Clone, AtatCmd)]
#[at_cmd("+ATKCLDCLS", NoResponse, timeout_ms = 500)]
pub struct CloudDisconnectCommand;

impl CommandErrorHandler for CloudDisconnectCommand {
    const EXPECTED: &'static str = "CLOUD DISCONNECT";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::CloudDisconnectError(error)
    }
}
