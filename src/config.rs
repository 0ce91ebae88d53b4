//! # Timing and network configuration
//!
//! [Config] holds the timings of the transaction engine and the hardware reset sequence.
//! All values default to the timings required by the ATK-MW8266D module.
//!
//! [NetworkConfig] and [CloudCredentials] carry the values which are injected by the
//! application instead of being compiled in.
use crate::wifi::Error;
use core::net::SocketAddrV4;
use fugit::MillisDurationU32;
use heapless::String;

/// Max. SSID length in bytes
pub const MAX_SSID_LENGTH: usize = 32;

/// Max. WPA passphrase length in bytes
pub const MAX_PASSWORD_LENGTH: usize = 63;

/// Max. length in bytes of cloud device id and password
pub const MAX_CLOUD_CREDENTIAL_LENGTH: usize = 32;

/// Timings of the transaction engine and the module lifecycle
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Sleep time between two polls of the receive buffer. Timeouts get counted down by this value.
    pub poll_interval: MillisDurationU32,

    /// Max. number of `AT` commands sent by the self test
    pub self_test_attempts: u8,

    /// Time the reset line is held low
    pub reset_pulse: MillisDurationU32,

    /// Time the module needs for booting after releasing the reset line
    pub boot_delay: MillisDurationU32,

    /// Settle time after a confirmed software reset
    pub reset_settle: MillisDurationU32,

    /// Silence required after the `+++` escape sequence before AT commands are accepted again
    pub passthrough_guard: MillisDurationU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: MillisDurationU32::millis(1),
            self_test_attempts: 10,
            reset_pulse: MillisDurationU32::millis(100),
            boot_delay: MillisDurationU32::millis(2_000),
            reset_settle: MillisDurationU32::millis(1_000),
            passthrough_guard: MillisDurationU32::millis(1_000),
        }
    }
}

impl Config {
    /// Sets the poll interval in ms. Zero gets raised to one ms, as timeouts would never expire.
    pub fn poll_interval_ms(mut self, interval: u32) -> Self {
        self.poll_interval = MillisDurationU32::millis(interval.max(1));
        self
    }

    /// Sets the max. number of self test attempts. At least one attempt is made.
    pub fn self_test_attempts(mut self, attempts: u8) -> Self {
        self.self_test_attempts = attempts.max(1);
        self
    }

    /// Sets the time the reset line is held low in ms
    pub fn reset_pulse_ms(mut self, pulse: u32) -> Self {
        self.reset_pulse = MillisDurationU32::millis(pulse);
        self
    }

    /// Sets the boot delay after a hardware reset in ms
    pub fn boot_delay_ms(mut self, delay: u32) -> Self {
        self.boot_delay = MillisDurationU32::millis(delay);
        self
    }

    /// Sets the settle time after a software reset in ms
    pub fn reset_settle_ms(mut self, delay: u32) -> Self {
        self.reset_settle = MillisDurationU32::millis(delay);
        self
    }

    /// Sets the guard time after leaving passthrough mode in ms
    pub fn passthrough_guard_ms(mut self, delay: u32) -> Self {
        self.passthrough_guard = MillisDurationU32::millis(delay);
        self
    }
}

/// Target network and tunnel endpoint of the bring-up sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// SSID of the access point
    pub ssid: String<MAX_SSID_LENGTH>,

    /// Passphrase of the access point
    pub password: String<64>,

    /// TCP server the tunnel gets opened to
    pub server: SocketAddrV4,
}

impl NetworkConfig {
    pub fn new(ssid: &str, password: &str, server: SocketAddrV4) -> Result<Self, Error> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(Error::InvalidPasswordLength);
        }

        Ok(Self {
            ssid: String::try_from(ssid).map_err(|_| Error::InvalidSSIDLength)?,
            password: String::try_from(password).map_err(|_| Error::InvalidPasswordLength)?,
            server,
        })
    }
}

/// Device credentials of the ATK cloud service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudCredentials {
    /// Cloud device number
    pub id: String<MAX_CLOUD_CREDENTIAL_LENGTH>,

    /// Cloud device password
    pub password: String<MAX_CLOUD_CREDENTIAL_LENGTH>,
}

impl CloudCredentials {
    pub fn new(id: &str, password: &str) -> Result<Self, Error> {
        Ok(Self {
            id: String::try_from(id).map_err(|_| Error::InvalidCloudCredentials)?,
            password: String::try_from(password).map_err(|_| Error::InvalidCloudCredentials)?,
        })
    }
}
