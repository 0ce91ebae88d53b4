//! # Bring-up sequence
//!
//! [Provisioner] moves the module from power-on to passthrough mode along a strictly linear
//! lifecycle:
//!
//! ````text
//! Unprovisioned -> Reset -> EchoConfigured -> ModeSet -> Associated -> Addressed -> TunnelOpen -> Passthrough
//! ````
//!
//! Every transition is one [Step]. A failing step aborts the sequence with a
//! [ProvisioningError] naming the step, and the state stays at the last completed state.
//! Calling [Provisioner::run] again resumes with the failed step.
//!
//! ## Example
//!
//! ````
//! # use esp_at_link::example::{ExampleDelay, ExampleResetPin, ExampleTransport};
//! use core::net::{Ipv4Addr, SocketAddrV4};
//! use esp_at_link::config::{Config, NetworkConfig};
//! use esp_at_link::provision::{Provisioner, State};
//! use esp_at_link::status::StatusFramer;
//! use esp_at_link::transport::NullRelay;
//! use esp_at_link::wifi::Adapter;
//!
//! let server = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 5555);
//! let network = NetworkConfig::new("test_wifi", "secret", server).unwrap();
//!
//! let transport = ExampleTransport::default();
//! let mut adapter: Adapter<_, _, _, _, 128> =
//!     Adapter::new(transport, ExampleDelay, ExampleResetPin, NullRelay, Config::default());
//!
//! let mut provisioner = Provisioner::new(network);
//! provisioner.run(&mut adapter).unwrap();
//! assert_eq!(State::Passthrough, provisioner.state());
//!
//! // Status packets are written directly to the tunnel
//! let mut framer: StatusFramer<4> = StatusFramer::new(0x01, 0);
//! framer.emit_status(adapter.data_link().unwrap(), &[0x12, 0x34, 0x56, 0x78]).unwrap();
//! assert_eq!(1, framer.sequence());
//! ````
use crate::config::NetworkConfig;
use crate::transport::Transport;
use crate::wifi::{Adapter, Error, WifiMode};
use core::net::Ipv4Addr;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_io::Write;
use log::{info, warn};

/// Module lifecycle state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Power-on state, nothing known about the module
    Unprovisioned,
    /// Module was reset and has booted
    Reset,
    /// Command echo is disabled
    EchoConfigured,
    /// Station mode is selected
    ModeSet,
    /// Joined the access point and got an IP assigned
    Associated,
    /// Local address was fetched
    Addressed,
    /// TCP tunnel to the server is open
    TunnelOpen,
    /// Module forwards all serial data through the tunnel
    Passthrough,
}

/// Transition from one lifecycle state to the next
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    HardwareReset,
    DisableEcho,
    SelectStationMode,
    JoinNetwork,
    FetchAddress,
    OpenTunnel,
    EnterPassthrough,
}

impl State {
    /// Returns the step leading to the next state. None if already in passthrough mode.
    pub fn next_step(self) -> Option<Step> {
        match self {
            State::Unprovisioned => Some(Step::HardwareReset),
            State::Reset => Some(Step::DisableEcho),
            State::EchoConfigured => Some(Step::SelectStationMode),
            State::ModeSet => Some(Step::JoinNetwork),
            State::Associated => Some(Step::FetchAddress),
            State::Addressed => Some(Step::OpenTunnel),
            State::TunnelOpen => Some(Step::EnterPassthrough),
            State::Passthrough => None,
        }
    }
}

impl Step {
    /// State reached once this step succeeded
    pub fn target(self) -> State {
        match self {
            Step::HardwareReset => State::Reset,
            Step::DisableEcho => State::EchoConfigured,
            Step::SelectStationMode => State::ModeSet,
            Step::JoinNetwork => State::Associated,
            Step::FetchAddress => State::Addressed,
            Step::OpenTunnel => State::TunnelOpen,
            Step::EnterPassthrough => State::Passthrough,
        }
    }
}

/// Failed bring-up step
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisioningError {
    /// Step which failed
    pub step: Step,

    /// Error of the underlying module operation
    pub error: Error,
}

/// State machine bringing the module up to passthrough mode
pub struct Provisioner {
    /// Target network and tunnel endpoint
    network: NetworkConfig,

    /// Current lifecycle state
    state: State,

    /// Address assigned by the access point
    address: Option<Ipv4Addr>,
}

impl Provisioner {
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            state: State::Unprovisioned,
            address: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Returns true once the module is in passthrough mode and ready for status packets
    pub fn is_ready(&self) -> bool {
        self.state == State::Passthrough
    }

    /// Address recorded during bring-up
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    /// Runs all remaining steps until passthrough mode is reached
    pub fn run<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize>(
        &mut self,
        adapter: &mut Adapter<T, D, P, R, RX_SIZE>,
    ) -> Result<(), ProvisioningError> {
        while self.advance(adapter)?.is_some() {}
        Ok(())
    }

    /// Executes the next step. Returns the reached state, or None if already in passthrough mode.
    pub fn advance<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize>(
        &mut self,
        adapter: &mut Adapter<T, D, P, R, RX_SIZE>,
    ) -> Result<Option<State>, ProvisioningError> {
        let Some(step) = self.state.next_step() else {
            return Ok(None);
        };

        if let Err(error) = self.execute(step, adapter) {
            warn!("Bring-up step {:?} failed: {:?}", step, error);
            return Err(ProvisioningError { step, error });
        }

        self.state = step.target();
        info!("Module state: {:?}", self.state);
        Ok(Some(self.state))
    }

    /// Forgets all progress. Next run starts with a hardware reset.
    pub fn restart(&mut self) {
        self.state = State::Unprovisioned;
        self.address = None;
    }

    /// Resets the module by software and returns to [State::Reset]
    pub fn software_reset<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize>(
        &mut self,
        adapter: &mut Adapter<T, D, P, R, RX_SIZE>,
    ) -> Result<(), Error> {
        adapter.software_reset()?;

        self.state = State::Reset;
        self.address = None;
        Ok(())
    }

    fn execute<T: Transport, D: DelayNs, P: OutputPin, R: Write, const RX_SIZE: usize>(
        &mut self,
        step: Step,
        adapter: &mut Adapter<T, D, P, R, RX_SIZE>,
    ) -> Result<(), Error> {
        match step {
            Step::HardwareReset => adapter.hardware_reset(),
            Step::DisableEcho => adapter.set_echo(0),
            Step::SelectStationMode => adapter.set_wifi_mode(WifiMode::Station),
            Step::JoinNetwork => adapter.join(self.network.ssid.as_str(), self.network.password.as_str()),
            Step::FetchAddress => {
                self.address = Some(adapter.get_address()?);
                Ok(())
            }
            Step::OpenTunnel => adapter.connect_tcp(self.network.server),
            Step::EnterPassthrough => adapter.enter_passthrough(),
        }
    }
}
