//! The radio module driver.
//!
//! [`FanetRadio::run`] owns the UART and drives the module through its
//! lifecycle:
//!
//! ```text
//! Disabled ──init──▶ Resetting ──250ms──▶ Initializing ──▶ Ready
//!                                     │ (version gate, region, enable)
//!                                     ▼
//!            DevNotFound / DevOpenFail / InitTimeout /
//!            ComTimeout / WrongFirmware / Error
//! ```
//!
//! State changes are published over a `watch` channel, received packets
//! over an unbounded `mpsc`; callers submit work through [`RadioHandle`].
//! The driver is generic over its [`Transport`], so tests can run the full
//! state machine over an in-memory duplex pipe.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, error, info, warn};

use fanet_models::frame::{END_DELIMITER, START_DELIMITER};
use fanet_models::{
    FanetAddress, FanetMessage, FanetPayload, FrameParser, Frequency, RegionCommand, ReplyKind,
    TransmitCommand,
};

use crate::error::RadioError;
use crate::gpio::{ControlPin, PinConfig};

const BAUD_RATE: u32 = 115_200;
const RESET_HOLD: Duration = Duration::from_millis(250);
const INIT_TIMEOUT: Duration = Duration::from_secs(10);
const COM_TIMEOUT: Duration = Duration::from_secs(3);
const MSG_CODE_INITIALIZED: i32 = 1;
const READ_BUF_SIZE: usize = 512;

/// Firmware build this driver is validated against. The module's command
/// set has drifted across builds, so anything else is rejected outright.
pub const EXPECTED_FIRMWARE: &str = "202201131742";

// ---------------------------------------------------------------------------
// Config & state
// ---------------------------------------------------------------------------

/// Static radio configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// UART device path (e.g. `/dev/ttyUSB0`).
    pub uart: String,
    /// Transmit power in dBm (clamped to 2–20 on use).
    pub tx_power: i32,
    /// Radio band.
    pub frequency: Frequency,
    /// Line wired to the module's BOOT0 pin.
    pub pin_boot: PinConfig,
    /// Line wired to the module's reset pin.
    pub pin_reset: PinConfig,
}

/// Observable driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RadioState {
    /// No session; waiting for an init request.
    #[strum(serialize = "disabled")]
    Disabled,
    /// Reset line held, waiting for the module to restart.
    #[strum(serialize = "resetting")]
    Resetting,
    /// Waiting for the boot notice / version gate / region setup.
    #[strum(serialize = "initializing")]
    Initializing,
    /// Configured and accepting transmit requests.
    #[strum(serialize = "ready")]
    Ready,
    /// Session failed (write error or module-reported error).
    #[strum(serialize = "error")]
    Error,
    /// The UART device does not exist.
    #[strum(serialize = "device not found")]
    DevNotFound,
    /// The UART device could not be opened.
    #[strum(serialize = "device open failed")]
    DevOpenFail,
    /// The module never announced itself after reset.
    #[strum(serialize = "initialization timeout")]
    InitTimeout,
    /// A command went unanswered in the steady state.
    #[strum(serialize = "communication timeout")]
    ComTimeout,
    /// The module runs an unsupported firmware build.
    #[strum(serialize = "wrong firmware version")]
    WrongFirmware,
}

impl RadioState {
    /// `true` for every failure state.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            Self::Disabled | Self::Resetting | Self::Initializing | Self::Ready
        )
    }

    /// Failure states worth a re-init cycle.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Error | Self::ComTimeout)
    }

    /// Failure states that indicate broken hardware or firmware; retrying
    /// will not help.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::DevNotFound | Self::DevOpenFail | Self::InitTimeout | Self::WrongFirmware
        )
    }
}

// ---------------------------------------------------------------------------
// Commands, packets, handle
// ---------------------------------------------------------------------------

/// Work submitted to the driver task.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioCommand {
    /// Open the UART and (re-)run the initialization sequence.
    Init,
    /// Transmit a payload to an address.
    Transmit {
        /// Destination address (broadcast for weather/name beacons).
        address: FanetAddress,
        /// The payload to send.
        payload: FanetPayload,
    },
    /// Parse a raw frame body as if it had been received (debugging aid).
    Inject(String),
    /// Close the session and end the driver task.
    Shutdown,
}

/// A packet received over the air, forwarded to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    /// The sender's address.
    pub address: FanetAddress,
    /// The decoded payload.
    pub payload: FanetPayload,
    /// Whether the packet was addressed to everyone.
    pub broadcast: bool,
}

/// Cheap, cloneable front end to the driver task.
#[derive(Debug, Clone)]
pub struct RadioHandle {
    commands: mpsc::UnboundedSender<RadioCommand>,
    state: watch::Receiver<RadioState>,
}

impl RadioHandle {
    /// Assemble a handle from its channels. Normally obtained from
    /// [`FanetRadio::new`]; public so dispatchers can be driven against a
    /// stand-in radio in tests.
    pub fn new(
        commands: mpsc::UnboundedSender<RadioCommand>,
        state: watch::Receiver<RadioState>,
    ) -> Self {
        Self { commands, state }
    }

    /// The driver's current state.
    pub fn state(&self) -> RadioState {
        *self.state.borrow()
    }

    /// `true` when transmit requests will be accepted.
    pub fn is_ready(&self) -> bool {
        self.state() == RadioState::Ready
    }

    /// A fresh receiver for state-change notifications.
    pub fn state_receiver(&self) -> watch::Receiver<RadioState> {
        self.state.clone()
    }

    /// Ask the driver to (re-)initialize the radio.
    pub fn init(&self) {
        let _ = self.commands.send(RadioCommand::Init);
    }

    /// Ask the driver to shut the session down and exit.
    pub fn shutdown(&self) {
        let _ = self.commands.send(RadioCommand::Shutdown);
    }

    /// Submit a payload for transmission.
    ///
    /// Returns `false` (after logging) when the address is invalid or the
    /// radio is not ready; the payload is dropped in that case.
    pub fn send(&self, address: FanetAddress, payload: FanetPayload) -> bool {
        if !address.is_valid() {
            warn!("failed to send data: invalid address");
            return false;
        }
        let state = self.state();
        if state != RadioState::Ready {
            warn!(
                payload_type = %payload.payload_type(),
                destination = %address,
                %state,
                "failed to send data: radio is not ready"
            );
            return false;
        }
        self.commands
            .send(RadioCommand::Transmit { address, payload })
            .is_ok()
    }

    /// Feed a raw frame body into the driver as if it had been received.
    pub fn inject(&self, frame: &str) {
        let _ = self.commands.send(RadioCommand::Inject(frame.to_string()));
    }

    /// Whether the module can change its sender address per transmission.
    /// Stock firmware cannot, which limits broadcasting to a single
    /// station identity.
    pub fn supports_address_change(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Byte transport to the module, plus the modem-control lines some boards
/// use for boot/reset.
///
/// Implemented for the real serial port and for `tokio::io::DuplexStream`
/// (tests), where the modem-control lines are no-ops.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Drive the RTS line.
    fn set_rts(&mut self, _level: bool) -> io::Result<()> {
        Ok(())
    }

    /// Drive the DTR line.
    fn set_dtr(&mut self, _level: bool) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for SerialStream {
    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.write_request_to_send(level).map_err(io::Error::from)
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.write_data_terminal_ready(level)
            .map_err(io::Error::from)
    }
}

impl Transport for tokio::io::DuplexStream {}

/// Open the configured UART: 115200 baud, 8N1, no flow control.
pub fn open_serial(config: &RadioConfig) -> Result<SerialStream, RadioError> {
    tokio_serial::new(config.uart.as_str(), BAUD_RATE)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice
            | tokio_serial::ErrorKind::Io(io::ErrorKind::NotFound) => RadioError::DeviceNotFound {
                path: config.uart.clone(),
            },
            _ => RadioError::DeviceOpenFailed {
                path: config.uart.clone(),
                source: e,
            },
        })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// How a session ended, and what the run loop should do next.
enum SessionEnd {
    /// An init request arrived mid-session: reopen and start over.
    Restart,
    /// Shutdown requested or all handles dropped.
    Shutdown,
    /// The session failed; report the state and wait for the next init.
    Failed(RadioState),
}

/// What [`FanetRadio::wait_message`] produced.
enum WaitOutcome {
    Message(FanetMessage),
    Timeout,
    Control(SessionEnd),
}

struct SessionPins {
    boot: ControlPin,
    reset: ControlPin,
}

impl SessionPins {
    fn open(config: &RadioConfig) -> Result<Self, RadioError> {
        Ok(Self {
            boot: ControlPin::open(&config.pin_boot)?,
            reset: ControlPin::open(&config.pin_reset)?,
        })
    }
}

/// The driver task. Construct with [`new`](Self::new), then hand the
/// returned future to the runtime via [`run`](Self::run).
pub struct FanetRadio<T, F>
where
    T: Transport,
    F: FnMut(&RadioConfig) -> Result<T, RadioError>,
{
    config: RadioConfig,
    opener: F,
    state: watch::Sender<RadioState>,
    commands: mpsc::UnboundedReceiver<RadioCommand>,
    packets: mpsc::UnboundedSender<ReceivedPacket>,
}

impl FanetRadio<SerialStream, fn(&RadioConfig) -> Result<SerialStream, RadioError>> {
    /// Driver over the real serial port described by `config`.
    pub fn serial(
        config: RadioConfig,
    ) -> (
        Self,
        RadioHandle,
        mpsc::UnboundedReceiver<ReceivedPacket>,
    ) {
        let opener: fn(&RadioConfig) -> Result<SerialStream, RadioError> = open_serial;
        Self::new(config, opener)
    }
}

impl<T, F> FanetRadio<T, F>
where
    T: Transport,
    F: FnMut(&RadioConfig) -> Result<T, RadioError>,
{
    /// Create a driver with a custom transport opener. The opener runs on
    /// every init request, so a recovery cycle reopens the device.
    pub fn new(
        config: RadioConfig,
        opener: F,
    ) -> (
        Self,
        RadioHandle,
        mpsc::UnboundedReceiver<ReceivedPacket>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RadioState::Disabled);
        let (packet_tx, packet_rx) = mpsc::unbounded_channel();
        let radio = Self {
            config,
            opener,
            state: state_tx,
            commands: cmd_rx,
            packets: packet_tx,
        };
        (radio, RadioHandle::new(cmd_tx, state_rx), packet_rx)
    }

    fn set_state(&self, state: RadioState) {
        let current = *self.state.borrow();
        if current != state {
            info!(from = %current, to = %state, "radio state changed");
            let _ = self.state.send(state);
        }
    }

    /// Drive the radio until shutdown. Sessions that fail recoverably park
    /// in their error state until the dispatcher requests another init.
    pub async fn run(mut self) {
        loop {
            match self.commands.recv().await {
                None | Some(RadioCommand::Shutdown) => return,
                Some(RadioCommand::Init) => {}
                Some(other) => {
                    debug!(?other, "ignoring command while disabled");
                    continue;
                }
            }
            loop {
                match self.session().await {
                    SessionEnd::Restart => continue,
                    SessionEnd::Shutdown => {
                        self.set_state(RadioState::Disabled);
                        return;
                    }
                    SessionEnd::Failed(state) => {
                        self.set_state(state);
                        break;
                    }
                }
            }
        }
    }

    /// One full session: open, reset, initialize, steady state.
    async fn session(&mut self) -> SessionEnd {
        let mut transport = match (self.opener)(&self.config) {
            Ok(t) => t,
            Err(e) => {
                error!(uart = %self.config.uart, error = %e, "failed to open serial port");
                return SessionEnd::Failed(e.state());
            }
        };
        let mut pins = match SessionPins::open(&self.config) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to claim radio control pins");
                return SessionEnd::Failed(RadioState::DevOpenFail);
            }
        };

        self.set_state(RadioState::Resetting);
        info!(uart = %self.config.uart, "serial port opened, resetting radio");
        if let Err(e) = pins
            .boot
            .set(&mut transport, true)
            .and_then(|()| pins.reset.set(&mut transport, false))
        {
            error!(error = %e, "failed to drive reset pins");
            return SessionEnd::Failed(RadioState::Error);
        }
        time::sleep(RESET_HOLD).await;
        if let Err(e) = pins.reset.set(&mut transport, true) {
            error!(error = %e, "failed to release reset pin");
            return SessionEnd::Failed(RadioState::Error);
        }
        self.set_state(RadioState::Initializing);

        let mut parser = FrameParser::new();

        // Boot notice: "FNR MSG,1,initialized"
        let deadline = Instant::now() + INIT_TIMEOUT;
        loop {
            match self.wait_message(&mut transport, &mut parser, deadline).await {
                WaitOutcome::Message(FanetMessage::TransmitReply(reply))
                    if reply.reply().kind() == ReplyKind::Msg
                        && reply.reply().code() == Some(MSG_CODE_INITIALIZED) =>
                {
                    break;
                }
                WaitOutcome::Message(other) => {
                    warn!(?other, "received unexpected message");
                }
                WaitOutcome::Timeout => {
                    error!("timeout initializing radio");
                    return SessionEnd::Failed(RadioState::InitTimeout);
                }
                WaitOutcome::Control(end) => return end,
            }
        }

        info!("radio found, checking firmware version");
        if let Err(e) = write_command(&mut transport, &FanetMessage::VersionCommand).await {
            error!(error = %e, "failed to write to radio");
            return SessionEnd::Failed(RadioState::Error);
        }
        let deadline = Instant::now() + COM_TIMEOUT;
        loop {
            match self.wait_message(&mut transport, &mut parser, deadline).await {
                WaitOutcome::Message(FanetMessage::VersionReply(reply)) => {
                    match reply.version() {
                        Some(version) if version == EXPECTED_FIRMWARE => {
                            info!(version, "firmware version");
                            break;
                        }
                        Some(version) => {
                            error!(
                                got = version,
                                expected = EXPECTED_FIRMWARE,
                                "wrong radio firmware version"
                            );
                            return SessionEnd::Failed(RadioState::WrongFirmware);
                        }
                        None => {
                            error!("radio firmware version check failed");
                            return SessionEnd::Failed(RadioState::WrongFirmware);
                        }
                    }
                }
                WaitOutcome::Message(other) => warn!(?other, "received unexpected message"),
                WaitOutcome::Timeout => {
                    error!("timeout waiting for version reply");
                    return SessionEnd::Failed(RadioState::InitTimeout);
                }
                WaitOutcome::Control(end) => return end,
            }
        }

        let region = RegionCommand::new(self.config.tx_power, self.config.frequency);
        info!(
            tx_power = region.tx_power(),
            frequency = %region.frequency(),
            "setting radio region"
        );
        if let Err(e) =
            write_command(&mut transport, &FanetMessage::RegionCommand(region)).await
        {
            error!(error = %e, "failed to write to radio");
            return SessionEnd::Failed(RadioState::Error);
        }
        let deadline = Instant::now() + COM_TIMEOUT;
        loop {
            match self.wait_message(&mut transport, &mut parser, deadline).await {
                WaitOutcome::Message(FanetMessage::RegionReply(reply)) => {
                    if reply.kind() == ReplyKind::Ok {
                        break;
                    }
                    error!(
                        code = ?reply.code(),
                        text = ?reply.text(),
                        "failed to set radio region"
                    );
                    return SessionEnd::Failed(RadioState::Error);
                }
                WaitOutcome::Message(other) => warn!(?other, "received unexpected message"),
                WaitOutcome::Timeout => {
                    error!("timeout waiting for region reply");
                    return SessionEnd::Failed(RadioState::InitTimeout);
                }
                WaitOutcome::Control(end) => return end,
            }
        }

        if let Err(e) = write_command(&mut transport, &FanetMessage::EnableCommand(true)).await {
            error!(error = %e, "failed to write to radio");
            return SessionEnd::Failed(RadioState::Error);
        }
        info!("radio ready");
        self.set_state(RadioState::Ready);
        self.ready_loop(&mut transport, &mut parser).await
    }

    /// Steady state: relay transmits, route inbound frames, watch the
    /// per-command reply window.
    async fn ready_loop(&mut self, transport: &mut T, parser: &mut FrameParser) -> SessionEnd {
        // the receive-enable command is still awaiting its reply
        let mut reply_deadline = Some(Instant::now() + COM_TIMEOUT);
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            while let Some(message) = parser.next() {
                // any inbound frame closes the reply window
                reply_deadline = None;
                if let Some(end) = self.handle_ready_message(message) {
                    return end;
                }
            }

            enum Event {
                Read(io::Result<usize>),
                Command(Option<RadioCommand>),
                ReplyTimeout,
            }
            let event = tokio::select! {
                result = transport.read(&mut buf) => Event::Read(result),
                command = self.commands.recv() => Event::Command(command),
                () = reply_window(reply_deadline) => Event::ReplyTimeout,
            };

            match event {
                Event::Read(Ok(0)) => {
                    error!("serial port closed");
                    return SessionEnd::Failed(RadioState::Error);
                }
                Event::Read(Ok(n)) => parser.feed(&buf[..n]),
                Event::Read(Err(e)) => {
                    error!(error = %e, "failed to read from radio");
                    return SessionEnd::Failed(RadioState::Error);
                }
                Event::Command(None | Some(RadioCommand::Shutdown)) => return SessionEnd::Shutdown,
                Event::Command(Some(RadioCommand::Init)) => {
                    info!("re-initializing radio");
                    return SessionEnd::Restart;
                }
                Event::Command(Some(RadioCommand::Transmit { address, payload })) => {
                    let command =
                        FanetMessage::TransmitCommand(TransmitCommand::new(address, payload));
                    if let Err(e) = write_command(transport, &command).await {
                        error!(error = %e, "failed to write to radio");
                        return SessionEnd::Failed(RadioState::Error);
                    }
                    reply_deadline = Some(Instant::now() + COM_TIMEOUT);
                }
                Event::Command(Some(RadioCommand::Inject(frame))) => {
                    debug!(frame, "injecting frame");
                    if let Some(message) = FanetMessage::parse(frame.as_bytes()) {
                        if let Some(end) = self.handle_ready_message(message) {
                            return end;
                        }
                    }
                }
                Event::ReplyTimeout => {
                    error!("communication with radio timed out");
                    return SessionEnd::Failed(RadioState::ComTimeout);
                }
            }
        }
    }

    /// Route one inbound message in the ready state. Returns the session
    /// end when the message is fatal.
    fn handle_ready_message(&mut self, message: FanetMessage) -> Option<SessionEnd> {
        match message {
            FanetMessage::ReceiveEvent(event) => {
                if event.is_valid() {
                    if let Some(line) = event.describe() {
                        info!("{line}");
                    }
                    let _ = self.packets.send(ReceivedPacket {
                        address: event.address(),
                        payload: event.payload().clone(),
                        broadcast: event.broadcast(),
                    });
                } else {
                    warn!("dropping invalid receive event");
                }
                None
            }
            FanetMessage::TransmitReply(reply) => {
                let generic = reply.reply();
                match generic.kind() {
                    ReplyKind::Ok => debug!("fanet command reply: ok"),
                    ReplyKind::Msg => {
                        info!(code = ?generic.code(), text = ?generic.text(), "fanet command reply")
                    }
                    ReplyKind::Ack => debug!(address = ?reply.address(), "fanet command: ack"),
                    ReplyKind::Nack => debug!(address = ?reply.address(), "fanet command: nack"),
                    ReplyKind::Error => {
                        error!(
                            code = ?generic.code(),
                            text = ?generic.text(),
                            "fanet command failed"
                        );
                        return Some(SessionEnd::Failed(RadioState::Error));
                    }
                    ReplyKind::Other => error!("unknown reply"),
                }
                None
            }
            other => {
                debug!(?other, "ignored unexpected fanet message");
                None
            }
        }
    }

    /// Wait for the next decodable frame, a control command, or the
    /// deadline, whichever comes first.
    async fn wait_message(
        &mut self,
        transport: &mut T,
        parser: &mut FrameParser,
        deadline: Instant,
    ) -> WaitOutcome {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            if let Some(message) = parser.next() {
                return WaitOutcome::Message(message);
            }

            enum Event {
                Read(io::Result<usize>),
                Command(Option<RadioCommand>),
                Timeout,
            }
            let event = tokio::select! {
                result = transport.read(&mut buf) => Event::Read(result),
                command = self.commands.recv() => Event::Command(command),
                () = time::sleep_until(deadline) => Event::Timeout,
            };

            match event {
                Event::Read(Ok(0)) => {
                    error!("serial port closed");
                    return WaitOutcome::Control(SessionEnd::Failed(RadioState::Error));
                }
                Event::Read(Ok(n)) => parser.feed(&buf[..n]),
                Event::Read(Err(e)) => {
                    error!(error = %e, "failed to read from radio");
                    return WaitOutcome::Control(SessionEnd::Failed(RadioState::Error));
                }
                Event::Command(None | Some(RadioCommand::Shutdown)) => {
                    return WaitOutcome::Control(SessionEnd::Shutdown)
                }
                Event::Command(Some(RadioCommand::Init)) => {
                    return WaitOutcome::Control(SessionEnd::Restart)
                }
                Event::Command(Some(RadioCommand::Transmit { payload, .. })) => {
                    warn!(
                        payload_type = %payload.payload_type(),
                        "radio is still initializing, dropping transmit request"
                    );
                }
                Event::Command(Some(RadioCommand::Inject(frame))) => {
                    if let Some(message) = FanetMessage::parse(frame.as_bytes()) {
                        return WaitOutcome::Message(message);
                    }
                }
                Event::Timeout => return WaitOutcome::Timeout,
            }
        }
    }

}

/// Frame a command and write it out. Short writes surface as errors
/// through `write_all`.
async fn write_command<T: Transport>(
    transport: &mut T,
    message: &FanetMessage,
) -> Result<(), RadioError> {
    let Some(body) = message.serialize() else {
        warn!(?message, "refusing to send unserializable message");
        return Ok(());
    };
    debug!(command = %body, "sending message");
    let mut frame = Vec::with_capacity(body.len() + 2);
    frame.push(START_DELIMITER);
    frame.extend_from_slice(body.as_bytes());
    frame.push(END_DELIMITER);
    transport.write_all(&frame).await?;
    transport.flush().await?;
    Ok(())
}

/// Pending future until the reply window closes; never resolves while no
/// command is in flight.
async fn reply_window(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
