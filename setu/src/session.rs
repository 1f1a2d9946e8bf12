//! Robot session: one control connection plus its channel workers.
//!
//! A session moves through `Disconnected -> Connecting -> Open -> Closing ->
//! Closed`. A closed session stays closed; reconnecting means building a new
//! one. Every method takes `&self`, so a session can be shared between the
//! thread that drives motion and the threads that watch frames or pose.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::Mutex;

use crate::client::{CommandSink, ControlClient};
use crate::config::SetuConfig;
use crate::discovery;
use crate::endpoint::Endpoint;
use crate::error::{Result, SetuError};
use crate::motion::{Actuators, Chassis};
use crate::protocol::{Command, commands};
use crate::shared::{FrameSlot, Pose, SharedPose, StopSignal};
use crate::threads::{
    ControlReader, InterruptSlot, TelemetryWorker, VideoWorker, Worker, join_all,
};
use crate::video::{FfmpegOpener, Frame, FrameSourceOpener};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection to one robot controller.
pub struct Session {
    config: SetuConfig,
    opener: Arc<dyn FrameSourceOpener>,
    state: Mutex<SessionState>,
    endpoint: Mutex<Option<Endpoint>>,
    client: Mutex<Option<Arc<ControlClient>>>,
    acks: Mutex<Option<Receiver<String>>>,
    /// Serialises `send_and_wait` callers so each sees its own reply
    ack_waiter: Mutex<()>,
    pose: Arc<SharedPose>,
    frames: Arc<FrameSlot>,
    stop: Arc<StopSignal>,
    video_interrupt: InterruptSlot,
    workers: Mutex<Vec<Worker>>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: SetuConfig, opener: Arc<dyn FrameSourceOpener>) -> Self {
        Self {
            config,
            opener,
            state: Mutex::new(SessionState::Disconnected),
            endpoint: Mutex::new(None),
            client: Mutex::new(None),
            acks: Mutex::new(None),
            ack_waiter: Mutex::new(()),
            pose: Arc::new(SharedPose::new()),
            frames: Arc::new(FrameSlot::new()),
            stop: Arc::new(StopSignal::new()),
            video_interrupt: Arc::new(Mutex::new(None)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Create a session with the ffmpeg decoder and open it using the
    /// configured robot IP, or discovery when none is set.
    pub fn connect(config: SetuConfig) -> Result<Self> {
        let opener = Arc::new(FfmpegOpener::from_config(&config.video));
        let session = Self::new(config, opener);
        session.open(None)?;
        Ok(session)
    }

    /// Open the session.
    ///
    /// Uses `endpoint` if given, else the configured robot IP, else waits for
    /// a discovery broadcast. On failure everything started so far is torn
    /// down, the session ends `Closed` and the original error is returned.
    pub fn open(&self, endpoint: Option<Endpoint>) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Disconnected => *state = SessionState::Connecting,
                SessionState::Connecting | SessionState::Open => {
                    return Err(SetuError::AlreadyOpen);
                }
                SessionState::Closing | SessionState::Closed => {
                    return Err(SetuError::SessionClosed);
                }
            }
        }

        if let Err(e) = self.establish(endpoint) {
            tracing::error!("Failed to open session: {}", e);
            self.close();
            return Err(e);
        }

        let mut state = self.state.lock();
        if *state != SessionState::Connecting {
            // close() ran while we were connecting
            drop(state);
            self.teardown();
            *self.state.lock() = SessionState::Closed;
            return Err(SetuError::SessionClosed);
        }
        *state = SessionState::Open;
        drop(state);

        if let Some(endpoint) = self.endpoint() {
            tracing::info!("Session open to {}", endpoint);
        }
        Ok(())
    }

    fn establish(&self, endpoint: Option<Endpoint>) -> Result<()> {
        self.config.validate()?;

        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => match self.config.endpoint()? {
                Some(endpoint) => endpoint,
                None => {
                    tracing::info!("No robot IP configured, waiting for discovery broadcast");
                    discovery::discover(self.config.ports(), self.config.discovery_timeout())?
                }
            },
        };
        *self.endpoint.lock() = Some(endpoint);

        tracing::info!("Connecting to {}", endpoint.control_addr());
        let client = Arc::new(ControlClient::connect_timeout(
            endpoint.control_addr(),
            self.config.connect_timeout(),
        )?);
        *self.client.lock() = Some(Arc::clone(&client));

        client.handshake(self.config.handshake_timeout())?;

        let telemetry_socket = UdpSocket::bind(SocketAddr::new(
            Ipv4Addr::UNSPECIFIED.into(),
            endpoint.ports().push,
        ))?;

        let poll_interval = self.config.poll_interval();
        let (ack_tx, ack_rx) = bounded(self.config.session.ack_queue_depth.max(1));
        *self.acks.lock() = Some(ack_rx.clone());

        let mut reader = ControlReader::new(
            client.reader()?,
            Arc::clone(&self.stop),
            ack_tx,
            poll_interval,
        );
        self.spawn_worker("control-reader", move || reader.run())?;

        let mut telemetry = TelemetryWorker::new(
            telemetry_socket,
            Some(endpoint.ip()),
            Arc::clone(&self.pose),
            Arc::clone(&self.stop),
            client.clone(),
            commands::subscribe_chassis(
                self.config.telemetry.position_freq,
                self.config.telemetry.attitude_freq,
            ),
            poll_interval,
        );
        self.spawn_worker("telemetry", move || telemetry.run())?;

        if self.config.video.enabled {
            let mut video = VideoWorker::new(
                endpoint,
                client.clone(),
                Arc::clone(&self.opener),
                Arc::clone(&self.frames),
                Arc::clone(&self.stop),
                Arc::clone(&self.video_interrupt),
                Duration::from_millis(self.config.video.startup_delay_ms),
            );
            self.spawn_worker("video", move || video.run())?;
        } else {
            tracing::info!("Video disabled");
        }

        // The controller must still answer after the handshake
        exchange(&client, &ack_rx, &commands::led_reset(), self.config.handshake_timeout())?;
        Ok(())
    }

    fn spawn_worker<F>(&self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let worker = Worker::spawn(name, body)?;
        self.workers.lock().push(worker);
        Ok(())
    }

    /// Send one command. Concurrent callers never interleave on the wire.
    pub fn send(&self, command: &Command) -> Result<()> {
        self.open_client()?.send(command)
    }

    /// Send a command and wait for the controller's next acknowledgement.
    ///
    /// Acknowledgements already queued are discarded first. Replies are not
    /// correlated beyond arrival order.
    pub fn send_and_wait(&self, command: &Command, timeout: Duration) -> Result<String> {
        let client = self.open_client()?;
        let _waiter = self.ack_waiter.lock();
        let acks = self.acks.lock().clone().ok_or(SetuError::NotOpen)?;
        exchange(&client, &acks, command, timeout)
    }

    fn open_client(&self) -> Result<Arc<ControlClient>> {
        if *self.state.lock() != SessionState::Open {
            return Err(SetuError::NotOpen);
        }
        self.client.lock().clone().ok_or(SetuError::NotOpen)
    }

    /// Close the session. Idempotent; never fails and never blocks past the
    /// configured join timeout.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Closing | SessionState::Closed => return,
                SessionState::Disconnected => {
                    *state = SessionState::Closed;
                    return;
                }
                SessionState::Connecting | SessionState::Open => {
                    *state = SessionState::Closing;
                }
            }
        }

        tracing::info!("Closing session");
        self.teardown();
        *self.state.lock() = SessionState::Closed;
        tracing::info!("Session closed");
    }

    /// Release everything `establish` may have started. Each step is
    /// attempted regardless of earlier failures.
    fn teardown(&self) {
        let client = self.client.lock().take();

        if let Some(client) = &client {
            if let Err(e) = client.send(&commands::stream_off()) {
                tracing::debug!("stream off not sent: {}", e);
            }
            if let Err(e) = client.send(&commands::quit()) {
                tracing::debug!("quit not sent: {}", e);
            }
        }

        self.stop.stop();

        if let Some(interrupter) = self.video_interrupt.lock().clone() {
            interrupter.interrupt();
        }

        if let Some(client) = &client
            && let Err(e) = client.shutdown()
        {
            tracing::debug!("Control socket shutdown: {}", e);
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        let stuck = join_all(workers, self.config.join_timeout());
        if stuck > 0 {
            tracing::error!("{} worker(s) still running after close", stuck);
        }

        self.acks.lock().take();
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Resolved controller endpoint, once known.
    pub fn endpoint(&self) -> Option<Endpoint> {
        *self.endpoint.lock()
    }

    pub fn config(&self) -> &SetuConfig {
        &self.config
    }

    /// Latest pose from telemetry. Zero until the first push arrives.
    pub fn pose(&self) -> Pose {
        self.pose.get()
    }

    /// Latest decoded frame, fresh or not.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.latest()
    }

    /// Latest frame if it has not been taken before; clears freshness.
    pub fn take_fresh_frame(&self) -> Option<Arc<Frame>> {
        self.frames.take_fresh()
    }

    /// Block until a fresh frame arrives or `timeout` elapses.
    pub fn wait_for_frame(&self, timeout: Duration) -> Option<Arc<Frame>> {
        self.frames.wait_fresh(timeout)
    }

    pub fn has_new_frame(&self) -> bool {
        self.frames.has_fresh()
    }

    /// Motion primitives driven through this session.
    pub fn chassis(&self) -> Chassis<'_> {
        Chassis::new(self, &self.config.motion)
    }

    /// Arm, gripper, LED and camera primitives driven through this session.
    pub fn actuators(&self) -> Actuators<'_> {
        Actuators::new(self, &self.config.motion)
    }
}

/// Send `command` and return the next acknowledgement, discarding any that
/// were already queued.
fn exchange(
    client: &ControlClient,
    acks: &Receiver<String>,
    command: &Command,
    timeout: Duration,
) -> Result<String> {
    let stale = acks.try_iter().count();
    if stale > 0 {
        tracing::trace!("Discarded {} stale acknowledgements", stale);
    }

    client.send(command)?;

    match acks.recv_timeout(timeout) {
        Ok(ack) => Ok(ack),
        Err(RecvTimeoutError::Timeout) => Err(SetuError::AckTimeout),
        Err(RecvTimeoutError::Disconnected) => Err(SetuError::Socket(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "control connection closed",
        ))),
    }
}

impl CommandSink for Session {
    fn send(&self, command: &Command) -> Result<()> {
        Session::send(self, command)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
