//! Session lifecycle against a simulated controller on localhost.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use parking_lot::Mutex;

use setu::endpoint::Endpoint;
use setu::protocol::FrameSplitter;
use setu::shared::StopSignal;
use setu::video::{Frame, FrameSource, FrameSourceOpener, Interrupt};
use setu::{Command, Pose, Session, SessionState, SetuConfig, SetuError};

const SUBSCRIPTION: &str = "chassis push position on pfreq 20 attitude on afreq 20";
const LED_RESET: &str = "led control comp bottom_all r 255 g 255 b 255 effect solid";

#[derive(Clone, Copy)]
enum Behaviour {
    /// Acknowledge every command with `ok`
    AckAll,
    /// Read the handshake command, then hang up without answering
    HangUpOnHandshake,
    /// Acknowledge the handshake, then hang up
    AckThenHangUp,
}

/// One-connection controller that records every command it receives.
struct SimController {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl SimController {
    fn spawn(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut splitter = FrameSplitter::new();
            let mut buffer = [0u8; 1024];
            loop {
                let len = match stream.read(&mut buffer) {
                    Ok(0) | Err(_) => return,
                    Ok(len) => len,
                };
                for frame in splitter.push(&buffer[..len]) {
                    log.lock().push(frame);
                    match behaviour {
                        Behaviour::AckAll => {
                            let _ = stream.write_all(b"ok;");
                        }
                        Behaviour::HangUpOnHandshake => return,
                        Behaviour::AckThenHangUp => {
                            let _ = stream.write_all(b"ok;");
                            return;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            received,
            handle,
        }
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    fn count(&self, frame: &str) -> usize {
        self.received.lock().iter().filter(|f| *f == frame).count()
    }
}

struct NoVideo;

impl FrameSourceOpener for NoVideo {
    fn open(&self, _endpoint: &Endpoint) -> setu::Result<Box<dyn FrameSource>> {
        Err(SetuError::Video("no video in this test".into()))
    }
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("0.0.0.0:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn config_for(controller: &SimController) -> SetuConfig {
    let mut config = SetuConfig::default();
    config.connection.robot_ip = Some("127.0.0.1".into());
    config.connection.control_port = controller.addr.port();
    config.connection.push_port = free_udp_port();
    config.connection.handshake_timeout_ms = 2000;
    config.video.enabled = false;
    config.video.startup_delay_ms = 0;
    config.session.poll_interval_ms = 20;
    config.session.join_timeout_ms = 2000;
    config
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_controller_hangs_up_during_handshake() {
    let controller = SimController::spawn(Behaviour::HangUpOnHandshake);
    let session = Session::new(config_for(&controller), Arc::new(NoVideo));

    let started = Instant::now();
    let result = session.open(None);
    assert!(matches!(result, Err(SetuError::Socket(_))), "{:?}", result);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(started.elapsed() < Duration::from_secs(5));

    controller.handle.join().unwrap();
    assert_eq!(controller.received.lock().clone(), vec!["command"]);

    // Closed is terminal
    assert!(matches!(session.open(None), Err(SetuError::SessionClosed)));
    assert!(matches!(
        session.send(&Command::from_line("quit")),
        Err(SetuError::NotOpen)
    ));
}

#[test]
fn test_controller_hangs_up_after_handshake() {
    let controller = SimController::spawn(Behaviour::AckThenHangUp);
    let session = Session::new(config_for(&controller), Arc::new(NoVideo));

    let started = Instant::now();
    let result = session.open(None);
    assert!(matches!(result, Err(SetuError::Socket(_))), "{:?}", result);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(started.elapsed() < Duration::from_secs(5));

    controller.handle.join().unwrap();
    assert_eq!(controller.received.lock().clone().first().map(String::as_str), Some("command"));
}

#[test]
fn test_invalid_config_starts_no_workers() {
    let controller = SimController::spawn(Behaviour::AckAll);
    let mut config = config_for(&controller);
    config.session.poll_interval_ms = 0;
    let session = Session::new(config, Arc::new(NoVideo));

    let started = Instant::now();
    assert!(matches!(session.open(None), Err(SetuError::Config(_))));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(controller.received().is_empty());
}

#[test]
fn test_open_send_close() {
    let controller = SimController::spawn(Behaviour::AckAll);
    let session = Session::new(config_for(&controller), Arc::new(NoVideo));

    assert!(matches!(
        session.send(&Command::from_line("stream on")),
        Err(SetuError::NotOpen)
    ));

    session.open(None).unwrap();
    assert_eq!(session.state(), SessionState::Open);
    assert!(matches!(session.open(None), Err(SetuError::AlreadyOpen)));
    assert_eq!(
        session.endpoint().map(|e| e.control_addr()),
        Some(controller.addr)
    );

    assert!(wait_until(Duration::from_secs(2), || {
        controller.count(SUBSCRIPTION) == 1 && controller.count(LED_RESET) == 1
    }));

    session.chassis().move_by(0.0, 0.1, false, None).unwrap();
    let ack = session
        .send_and_wait(&Command::from_line("robotic_arm recenter"), Duration::from_secs(2))
        .unwrap();
    assert_eq!(ack, "ok");

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    session.close();

    controller.handle.join().unwrap();
    let received = controller.received.lock().clone();
    assert_eq!(received.first().map(String::as_str), Some("command"));
    assert!(received.contains(&"chassis move x 0.1 y 0 vxy 0.3".to_string()));
    assert!(received.contains(&"robotic_arm recenter".to_string()));
    assert_eq!(received[received.len() - 2..], ["stream off", "quit"]);
}

#[test]
fn test_position_then_attitude_updates_pose() {
    let controller = SimController::spawn(Behaviour::AckAll);
    let config = config_for(&controller);
    let push_port = config.connection.push_port;
    let session = Session::new(config, Arc::new(NoVideo));
    session.open(None).unwrap();
    assert_eq!(session.pose(), Pose::default());

    let robot = UdpSocket::bind("127.0.0.1:0").unwrap();
    robot.connect(("127.0.0.1", push_port)).unwrap();
    robot.send(b"chassis push position 1.0 2.0 0.0 ;").unwrap();
    robot.send(b"chassis push attitude 0 0 45.0 ;").unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        session.pose() == Pose::new(1.0, 2.0, 45.0)
    }));

    session.close();
    controller.handle.join().unwrap();
}

#[test]
fn test_concurrent_sends_do_not_interleave() {
    const ROUNDS: usize = 100;
    let first = "chassis move x 0.25 y -0.125 vxy 0.3";
    let second = "robotic_arm moveto x 210 y 44";

    let controller = SimController::spawn(Behaviour::AckAll);
    let session = Session::new(config_for(&controller), Arc::new(NoVideo));
    session.open(None).unwrap();

    std::thread::scope(|scope| {
        for line in [first, second] {
            let session = &session;
            scope.spawn(move || {
                let command = Command::from_line(line);
                for _ in 0..ROUNDS {
                    session.send(&command).unwrap();
                }
            });
        }
    });

    assert!(wait_until(Duration::from_secs(5), || {
        controller.count(first) == ROUNDS && controller.count(second) == ROUNDS
    }));

    let known = ["command", SUBSCRIPTION, LED_RESET, first, second];
    let unexpected: Vec<String> = controller
        .received()
        .into_iter()
        .filter(|frame| !known.contains(&frame.as_str()))
        .collect();
    assert!(unexpected.is_empty(), "garbled frames: {:?}", unexpected);

    session.close();
    controller.handle.join().unwrap();
}

/// Produces a small frame every 10 ms until interrupted.
struct TickingSource {
    seq: u64,
    stopped: Arc<StopSignal>,
}

struct StopInterrupt(Arc<StopSignal>);

impl Interrupt for StopInterrupt {
    fn interrupt(&self) {
        self.0.stop();
    }
}

impl FrameSource for TickingSource {
    fn read_frame(&mut self) -> setu::Result<Option<Frame>> {
        if !self.stopped.sleep(Duration::from_millis(10)) {
            return Ok(None);
        }
        self.seq += 1;
        Ok(Some(Frame::new(self.seq, RgbImage::new(8, 6))))
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        Arc::new(StopInterrupt(Arc::clone(&self.stopped)))
    }
}

struct TickingOpener;

impl FrameSourceOpener for TickingOpener {
    fn open(&self, _endpoint: &Endpoint) -> setu::Result<Box<dyn FrameSource>> {
        Ok(Box::new(TickingSource {
            seq: 0,
            stopped: Arc::new(StopSignal::new()),
        }))
    }
}

#[test]
fn test_video_frames_and_prompt_close() {
    let controller = SimController::spawn(Behaviour::AckAll);
    let mut config = config_for(&controller);
    config.video.enabled = true;
    let session = Session::new(config, Arc::new(TickingOpener));
    session.open(None).unwrap();

    let frame = session
        .wait_for_frame(Duration::from_secs(2))
        .expect("no frame");
    assert_eq!((frame.width(), frame.height()), (8, 6));

    assert!(wait_until(Duration::from_secs(2), || session.has_new_frame()));
    assert!(session.take_fresh_frame().is_some());
    assert!(session.latest_frame().is_some());
    assert!(wait_until(Duration::from_secs(2), || controller.count("stream on") == 1));

    let started = Instant::now();
    session.close();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.state(), SessionState::Closed);

    controller.handle.join().unwrap();
}
