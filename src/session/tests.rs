//! Tests for the session task, driven through a recording sink on paused time

use super::*;
use crate::hub::ClientRegistry;
use crate::mixer::LevelScale;
use crate::state::StateReader;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rosc::{OscMessage, OscType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<OscMessage>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<OscMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn addrs(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.addr.clone()).collect()
    }
}

#[async_trait]
impl OscSink for RecordingSink {
    async fn send(&self, msg: OscMessage) -> Result<()> {
        self.sent.lock().push(msg);
        Ok(())
    }
}

struct Harness {
    sink: Arc<RecordingSink>,
    inbound_tx: mpsc::Sender<OscMessage>,
    notify_rx: mpsc::UnboundedReceiver<Notification>,
    clients: ClientRegistry,
    handle: SessionHandle,
    reader: StateReader,
    task: JoinHandle<Result<(), SessionError>>,
}

impl Harness {
    async fn start() -> Self {
        let sink = Arc::new(RecordingSink::default());
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let clients = ClientRegistry::new();

        let (session, handle) = MixerSession::new(
            sink.clone(),
            inbound_rx,
            notify_tx,
            clients.clone(),
            LevelScale::Unit,
            SessionTimings::default(),
        );
        let reader = session.reader();
        let task = tokio::spawn(session.run());
        settle().await;

        Self {
            sink,
            inbound_tx,
            notify_rx,
            clients,
            handle,
            reader,
            task,
        }
    }

    async fn reply(&self, addr: &str, args: Vec<OscType>) {
        self.inbound_tx
            .send(OscMessage {
                addr: addr.to_string(),
                args,
            })
            .await
            .unwrap();
        settle().await;
    }

    async fn identify(&self, model: &str) {
        self.reply(
            "/info",
            vec![
                OscType::String("V0.04".into()),
                OscType::String(format!("{}-1A-2B-3C", model)),
                OscType::String(model.into()),
                OscType::String("1.17".into()),
            ],
        )
        .await;
    }

    async fn identify_xr18(&self) {
        self.identify("XR18").await;
    }

    /// Identify as XR18 and let the initial burst finish
    async fn steady_xr18(&self) {
        self.identify_xr18().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(self.handle.phase().await, Some(SessionPhase::Steady));
        self.sink.take();
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_info_requested_on_start() {
    let h = Harness::start().await;
    assert_eq!(h.sink.addrs(), vec!["/info"]);
    assert_eq!(h.handle.phase().await, Some(SessionPhase::AwaitingInfo));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_requests_for_xr18() {
    let h = Harness::start().await;
    h.sink.take();
    h.identify_xr18().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let addrs = h.sink.addrs();
    // 16 x (config + on), 6 buses x 16 levels, 6 bus configs
    assert_eq!(addrs.len(), 32 + 96 + 6);
    assert_eq!(addrs[0], "/ch/01/config");
    assert_eq!(addrs[1], "/ch/01/mix/on");
    assert_eq!(addrs[30], "/ch/16/config");
    assert_eq!(addrs[32], "/ch/01/mix/01/level");
    assert_eq!(addrs[127], "/ch/16/mix/06/level");
    assert_eq!(addrs[128], "/bus/1/config");
    assert_eq!(addrs[133], "/bus/6/config");

    assert_eq!(h.handle.phase().await, Some(SessionPhase::Steady));
}

#[tokio::test(start_paused = true)]
async fn test_replies_update_state_and_notify() {
    let mut h = Harness::start().await;
    h.identify_xr18().await;
    assert!(matches!(
        h.notify_rx.try_recv(),
        Ok(Notification::StateChanged)
    ));

    h.reply(
        "/ch/02/config",
        vec![
            OscType::String("Guitar".into()),
            OscType::Int(3),
            OscType::String("OFF".into()),
        ],
    )
    .await;
    assert!(matches!(
        h.notify_rx.try_recv(),
        Ok(Notification::StateChanged)
    ));

    // Same value again is not a change
    h.reply(
        "/ch/02/config",
        vec![OscType::String("Guitar".into()), OscType::Int(3)],
    )
    .await;
    assert!(h.notify_rx.try_recv().is_err());

    let mut blob = 40u32.to_le_bytes().to_vec();
    blob.extend(std::iter::repeat(0u8).take(80));
    h.reply("/meters/1", vec![OscType::Blob(blob)]).await;
    match h.notify_rx.try_recv() {
        Ok(Notification::Meters(frame)) => assert_eq!(frame.len(), 40),
        other => panic!("expected meters, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_identification_timeout() {
    let h = Harness::start().await;
    let result = h.task.await.unwrap();
    assert!(matches!(result, Err(SessionError::DeviceNotFound { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_volume_changes_coalesce() {
    let h = Harness::start().await;
    h.steady_xr18().await;

    h.handle.update_volume(1, 1, 0.1);
    h.handle.update_volume(1, 1, 0.2);
    h.handle.update_volume(1, 1, 0.3);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let sent = h.sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].addr, "/ch/01/mix/01/level");
    assert_eq!(sent[0].args, vec![OscType::Float(0.3)]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_volume_changes() {
    let h = Harness::start().await;
    h.steady_xr18().await;

    // XR18 has six buses
    h.handle.update_volume(7, 1, 0.5);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(h.sink.take().is_empty());

    h.handle.update_volume(2, 3, 1.5);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let sent = h.sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].args, vec![OscType::Float(1.0)]);
}

#[tokio::test(start_paused = true)]
async fn test_request_bus_levels() {
    let h = Harness::start().await;
    h.steady_xr18().await;

    h.handle.request_bus_levels(2);
    settle().await;
    let addrs = h.sink.addrs();
    assert_eq!(addrs.len(), 16);
    assert!(addrs.iter().all(|a| a.ends_with("/mix/02/level")));

    h.sink.take();
    h.handle.request_bus_levels(9);
    settle().await;
    assert!(h.sink.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_meters_subscribed_only_with_clients() {
    let h = Harness::start().await;
    h.steady_xr18().await;

    // First refresh tick at 10 s with nobody connected
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(!h.sink.addrs().iter().any(|a| a == "/meters"));

    let _guard = h.clients.connect();
    h.handle.request_bus_levels(3);
    settle().await;
    h.sink.take();
    tokio::time::sleep(Duration::from_secs(12)).await;

    let addrs = h.sink.addrs();
    assert!(addrs.iter().any(|a| a == "/meters"));
    // Viewed bus levels and channel refresh ride along
    assert!(addrs.iter().any(|a| a == "/ch/01/mix/03/level"));
    assert!(addrs.iter().any(|a| a == "/ch/16/config"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_session() {
    let h = Harness::start().await;
    h.handle.shutdown();
    assert!(h.task.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_requests_for_x32() {
    let h = Harness::start().await;
    h.sink.take();
    h.identify("X32").await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.handle.phase().await, Some(SessionPhase::Steady));

    let addrs = h.sink.addrs();
    // 32 x (name + color + on), 8 buses x 32 levels, 8 x (name + color)
    assert_eq!(addrs.len(), 96 + 256 + 16);
    assert_eq!(addrs[0], "/ch/01/config/name");
    assert_eq!(addrs[1], "/ch/01/config/color");
    assert_eq!(addrs[2], "/ch/01/mix/on");
    assert_eq!(addrs[93], "/ch/32/config/name");
    assert_eq!(addrs[96], "/ch/01/mix/01/level");
    assert_eq!(addrs[351], "/ch/32/mix/08/level");
    assert_eq!(addrs[352], "/bus/01/config/name");
    assert_eq!(addrs[353], "/bus/01/config/color");
    assert_eq!(addrs[367], "/bus/08/config/color");
    assert!(!addrs.iter().any(|a| a.ends_with("/config")));
}

#[tokio::test(start_paused = true)]
async fn test_x32_replies_normalize_colors() {
    let h = Harness::start().await;
    h.identify("X32").await;

    h.reply("/ch/05/config/name", vec![OscType::String("Keys".into())])
        .await;
    h.reply("/ch/05/config/color", vec![OscType::Int(3)]).await;
    h.reply("/bus/02/config/name", vec![OscType::String("Wedges".into())])
        .await;
    h.reply("/bus/02/config/color", vec![OscType::Int(12)]).await;
    // Outside the X32's 32 channels
    h.reply("/ch/33/config/name", vec![OscType::String("x".into())])
        .await;

    let snapshot = h.reader.snapshot();
    assert_eq!(snapshot.channels[&5].name.as_deref(), Some("Keys"));
    assert_eq!(snapshot.channels[&5].color, Some(11));
    assert_eq!(snapshot.buses[&2].name.as_deref(), Some("Wedges"));
    assert_eq!(snapshot.buses[&2].color, Some(4));
    assert!(!snapshot.channels.contains_key(&33));
    assert_eq!(snapshot.buses.len(), 8);
}

fn bus_config_count(addrs: &[String]) -> usize {
    addrs.iter().filter(|a| a.starts_with("/bus/")).count()
}

#[tokio::test(start_paused = true)]
async fn test_bus_names_refresh_every_125s() {
    let h = Harness::start().await;
    let _guard = h.clients.connect();
    h.steady_xr18().await;

    tokio::time::sleep(Duration::from_secs(119)).await;
    h.sink.take();
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(bus_config_count(&h.sink.addrs()), 6);

    // At 250 s the bus-name tick coincides with the 10 s refresh tick
    tokio::time::sleep(Duration::from_secs(116)).await;
    h.sink.take();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let addrs = h.sink.addrs();
    assert_eq!(bus_config_count(&addrs), 6);
    assert!(addrs.iter().any(|a| a == "/ch/16/config"));
}
