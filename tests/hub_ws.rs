//! End-to-end hub test over a real WebSocket connection

use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use mixer_gw::hub::{build_router, ClientRegistry, HubState};
use mixer_gw::mixer::{DeviceModel, MixerEvent};
use mixer_gw::session::{SessionCommand, SessionHandle};
use mixer_gw::state::MixerStore;

struct TestHub {
    url: String,
    store: MixerStore,
    events: broadcast::Sender<String>,
    clients: ClientRegistry,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

async fn start_hub() -> TestHub {
    let mut store = MixerStore::new();
    store.apply(&MixerEvent::DeviceIdentified(DeviceModel::XR18));
    store.apply(&MixerEvent::ChannelConfigSet {
        channel: 1,
        name: "Vox".into(),
        color: 2,
    });

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(16);
    let clients = ClientRegistry::new();
    let state = Arc::new(HubState {
        reader: store.reader(),
        session: SessionHandle::new(cmd_tx),
        events: events.clone(),
        clients: clients.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state, None)).await.unwrap();
    });

    TestHub {
        url: format!("ws://{}/ws", addr),
        store,
        events,
        clients,
        cmd_rx,
    }
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_initial_snapshot_on_connect() {
    let hub = start_hub().await;
    let (mut ws, _) = connect_async(hub.url.as_str()).await.unwrap();

    let json = next_json(&mut ws).await;
    assert_eq!(json["event"], "mixerState");
    assert_eq!(json["data"]["model"], "XR18");
    assert_eq!(json["data"]["channels"]["1"]["name"], "Vox");
    assert_eq!(json["data"]["channels"]["1"]["color"], 2);
    assert_eq!(json["data"]["buses"].as_object().unwrap().len(), 6);
    assert_eq!(hub.clients.count(), 1);
}

#[tokio::test]
async fn test_client_commands_reach_session() {
    let mut hub = start_hub().await;
    let (mut ws, _) = connect_async(hub.url.as_str()).await.unwrap();
    next_json(&mut ws).await;

    ws.send(Message::Text(
        r#"{"event":"getBusVolumes","data":2}"#.into(),
    ))
    .await
    .unwrap();
    // Malformed frames are dropped without closing the connection
    ws.send(Message::Text("{nonsense".into())).await.unwrap();
    ws.send(Message::Text(
        r#"{"event":"updateBusVolume","data":{"bus":2,"channel":4,"volume":0.5}}"#.into(),
    ))
    .await
    .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), hub.cmd_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, SessionCommand::RequestBusLevels { bus: 2 }));

    let second = tokio::time::timeout(Duration::from_secs(5), hub.cmd_rx.recv())
        .await
        .unwrap()
        .unwrap();
    match second {
        SessionCommand::UpdateVolume {
            bus,
            channel,
            volume,
        } => {
            assert_eq!((bus, channel), (2, 4));
            assert_eq!(volume, 0.5);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[tokio::test]
async fn test_broadcasts_forwarded_to_every_client() {
    let mut hub = start_hub().await;
    let (mut a, _) = connect_async(hub.url.as_str()).await.unwrap();
    let (mut b, _) = connect_async(hub.url.as_str()).await.unwrap();
    next_json(&mut a).await;
    next_json(&mut b).await;

    hub.store.apply(&MixerEvent::ChannelBusLevelSet {
        channel: 3,
        bus: 1,
        level: 0.74999,
    });
    let snapshot = mixer_gw::hub::ServerEvent::MixerState(&hub.store.snapshot())
        .to_json()
        .unwrap();
    hub.events.send(snapshot).unwrap();

    for ws in [&mut a, &mut b] {
        let json = next_json(ws).await;
        assert_eq!(json["event"], "mixerState");
        assert_eq!(json["data"]["buses"]["1"]["channels"]["3"]["level"], 0.75);
    }

    drop(a);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hub.clients.count(), 1);
}
