//! # Transport Tests: UDP, HTTP and WebSocket against a live server
//!
//! Every test binds ephemeral ports on 127.0.0.1.

use futures_util::{SinkExt, StreamExt};
use oscquery::codec::{decode, encode, encode_packet, OscArg, OscBundle, OscMessage, OscPacket, TimeTag};
use oscquery::{
    MemoryComponent, MemoryObject, OscQueryServer, ServerBuilder, ServerConfig, ServerHandle, ServiceAdvertiser,
    Value, ValueType,
};
use serde_json::Value as Json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio_tungstenite::tungstenite::Message;

const INTENSITY: &str = "/Root/Light/intensity";
const LABEL: &str = "/Root/Light/label";
const WAIT: Duration = Duration::from_secs(3);

fn config(feedback_interval_ms: u64) -> ServerConfig {
    ServerConfig {
        name: "TestRig".into(),
        host: "127.0.0.1".into(),
        osc_port: 0,
        http_port: 0,
        feedback_interval_ms,
        ..ServerConfig::default()
    }
}

fn scene() -> (Arc<MemoryObject>, Arc<MemoryComponent>) {
    let scene = MemoryObject::new("Scene");
    let root = MemoryObject::new("Root");
    let light = root.add_component(
        MemoryComponent::new("Light")
            .ranged("intensity", 1.0, 0.0, 8.0)
            .enum_field("type", &["Spot", "Point"], "Point")
            .field("label", ValueType::String, Value::String(String::new())),
    );
    scene.add_child(root);
    (scene, light)
}

async fn start(config: ServerConfig) -> (ServerHandle, Arc<MemoryObject>, Arc<MemoryComponent>) {
    let (scene, light) = scene();
    let builder = ServerBuilder::new().with_config(config).with_root(Arc::clone(&scene) as _);
    let handle = OscQueryServer::from_builder(builder).start().await.unwrap();
    (handle, scene, light)
}

/// Polls `check` until it holds or the deadline passes.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Next binary frame, skipping anything else.
async fn next_binary<S>(ws: &mut S) -> Vec<u8>
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let frame = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => return data,
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    };
    tokio::time::timeout(WAIT, frame).await.expect("feedback within deadline")
}

/// Verifies a UDP datagram reaches the bound member.
#[tokio::test]
async fn test_udp_sets_value() {
    let t = Instant::now();

    let (handle, _scene, light) = start(config(0)).await;
    let osc = handle.osc_addr().expect("udp bound");

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(&encode(INTENSITY, &[OscArg::Float(3.5)]), osc).await.unwrap();

    assert!(eventually(|| light.value("intensity") == Some(Value::Float(3.5))).await);

    // Garbage does not stop the loop.
    client.send_to(b"garbage", osc).await.unwrap();
    client.send_to(&encode(INTENSITY, &[OscArg::Float(6.0)]), osc).await.unwrap();
    assert!(eventually(|| light.value("intensity") == Some(Value::Float(6.0))).await);

    handle.stop().await;
    println!("test_udp_sets_value: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies datagrams larger than the socket's receive buffer setting arrive
/// whole, so a bundle is never applied in part.
#[tokio::test]
async fn test_large_datagrams_are_read_whole() {
    let t = Instant::now();

    let cfg = config(0);
    let small_buffer = cfg.recv_buffer_size;
    let (handle, _scene, light) = start(cfg).await;
    let osc = handle.osc_addr().unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let long = "a".repeat(5000);
    let packet = encode(LABEL, &[OscArg::String(long.clone())]);
    assert!(packet.len() > small_buffer);
    client.send_to(&packet, osc).await.unwrap();
    assert!(eventually(|| light.value("label") == Some(Value::String(long.clone()))).await);

    // The element boundary lands just past the configured buffer size.
    let caption = "b".repeat(4051);
    let bundle = encode_packet(&OscPacket::Bundle(OscBundle {
        timetag: TimeTag::IMMEDIATE,
        content: vec![
            OscPacket::Message(OscMessage::new(LABEL, vec![OscArg::String(caption.clone())])),
            OscPacket::Message(OscMessage::new(INTENSITY, vec![OscArg::Float(7.0)])),
        ],
    }));
    assert!(bundle.len() > small_buffer);
    client.send_to(&bundle, osc).await.unwrap();

    assert!(eventually(|| light.value("intensity") == Some(Value::Float(7.0))).await);
    assert_eq!(light.value("label"), Some(Value::String(caption)));

    handle.stop().await;
    println!("test_large_datagrams_are_read_whole: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies the snapshot document, `HOST_INFO` and the method check.
#[tokio::test]
async fn test_http_query_documents() {
    let t = Instant::now();

    let (handle, _scene, _light) = start(config(0)).await;
    let http = handle.http_addr().expect("http bound");
    let osc_port = handle.osc_addr().unwrap().port();
    let client = reqwest::Client::new();

    let resp = client.get(format!("http://{http}/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/json");
    let doc: Json = resp.json().await.unwrap();
    assert_eq!(doc["ACCESS"], 0);
    let intensity = &doc["CONTENTS"]["Root"]["CONTENTS"]["Light"]["CONTENTS"]["intensity"];
    assert_eq!(intensity["FULL_PATH"], INTENSITY);
    assert_eq!(intensity["TYPE"], "f");

    // Any path serves the full tree.
    let nested: Json = client
        .get(format!("http://{http}/Root/Light"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nested, doc);

    let info: Json = client
        .get(format!("http://{http}/?HOST_INFO"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["NAME"], "TestRig");
    assert_eq!(info["OSC_PORT"], osc_port);
    assert_eq!(info["OSC_TRANSPORT"], "UDP");
    assert_eq!(info["EXTENSIONS"]["LISTEN"], true);

    let post = client.post(format!("http://{http}/")).send().await.unwrap();
    assert_eq!(post.status(), 405);

    handle.stop().await;
    println!("test_http_query_documents: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies LISTEN over WebSocket yields binary OSC feedback, and that
/// binary frames from the client are routed.
#[tokio::test]
async fn test_websocket_listen_and_feedback() {
    let t = Instant::now();

    let (handle, _scene, light) = start(config(10)).await;
    let http = handle.http_addr().unwrap();
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{http}/")).await.unwrap();

    let listen = serde_json::json!({ "COMMAND": "LISTEN", "DATA": INTENSITY });
    ws.send(Message::Text(listen.to_string())).await.unwrap();

    let first = decode(&next_binary(&mut ws).await).unwrap();
    assert_eq!(first.address, INTENSITY);
    assert_eq!(first.args, [OscArg::Float(1.0)]);

    light.set_value("intensity", Value::Float(2.5));
    let second = decode(&next_binary(&mut ws).await).unwrap();
    assert_eq!(second.args, [OscArg::Float(2.5)]);

    // Client-to-server OSC over the same socket.
    ws.send(Message::Binary(encode(INTENSITY, &[OscArg::Float(7.0)]).to_vec()))
        .await
        .unwrap();
    let echoed = decode(&next_binary(&mut ws).await).unwrap();
    assert_eq!(echoed.args, [OscArg::Float(7.0)]);
    assert_eq!(light.value("intensity"), Some(Value::Float(7.0)));

    // Junk commands are ignored, the connection stays usable.
    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(Message::Text(r#"{"COMMAND":"PLAY","DATA":"/x"}"#.into())).await.unwrap();
    let ignore = serde_json::json!({ "COMMAND": "IGNORE", "DATA": INTENSITY });
    ws.send(Message::Text(ignore.to_string())).await.unwrap();

    let router = Arc::clone(handle.router());
    assert!(eventually(|| router.tick() == 0 && router.connection_count() == 1).await);

    ws.close(None).await.unwrap();
    assert!(eventually(|| router.connection_count() == 0).await);

    handle.stop().await;
    println!("test_websocket_listen_and_feedback: Testing Overhead = {:?}", t.elapsed());
}

/// Verifies `stop` releases the UDP port and nothing is dispatched afterwards.
#[tokio::test]
async fn test_stop_releases_socket() {
    let (handle, _scene, light) = start(config(0)).await;
    let osc = handle.osc_addr().unwrap();
    handle.stop().await;

    let rebound = UdpSocket::bind(osc).await;
    assert!(rebound.is_ok(), "port still held after stop");
    drop(rebound);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(&encode(INTENSITY, &[OscArg::Float(4.0)]), osc).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(light.value("intensity"), Some(Value::Float(1.0)));
}

#[tokio::test]
async fn test_one_transport_failing_keeps_the_other() {
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut cfg = config(0);
    cfg.osc_port = taken.local_addr().unwrap().port();

    let (handle, _scene, _light) = start(cfg).await;
    assert!(handle.osc_addr().is_none());
    assert!(handle.http_addr().is_some());
    assert_eq!(handle.listening(), ["http"]);
    handle.stop().await;
}

#[tokio::test]
async fn test_both_transports_failing_is_an_error() {
    let udp = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let tcp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut cfg = config(0);
    cfg.osc_port = udp.local_addr().unwrap().port();
    cfg.http_port = tcp.local_addr().unwrap().port();

    let (scene, _) = scene();
    let builder = ServerBuilder::new().with_config(cfg).with_root(scene as _);
    let err = OscQueryServer::from_builder(builder).start().await.err().unwrap();
    assert!(matches!(err, oscquery::OscQueryError::TransportBind { transport: "udp", .. }));
}

#[tokio::test]
async fn test_rebuild_request_is_applied_in_background() {
    let (handle, scene, _light) = start(config(0)).await;
    let router = Arc::clone(handle.router());
    assert!(router.snapshot().binding("/Extra/Fog/density").is_none());

    let extra = MemoryObject::new("Extra");
    extra.add_component(MemoryComponent::new("Fog").field("density", ValueType::Float, Value::Float(0.1)));
    scene.add_child(extra);

    assert!(handle.request_rebuild());
    assert!(eventually(|| router.snapshot().binding("/Extra/Fog/density").is_some()).await);
    assert!(router.snapshot().is_consistent());

    handle.stop().await;
}

#[derive(Default)]
struct RecordingAdvertiser {
    events: Mutex<Vec<String>>,
}

impl ServiceAdvertiser for RecordingAdvertiser {
    fn advertise(&self, name: &str, service_type: &str, port: u16) -> std::io::Result<()> {
        self.events.lock().unwrap().push(format!("+{name} {service_type} {port}"));
        Ok(())
    }

    fn withdraw(&self, name: &str, service_type: &str) {
        self.events.lock().unwrap().push(format!("-{name} {service_type}"));
    }
}

#[tokio::test]
async fn test_services_are_advertised_and_withdrawn() {
    let advertiser = Arc::new(RecordingAdvertiser::default());
    let (scene, _) = scene();
    let builder = ServerBuilder::new().with_config(config(0)).with_root(scene as _);
    let handle = OscQueryServer::from_builder(builder)
        .with_advertiser(Arc::clone(&advertiser) as _)
        .start()
        .await
        .unwrap();
    let osc = handle.osc_addr().unwrap().port();
    let http = handle.http_addr().unwrap().port();
    handle.stop().await;

    let events = advertiser.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            format!("+TestRig _osc._udp {osc}"),
            format!("+TestRig _oscjson._tcp {http}"),
            "-TestRig _osc._udp".to_string(),
            "-TestRig _oscjson._tcp".to_string(),
        ]
    );
}
