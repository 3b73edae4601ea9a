//! Just enough of the Engine.IO v4 / Socket.IO v5 websocket framing to drive the chat namespace.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(400);

#[derive(Debug)]
enum Packet {
    Connect,
    Disconnect,
    Event(String, Value),
    Ack(u64, Value),
    ConnectError(Value),
}

/// Splits a Socket.IO packet (without the Engine.IO `4` prefix).
fn parse(raw: &str) -> Option<Packet> {
    let (kind, rest) = raw.split_at(1);
    match kind {
        "0" => Some(Packet::Connect),
        "1" => Some(Packet::Disconnect),
        "2" => {
            let args: Vec<Value> = serde_json::from_str(rest).ok()?;
            let name = args.first()?.as_str()?.to_string();
            Some(Packet::Event(name, args.get(1).cloned().unwrap_or(Value::Null)))
        }
        "3" => {
            let split = rest.find('[')?;
            let id = rest[..split].parse().ok()?;
            let args: Vec<Value> = serde_json::from_str(&rest[split..]).ok()?;
            Some(Packet::Ack(id, args.into_iter().next().unwrap_or(Value::Null)))
        }
        "4" => Some(Packet::ConnectError(serde_json::from_str(rest).unwrap_or(Value::Null))),
        _ => None,
    }
}

pub struct SioClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: VecDeque<(String, Value)>,
    next_ack: u64,
    closed: bool,
}

impl SioClient {
    /// Opens the websocket transport and sends the namespace CONNECT with `auth.token`.
    pub async fn connect(addr: &str, token: Option<&str>) -> Self {
        let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
        let (ws, _) = connect_async(url).await.expect("websocket handshake");
        let mut client = Self {
            ws,
            events: VecDeque::new(),
            next_ack: 0,
            closed: false,
        };

        let open = client.frame().await.expect("engine.io open packet");
        assert!(open.starts_with('0'), "unexpected first frame {open:?}");

        let auth = token.map(|t| json!({ "token": t }).to_string()).unwrap_or_default();
        client.send_raw(format!("40{auth}")).await;
        client
    }

    /// Waits for the namespace CONNECT reply.
    pub async fn connected(mut self) -> Self {
        loop {
            match self.packet(WAIT).await {
                Some(Packet::Connect) => return self,
                Some(Packet::Event(name, data)) => self.events.push_back((name, data)),
                other => panic!("namespace connect failed: {other:?}"),
            }
        }
    }

    pub async fn emit(&mut self, event: &str, data: Value) {
        self.send_raw(format!("42{}", json!([event, data]))).await;
    }

    /// Emits with an acknowledgement id and returns the first ack argument.
    pub async fn emit_with_ack(&mut self, event: &str, data: Value) -> Value {
        let id = self.next_ack;
        self.next_ack += 1;
        self.send_raw(format!("42{id}{}", json!([event, data]))).await;
        loop {
            match self.packet(WAIT).await {
                Some(Packet::Ack(ack, value)) if ack == id => return value,
                Some(Packet::Event(name, data)) => self.events.push_back((name, data)),
                Some(_) => continue,
                None => panic!("no ack for {event}"),
            }
        }
    }

    /// Next `event` received within `within`, skipping other events.
    pub async fn next_event(&mut self, event: &str, within: Duration) -> Option<Value> {
        if let Some(pos) = self.events.iter().position(|(name, _)| name == event) {
            return self.events.remove(pos).map(|(_, data)| data);
        }
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.packet(left).await? {
                Packet::Event(name, data) if name == event => return Some(data),
                Packet::Event(name, data) => self.events.push_back((name, data)),
                Packet::Disconnect => {
                    self.closed = true;
                    return None;
                }
                _ => continue,
            }
        }
    }

    /// Every `event` that arrives within `within`.
    pub async fn collect(&mut self, event: &str, within: Duration) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + within;
        let mut found = Vec::new();
        while let Some(data) = self
            .next_event(event, deadline.saturating_duration_since(tokio::time::Instant::now()))
            .await
        {
            found.push(data);
        }
        found
    }

    /// True once the server has sent DISCONNECT or closed the transport.
    pub async fn disconnected(&mut self) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !self.closed {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            if left.is_zero() {
                return false;
            }
            match self.packet(left).await {
                Some(Packet::Disconnect) => self.closed = true,
                Some(Packet::Event(name, data)) => self.events.push_back((name, data)),
                Some(_) => continue,
                None => return self.closed,
            }
        }
        true
    }

    async fn send_raw(&mut self, text: String) {
        self.ws.send(Message::Text(text)).await.expect("websocket send");
    }

    async fn packet(&mut self, within: Duration) -> Option<Packet> {
        loop {
            let frame = tokio::time::timeout(within, self.frame()).await.ok()??;
            if let Some(raw) = frame.strip_prefix('4') {
                if let Some(packet) = parse(raw) {
                    return Some(packet);
                }
            }
        }
    }

    /// Next Engine.IO text frame. Pings are answered here; a closed transport yields `None`.
    async fn frame(&mut self) -> Option<String> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) if text == "2" => {
                    self.ws.send(Message::Text("3".into())).await.ok();
                }
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => continue,
            }
        }
    }
}
