//! Minimal HTTP/1.1 responder for exercising the client against a real socket.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A canned response. The last one in the queue is repeated.
#[derive(Debug, Clone)]
pub struct Canned {
  status: u16,
  headers: Vec<(String, String)>,
  body: String,
  delay: Duration,
}

impl Canned {
  pub fn json(status: u16, body: Value) -> Self {
    Self::raw(status, &body.to_string())
  }

  pub fn raw(status: u16, body: &str) -> Self {
    Self {
      status,
      headers: vec![("Content-Type".to_string(), "application/json".to_string())],
      body: body.to_string(),
      delay: Duration::ZERO,
    }
  }

  pub fn empty(status: u16) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: String::new(),
      delay: Duration::ZERO,
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  fn render(&self) -> String {
    let reason = match self.status {
      200 => "OK",
      304 => "Not Modified",
      404 => "Not Found",
      500 => "Internal Server Error",
      _ => "Status",
    };
    let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
    for (name, value) in &self.headers {
      out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!(
      "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
      self.body.len(),
      self.body
    ));
    out
  }
}

pub struct TestServer {
  /// Base URL including the `/api/` prefix
  pub base_url: String,
  requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
  pub async fn start(responses: Vec<Canned>) -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));

    let recorded = requests.clone();
    tokio::spawn(async move {
      while let Ok((socket, _)) = listener.accept().await {
        let recorded = recorded.clone();
        let queue = queue.clone();
        tokio::spawn(async move { serve(socket, recorded, queue).await });
      }
    });

    Self {
      base_url: format!("http://{}/api/", addr),
      requests,
    }
  }

  /// Raw requests received so far (request line, headers and body).
  pub fn requests(&self) -> Vec<String> {
    self.requests.lock().unwrap().clone()
  }
}

async fn serve(
  mut socket: TcpStream,
  recorded: Arc<Mutex<Vec<String>>>,
  queue: Arc<Mutex<VecDeque<Canned>>>,
) {
  let request = read_request(&mut socket).await;
  recorded.lock().unwrap().push(request);

  let canned = {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
      queue.pop_front()
    } else {
      queue.front().cloned()
    }
  }
  .unwrap_or_else(|| Canned::empty(404));

  tokio::time::sleep(canned.delay).await;
  let _ = socket.write_all(canned.render().as_bytes()).await;
  let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> String {
  let mut buf = Vec::new();
  let mut chunk = [0u8; 1024];

  loop {
    let n = socket.read(&mut chunk).await.unwrap_or(0);
    if n == 0 {
      break;
    }
    buf.extend_from_slice(&chunk[..n]);

    if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
      let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
      let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
      if buf.len() >= end + 4 + body_len {
        break;
      }
    }
  }

  String::from_utf8_lossy(&buf).to_string()
}
