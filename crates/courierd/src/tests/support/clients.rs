//! Blocking protocol clients used to drive running endpoints.

use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::Value;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const PROMPT: &str = "courier> ";

/// Console client that reads up to each prompt.
pub struct ConsoleClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl ConsoleClient {
    /// Connects and consumes the greeting, returning it alongside the client.
    pub fn connect(address: SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(address).expect("connect to console");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone console stream"));
        let mut client = Self {
            writer: stream,
            reader,
        };
        let greeting = client.read_to_prompt();
        (client, greeting)
    }

    /// Sends one line and returns everything written before the next prompt,
    /// or before end of stream when the server closes the connection.
    pub fn run(&mut self, line: &str) -> String {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .expect("send console line");
        self.read_to_prompt()
    }

    fn read_to_prompt(&mut self) -> String {
        let mut received = Vec::new();
        let mut byte = [0_u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    received.push(byte[0]);
                    if received.ends_with(PROMPT.as_bytes()) {
                        received.truncate(received.len() - PROMPT.len());
                        break;
                    }
                }
                Err(error) => panic!("console read failed: {error}"),
            }
        }
        String::from_utf8(received).expect("console output is UTF-8")
    }

    /// Whether the server has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        let mut byte = [0_u8; 1];
        matches!(self.reader.read(&mut byte), Ok(0))
    }
}

/// Framed client speaking length-prefixed MessagePack.
pub struct FramedClient {
    stream: TcpStream,
}

impl FramedClient {
    pub fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).expect("connect to framed endpoint");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        Self { stream }
    }

    /// Sends a raw frame body.
    pub fn send_raw(&mut self, body: &[u8]) {
        let len = u32::try_from(body.len()).expect("frame fits in u32");
        self.stream
            .write_all(&len.to_be_bytes())
            .expect("write frame header");
        self.stream.write_all(body).expect("write frame body");
    }

    /// Sends only a frame header announcing `len` bytes.
    pub fn send_header(&mut self, len: u32) {
        self.stream
            .write_all(&len.to_be_bytes())
            .expect("write frame header");
    }

    /// Encodes and sends a request.
    pub fn send(&mut self, request: &Value) {
        let body = rmp_serde::to_vec_named(request).expect("encode request");
        self.send_raw(&body);
    }

    /// Reads one reply, or `None` when the server closed the connection.
    pub fn receive(&mut self) -> Option<Value> {
        let mut header = [0_u8; 4];
        if self.stream.read_exact(&mut header).is_err() {
            return None;
        }
        let len = usize::try_from(u32::from_be_bytes(header)).expect("frame length fits");
        let mut body = vec![0_u8; len];
        self.stream.read_exact(&mut body).expect("read frame body");
        Some(rmp_serde::from_slice(&body).expect("decode reply"))
    }
}

/// Reply received by [`HttpClient`].
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    /// Parses the body as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("HTTP body is JSON")
    }
}

/// HTTP/1.1 client opening one connection per request.
pub struct HttpClient {
    address: SocketAddr,
    headers: Vec<(String, String)>,
}

impl HttpClient {
    pub const fn new(address: SocketAddr) -> Self {
        Self {
            address,
            headers: Vec::new(),
        }
    }

    /// Adds a header sent with every later request.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn get(&self, target: &str) -> HttpReply {
        self.request("GET", target, None)
    }

    /// Posts `form` as an `application/x-www-form-urlencoded` body.
    pub fn post_form(&self, target: &str, form: &str) -> HttpReply {
        self.request("POST", target, Some(form))
    }

    fn request(&self, method: &str, target: &str, form: Option<&str>) -> HttpReply {
        let mut head = format!(
            "{method} {target} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
            self.address
        );
        for (name, value) in &self.headers {
            head = head + name + ": " + value + "\r\n";
        }
        let body = form.unwrap_or_default();
        if form.is_some() {
            head = head
                + "Content-Type: application/x-www-form-urlencoded\r\n"
                + &format!("Content-Length: {}\r\n", body.len());
        }
        head.push_str("\r\n");

        let mut stream = TcpStream::connect(self.address).expect("connect to HTTP endpoint");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        stream.write_all(head.as_bytes()).expect("write request head");
        stream.write_all(body.as_bytes()).expect("write request body");

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .expect("read HTTP response");
        let (status_line, rest) = response
            .split_once("\r\n")
            .expect("response has a status line");
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("status line carries a code");
        let body = rest
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_owned())
            .unwrap_or_default();
        HttpReply { status, body }
    }
}
