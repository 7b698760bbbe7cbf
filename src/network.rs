use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, BorrowedFd};

use tracing::{debug, info, trace};

use crate::error::{NspdError, Result};
use crate::protocol::{
    decode_response, encode_request, write_frame, ClientInfo, FrameBuffer, Request, Response,
};

/// Somewhere requests can be sent. The session only ever talks to the
/// server through this.
pub trait RequestSink {
    fn send(&mut self, request: &Request) -> Result<()>;
}

/// Connection to the spectrum server.
pub struct ServerLink {
    stream: TcpStream,
    client: ClientInfo,
    frames: FrameBuffer,
}

impl ServerLink {
    pub fn connect(host: &str, port: u16, client: ClientInfo) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).map_err(|e| {
            NspdError::Network(format!("cannot connect to {}:{}: {}", host, port, e))
        })?;
        stream.set_nodelay(true)?;
        info!("connected to {}:{} as {}", host, port, client.username);
        Ok(ServerLink {
            stream,
            client,
            frames: FrameBuffer::new(),
        })
    }

    /// Reads what the socket has ready and returns every response that is
    /// now complete. Only call this once the socket polls readable.
    pub fn receive(&mut self) -> Result<Vec<Response>> {
        let mut chunk = [0u8; 64 * 1024];
        let n = loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(NspdError::Network(format!("read from server: {}", e))),
            }
        };
        if n == 0 {
            return Err(NspdError::Network("server closed the connection".to_string()));
        }
        self.frames.extend(&chunk[..n]);
        let mut responses = Vec::new();
        while let Some(body) = self.frames.next_frame()? {
            let response = decode_response(&body)?;
            debug!("received {}", response.name());
            responses.push(response);
        }
        trace!("{} bytes waiting for the rest of a frame", self.frames.pending_bytes());
        Ok(responses)
    }
}

impl AsFd for ServerLink {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl RequestSink for ServerLink {
    fn send(&mut self, request: &Request) -> Result<()> {
        let body = encode_request(&self.client, request)?;
        let mut frame = Vec::with_capacity(body.len() + 4);
        write_frame(&mut frame, &body)?;
        self.stream
            .write_all(&frame)
            .map_err(|e| NspdError::Network(format!("send {}: {}", request.name(), e)))?;
        debug!("sent {}", request.name());
        Ok(())
    }
}

/// Keeps every request instead of sending it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<Request>,
}

#[cfg(test)]
impl RequestSink for RecordingSink {
    fn send(&mut self, request: &Request) -> Result<()> {
        self.sent.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    use crate::protocol::{decode_request, encode_response, read_frame, ServerType};

    #[test]
    fn link_exchanges_frames_with_a_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let body = read_frame(&mut socket).unwrap();
            let (client, request) = decode_request(&body).unwrap();
            let reply = encode_response(&Response::ServerType(ServerType::Simulator)).unwrap();
            write_frame(&mut socket, &reply).unwrap();
            (client, request)
        });

        let client = ClientInfo {
            client_id: "nspd-1".into(),
            username: "tester".into(),
        };
        let mut link = ServerLink::connect("127.0.0.1", port, client.clone()).unwrap();
        link.send(&Request::ServerType).unwrap();
        let mut responses = Vec::new();
        while responses.is_empty() {
            responses = link.receive().unwrap();
        }
        assert_eq!(responses, vec![Response::ServerType(ServerType::Simulator)]);
        let (seen_client, seen_request) = server.join().unwrap();
        assert_eq!(seen_client, client);
        assert_eq!(seen_request, Request::ServerType);
    }

    #[test]
    fn closed_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            drop(socket);
        });
        let client = ClientInfo {
            client_id: "nspd-2".into(),
            username: "tester".into(),
        };
        let mut link = ServerLink::connect("127.0.0.1", port, client).unwrap();
        server.join().unwrap();
        let err = link.receive().unwrap_err();
        assert!(err.is_fatal_network());
    }

    #[test]
    fn refused_connection_reports_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = ClientInfo {
            client_id: "nspd-3".into(),
            username: "tester".into(),
        };
        match ServerLink::connect("127.0.0.1", port, client) {
            Err(NspdError::Network(msg)) => assert!(msg.contains(&port.to_string())),
            other => panic!("expected a network error, got {:?}", other.map(|_| ())),
        }
    }
}
