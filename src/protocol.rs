//! Requests and responses exchanged with the correlator or simulator
//! server. Every message travels as a frame: a little-endian `u32` body
//! length, then the body.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{read_f64_vec, read_string, write_f64_slice, write_string};
use crate::error::{NspdError, Result};
use crate::spectrum::{
    parse_cycle, parse_options_table, write_cycle, write_options_table, AmpPhaseOptions, CycleData,
};

pub const CLIENT_TYPE: &str = "NSPD";

/// Frames larger than this are taken as a corrupt stream.
pub const MAX_FRAME_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_id: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerType {
    #[default]
    Unknown,
    Correlator,
    Simulator,
}

impl ServerType {
    fn code(self) -> i32 {
        match self {
            ServerType::Unknown => 0,
            ServerType::Correlator => 1,
            ServerType::Simulator => 2,
        }
    }

    fn from_code(code: i32) -> ServerType {
        match code {
            1 => ServerType::Correlator,
            2 => ServerType::Simulator,
            _ => ServerType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ServerType,
    CurrentSpectrum,
    /// An empty options list asks the server to keep the options another
    /// client last used.
    SpectrumMjd { mjd: f64, options: Vec<AmpPhaseOptions> },
    MjdSpectrum,
    TimeRange,
    CycleTimes,
}

impl Request {
    fn code(&self) -> u32 {
        match self {
            Request::ServerType => 1,
            Request::CurrentSpectrum => 2,
            Request::SpectrumMjd { .. } => 3,
            Request::MjdSpectrum => 4,
            Request::TimeRange => 5,
            Request::CycleTimes => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Request::ServerType => "SERVERTYPE",
            Request::CurrentSpectrum => "CURRENT_SPECTRUM",
            Request::SpectrumMjd { .. } => "SPECTRUM_MJD",
            Request::MjdSpectrum => "MJD_SPECTRUM",
            Request::TimeRange => "TIMERANGE",
            Request::CycleTimes => "CYCLE_TIMES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    ServerType(ServerType),
    CurrentSpectrum {
        options: Vec<AmpPhaseOptions>,
        cycle: Box<CycleData>,
    },
    LoadedSpectrum {
        options: Vec<AmpPhaseOptions>,
        cycle: Box<CycleData>,
    },
    SpectrumOutsideRange,
    SpectrumLoaded,
    /// Cycle time in seconds, then the earliest and latest MJD held.
    TimeRange {
        cycletime: f64,
        earliest: f64,
        latest: f64,
    },
    CycleTimes(Vec<f64>),
    UserRequestVisData,
    UsernameExists,
    Shutdown,
}

impl Response {
    fn code(&self) -> u32 {
        match self {
            Response::ServerType(_) => 1,
            Response::CurrentSpectrum { .. } => 2,
            Response::LoadedSpectrum { .. } => 3,
            Response::SpectrumOutsideRange => 4,
            Response::SpectrumLoaded => 5,
            Response::TimeRange { .. } => 6,
            Response::CycleTimes(_) => 7,
            Response::UserRequestVisData => 8,
            Response::UsernameExists => 9,
            Response::Shutdown => 10,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Response::ServerType(_) => "SERVERTYPE",
            Response::CurrentSpectrum { .. } => "CURRENT_SPECTRUM",
            Response::LoadedSpectrum { .. } => "LOADED_SPECTRUM",
            Response::SpectrumOutsideRange => "SPECTRUM_OUTSIDERANGE",
            Response::SpectrumLoaded => "SPECTRUM_LOADED",
            Response::TimeRange { .. } => "TIMERANGE",
            Response::CycleTimes(_) => "CYCLE_TIMES",
            Response::UserRequestVisData => "USERREQUEST_VISDATA",
            Response::UsernameExists => "USERNAME_EXISTS",
            Response::Shutdown => "SHUTDOWN",
        }
    }
}

fn malformed(what: &str, err: io::Error) -> NspdError {
    NspdError::protocol(format!("malformed {}: {}", what, err))
}

pub fn encode_request(client: &ClientInfo, request: &Request) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(request.code())?;
    write_string(&mut body, &client.client_id)?;
    write_string(&mut body, &client.username)?;
    write_string(&mut body, CLIENT_TYPE)?;
    if let Request::SpectrumMjd { mjd, options } = request {
        body.write_f64::<LittleEndian>(*mjd)?;
        write_options_table(&mut body, options)?;
    }
    Ok(body)
}

pub fn decode_request(body: &[u8]) -> Result<(ClientInfo, Request)> {
    let read = || -> io::Result<(ClientInfo, Request)> {
        let mut cursor = Cursor::new(body);
        let code = cursor.read_u32::<LittleEndian>()?;
        let client = ClientInfo {
            client_id: read_string(&mut cursor)?,
            username: read_string(&mut cursor)?,
        };
        let _client_type = read_string(&mut cursor)?;
        let request = match code {
            1 => Request::ServerType,
            2 => Request::CurrentSpectrum,
            3 => {
                let mjd = cursor.read_f64::<LittleEndian>()?;
                let options = parse_options_table(&mut cursor)?;
                Request::SpectrumMjd { mjd, options }
            }
            4 => Request::MjdSpectrum,
            5 => Request::TimeRange,
            6 => Request::CycleTimes,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown request type {}", other),
                ))
            }
        };
        Ok((client, request))
    };
    read().map_err(|e| malformed("request", e))
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(response.code())?;
    match response {
        Response::ServerType(kind) => body.write_i32::<LittleEndian>(kind.code())?,
        Response::CurrentSpectrum { options, cycle } | Response::LoadedSpectrum { options, cycle } => {
            write_options_table(&mut body, options)?;
            write_cycle(&mut body, cycle)?;
        }
        Response::TimeRange {
            cycletime,
            earliest,
            latest,
        } => {
            body.write_f64::<LittleEndian>(*cycletime)?;
            body.write_f64::<LittleEndian>(*earliest)?;
            body.write_f64::<LittleEndian>(*latest)?;
        }
        Response::CycleTimes(mjds) => write_f64_slice(&mut body, mjds)?,
        Response::SpectrumOutsideRange
        | Response::SpectrumLoaded
        | Response::UserRequestVisData
        | Response::UsernameExists
        | Response::Shutdown => {}
    }
    Ok(body)
}

pub fn decode_response(body: &[u8]) -> Result<Response> {
    let read = || -> io::Result<Response> {
        let mut cursor = Cursor::new(body);
        let code = cursor.read_u32::<LittleEndian>()?;
        let response = match code {
            1 => Response::ServerType(ServerType::from_code(cursor.read_i32::<LittleEndian>()?)),
            2 | 3 => {
                let options = parse_options_table(&mut cursor)?;
                let cycle = Box::new(parse_cycle(&mut cursor)?);
                if code == 2 {
                    Response::CurrentSpectrum { options, cycle }
                } else {
                    Response::LoadedSpectrum { options, cycle }
                }
            }
            4 => Response::SpectrumOutsideRange,
            5 => Response::SpectrumLoaded,
            6 => Response::TimeRange {
                cycletime: cursor.read_f64::<LittleEndian>()?,
                earliest: cursor.read_f64::<LittleEndian>()?,
                latest: cursor.read_f64::<LittleEndian>()?,
            },
            7 => Response::CycleTimes(read_f64_vec(&mut cursor)?),
            8 => Response::UserRequestVisData,
            9 => Response::UsernameExists,
            10 => Response::Shutdown,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown response type {}", other),
                ))
            }
        };
        Ok(response)
    };
    read().map_err(|e| malformed("response", e))
}

pub fn write_frame<W: Write>(w: &mut W, body: &[u8]) -> io::Result<()> {
    w.write_u32::<LittleEndian>(body.len() as u32)?;
    w.write_all(body)
}

/// Reads one whole frame, blocking until it has arrived.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes", len),
        ));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body)?;
    Ok(body)
}

/// Collects bytes as they arrive and hands back complete frame bodies.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending.len() < 4 {
            return Ok(None);
        }
        let len = Cursor::new(&self.pending[..4]).read_u32::<LittleEndian>()? as usize;
        if len > MAX_FRAME_BYTES {
            return Err(NspdError::protocol(format!("frame of {} bytes", len)));
        }
        if self.pending.len() < 4 + len {
            return Ok(None);
        }
        let body = self.pending[4..4 + len].to_vec();
        self.pending.drain(..4 + len);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::WindowOptions;

    fn client() -> ClientInfo {
        ClientInfo {
            client_id: "nspd-4242".into(),
            username: "observer".into(),
        }
    }

    #[test]
    fn spectrum_request_carries_options() {
        let options = vec![AmpPhaseOptions {
            windows: vec![WindowOptions {
                delay_averaging: 4,
                ..WindowOptions::default()
            }],
            ..AmpPhaseOptions::default()
        }];
        let request = Request::SpectrumMjd {
            mjd: 58000.01,
            options,
        };
        let body = encode_request(&client(), &request).unwrap();
        let (who, decoded) = decode_request(&body).unwrap();
        assert_eq!(who, client());
        assert_eq!(decoded, request);
    }

    #[test]
    fn omitted_options_encode_a_zero_count() {
        let request = Request::SpectrumMjd {
            mjd: 58000.0,
            options: Vec::new(),
        };
        let body = encode_request(&client(), &request).unwrap();
        // the last four bytes are the options count
        assert_eq!(&body[body.len() - 4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn unknown_response_is_a_protocol_error() {
        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(99).unwrap();
        let err = decode_response(&body).unwrap_err();
        assert!(matches!(err, NspdError::Protocol(_)));
        assert!(decode_response(&[1, 0]).is_err());
    }

    #[test]
    fn frames_are_reassembled_across_reads() {
        let mut stream = Vec::new();
        for response in [
            Response::ServerType(ServerType::Simulator),
            Response::TimeRange {
                cycletime: 10.0,
                earliest: 58000.0,
                latest: 58000.5,
            },
            Response::CycleTimes(vec![58000.0, 58000.01]),
        ] {
            write_frame(&mut stream, &encode_response(&response).unwrap()).unwrap();
        }
        let mut frames = FrameBuffer::new();
        let mut decoded = Vec::new();
        for chunk in stream.chunks(5) {
            frames.extend(chunk);
            while let Some(body) = frames.next_frame().unwrap() {
                decoded.push(decode_response(&body).unwrap());
            }
        }
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0], Response::ServerType(ServerType::Simulator));
        assert_eq!(decoded[2], Response::CycleTimes(vec![58000.0, 58000.01]));
        assert_eq!(frames.pending_bytes(), 0);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut frames = FrameBuffer::new();
        frames.extend(&u32::MAX.to_le_bytes());
        assert!(frames.next_frame().is_err());
        let mut bytes = Cursor::new(u32::MAX.to_le_bytes().to_vec());
        assert!(read_frame(&mut bytes).is_err());
    }
}
