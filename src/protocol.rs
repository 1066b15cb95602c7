//! Client-server communication protocol definitions.
//!
//! Both messages are fixed-size records written field by field at fixed
//! offsets. There is no delimiter and no length prefix: a receiver always
//! reads exactly [`REQUEST_LEN`] or [`RESPONSE_LEN`] bytes.
//!
//! ```text
//! request:  [type: 1][city: 64, NUL padded]
//! response: [status: 4, big-endian][type: 1][value: 4, IEEE-754 big-endian]
//! ```

use std::fmt;
use std::io::{self, Read, Write};

use crate::error::{Result, WeatherError};

/// Default TCP port shared by client and server.
pub const DEFAULT_PORT: u16 = 56700;

/// Capacity of the city field, terminator included.
pub const CITY_LEN: usize = 64;

/// Longest city name that still leaves room for the terminator.
pub const MAX_CITY_LEN: usize = CITY_LEN - 1;

/// Size of an encoded [`Request`].
pub const REQUEST_LEN: usize = 1 + CITY_LEN;

/// Size of an encoded [`Response`].
pub const RESPONSE_LEN: usize = 4 + 1 + 4;

/// Kind of measurement a client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherType {
    /// `t`, degrees Celsius.
    Temperature,
    /// `h`, relative humidity in percent.
    Humidity,
    /// `w`, wind speed in km/h.
    Wind,
    /// `p`, pressure in hPa.
    Pressure,
}

impl WeatherType {
    /// Every recognized type, in wire-code order `t h w p`.
    pub const ALL: [WeatherType; 4] = [
        WeatherType::Temperature,
        WeatherType::Humidity,
        WeatherType::Wind,
        WeatherType::Pressure,
    ];

    /// The ASCII code carried on the wire.
    pub fn code(self) -> u8 {
        match self {
            WeatherType::Temperature => b't',
            WeatherType::Humidity => b'h',
            WeatherType::Wind => b'w',
            WeatherType::Pressure => b'p',
        }
    }

    /// Map a wire code back to a type, `None` for anything unrecognized.
    pub fn from_code(code: u8) -> Option<WeatherType> {
        WeatherType::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Human readable name used by the client output.
    pub fn label(self) -> &'static str {
        match self {
            WeatherType::Temperature => "Temperature",
            WeatherType::Humidity => "Humidity",
            WeatherType::Wind => "Wind",
            WeatherType::Pressure => "Pressure",
        }
    }

    /// Unit suffix, including the separating space where one is printed.
    pub fn unit(self) -> &'static str {
        match self {
            WeatherType::Temperature => "°C",
            WeatherType::Humidity => "%",
            WeatherType::Wind => " km/h",
            WeatherType::Pressure => " hPa",
        }
    }
}

/// Outcome of a request as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The value field holds a measurement.
    Success,
    /// The city is not in the supported list.
    CityUnavailable,
    /// Unknown type code or malformed city field.
    InvalidRequest,
    /// A code this client does not know about.
    Unknown(u32),
}

impl Status {
    /// Numeric code carried on the wire.
    pub fn code(self) -> u32 {
        match self {
            Status::Success => 0,
            Status::CityUnavailable => 1,
            Status::InvalidRequest => 2,
            Status::Unknown(code) => code,
        }
    }

    /// Decode a wire code. Never fails, unknown codes are kept as they are.
    pub fn from_code(code: u32) -> Status {
        match code {
            0 => Status::Success,
            1 => Status::CityUnavailable,
            2 => Status::InvalidRequest,
            other => Status::Unknown(other),
        }
    }
}

/// Client request message.
///
/// This is the wire image itself: the type byte is kept raw so that the
/// server can see unknown codes, and the city field keeps all 64 bytes so
/// that a missing terminator can be detected. Use
/// [`crate::validator::validate`] to decide whether it is acceptable.
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    kind: u8,
    city: [u8; CITY_LEN],
}

impl Request {
    /// Build a request for `city`.
    ///
    /// Names longer than [`MAX_CITY_LEN`] bytes are cut at the last
    /// character boundary that fits. A NUL would end the name early on the
    /// wire, so it is refused. `kind` is not checked here, the server is the
    /// one that rejects unknown codes.
    pub fn new(kind: u8, city: &str) -> Result<Request> {
        if city.is_empty() {
            return Err(WeatherError::EmptyCity);
        }
        if let Some(pos) = city.bytes().position(|b| b == 0) {
            return Err(WeatherError::NulInCity(pos));
        }
        let mut end = city.len().min(MAX_CITY_LEN);
        while !city.is_char_boundary(end) {
            end -= 1;
        }
        let mut field = [0u8; CITY_LEN];
        field[..end].copy_from_slice(&city.as_bytes()[..end]);
        Ok(Request { kind, city: field })
    }

    /// Raw type byte.
    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// The recognized type, if the byte is one of `t h w p`.
    pub fn weather_type(&self) -> Option<WeatherType> {
        WeatherType::from_code(self.kind)
    }

    /// City bytes before the terminator, `None` if the field has no NUL.
    pub fn city_bytes(&self) -> Option<&[u8]> {
        let end = self.city.iter().position(|&b| b == 0)?;
        Some(&self.city[..end])
    }

    /// City name for display, lossy for non UTF-8 input.
    pub fn city(&self) -> String {
        match self.city_bytes() {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => String::from_utf8_lossy(&self.city).into_owned(),
        }
    }

    /// Encode into the 65 byte wire image.
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[0] = self.kind;
        buf[1..].copy_from_slice(&self.city);
        buf
    }

    /// Decode a wire image. Every image is a request, validity is checked later.
    pub fn decode(buf: &[u8; REQUEST_LEN]) -> Request {
        let mut city = [0u8; CITY_LEN];
        city.copy_from_slice(&buf[1..]);
        Request { kind: buf[0], city }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &char::from(self.kind))
            .field("city", &self.city())
            .field("terminated", &self.city_bytes().is_some())
            .finish()
    }
}

/// `t Roma`, with control characters escaped so it is safe to log.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            char::from(self.kind).escape_debug(),
            self.city().escape_debug()
        )
    }
}

/// Server response message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    /// Outcome of the request.
    pub status: Status,
    /// Echoed type code on success, `0` otherwise.
    pub kind: u8,
    /// Measurement on success, `0.0` otherwise.
    pub value: f32,
}

impl Response {
    /// A successful answer carrying `value`.
    pub fn success(kind: WeatherType, value: f32) -> Response {
        Response {
            status: Status::Success,
            kind: kind.code(),
            value,
        }
    }

    /// A failed answer: null type and zero value.
    pub fn failure(status: Status) -> Response {
        Response {
            status,
            kind: 0,
            value: 0.0,
        }
    }

    /// The echoed type, if recognized.
    pub fn weather_type(&self) -> Option<WeatherType> {
        WeatherType::from_code(self.kind)
    }

    /// Encode into the packed 9 byte wire image.
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0u8; RESPONSE_LEN];
        buf[0..4].copy_from_slice(&self.status.code().to_be_bytes());
        buf[4] = self.kind;
        buf[5..9].copy_from_slice(&self.value.to_bits().to_be_bytes());
        buf
    }

    /// Decode the packed wire image.
    pub fn decode(buf: &[u8; RESPONSE_LEN]) -> Response {
        let status = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let bits = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        Response {
            status: Status::from_code(status),
            kind: buf[4],
            value: f32::from_bits(bits),
        }
    }
}

/// Fill exactly `N` bytes or report how many arrived before end of stream.
fn read_record<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    let mut filled = 0;
    while filled < N {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(WeatherError::Truncated {
                    expected: N,
                    received: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

/// Read one request record.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let buf = read_record::<_, REQUEST_LEN>(reader)?;
    Ok(Request::decode(&buf))
}

/// Write one request record and flush.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&request.encode())?;
    writer.flush()?;
    Ok(())
}

/// Read one response record.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let buf = read_record::<_, RESPONSE_LEN>(reader)?;
    Ok(Response::decode(&buf))
}

/// Write one response record and flush.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&response.encode())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_layout() {
        let req = Request::new(b't', "Roma").unwrap();
        let buf = req.encode();
        assert_eq!(buf.len(), 65);
        assert_eq!(buf[0], b't');
        assert_eq!(&buf[1..5], b"Roma");
        assert!(buf[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn request_survives_the_wire() {
        let req = Request::new(b'p', "Reggio Calabria").unwrap();
        let decoded = Request::decode(&req.encode());
        assert_eq!(decoded, req);
        assert_eq!(decoded.weather_type(), Some(WeatherType::Pressure));
        assert_eq!(decoded.city(), "Reggio Calabria");
    }

    #[test]
    fn long_city_is_truncated_to_capacity() {
        let long = "x".repeat(100);
        let req = Request::new(b'w', &long).unwrap();
        assert_eq!(req.city_bytes().unwrap().len(), MAX_CITY_LEN);

        // 'è' is two bytes and would straddle the limit
        let accented = format!("{}è", "a".repeat(62));
        let req = Request::new(b'w', &accented).unwrap();
        assert_eq!(req.city(), "a".repeat(62));
    }

    #[test]
    fn empty_city_is_rejected() {
        assert!(matches!(Request::new(b't', ""), Err(WeatherError::EmptyCity)));
    }

    #[test]
    fn embedded_nul_is_rejected() {
        assert!(matches!(
            Request::new(b't', "Ro\0ma"),
            Err(WeatherError::NulInCity(2))
        ));
        assert!(matches!(
            Request::new(b't', "\0"),
            Err(WeatherError::NulInCity(0))
        ));
    }

    #[test]
    fn display_escapes_control_characters() {
        let req = Request::new(b't', "Roma").unwrap();
        assert_eq!(req.to_string(), "t Roma");

        let req = Request::new(b'h', "Bari\n[INFO] forged").unwrap();
        let shown = req.to_string();
        assert!(!shown.contains('\n'));
        assert_eq!(shown, "h Bari\\n[INFO] forged");

        let mut buf = [0u8; REQUEST_LEN];
        buf[0] = b'\t';
        buf[1..4].copy_from_slice(b"a\rb");
        assert_eq!(Request::decode(&buf).to_string(), "\\t a\\rb");
    }

    #[test]
    fn unterminated_city_field() {
        let mut buf = [b'A'; REQUEST_LEN];
        buf[0] = b't';
        let req = Request::decode(&buf);
        assert_eq!(req.city_bytes(), None);
    }

    #[test]
    fn response_layout_is_packed_big_endian() {
        let resp = Response::success(WeatherType::Humidity, 1.5);
        let buf = resp.encode();
        assert_eq!(&buf[0..4], &[0, 0, 0, 0]);
        assert_eq!(buf[4], b'h');
        assert_eq!(&buf[5..9], &1.5f32.to_bits().to_be_bytes());

        let buf = Response::failure(Status::InvalidRequest).encode();
        assert_eq!(buf, [0, 0, 0, 2, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let buf = [0, 0, 0, 7, 0, 0, 0, 0, 0];
        let resp = Response::decode(&buf);
        assert_eq!(resp.status, Status::Unknown(7));
        assert_eq!(resp.status.code(), 7);
    }

    #[test]
    fn short_response_is_truncated_error() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 0]);
        match read_response(&mut cursor) {
            Err(WeatherError::Truncated { expected, received }) => {
                assert_eq!(expected, RESPONSE_LEN);
                assert_eq!(received, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_stream_is_truncated_error() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(matches!(
            read_request(&mut cursor),
            Err(WeatherError::Truncated { received: 0, .. })
        ));
    }

    #[test]
    fn write_then_read_records() {
        let mut wire = Vec::new();
        let req = Request::new(b'h', "Bari").unwrap();
        write_request(&mut wire, &req).unwrap();
        let resp = Response::success(WeatherType::Wind, 42.25);
        write_response(&mut wire, &resp).unwrap();
        assert_eq!(wire.len(), REQUEST_LEN + RESPONSE_LEN);

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_request(&mut cursor).unwrap(), req);
        assert_eq!(read_response(&mut cursor).unwrap(), resp);
    }

    #[test]
    fn type_codes() {
        for kind in WeatherType::ALL {
            assert_eq!(WeatherType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(WeatherType::from_code(b'x'), None);
        assert_eq!(WeatherType::from_code(b'T'), None);
    }
}
