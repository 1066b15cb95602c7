//! The weather client: one connection, one request, one response.
use std::{
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::debug;

use crate::{
    error::{Result, WeatherError},
    protocol::{Request, Response, Status, read_response, write_request},
};

/// A connected client, good for exactly one query.
pub struct WeatherClient {
    stream: TcpStream,
    server: SocketAddr,
}

impl WeatherClient {
    /// Resolve `host` to an IPv4 address and connect to it.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<WeatherClient> {
        let server = (host, port)
            .to_socket_addrs()?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| WeatherError::Unresolved(host.to_string()))?;
        debug!("connecting to {}", server);
        let stream = TcpStream::connect_timeout(&server, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(WeatherClient { stream, server })
    }

    /// Address of the server this client is connected to.
    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Send `request`, wait for the answer and close the connection.
    pub fn query(mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.stream, request)?;
        let response = read_response(&mut self.stream);
        let _ = self.stream.shutdown(Shutdown::Both);
        response
    }
}

/// Render a response as the line printed to the user.
pub fn describe(response: &Response, city: &str) -> String {
    match response.status {
        Status::Success => match response.weather_type() {
            Some(kind) => format!(
                "{}: {} = {:.1}{}",
                city,
                kind.label(),
                response.value,
                kind.unit()
            ),
            None => "Unknown error".to_string(),
        },
        Status::CityUnavailable => "City not available".to_string(),
        Status::InvalidRequest => "Invalid request".to_string(),
        Status::Unknown(_) => "Unknown error".to_string(),
    }
}

/// Split the `-r` argument into a type byte and a city.
///
/// Accepts either two values (`-r t Roma`) or a single quoted one
/// (`-r "t Roma"`). The type must be exactly one ASCII character.
pub fn parse_request_arg(values: &[String]) -> Result<(u8, String)> {
    let (kind, city) = match values {
        [kind, city] => (kind.as_str(), city.as_str()),
        [joined] => joined
            .split_once(' ')
            .ok_or_else(|| WeatherError::InvalidRequestArg(joined.clone()))?,
        _ => return Err(WeatherError::InvalidRequestArg(values.join(" "))),
    };
    let code = match kind.as_bytes() {
        [code] if code.is_ascii() => *code,
        _ => return Err(WeatherError::InvalidType(kind.to_string())),
    };
    if city.is_empty() {
        return Err(WeatherError::EmptyCity);
    }
    Ok((code, city.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WeatherType;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn describe_successes() {
        let line = describe(&Response::success(WeatherType::Temperature, 21.34), "Roma");
        assert_eq!(line, "Roma: Temperature = 21.3°C");
        let line = describe(&Response::success(WeatherType::Humidity, 55.0), "bari");
        assert_eq!(line, "bari: Humidity = 55.0%");
        let line = describe(&Response::success(WeatherType::Wind, 12.44), "Bari");
        assert_eq!(line, "Bari: Wind = 12.4 km/h");
        let line = describe(&Response::success(WeatherType::Pressure, 1001.3), "Bari");
        assert_eq!(line, "Bari: Pressure = 1001.3 hPa");
    }

    #[test]
    fn describe_failures() {
        assert_eq!(
            describe(&Response::failure(Status::CityUnavailable), "Atlantis"),
            "City not available"
        );
        assert_eq!(
            describe(&Response::failure(Status::InvalidRequest), "Roma"),
            "Invalid request"
        );
        assert_eq!(
            describe(&Response::failure(Status::Unknown(9)), "Roma"),
            "Unknown error"
        );
    }

    #[test]
    fn request_arg_forms() {
        assert_eq!(
            parse_request_arg(&args(&["t", "Roma"])).unwrap(),
            (b't', "Roma".to_string())
        );
        assert_eq!(
            parse_request_arg(&args(&["h Reggio Emilia"])).unwrap(),
            (b'h', "Reggio Emilia".to_string())
        );
        // unknown codes are the server's call
        assert_eq!(parse_request_arg(&args(&["x", "Roma"])).unwrap().0, b'x');
    }

    #[test]
    fn request_arg_errors() {
        assert!(matches!(
            parse_request_arg(&args(&["Roma"])),
            Err(WeatherError::InvalidRequestArg(_))
        ));
        assert!(matches!(
            parse_request_arg(&args(&["temp", "Roma"])),
            Err(WeatherError::InvalidType(_))
        ));
        assert!(matches!(
            parse_request_arg(&args(&["t", ""])),
            Err(WeatherError::EmptyCity)
        ));
    }
}
