//! A fixed-layout TCP weather query service.
//!
//! A client sends a [`Request`] naming a weather type and a city, the server
//! validates it, generates a value for supported cities and answers with a
//! [`Response`]. One exchange per connection.

pub mod protocol;

pub mod validator;

pub mod generator;

pub mod thread_pool;

pub mod server;

pub mod client;

pub mod error;

pub use crate::client::WeatherClient;
pub use crate::error::{Result, WeatherError};
pub use crate::generator::{RandomWeather, WeatherSource};
pub use crate::protocol::{Request, Response, Status, WeatherType};
pub use crate::server::{ShutdownHandle, WeatherServer};
pub use crate::thread_pool::{SharedQueueThreadPool, ThreadPool};
