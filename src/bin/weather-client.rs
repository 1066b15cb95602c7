use std::{process::exit, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use meteo::{
    Request, WeatherClient,
    client::{describe, parse_request_arg},
    protocol::{DEFAULT_PORT, MAX_CITY_LEN},
};

#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    /// Server host name or IPv4 address
    #[arg(short, long, default_value = "localhost")]
    server: String,
    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Weather type (t, h, w, p) and city, as two values or one quoted value
    #[arg(short, long, required = true, num_args = 1..=2, value_names = ["TYPE", "CITY"])]
    request: Vec<String>,
    /// Connect, send and receive deadline in seconds
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let (kind, city) = parse_request_arg(&cli.request)?;
    if city.len() > MAX_CITY_LEN {
        warn!("city name longer than {} bytes, truncating", MAX_CITY_LEN);
    }
    let request = Request::new(kind, &city)?;

    let timeout = Duration::from_secs(cli.timeout);
    let client = WeatherClient::connect(&cli.server, cli.port, timeout)
        .with_context(|| format!("cannot connect to {}:{}", cli.server, cli.port))?;
    let server_ip = client.server_addr().ip();
    let response = client
        .query(&request)
        .context("failed to receive a response")?;

    println!(
        "Received result from server ip {}. {}",
        server_ip,
        describe(&response, &request.city())
    );
    Ok(())
}
