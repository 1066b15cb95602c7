use std::{process::exit, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use meteo::{
    RandomWeather, SharedQueueThreadPool, ThreadPool, WeatherServer, protocol::DEFAULT_PORT,
};

#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Interface to bind, all IPv4 interfaces by default
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Worker threads serving connections. Defaults to the number of CPUs.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    threads: Option<u32>,
    /// Time budget for each connection, from accept to close, in seconds
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
    /// Fixed seed for the value generator
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = run(args) {
        error!("{:#}", err);
        exit(1)
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let threads = args.threads.unwrap_or(num_cpus::get() as u32);
    let addr = format!("{}:{}", args.host, args.port);

    info!("weather-server {}", env!("CARGO_PKG_VERSION"));
    info!("Listening on: {}", addr);
    info!("Worker threads: {}", threads);

    let source = match args.seed {
        Some(seed) => RandomWeather::seeded(seed),
        None => RandomWeather::from_entropy(),
    };
    let pool = SharedQueueThreadPool::new(threads)?;
    let server = WeatherServer::new(addr.as_str(), source, pool)
        .with_context(|| format!("bind {} failed", addr))?
        .with_timeout(Duration::from_secs(args.timeout));
    server.run()?;
    Ok(())
}
