//! `bufferd` command line: run the server or a producer/consumer loop.

use std::error::Error;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use bufferd::codec::{MsgPackCodec, RecordCodec, XmlCodec};
use bufferd::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use bufferd::record::{self, Record};
use bufferd::{ConsumerClient, ProducerClient, Server, ServerConfig, DEFAULT_BIND_ADDR};

#[derive(Parser)]
#[command(name = "bufferd")]
#[command(about = "Bounded-buffer producer/consumer relay over TCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the buffer server
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "BUFFERD_ADDR", default_value = DEFAULT_BIND_ADDR)]
        addr: String,

        /// Queue capacity
        #[arg(short, long, env = "BUFFERD_CAPACITY", default_value_t = 10)]
        capacity: usize,

        /// Largest accepted payload in bytes
        #[arg(long, env = "BUFFERD_MAX_PAYLOAD", default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
        max_payload: usize,

        /// Seconds connections get to finish on shutdown
        #[arg(long, default_value_t = 5.0)]
        grace: f64,
    },

    /// Generate random records and submit them
    Produce {
        #[command(flatten)]
        client: ClientArgs,

        /// Minimum pause between records, in seconds
        #[arg(long, default_value_t = 0.5)]
        min_delay: f64,

        /// Maximum pause between records, in seconds
        #[arg(long, default_value_t = 2.0)]
        max_delay: f64,
    },

    /// Take records from the server and print their reports
    Consume {
        #[command(flatten)]
        client: ClientArgs,

        /// Minimum pause between records, in seconds
        #[arg(long, default_value_t = 1.0)]
        min_delay: f64,

        /// Maximum pause between records, in seconds
        #[arg(long, default_value_t = 4.0)]
        max_delay: f64,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Server address
    #[arg(short, long, env = "BUFFERD_ADDR", default_value = DEFAULT_BIND_ADDR)]
    addr: String,

    /// Stop after this many records (default: run until interrupted)
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Record encoding
    #[arg(short, long, value_enum, default_value_t = Format::Xml)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Xml,
    Msgpack,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            capacity,
            max_payload,
            grace,
        } => {
            let config = ServerConfig {
                bind_addr: addr,
                capacity,
                max_payload_size: max_payload,
                shutdown_grace: seconds(grace)?,
            };
            serve(config).await?;
        }
        Commands::Produce {
            client,
            min_delay,
            max_delay,
        } => {
            let delay = DelayRange::new(min_delay, max_delay)?;
            match client.format {
                Format::Xml => produce::<XmlCodec>(&client, delay).await,
                Format::Msgpack => produce::<MsgPackCodec>(&client, delay).await,
            }
        }
        Commands::Consume {
            client,
            min_delay,
            max_delay,
        } => {
            let delay = DelayRange::new(min_delay, max_delay)?;
            match client.format {
                Format::Xml => consume::<XmlCodec>(&client, delay).await,
                Format::Msgpack => consume::<MsgPackCodec>(&client, delay).await,
            }
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn Error>> {
    let server = Server::builder().config(config).bind().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}

async fn produce<C: RecordCodec>(args: &ClientArgs, delay: DelayRange) {
    let client = ProducerClient::new(args.addr.as_str());
    let mut sent = 0u64;

    while args.count.map_or(true, |n| sent < n) {
        let record = record::generate(&mut rand::thread_rng());
        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = client.send_record::<C>(&record) => result,
        };
        match result {
            Ok(()) => {
                sent += 1;
                println!(
                    "Produced {} ({}) as {}",
                    record.name,
                    record.student_id,
                    C::NAME
                );
            }
            Err(e) => tracing::warn!(class = %e.class(), error = %e, "produce failed"),
        }

        if !pause(delay).await {
            break;
        }
    }
    tracing::info!(sent, "producer finished");
}

async fn consume<C: RecordCodec>(args: &ClientArgs, delay: DelayRange) {
    let client = ConsumerClient::new(args.addr.as_str());
    let mut received = 0u64;

    while args.count.map_or(true, |n| received < n) {
        let result: bufferd::Result<Record> = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = client.receive_record::<C>() => result,
        };
        match result {
            Ok(record) => {
                received += 1;
                println!("{}", record);
            }
            Err(e) => tracing::warn!(class = %e.class(), error = %e, "consume failed"),
        }

        if !pause(delay).await {
            break;
        }
    }
    tracing::info!(received, "consumer finished");
}

/// Sleep for a random delay. Returns `false` if interrupted.
async fn pause(delay: DelayRange) -> bool {
    let wait = delay.sample(&mut rand::thread_rng());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}

/// Inclusive range of pauses between client iterations.
#[derive(Clone, Copy)]
struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    fn new(min: f64, max: f64) -> Result<Self, Box<dyn Error>> {
        let (min, max) = (seconds(min)?, seconds(max)?);
        if min > max {
            return Err(format!("min delay {:?} exceeds max delay {:?}", min, max).into());
        }
        Ok(Self { min, max })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

fn seconds(value: f64) -> Result<Duration, Box<dyn Error>> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| format!("invalid duration {}: {}", value, e).into())
}
