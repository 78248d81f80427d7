//! Embermesh repeater over a UDP "virtual air".
//!
//! A development shell for the protocol engine: frames go out as UDP
//! datagrams (broadcast by default) instead of LoRa symbols, and received
//! datagrams are fed into the engine with synthetic RSSI/SNR. Useful for
//! exercising a handful of repeaters on a LAN; it is not a radio.
//!
//! ```bash
//! embermesh-node --name ridge \
//!     --channel-key 00112233445566778899AABBCCDDEEFF \
//!     --bind 0.0.0.0:47474
//! ```

mod storage;
mod udp;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use embermesh_core::{Engine, NullTelemetry, Settings, SystemEnv};

use crate::storage::FileStorage;
use crate::udp::UdpAir;

/// Synthetic link readings attached to every UDP "reception".
const SYNTH_RSSI_DBM: i16 = -60;
const SYNTH_SNR_QUARTER_DB: i8 = 40;

/// Embermesh repeater bench node
#[derive(Parser, Debug)]
#[command(name = "embermesh-node")]
#[command(about = "MeshCore-compatible repeater engine over UDP")]
#[command(version)]
struct Args {
    /// Node name used in responses and adverts
    #[arg(long, default_value = "Embermesh")]
    name: String,

    /// Private channel key (32 hex digits), repeatable
    #[arg(long = "channel-key")]
    channel_keys: Vec<String>,

    /// Fixed node hash (2 hex digits) instead of the key-derived one
    #[arg(long)]
    node_hash: Option<String>,

    /// Initial latitude in microdegrees
    #[arg(long, requires = "lon")]
    lat: Option<i32>,

    /// Initial longitude in microdegrees
    #[arg(long, requires = "lat")]
    lon: Option<i32>,

    /// Directory for persisted identity and location
    #[arg(long, default_value = ".embermesh")]
    state_dir: PathBuf,

    /// UDP address to listen on
    #[arg(long, default_value = "0.0.0.0:47474")]
    bind: String,

    /// UDP address frames are sent to
    #[arg(long, default_value = "255.255.255.255:47474")]
    peer: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let fixed_node_hash = args
        .node_hash
        .as_deref()
        .map(|hex| u8::from_str_radix(hex, 16))
        .transpose()
        .context("--node-hash must be 2 hex digits")?;

    let settings = Settings {
        node_name: args.name.clone(),
        private_channel_keys: args.channel_keys.clone(),
        fixed_node_hash,
        initial_location: args.lat.zip(args.lon),
        ..Settings::default()
    };

    let air = UdpAir::bind(&args.bind, &args.peer)
        .with_context(|| format!("failed to bind {}", args.bind))?;
    let receiver = air.receiver().context("failed to clone the air socket")?;

    let storage = FileStorage::new(&args.state_dir)
        .with_context(|| format!("unusable state dir {}", args.state_dir.display()))?;

    let mut engine = Engine::new(
        settings,
        Box::new(SystemEnv::new()),
        Box::new(air),
        Box::new(storage),
        Box::new(NullTelemetry),
    )
    .context("engine construction failed")?;

    tracing::info!(
        name = %args.name,
        node_hash = format_args!("{:02X}", engine.node().node_hash()),
        bind = %args.bind,
        peer = %args.peer,
        "embermesh node up"
    );

    let mut buf = [0u8; 512];
    loop {
        while let Some(len) = receiver.try_recv(&mut buf)? {
            engine.handle_rx(&buf[..len], SYNTH_RSSI_DBM, SYNTH_SNR_QUARTER_DB);
        }

        engine.tick();

        // A UDP datagram is gone the moment send_to returns; complete the
        // half-duplex cycle immediately.
        if engine.transmitter().is_transmitting() {
            engine.on_tx_done();
        }

        if !engine.has_pending_work() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
