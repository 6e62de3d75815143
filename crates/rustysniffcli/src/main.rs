use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rustysniff::{CaptureHandle, Direction, PacketHeader, ReadStatus};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rustysniff", version, about = "Live capture of Bluetooth HCI traffic on Linux")]
struct Cli {
    /// Log level used when RUST_LOG is not set: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the Bluetooth interfaces available for capture
    List,
    /// Capture frames from a device and print them
    Capture(CaptureArgs),
}

#[derive(clap::Args, Debug)]
struct CaptureArgs {
    /// Device to capture on, e.g. bluetooth0 or bluetooth-monitor
    device: String,

    /// Stop after this many frames
    #[arg(short = 'c', long)]
    count: Option<u64>,

    /// Bytes of each frame to keep; 0 keeps everything
    #[arg(short = 's', long, default_value_t = 0)]
    snaplen: u32,

    /// Socket receive buffer size in bytes; 0 keeps the kernel default
    #[arg(short = 'B', long, default_value_t = 0)]
    buffer_size: u32,

    /// Traffic direction to deliver
    #[arg(long, value_enum, default_value_t = DirectionArg::Inout)]
    direction: DirectionArg,

    /// Print the frame bytes in hex
    #[arg(long)]
    hex: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionArg {
    In,
    Out,
    Inout,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::In => Direction::In,
            DirectionArg::Out => Direction::Out,
            DirectionArg::Inout => Direction::InOut,
        }
    }
}

fn init_logging(level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list() -> Result<()> {
    let devices = rustysniff::find_all_devices().context("Failed to enumerate Bluetooth interfaces")?;
    if devices.is_empty() {
        info!("No Bluetooth interfaces found");
        return Ok(());
    }
    for iface in devices.iter() {
        println!(
            "{}\t{}\t{:?}",
            iface.name,
            iface.description.as_deref().unwrap_or(""),
            iface.flags
        );
    }
    Ok(())
}

fn format_frame(hdr: &PacketHeader, frame: &[u8], hex: bool) -> String {
    let mut line = format!(
        "{}.{:06} caplen {} len {}",
        hdr.ts.tv_sec, hdr.ts.tv_usec, hdr.caplen, hdr.len
    );
    if hex {
        line.push(' ');
        line.push_str(&hex::encode(frame));
    }
    line
}

fn open(args: &CaptureArgs) -> Result<CaptureHandle> {
    let mut handle = rustysniff::create(&args.device)?;
    handle.set_snaplen(args.snaplen)?;
    handle.set_buffer_size(args.buffer_size)?;
    handle
        .activate()
        .with_context(|| format!("Failed to activate {}", args.device))?;
    handle.set_direction(args.direction.into())?;
    Ok(handle)
}

fn capture(args: &CaptureArgs) -> Result<()> {
    let mut handle = open(args)?;
    info!(
        device = %args.device,
        linktype = handle.datalink(),
        snapshot = handle.snapshot(),
        "Capture started"
    );

    let mut seen = 0u64;
    while args.count.map_or(true, |limit| seen < limit) {
        let status = handle.dispatch(1, |hdr, frame| println!("{}", format_frame(hdr, frame, args.hex)))?;
        match status {
            ReadStatus::Delivered => seen += 1,
            ReadStatus::Filtered => debug!("Frame filtered"),
            ReadStatus::Cancelled => break,
        }
    }

    match handle.stats() {
        Ok(stats) => info!(
            received = stats.received,
            dropped = stats.dropped,
            frames = seen,
            "Capture finished"
        ),
        Err(e) => info!(error = %e, frames = seen, "Capture finished without statistics"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::List => list(),
        Command::Capture(args) => {
            if args.count == Some(0) {
                bail!("--count must be at least 1");
            }
            capture(&args)
        }
    }
}
