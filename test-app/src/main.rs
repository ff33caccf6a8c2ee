// palette test application -- CLI tool for running either end of the
// Palette/Easel link against real hardware, a TCP peer, or a scripted
// transport.
//
// Usage:
//   palette-test-app identity
//   palette-test-app ports
//   palette-test-app device --port /dev/ttyACM0
//   palette-test-app device --listen 127.0.0.1:4000
//   palette-test-app device --mock --packets 16
//   palette-test-app easel --connect 127.0.0.1:4000 --count 100 --pattern random
//   palette-test-app -v easel --port /dev/ttyACM0

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::Rng;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use palette::codec::PacketFormat;
use palette::identity::{self, DeviceIdentity};
use palette::link::{EaselLink, LinkSessionBuilder, TickOutcome};
use palette::transport::{SerialTransport, TcpTransport, Transport, available_ports};
use palette::{Error, OutputStage, Sample};
use palette_test_harness::ScriptedTransport;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// palette test application -- runs either end of the Palette link.
#[derive(Parser)]
#[command(name = "palette-test-app", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Where the link runs: a serial port or a TCP endpoint.
#[derive(Args)]
struct LinkArgs {
    /// Serial port path (e.g. /dev/ttyACM0, COM3).
    #[arg(long, conflicts_with = "connect")]
    port: Option<String>,

    /// Serial baud rate. USB CDC ports ignore it.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Connect to a TCP endpoint instead of a serial port (host:port).
    #[arg(long)]
    connect: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the stock Palette announcement line.
    Identity,

    /// List serial ports reported by the OS.
    Ports,

    /// Run the device (Palette) side of the link until Ctrl-C.
    Device {
        #[command(flatten)]
        link: LinkArgs,

        /// Serve hosts that connect to this TCP address (host:port).
        #[arg(long, conflicts_with_all = ["port", "connect", "mock"])]
        listen: Option<String>,

        /// Replay scripted packets instead of using a real transport.
        #[arg(long, conflicts_with_all = ["port", "connect"])]
        mock: bool,

        /// Number of scripted packets fed to the device with --mock.
        #[arg(long, default_value_t = 8)]
        packets: u32,

        /// Inbound packet read timeout in milliseconds.
        #[arg(long, default_value_t = 1000)]
        read_timeout_ms: u64,

        /// Half-period of the seeking status pulse in milliseconds.
        #[arg(long, default_value_t = 50)]
        pulse_ms: u64,

        /// Go back to announcing when the host falls silent.
        #[arg(long)]
        reannounce: bool,
    },

    /// Run the host (Easel) side: discover a device and exchange packets.
    Easel {
        #[command(flatten)]
        link: LinkArgs,

        /// Number of round trips to run.
        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Output values to send.
        #[arg(long, value_enum, default_value_t = Pattern::Ramp)]
        pattern: Pattern,

        /// Discovery and reply timeout in milliseconds.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Pattern {
    /// Each channel climbs steadily, channels offset from one another.
    Ramp,
    /// Uniformly random values across the full range.
    Random,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancellation token that fires on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping");
        }
        trigger.cancel();
    });
    cancel
}

async fn open_transport(link: &LinkArgs) -> Result<Box<dyn Transport>> {
    if let Some(addr) = &link.connect {
        let transport = TcpTransport::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        println!("Connected to {addr}");
        return Ok(Box::new(transport));
    }

    let port = link
        .port
        .as_deref()
        .context("--port or --connect is required")?;
    let transport = SerialTransport::open(port, link.baud)
        .await
        .with_context(|| format!("failed to open serial port {port} at {} baud", link.baud))?;
    println!("Opened {port} at {} baud", link.baud);
    Ok(Box::new(transport))
}

/// Output stage that logs every Channel Set it is given.
struct LogOutputStage;

impl OutputStage for LogOutputStage {
    fn apply(&mut self, samples: &[Sample]) -> palette::Result<()> {
        tracing::debug!(values = ?samples, "outputs applied");
        Ok(())
    }
}

fn pattern_values(pattern: Pattern, step: u32, identity: &DeviceIdentity) -> Vec<Sample> {
    let max = u32::from(identity.output.depth().max_sample());
    let channels = identity.output.channels();
    match pattern {
        Pattern::Ramp => (0..channels)
            .map(|ch| ((step * 64 + ch as u32 * 512) % (max + 1)) as Sample)
            .collect(),
        Pattern::Random => {
            let mut rng = rand::thread_rng();
            (0..channels)
                .map(|_| rng.gen_range(0..=max) as Sample)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_identity() -> Result<()> {
    let id = identity::palette();
    println!("{}", id.announcement());
    println!(
        "  outputs: {} x {} ({} byte packets)",
        id.output.channels(),
        id.output.depth(),
        id.output.packet_len()
    );
    println!(
        "  inputs:  {} x {} ({} byte packets)",
        id.input.channels(),
        id.input.depth(),
        id.input.packet_len()
    );
    Ok(())
}

fn cmd_ports() -> Result<()> {
    let ports = available_ports().context("failed to list serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in &ports {
        println!("{port}");
    }
    Ok(())
}

fn device_builder(read_timeout_ms: u64, pulse_ms: u64, reannounce: bool) -> LinkSessionBuilder {
    LinkSessionBuilder::new(identity::palette())
        .read_timeout(Duration::from_millis(read_timeout_ms))
        .pulse_delay(Duration::from_millis(pulse_ms))
        .reannounce_on_silence(reannounce)
        .output_stage(LogOutputStage)
}

async fn cmd_device(link: &LinkArgs, builder: LinkSessionBuilder) -> Result<()> {
    let transport = open_transport(link).await?;
    let mut session = builder
        .build_with_transport(transport)
        .await
        .context("failed to build link session")?;

    session.run(ctrl_c_token()).await?;
    println!("Stopped after {} exchanges", session.sequence());
    Ok(())
}

/// Serve one host at a time until Ctrl-C.
async fn cmd_device_listen(
    addr: &str,
    read_timeout_ms: u64,
    pulse_ms: u64,
    reannounce: bool,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    println!("Listening on {addr}");
    let cancel = ctrl_c_token();

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted.context("accept failed")?,
        };
        let (stream, peer) = accepted;
        println!("Host connected from {peer}");

        let mut session = device_builder(read_timeout_ms, pulse_ms, reannounce)
            .build_with_transport(Box::new(TcpTransport::from_stream(stream, peer.to_string())))
            .await
            .context("failed to build link session")?;

        match session.run(cancel.clone()).await {
            Ok(()) => {
                println!("Stopped after {} exchanges", session.sequence());
                return Ok(());
            }
            Err(Error::ConnectionLost) => {
                println!(
                    "Host {peer} disconnected after {} exchanges",
                    session.sequence()
                );
            }
            Err(e) => return Err(e).context("link session failed"),
        }
    }
}

/// Feed scripted packets to a device session and report its replies.
async fn cmd_device_mock(packets: u32, builder: LinkSessionBuilder) -> Result<()> {
    let (transport, script) = ScriptedTransport::new();
    let mut session = builder
        .pulse_delay(Duration::ZERO)
        .build_with_transport(Box::new(transport))
        .await
        .context("failed to build link session with mock transport")?;
    let id = session.identity().clone();
    println!("Connected (mock transport) -- {id}");

    let inbound = PacketFormat::new(id.output);
    let outbound = PacketFormat::new(id.input);

    // One announcement before the scripted host starts talking.
    session.tick().await?;
    print!("Announcement: {}", String::from_utf8_lossy(&script.sent_bytes()));
    script.clear_sent();

    for step in 0..packets {
        script.push_inbound(&inbound.encode_to_vec(&pattern_values(Pattern::Ramp, step, &id))?);
    }

    loop {
        match session.tick().await? {
            TickOutcome::PeerDetected => println!("Peer detected"),
            TickOutcome::Exchanged { sequence, .. } => {
                let sent = script.sent_data();
                let reply = sent.last().context("no reply written")?;
                println!(
                    "[{sequence}/{packets}] reply {:02X?} -> {:?}",
                    reply,
                    outbound.decode_to_vec(reply)?
                );
            }
            TickOutcome::TimedOut { .. } | TickOutcome::ReturnedToSeeking => break,
            TickOutcome::Announced => {}
        }
    }

    println!("Script exhausted after {} exchanges", session.sequence());
    Ok(())
}

async fn cmd_easel(link: &LinkArgs, count: u32, pattern: Pattern, timeout_ms: u64) -> Result<()> {
    let transport = open_transport(link).await?;
    let timeout = Duration::from_millis(timeout_ms);

    let mut easel = EaselLink::discover(transport, timeout)
        .await
        .context("no announcement received")?;
    let id = easel.identity().clone();
    println!("Discovered: {id}");

    let mut failures = 0u32;
    let mut rtts = Vec::with_capacity(count as usize);

    for i in 1..=count {
        let outputs = pattern_values(pattern, i, &id);
        let start = Instant::now();
        match easel.exchange(&outputs).await {
            Ok(inputs) => {
                let rtt = start.elapsed();
                rtts.push(rtt);
                println!(
                    "[{i}/{count}] out {:?} in {:?} rtt {:.3} ms",
                    outputs,
                    inputs,
                    rtt.as_secs_f64() * 1e3
                );
            }
            Err(e) => {
                eprintln!("[{i}/{count}] exchange failed: {e}");
                failures += 1;
            }
        }
    }

    if let (Some(min), Some(max)) = (rtts.iter().min(), rtts.iter().max()) {
        let total: Duration = rtts.iter().sum();
        let mean = total / rtts.len() as u32;
        println!();
        println!("Results:");
        println!("  Exchanges:  {}", rtts.len());
        println!("  Failures:   {failures}");
        println!(
            "  RTT:        min {:.3} ms, mean {:.3} ms, max {:.3} ms",
            min.as_secs_f64() * 1e3,
            mean.as_secs_f64() * 1e3,
            max.as_secs_f64() * 1e3
        );
    }

    easel.close().await.ok();

    if failures > 0 {
        bail!("{failures} out of {count} exchanges failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Identity => cmd_identity(),
        Command::Ports => cmd_ports(),
        Command::Device {
            link,
            listen,
            mock,
            packets,
            read_timeout_ms,
            pulse_ms,
            reannounce,
        } => {
            if let Some(addr) = listen {
                return cmd_device_listen(addr, *read_timeout_ms, *pulse_ms, *reannounce).await;
            }
            let builder = device_builder(*read_timeout_ms, *pulse_ms, *reannounce);
            if *mock {
                cmd_device_mock(*packets, builder).await
            } else {
                cmd_device(link, builder).await
            }
        }
        Command::Easel {
            link,
            count,
            pattern,
            timeout_ms,
        } => cmd_easel(link, *count, *pattern, *timeout_ms).await,
    }
}
