use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ota_core::codec;
use ota_core::protocol::DEFAULT_CHUNK_SIZE;
use ota_core::{
    DeviceInfo, FileSink, FirmwareHeader, FirmwareSink, OtaAgent, OtaConfig, TransferState,
    UpdateEnvelope,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Firmware update tool for pub/sub devices", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a firmware image into update messages, one JSON per line
    Split {
        /// Path to the firmware image
        image: PathBuf,

        /// Version carried by the messages
        #[arg(long)]
        version: String,

        /// Decoded bytes per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Emit one single-shot message instead of chunks
        #[arg(long)]
        single: bool,

        /// Attach a SHA-256 checksum to every message
        #[arg(long)]
        checksum: bool,

        /// Write messages here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay update messages into a local agent backed by a directory
    Apply {
        /// File with one update message per line
        messages: PathBuf,

        /// Directory receiving the staged and active images
        #[arg(long)]
        sink_dir: PathBuf,

        /// Device name
        #[arg(long, default_value = "ota-host")]
        device: String,

        /// Version currently installed
        #[arg(long, default_value = "0.0.0")]
        current_version: String,

        /// 64-bit hardware id used to derive the device id
        #[arg(long, default_value_t = 0)]
        hw_id: u64,

        /// Agent configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Treat messages as single-shot updates
        #[arg(long)]
        single: bool,
    },

    /// Parse and print the header of a firmware image
    Inspect {
        /// Path to the firmware image
        image: PathBuf,
    },

    /// Write the default agent configuration as TOML
    Config {
        /// Destination file
        path: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }

    let result = match args.command {
        Command::Split {
            image,
            version,
            chunk_size,
            single,
            checksum,
            output,
        } => split(&image, &version, chunk_size, single, checksum, output.as_deref()),
        Command::Apply {
            messages,
            sink_dir,
            device,
            current_version,
            hw_id,
            config,
            single,
        } => {
            let device = DeviceInfo::new(device, current_version, hw_id);
            apply(&messages, &sink_dir, device, config.as_deref(), single)
        }
        Command::Inspect { image } => inspect(&image),
        Command::Config { path } => write_config(&path),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn split(
    image_path: &Path,
    version: &str,
    chunk_size: usize,
    single: bool,
    checksum: bool,
    output: Option<&Path>,
) -> Result<()> {
    let image = fs::read(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;

    let mut envelopes = Vec::new();
    if single {
        let mut envelope = UpdateEnvelope::single_shot(version, codec::encode(&image));
        if checksum {
            envelope = envelope.with_checksum(codec::checksum_bytes(&image));
        }
        envelopes.push(envelope);
    } else {
        let size = ota_core::protocol::clamp_chunk_size(chunk_size);
        let total = image.len().div_ceil(size) as u32;
        for (i, part) in image.chunks(size).enumerate() {
            let mut envelope = UpdateEnvelope::chunk(version, codec::encode(part), i as u32 + 1, total);
            if checksum {
                envelope = envelope.with_checksum(codec::checksum_bytes(part));
            }
            envelopes.push(envelope);
        }
    }

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    for envelope in &envelopes {
        writeln!(out, "{}", envelope.to_json()?)?;
    }
    out.flush()?;

    info!(
        version,
        bytes = image.len(),
        messages = envelopes.len(),
        "Image split"
    );
    Ok(())
}

fn apply(
    messages: &Path,
    sink_dir: &Path,
    device: DeviceInfo,
    config_path: Option<&Path>,
    single: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => OtaConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => OtaConfig::default(),
    };
    if single {
        config.chunked = false;
    }
    let topic = config.update_topic.clone();

    let sink = FileSink::new(sink_dir)
        .with_context(|| format!("opening sink {}", sink_dir.display()))?;
    let mut agent = OtaAgent::new(device, config, sink);
    agent.set_transport(
        |topic, payload| {
            println!("{} {}", topic, payload);
            Ok(())
        },
        || true,
        topic.clone(),
    );
    let reports = watch_reports(&mut agent);
    agent.on_restart(|| info!("Image activated; device would restart now"));

    let file = fs::File::open(messages).with_context(|| format!("opening {}", messages.display()))?;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        agent.poll();
        agent.handle(&topic, &line);
        if agent.state() == TransferState::Error {
            warn!(line = line_no + 1, "Transfer failed at this message");
        }
    }
    agent.poll();

    let stats = agent.statistics();
    info!(
        state = %agent.state(),
        chunks = stats.chunk_count,
        bytes = stats.received_bytes,
        speed = %format!("{:.0} B/s", stats.average_speed()),
        progress_reports = reports.borrow().progress.len(),
        "Replay finished"
    );

    match agent.state() {
        TransferState::Success => {
            info!(
                path = %agent.sink().active_path().display(),
                version = reports.borrow().succeeded.as_deref().unwrap_or_default(),
                "Firmware installed"
            );
            Ok(())
        }
        state => bail!(
            "update did not complete (state {}): {}",
            state,
            reports
                .borrow()
                .errors
                .last()
                .map(String::as_str)
                .unwrap_or("transfer incomplete")
        ),
    }
}

/// Reports seen by the observers during a replay.
#[derive(Debug, Default)]
struct Reports {
    progress: Vec<u8>,
    errors: Vec<String>,
    succeeded: Option<String>,
}

/// Log every progress, error and success report and keep a copy.
fn watch_reports<S: FirmwareSink>(agent: &mut OtaAgent<S>) -> Rc<RefCell<Reports>> {
    let reports = Rc::new(RefCell::new(Reports::default()));

    let log = reports.clone();
    agent.on_progress(move |progress, version| {
        info!(progress, version, "Update progress");
        log.borrow_mut().progress.push(progress);
    });
    let log = reports.clone();
    agent.on_error(move |message, version| {
        error!(version, "Update failed: {}", message);
        log.borrow_mut().errors.push(message.to_string());
    });
    let log = reports.clone();
    agent.on_success(move |version| {
        info!(version, "Update succeeded");
        log.borrow_mut().succeeded = Some(version.to_string());
    });
    reports
}

fn inspect(image_path: &Path) -> Result<()> {
    let data = fs::read(image_path).with_context(|| format!("reading {}", image_path.display()))?;
    let header = FirmwareHeader::parse(&data)?;
    print!("{}", header);
    println!("  size:      {} bytes", data.len());
    println!("  sha256:    {}", codec::checksum_bytes(&data));
    Ok(())
}

fn write_config(path: &Path) -> Result<()> {
    OtaConfig::default().save_to_file(path)?;
    info!(path = %path.display(), "Default configuration written");
    Ok(())
}
