// scale-monitor: list USB-serial scales and print the frames they send.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use scalelink::settings::{default_settings_path, load_settings};
use scalelink::{ConnectionSession, DeviceDescriptor, SessionEvent, SessionSettings};

#[derive(Parser)]
#[command(name = "scale-monitor", version, about = "USB-serial scale frame monitor")]
struct Cli {
    /// Settings file (defaults to <config_dir>/scalelink/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List USB serial devices as `name  vendorId:productId`
    List,
    /// Connect to a device and print frames until stopped
    Monitor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        vendor_id: String,
        #[arg(long)]
        product_id: String,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<usize>,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn resolve_settings(path: Option<PathBuf>) -> Result<SessionSettings, String> {
    let path = match path {
        Some(path) => path,
        None => match default_settings_path() {
            Ok(path) => path,
            Err(_) => return Ok(SessionSettings::default()),
        },
    };
    load_settings(&path).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(ref dir) = cli.log_dir {
        if let Err(e) = scalelink::logging::init_file_logging(dir) {
            eprintln!("{}", e);
        }
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };

    scalelink::logging::stop_file_logging();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), String> {
    let settings = resolve_settings(cli.settings)?;
    let mut session = ConnectionSession::system(settings);

    match cli.command {
        Command::List => {
            let devices = session
                .get_devices()
                .map_err(|e| format!("{}: {}", e.code(), e))?;
            if devices.is_empty() {
                println!("No USB serial devices found");
            }
            for (name, ids) in devices {
                println!("{}  {}", name, ids);
            }
            Ok(())
        }
        Command::Monitor {
            name,
            vendor_id,
            product_id,
            frames,
            seconds,
            json,
        } => {
            let mut events = session.subscribe();
            let selector = DeviceDescriptor::new(name, vendor_id, product_id);
            let message = session
                .connect(&selector)
                .map_err(|e| format!("{}: {}", e.code(), e))?;
            eprintln!("{}", message);

            let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
            let mut seen = 0usize;

            loop {
                if frames.map(|limit| seen >= limit).unwrap_or(false) {
                    break;
                }

                let next = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, events.recv()).await {
                        Ok(event) => event,
                        Err(_) => break,
                    },
                    None => events.recv().await,
                };

                let Some(event) = next else { break };
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("Failed to serialize event: {}", e),
                    }
                }
                match event {
                    SessionEvent::Frame(frame) => {
                        seen += 1;
                        if !json {
                            println!("{}", frame.to_hex());
                        }
                    }
                    SessionEvent::Error { code, message } => {
                        if !json {
                            eprintln!("{}: {}", code.as_str(), message);
                        }
                        break;
                    }
                }
            }

            let message = tokio::task::spawn_blocking(move || session.disconnect())
                .await
                .map_err(|e| format!("disconnect task failed: {}", e))?
                .map_err(|e| format!("{}: {}", e.code(), e))?;
            eprintln!("{}", message);
            Ok(())
        }
    }
}
