use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{Command, MeasureSpec, ResolvedSize, Response, ScaleMode, VideoDimensions, layout};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "lvctl")]
#[command(about = "Loopview Daemon Control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the daemon to check if it's running
    Ping,

    /// Show the playback session
    Status,

    /// Announce a drawing surface to the daemon
    Available {
        /// Surface name (defaults to the configured surface)
        #[arg(short, long)]
        name: Option<String>,

        /// Native window handle to render into (decimal or 0x-prefixed hex)
        #[arg(short, long, value_parser = parse_window_handle)]
        window_handle: Option<u64>,
    },

    /// Report a format or size change of the current surface
    Changed {
        /// Pixel format code
        #[arg(short, long, default_value = "0")]
        format: i32,

        #[arg(short = 'W', long)]
        width: u32,

        #[arg(short = 'H', long)]
        height: u32,
    },

    /// Tell the daemon the surface is gone
    Gone,

    /// Release the playback session
    Release,

    /// Ask the daemon for a measurement pass
    MeasureRemote {
        /// Width constraint (exact:N, at-most:N or unspecified)
        #[arg(short = 'W', long, default_value = "unspecified")]
        width: MeasureSpec,

        /// Height constraint (exact:N, at-most:N or unspecified)
        #[arg(short = 'H', long, default_value = "unspecified")]
        height: MeasureSpec,
    },

    /// Resolve a layout locally, without a daemon
    Measure {
        /// Native video resolution, e.g. 1920x1080 (0x0 when unknown)
        #[arg(short, long)]
        video: VideoDimensions,

        /// Width constraint (exact:N, at-most:N or unspecified)
        #[arg(short = 'W', long, default_value = "unspecified")]
        width: MeasureSpec,

        /// Height constraint (exact:N, at-most:N or unspecified)
        #[arg(short = 'H', long, default_value = "unspecified")]
        height: MeasureSpec,

        /// Scale mode (none, center, fit-horizontal, fit-vertical, fit-all or 0-4)
        #[arg(short, long, default_value = "none")]
        mode: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Kill the running daemon
    Kill,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Measure {
            video,
            width,
            height,
            mode,
            json,
        } => {
            let mode = ScaleMode::parse(&mode)?;
            let size = measure_offline(video, width, height, mode);
            if json {
                println!("{}", serde_json::to_string(&size)?);
            } else {
                println!("{}", size);
            }
            return Ok(());
        }
        Commands::Ping => Command::Ping,
        Commands::Status => Command::Status,
        Commands::Available {
            name,
            window_handle,
        } => Command::SurfaceAvailable {
            name,
            window_handle,
        },
        Commands::Changed {
            format,
            width,
            height,
        } => Command::SurfaceChanged {
            format,
            width,
            height,
        },
        Commands::Gone => Command::SurfaceGone,
        Commands::Release => Command::Release,
        Commands::MeasureRemote { width, height } => Command::Measure { width, height },
        Commands::Kill => Command::Kill,
    };

    match send_command(command).await {
        Ok(response) => {
            handle_response(response);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("\nIs the daemon running? Try starting it with: loopview");
            std::process::exit(1);
        }
    }
}

fn measure_offline(
    video: VideoDimensions,
    width: MeasureSpec,
    height: MeasureSpec,
    mode: Option<ScaleMode>,
) -> ResolvedSize {
    match mode {
        Some(mode) => layout::resolve(video, width, height, mode),
        None => layout::resolve_unscaled(video, width, height),
    }
}

fn parse_window_handle(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid window handle '{}': {}", value, e))
}

async fn send_command(command: Command) -> Result<Response> {
    let socket_path = common::get_socket_path();

    let stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command_json = serde_json::to_string(&command)?;
    writer.write_all(command_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;

    let response: Response = serde_json::from_str(&response_line)?;
    Ok(response)
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
        Response::Measured(size) => {
            println!("{}", size);
        }
        Response::Status(status) => {
            println!("Daemon Status:");
            println!("  Version: {}", status.version);
            println!("  Uptime: {}s", status.uptime_secs);
            println!("  Source: {}", status.source);
            println!(
                "  Scale: {}",
                status
                    .scale_mode
                    .map_or("none".to_string(), |mode| mode.to_string())
            );
            println!(
                "  Surface: {}",
                status.surface.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Session: {} (cycle {}){}",
                status.state,
                status.cycle,
                if status.has_engine { "" } else { ", no engine" }
            );
            if status.video.is_unknown() {
                println!("  Video: unknown");
            } else {
                println!("  Video: {}", status.video);
            }
            if let Some(size) = status.last_measured {
                println!("  Last layout: {}", size);
            }
            if let Some(error) = status.last_error {
                println!("  Last error: {}", error);
            }
        }
    }
}
