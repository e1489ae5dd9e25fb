use anyhow::{bail, Result};
use clap::Parser;
use procsim_core::socketio;
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "procsim-viz",
    about = "Live process cards and Gantt timeline for the scheduling simulator"
)]
pub struct Args {
    /// Base URL of the simulator's Socket.IO server (http, https, ws or wss).
    #[arg(long, env = "PROCSIM_HUB_URL", default_value = "http://127.0.0.1:5000")]
    pub hub_url: Url,
    /// Process count at which manual creation is disabled.
    #[arg(long, env = "PROCSIM_MAX_PROCESSES", default_value_t = 10)]
    pub max_processes: usize,
    /// Timeline refresh period while the chart is open.
    #[arg(long, env = "PROCSIM_REDRAW_MS", default_value_t = 1000)]
    pub redraw_ms: u64,
    /// Replay a recorded NDJSON event log instead of connecting.
    #[arg(long, env = "PROCSIM_REPLAY")]
    pub replay: Option<PathBuf>,
    #[arg(long, env = "PROCSIM_REPLAY_PACE_MS", default_value_t = 250)]
    pub replay_pace_ms: u64,
    #[arg(long, env = "PROCSIM_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Hub(Url),
    Replay { path: PathBuf, pace: Duration },
}

/// Where the open end of the timeline comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartClock {
    Wall,
    /// Latest transition seen in the cache; recorded sessions are not live.
    LastEvent,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub source: Source,
    pub max_processes: usize,
    pub redraw_period: Duration,
    pub clock: ChartClock,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.max_processes == 0 {
            bail!("--max-processes must be at least 1");
        }
        if args.redraw_ms == 0 {
            bail!("--redraw-ms must be at least 1");
        }
        let (source, clock) = match args.replay {
            Some(path) => (
                Source::Replay {
                    path,
                    pace: Duration::from_millis(args.replay_pace_ms),
                },
                ChartClock::LastEvent,
            ),
            None => (Source::Hub(socket_io_endpoint(&args.hub_url)?), ChartClock::Wall),
        };
        Ok(Self {
            source,
            max_processes: args.max_processes,
            redraw_period: Duration::from_millis(args.redraw_ms),
            clock,
            log_file: args.log_file,
        })
    }

    pub fn source_label(&self) -> String {
        match &self.source {
            Source::Hub(url) => url.to_string(),
            Source::Replay { path, .. } => format!("replay {}", path.display()),
        }
    }
}

/// Websocket URL of the Engine.IO transport behind `base`. A bare host gets
/// the default `/socket.io/` path; an explicit path is kept.
pub fn socket_io_endpoint(base: &Url) -> Result<Url> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => bail!("unsupported hub url scheme {other:?}"),
    };
    let mut url = base.clone();
    if url.set_scheme(scheme).is_err() {
        bail!("cannot use {base} as a websocket url");
    }
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(socketio::DEFAULT_PATH);
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", socketio::ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(url)
}

pub fn load_config() -> Result<Config> {
    Config::from_args(Args::parse())
}

/// The terminal belongs to the UI, so logs only go somewhere when a log
/// file is configured.
pub fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = log_file.map(|path| OpenOptions::new().create(true).append(true).open(path));
    match file {
        Some(Ok(file)) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Some(Err(err)) => {
            eprintln!("log_file_error: {err}");
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}
