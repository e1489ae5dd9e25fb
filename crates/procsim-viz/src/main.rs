mod app;
mod channel;
mod config;
mod redraw;
mod theme;
mod ui;

use anyhow::Result;
use app::{handle_input, App};
use channel::{hub_loop, replay_loop};
use chrono::Utc;
use config::{init_logging, load_config, Source};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use redraw::RedrawTimer;
use std::io::{self, Stdout};
use tokio::sync::mpsc;
use tracing::info;

const COMMAND_QUEUE_CAPACITY: usize = 64;
const CHANNEL_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(config.log_file.as_deref());
    info!(event = "startup", source = %config.source_label(), max_processes = config.max_processes);

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (channel_tx, mut channel_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
    let (redraw_tx, mut redraw_rx) = mpsc::channel(4);
    match config.source.clone() {
        Source::Hub(url) => {
            tokio::spawn(hub_loop(url, channel_tx, command_rx));
        }
        Source::Replay { path, pace } => {
            tokio::spawn(replay_loop(path, pace, channel_tx, command_rx));
        }
    }
    let redraw = RedrawTimer::new(redraw_tx, config.redraw_period);
    let mut app = App::new(config, command_tx, redraw);

    enable_raw_mode()?;
    let mut terminal = or_rollback(enter_terminal(), || {
        let _ = disable_raw_mode();
    })?;

    let outcome = run(&mut terminal, &mut app, &mut channel_rx, &mut redraw_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!(event = "shutdown");
    outcome
}

fn enter_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    or_rollback(
        Terminal::new(CrosstermBackend::new(stdout)).map_err(Into::into),
        || {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        },
    )
}

/// Hands `result` back unchanged, running `rollback` first when it failed.
fn or_rollback<T>(result: Result<T>, rollback: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        rollback();
    }
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    channel_rx: &mut mpsc::Receiver<channel::ChannelEvent>,
    redraw_rx: &mut mpsc::Receiver<redraw::RedrawTick>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut dirty = true;

    loop {
        if dirty {
            terminal.draw(|frame| ui::render_ui(frame, app))?;
            dirty = false;
        }
        tokio::select! {
            Some(event) = channel_rx.recv() => {
                app.apply_channel_event(event, now_seconds());
                dirty = true;
            }
            Some(tick) = redraw_rx.recv() => {
                dirty = app.on_redraw_tick(tick, now_seconds());
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if handle_input(event, app, now_seconds()) {
                            break;
                        }
                        dirty = true;
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

/// Wall clock in seconds, the unit the backend stamps history with.
fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
