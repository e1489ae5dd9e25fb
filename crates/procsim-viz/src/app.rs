use crate::channel::ChannelEvent;
use crate::config::{ChartClock, Config};
use crate::redraw::{RedrawTick, RedrawTimer};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use procsim_core::{
    cache::{CachedProcess, StateCache},
    card::{CardView, CreationGate, GateChange, ProcessAction},
    wire::{Command, PushEvent},
    ProcessSnapshot, SnapshotError,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overlay {
    None,
    Menu,
    Chart,
    Help,
}

pub struct App {
    pub config: Config,
    pub cache: StateCache,
    pub gate: CreationGate,
    command_tx: mpsc::Sender<Command>,
    redraw: RedrawTimer,
    pub connected: bool,
    pub source_done: bool,
    pub overlay: Overlay,
    pub selected: usize,
    /// Time the chart's open end is drawn at; refreshed on redraw ticks and
    /// cache changes.
    pub chart_now: f64,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(config: Config, command_tx: mpsc::Sender<Command>, redraw: RedrawTimer) -> Self {
        let gate = CreationGate::new(config.max_processes);
        Self {
            config,
            cache: StateCache::new(),
            gate,
            command_tx,
            redraw,
            connected: false,
            source_done: false,
            overlay: Overlay::None,
            selected: 0,
            chart_now: 0.0,
            status_note: None,
        }
    }

    pub fn apply_channel_event(&mut self, event: ChannelEvent, wall_now: f64) {
        match event {
            ChannelEvent::Connected => {
                self.connected = true;
                self.status_note = Some("connected".to_string());
            }
            ChannelEvent::Disconnected => {
                self.connected = false;
                self.status_note = Some(if self.cache.is_empty() {
                    "backend offline; retrying".to_string()
                } else {
                    "backend offline; holding last snapshot".to_string()
                });
            }
            ChannelEvent::Exhausted => {
                self.connected = false;
                self.source_done = true;
                self.status_note = Some("replay finished".to_string());
            }
            ChannelEvent::Push(event) => self.apply_push(event, wall_now),
        }
    }

    fn apply_push(&mut self, event: PushEvent, wall_now: f64) {
        match event {
            PushEvent::UpdateProcess(snapshot) => {
                let id = snapshot.id;
                match self.cache.apply_update(snapshot) {
                    Ok(_) => {
                        if let Some(change) = self.gate.observe(self.cache.len()) {
                            self.note_gate_change(change);
                        }
                    }
                    Err(err) => self.reject_snapshot("update_process", id, err),
                }
            }
            PushEvent::FinalizeProcess(snapshot) => {
                let id = snapshot.id;
                match self.cache.apply_finalize(snapshot) {
                    Ok(_) => info!(event = "process_finalized", id),
                    Err(err) => self.reject_snapshot("finalize_process", id, err),
                }
            }
            PushEvent::Reset => {
                let cleared = self.cache.reset();
                if let Some(change) = self.gate.reset() {
                    self.note_gate_change(change);
                }
                self.selected = 0;
                if self.overlay == Overlay::Menu {
                    self.overlay = Overlay::None;
                }
                info!(event = "cache_reset", cleared);
            }
        }
        self.clamp_selection();
        self.refresh_chart_clock(wall_now);
    }

    fn reject_snapshot(&mut self, kind: &'static str, id: u64, err: SnapshotError) {
        warn!(event = "snapshot_rejected", kind, id, error = %err);
        self.status_note = Some(format!("ignored bad {kind} for process {id}"));
    }

    fn note_gate_change(&mut self, change: GateChange) {
        info!(event = "creation_gate", change = ?change, max = self.gate.max_processes());
        self.status_note = Some(match change {
            GateChange::CreationDisabled => format!(
                "process limit ({}) reached; reset with R",
                self.gate.max_processes()
            ),
            GateChange::CreationEnabled => "process creation available".to_string(),
        });
    }

    pub fn on_redraw_tick(&mut self, tick: RedrawTick, wall_now: f64) -> bool {
        if self.overlay != Overlay::Chart || !self.redraw.is_live(tick) {
            return false;
        }
        self.refresh_chart_clock(wall_now);
        true
    }

    fn refresh_chart_clock(&mut self, wall_now: f64) {
        if self.overlay != Overlay::Chart {
            return;
        }
        self.chart_now = match self.config.clock {
            ChartClock::Wall => wall_now,
            ChartClock::LastEvent => self.cache.latest_timestamp().unwrap_or(wall_now),
        };
    }

    pub fn open_chart(&mut self, wall_now: f64) {
        self.overlay = Overlay::Chart;
        self.redraw.arm();
        self.refresh_chart_clock(wall_now);
    }

    pub fn close_overlay(&mut self) {
        if self.overlay == Overlay::Chart {
            self.redraw.cancel();
        }
        self.overlay = Overlay::None;
    }

    pub fn chart_timer_armed(&self) -> bool {
        self.redraw.is_armed()
    }

    pub fn chart_snapshots(&self) -> Vec<&ProcessSnapshot> {
        self.cache.snapshot_all()
    }

    pub fn selected_entry(&self) -> Option<&CachedProcess> {
        self.cache.entry_at(self.selected)
    }

    fn clamp_selection(&mut self) {
        let len = self.cache.len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.cache.len();
        if len == 0 {
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    fn send(&mut self, command: Command) {
        if !self.connected {
            warn!(event = "command_dropped", reason = "offline", command = command.name());
            self.status_note = Some(format!("{} not sent: backend offline", command.name()));
            return;
        }
        match self.command_tx.try_send(command) {
            Ok(()) => {
                info!(event = "command_sent", command = command.name(), id = ?command.target());
                self.status_note = Some(match command.target() {
                    Some(id) => format!("{} sent for process {id}", command.name()),
                    None => format!("{} sent", command.name()),
                });
            }
            Err(TrySendError::Full(command)) | Err(TrySendError::Closed(command)) => {
                warn!(event = "command_dropped", reason = "queue", command = command.name());
                self.status_note = Some(format!("{} dropped: command queue unavailable", command.name()));
            }
        }
    }

    fn add_process(&mut self) {
        if self.gate.can_add() {
            self.send(Command::AddProcess);
        } else {
            self.status_note = Some(format!(
                "limit of {} processes reached; reset with R",
                self.gate.max_processes()
            ));
        }
    }

    fn reset_all(&mut self) {
        if self.gate.can_reset() {
            self.send(Command::ResetAll);
        } else {
            self.status_note = Some("reset becomes available once the process limit is reached".to_string());
        }
    }

    fn open_menu(&mut self) {
        match self.selected_entry().map(CardView::project) {
            Some(card) if card.menu_enabled => self.overlay = Overlay::Menu,
            Some(card) => self.status_note = Some(format!("process {} has finished", card.id)),
            None => {}
        }
    }

    fn run_action(&mut self, action: ProcessAction) {
        let Some(card) = self.selected_entry().map(CardView::project) else {
            self.overlay = Overlay::None;
            return;
        };
        if card.allows(action) {
            self.send(action.command(card.id));
            self.overlay = Overlay::None;
        } else {
            self.status_note = Some(format!(
                "{} is not available for process {}",
                action.label().to_lowercase(),
                card.id
            ));
        }
    }
}

/// Returns true when the app should quit.
pub fn handle_input(event: Event, app: &mut App, wall_now: f64) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app, wall_now),
        _ => false,
    }
}

fn handle_key(key: KeyEvent, app: &mut App, wall_now: f64) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match app.overlay {
        Overlay::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.close_overlay();
            }
            false
        }
        Overlay::Menu => {
            match key.code {
                KeyCode::Char('s') => app.run_action(ProcessAction::Start),
                KeyCode::Char('b') => app.run_action(ProcessAction::Block),
                KeyCode::Char('u') => app.run_action(ProcessAction::Unblock),
                KeyCode::Char('x') => app.run_action(ProcessAction::Stop),
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.close_overlay(),
                _ => {}
            }
            false
        }
        Overlay::Chart => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('g') | KeyCode::Char('q')) {
                app.close_overlay();
            }
            false
        }
        Overlay::None => match key.code {
            KeyCode::Char('q') => true,
            KeyCode::Char('?') | KeyCode::F(1) => {
                app.overlay = Overlay::Help;
                false
            }
            KeyCode::Char('g') => {
                app.open_chart(wall_now);
                false
            }
            KeyCode::Char('a') => {
                app.add_process();
                false
            }
            KeyCode::Char('S') => {
                app.send(Command::StartAll);
                false
            }
            KeyCode::Char('R') => {
                app.reset_all();
                false
            }
            KeyCode::Enter | KeyCode::Char('m') => {
                app.open_menu();
                false
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.move_selection(1);
                false
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.move_selection(-1);
                false
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Source;
    use crate::redraw::RedrawTick;
    use procsim_core::wire::ProcessTarget;
    use procsim_core::{ProcessState, Transition};
    use std::time::Duration;

    struct Harness {
        app: App,
        commands: mpsc::Receiver<Command>,
        ticks: mpsc::Receiver<RedrawTick>,
    }

    fn harness(max_processes: usize, clock: ChartClock) -> Harness {
        let config = Config {
            source: Source::Hub("ws://127.0.0.1:5000/ws".parse().unwrap()),
            max_processes,
            redraw_period: Duration::from_secs(1),
            clock,
            log_file: None,
        };
        let (command_tx, commands) = mpsc::channel(8);
        let (tick_tx, ticks) = mpsc::channel(8);
        let redraw = RedrawTimer::new(tick_tx, config.redraw_period);
        let mut app = App::new(config, command_tx, redraw);
        app.apply_channel_event(ChannelEvent::Connected, 0.0);
        Harness {
            app,
            commands,
            ticks,
        }
    }

    fn snapshot(id: u64, state: ProcessState, at: f64) -> ProcessSnapshot {
        ProcessSnapshot {
            id,
            state,
            total_work: 10.0,
            executed_work: 1.0,
            last_burst_duration_ms: 0.0,
            history: vec![
                Transition::new(100.0, ProcessState::New),
                Transition::new(at, state),
            ],
        }
    }

    fn update(id: u64, state: ProcessState, at: f64) -> ChannelEvent {
        ChannelEvent::Push(PushEvent::UpdateProcess(snapshot(id, state, at)))
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn limit_disables_creation_until_reset() {
        let mut h = harness(2, ChartClock::Wall);
        h.app.apply_channel_event(update(1, ProcessState::New, 100.0), 0.0);
        assert!(h.app.gate.can_add());
        h.app.apply_channel_event(update(2, ProcessState::New, 100.0), 0.0);
        assert!(h.app.gate.is_locked());
        assert!(h.app.status_note.as_deref().unwrap_or_default().contains("limit"));

        handle_input(key(KeyCode::Char('a')), &mut h.app, 0.0);
        assert!(h.commands.try_recv().is_err());

        handle_input(key(KeyCode::Char('R')), &mut h.app, 0.0);
        assert_eq!(h.commands.try_recv().ok(), Some(Command::ResetAll));

        h.app.apply_channel_event(ChannelEvent::Push(PushEvent::Reset), 0.0);
        assert!(h.app.cache.is_empty());
        assert!(h.app.gate.can_add());
        handle_input(key(KeyCode::Char('a')), &mut h.app, 0.0);
        assert_eq!(h.commands.try_recv().ok(), Some(Command::AddProcess));
    }

    #[tokio::test]
    async fn menu_sends_targeted_commands_and_respects_start_latch() {
        let mut h = harness(10, ChartClock::Wall);
        h.app.apply_channel_event(update(1, ProcessState::New, 100.0), 0.0);
        h.app.apply_channel_event(update(2, ProcessState::Ready, 101.0), 0.0);

        handle_input(key(KeyCode::Enter), &mut h.app, 0.0);
        assert_eq!(h.app.overlay, Overlay::Menu);
        handle_input(key(KeyCode::Char('s')), &mut h.app, 0.0);
        assert_eq!(
            h.commands.try_recv().ok(),
            Some(Command::StartProcess(ProcessTarget { id: 1 }))
        );
        assert_eq!(h.app.overlay, Overlay::None);

        handle_input(key(KeyCode::Char('j')), &mut h.app, 0.0);
        handle_input(key(KeyCode::Enter), &mut h.app, 0.0);
        handle_input(key(KeyCode::Char('s')), &mut h.app, 0.0);
        assert!(h.commands.try_recv().is_err());
        assert_eq!(h.app.overlay, Overlay::Menu);
        handle_input(key(KeyCode::Char('b')), &mut h.app, 0.0);
        assert_eq!(
            h.commands.try_recv().ok(),
            Some(Command::BlockProcess(ProcessTarget { id: 2 }))
        );
    }

    #[tokio::test]
    async fn finalized_process_has_no_menu() {
        let mut h = harness(10, ChartClock::Wall);
        h.app.apply_channel_event(
            ChannelEvent::Push(PushEvent::FinalizeProcess(snapshot(
                3,
                ProcessState::Finished,
                105.0,
            ))),
            0.0,
        );
        handle_input(key(KeyCode::Enter), &mut h.app, 0.0);
        assert_eq!(h.app.overlay, Overlay::None);
        assert!(h.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn bad_snapshot_keeps_last_good_state() {
        let mut h = harness(10, ChartClock::Wall);
        h.app.apply_channel_event(update(1, ProcessState::Running, 103.0), 0.0);
        let mut bad = snapshot(1, ProcessState::Blocked, 104.0);
        bad.executed_work = -1.0;
        h.app
            .apply_channel_event(ChannelEvent::Push(PushEvent::UpdateProcess(bad)), 0.0);

        let entry = h.app.cache.get(1).expect("entry kept");
        assert_eq!(entry.snapshot.state, ProcessState::Running);
        assert!(h.app.status_note.as_deref().unwrap_or_default().contains("ignored"));
    }

    #[tokio::test]
    async fn commands_are_dropped_while_offline() {
        let mut h = harness(10, ChartClock::Wall);
        h.app.apply_channel_event(ChannelEvent::Disconnected, 0.0);
        handle_input(key(KeyCode::Char('S')), &mut h.app, 0.0);
        assert!(h.commands.try_recv().is_err());
        assert!(h.app.status_note.as_deref().unwrap_or_default().contains("offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_chart_keeps_a_single_timer() {
        let mut h = harness(10, ChartClock::Wall);
        h.app.open_chart(10.0);
        h.app.close_overlay();
        handle_input(key(KeyCode::Char('g')), &mut h.app, 11.0);
        h.app.open_chart(12.0);
        assert!(h.app.chart_timer_armed());
        assert_eq!(h.app.chart_now, 12.0);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let mut live = 0;
        while let Ok(tick) = h.ticks.try_recv() {
            assert!(h.app.on_redraw_tick(tick, 20.0));
            live += 1;
        }
        assert!(live >= 1 && live <= 2);
        assert_eq!(h.app.chart_now, 20.0);

        handle_input(key(KeyCode::Esc), &mut h.app, 21.0);
        assert!(!h.app.chart_timer_armed());
        tokio::time::sleep(Duration::from_secs(3)).await;
        while let Ok(tick) = h.ticks.try_recv() {
            assert!(!h.app.on_redraw_tick(tick, 30.0));
        }
        assert_eq!(h.app.chart_now, 20.0);
    }

    #[tokio::test]
    async fn reset_while_chart_open_falls_back_to_no_data() {
        let mut h = harness(10, ChartClock::LastEvent);
        h.app.apply_channel_event(update(1, ProcessState::Running, 104.0), 0.0);
        h.app.open_chart(999.0);
        assert_eq!(h.app.chart_now, 104.0);

        h.app
            .apply_channel_event(ChannelEvent::Push(PushEvent::Reset), 1000.0);
        assert!(h.app.chart_snapshots().is_empty());
        assert_eq!(h.app.chart_now, 1000.0);
        assert_eq!(h.app.overlay, Overlay::Chart);
        h.app.close_overlay();
    }
}
