use crate::cache::CachedProcess;
use crate::wire::{Command, ProcessTarget};
use crate::{ProcessId, ProcessState};

pub fn progress_percent(total_work: f64, executed_work: f64) -> f64 {
    if total_work > 0.0 {
        (executed_work / total_work * 100.0).min(100.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardTone {
    Active,
    Blocked,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    Start,
    Block,
    Unblock,
    Stop,
}

impl ProcessAction {
    pub const ALL: [ProcessAction; 4] = [
        ProcessAction::Start,
        ProcessAction::Block,
        ProcessAction::Unblock,
        ProcessAction::Stop,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProcessAction::Start => "Start",
            ProcessAction::Block => "Block",
            ProcessAction::Unblock => "Unblock",
            ProcessAction::Stop => "Stop",
        }
    }

    pub fn command(self, id: ProcessId) -> Command {
        let target = ProcessTarget { id };
        match self {
            ProcessAction::Start => Command::StartProcess(target),
            ProcessAction::Block => Command::BlockProcess(target),
            ProcessAction::Unblock => Command::UnblockProcess(target),
            ProcessAction::Stop => Command::StopProcess(target),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: ProcessId,
    pub state: ProcessState,
    pub burst_ms: f64,
    pub percent: f64,
    pub tone: CardTone,
    pub menu_enabled: bool,
    pub can_start: bool,
}

impl CardView {
    pub fn project(entry: &CachedProcess) -> Self {
        let snapshot = &entry.snapshot;
        let tone = if entry.is_terminal() {
            CardTone::Finalized
        } else if snapshot.state == ProcessState::Blocked {
            CardTone::Blocked
        } else {
            CardTone::Active
        };
        Self {
            id: snapshot.id,
            state: snapshot.state,
            burst_ms: snapshot.last_burst_duration_ms,
            percent: progress_percent(snapshot.total_work, snapshot.executed_work),
            tone,
            menu_enabled: !entry.finalized,
            can_start: !entry.left_new,
        }
    }

    pub fn allows(&self, action: ProcessAction) -> bool {
        if !self.menu_enabled {
            return false;
        }
        match action {
            ProcessAction::Start => self.can_start,
            ProcessAction::Block | ProcessAction::Unblock | ProcessAction::Stop => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateChange {
    CreationDisabled,
    CreationEnabled,
}

/// Locks manual process creation once the configured maximum is reached.
/// Only a full reset unlocks it again.
#[derive(Debug, Clone)]
pub struct CreationGate {
    max_processes: usize,
    locked: bool,
}

impl CreationGate {
    pub fn new(max_processes: usize) -> Self {
        Self {
            max_processes,
            locked: false,
        }
    }

    pub fn max_processes(&self) -> usize {
        self.max_processes
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn can_add(&self) -> bool {
        !self.locked
    }

    pub fn can_reset(&self) -> bool {
        self.locked
    }

    pub fn observe(&mut self, process_count: usize) -> Option<GateChange> {
        if self.locked || process_count < self.max_processes {
            return None;
        }
        self.locked = true;
        Some(GateChange::CreationDisabled)
    }

    pub fn reset(&mut self) -> Option<GateChange> {
        if !self.locked {
            return None;
        }
        self.locked = false;
        Some(GateChange::CreationEnabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StateCache;
    use crate::{ProcessSnapshot, Transition};

    fn snapshot(id: ProcessId, state: ProcessState, total: f64, executed: f64) -> ProcessSnapshot {
        ProcessSnapshot {
            id,
            state,
            total_work: total,
            executed_work: executed,
            last_burst_duration_ms: 420.0,
            history: vec![Transition::new(1.0, state)],
        }
    }

    #[test]
    fn progress_is_capped_and_guarded() {
        assert_eq!(progress_percent(10.0, 5.0), 50.0);
        assert_eq!(progress_percent(10.0, 12.5), 100.0);
        assert_eq!(progress_percent(0.0, 3.0), 0.0);
    }

    #[test]
    fn card_tone_follows_state_and_finalize() {
        let mut cache = StateCache::new();
        cache.apply_update(snapshot(1, ProcessState::Blocked, 10.0, 2.0)).unwrap();
        cache.apply_update(snapshot(2, ProcessState::Stopped, 10.0, 2.0)).unwrap();
        cache.apply_finalize(snapshot(3, ProcessState::Finished, 10.0, 10.0)).unwrap();

        let tones: Vec<_> = cache.entries().map(|e| CardView::project(e).tone).collect();
        assert_eq!(
            tones,
            vec![CardTone::Blocked, CardTone::Finalized, CardTone::Finalized]
        );
        let finished = CardView::project(cache.get(3).unwrap());
        assert_eq!(finished.percent, 100.0);
        assert_eq!(finished.burst_ms, 420.0);
    }

    #[test]
    fn start_becomes_unavailable_after_leaving_new() {
        let mut cache = StateCache::new();
        cache.apply_update(snapshot(1, ProcessState::New, 10.0, 0.0)).unwrap();
        assert!(CardView::project(cache.get(1).unwrap()).allows(ProcessAction::Start));

        cache.apply_update(snapshot(1, ProcessState::Ready, 10.0, 0.0)).unwrap();
        cache.apply_update(snapshot(1, ProcessState::New, 10.0, 0.0)).unwrap();
        let card = CardView::project(cache.get(1).unwrap());
        assert!(!card.allows(ProcessAction::Start));
        assert!(card.allows(ProcessAction::Block));
    }

    #[test]
    fn finalized_card_disables_every_action() {
        let mut cache = StateCache::new();
        cache.apply_finalize(snapshot(5, ProcessState::Stopped, 10.0, 4.0)).unwrap();
        let card = CardView::project(cache.get(5).unwrap());
        assert!(!card.menu_enabled);
        assert!(ProcessAction::ALL.iter().all(|action| !card.allows(*action)));
    }

    #[test]
    fn actions_map_to_targeted_commands() {
        assert_eq!(
            ProcessAction::Unblock.command(9),
            Command::UnblockProcess(ProcessTarget { id: 9 })
        );
        assert_eq!(ProcessAction::Stop.command(2).target(), Some(2));
    }

    #[test]
    fn gate_locks_once_and_reopens_only_on_reset() {
        let mut gate = CreationGate::new(3);
        assert_eq!(gate.observe(1), None);
        assert_eq!(gate.observe(2), None);
        assert_eq!(gate.observe(3), Some(GateChange::CreationDisabled));
        assert_eq!(gate.observe(3), None);
        assert_eq!(gate.observe(4), None);
        assert!(!gate.can_add());
        assert!(gate.can_reset());

        assert_eq!(gate.reset(), Some(GateChange::CreationEnabled));
        assert_eq!(gate.reset(), None);
        assert!(gate.can_add());
        assert_eq!(gate.observe(3), Some(GateChange::CreationDisabled));
    }
}
