use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod cache;
pub mod card;
pub mod socketio;
pub mod timeline;
pub mod wire;

pub type ProcessId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Blocked,
    Finished,
    Stopped,
}

impl ProcessState {
    pub const ALL: [ProcessState; 6] = [
        ProcessState::New,
        ProcessState::Ready,
        ProcessState::Running,
        ProcessState::Blocked,
        ProcessState::Finished,
        ProcessState::Stopped,
    ];

    /// Label used on the wire by the simulator backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::New => "Nuevo",
            ProcessState::Ready => "Listo",
            ProcessState::Running => "En Ejecución",
            ProcessState::Blocked => "Bloqueado",
            ProcessState::Finished => "Finalizado",
            ProcessState::Stopped => "Detenido",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::Stopped)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(state) = ProcessState::ALL
            .iter()
            .find(|state| state.as_str() == input)
        {
            return Ok(*state);
        }
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "nuevo" | "new" => Ok(ProcessState::New),
            "listo" | "ready" => Ok(ProcessState::Ready),
            "en ejecución" | "en ejecucion" | "running" => Ok(ProcessState::Running),
            "bloqueado" | "blocked" => Ok(ProcessState::Blocked),
            "finalizado" | "finished" => Ok(ProcessState::Finished),
            "detenido" | "stopped" => Ok(ProcessState::Stopped),
            other => Err(format!("Unknown process state: {other}")),
        }
    }
}

impl Serialize for ProcessState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProcessState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of a process's transition log, encoded on the wire as
/// `[timestampSeconds, state]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, ProcessState)", into = "(f64, ProcessState)")]
pub struct Transition {
    pub at: f64,
    pub state: ProcessState,
}

impl Transition {
    pub fn new(at: f64, state: ProcessState) -> Self {
        Self { at, state }
    }
}

impl From<(f64, ProcessState)> for Transition {
    fn from((at, state): (f64, ProcessState)) -> Self {
        Self { at, state }
    }
}

impl From<Transition> for (f64, ProcessState) {
    fn from(transition: Transition) -> Self {
        (transition.at, transition.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    #[serde(alias = "estado")]
    pub state: ProcessState,
    #[serde(alias = "tiempo_total")]
    pub total_work: f64,
    #[serde(alias = "tiempo_ejecutado")]
    pub executed_work: f64,
    #[serde(default, alias = "last_execution_time_ms")]
    pub last_burst_duration_ms: f64,
    pub history: Vec<Transition>,
}

impl ProcessSnapshot {
    pub fn first_transition(&self) -> Option<&Transition> {
        self.history.first()
    }

    pub fn last_transition(&self) -> Option<&Transition> {
        self.history.last()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Checks the parts of a snapshot the cache and the timeline rely on.
    /// Transition legality is the backend's business and is not checked.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for (field, value) in [
            ("totalWork", self.total_work),
            ("executedWork", self.executed_work),
            ("lastBurstDurationMs", self.last_burst_duration_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SnapshotError::InvalidCounter {
                    id: self.id,
                    field,
                    value,
                });
            }
        }

        let mut previous: Option<f64> = None;
        for (index, transition) in self.history.iter().enumerate() {
            if !transition.at.is_finite() {
                return Err(SnapshotError::NonFiniteTimestamp { id: self.id, index });
            }
            if let Some(previous) = previous {
                if transition.at < previous {
                    return Err(SnapshotError::NonMonotonicHistory {
                        id: self.id,
                        index,
                        previous,
                        current: transition.at,
                    });
                }
            }
            previous = Some(transition.at);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("process {id}: {field} must be a non-negative finite number, got {value}")]
    InvalidCounter {
        id: ProcessId,
        field: &'static str,
        value: f64,
    },
    #[error("process {id}: history timestamp at index {index} is not finite")]
    NonFiniteTimestamp { id: ProcessId, index: usize },
    #[error("process {id}: history goes backwards at index {index} ({previous} > {current})")]
    NonMonotonicHistory {
        id: ProcessId,
        index: usize,
        previous: f64,
        current: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(history: Vec<Transition>) -> ProcessSnapshot {
        ProcessSnapshot {
            id: 4,
            state: ProcessState::Running,
            total_work: 12.0,
            executed_work: 3.5,
            last_burst_duration_ms: 950.0,
            history,
        }
    }

    #[test]
    fn state_labels_round_trip_exactly() {
        for state in ProcessState::ALL {
            let encoded = serde_json::to_string(&state).unwrap();
            assert_eq!(encoded, format!("\"{}\"", state.as_str()));
            let decoded: ProcessState = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn state_parser_accepts_english_aliases() {
        assert_eq!("running".parse::<ProcessState>(), Ok(ProcessState::Running));
        assert_eq!(" Blocked ".parse::<ProcessState>(), Ok(ProcessState::Blocked));
        assert_eq!("STOPPED".parse::<ProcessState>(), Ok(ProcessState::Stopped));
        assert!("zombie".parse::<ProcessState>().is_err());
    }

    #[test]
    fn snapshot_decodes_camel_case_and_backend_field_names() {
        let camel: ProcessSnapshot = serde_json::from_str(
            r#"{
                "id": 3,
                "state": "En Ejecución",
                "totalWork": 10,
                "executedWork": 2.5,
                "lastBurstDurationMs": 812.4,
                "history": [[100.0, "Nuevo"], [101.5, "Listo"], [102.0, "En Ejecución"]]
            }"#,
        )
        .expect("camelCase snapshot");
        assert_eq!(camel.state, ProcessState::Running);
        assert_eq!(camel.history.len(), 3);
        assert_eq!(camel.history[1], Transition::new(101.5, ProcessState::Ready));

        let backend: ProcessSnapshot = serde_json::from_str(
            r#"{
                "id": 3,
                "estado": "Bloqueado",
                "tiempo_total": 9,
                "tiempo_ejecutado": 1,
                "last_execution_time_ms": 0,
                "history": [[100.0, "Nuevo"]]
            }"#,
        )
        .expect("backend snapshot");
        assert_eq!(backend.state, ProcessState::Blocked);
        assert_eq!(backend.total_work, 9.0);
    }

    #[test]
    fn snapshot_without_history_is_malformed() {
        let result = serde_json::from_str::<ProcessSnapshot>(
            r#"{"id": 1, "state": "Nuevo", "totalWork": 1, "executedWork": 0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn snapshot_serializes_history_as_pairs() {
        let value = serde_json::to_value(snapshot(vec![Transition::new(
            5.0,
            ProcessState::Running,
        )]))
        .unwrap();
        assert_eq!(value["history"], serde_json::json!([[5.0, "En Ejecución"]]));
        assert_eq!(value["lastBurstDurationMs"], serde_json::json!(950.0));
    }

    #[test]
    fn validate_rejects_backwards_history() {
        let err = snapshot(vec![
            Transition::new(10.0, ProcessState::New),
            Transition::new(9.0, ProcessState::Ready),
        ])
        .validate()
        .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::NonMonotonicHistory { index: 1, .. }
        ));
    }

    #[test]
    fn validate_rejects_negative_and_nan_counters() {
        let mut negative = snapshot(Vec::new());
        negative.executed_work = -1.0;
        assert!(matches!(
            negative.validate(),
            Err(SnapshotError::InvalidCounter {
                field: "executedWork",
                ..
            })
        ));

        let mut nan = snapshot(Vec::new());
        nan.total_work = f64::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn validate_accepts_equal_timestamps() {
        let ok = snapshot(vec![
            Transition::new(1.0, ProcessState::Ready),
            Transition::new(1.0, ProcessState::Running),
        ]);
        assert!(ok.validate().is_ok());
    }
}
