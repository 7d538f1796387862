// Transport state machine:
//
//   Stopped --Start--> Running --Stop--> Stopped
//
// A Start is valid from any state and always resets playback positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        *self != TransportState::Stopped
    }
}

// Recording state machine:
//
//   Idle        --Record ON + Step----------> Step
//   Idle        --Record ON + Live+running--> Live
//   Idle        --Record ON + Live+stopped--> LivePending
//   Live        --Record OFF---------------> Idle  (finalize held notes)
//   Live        --Mode to Step-------------> Step  (finalize held notes)
//   Step        --Record OFF---------------> Idle
//   Step        --Mode to Live + running---> Live
//   Step        --Mode to Live + stopped---> LivePending
//   LivePending --Record OFF---------------> Idle
//   LivePending --Mode to Step-------------> Step
//   LivePending --Transport starts---------> Live
//
// Entering Live in Replace mode clears the record track first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Idle,
    Live,
    Step,
    /// Record ON in live mode while the transport is stopped; promoted to
    /// Live when the transport starts.
    LivePending,
}

impl RecordState {
    pub fn is_recording(&self) -> bool {
        *self != RecordState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_queries() {
        assert!(!TransportState::Stopped.is_running());
        assert!(TransportState::Running.is_running());
        assert!(!RecordState::Idle.is_recording());
        assert!(RecordState::LivePending.is_recording());
    }
}
