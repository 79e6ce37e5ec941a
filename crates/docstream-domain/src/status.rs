//! Status module - lifecycle stages for analysis tasks

/// Status of one analysis task
///
/// Tasks move strictly forward through these stages:
/// - Queued: accepted, no connection attempt yet
/// - Connecting: connection opened, no frame received yet
/// - Streaming: at least one frame received
/// - Completed / Failed / Cancelled: terminal, never left again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Submitted, waiting for its connection attempt
    Queued,

    /// Connection attempt in flight
    Connecting,

    /// Receiving frames
    Streaming,

    /// Upstream signalled the end of generation
    Completed,

    /// Upstream reported an error or the connection broke
    Failed,

    /// Cancelled by the caller
    Cancelled,
}

impl TaskStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Connecting => "connecting",
            TaskStatus::Streaming => "streaming",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queued" => Some(TaskStatus::Queued),
            "connecting" => Some(TaskStatus::Connecting),
            "streaming" => Some(TaskStatus::Streaming),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Position along the lifecycle; terminal states share the last rank
    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::Connecting => 1,
            TaskStatus::Streaming => 2,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotone
    ///
    /// `Streaming → Streaming` is the only allowed self-loop.
    ///
    /// # Examples
    ///
    /// ```
    /// use docstream_domain::TaskStatus;
    ///
    /// assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Connecting));
    /// assert!(TaskStatus::Streaming.can_transition_to(TaskStatus::Streaming));
    /// assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
    /// ```
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (TaskStatus::Streaming, TaskStatus::Streaming) => true,
            // Only streaming tasks can finish normally
            (_, TaskStatus::Completed) => *self == TaskStatus::Streaming,
            (_, TaskStatus::Failed) | (_, TaskStatus::Cancelled) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid task status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 6] = [
        TaskStatus::Queued,
        TaskStatus::Connecting,
        TaskStatus::Streaming,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    #[test]
    fn test_forward_progression() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Connecting));
        assert!(TaskStatus::Connecting.can_transition_to(TaskStatus::Streaming));
        assert!(TaskStatus::Streaming.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Connecting.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Cancelled));
    }

    #[test]
    fn test_no_regression() {
        assert!(!TaskStatus::Streaming.can_transition_to(TaskStatus::Connecting));
        assert!(!TaskStatus::Connecting.can_transition_to(TaskStatus::Queued));
        assert!(!TaskStatus::Connecting.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_parse_round_trip() {
        for status in ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!("STREAMING".parse::<TaskStatus>(), Ok(TaskStatus::Streaming));
        assert!("paused".parse::<TaskStatus>().is_err());
    }
}
