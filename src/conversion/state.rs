use crate::events::StatusEvent;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversionState {
    #[default]
    Idle,
    Converting { filename: String },
}

impl ConversionState {
    pub fn is_converting(&self) -> bool {
        matches!(self, ConversionState::Converting { .. })
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            ConversionState::Converting { filename } => Some(filename),
            ConversionState::Idle => None,
        }
    }
}

impl From<&ConversionState> for StatusEvent {
    fn from(state: &ConversionState) -> Self {
        match state {
            ConversionState::Idle => StatusEvent::Idle,
            ConversionState::Converting { filename } => StatusEvent::Converting {
                filename: filename.clone(),
            },
        }
    }
}
