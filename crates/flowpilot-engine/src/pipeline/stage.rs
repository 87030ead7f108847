use serde::Serialize;

/// Where an edit run currently is. Runs move strictly forward through
/// these stages; a failure at any point ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditStage {
    Idle,
    Fetching,
    Prompting,
    Generating,
    Extracting,
    Parsing,
    Sanitizing,
    Updating,
    Done,
}

impl EditStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Prompting => "prompting",
            Self::Generating => "generating",
            Self::Extracting => "extracting",
            Self::Parsing => "parsing",
            Self::Sanitizing => "sanitizing",
            Self::Updating => "updating",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for EditStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InvalidRequest,
    ConfigError,
    FetchError,
    ModelError,
    NoJsonFound,
    UnbalancedJson,
    ParseError,
    UpdateRejected,
    Conflict,
}
