use obs_python::RenamePolicy;
use serde::{Deserialize, Serialize};

/// What happens when a stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Pass the stage's input through unchanged and keep going.
    #[default]
    KeepInput,
    /// Stop at the first failing stage and return its error.
    Abort,
}

impl std::str::FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-input" | "keep_input" => Ok(FallbackPolicy::KeepInput),
            "abort" => Ok(FallbackPolicy::Abort),
            other => Err(format!("unknown fallback policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub rename_policy: RenamePolicy,
    pub fallback: FallbackPolicy,
    /// Log every stage diagnostic, not only fallbacks.
    pub verbose: bool,
}

impl PipelineOptions {
    pub fn with_rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.rename_policy = policy;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
