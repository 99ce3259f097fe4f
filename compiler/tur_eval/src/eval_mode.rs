//! Execution policies.
//!
//! `EvalMode` decides the budget an interpreter runs under and where its
//! output goes. Spawned tasks inherit the mode of the interpreter that
//! spawned them; a task's own `steps`/`time` options tighten it further.

/// Interpreter execution policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EvalMode {
    /// Unlimited steps; recursion bounded only by the growable stack.
    #[default]
    Interpret,
    /// Untrusted scripts: hard limits on executed steps and call depth.
    Sandboxed {
        max_steps: u64,
        max_depth: usize,
    },
    /// Test execution: output is captured, recursion is bounded.
    TestRun,
}

impl EvalMode {
    /// Default call depth for bounded modes that do not set one.
    pub const DEFAULT_MAX_DEPTH: usize = 500;

    /// Build a mode from `TURICUM_STEP_LIMIT` and `TURICUM_MAX_DEPTH`.
    ///
    /// Either variable switches to `Sandboxed`; unparsable values are
    /// ignored. With neither set the mode is `Interpret`.
    pub fn from_env() -> Self {
        let steps = read_env("TURICUM_STEP_LIMIT");
        let depth = read_env("TURICUM_MAX_DEPTH");
        if steps.is_none() && depth.is_none() {
            return Self::Interpret;
        }
        Self::Sandboxed {
            max_steps: steps.unwrap_or(u64::MAX),
            max_depth: depth
                .and_then(|d| usize::try_from(d).ok())
                .unwrap_or(Self::DEFAULT_MAX_DEPTH),
        }
    }

    /// Maximum number of executed commands, or `None` for unlimited.
    #[inline]
    pub fn step_limit(&self) -> Option<u64> {
        match self {
            Self::Sandboxed { max_steps, .. } if *max_steps != u64::MAX => Some(*max_steps),
            _ => None,
        }
    }

    /// Maximum call depth, or `None` to rely on `stacker` growth.
    #[inline]
    pub fn max_recursion_depth(&self) -> Option<usize> {
        match self {
            Self::Interpret => {
                #[cfg(target_arch = "wasm32")]
                {
                    Some(200)
                }
                #[cfg(not(target_arch = "wasm32"))]
                {
                    None
                }
            }
            Self::Sandboxed { max_depth, .. } => Some(*max_depth),
            Self::TestRun => Some(Self::DEFAULT_MAX_DEPTH),
        }
    }

    /// Whether `print` output goes to a buffer by default.
    #[inline]
    pub fn captures_output(&self) -> bool {
        matches!(self, Self::TestRun)
    }
}

fn read_env(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
