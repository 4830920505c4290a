#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is fixed when a [`Runtime`](crate::Runtime) is created.
//! Defaults are permissive: mutations are allowed anywhere except inside a
//! derivation. Strict mode (`enforce_actions`) additionally requires every
//! mutation to happen inside [`Runtime::action`](crate::Runtime::action).

/// Environment variable that turns on strict mode.
pub const ENV_ENFORCE_ACTIONS: &str = "RIPPLE_ENFORCE_ACTIONS";
/// Environment variable overriding the reaction loop limit.
pub const ENV_MAX_REACTION_ITERATIONS: &str = "RIPPLE_MAX_REACTION_ITERATIONS";

/// Default number of reaction rounds before the loop is considered divergent.
pub const DEFAULT_MAX_REACTION_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Reject mutations that happen outside of an action.
    pub enforce_actions: bool,
    /// Upper bound on reaction rounds per outermost batch.
    pub max_reaction_iterations: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enforce_actions: false,
            max_reaction_iterations: DEFAULT_MAX_REACTION_ITERATIONS,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_enforce_actions(mut self, enforce: bool) -> Self {
        self.enforce_actions = enforce;
        self
    }

    #[must_use]
    pub fn with_max_reaction_iterations(mut self, limit: usize) -> Self {
        self.max_reaction_iterations = limit.max(1);
        self
    }

    /// Build a config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparseable values fall
    /// back to the defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_ENFORCE_ACTIONS) {
            config.enforce_actions = parse_flag(&raw);
        }
        if let Some(raw) = lookup(ENV_MAX_REACTION_ITERATIONS)
            && let Ok(limit) = raw.trim().parse::<usize>()
        {
            config = config.with_max_reaction_iterations(limit);
        }
        config
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
