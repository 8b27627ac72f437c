use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Controls how much per-stage narration a merge run produces.
///
/// Handed to the merge driver and the checkpoint store when they are built,
/// so nothing consults process-wide state to decide whether to narrate.
/// Narration goes through `tracing`: at `info` when verbose, `debug` otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    verbose: bool,
}

impl Verbosity {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Narrate a stage transition.
    pub fn say(&self, msg: impl Display) {
        if self.verbose {
            tracing::info!("{}", msg);
        } else {
            tracing::debug!("{}", msg);
        }
    }
}
