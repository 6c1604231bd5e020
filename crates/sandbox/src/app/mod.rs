use std::io;
use std::path::PathBuf;

use groundwork::KernelError;
use thiserror::Error;

mod bootstrap;
mod loop_runner;
mod scenario;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;

#[derive(Debug, Error)]
pub(crate) enum SandboxError {
    #[error("failed to read scenario '{path}': {source}")]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse scenario json{}: {message}", at_json_path(.path))]
    ParseScenario {
        path: Option<String>,
        message: String,
    },
    #[error("duplicate entity name '{0}'")]
    DuplicateEntityName(String),
    #[error("entity '{referenced_by}' refers to unknown entity '{name}'")]
    UnknownEntityName { name: String, referenced_by: String },
    #[error("target movement needs exactly one of 'point' or 'entity'")]
    AmbiguousTarget,
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

fn at_json_path(path: &Option<String>) -> String {
    path.as_ref()
        .map(|path| format!(" at {path}"))
        .unwrap_or_default()
}
