use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("unknown operation: {0} (expected one of up, refresh, cancel, export, preview)")]
    UnknownOperation(String),
    #[error("program produced no resource graph")]
    NoProgram,
    #[error("pulumi {command} exited with {status}: {stderr}")]
    Engine {
        command: String,
        status: String,
        stderr: String,
    },
}
