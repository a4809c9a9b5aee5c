//! Interpreter error taxonomy

use thiserror::Error;

/// Top-level interpretation failure
///
/// Maps directly onto the process exit codes `main` uses for `run_file`:
/// `Internal` (1), `Compile` (65), `Runtime` (70), matching the `sysexits.h`
/// conventions clox itself follows.
#[derive(Error, Debug)]
pub enum InterpretError {
    /// An internal error unrelated to the Lox program itself (I/O failure,
    /// etc.)
    #[error("internal error")]
    Internal,

    /// A compile-time error: the source failed to parse or resolve
    #[error("compile error")]
    Compile,

    /// A runtime error raised while executing a compiled chunk
    #[error("runtime error")]
    Runtime,
}
