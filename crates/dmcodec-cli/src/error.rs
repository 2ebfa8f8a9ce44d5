// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments or configuration file
    InvalidArgs(String),
    /// The codec runtime library or one of its symbols is missing
    RuntimeUnavailable(String),
    /// The engine, its memory, or the codec instance could not be set up
    EngineUnavailable(String),
    /// Input or output file error
    Io(String),
    /// Too many units failed to process
    Processing(String),
    /// General error from the dmcodec library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::RuntimeUnavailable(msg) => write!(f, "Codec runtime unavailable: {}", msg),
            CliError::EngineUnavailable(msg) => write!(f, "Codec engine unavailable: {}", msg),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
            CliError::Processing(msg) => write!(f, "Processing failed: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::RuntimeUnavailable(_) => 3,
            CliError::EngineUnavailable(_) => 4,
            CliError::Io(_) => 5,
            CliError::Processing(_) => 6,
            CliError::General(_) => 1,
        }
    }
}

/// Map dmcodec::Error to CliError with appropriate exit codes
impl From<dmcodec::Error> for CliError {
    fn from(err: dmcodec::Error) -> Self {
        use dmcodec::{Error, ErrorKind};

        match err.kind() {
            ErrorKind::Runtime => match err {
                Error::LibraryNotLoaded(_) | Error::SymbolNotFound(_) => {
                    CliError::RuntimeUnavailable(err.to_string())
                }
                _ => CliError::General(err.to_string()),
            },
            ErrorKind::EngineUnavailable
            | ErrorKind::OutOfMemory
            | ErrorKind::CodecCreationFailed => CliError::EngineUnavailable(err.to_string()),
            ErrorKind::InvalidConfiguration => CliError::InvalidArgs(err.to_string()),
            ErrorKind::ProcessingFailed | ErrorKind::ReconfigurationFailed => {
                CliError::Processing(err.to_string())
            }
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmcodec::ExtendedError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidArgs("test".into()).code(), 2);
        assert_eq!(CliError::RuntimeUnavailable("test".into()).code(), 3);
        assert_eq!(CliError::EngineUnavailable("test".into()).code(), 4);
        assert_eq!(CliError::Io("test".into()).code(), 5);
        assert_eq!(CliError::Processing("test".into()).code(), 6);
        assert_eq!(CliError::General("test".into()).code(), 1);
    }

    #[test]
    fn test_library_error_mapping() {
        let err: CliError = dmcodec::Error::SymbolNotFound("Engine_open").into();
        assert!(matches!(err, CliError::RuntimeUnavailable(_)));

        let err: CliError = dmcodec::Error::OutOfMemory { size: 4096 }.into();
        assert!(matches!(err, CliError::EngineUnavailable(_)));

        let err: CliError = dmcodec::Error::InvalidConfiguration("odd width".into()).into();
        assert!(matches!(err, CliError::InvalidArgs(_)));

        let err: CliError = dmcodec::Error::ProcessingFailed {
            status: -1,
            extended: ExtendedError::NONE,
        }
        .into();
        assert!(matches!(err, CliError::Processing(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CliError::Io("input.yuv: not found".to_string());
        assert_eq!(format!("{}", err), "I/O error: input.yuv: not found");
    }
}
