//! Error handling utilities

use tracing::error;

/// Handle fatal errors and exit with appropriate status code
///
/// Configuration problems exit with 2, everything else with 1. In verbose
/// mode the full context chain is printed as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);
    eprintln!("Error: {error:#}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code(&error))
}

/// Exit code for `error`, looking through any context added on top of a
/// crate error.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<crate::error::Error>())
        .map(crate::error::Error::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use anyhow::Context;

    #[test]
    fn test_config_errors_exit_with_two() {
        let err = anyhow::Error::new(Error::Config("bad".into()));
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let result: std::result::Result<(), Error> = Err(Error::Config("bad".into()));
        let err = result.context("Failed to load configuration").unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_other_errors_exit_with_one() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);

        let io = Error::Io(std::io::Error::other("boom"));
        assert_eq!(exit_code(&anyhow::Error::new(io)), 1);
    }
}
