//! Error handling for teraify.
//!
//! [`TeraifyError`] enumerates the failure cases of a bundle run. Compile
//! faults keep their structured [`CompileError`](crate::compiler::CompileError)
//! inside the [`TransformError`](crate::transform::TransformError) they arrived
//! in, so callers can still reach the failing file and line. None of these are
//! retried anywhere: every failure here is deterministic for the same inputs.

use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;

use crate::transform::TransformError;

/// Failure cases of a bundle run.
#[derive(Debug, Error)]
pub enum TeraifyError {
    /// A per-file transform faulted; carries the compile error.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A module file could not be read.
    #[error("cannot read {}", path.display())]
    Io {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A JavaScript module was not valid UTF-8.
    #[error("module {} is not valid UTF-8", path.display())]
    NonUtf8Module {
        /// The offending file.
        path: PathBuf,
    },

    /// A relative `require()` pointed at nothing on disk.
    #[error("cannot resolve require(\"{specifier}\") from {}", from.display())]
    UnresolvedRequire {
        /// The specifier as written.
        specifier: String,
        /// Module containing the require.
        from: PathBuf,
    },

    /// A bare (non-relative) `require()` was encountered; teraify bundles
    /// relative module graphs only.
    #[error("unsupported require(\"{specifier}\") in {}: only relative paths are bundled", from.display())]
    BareRequire {
        /// The specifier as written.
        specifier: String,
        /// Module containing the require.
        from: PathBuf,
    },
}

/// Print an error chain to stderr, colored for terminals.
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", "error:".red().bold());
    for cause in error.chain().skip(1) {
        eprintln!("  {} {cause}", "caused by:".yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileError;

    #[test]
    fn transform_faults_stay_downcastable_to_compile_errors() {
        let compile = CompileError::new("t.tera", "boom").with_line(3);
        let err: TeraifyError = TransformError::from(compile).into();
        let shown = err.to_string();
        assert!(shown.contains("t.tera"));
        assert!(shown.contains("line 3"));

        match err {
            TeraifyError::Transform(TransformError::Compile(inner)) => {
                assert_eq!(inner.line, Some(3));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn bare_require_names_the_offender() {
        let err = TeraifyError::BareRequire {
            specifier: "lodash".into(),
            from: PathBuf::from("entry.js"),
        };
        assert!(err.to_string().contains("lodash"));
        assert!(err.to_string().contains("entry.js"));
    }
}
