//! Per-file stream transform.
//!
//! One [`TemplateTransform`] is created for each matched source file. It
//! behaves as a duplex byte stage: input bytes are buffered in arrival order
//! (chunk boundaries carry no meaning), and at end-of-input the buffered
//! source is compiled in one synchronous step. The instance then lands in a
//! terminal state having produced exactly one of: the full compiled output,
//! or one structured error. Never both, never partial bytes.
//!
//! State machine per source unit:
//!
//! ```text
//! Buffering -> Compiling -> Emitting   (output produced, stream done)
//!                        \-> Failed    (one error raised, no output)
//! Buffering -> Aborted                 (host cancelled; buffer released)
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::compiler::{CompileError, TemplateCompiler};
use crate::config::{self, TransformOptions};
use crate::tracker::DependencyTracker;

/// Observable transform states. `Emitting`, `Failed`, and `Aborted` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformState {
    /// Accumulating input chunks; compilation has not started.
    Buffering,
    /// Inside the synchronous compile step.
    Compiling,
    /// Compiled output was produced and the stream completed.
    Emitting,
    /// A compile error was raised; no output was produced.
    Failed,
    /// The host cancelled the stream; buffered input was released.
    Aborted,
}

impl TransformState {
    /// Whether the transform can make no further progress.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Emitting | Self::Failed | Self::Aborted)
    }
}

/// Faults a transform can raise.
///
/// `Compile` is the stream-level fault propagated to the bundle. The protocol
/// variants guard against driving an instance past a terminal state.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The template failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Input arrived or end-of-input was signaled after a terminal state.
    #[error("transform for {} already reached a terminal state", path.display())]
    Finished {
        /// The transform's source file.
        path: PathBuf,
    },
    /// The transform was cancelled by the host.
    #[error("transform for {} was aborted", path.display())]
    Aborted {
        /// The transform's source file.
        path: PathBuf,
    },
}

/// Duplex transform stage for a single source file.
#[derive(Debug)]
pub struct TemplateTransform {
    path: PathBuf,
    invocation: TransformOptions,
    compiler: TemplateCompiler,
    state: TransformState,
    buffer: Vec<u8>,
}

impl TemplateTransform {
    /// Transform for `path`, reporting include edges to `tracker`.
    ///
    /// `invocation` holds the caller-supplied options; the manifest half of
    /// the configuration is resolved lazily at end-of-input, relative to
    /// `path` at that moment.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        invocation: TransformOptions,
        tracker: DependencyTracker,
    ) -> Self {
        Self {
            path: path.into(),
            invocation,
            compiler: TemplateCompiler::new(tracker),
            state: TransformState::Buffering,
            buffer: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransformState {
        self.state
    }

    /// The source file this transform owns.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept one input chunk. Chunk boundaries are arbitrary; bytes are
    /// appended in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), TransformError> {
        match self.state {
            TransformState::Buffering => {
                self.buffer.extend_from_slice(chunk);
                Ok(())
            }
            TransformState::Aborted => Err(TransformError::Aborted {
                path: self.path.clone(),
            }),
            _ => Err(TransformError::Finished {
                path: self.path.clone(),
            }),
        }
    }

    /// Signal end-of-input: resolve configuration, compile, and either return
    /// the full output bytes or raise the one error for this unit.
    pub fn finish(&mut self) -> Result<Vec<u8>, TransformError> {
        match self.state {
            TransformState::Buffering => {}
            TransformState::Aborted => {
                return Err(TransformError::Aborted {
                    path: self.path.clone(),
                });
            }
            _ => {
                return Err(TransformError::Finished {
                    path: self.path.clone(),
                });
            }
        }

        self.state = TransformState::Compiling;
        let bytes = std::mem::take(&mut self.buffer);

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(err) => {
                self.state = TransformState::Failed;
                return Err(CompileError::new(
                    &self.path,
                    format!("template source is not valid UTF-8: {err}"),
                )
                .into());
            }
        };

        let options = config::resolve(&self.path, &self.invocation);
        match self.compiler.compile(&source, &self.path, &options) {
            Ok(module) => {
                self.state = TransformState::Emitting;
                tracing::debug!("transform emitted {} bytes for {}", module.code.len(), self.path.display());
                Ok(module.code.into_bytes())
            }
            Err(err) => {
                self.state = TransformState::Failed;
                tracing::debug!("transform failed for {}: {err}", self.path.display());
                Err(err.into())
            }
        }
    }

    /// Host-driven cancellation: release buffered input and stop. No output
    /// and no error event are produced after this.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!("transform aborted for {}", self.path.display());
            self.buffer = Vec::new();
            self.state = TransformState::Aborted;
        }
    }
}

/// Drive a transform from an async byte source to completion.
///
/// Reads `reader` in arbitrary-size chunks, feeds them to a fresh transform
/// for `path`, and finishes at end-of-input. This is the seam the bundler
/// uses per matched file.
pub async fn transform_reader<R>(
    mut reader: R,
    path: &Path,
    invocation: TransformOptions,
    tracker: DependencyTracker,
) -> Result<Vec<u8>, TransformError>
where
    R: AsyncRead + Unpin,
{
    let mut transform = TemplateTransform::new(path, invocation, tracker);
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let read = reader.read(&mut chunk).await.map_err(|err| {
            TransformError::Compile(CompileError::new(
                path,
                format!("cannot read template source: {err}"),
            ))
        })?;
        if read == 0 {
            break;
        }
        transform.push(&chunk[..read])?;
    }
    transform.finish()
}
