//! Transform configuration and option resolution.
//!
//! Options reach a transform from two places: the invocation itself (CLI flags
//! or the embedding API) and a project manifest discovered by walking up the
//! directory tree from the file being compiled (see [`manifest`]). The two are
//! merged by a pure function with a single rule: invocation-supplied values
//! win over manifest values for identical keys.
//!
//! Recognized keys:
//! - `locals`: name to value mapping baked into the template at compile time
//! - `self`: when `true`, locals are exposed under one `self` namespace
//!   object instead of being flattened into scope
//! - `extensions`: file extensions the bundler treats as templates
//! - anything else: passed through to the compiler untouched (`autoescape`
//!   is the one flag the compiler currently interprets)

pub mod manifest;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// File extension matched by default when none is configured.
pub const DEFAULT_EXTENSION: &str = "tera";

/// Options as supplied by one side (invocation or manifest).
///
/// Every field is optional so that merging can tell "explicitly set" apart
/// from "left to the other side". Unrecognized keys collect into
/// [`flags`](Self::flags) and travel to the compiler unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransformOptions {
    /// Data context rendered into the template at compile time.
    pub locals: Option<Map<String, Value>>,
    /// Expose locals under a single `self` namespace object.
    #[serde(rename = "self")]
    pub self_scope: Option<bool>,
    /// File extensions (without the leading dot) treated as templates.
    pub extensions: Option<Vec<String>>,
    /// Compiler passthrough flags.
    #[serde(flatten)]
    pub flags: Map<String, Value>,
}

impl TransformOptions {
    /// Options with the given locals and everything else unset.
    #[must_use]
    pub fn with_locals(locals: Map<String, Value>) -> Self {
        Self {
            locals: Some(locals),
            ..Self::default()
        }
    }
}

/// The merged option set a single transform runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    /// Data context for the compile-time render.
    pub locals: Map<String, Value>,
    /// Whether locals live under a `self` namespace object.
    pub self_scope: bool,
    /// Extensions the bundler matches, without leading dots.
    pub extensions: Vec<String>,
    /// Compiler passthrough flags.
    pub flags: Map<String, Value>,
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        merge(None, &TransformOptions::default())
    }
}

impl EffectiveOptions {
    /// Whether HTML autoescaping is enabled (`autoescape` flag, default on).
    #[must_use]
    pub fn autoescape(&self) -> bool {
        match self.flags.get("autoescape") {
            Some(Value::Bool(enabled)) => *enabled,
            _ => true,
        }
    }

    /// Whether `path` has one of the configured template extensions.
    #[must_use]
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Merge manifest options under invocation options.
///
/// Pure function over the two option sets. Mappings (`locals`, `flags`) merge
/// per key with invocation winning; scalars take the invocation value when it
/// was supplied and the manifest value otherwise.
#[must_use]
pub fn merge(
    manifest: Option<&TransformOptions>,
    invocation: &TransformOptions,
) -> EffectiveOptions {
    let empty = TransformOptions::default();
    let manifest = manifest.unwrap_or(&empty);

    let mut locals = manifest.locals.clone().unwrap_or_default();
    if let Some(supplied) = &invocation.locals {
        for (key, value) in supplied {
            locals.insert(key.clone(), value.clone());
        }
    }

    let mut flags = manifest.flags.clone();
    for (key, value) in &invocation.flags {
        flags.insert(key.clone(), value.clone());
    }

    EffectiveOptions {
        locals,
        self_scope: invocation.self_scope.or(manifest.self_scope).unwrap_or(false),
        extensions: invocation
            .extensions
            .clone()
            .or_else(|| manifest.extensions.clone())
            .unwrap_or_else(|| vec![DEFAULT_EXTENSION.to_string()]),
        flags,
    }
}

/// Resolve the effective options for one file.
///
/// Looks upward from the file's directory for a project manifest and merges
/// its transform section under `invocation`. Absence of a manifest is not an
/// error; a malformed one is logged and ignored. Nothing is cached: each call
/// searches relative to the file it was given.
#[must_use]
pub fn resolve(file_path: &Path, invocation: &TransformOptions) -> EffectiveOptions {
    let discovered = file_path.parent().and_then(manifest::discover);
    merge(discovered.as_ref(), invocation)
}
