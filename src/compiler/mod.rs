//! Template compiler adapter.
//!
//! Wraps the Tera engine behind a single call: source text in, compiled
//! JavaScript module out. Compilation is static: the template is rendered at
//! build time against the effective `locals` and the emitted module exports a
//! render function returning the pre-rendered string, so the bundle carries no
//! template engine at runtime.
//!
//! A fresh `Tera` instance is built per compile. That keeps compiles
//! independent (no template registry bleeding between files) and is cheap:
//! an empty instance is just a couple of empty maps. Nested templates
//! (includes, inheritance, macro imports) are resolved before the engine sees
//! the source (see [`includes`]), which is where dependency events come from.

pub mod error;
pub mod includes;

use std::path::Path;

use tera::Tera;

pub use error::CompileError;

use crate::config::EffectiveOptions;
use crate::tracker::DependencyTracker;

/// Successful compilation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// JavaScript module source, ready to inline into a bundle.
    pub code: String,
    /// The rendered template text embedded in `code`.
    pub rendered: String,
}

/// Exactly one of compiled output or a structured error, per source unit.
pub type CompileResult = Result<CompiledModule, CompileError>;

/// Compiles template source into JavaScript modules.
#[derive(Debug, Clone)]
pub struct TemplateCompiler {
    tracker: DependencyTracker,
}

impl TemplateCompiler {
    /// Compiler reporting include edges to `tracker`.
    #[must_use]
    pub fn new(tracker: DependencyTracker) -> Self {
        Self { tracker }
    }

    /// The tracker this compiler reports to.
    #[must_use]
    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    /// Compile one template.
    ///
    /// `file` is used for error reporting and relative include resolution
    /// only; the source text itself arrives in `source`. Every nested
    /// template resolved along the way is reported to the tracker before this
    /// returns. Never produces partial output: the result is either a whole
    /// module or a [`CompileError`].
    pub fn compile(
        &self,
        source: &str,
        file: &Path,
        options: &EffectiveOptions,
    ) -> CompileResult {
        tracing::debug!("compiling {}", file.display());

        let resolved = includes::collect(file, source, &self.tracker)?;

        let mut tera = Tera::default();
        if options.autoescape() {
            tera.autoescape_on(vec![".tera", ".html", ".htm", ".xml"]);
        } else {
            tera.autoescape_on(vec![]);
        }

        let root_name = file.to_string_lossy().into_owned();
        let mut templates: Vec<(&str, &str)> = resolved
            .iter()
            .map(|inc| (inc.name.as_str(), inc.source.as_str()))
            .collect();
        templates.push((root_name.as_str(), source));
        tera.add_raw_templates(templates)
            .map_err(|e| CompileError::from_tera(file, &e))?;

        let mut context = tera::Context::new();
        if options.self_scope {
            context.insert("self", &serde_json::Value::Object(options.locals.clone()));
        } else {
            for (key, value) in &options.locals {
                context.insert(key, value);
            }
        }

        let rendered = tera
            .render(&root_name, &context)
            .map_err(|e| CompileError::from_tera(file, &e))?;

        tracing::debug!("compiled {} ({} rendered bytes)", file.display(), rendered.len());
        Ok(CompiledModule {
            code: emit_module(&rendered),
            rendered,
        })
    }
}

/// Wrap rendered text in a CommonJS module exporting a render function.
fn emit_module(rendered: &str) -> String {
    // serde_json string encoding doubles as JS string escaping.
    let literal = serde_json::Value::String(rendered.to_string()).to_string();
    format!(
        "\"use strict\";\nmodule.exports = function render() {{\n    return {literal};\n}};\n"
    )
}
