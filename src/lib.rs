//! teraify: build-time Tera template transform for JavaScript bundles.
//!
//! teraify walks a CommonJS-style module graph from an entry JavaScript file
//! and compiles every required Tera template into a plain JavaScript module at
//! build time. Locals are baked in during compilation, so the emitted bundle
//! renders templates without carrying a template engine to the browser.
//!
//! # How a file flows through
//!
//! 1. [`bundler`] matches the file by extension and creates exactly one
//!    [`transform::TemplateTransform`] for it.
//! 2. The transform buffers the file's bytes and, at end-of-input, asks
//!    [`config`] for the effective options: invocation options merged over a
//!    `teraify.toml` or `package.json` manifest discovered near the file.
//! 3. [`compiler`] resolves nested templates (includes, inheritance, macro
//!    imports), reporting each edge to [`tracker`], renders the template
//!    against the effective locals, and emits a CommonJS module exporting a
//!    render function.
//! 4. The transform hands the compiled bytes back to the bundler, or raises
//!    one structured error; any failing file faults the whole bundle.
//!
//! # Options
//!
//! - `locals`: name to value mapping rendered into the template
//! - `self`: expose locals under one `self` namespace object instead of
//!   flattening them into scope
//! - `extensions`: file extensions matched as templates (default `tera`)
//! - `autoescape` and other flags: passed through to the compiler
//!
//! Invocation options always win over manifest options for identical keys.
//!
//! # Example
//!
//! ```no_run
//! use teraify::bundler::Bundler;
//! use teraify::config::TransformOptions;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), teraify::core::TeraifyError> {
//! let mut locals = serde_json::Map::new();
//! locals.insert("pageTitle".into(), "Tera".into());
//!
//! let bundler = Bundler::new(TransformOptions::with_locals(locals));
//! bundler.tracker().subscribe(|edge| {
//!     eprintln!("template dependency: {edge}");
//! });
//! let bundle = bundler.bundle(Path::new("src/entry.js")).await?;
//! # Ok(())
//! # }
//! ```

pub mod bundler;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod core;
pub mod tracker;
pub mod transform;
