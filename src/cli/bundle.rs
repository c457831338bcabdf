//! The `bundle` command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;

use crate::bundler::Bundler;
use crate::config::TransformOptions;

/// Bundle a JavaScript module graph, compiling templates inline.
#[derive(Debug, Args)]
pub struct BundleCommand {
    /// Entry JavaScript module.
    pub entry: PathBuf,

    /// Write the bundle here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Locals baked into the templates, as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub locals: Option<String>,

    /// Expose locals under a single `self` namespace object.
    #[arg(long = "self")]
    pub self_scope: bool,

    /// Disable HTML autoescaping in template output.
    #[arg(long)]
    pub no_autoescape: bool,

    /// Additional file extension to treat as a template (repeatable).
    #[arg(long = "extension", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Print discovered template dependency edges to stderr.
    #[arg(long)]
    pub list_deps: bool,
}

impl BundleCommand {
    /// Run the bundle.
    pub async fn execute(self) -> Result<()> {
        let options = self.build_options()?;

        let bundler = Bundler::new(options);
        let bundle = bundler
            .bundle(&self.entry)
            .await
            .with_context(|| format!("failed to bundle {}", self.entry.display()))?;

        if self.list_deps {
            for event in bundler.tracker().events() {
                eprintln!("{event}");
            }
        }

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &bundle)
                    .await
                    .with_context(|| format!("cannot write bundle to {}", path.display()))?;
                tracing::info!("wrote {} bytes to {}", bundle.len(), path.display());
            }
            None => print!("{bundle}"),
        }
        Ok(())
    }

    fn build_options(&self) -> Result<TransformOptions> {
        let mut options = TransformOptions::default();

        if let Some(raw) = &self.locals {
            let value: Value =
                serde_json::from_str(raw).context("--locals must be valid JSON")?;
            let Value::Object(map) = value else {
                bail!("--locals must be a JSON object, got: {raw}");
            };
            options.locals = Some(map);
        }
        if self.self_scope {
            options.self_scope = Some(true);
        }
        if self.no_autoescape {
            options.flags.insert("autoescape".into(), Value::Bool(false));
        }
        if !self.extensions.is_empty() {
            options.extensions = Some(self.extensions.clone());
        }

        Ok(options)
    }
}
