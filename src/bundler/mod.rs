//! Bundle integration.
//!
//! Walks a CommonJS-style module graph from an entry JavaScript file,
//! resolving relative `require()` calls. Files matching the configured
//! template extensions (resolved per file, so a manifest near a template can
//! widen the match) pass through exactly one
//! [`TemplateTransform`](crate::transform::TemplateTransform) each and their
//! compiled module body replaces the template source; other files are carried
//! as-is and scanned for further requires. The result is one self-contained
//! bundle.
//!
//! The walk is fail-fast: the first transform that reaches its failed state
//! faults the whole bundle and no output is produced. Because include edges
//! are recorded synchronously during each compile, every dependency event is
//! visible on the tracker before [`Bundler::bundle`] returns.
//!
//! This is deliberately not a general bundler: relative-path
//! resolution with an optional implied `.js` extension covers the module
//! graphs this tool targets, and bare specifiers are rejected loudly.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{self, TransformOptions};
use crate::core::TeraifyError;
use crate::tracker::DependencyTracker;
use crate::transform::transform_reader;

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#).expect("require pattern is valid")
});

/// One module in the emitted bundle.
#[derive(Debug)]
struct Module {
    path: PathBuf,
    body: String,
    /// Specifier as written in source, mapped to the target module id.
    deps: Vec<(String, usize)>,
}

/// Walks the module graph and emits the bundle.
#[derive(Debug, Clone)]
pub struct Bundler {
    invocation: TransformOptions,
    tracker: DependencyTracker,
}

impl Bundler {
    /// Bundler with the given invocation options and a fresh tracker.
    #[must_use]
    pub fn new(invocation: TransformOptions) -> Self {
        Self::with_tracker(invocation, DependencyTracker::new())
    }

    /// Bundler feeding an existing tracker, for callers that subscribed
    /// before the build starts.
    #[must_use]
    pub fn with_tracker(invocation: TransformOptions, tracker: DependencyTracker) -> Self {
        Self { invocation, tracker }
    }

    /// The dependency tracker all transforms of this bundler report to.
    #[must_use]
    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    /// Bundle the module graph reachable from `entry` into one JavaScript
    /// artifact.
    ///
    /// Every matched template file is compiled through its own transform; any
    /// compile failure faults the whole bundle and nothing is returned.
    pub async fn bundle(&self, entry: &Path) -> Result<String, TeraifyError> {
        let entry = normalize(entry);
        let mut ids: HashMap<PathBuf, usize> = HashMap::new();
        let mut modules: Vec<Module> = Vec::new();
        let mut queue: Vec<usize> = Vec::new();

        ids.insert(entry.clone(), 0);
        modules.push(Module {
            path: entry.clone(),
            body: String::new(),
            deps: Vec::new(),
        });
        queue.push(0);

        while let Some(id) = queue.pop() {
            let path = modules[id].path.clone();
            tracing::debug!("visiting module {} ({})", id, path.display());

            // Matching honors the manifest nearest each candidate file, the
            // same resolution the transform applies to compile options.
            let options = config::resolve(&path, &self.invocation);
            if options.matches_extension(&path) {
                let file = tokio::fs::File::open(&path).await.map_err(|source| {
                    TeraifyError::Io {
                        path: path.clone(),
                        source,
                    }
                })?;
                let compiled =
                    transform_reader(file, &path, self.invocation.clone(), self.tracker.clone())
                        .await?;
                // Compiled output is UTF-8 by construction.
                modules[id].body = String::from_utf8_lossy(&compiled).into_owned();
                continue;
            }

            let bytes = tokio::fs::read(&path).await.map_err(|source| TeraifyError::Io {
                path: path.clone(),
                source,
            })?;
            let source = String::from_utf8(bytes).map_err(|_| TeraifyError::NonUtf8Module {
                path: path.clone(),
            })?;

            let mut deps = Vec::new();
            for caps in REQUIRE_RE.captures_iter(&source) {
                let specifier = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let child = resolve_require(&path, specifier)?;

                let child_id = match ids.get(&child) {
                    Some(existing) => *existing,
                    None => {
                        let next = modules.len();
                        ids.insert(child.clone(), next);
                        modules.push(Module {
                            path: child,
                            body: String::new(),
                            deps: Vec::new(),
                        });
                        queue.push(next);
                        next
                    }
                };
                deps.push((specifier.to_string(), child_id));
            }

            modules[id].body = source;
            modules[id].deps = deps;
        }

        tracing::info!("bundled {} modules from {}", modules.len(), entry.display());
        Ok(emit_bundle(&modules))
    }
}

/// Resolve one `require()` specifier relative to the requiring module.
fn resolve_require(from: &Path, specifier: &str) -> Result<PathBuf, TeraifyError> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return Err(TeraifyError::BareRequire {
            specifier: specifier.to_string(),
            from: from.to_path_buf(),
        });
    }

    let base = from.parent().unwrap_or_else(|| Path::new("."));
    let direct = normalize(&base.join(specifier));
    if direct.is_file() {
        return Ok(direct);
    }
    // Node convention: require("./util") may mean util.js.
    let with_js = direct.with_extension("js");
    if direct.extension().is_none() && with_js.is_file() {
        return Ok(with_js);
    }

    Err(TeraifyError::UnresolvedRequire {
        specifier: specifier.to_string(),
        from: from.to_path_buf(),
    })
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Emit the final artifact: a map of module factories plus a tiny loader,
/// entry module id 0.
fn emit_bundle(modules: &[Module]) -> String {
    let mut out = String::new();
    out.push_str(
        "(function (modules, entry) {\n\
             var cache = {};\n\
             function load(id) {\n\
                 if (cache[id]) { return cache[id].exports; }\n\
                 var module = cache[id] = { exports: {} };\n\
                 modules[id][0].call(module.exports, requireFor(id), module, module.exports);\n\
                 return module.exports;\n\
             }\n\
             function requireFor(id) {\n\
                 return function (name) { return load(modules[id][1][name]); };\n\
             }\n\
             load(entry);\n\
         })({\n",
    );

    for (id, module) in modules.iter().enumerate() {
        let deps: serde_json::Map<String, serde_json::Value> = module
            .deps
            .iter()
            .map(|(specifier, target)| {
                (specifier.clone(), serde_json::Value::from(*target as u64))
            })
            .collect();
        let _ = writeln!(
            out,
            "{id}: [function (require, module, exports) {{\n{}\n}}, {}],",
            module.body.trim_end(),
            serde_json::Value::Object(deps)
        );
    }

    out.push_str("}, 0);\n");
    out
}
