//! Nested template resolution.
//!
//! Tera resolves `{% include %}`, `{% extends %}`, and `{% import %}` against
//! a registry of already-loaded templates, so before handing a source file to
//! the engine we scan it for those directives, load every referenced file
//! from disk, and register the lot. Doing the resolution ourselves is what
//! lets us observe every dependency edge and report it to the
//! [`DependencyTracker`] in resolution order: a parent's edge is recorded
//! before the edges of the file it pulled in, and sibling references are
//! recorded in the order they appear in the source.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::error::CompileError;
use crate::tracker::DependencyTracker;

static TEMPLATE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|extends|import)\s+(?:"([^"]+)"|'([^']+)')"#)
        .expect("template reference pattern is valid")
});

/// One nested template discovered during the scan, ready for registration
/// with Tera.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// Name exactly as written in the directive; Tera looks templates up by
    /// this string.
    pub name: String,
    /// Resolved on-disk path.
    pub path: PathBuf,
    /// File contents.
    pub source: String,
}

/// Resolve the full nested-template closure of `root_source`, depth first.
///
/// Covers `include`, `extends`, and `import` directives uniformly. Each
/// discovered edge is recorded on `tracker` at the moment it is resolved.
/// A file that cannot be read is an unresolved reference and fails the
/// compile. Two different files written under the same name within one
/// compile would render differently depending on traversal order, so that is
/// rejected as ambiguous rather than silently letting one win.
pub fn collect(
    root_path: &Path,
    root_source: &str,
    tracker: &DependencyTracker,
) -> Result<Vec<ResolvedTemplate>, CompileError> {
    let mut registry: HashMap<String, PathBuf> = HashMap::new();
    let mut resolved = Vec::new();
    scan(root_path, root_path, root_source, tracker, &mut registry, &mut resolved)?;
    Ok(resolved)
}

fn scan(
    root_path: &Path,
    parent_path: &Path,
    parent_source: &str,
    tracker: &DependencyTracker,
    registry: &mut HashMap<String, PathBuf>,
    resolved: &mut Vec<ResolvedTemplate>,
) -> Result<(), CompileError> {
    let parent_dir = parent_path.parent().unwrap_or_else(|| Path::new("."));

    for caps in TEMPLATE_REF_RE.captures_iter(parent_source) {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let child_path = normalize(&parent_dir.join(name));

        // The edge is reported even when the child was already loaded; the
        // tracker contract is one event per reference, not per file.
        tracker.record(parent_path, &child_path);

        if let Some(existing) = registry.get(name) {
            if *existing != child_path {
                return Err(CompileError::new(
                    root_path,
                    format!(
                        "ambiguous template reference \"{name}\": resolves to both {} and {}",
                        existing.display(),
                        child_path.display()
                    ),
                ));
            }
            continue;
        }

        let child_source = std::fs::read_to_string(&child_path).map_err(|err| {
            CompileError::new(
                root_path,
                format!(
                    "cannot resolve template \"{name}\" ({}): {err}",
                    child_path.display()
                ),
            )
        })?;

        registry.insert(name.to_string(), child_path.clone());
        resolved.push(ResolvedTemplate {
            name: name.to_string(),
            path: child_path.clone(),
            source: child_source.clone(),
        });

        scan(root_path, &child_path, &child_source, tracker, registry, resolved)?;
    }

    Ok(())
}

/// Lexically normalize `.` and `..` components without touching the
/// filesystem, so the same file is always reported under one path.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolves_siblings_in_textual_order() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tera");
        fs::write(&page, "{% include \"header.tera\" %}body{% include \"footer.tera\" %}")
            .unwrap();
        fs::write(dir.path().join("header.tera"), "H").unwrap();
        fs::write(dir.path().join("footer.tera"), "F").unwrap();

        let tracker = DependencyTracker::new();
        let source = fs::read_to_string(&page).unwrap();
        let resolved = collect(&page, &source, &tracker).unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "header.tera");
        assert_eq!(resolved[1].name, "footer.tera");

        let events = tracker.events();
        assert_eq!(events[0].child, dir.path().join("header.tera"));
        assert_eq!(events[1].child, dir.path().join("footer.tera"));
    }

    #[test]
    fn parent_edge_recorded_before_child_edges() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tera");
        fs::write(&page, "{% include \"a.tera\" %}{% include \"b.tera\" %}").unwrap();
        fs::write(dir.path().join("a.tera"), "{% include \"nested.tera\" %}").unwrap();
        fs::write(dir.path().join("nested.tera"), "N").unwrap();
        fs::write(dir.path().join("b.tera"), "B").unwrap();

        let tracker = DependencyTracker::new();
        let source = fs::read_to_string(&page).unwrap();
        collect(&page, &source, &tracker).unwrap();

        let children: Vec<_> = tracker
            .events()
            .into_iter()
            .map(|e| e.child.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(children, vec!["a.tera", "nested.tera", "b.tera"]);
    }

    #[test]
    fn missing_include_is_a_compile_error() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tera");
        let source = "{% include \"ghost.tera\" %}";
        fs::write(&page, source).unwrap();

        let tracker = DependencyTracker::new();
        let err = collect(&page, source, &tracker).unwrap_err();
        assert!(err.message.contains("ghost.tera"));
        // The edge was still observed before the read failed.
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn repeated_include_records_every_edge_but_loads_once() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tera");
        let source = "{% include \"h.tera\" %}{% include \"h.tera\" %}";
        fs::write(&page, source).unwrap();
        fs::write(dir.path().join("h.tera"), "H").unwrap();

        let tracker = DependencyTracker::new();
        let resolved = collect(&page, source, &tracker).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn include_cycles_terminate() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.tera");
        fs::write(&a, "{% include \"b.tera\" %}").unwrap();
        fs::write(dir.path().join("b.tera"), "{% include \"a.tera\" %}").unwrap();

        let tracker = DependencyTracker::new();
        let source = fs::read_to_string(&a).unwrap();
        // Must return rather than recurse forever; Tera itself rejects the
        // cycle later at render time.
        let resolved = collect(&a, &source, &tracker).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn conflicting_paths_for_one_name_are_ambiguous() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let page = dir.path().join("page.tera");
        // page includes part.tera from the root; other.tera lives in sub/ and
        // includes its own part.tera under the same name.
        fs::write(&page, "{% include \"part.tera\" %}{% include \"sub/other.tera\" %}").unwrap();
        fs::write(dir.path().join("part.tera"), "root part").unwrap();
        fs::write(sub.join("other.tera"), "{% include \"part.tera\" %}").unwrap();
        fs::write(sub.join("part.tera"), "sub part").unwrap();

        let tracker = DependencyTracker::new();
        let source = fs::read_to_string(&page).unwrap();
        let err = collect(&page, &source, &tracker).unwrap_err();
        assert!(err.message.contains("ambiguous template reference"));
    }

    #[test]
    fn extends_is_resolved_and_recorded() {
        let dir = TempDir::new().unwrap();
        let child = dir.path().join("child.tera");
        let source = "{% extends \"base.tera\" %}{% block content %}C{% endblock content %}";
        fs::write(&child, source).unwrap();
        fs::write(
            dir.path().join("base.tera"),
            "{% block content %}{% endblock content %}",
        )
        .unwrap();

        let tracker = DependencyTracker::new();
        let resolved = collect(&child, source, &tracker).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "base.tera");
        assert_eq!(tracker.events()[0].child, dir.path().join("base.tera"));
    }

    #[test]
    fn import_is_resolved_and_recorded() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tera");
        let source = "{% import \"macros.tera\" as m %}{{ m::hello() }}";
        fs::write(&page, source).unwrap();
        fs::write(
            dir.path().join("macros.tera"),
            "{% macro hello() %}hi{% endmacro hello %}",
        )
        .unwrap();

        let tracker = DependencyTracker::new();
        let resolved = collect(&page, source, &tracker).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "macros.tera");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn parent_relative_paths_normalize() {
        let dir = TempDir::new().unwrap();
        let views = dir.path().join("views");
        fs::create_dir(&views).unwrap();
        let page = views.join("page.tera");
        let source = "{% include \"../shared.tera\" %}";
        fs::write(&page, source).unwrap();
        fs::write(dir.path().join("shared.tera"), "S").unwrap();

        let tracker = DependencyTracker::new();
        let resolved = collect(&page, source, &tracker).unwrap();
        assert_eq!(resolved[0].path, dir.path().join("shared.tera"));
    }
}
