//! Project manifest discovery.
//!
//! Mirrors Cargo, Git, and NPM project-file discovery: starting from the
//! directory of the file being compiled, walk up until a manifest is found or
//! the filesystem root is reached. Two manifest forms are recognized:
//!
//! - `teraify.toml`, a dedicated TOML file whose top level is a
//!   [`TransformOptions`](super::TransformOptions) table
//! - `package.json`, an NPM manifest carrying a `"teraify"` key
//!
//! When both exist in the same directory, `teraify.toml` wins. A `package.json`
//! without a `"teraify"` key does not end the search; the walk continues
//! upward. A manifest that exists but does not parse is a configuration error,
//! which is deliberately non-fatal: it is logged and compilation proceeds with
//! invocation options only.

use std::path::Path;

use super::TransformOptions;

/// Dedicated manifest file name.
pub const MANIFEST_FILE: &str = "teraify.toml";
/// NPM manifest consulted as a fallback.
pub const PACKAGE_FILE: &str = "package.json";
/// Key read from `package.json`.
pub const PACKAGE_KEY: &str = "teraify";

/// Find manifest options by searching up the directory tree from `start_dir`.
///
/// Returns `None` when no manifest is found or the nearest one is malformed.
pub fn discover(start_dir: &Path) -> Option<TransformOptions> {
    for dir in start_dir.ancestors() {
        let toml_path = dir.join(MANIFEST_FILE);
        if toml_path.is_file() {
            return load_toml(&toml_path);
        }

        let package_path = dir.join(PACKAGE_FILE);
        if package_path.is_file() {
            match load_package(&package_path) {
                PackageLookup::Found(options) => return Some(options),
                PackageLookup::Malformed => return None,
                PackageLookup::NoSection => {}
            }
        }
    }
    None
}

fn load_toml(path: &Path) -> Option<TransformOptions> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("cannot read {}: {err}; ignoring manifest", path.display());
            return None;
        }
    };
    match toml::from_str::<TransformOptions>(&text) {
        Ok(options) => {
            tracing::debug!("using options from {}", path.display());
            Some(options)
        }
        Err(err) => {
            tracing::warn!("malformed {}: {err}; ignoring manifest", path.display());
            None
        }
    }
}

enum PackageLookup {
    Found(TransformOptions),
    NoSection,
    Malformed,
}

fn load_package(path: &Path) -> PackageLookup {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("cannot read {}: {err}; ignoring manifest", path.display());
            return PackageLookup::Malformed;
        }
    };
    let package: serde_json::Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("malformed {}: {err}; ignoring manifest", path.display());
            return PackageLookup::Malformed;
        }
    };
    let Some(section) = package.get(PACKAGE_KEY) else {
        return PackageLookup::NoSection;
    };
    match serde_json::from_value::<TransformOptions>(section.clone()) {
        Ok(options) => {
            tracing::debug!("using \"{PACKAGE_KEY}\" options from {}", path.display());
            PackageLookup::Found(options)
        }
        Err(err) => {
            tracing::warn!(
                "invalid \"{PACKAGE_KEY}\" section in {}: {err}; ignoring manifest",
                path.display()
            );
            PackageLookup::Malformed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_toml_manifest_in_parent_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "self = true\n").unwrap();
        let nested = dir.path().join("sub").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let options = discover(&nested).expect("manifest should be found");
        assert_eq!(options.self_scope, Some(true));
    }

    #[test]
    fn absent_manifest_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover(dir.path()).is_none());
    }

    #[test]
    fn reads_teraify_section_from_package_json() {
        let dir = TempDir::new().unwrap();
        let package = json!({
            "name": "fixture",
            "teraify": { "locals": { "foo": "FOO!" }, "self": false }
        });
        fs::write(dir.path().join(PACKAGE_FILE), package.to_string()).unwrap();

        let options = discover(dir.path()).expect("manifest should be found");
        assert_eq!(
            options.locals.as_ref().and_then(|l| l.get("foo")),
            Some(&json!("FOO!"))
        );
        assert_eq!(options.self_scope, Some(false));
    }

    #[test]
    fn toml_wins_over_package_json_in_same_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "self = true\n").unwrap();
        let package = json!({ "teraify": { "self": false } });
        fs::write(dir.path().join(PACKAGE_FILE), package.to_string()).unwrap();

        let options = discover(dir.path()).expect("manifest should be found");
        assert_eq!(options.self_scope, Some(true));
    }

    #[test]
    fn package_json_without_section_does_not_stop_search() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "self = true\n").unwrap();
        let nested = dir.path().join("pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(PACKAGE_FILE), json!({ "name": "x" }).to_string()).unwrap();

        let options = discover(&nested).expect("walk should continue upward");
        assert_eq!(options.self_scope, Some(true));
    }

    #[test]
    fn malformed_manifest_falls_back_to_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "self = {{{{\n").unwrap();
        assert!(discover(dir.path()).is_none());
    }

    #[test]
    fn resolution_is_relative_to_each_file() {
        // Two unrelated trees must see their own manifests; nothing may be
        // cached from one resolution to the next.
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join(MANIFEST_FILE), "locals = { who = \"a\" }\n").unwrap();
        fs::write(b.path().join(MANIFEST_FILE), "locals = { who = \"b\" }\n").unwrap();

        let from_a = discover(a.path()).unwrap();
        let from_b = discover(b.path()).unwrap();
        assert_eq!(from_a.locals.unwrap().get("who"), Some(&json!("a")));
        assert_eq!(from_b.locals.unwrap().get("who"), Some(&json!("b")));
    }
}
