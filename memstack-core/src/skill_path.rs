//! Virtual skill-resource paths: `skill://<skill_name>/<relative_path>`
//! (spec.md §6).
//!
//! This module is the *contract* spec.md §1 carves out of skill-resource
//! file scanning: a pure parser/builder with no filesystem behavior. The
//! scanner and sandbox adapter that actually read bytes off
//! `/workspace/.memstack/skills/...` are out of scope.

use thiserror::Error;

const SCHEME: &str = "skill://";

/// Errors parsing a virtual skill-resource path.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkillPathError {
    /// The string did not use the `skill://` scheme.
    #[error("not a skill:// path: {0}")]
    WrongScheme(String),
    /// The path had no relative component after the skill name.
    #[error("missing relative path in: {0}")]
    MissingRelativePath(String),
    /// The skill name component was empty.
    #[error("empty skill name in: {0}")]
    EmptySkillName(String),
}

/// Parse a `skill://<name>/<relative>` string into its `(name, relative)`
/// parts. Only the `skill://` scheme is accepted.
pub fn parse(path: &str) -> Result<(String, String), SkillPathError> {
    let rest = path
        .strip_prefix(SCHEME)
        .ok_or_else(|| SkillPathError::WrongScheme(path.to_string()))?;

    let (name, relative) = rest
        .split_once('/')
        .ok_or_else(|| SkillPathError::MissingRelativePath(path.to_string()))?;

    if name.is_empty() {
        return Err(SkillPathError::EmptySkillName(path.to_string()));
    }

    Ok((name.to_string(), relative.to_string()))
}

/// Build a `skill://<name>/<relative>` string. `relative` is normalized to
/// forward slashes and any leading `/` is stripped, so `build` and
/// [`parse`] round-trip for any input (spec.md §8 "Virtual-path round
/// trip").
pub fn build(name: &str, relative: &str) -> String {
    let normalized = relative.replace('\\', "/");
    let normalized = normalized.trim_start_matches('/');
    format!("{SCHEME}{name}/{normalized}")
}

/// Resolve a virtual path to its container-side absolute path (spec.md
/// §6): `/workspace/.memstack/skills/<skill>/<relative>`. This is the only
/// filesystem-adjacent behavior this module has — it returns a string,
/// it never touches a filesystem.
pub fn resolve_container_path(name: &str, relative: &str) -> String {
    format!("/workspace/.memstack/skills/{name}/{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_arbitrary_names_and_relative_paths() {
        for (name, rel) in [
            ("deploy", "scripts/run.sh"),
            ("weird name", "a/b/c.txt"),
            ("x", "single.md"),
        ] {
            let built = build(name, rel);
            let (parsed_name, parsed_rel) = parse(&built).unwrap();
            assert_eq!(parsed_name, name);
            assert_eq!(parsed_rel, rel);
        }
    }

    #[test]
    fn build_normalizes_backslashes_and_leading_slash() {
        let built = build("deploy", "\\scripts\\run.sh");
        assert_eq!(built, "skill://deploy/scripts/run.sh");
    }

    #[test]
    fn rejects_non_skill_scheme() {
        assert_eq!(
            parse("file:///etc/passwd"),
            Err(SkillPathError::WrongScheme("file:///etc/passwd".to_string()))
        );
    }

    #[test]
    fn rejects_missing_relative_path() {
        assert!(matches!(
            parse("skill://deploy"),
            Err(SkillPathError::MissingRelativePath(_))
        ));
    }

    #[test]
    fn resolves_to_container_path() {
        assert_eq!(
            resolve_container_path("deploy", "scripts/run.sh"),
            "/workspace/.memstack/skills/deploy/scripts/run.sh"
        );
    }
}
