//! Static target path analysis.
//!
//! `query_targets` walks a compiled tree without executing it and reports every external
//! input the tree reads. The [`TargetsContext`] tracks what `this` and each named
//! sub-context refer to at the current point of the walk, so `this.items.map_each(i ->
//! i.price)` reports `this.items.price` rather than a bare `price`.

use std::fmt;

use serde::Serialize;

/// What a target path is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Value,
    Root,
    Metadata,
    Variable,
}

/// An unevaluated data dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetPath {
    pub kind: TargetKind,
    pub path: Vec<String>,
}

impl TargetPath {
    pub fn new(kind: TargetKind, path: Vec<String>) -> Self {
        Self { kind, path }
    }

    pub fn value(path: &[&str]) -> Self {
        Self::new(TargetKind::Value, path.iter().map(|s| s.to_string()).collect())
    }

    pub fn root(path: &[&str]) -> Self {
        Self::new(TargetKind::Root, path.iter().map(|s| s.to_string()).collect())
    }

    /// Returns a copy of this path with `suffix` appended.
    pub fn extended(&self, suffix: &[String]) -> Self {
        let mut path = self.path.clone();
        path.extend(suffix.iter().cloned());
        Self::new(self.kind, path)
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.path.join(".");
        match self.kind {
            TargetKind::Value if joined.is_empty() => f.write_str("this"),
            TargetKind::Value => write!(f, "this.{joined}"),
            TargetKind::Root if joined.is_empty() => f.write_str("root"),
            TargetKind::Root => write!(f, "root.{joined}"),
            TargetKind::Metadata => write!(f, "@{joined}"),
            TargetKind::Variable => write!(f, "${joined}"),
        }
    }
}

/// State threaded through a target analysis walk.
#[derive(Debug, Clone, Default)]
pub struct TargetsContext {
    /// Paths `this` currently refers to. Empty means the plain input value.
    pub main: Vec<TargetPath>,
    pub named: Vec<(String, Vec<TargetPath>)>,
}

impl TargetsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main(&self, main: Vec<TargetPath>) -> Self {
        Self {
            main,
            named: self.named.clone(),
        }
    }

    pub fn with_named(&self, name: &str, paths: Vec<TargetPath>) -> Self {
        let mut named = self.named.clone();
        named.push((name.to_string(), paths));
        Self {
            main: self.main.clone(),
            named,
        }
    }

    /// Innermost binding wins.
    pub fn named_paths(&self, name: &str) -> Option<&[TargetPath]> {
        self.named
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, paths)| paths.as_slice())
    }

    /// Resolves a `this`-relative path against the current main context.
    pub fn resolve_value(&self, path: &[String]) -> Vec<TargetPath> {
        if self.main.is_empty() {
            vec![TargetPath::new(TargetKind::Value, path.to_vec())]
        } else {
            self.main.iter().map(|base| base.extended(path)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_mapping_syntax() {
        assert_eq!(TargetPath::value(&["a", "b"]).to_string(), "this.a.b");
        assert_eq!(TargetPath::value(&[]).to_string(), "this");
        assert_eq!(TargetPath::root(&["out"]).to_string(), "root.out");
        assert_eq!(
            TargetPath::new(TargetKind::Metadata, vec!["topic".into()]).to_string(),
            "@topic"
        );
        assert_eq!(
            TargetPath::new(TargetKind::Variable, vec!["x".into(), "y".into()]).to_string(),
            "$x.y"
        );
    }

    #[test]
    fn value_paths_extend_the_main_context() {
        let ctx = TargetsContext::new().with_main(vec![TargetPath::value(&["items"])]);
        assert_eq!(
            ctx.resolve_value(&["price".to_string()]),
            vec![TargetPath::value(&["items", "price"])]
        );
        let named = ctx.with_named("i", vec![TargetPath::root(&["x"])]);
        assert_eq!(named.named_paths("i"), Some(&[TargetPath::root(&["x"])][..]));
        assert_eq!(named.named_paths("j"), None);
    }
}
