//! Hash-fragment view router.
//!
//! A fixed registry maps the leading segment of a location fragment to a
//! section. Applying a route shows exactly one registered section and hides
//! every other one; unknown fragments show the default section.

use std::collections::{BTreeMap, HashMap};

/// Errors building a [`Router`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("prefix '{0}' is registered twice")]
    DuplicatePrefix(String),

    #[error("invalid prefix '{0}': must be a non-empty path segment")]
    InvalidPrefix(String),

    #[error("no default section configured")]
    MissingDefault,
}

/// Receives the visibility assignment for every registered section in a
/// single call, so it never observes zero or several visible sections.
pub trait SectionView {
    fn apply(&mut self, state: &RouteState);
}

impl SectionView for BTreeMap<String, bool> {
    fn apply(&mut self, state: &RouteState) {
        self.clear();
        self.extend(
            state
                .visibility()
                .map(|(section, visible)| (section.to_string(), visible)),
        );
    }
}

/// The resolved route: which section is active, and the remaining path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteState {
    active: String,
    detail: Option<String>,
    sections: Vec<String>,
}

impl RouteState {
    pub fn active(&self) -> &str {
        &self.active
    }

    /// Path after the leading segment (`"42"` for `task/42`), if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Every registered section, in registration order, with its visibility.
    pub fn visibility(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.sections
            .iter()
            .map(move |s| (s.as_str(), *s == self.active))
    }

    pub fn is_visible(&self, section: &str) -> bool {
        self.active == section
    }
}

#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<(String, String)>,
    default: Option<String>,
}

impl RouterBuilder {
    /// Map fragments starting with `prefix` to `section`.
    pub fn section(mut self, prefix: &str, section: &str) -> Self {
        self.routes.push((prefix.to_string(), section.to_string()));
        self
    }

    /// Section shown for empty or unregistered fragments. Registered as a
    /// section if no prefix maps to it.
    pub fn default_section(mut self, section: &str) -> Self {
        self.default = Some(section.to_string());
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let default = self.default.ok_or(RouteError::MissingDefault)?;
        let mut prefixes = HashMap::new();
        let mut sections: Vec<String> = Vec::new();

        for (prefix, section) in self.routes {
            if prefix.is_empty() || prefix.contains(['/', '#', '?']) {
                return Err(RouteError::InvalidPrefix(prefix));
            }
            if prefixes.contains_key(&prefix) {
                return Err(RouteError::DuplicatePrefix(prefix));
            }
            if !sections.contains(&section) {
                sections.push(section.clone());
            }
            prefixes.insert(prefix, section);
        }
        if !sections.contains(&default) {
            sections.push(default.clone());
        }

        Ok(Router {
            prefixes,
            sections,
            default,
        })
    }
}

/// Immutable fragment → section registry.
#[derive(Debug, Clone)]
pub struct Router {
    prefixes: HashMap<String, String>,
    sections: Vec<String>,
    default: String,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    pub fn default_section(&self) -> &str {
        &self.default
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Resolve a fragment without side effects. Never fails.
    pub fn resolve(&self, fragment: &str) -> RouteState {
        let (head, detail) = split_fragment(fragment);
        let (active, detail) = match self.prefixes.get(head) {
            Some(section) => (section.clone(), detail.map(str::to_string)),
            None => (self.default.clone(), None),
        };
        RouteState {
            active,
            detail,
            sections: self.sections.clone(),
        }
    }

    /// Resolve `fragment` and hand the full visibility assignment to `view`.
    pub fn apply_route<V: SectionView + ?Sized>(&self, fragment: &str, view: &mut V) -> RouteState {
        let state = self.resolve(fragment);
        tracing::debug!(fragment, section = %state.active, "route applied");
        view.apply(&state);
        state
    }
}

/// `"#/task/42?tab=notes"` → (`"task"`, `Some("42")`).
fn split_fragment(fragment: &str) -> (&str, Option<&str>) {
    let fragment = fragment.trim();
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let fragment = fragment.trim_start_matches('/');
    let path = fragment.split('?').next().unwrap_or_default();
    match path.split_once('/') {
        Some((head, rest)) => {
            let rest = rest.trim_end_matches('/');
            (head, (!rest.is_empty()).then_some(rest))
        }
        None => (path, None),
    }
}
