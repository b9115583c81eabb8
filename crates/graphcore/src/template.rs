//! `{{#path#}}` variable references embedded in text.

use crate::{Segment, VariablePool, VariableResolutionError, VariableSelector};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{#([a-zA-Z0-9_]{1,50}(?:\.[a-zA-Z0-9_]{1,50}){0,10})#\}\}")
            .expect("marker pattern is valid")
    })
}

/// Every selector referenced by a marker in `text`, in order of appearance.
pub fn extract_selectors(text: &str) -> Vec<VariableSelector> {
    marker_pattern()
        .captures_iter(text)
        .map(|cap| VariableSelector::parse(&cap[1]))
        .collect()
}

/// Replace every `{{#path#}}` marker in `text` with whatever `replace`
/// returns for its selector, left to right in a single pass.
///
/// Replacement text is never scanned again. The first error aborts.
pub fn replace_markers<E>(
    text: &str,
    mut replace: impl FnMut(&VariableSelector) -> Result<String, E>,
) -> Result<String, E> {
    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;
    for cap in marker_pattern().captures_iter(text) {
        let whole = cap.get(0).map(|m| (m.start(), m.end()));
        let Some((start, end)) = whole else { continue };
        let selector = VariableSelector::parse(&cap[1]);
        let replacement = replace(&selector)?;
        rendered.push_str(&text[last..start]);
        rendered.push_str(&replacement);
        last = end;
    }
    rendered.push_str(&text[last..]);
    Ok(rendered)
}

impl VariablePool {
    /// Substitute every `{{#path#}}` marker with the referenced segment's text.
    ///
    /// Markers are replaced left to right in a single pass; substituted text
    /// is never scanned again. The first marker without a value aborts the
    /// render.
    pub fn render_template(&self, text: &str) -> Result<String, VariableResolutionError> {
        self.render_template_in_scope(text, &HashMap::new())
    }

    /// Like [`render_template`](Self::render_template), with render-time
    /// values that shadow the pool for the paths they name.
    pub fn render_template_in_scope(
        &self,
        text: &str,
        scope: &HashMap<VariableSelector, Segment>,
    ) -> Result<String, VariableResolutionError> {
        replace_markers(text, |selector| {
            self.require_in_scope(selector, scope).map(|segment| segment.text())
        })
    }

    /// Resolve `selector` from `scope`, falling back to the pool.
    pub fn require_in_scope(
        &self,
        selector: &VariableSelector,
        scope: &HashMap<VariableSelector, Segment>,
    ) -> Result<Segment, VariableResolutionError> {
        match scope.get(selector) {
            Some(segment) => Ok(segment.clone()),
            None => self.require(selector),
        }
    }
}
