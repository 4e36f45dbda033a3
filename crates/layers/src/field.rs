//! Sets of changed record fields.

use std::collections::BTreeSet;

/// Top-level record fields touched by a mutation.
///
/// A set may also be "forced", meaning every field is treated as changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: BTreeSet<String>,
    forced: bool,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that intersects with everything.
    pub fn all() -> Self {
        Self {
            fields: BTreeSet::new(),
            forced: true,
        }
    }

    pub fn insert(&mut self, field: impl Into<String>) {
        self.fields.insert(field.into());
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: FieldSet) {
        self.forced |= other.forced;
        self.fields.extend(other.fields);
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn is_empty(&self) -> bool {
        !self.forced && self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.forced || self.fields.contains(field)
    }

    /// Whether any of `fields` is in the set.
    pub fn intersects(&self, fields: &[&str]) -> bool {
        self.forced || fields.iter().any(|f| self.fields.contains(*f))
    }

    /// The subset that appears in `fields`, preserving the forced marker.
    pub fn restricted_to(&self, fields: &[&str]) -> FieldSet {
        if self.forced {
            return FieldSet::all();
        }
        FieldSet {
            fields: fields
                .iter()
                .filter(|f| self.fields.contains(**f))
                .map(|f| f.to_string())
                .collect(),
            forced: false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
            forced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects() {
        let set: FieldSet = ["x", "content"].into_iter().collect();
        assert!(set.intersects(&["content", "width"]));
        assert!(!set.intersects(&["width", "height"]));
        assert!(FieldSet::all().intersects(&["anything"]));
        assert!(!FieldSet::new().intersects(&["x"]));
    }

    #[test]
    fn test_restricted_to() {
        let set: FieldSet = ["x", "content", "name"].into_iter().collect();
        let restricted = set.restricted_to(&["x", "y"]);
        assert_eq!(restricted.iter().collect::<Vec<_>>(), vec!["x"]);
        assert!(FieldSet::all().restricted_to(&["x"]).is_forced());
    }

    #[test]
    fn test_merge() {
        let mut a: FieldSet = ["x"].into_iter().collect();
        a.merge(["y"].into_iter().collect());
        assert!(a.contains("x") && a.contains("y"));
        a.merge(FieldSet::all());
        assert!(a.is_forced());
    }
}
