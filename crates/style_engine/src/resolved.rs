use core::slice;

/// Concrete property values produced by a processor (or merged from several).
///
/// Insertion ordered; setting a property again replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedStyle {
    entries: Vec<(String, String)>,
}

impl ResolvedStyle {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn set(&mut self, property: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.0 == property) {
            value.clone_into(&mut entry.1);
        } else {
            self.entries.push((property.to_owned(), value.to_owned()));
        }
    }

    #[must_use]
    pub fn with(mut self, property: &str, value: &str) -> Self {
        self.set(property, value);
        self
    }

    /// Fold `other` into `self`; on collision `other` wins.
    pub fn merge(&mut self, other: Self) {
        for (property, value) in other.entries {
            self.set(&property, &value);
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.0 == property)
            .map(|entry| entry.1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(property, value)| (property.as_str(), value.as_str()))
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'style> IntoIterator for &'style ResolvedStyle {
    type Item = &'style (String, String);
    type IntoIter = slice::Iter<'style, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<P: AsRef<str>, V: AsRef<str>> FromIterator<(P, V)> for ResolvedStyle {
    fn from_iter<I: IntoIterator<Item = (P, V)>>(iter: I) -> Self {
        let mut style = Self::new();
        for (property, value) in iter {
            style.set(property.as_ref(), value.as_ref());
        }
        style
    }
}
