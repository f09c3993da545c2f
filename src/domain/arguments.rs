//! Positional arguments left over after route resolution.


/// Path segments deeper than the matched handler, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(Vec<String>);

impl Arguments {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        Self(segments.into_iter().map(str::to_string).collect())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// First present argument among `indices`, in the order given.
    pub fn first_of(&self, indices: &[usize]) -> Option<&str> {
        indices.iter().find_map(|&index| self.get(index))
    }

    pub fn slice(&self, offset: usize, length: Option<usize>) -> &[String] {
        let start = offset.min(self.0.len());
        let end = match length {
            Some(length) => start.saturating_add(length).min(self.0.len()),
            None => self.0.len(),
        };
        &self.0[start..end]
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when at most `amount` arguments are present.
    pub fn maximum(&self, amount: usize) -> bool {
        self.0.len() <= amount
    }

    /// True when at least `amount` arguments are present.
    pub fn minimum(&self, amount: usize) -> bool {
        self.0.len() >= amount
    }

    pub fn exactly(&self, amount: usize) -> bool {
        self.0.len() == amount
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Arguments {
        Arguments::from_segments(values.iter().copied())
    }

    #[test]
    fn count_predicates() {
        let arguments = args(&["42", "edit"]);
        assert!(arguments.maximum(2));
        assert!(!arguments.maximum(1));
        assert!(arguments.minimum(2));
        assert!(!arguments.minimum(3));
        assert!(arguments.exactly(2));
    }

    #[test]
    fn first_of_skips_missing_indices() {
        let arguments = args(&["a", "b"]);
        assert_eq!(arguments.first_of(&[5, 1, 0]), Some("b"));
        assert_eq!(arguments.first_of(&[7]), None);
    }

    #[test]
    fn slice_clamps_to_bounds() {
        let arguments = args(&["a", "b", "c"]);
        assert_eq!(arguments.slice(1, None), ["b", "c"]);
        assert_eq!(arguments.slice(0, Some(2)), ["a", "b"]);
        assert_eq!(arguments.slice(2, Some(10)), ["c"]);
        assert!(arguments.slice(9, Some(1)).is_empty());
    }

    #[test]
    fn last_and_positional_get() {
        let arguments = args(&["x", "y"]);
        assert_eq!(arguments.last(), Some("y"));
        assert_eq!(arguments.get(0), Some("x"));
        assert_eq!(arguments.get(2), None);
        assert!(Arguments::default().last().is_none());
    }
}
