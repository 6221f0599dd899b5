use std::collections::HashSet;

/// Labels of the deepfake detector, indexed by model output.
pub const DEFAULT_LABELS: [&str; 2] = ["fake", "real"];

/// Fixed mapping from class index to label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Builds a label map from labels in class-index order.
    ///
    /// Returns `None` if `labels` is empty or contains duplicates.
    pub fn new<I, S>(labels: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let unique: HashSet<&str> = labels.iter().map(String::as_str).collect();
        if labels.is_empty() || unique.len() != labels.len() {
            return None;
        }
        Some(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}
