//! Query normalization applied before a name is sent upstream.

/// Token stripping and suffix policy for outbound queries.
#[derive(Debug, Clone, Default)]
pub struct QueryPolicy {
    strip_tokens: Vec<String>,
    suffix: Option<String>,
}

/// Queries to try for one name, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub primary: String,
    /// Original name, tried when the normalized form finds nothing
    pub fallback: Option<String>,
}

impl QueryPolicy {
    pub fn new(strip_tokens: Vec<String>, suffix: Option<String>) -> Self {
        Self {
            strip_tokens: strip_tokens
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            suffix: suffix
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Remove standalone strip tokens from the first comma-separated segment.
    ///
    /// Only whole whitespace-delimited words match, case-insensitively, so
    /// `"Adelaide CHC-River"` is left alone. Runs of whitespace in the first
    /// segment collapse to a single space.
    pub fn strip(&self, name: &str) -> String {
        let (first, rest) = match name.split_once(',') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };

        let first: Vec<&str> = first
            .split_whitespace()
            .filter(|word| {
                !self
                    .strip_tokens
                    .iter()
                    .any(|token| word.eq_ignore_ascii_case(token))
            })
            .collect();
        let first = first.join(" ");

        match rest {
            Some(rest) => format!("{}, {}", first, rest.trim_start()),
            None => first,
        }
    }

    /// Append the configured suffix unless the name already mentions it
    pub fn with_suffix(&self, query: &str) -> String {
        match &self.suffix {
            Some(suffix) if !query.to_lowercase().contains(&suffix.to_lowercase()) => {
                format!("{}, {}", query, suffix)
            }
            _ => query.to_string(),
        }
    }

    /// Build the ordered queries for a name. Returns `None` for a blank name.
    pub fn plan(&self, name: &str) -> Option<QueryPlan> {
        let original = name.trim();
        if original.is_empty() {
            return None;
        }

        let stripped = self.strip(original);
        // A name made only of strip tokens still has to be queried as given
        if stripped.split(',').next().map_or(true, |s| s.trim().is_empty()) {
            return Some(QueryPlan {
                primary: self.with_suffix(original),
                fallback: None,
            });
        }

        let primary = self.with_suffix(&stripped);
        let fallback = if stripped != original {
            Some(self.with_suffix(original))
        } else {
            None
        };

        Some(QueryPlan { primary, fallback })
    }
}
