//! Counter key generation.

/// A key that uniquely identifies one counter bucket in the shared store.
///
/// The key is composed of the request group, the endpoint key and the
/// bucket start timestamp (epoch seconds).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The group this counter belongs to
    pub group: String,
    /// The endpoint key within the group
    pub endpoint: String,
    /// Start of the bucket, a multiple of the interval
    pub bucket: i64,
}

impl CounterKey {
    /// Create a new counter key.
    pub fn new(group: &str, endpoint: &str, bucket: i64) -> Self {
        Self {
            group: group.to_string(),
            endpoint: endpoint.to_string(),
            bucket,
        }
    }

    /// Render the key used in the shared store.
    ///
    /// Format: `"{group}:{endpoint}:{bucket}"`. `%` and `:` inside the group
    /// and endpoint are percent-encoded so distinct triples never collide.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            escape_segment(&self.group),
            escape_segment(&self.endpoint),
            self.bucket
        )
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

fn escape_segment(segment: &str) -> std::borrow::Cow<'_, str> {
    if !segment.contains(['%', ':']) {
        return std::borrow::Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    std::borrow::Cow::Owned(escaped)
}
