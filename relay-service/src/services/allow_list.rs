//! Allow-list of upstream routes reachable through the relay.
//!
//! Patterns are slash separated. A `{name}` segment matches exactly one
//! non-empty path segment made of ASCII alphanumerics, `-`, `_` or `.`
//! (but never `.` or `..`). Every other segment must match literally.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        let segments = trimmed
            .split('/')
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
                    Some(Segment::Param)
                } else if segment.is_empty() {
                    None
                } else {
                    Some(Segment::Literal(segment.to_string()))
                }
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    fn matches(&self, parts: &[&str]) -> bool {
        self.segments.len() == parts.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match segment {
                    Segment::Literal(literal) => literal == part,
                    Segment::Param => is_param_value(part),
                })
    }
}

fn is_param_value(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[derive(Debug, Clone)]
pub struct EndpointAllowList {
    patterns: Vec<RoutePattern>,
}

impl EndpointAllowList {
    /// Build from configured patterns. Blank or malformed patterns are
    /// skipped with a warning.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|raw| {
                let raw = raw.as_ref();
                let parsed = RoutePattern::parse(raw);
                if parsed.is_none() {
                    tracing::warn!(pattern = %raw, "Ignoring malformed endpoint pattern");
                }
                parsed
            })
            .collect();

        Self { patterns }
    }

    /// Normalize `endpoint` (surrounding slashes dropped) and return it along
    /// with the pattern it matched, or `None` when it is not allowed.
    pub fn resolve<'a>(&'a self, endpoint: &str) -> Option<(String, &'a str)> {
        let normalized = endpoint.trim_matches('/');
        if normalized.is_empty() {
            return None;
        }

        let parts: Vec<&str> = normalized.split('/').collect();

        self.patterns
            .iter()
            .find(|pattern| pattern.matches(&parts))
            .map(|pattern| (normalized.to_string(), pattern.raw.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
