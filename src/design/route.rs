use std::fmt;

/// One path segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
}

/// `?key={name}` binding of a query-string key to a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCapture {
    pub key: String,
    pub name: String,
}

/// Parsed path template: literal segments, `{name}` captures and optional
/// `?key={name}` query captures.
///
/// Captures always span a whole segment; `/files/{name}.json` is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
    query: Vec<QueryCapture>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_capture(segment: &str) -> Result<Option<&str>, String> {
    match (segment.strip_prefix('{'), segment.ends_with('}')) {
        (Some(rest), true) => {
            let name = rest.trim_end_matches('}');
            if valid_name(name) {
                Ok(Some(name))
            } else {
                Err(format!("invalid capture name in `{segment}`"))
            }
        }
        (None, false) if !segment.contains('{') && !segment.contains('}') => Ok(None),
        _ => Err(format!("capture `{segment}` must span the whole segment")),
    }
}

/// Textual join of a resource prefix and an action-relative path, shared by
/// route templates and `Location` headers.
pub(crate) fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, String> {
        let (path, query) = match template.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (template, None),
        };
        if !path.is_empty() && !path.starts_with('/') {
            return Err(format!("route `{template}` must start with `/`"));
        }

        let mut segments = Vec::new();
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            match parse_capture(raw)? {
                Some(name) => segments.push(Segment::Capture(name.to_string())),
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        let mut captures = Vec::new();
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("query capture `{pair}` must look like key={{name}}"))?;
            let name = parse_capture(value)?
                .ok_or_else(|| format!("query capture `{pair}` must bind a {{name}}"))?;
            if key.is_empty() {
                return Err(format!("query capture `{pair}` has an empty key"));
            }
            captures.push(QueryCapture {
                key: key.to_string(),
                name: name.to_string(),
            });
        }

        let normalized_path = if segments.is_empty() {
            "/".to_string()
        } else {
            segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(l) => format!("/{l}"),
                    Segment::Capture(c) => format!("/{{{c}}}"),
                })
                .collect()
        };

        Ok(Self {
            raw: normalized_path,
            segments,
            query: captures,
        })
    }

    /// Parse `prefix` + `path` as one template. A trailing `/` on the prefix
    /// and an empty or `/` action path are tolerated.
    pub fn join(prefix: &str, path: &str) -> Result<Self, String> {
        Self::parse(&join_path(prefix, path))
    }

    /// Path portion, normalized (no query captures).
    pub fn path(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn query(&self) -> &[QueryCapture] {
        &self.query
    }

    pub fn path_captures(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(c) => Some(c.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Path and query capture names, path captures first.
    pub fn all_captures(&self) -> impl Iterator<Item = &str> {
        self.path_captures()
            .chain(self.query.iter().map(|q| q.name.as_str()))
    }

    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// True when some concrete path could match both templates: same segment
    /// count and no position where both are differing literals.
    pub fn overlaps(&self, other: &RouteTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)?;
        for (i, q) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{}={{{}}}", q.key, q.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_query_captures() {
        let t = RouteTemplate::join("/posts/", "/{id}?view={view}&lang={lang}").unwrap();
        assert_eq!(t.path(), "/posts/{id}");
        assert_eq!(t.literal_count(), 1);
        assert_eq!(t.all_captures().collect::<Vec<_>>(), vec!["id", "view", "lang"]);
        assert_eq!(t.to_string(), "/posts/{id}?view={view}&lang={lang}");
    }

    #[test]
    fn empty_action_path_uses_prefix() {
        let t = RouteTemplate::join("/tasks", "").unwrap();
        assert_eq!(t.path(), "/tasks");
        assert_eq!(RouteTemplate::join("", "/").unwrap().path(), "/");
    }

    #[test]
    fn rejects_partial_segment_capture() {
        assert!(RouteTemplate::parse("/files/{name}.json").is_err());
        assert!(RouteTemplate::parse("/files/{}").is_err());
        assert!(RouteTemplate::parse("/files?name").is_err());
    }

    #[test]
    fn overlap_ignores_captures() {
        let a = RouteTemplate::parse("/tasks/{id}").unwrap();
        let b = RouteTemplate::parse("/tasks/archived").unwrap();
        let c = RouteTemplate::parse("/users/{id}").unwrap();
        assert!(a.overlaps(&b));
        assert!(!b.overlaps(&c));
        assert!(!a.overlaps(&RouteTemplate::parse("/tasks").unwrap()));
    }
}
