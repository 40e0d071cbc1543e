use std::collections::BTreeMap;

use rocket::serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A structured author record as stored in descriptors.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
}

/// Descriptor author entries arrive either as free-form strings
/// ("Name <email> (web)") or as structured records.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AuthorEntry {
    Text(String),
    Record(AuthorInfo),
}

impl AuthorEntry {
    pub fn as_record(&self) -> Option<&AuthorInfo> {
        match self {
            AuthorEntry::Record(info) => Some(info),
            AuthorEntry::Text(_) => None,
        }
    }
}

/// The package metadata document uploaded alongside an archive.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Descriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<AuthorEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<AuthorEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engines: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<serde_json::Value>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Segment {
    Name,
    Email,
    Web,
}

/// Parses a free-form author string into a structured record.
///
/// Scans left to right: `<...>` delimits the email segment, `(...)` the web
/// segment, everything else accumulates into whichever segment is currently
/// open (initially the name). Text following a closing delimiter is dropped
/// until the next segment opens; an unterminated trailing segment keeps its
/// accumulated text. Stored author identity depends on this exact behavior.
pub fn parse_author(input: &str) -> AuthorInfo {
    let mut name: Option<String> = None;
    let mut email: Option<String> = None;
    let mut web: Option<String> = None;
    let mut segment: Option<Segment> = Some(Segment::Name);
    let mut buf = String::new();

    let mut flush = |segment: Option<Segment>, value: String| match segment {
        Some(Segment::Name) => name = Some(value),
        Some(Segment::Email) => email = Some(value),
        Some(Segment::Web) => web = Some(value),
        None => {}
    };

    for c in input.chars() {
        match c {
            '<' | '(' => {
                if segment.is_some() {
                    flush(segment, buf.trim().to_string());
                }
                buf.clear();
                segment = Some(if c == '<' { Segment::Email } else { Segment::Web });
            }
            '>' | ')' => {
                if segment.is_some() {
                    flush(segment, buf.trim().to_string());
                }
                buf.clear();
                segment = None;
            }
            _ => {
                if segment.is_some() {
                    buf.push(c);
                }
            }
        }
    }
    if !buf.is_empty() && segment.is_some() {
        flush(segment, buf);
    }

    AuthorInfo {
        name: name.unwrap_or_default(),
        email: email.filter(|value| !value.is_empty()),
        web: web.filter(|value| !value.is_empty()),
    }
}

/// Canonicalizes a semantic version string: strips a leading `v`, pads
/// missing minor/patch components, validates the result.
pub fn canonicalize_version(input: &str) -> Result<String, RegistryError> {
    let invalid = || RegistryError::Validation(format!("Invalid version number '{input}'"));

    let trimmed = input.trim();
    let stripped = trimmed
        .strip_prefix(['v', 'V'])
        .unwrap_or(trimmed);

    let (rest, build) = match stripped.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (stripped, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }
    for part in &parts {
        if part.is_empty() || part.parse::<u64>().is_err() {
            return Err(invalid());
        }
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    let mut candidate = parts.join(".");
    if let Some(pre) = pre {
        candidate.push('-');
        candidate.push_str(pre);
    }
    if let Some(build) = build {
        candidate.push('+');
        candidate.push_str(build);
    }

    let version = semver::Version::parse(&candidate).map_err(|_| invalid())?;
    Ok(version.to_string())
}

impl Descriptor {
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(json)
            .map_err(|e| RegistryError::Validation(format!("Malformed descriptor: {e}")))
    }

    /// Replaces every free-form author string with its parsed record.
    pub fn normalize(&mut self) {
        if let Some(AuthorEntry::Text(s)) = &self.author {
            self.author = Some(AuthorEntry::Record(parse_author(s)));
        }
        for entries in [&mut self.contributors, &mut self.maintainers] {
            for entry in entries.iter_mut() {
                if let AuthorEntry::Text(s) = entry {
                    *entry = AuthorEntry::Record(parse_author(s));
                }
            }
        }
    }

    /// Checks required fields and canonicalizes the version in place.
    /// A package must name a traceable responsible party: an author or at
    /// least one contributor.
    pub fn validate(&mut self) -> Result<(), RegistryError> {
        if self.name.as_deref().is_none_or(|name| name.is_empty()) {
            return Err(RegistryError::Validation(
                "Missing package name".to_string(),
            ));
        }
        match self.version.as_deref() {
            None | Some("") => {
                return Err(RegistryError::Validation(
                    "Missing version number".to_string(),
                ));
            }
            Some(version) => {
                self.version = Some(canonicalize_version(version)?);
            }
        }
        if self.author.is_none() && self.contributors.is_empty() {
            return Err(RegistryError::Validation(
                "Missing author or initial contributor".to_string(),
            ));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    pub fn author_record(&self) -> Option<&AuthorInfo> {
        self.author.as_ref().and_then(AuthorEntry::as_record)
    }

    pub fn contributor_records(&self) -> Vec<&AuthorInfo> {
        self.contributors
            .iter()
            .filter_map(AuthorEntry::as_record)
            .collect()
    }

    pub fn maintainer_records(&self) -> Vec<&AuthorInfo> {
        self.maintainers
            .iter()
            .filter_map(AuthorEntry::as_record)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_author_full() {
        let author = parse_author("Barney Rubble <b@rubble.com> (http://barnyrubble.tumblr.com/)");
        assert_eq!(author.name, "Barney Rubble");
        assert_eq!(author.email.as_deref(), Some("b@rubble.com"));
        assert_eq!(author.web.as_deref(), Some("http://barnyrubble.tumblr.com/"));
    }

    #[test]
    fn test_parse_author_name_only() {
        let author = parse_author("Barney Rubble");
        assert_eq!(author.name, "Barney Rubble");
        assert_eq!(author.email, None);
        assert_eq!(author.web, None);
    }

    #[test]
    fn test_parse_author_web_before_email() {
        let author = parse_author("Fred (http://example.org) <fred@example.org>");
        assert_eq!(author.name, "Fred");
        assert_eq!(author.email.as_deref(), Some("fred@example.org"));
        assert_eq!(author.web.as_deref(), Some("http://example.org"));
    }

    #[test]
    fn test_parse_author_unterminated_segment() {
        // trailing text belongs to whatever segment was last open
        let author = parse_author("Joe <joe@example");
        assert_eq!(author.name, "Joe");
        assert_eq!(author.email.as_deref(), Some("joe@example"));
    }

    #[test]
    fn test_parse_author_text_after_close_is_dropped() {
        let author = parse_author("Joe <joe@example.org> stray text (http://joe.example.org)");
        assert_eq!(author.name, "Joe");
        assert_eq!(author.email.as_deref(), Some("joe@example.org"));
        assert_eq!(author.web.as_deref(), Some("http://joe.example.org"));
    }

    #[test]
    fn test_parse_author_empty_segments() {
        let author = parse_author("<> ()");
        assert_eq!(author.name, "");
        assert_eq!(author.email, None);
        assert_eq!(author.web, None);
    }

    #[test]
    fn test_canonicalize_version() {
        assert_eq!(canonicalize_version("1.0").unwrap(), "1.0.0");
        assert_eq!(canonicalize_version("v1.0").unwrap(), "1.0.0");
        assert_eq!(canonicalize_version("2").unwrap(), "2.0.0");
        assert_eq!(canonicalize_version("1.2.3").unwrap(), "1.2.3");
        assert_eq!(canonicalize_version("1.0.0-beta.1").unwrap(), "1.0.0-beta.1");
        assert_eq!(canonicalize_version("1.0+build.5").unwrap(), "1.0.0+build.5");
    }

    #[test]
    fn test_canonicalize_version_rejects_garbage() {
        assert!(canonicalize_version("").is_err());
        assert!(canonicalize_version("abc").is_err());
        assert!(canonicalize_version("1.2.3.4").is_err());
        assert!(canonicalize_version("1..3").is_err());
    }

    #[test]
    fn test_normalize_parses_string_entries() {
        let mut descriptor = Descriptor {
            name: Some("pkg".to_string()),
            version: Some("1.0".to_string()),
            author: Some(AuthorEntry::Text("Jane <jane@example.org>".to_string())),
            contributors: vec![
                AuthorEntry::Text("Bob".to_string()),
                AuthorEntry::Record(AuthorInfo {
                    name: "Eve".to_string(),
                    email: Some("eve@example.org".to_string()),
                    web: None,
                }),
            ],
            ..Default::default()
        };
        descriptor.normalize();

        let author = descriptor.author_record().unwrap();
        assert_eq!(author.name, "Jane");
        assert_eq!(author.email.as_deref(), Some("jane@example.org"));

        let contributors = descriptor.contributor_records();
        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[0].name, "Bob");
        assert_eq!(contributors[1].name, "Eve");
    }

    #[test]
    fn test_validate_requires_name_and_version() {
        let mut descriptor = Descriptor::default();
        assert!(descriptor.validate().is_err());

        descriptor.name = Some("pkg".to_string());
        assert!(descriptor.validate().is_err());

        descriptor.version = Some("not-a-version".to_string());
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_requires_responsible_party() {
        let mut descriptor = Descriptor {
            name: Some("pkg".to_string()),
            version: Some("1.0".to_string()),
            ..Default::default()
        };
        assert!(descriptor.validate().is_err());

        descriptor.contributors = vec![AuthorEntry::Text("alice".to_string())];
        descriptor.normalize();
        assert!(descriptor.validate().is_ok());
        // version was canonicalized in place
        assert_eq!(descriptor.version(), "1.0.0");
    }
}
