//! Link and resource reference rewriting.
//!
//! References are split into their raw components without normalization so that
//! rewriting only ever touches the scheme, authority and path it fills in. Relative
//! paths are appended to the page path instead of being resolved segment by segment.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("invalid control character in reference")]
    ControlCharacter,
    #[error("missing scheme before `:`")]
    MissingScheme,
    #[error("first path segment cannot contain a colon")]
    ColonInFirstSegment,
    #[error("invalid escape sequence `{0}`")]
    InvalidEscape(String),
    #[error("invalid character {0:?} in host")]
    InvalidHostCharacter(char),
    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

/// A parsed `href`/`src` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    scheme: String,
    opaque: Option<String>,
    userinfo: Option<String>,
    host: String,
    path: String,
    query: Option<String>,
    fragment: String,
}

fn is_control(byte: u8) -> bool {
    byte < 0x20 || byte == 0x7f
}

fn split_scheme(raw: &str) -> Result<(&str, &str), ReferenceError> {
    for (index, byte) in raw.bytes().enumerate() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' => {}
            b'0'..=b'9' | b'+' | b'-' | b'.' => {
                if index == 0 {
                    return Ok(("", raw));
                }
            }
            b':' => {
                if index == 0 {
                    return Err(ReferenceError::MissingScheme);
                }
                return Ok((&raw[..index], &raw[index + 1..]));
            }
            _ => return Ok(("", raw)),
        }
    }
    Ok(("", raw))
}

fn check_escapes(value: &str) -> Result<(), ReferenceError> {
    let bytes = value.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let valid = bytes.len() > index + 2
                && bytes[index + 1].is_ascii_hexdigit()
                && bytes[index + 2].is_ascii_hexdigit();
            if !valid {
                let end = (index + 3).min(bytes.len());
                return Err(ReferenceError::InvalidEscape(
                    String::from_utf8_lossy(&bytes[index..end]).into_owned(),
                ));
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    Ok(())
}

fn check_host(host: &str) -> Result<(), ReferenceError> {
    check_escapes(host)?;
    if let Some(invalid) = host.chars().find(|ch| {
        ch.is_ascii()
            && !ch.is_ascii_alphanumeric()
            && !"-._~!$&'()*+,;=:[]%<>\"".contains(*ch)
    }) {
        return Err(ReferenceError::InvalidHostCharacter(invalid));
    }

    let port = if let Some(rest) = host.strip_prefix('[') {
        match rest.find(']') {
            Some(close) => rest[close + 1..].strip_prefix(':'),
            None => return Err(ReferenceError::InvalidHostCharacter('[')),
        }
    } else {
        host.rfind(':').map(|colon| &host[colon + 1..])
    };
    if let Some(port) = port
        && !port.bytes().all(|byte| byte.is_ascii_digit())
    {
        return Err(ReferenceError::InvalidPort(port.to_string()));
    }
    Ok(())
}

impl Reference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        if raw.bytes().any(is_control) {
            return Err(ReferenceError::ControlCharacter);
        }

        let (raw, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, fragment),
            None => (raw, ""),
        };
        check_escapes(fragment)?;

        let mut reference = Reference {
            fragment: fragment.to_string(),
            ..Default::default()
        };
        if raw.is_empty() {
            return Ok(reference);
        }

        let (scheme, rest) = split_scheme(raw)?;
        reference.scheme = scheme.to_ascii_lowercase();

        let rest = match rest.split_once('?') {
            Some((rest, query)) => {
                reference.query = Some(query.to_string());
                rest
            }
            None => rest,
        };

        if !rest.starts_with('/') {
            if !reference.scheme.is_empty() {
                reference.opaque = Some(rest.to_string());
                return Ok(reference);
            }
            let first_segment = rest.split('/').next().unwrap_or_default();
            if first_segment.contains(':') {
                return Err(ReferenceError::ColonInFirstSegment);
            }
        }

        let mut path = rest;
        if (!reference.scheme.is_empty() || !rest.starts_with("///")) && rest.starts_with("//") {
            let authority_and_path = &rest[2..];
            let (authority, remainder) = match authority_and_path.find('/') {
                Some(slash) => authority_and_path.split_at(slash),
                None => (authority_and_path, ""),
            };
            let host = match authority.rsplit_once('@') {
                Some((userinfo, host)) => {
                    check_escapes(userinfo)?;
                    reference.userinfo = Some(userinfo.to_string());
                    host
                }
                None => authority,
            };
            check_host(host)?;
            reference.host = host.to_string();
            path = remainder;
        }

        check_escapes(path)?;
        reference.path = path.to_string();
        Ok(reference)
    }

    pub fn is_absolute(&self) -> bool {
        !self.scheme.is_empty()
    }

    /// Resolve against the page origin: fill in missing host and scheme, prefix relative
    /// paths with the origin path, and point pure fragments at the origin path.
    pub fn absolutize(&mut self, origin: &Reference) {
        if self.host.is_empty() {
            self.host.clone_from(&origin.host);
            self.scheme.clone_from(&origin.scheme);
        }

        if self.scheme.is_empty() {
            self.scheme.clone_from(&origin.scheme);
        } else if !self.path.is_empty() && !self.path.starts_with('/') {
            self.path = format!("{}/{}", origin.path, self.path);
        } else if self.path.is_empty() && self.query.is_none() && !self.fragment.is_empty() {
            self.path.clone_from(&origin.path);
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if let Some(opaque) = &self.opaque {
            f.write_str(opaque)?;
        } else {
            let has_authority = !self.scheme.is_empty() || !self.host.is_empty();
            if has_authority
                && (!self.host.is_empty() || !self.path.is_empty() || self.userinfo.is_some())
            {
                f.write_str("//")?;
                if let Some(userinfo) = &self.userinfo {
                    write!(f, "{userinfo}@")?;
                }
                f.write_str(&self.host)?;
            }
            if !self.path.is_empty() && !self.path.starts_with('/') && !self.host.is_empty() {
                f.write_str("/")?;
            }
            f.write_str(&self.path)?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Rewrite one attribute value, or `None` when it must be left untouched.
pub fn absolutize_value(value: &str, origin: &Reference) -> Option<String> {
    let mut reference = Reference::parse(value).ok()?;
    if reference.is_absolute() {
        return None;
    }
    reference.absolutize(origin);
    Some(reference.to_string())
}
