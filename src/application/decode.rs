//! Turns an inbound request into a target URL, preset references and parameters.

use axum::http::Method;
use serde::Deserialize;
use thiserror::Error;
use url::form_urlencoded;

use crate::domain::{error::DomainError, params::RenderParams};

const JSON_MEDIA_TYPE: &str = "application/json";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Borrowed view of the request parts the decoder looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    pub content_type: Option<&'a str>,
    pub query: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipRequest {
    pub url: String,
    /// Preset references in request order; `auto` selects by URL.
    pub presets: Vec<String>,
    pub params: RenderParams,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("request body is empty")]
    EmptyBody,
    #[error("failed to decode json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Field(#[from] DomainError),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PresetRefs {
    List(Vec<String>),
    Joined(String),
}

#[derive(Debug, Deserialize)]
struct JsonClipRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    presets: Option<PresetRefs>,
    #[serde(flatten)]
    params: RenderParams,
}

fn media_type(content_type: Option<&str>) -> Option<String> {
    content_type.map(|value| {
        value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    })
}

/// Split a comma separated reference list, dropping empty entries.
pub fn split_preset_refs(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
}

pub fn decode_request(request: InboundRequest<'_>) -> Result<ClipRequest, DecodeError> {
    let media_type = media_type(request.content_type);

    if *request.method == Method::POST && media_type.as_deref() == Some(JSON_MEDIA_TYPE) {
        return decode_json(request.body);
    }

    if *request.method == Method::GET {
        return decode_form(query_pairs(request.query));
    }

    if *request.method == Method::POST {
        let mut pairs = Vec::new();
        if media_type.as_deref() == Some(FORM_MEDIA_TYPE) {
            pairs.extend(
                form_urlencoded::parse(request.body)
                    .map(|(name, value)| (name.into_owned(), value.into_owned())),
            );
        }
        pairs.extend(query_pairs(request.query));
        return decode_form(pairs);
    }

    Err(DecodeError::MethodNotAllowed)
}

fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_json(body: &[u8]) -> Result<ClipRequest, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::EmptyBody);
    }

    let decoded: JsonClipRequest = serde_json::from_slice(body)?;
    let presets = match decoded.presets {
        None => Vec::new(),
        Some(PresetRefs::Joined(joined)) => split_preset_refs(&joined).collect(),
        Some(PresetRefs::List(list)) => list
            .iter()
            .flat_map(|entry| split_preset_refs(entry))
            .collect(),
    };

    Ok(ClipRequest {
        url: decoded.url,
        presets,
        params: decoded.params,
    })
}

/// Decode name/value pairs through the field table. For a repeated name the first
/// value wins, and an empty value leaves the field unset.
pub fn decode_form<I, K, V>(pairs: I) -> Result<ClipRequest, DecodeError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut request = ClipRequest::default();
    let mut seen: Vec<String> = Vec::new();

    for (name, value) in pairs {
        let name = name.as_ref();
        if seen.iter().any(|known| known == name) {
            continue;
        }
        seen.push(name.to_string());

        let value = value.as_ref();
        if value.is_empty() {
            continue;
        }

        match name {
            "url" => request.url = value.to_string(),
            "presets" => request.presets.extend(split_preset_refs(value)),
            other => {
                if let Some(field) = RenderParams::field(other) {
                    field.assign(&mut request.params, value)?;
                }
            }
        }
    }

    Ok(request)
}
