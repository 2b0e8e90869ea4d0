//! Endpoint URL construction from `{name}` templates.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::contract::Params;

/// Query parameter carrying the access credential. Always appended last.
pub const ACCESS_CODE_PARAM: &str = "apiaccesscode";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlBuildError {
    #[error("placeholder '{{{name}}}' has no matching parameter")]
    MissingParameter { name: String },
    #[error("parameter '{name}' cannot be placed in a URL: {reason}")]
    UnsupportedValue { name: String, reason: String },
    #[error("malformed placeholder in template '{template}'")]
    MalformedTemplate { template: String },
}

/// Placeholder names in template order.
pub fn placeholders(template: &str) -> Result<Vec<String>, UrlBuildError> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| malformed(template))?;
        let name = &after[..end];
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid {
            return Err(malformed(template));
        }
        names.push(name.to_owned());
        rest = &after[end + 1..];
    }
    if rest.contains('}') {
        return Err(malformed(template));
    }
    Ok(names)
}

/// Builds the final request URL.
///
/// Placeholders are replaced with percent-encoded parameter values, parameters not
/// referenced by the template become query pairs, and the access code goes last.
/// Relative templates are joined onto `base_url`.
pub fn build_url(
    base_url: &str,
    template: &str,
    params: &Params,
    access_code: Option<&str>,
) -> Result<String, UrlBuildError> {
    let names = placeholders(template)?;
    let referenced: BTreeSet<&str> = names.iter().map(String::as_str).collect();

    let mut path = String::with_capacity(template.len() + 16);
    let mut rest = template;
    for name in &names {
        let token = format!("{{{name}}}");
        let Some(position) = rest.find(&token) else {
            return Err(malformed(template));
        };
        let value = params
            .get(name)
            .map(|value| render_value(name, value))
            .transpose()?
            .flatten()
            .ok_or_else(|| UrlBuildError::MissingParameter { name: name.clone() })?;
        path.push_str(&rest[..position]);
        path.push_str(&urlencoding::encode(&value));
        rest = &rest[position + token.len()..];
    }
    path.push_str(rest);

    let mut url = join(base_url, &path);

    let mut query = Vec::new();
    for (name, value) in params {
        if referenced.contains(name.as_str()) {
            continue;
        }
        if let Some(rendered) = render_value(name, value)? {
            query.push((name.as_str(), rendered));
        }
    }
    if let Some(code) = access_code {
        query.push((ACCESS_CODE_PARAM, code.to_owned()));
    }

    for (name, value) in query {
        append_query(&mut url, name, &value);
    }

    Ok(url)
}

/// Appends one percent-encoded query pair.
pub fn append_query(url: &mut String, name: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&urlencoding::encode(name));
    url.push('=');
    url.push_str(&urlencoding::encode(value));
}

/// Masks the access code so URLs can be logged.
pub fn redact_access_code(url: &str) -> String {
    let marker = format!("{ACCESS_CODE_PARAM}=");
    let Some(start) = url.find(&marker) else {
        return url.to_owned();
    };
    let value_start = start + marker.len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |offset| value_start + offset);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}

fn join(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    if path.is_empty() {
        return base_url.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn render_value(name: &str, value: &Value) -> Result<Option<String>, UrlBuildError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(_) | Value::Object(_) => {
                        return Err(UrlBuildError::UnsupportedValue {
                            name: name.to_owned(),
                            reason: String::from("nested collections are not supported"),
                        })
                    }
                    Value::Null => {}
                    scalar => {
                        if let Some(rendered) = render_value(name, scalar)? {
                            parts.push(rendered);
                        }
                    }
                }
            }
            Ok(Some(parts.join(",")))
        }
        Value::Object(_) => Err(UrlBuildError::UnsupportedValue {
            name: name.to_owned(),
            reason: String::from("objects are not supported"),
        }),
    }
}

fn malformed(template: &str) -> UrlBuildError {
    UrlBuildError::MalformedTemplate {
        template: template.to_owned(),
    }
}
