//! Parse HTTP response header lines into the fields the fetch needs.

/// Headers of interest from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHeaders {
    pub etag: Option<String>,
    pub location: Option<String>,
}

/// Parse collected header lines. The status line and blank lines are skipped.
pub(crate) fn parse_headers(lines: &[String]) -> ResponseHeaders {
    let mut headers = ResponseHeaders::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("etag") && !value.is_empty() {
                headers.etag = Some(parse_etag(value));
            }
            if name.eq_ignore_ascii_case("location") && !value.is_empty() {
                headers.location = Some(value.to_string());
            }
        }
    }

    headers
}

/// Strong ETags are stored without their quotes; weak ones (`W/"..."`) verbatim.
pub(crate) fn parse_etag(value: &str) -> String {
    let value = value.trim();
    if value.starts_with("W/") {
        return value.to_string();
    }
    value.trim_matches('"').to_string()
}

/// `If-None-Match` value for a stored validator.
pub(crate) fn if_none_match(validator: &str) -> String {
    if validator.starts_with("W/") || validator.starts_with('"') {
        validator.to_string()
    } else {
        format!("\"{validator}\"")
    }
}
