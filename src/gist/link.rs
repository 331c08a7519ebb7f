use thiserror::Error;

/// The `Link` header was present but none of its entries could be read.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparsable Link header: {header:?}")]
pub struct LinkError {
    pub header: String,
}

/// One `<url>; rel="a b"` entry of a `Link` header.
#[derive(Debug, PartialEq, Eq)]
struct LinkEntry<'a> {
    url: &'a str,
    rels: Vec<&'a str>,
}

/// Find the `rel="next"` target in a `Link` header value.
///
/// Parsing is tolerant: entries without a URL or without a `rel` parameter
/// are skipped, and a header with no `next` relation means there is no next
/// page. Only a non-blank header in which not a single entry parses is an
/// error.
///
/// ```text
/// <https://api.github.com/user/1/gists?page=2>; rel="next", <...?page=5>; rel="last"
/// ```
pub fn next_link(header: &str) -> Result<Option<String>, LinkError> {
    if header.trim().is_empty() {
        return Ok(None);
    }

    let entries: Vec<LinkEntry> = split_entries(header)
        .into_iter()
        .filter_map(parse_entry)
        .collect();
    if entries.is_empty() {
        return Err(LinkError {
            header: header.to_string(),
        });
    }

    Ok(entries
        .iter()
        .find(|e| e.rels.iter().any(|r| r.eq_ignore_ascii_case("next")))
        .map(|e| e.url.to_string()))
}

/// Split on commas that are not inside `<...>`; URLs may carry commas.
fn split_entries(header: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_url = false;
    let mut start = 0;
    for (i, c) in header.char_indices() {
        match c {
            '<' => in_url = true,
            '>' => in_url = false,
            ',' if !in_url => {
                out.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&header[start..]);
    out
}

fn parse_entry(raw: &str) -> Option<LinkEntry<'_>> {
    let rest = raw.trim().strip_prefix('<')?;
    let end = rest.find('>')?;
    let url = rest[..end].trim();
    if url.is_empty() {
        return None;
    }

    let mut rels = Vec::new();
    for param in rest[end + 1..].split(';') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("rel") {
            rels.extend(value.trim().trim_matches('"').split_whitespace());
        }
    }
    if rels.is_empty() {
        return None;
    }
    Some(LinkEntry { url, rels })
}
