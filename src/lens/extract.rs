/// Best-effort recovery of a JSON object from free-form model text.
///
/// Strips a leading markdown fence, then clips to the first `{` and the last
/// `}`. The result may still be invalid JSON; the caller's parse decides.
pub fn extract_json(raw: &str) -> String {
    let mut s = raw.trim();

    if s.starts_with("```") {
        s = strip_fence(s);
    }

    if !s.starts_with('{')
        && let Some(idx) = s.find('{')
    {
        s = &s[idx..];
    }

    if !s.ends_with('}')
        && let Some(idx) = s.rfind('}')
    {
        s = &s[..=idx];
    }

    s.to_string()
}

fn strip_fence(s: &str) -> &str {
    let body = &s[3..];
    let body = body.strip_prefix("json").unwrap_or(body).trim_start();
    match body.trim_end().strip_suffix("```") {
        Some(without_close) => without_close.trim_end(),
        None => body,
    }
}
