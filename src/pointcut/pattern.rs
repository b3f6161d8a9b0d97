//! Simple `*` wildcard matching for type, method, and rule names.

/// Match `text` against `pattern`, where `*` matches any run of characters.
///
/// `"get*"`, `"*Service"`, `"*Repo*"` and `"save*All"` are all supported.
/// A lone `"*"` matches everything, including the empty string.
pub fn simple_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let mut parts = pattern.split('*');
    // split always yields at least one element
    let head = parts.next().unwrap_or("");
    if !text.starts_with(head) {
        return false;
    }
    let mut rest = &text[head.len()..];

    let middle: Vec<&str> = parts.collect();
    let Some((tail, inner)) = middle.split_last() else {
        return true;
    };

    for piece in inner {
        if piece.is_empty() {
            continue;
        }
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }

    rest.ends_with(tail)
}

/// Returns true if any pattern matches `text`.
pub fn any_match<S: AsRef<str>>(patterns: &[S], text: &str) -> bool {
    patterns.iter().any(|p| simple_match(p.as_ref(), text))
}
