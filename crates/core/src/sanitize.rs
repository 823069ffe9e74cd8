/// Longest base name (everything before the extension), disambiguator included.
pub const MAX_BASE_LEN: usize = 105;

/// Smallest accepted base budget; leaves room for a counter after the base.
pub const MIN_BASE_LEN: usize = 16;

/// Budget communicated to users for the whole filename, extension included.
pub const MAX_FILENAME_LEN: usize = 110;

/// Turns one raw metadata cell into a slug token.
///
/// Blank or absent values yield `None` and contribute nothing to the name.
/// Non-ASCII letters and symbols are dropped rather than transliterated.
pub fn slugify_field(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut in_space_run = false;
    for ch in trimmed.to_lowercase().chars() {
        if ch == ' ' {
            if !in_space_run {
                out.push('-');
            }
            in_space_run = true;
        } else if is_slug_char(ch) {
            in_space_run = false;
            out.push(ch);
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

pub fn slugify_fields<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    values.into_iter().filter_map(slugify_field).collect()
}

pub fn build_base_name(tokens: &[String], max_len: usize) -> String {
    let joined = tokens
        .iter()
        .filter(|token| !token.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("-");
    let collapsed = collapse_hyphens(&joined);
    truncate_base(collapsed.trim_matches('-'), max_len)
}

pub fn truncate_base(base: &str, max_len: usize) -> String {
    let truncated: String = base.chars().take(max_len).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Lowercased extension with its leading dot, or an empty string.
pub fn file_extension(original_name: &str) -> String {
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    match file_name.rfind('.') {
        Some(pos) if file_name[..pos].chars().any(|c| c != '.') => {
            file_name[pos..].to_lowercase()
        }
        _ => String::new(),
    }
}

fn collapse_hyphens(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_hyphen = false;
    for ch in value.chars() {
        if ch == '-' {
            if prev_hyphen {
                continue;
            }
            prev_hyphen = true;
        } else {
            prev_hyphen = false;
        }
        out.push(ch);
    }
    out
}

fn is_slug_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-'
}
