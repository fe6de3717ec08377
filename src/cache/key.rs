/// Prefix for bundle keys in the shared store
pub const SHARED_KEY_PREFIX: &str = "drone_planner:city:";

const MAX_KEY_CHARS: usize = 100;

/// Stand-in for names with no word characters at all
const EMPTY_KEY: &str = "_";

/// Make a city name safe for file names and store keys.
///
/// Drops everything except word characters, whitespace and `-`, collapses
/// runs of whitespace and `-` into `_`, trims `_` from both ends and keeps at
/// most 100 characters.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_whitespace() || c == '-' {
            pending_sep = true;
        } else if c.is_alphanumeric() || c == '_' {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c);
        }
    }
    if pending_sep {
        out.push('_');
    }

    out.trim_matches('_').chars().take(MAX_KEY_CHARS).collect()
}

/// Key shared by both cache tiers for one city
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_city(city_name: &str) -> Self {
        let sanitized = sanitize_name(city_name.trim());
        if sanitized.is_empty() {
            Self(EMPTY_KEY.to_string())
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn shared_key(&self) -> String {
        format!("{}{}", SHARED_KEY_PREFIX, self.0)
    }

    pub fn file_name(&self) -> String {
        format!("{}.bin", self.0)
    }
}
