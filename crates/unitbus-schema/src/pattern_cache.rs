//! Process-wide cache of compiled regular expressions.
//!
//! Compiling a `pattern` string is the only expensive derived state a
//! [`crate::Schema`] carries, so this cache keys on the pattern text
//! itself rather than on a schema pointer (schemas are typically
//! constructed once and reused, but cloned freely).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::RwLock;

static CACHE: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = CACHE.read().unwrap().get(pattern) {
        return Ok(re.clone());
    }

    let compiled = Regex::new(pattern)?;
    CACHE.write().unwrap().insert(pattern.to_string(), compiled.clone());
    Ok(compiled)
}
