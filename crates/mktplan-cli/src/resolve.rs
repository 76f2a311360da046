//! Id resolution: accept a full UUID or an unambiguous prefix.
//!
//! Entity ids are long; letting the operator type the first few characters
//! matches the usual CLI ergonomics for content-addressed ids.

use anyhow::{Result, bail};
use uuid::Uuid;

/// Resolve `input` against `candidates`: a full UUID parses directly, any
/// other string is treated as a prefix that must match exactly one
/// candidate's hyphenated form.
pub fn resolve_id(input: &str, candidates: &[Uuid]) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }

    let matches: Vec<Uuid> = candidates
        .iter()
        .copied()
        .filter(|id| id.to_string().starts_with(input))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no id matches {input:?}"),
        _ => bail!("{input:?} is ambiguous: matches {} ids", matches.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_uuid_parses_without_candidates() {
        let id = Uuid::new_v4();
        let resolved = resolve_id(&id.to_string(), &[]).unwrap();
        assert_eq!(resolved, id);
    }

    #[test]
    fn unique_prefix_resolves() {
        let a = "11111111-0000-0000-0000-000000000000".parse().unwrap();
        let b = "22222222-0000-0000-0000-000000000000".parse().unwrap();
        let resolved = resolve_id("11", &[a, b]).unwrap();
        assert_eq!(resolved, a);
    }

    #[test]
    fn ambiguous_prefix_errors() {
        let a = "11111111-0000-0000-0000-000000000000".parse().unwrap();
        let b = "11112222-0000-0000-0000-000000000000".parse().unwrap();
        let result = resolve_id("111", &[a, b]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ambiguous"));
    }

    #[test]
    fn unknown_prefix_errors() {
        let a = "11111111-0000-0000-0000-000000000000".parse().unwrap();
        assert!(resolve_id("9f", &[a]).is_err());
    }
}
