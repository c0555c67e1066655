use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lowercase, collapse any run of non-alphanumeric characters to a single
/// `_`, strip leading/trailing `_` (spec §4.2 step 1).
fn sanitize_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    let mut last_was_sep = false;
    for ch in slug.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

fn fingerprint(org_id: Uuid, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(org_id.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    hex[..len.min(hex.len())].to_string()
}

/// Deterministic, unique, stable graph name (spec §4.2 steps 2-3, properties
/// P6/P7): `org_{sanitized}_{fingerprint8}` with a slug, else
/// `org_{fingerprint16}`.
pub fn generate_graph_name(org_id: Uuid, slug: Option<&str>) -> String {
    match slug.map(sanitize_slug).filter(|s| !s.is_empty()) {
        Some(sanitized) => format!("org_{sanitized}_{}", fingerprint(org_id, 8)),
        None => format!("org_{}", fingerprint(org_id, 16)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            generate_graph_name(id, Some("Acme Corp")),
            generate_graph_name(id, Some("Acme Corp"))
        );
    }

    #[test]
    fn slug_sanitization_collisions_are_resolved_by_fingerprint() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let name_a = generate_graph_name(a, Some("acme-corp"));
        let name_b = generate_graph_name(b, Some("acme_corp"));
        // Both sanitize to "acme_corp" but differ because the fingerprint is
        // keyed on org_id, not slug (spec §4.2, edge case 5).
        assert_ne!(name_a, name_b);
        assert!(name_a.starts_with("org_acme_corp_"));
        assert!(name_b.starts_with("org_acme_corp_"));
    }

    #[test]
    fn falls_back_to_16_hex_without_slug() {
        let id = Uuid::new_v4();
        let name = generate_graph_name(id, None);
        assert_eq!(name.len(), "org_".len() + 16);
    }

    #[test]
    fn strips_and_collapses_separators() {
        assert_eq!(sanitize_slug("  Acme--Corp!! "), "acme_corp");
        assert_eq!(sanitize_slug("___"), "");
    }
}
