/// Minimal domain hierarchy utilities shared by the analysis stages.
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the domain portion of an email address.
    pub fn extract_domain(address: &str) -> Option<String> {
        address
            .split('@')
            .nth(1)
            .map(|d| d.trim_matches(|c| c == '<' || c == '>' || c == ' ').to_lowercase())
            .filter(|d| !d.is_empty())
    }

    /// Check if a host matches any entry in a list (exact or subdomain).
    pub fn matches_domain_list(host: &str, domain_list: &[String]) -> bool {
        let host_lower = host.to_lowercase();

        for pattern in domain_list {
            let pattern_lower = pattern.to_lowercase();

            if host_lower == pattern_lower {
                return true;
            }

            // Subdomain match (host ends with .pattern)
            if host_lower.ends_with(&format!(".{pattern_lower}")) {
                return true;
            }
        }

        false
    }

    /// Canonicalize a host (lower-case, strip a leading www).
    pub fn canonicalize(host: &str) -> String {
        let host_lower = host.to_lowercase();
        if let Some(stripped) = host_lower.strip_prefix("www.") {
            stripped.to_string()
        } else {
            host_lower
        }
    }

    /// Last dot-segment of a host, lower-cased. None for single-label hosts.
    pub fn extract_tld(host: &str) -> Option<String> {
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() >= 2 {
            Some(parts.last()?.to_lowercase())
        } else {
            None
        }
    }

    /// Whether a host ends with any of the given TLD suffixes. Entries may
    /// carry a leading dot; matching is suffix-based so `xyz` also covers
    /// `login.verify-now.xyz`.
    pub fn has_tld_in(host: &str, tlds: &[String]) -> bool {
        let host_lower = host.to_lowercase();
        tlds.iter().any(|tld| {
            let tld = tld.trim_start_matches('.').to_lowercase();
            host_lower == tld || host_lower.ends_with(&format!(".{tld}"))
        })
    }

    /// Whether two hosts share a substring relationship in either direction,
    /// after canonicalization. IP literals never relate to named domains.
    pub fn domains_related(a: &str, b: &str) -> bool {
        let a = Self::canonicalize(a);
        let b = Self::canonicalize(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a.contains(&b) || b.contains(&a)
    }
}
