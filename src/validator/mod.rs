//! Structural address check. Pure: no I/O, never blocks.

mod domain;
mod local;
mod types;

pub use types::{EmailAddress, SyntaxReport};

use domain::{check_domain, normalize_domain};
use local::check_local;

/// Validates `email` (trimmed) and decomposes it into local part and domain.
///
/// Every violated rule adds a reason; the address is valid when none did.
pub fn validate_email(email: &str) -> SyntaxReport {
    let input = email.trim();

    let mut reasons = Vec::new();

    if input.len() > 254 {
        reasons.push(format!("total length {} > 254", input.len()));
    }

    let parts: Vec<&str> = input.split('@').collect();
    if parts.len() != 2 {
        reasons.push("must contain exactly one '@'".to_string());
        return SyntaxReport {
            original: email.to_string(),
            valid: false,
            local_part: String::new(),
            domain: String::new(),
            ascii_domain: String::new(),
            reasons,
        };
    }
    let (local, domain) = (parts[0], parts[1]);

    check_local(local, &mut reasons);
    check_domain(domain, &mut reasons);

    let (domain_lower, ascii_domain) = normalize_domain(domain);

    SyntaxReport {
        original: email.to_string(),
        valid: reasons.is_empty(),
        local_part: local.to_string(),
        domain: domain_lower,
        ascii_domain,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_basic() {
        let r = validate_email("alice@example.com");
        assert!(r.valid, "{:?}", r.reasons);
        assert_eq!(r.local_part, "alice");
        assert_eq!(r.domain, "example.com");
        assert_eq!(r.ascii_domain, "example.com");
    }

    #[test]
    fn trims_and_lowercases_domain() {
        let r = validate_email("  Bob.Smith@Example.ORG ");
        assert!(r.valid, "{:?}", r.reasons);
        assert_eq!(r.local_part, "Bob.Smith");
        assert_eq!(r.domain, "example.org");
    }

    #[test]
    fn rejects_double_at() {
        assert!(!validate_email("a@@b.com").valid);
        assert!(!validate_email("a@b@c.com").valid);
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(!validate_email("@example.com").valid);
        assert!(!validate_email("user@").valid);
        assert!(!validate_email("").valid);
    }

    #[test]
    fn normalized_has_ascii_domain() {
        let r = validate_email("alice@exämple.com");
        assert!(r.valid, "{:?}", r.reasons);
        assert!(r.ascii_domain.starts_with("xn--"));
        let address = r.into_address().expect("valid address");
        assert_eq!(address.envelope(), format!("alice@{}", address.ascii_domain()));
    }

    #[test]
    fn invalid_report_has_no_address() {
        assert!(validate_email("nope").into_address().is_none());
    }

    proptest! {
        #[test]
        fn strings_without_at_are_invalid(s in "[^@]{0,40}") {
            prop_assert!(!validate_email(&s).valid);
        }

        #[test]
        fn strings_with_two_ats_are_invalid(a in "[a-z]{1,8}", b in "[a-z]{1,8}", c in "[a-z]{1,8}") {
            let input = format!("{a}@{b}@{c}.com");
            prop_assert!(!validate_email(&input).valid);
        }

        #[test]
        fn simple_addresses_are_valid(local in "[a-z0-9]{1,20}", host in "[a-z]{1,20}", tld in "[a-z]{2,6}") {
            let input = format!("{local}@{host}.{tld}");
            let report = validate_email(&input);
            prop_assert!(report.valid, "{:?}", report.reasons);
        }
    }
}
