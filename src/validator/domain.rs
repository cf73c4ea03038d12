/// Lower-cased display form and IDNA form of `domain`. The ASCII form is
/// empty when conversion fails.
pub(crate) fn normalize_domain(domain: &str) -> (String, String) {
    let lower = domain.trim().to_lowercase();
    let ascii = idna::domain_to_ascii(&lower).unwrap_or_default();
    (lower, ascii)
}

/// Validates the domain: raw dot placement, IDNA conversion, then
/// label-and-TLD structure on the ASCII form.
pub(crate) fn check_domain(domain: &str, reasons: &mut Vec<String>) {
    if domain.is_empty() {
        reasons.push("domain is empty".to_string());
        return;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        reasons.push("domain cannot start/end with '.'".to_string());
    }
    if domain.contains("..") {
        reasons.push("domain has consecutive dots".to_string());
    }

    let domain_ascii = match idna::domain_to_ascii(domain) {
        Ok(d) => d,
        Err(_) => {
            reasons.push("domain punycode conversion failed".to_string());
            return;
        }
    };

    if domain_ascii.is_empty() {
        reasons.push("domain empty after IDNA conversion".to_string());
        return;
    }
    if domain_ascii.len() > 253 {
        reasons.push(format!("domain length {} > 253", domain_ascii.len()));
    }

    let labels: Vec<&str> = domain_ascii.split('.').collect();
    if labels.len() < 2 {
        reasons.push("domain must contain at least one dot".to_string());
    }

    for label in &labels {
        if label.is_empty() {
            // already reported from the raw form
            continue;
        }
        if label.len() > 63 {
            reasons.push(format!(
                "domain label '{}' length {} > 63",
                label,
                label.len()
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            reasons.push(format!(
                "domain label '{}' cannot start/end with '-'",
                label
            ));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            reasons.push(format!("domain label '{}' has invalid chars", label));
        }
    }

    if labels.len() >= 2 {
        if let Some(tld) = labels.last().filter(|t| !t.is_empty()) {
            if !is_valid_tld(tld) {
                reasons.push(format!("top-level domain '{tld}' is not valid"));
            }
        }
    }
}

fn is_valid_tld(tld: &str) -> bool {
    tld.starts_with("xn--") || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}
