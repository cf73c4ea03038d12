/// Local part rules: `[A-Za-z0-9._%+-]`, 1..=64 octets, no leading,
/// trailing or doubled dot. Pushes one reason per violated rule.
pub(crate) fn check_local(s: &str, reasons: &mut Vec<String>) {
    if s.is_empty() {
        reasons.push("local part is empty".to_string());
        return;
    }
    if s.len() > 64 {
        reasons.push(format!("local part length {} > 64", s.len()));
    }
    if s.starts_with('.') || s.ends_with('.') {
        reasons.push("local part cannot start/end with '.'".to_string());
    }
    if s.contains("..") {
        reasons.push("local part has consecutive dots".to_string());
    }
    if let Some(bad) = s.chars().find(|c| !is_local_char(*c)) {
        reasons.push(format!("local part has invalid char '{bad}'"));
    }
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-')
}
