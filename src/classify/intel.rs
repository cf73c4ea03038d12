//! Static domain and local-part intelligence.

use std::collections::HashSet;
use std::sync::LazyLock;

use phf::{Set, phf_set};
use regex::Regex;
use unicode_script::{Script, UnicodeScript};

static DISPOSABLE_DOMAINS: Set<&'static str> = phf_set! {
    "10minutemail.com",
    "10minutemail.net",
    "20minutemail.com",
    "33mail.com",
    "dispostable.com",
    "dropmail.me",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.biz",
    "guerrillamail.com",
    "guerrillamail.de",
    "guerrillamail.net",
    "guerrillamail.org",
    "guerrillamailblock.com",
    "harakirimail.com",
    "maildrop.cc",
    "mailinator.com",
    "mailinator.net",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "sharklasers.com",
    "spamgourmet.com",
    "temp-mail.org",
    "tempail.com",
    "tempmail.com",
    "tempmail.net",
    "tempmail.org",
    "tempmailo.com",
    "tempr.email",
    "throwawaymail.com",
    "trashmail.com",
    "trashmail.de",
    "yopmail.com",
    "yopmail.fr",
};

static FREE_PROVIDERS: Set<&'static str> = phf_set! {
    "aol.com",
    "gmail.com",
    "googlemail.com",
    "gmx.com",
    "gmx.de",
    "gmx.net",
    "hotmail.com",
    "hotmail.co.uk",
    "hotmail.fr",
    "icloud.com",
    "live.com",
    "mail.com",
    "mail.ru",
    "me.com",
    "msn.com",
    "outlook.com",
    "proton.me",
    "protonmail.com",
    "yahoo.com",
    "yahoo.co.uk",
    "yahoo.fr",
    "yandex.com",
    "yandex.ru",
    "zoho.com",
};

/// Providers whose RCPT answers are trustworthy.
static RELIABLE_PROVIDERS: Set<&'static str> = phf_set! {
    "gmail.com",
    "googlemail.com",
    "hotmail.com",
    "icloud.com",
    "live.com",
    "outlook.com",
    "yahoo.com",
};

static ROLE_PREFIXES: Set<&'static str> = phf_set! {
    "abuse",
    "admin",
    "administrator",
    "billing",
    "contact",
    "donotreply",
    "do-not-reply",
    "help",
    "hostmaster",
    "info",
    "jobs",
    "marketing",
    "no-reply",
    "no_reply",
    "noreply",
    "office",
    "postmaster",
    "root",
    "sales",
    "security",
    "service",
    "support",
    "team",
    "webmaster",
};

const NO_REPLY_PREFIXES: &[&str] = &["noreply", "no-reply", "no_reply", "donotreply", "do-not-reply"];

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{6,}").expect("digit run pattern compiles"));
static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._%+-]{2,}").expect("separator run pattern compiles"));

/// `mail.mailinator.com` yields `mail.mailinator.com`, then `mailinator.com`.
fn suffixes(domain: &str) -> impl Iterator<Item = &str> {
    let domain = domain.trim_end_matches('.');
    std::iter::once(domain).chain(
        domain
            .match_indices('.')
            .map(move |(i, _)| &domain[i + 1..])
            .filter(|rest| rest.contains('.')),
    )
}

fn listed(set: &Set<&'static str>, domain: &str) -> bool {
    let lower = domain.to_ascii_lowercase();
    suffixes(&lower).any(|candidate| set.contains(candidate))
}

pub fn is_disposable(domain: &str) -> bool {
    listed(&DISPOSABLE_DOMAINS, domain)
}

pub fn is_free_provider(domain: &str) -> bool {
    FREE_PROVIDERS.contains(domain.to_ascii_lowercase().as_str())
}

pub fn is_reliable_provider(domain: &str) -> bool {
    RELIABLE_PROVIDERS.contains(domain.to_ascii_lowercase().as_str())
}

/// The role prefix of `local`, if any: an exact match, or a match followed by
/// a non-letter (`info2`, `sales.eu`). Sub-addressing tags are ignored.
pub fn role_prefix(local: &str) -> Option<&'static str> {
    let lower = local.to_ascii_lowercase();
    let base = lower.split('+').next().unwrap_or_default();
    if let Some(role) = ROLE_PREFIXES.get_key(base).copied() {
        return Some(role);
    }
    ROLE_PREFIXES.iter().copied().find(|role| {
        base.strip_prefix(role)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|next| !next.is_ascii_alphabetic())
    })
}

pub fn is_no_reply(local: &str) -> bool {
    let lower = local.to_ascii_lowercase();
    NO_REPLY_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Long digit runs or repeated separators in the local part, or a domain
/// mixing writing systems.
pub fn is_suspicious(local: &str, domain: &str) -> bool {
    DIGIT_RUN.is_match(local) || SEPARATOR_RUN.is_match(local) || mixed_scripts(domain)
}

fn mixed_scripts(text: &str) -> bool {
    text.split('.').any(|label| {
        let scripts: HashSet<Script> = label.chars().filter_map(major_script).collect();
        scripts.len() > 1
    })
}

fn major_script(ch: char) -> Option<Script> {
    match ch.script() {
        Script::Common | Script::Inherited | Script::Unknown => None,
        script => Some(script),
    }
}
