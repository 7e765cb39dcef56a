//! Built-in functions. Every built-in answers `false` on wrong arity, wrong
//! argument types or unparseable input rather than failing.

use std::net::IpAddr;
use std::sync::LazyLock;

use moka::sync::Cache;
use regex::Regex;

use super::eval::ExprValue;

pub const BUILTINS: &[&str] = &["starts_with", "ends_with", "contains", "matches", "in_cidr"];

const REGEX_CACHE_CAPACITY: u64 = 100;

static REGEX_CACHE: LazyLock<Cache<String, Regex>> =
    LazyLock::new(|| Cache::builder().max_capacity(REGEX_CACHE_CAPACITY).build());

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub fn call(name: &str, args: &[ExprValue]) -> ExprValue {
    let result = match (name, args) {
        ("starts_with", [ExprValue::Str(s), ExprValue::Str(prefix), ..]) => s.starts_with(prefix.as_str()),
        ("ends_with", [ExprValue::Str(s), ExprValue::Str(suffix), ..]) => s.ends_with(suffix.as_str()),
        ("contains", [ExprValue::Str(s), ExprValue::Str(needle), ..]) => s.contains(needle.as_str()),
        ("matches", [ExprValue::Str(s), ExprValue::Str(pattern), ..]) => {
            regex(pattern).is_some_and(|re| re.is_match(s))
        }
        ("in_cidr", [ExprValue::Str(ip), ExprValue::Str(cidr), ..]) => in_cidr(ip, cidr),
        _ => false,
    };
    ExprValue::Bool(result)
}

/// Compiled pattern from the shared cache.
pub fn regex(pattern: &str) -> Option<Regex> {
    if let Some(re) = REGEX_CACHE.get(pattern) {
        return Some(re);
    }
    let re = Regex::new(pattern).ok()?;
    REGEX_CACHE.insert(pattern.to_string(), re.clone());
    Some(re)
}

pub fn in_cidr(ip: &str, cidr: &str) -> bool {
    let Some((network, prefix)) = cidr.trim().split_once('/') else {
        return false;
    };
    let (Ok(ip), Ok(network), Ok(prefix)) = (
        ip.trim().parse::<IpAddr>(),
        network.parse::<IpAddr>(),
        prefix.parse::<u32>(),
    ) else {
        return false;
    };
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(network)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(ip) & mask == u32::from(network) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(network)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(ip) & mask == u128::from(network) & mask
        }
        _ => false,
    }
}
