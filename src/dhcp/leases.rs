use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime};
use regex_lite::Regex;
use serde::Serialize;

use super::error::{LeaseError, TimestampError};
use crate::models::Lease;

/// Six hex pairs separated by `:` or `-`
const MAC_ADDRESS_PATTERN: &str = r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$";

/// Layout of `starts`/`ends` values, e.g. `2021/02/20 14:11:36`
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// How field and block failures are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Optional fields degrade to absent; failing blocks are skipped
    #[default]
    Tolerant,
    /// Every field is required; the first failing block aborts the parse
    Strict,
}

impl FromStr for ParsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerant" => Ok(Self::Tolerant),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown parse policy {:?} (expected tolerant or strict)", other)),
        }
    }
}

impl fmt::Display for ParsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tolerant => f.write_str("tolerant"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// Parse one lease block, from its `lease <ip> {` line to its closing brace.
///
/// The address is always required. The remaining fields are located by
/// keyword, in any order, and either degrade to absent or fail the block
/// depending on `policy`.
pub fn parse_lease(block: &str, policy: ParsePolicy) -> Result<Lease, LeaseError> {
    let lines: Vec<&str> = block.trim().lines().collect();
    let opening = match lines.first() {
        Some(line) if line.starts_with("lease") => *line,
        _ => return Err(LeaseError::MissingLeaseDeclaration),
    };

    let mut lease = Lease::with_ip(extract_ip(opening)?);
    lease.is_active = settle(extract_is_active(&lines), policy, &lease.ip)?.unwrap_or(false);
    lease.mac_address = settle(extract_mac_address(&lines), policy, &lease.ip)?;
    lease.hostname = settle(extract_hostname(&lines), policy, &lease.ip)?;
    lease.lease_start = settle(extract_lease_start(&lines), policy, &lease.ip)?;
    lease.lease_end = settle(extract_lease_end(&lines), policy, &lease.ip)?;

    Ok(lease)
}

/// Apply the policy to a single field result
fn settle<T>(result: Result<T, LeaseError>, policy: ParsePolicy, ip: &str) -> Result<Option<T>, LeaseError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if policy == ParsePolicy::Strict => Err(e),
        Err(e) => {
            tracing::debug!("lease {}: {}, leaving field unset", ip, e);
            Ok(None)
        }
    }
}

/// `lease 192.168.0.1 {`
pub fn extract_ip(line: &str) -> Result<String, LeaseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(LeaseError::InvalidIp(line.trim().to_string()));
    }
    if tokens[1].parse::<Ipv4Addr>().is_err() {
        return Err(LeaseError::InvalidIp(tokens[1].to_string()));
    }
    Ok(tokens[1].to_string())
}

/// `binding state active;`
pub fn extract_is_active(lines: &[&str]) -> Result<bool, LeaseError> {
    let line = find_declaration(lines, "binding").ok_or(LeaseError::MissingBindingState)?;
    let tokens = statement_tokens(line);
    if tokens.len() < 3 {
        return Err(LeaseError::MissingBindingState);
    }
    Ok(tokens[2] == "active")
}

/// `hardware ethernet 12:ab:cd:78:90:91;`
pub fn extract_mac_address(lines: &[&str]) -> Result<String, LeaseError> {
    let line = find_declaration(lines, "hardware").ok_or(LeaseError::InvalidMacAddress(None))?;
    let tokens = statement_tokens(line);
    if tokens.len() < 3 {
        return Err(LeaseError::InvalidMacAddress(None));
    }
    if !is_valid_mac(tokens[2]) {
        return Err(LeaseError::InvalidMacAddress(Some(tokens[2].to_string())));
    }
    Ok(tokens[2].to_string())
}

/// `client-hostname "MyLocalClient";`
pub fn extract_hostname(lines: &[&str]) -> Result<String, LeaseError> {
    let line = find_declaration(lines, "client-hostname").ok_or(LeaseError::MissingHostname)?;
    let value = line["client-hostname".len()..].trim().trim_end_matches(';').trim_end();

    // Quoted names may contain spaces or semicolons; take everything up to the closing quote
    let hostname = match value.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or(quoted),
        None => value.split_whitespace().next().unwrap_or(""),
    };

    if hostname.is_empty() {
        return Err(LeaseError::MissingHostname);
    }
    Ok(hostname.to_string())
}

/// `starts 6 2021/02/20 14:11:36;`
pub fn extract_lease_start(lines: &[&str]) -> Result<NaiveDateTime, LeaseError> {
    extract_timestamp(lines, "starts").map_err(LeaseError::InvalidLeaseStart)
}

/// `ends 6 2021/02/20 14:21:36;`
pub fn extract_lease_end(lines: &[&str]) -> Result<NaiveDateTime, LeaseError> {
    extract_timestamp(lines, "ends").map_err(LeaseError::InvalidLeaseEnd)
}

fn extract_timestamp(lines: &[&str], keyword: &str) -> Result<NaiveDateTime, TimestampError> {
    let line = find_declaration(lines, keyword).ok_or(TimestampError::Missing)?;

    match statement_tokens(line).as_slice() {
        // db-time-format local: `starts epoch 1613830296; # Sat Feb 20 14:11:36 2021`
        [_, "epoch", seconds, ..] => {
            let seconds: i64 = seconds
                .parse()
                .map_err(|_| TimestampError::Malformed(line.to_string()))?;
            DateTime::from_timestamp(seconds, 0)
                .map(|dt| dt.naive_utc())
                .ok_or(TimestampError::EpochOutOfRange(seconds))
        }
        [_, _, date, time, ..] => Ok(parse_timestamp(&format!("{} {}", date, time))?),
        _ => Err(TimestampError::Malformed(line.to_string())),
    }
}

/// Parse a `YYYY/MM/DD HH:MM:SS` value as naive civil time
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}

pub fn is_valid_mac(value: &str) -> bool {
    static MAC_RE: OnceLock<Option<Regex>> = OnceLock::new();
    MAC_RE
        .get_or_init(|| Regex::new(MAC_ADDRESS_PATTERN).ok())
        .as_ref()
        .map_or(false, |re| re.is_match(value))
}

/// First line whose trimmed text begins with `keyword`
fn find_declaration<'a>(lines: &[&'a str], keyword: &str) -> Option<&'a str> {
    lines.iter().map(|l| l.trim()).find(|l| l.starts_with(keyword))
}

/// Whitespace tokens of a statement, ignoring the terminator and any trailing comment
fn statement_tokens(line: &str) -> Vec<&str> {
    line.split(';').next().unwrap_or(line).split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dhcp::ErrorKind;
    use chrono::NaiveDate;

    const VALID_LEASE: &str = r#"
lease 192.168.0.1 {
  starts 6 2021/02/20 14:11:36;
  ends 6 2021/02/20 14:21:36;
  cltt 6 2021/02/20 14:11:36;
  binding state active;
  next binding state free;
  rewind binding state free;
  hardware ethernet 12:ab:CD:78:90:91;
  uid "\001\204\330\033E\023=";
  set vendor-class-identifier = "MSFT 5.0";
  client-hostname "MyLocalClient";
}
"#;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 2, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_full_lease() {
        let lease = parse_lease(VALID_LEASE, ParsePolicy::Tolerant).unwrap();
        assert_eq!(
            lease,
            Lease {
                ip: "192.168.0.1".into(),
                hostname: Some("MyLocalClient".into()),
                mac_address: Some("12:ab:CD:78:90:91".into()),
                is_active: true,
                lease_start: Some(ts(14, 11, 36)),
                lease_end: Some(ts(14, 21, 36)),
            }
        );
    }

    #[test]
    fn test_parse_full_lease_strict() {
        let lease = parse_lease(VALID_LEASE, ParsePolicy::Strict).unwrap();
        assert_eq!(lease.ip, "192.168.0.1");
        assert!(lease.is_active);
    }

    #[test]
    fn test_parse_minimal_scenario() {
        let block = "lease 192.168.0.1 {\n  binding state active;\n  hardware ethernet 12:ab:cd:78:90:91;\n  client-hostname \"MyLocalClient\";\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.ip, "192.168.0.1");
        assert_eq!(lease.hostname.as_deref(), Some("MyLocalClient"));
        assert_eq!(lease.mac_address.as_deref(), Some("12:ab:cd:78:90:91"));
        assert!(lease.is_active);
        assert_eq!(lease.lease_start, None);
        assert_eq!(lease.lease_end, None);
    }

    #[test]
    fn test_rejects_non_lease_block() {
        let err = parse_lease("foo {bar;}", ParsePolicy::Tolerant).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingLeaseDeclaration);
    }

    #[test]
    fn test_invalid_ip_is_fatal_in_both_policies() {
        for policy in [ParsePolicy::Tolerant, ParsePolicy::Strict] {
            let err = parse_lease("lease {\n}", policy).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIp);
            assert_eq!(err.field(), Some("ip"));
        }
        let err = parse_lease("lease not-an-ip {\n}", ParsePolicy::Tolerant).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIp);
    }

    #[test]
    fn test_invalid_mac_degrades_when_tolerant() {
        let block = "lease 192.168.0.1 {\n  starts 6 2021/02/20 14:11:36;\n  ends 6 2021/02/20 14:21:36;\n  hardware ethernet fo:ba:rf:iz;\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.mac_address, None);
        assert!(!lease.is_active);
        assert_eq!(lease.hostname, None);
        assert_eq!(lease.lease_start, Some(ts(14, 11, 36)));
        assert_eq!(lease.lease_end, Some(ts(14, 21, 36)));
    }

    #[test]
    fn test_invalid_mac_is_reported_by_extractor() {
        let lines = ["lease 192.168.0.1 {", "  hardware ethernet fo:ba:rf:iz;", "}"];
        match extract_mac_address(&lines) {
            Err(LeaseError::InvalidMacAddress(Some(value))) => assert_eq!(value, "fo:ba:rf:iz"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_mac_is_fatal_when_strict() {
        let block = "lease 10.0.0.5 {\n  starts 6 2021/02/20 14:11:36;\n  ends 6 2021/02/20 14:21:36;\n  binding state free;\n  client-hostname \"printer\";\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.mac_address, None);

        let err = parse_lease(block, ParsePolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMacAddress);
    }

    #[test]
    fn test_hostname_absent() {
        let block = "lease 192.168.0.1 {\n  binding state active;\n  starts 6 2021/02/20 14:11:36;\n  ends 6 2021/02/20 14:21:36;\n  hardware ethernet 12:ab:CD:78:90:91;\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.hostname, None);
        assert_eq!(lease.mac_address.as_deref(), Some("12:ab:CD:78:90:91"));

        let err = parse_lease(block, ParsePolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingHostname);
    }

    #[test]
    fn test_next_binding_state_is_not_binding_state() {
        let lines = ["lease 192.168.0.1 {", "  next binding state active;", "}"];
        assert!(matches!(extract_is_active(&lines), Err(LeaseError::MissingBindingState)));

        let lines = ["lease 192.168.0.1 {", "  binding state;", "}"];
        assert!(matches!(extract_is_active(&lines), Err(LeaseError::MissingBindingState)));

        let lines = ["lease 192.168.0.1 {", "  binding state free;", "}"];
        assert!(!extract_is_active(&lines).unwrap());
    }

    #[test]
    fn test_keyword_order_is_irrelevant() {
        let block = "lease 10.1.1.1 {\n  client-hostname \"b\";\n  hardware ethernet aa-bb-cc-dd-ee-ff;\n  binding state active;\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.hostname.as_deref(), Some("b"));
        assert_eq!(lease.mac_address.as_deref(), Some("aa-bb-cc-dd-ee-ff"));
        assert!(lease.is_active);
    }

    #[test]
    fn test_hostname_with_space() {
        let lines = ["  client-hostname \"Living Room TV\";"];
        assert_eq!(extract_hostname(&lines).unwrap(), "Living Room TV");

        let lines = ["  client-hostname \"\";"];
        assert!(matches!(extract_hostname(&lines), Err(LeaseError::MissingHostname)));
    }

    #[test]
    fn test_timestamp_layout() {
        let lines = ["starts 6 2021/02/20 14:11:36;"];
        assert_eq!(extract_lease_start(&lines).unwrap(), ts(14, 11, 36));
        assert_eq!(parse_timestamp("2021/02/20 14:11:36").unwrap(), ts(14, 11, 36));
    }

    #[test]
    fn test_epoch_timestamp() {
        let lines = ["  ends epoch 1613830296; # Sat Feb 20 14:11:36 2021"];
        assert_eq!(extract_lease_end(&lines).unwrap(), ts(14, 11, 36));
    }

    #[test]
    fn test_ends_never() {
        let lines = ["  ends never;"];
        let err = extract_lease_end(&lines).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidLeaseEnd);

        let block = "lease 10.0.0.9 {\n  binding state active;\n  ends never;\n}";
        let lease = parse_lease(block, ParsePolicy::Tolerant).unwrap();
        assert_eq!(lease.lease_end, None);
        assert!(lease.is_active);
    }

    #[test]
    fn test_malformed_date() {
        let lines = ["starts 6 2021-02-20 14:11:36;"];
        assert!(matches!(
            extract_lease_start(&lines),
            Err(LeaseError::InvalidLeaseStart(TimestampError::Parse(_)))
        ));
    }

    #[test]
    fn test_mac_pattern() {
        assert!(is_valid_mac("12:ab:CD:78:90:91"));
        assert!(is_valid_mac("12-ab-cd-78-90-91"));
        assert!(!is_valid_mac("12:ab:cd:78:90"));
        assert!(!is_valid_mac("12:ab:cd:78:90:91:22"));
        assert!(!is_valid_mac("zz:ab:cd:78:90:91"));
    }

    #[test]
    fn test_parse_policy_from_str() {
        assert_eq!("strict".parse::<ParsePolicy>().unwrap(), ParsePolicy::Strict);
        assert_eq!(" Tolerant ".parse::<ParsePolicy>().unwrap(), ParsePolicy::Tolerant);
        assert!("lenient".parse::<ParsePolicy>().is_err());
        assert_eq!(ParsePolicy::default(), ParsePolicy::Tolerant);
    }
}
