use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lease represents one assignment snapshot from the ISC DHCP lease database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    pub is_active: bool,
    // Naive civil time as written by dhcpd; no zone is implied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<NaiveDateTime>,
}

impl Lease {
    /// A lease carrying only its address, every other field absent
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostname: None,
            mac_address: None,
            is_active: false,
            lease_start: None,
            lease_end: None,
        }
    }
}
