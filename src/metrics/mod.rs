//! Lease table publication.
//!
//! Parsing never reaches a metrics registry on its own. The watcher hands each
//! successfully parsed database to a [`LeasePublisher`], and the HTTP layer
//! renders whatever the publisher last recorded.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDateTime;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::dhcp::LeaseDatabase;
use crate::models::Lease;

/// Layout of the `lease_end` label value
const LEASE_END_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The label tuple recorded for one lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseObservation<'a> {
    pub hostname: Option<&'a str>,
    pub ip: &'a str,
    pub mac_address: Option<&'a str>,
    pub is_active: bool,
    pub lease_end: Option<NaiveDateTime>,
}

impl<'a> From<&'a Lease> for LeaseObservation<'a> {
    fn from(lease: &'a Lease) -> Self {
        Self {
            hostname: lease.hostname.as_deref(),
            ip: &lease.ip,
            mac_address: lease.mac_address.as_deref(),
            is_active: lease.is_active,
            lease_end: lease.lease_end,
        }
    }
}

/// Sink for parsed leases. Implementations must not fail and must be safe to
/// call from any thread.
pub trait LeasePublisher: Send + Sync {
    fn observe(&self, observation: &LeaseObservation<'_>);

    /// Forget everything observed so far
    fn reset(&self) {}

    /// Swap the published table for `leases`. Publishers that are read
    /// concurrently override this so readers never see a half-built table.
    fn replace(&self, leases: &[Lease]) {
        self.reset();
        for lease in leases {
            self.observe(&LeaseObservation::from(lease));
        }
    }
}

/// Replace the published table with the contents of `db`
pub fn publish(db: &LeaseDatabase, publisher: &dyn LeasePublisher) {
    tracing::debug!("Publishing {} leases", db.len());
    publisher.replace(&db.leases);
}

/// Publishes leases as the `router_dhcp_table` gauge on a private registry.
/// Each series carries the time it was last observed, in Unix seconds.
pub struct PrometheusPublisher {
    registry: Registry,
    table: GaugeVec,
    // Held for writing while the table is rebuilt, for reading while it is gathered
    table_lock: RwLock<()>,
}

impl PrometheusPublisher {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let table = GaugeVec::new(
            Opts::new("dhcp_table", "dhcp table containing ip assignment").namespace("router"),
            &["hostname", "ip_address", "mac_address", "is_active", "lease_end"],
        )?;
        registry.register(Box::new(table.clone()))?;
        Ok(Self {
            registry,
            table,
            table_lock: RwLock::new(()),
        })
    }

    /// Encode the registry in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let families = {
            let _guard = self.read_table();
            self.registry.gather()
        };
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    // The guarded value is unit, so a poisoned lock carries no broken state
    fn read_table(&self) -> RwLockReadGuard<'_, ()> {
        self.table_lock.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, ()> {
        self.table_lock.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_series(&self, observation: &LeaseObservation<'_>) {
        let lease_end = observation
            .lease_end
            .map(|t| t.format(LEASE_END_LABEL_FORMAT).to_string())
            .unwrap_or_default();
        let is_active = observation.is_active.to_string();
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

        self.table
            .with_label_values(&[
                observation.hostname.unwrap_or(""),
                observation.ip,
                observation.mac_address.unwrap_or(""),
                is_active.as_str(),
                lease_end.as_str(),
            ])
            .set(now);
    }
}

impl LeasePublisher for PrometheusPublisher {
    fn observe(&self, observation: &LeaseObservation<'_>) {
        let _guard = self.read_table();
        self.set_series(observation);
    }

    fn reset(&self) {
        let _guard = self.write_table();
        self.table.reset();
    }

    fn replace(&self, leases: &[Lease]) {
        let _guard = self.write_table();
        self.table.reset();
        for lease in leases {
            self.set_series(&LeaseObservation::from(lease));
        }
    }
}
