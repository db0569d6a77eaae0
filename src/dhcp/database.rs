use std::path::Path;

use serde::Serialize;

use super::error::LeaseError;
use super::{parse_lease, ParsePolicy};
use crate::models::Lease;

/// LeaseDatabase is the table reconstructed from one read of the lease file
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaseDatabase {
    pub leases: Vec<Lease>,
    /// Blocks dropped under the tolerant policy
    pub skipped: Vec<SkippedBlock>,
}

/// A lease block that did not produce a lease. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBlock {
    pub first_line: usize,
    pub last_line: usize,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub reason: String,
}

impl LeaseDatabase {
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &Lease> {
        self.leases.iter().filter(|l| l.is_active)
    }
}

/// Read the lease file and parse it.
/// I/O failures are reported as `SourceUnreadable`, distinct from parse failures.
pub async fn read_database(path: impl AsRef<Path>, policy: ParsePolicy) -> Result<LeaseDatabase, LeaseError> {
    let path = path.as_ref();
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| LeaseError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let db = parse_database(&String::from_utf8_lossy(&content), policy)?;
    tracing::info!(
        "Parsed dhcp database {} ({} leases, {} skipped)",
        path.display(),
        db.len(),
        db.skipped.len()
    );
    Ok(db)
}

/// Split the file content into lease blocks and parse each one in file order.
///
/// A block opens on a line starting with `lease` and closes on the first line,
/// the opening one included, that contains `}`. Anything outside a block is
/// ignored, and a block still open at end of input is dropped.
pub fn parse_database(content: &str, policy: ParsePolicy) -> Result<LeaseDatabase, LeaseError> {
    let lines: Vec<&str> = content.lines().collect();
    let mut db = LeaseDatabase::default();
    let mut block_start: Option<usize> = None;

    for (idx, line) in lines.iter().enumerate() {
        if block_start.is_none() && line.trim_start().starts_with("lease") {
            block_start = Some(idx);
        }

        let start = match block_start {
            Some(start) if line.contains('}') => start,
            _ => continue,
        };
        block_start = None;

        let raw = lines[start..=idx].join("\n");
        match parse_lease(&raw, policy) {
            Ok(lease) => db.leases.push(lease),
            Err(e) => {
                let (first_line, last_line) = (start + 1, idx + 1);
                if policy == ParsePolicy::Strict {
                    return Err(LeaseError::MalformedLeaseBlock {
                        first_line,
                        last_line,
                        source: Box::new(e),
                    });
                }
                tracing::warn!(
                    "Skipping lease parsing between lines {}:{}: {}",
                    first_line,
                    last_line,
                    e
                );
                db.skipped.push(SkippedBlock {
                    first_line,
                    last_line,
                    kind: e.kind().as_str(),
                    field: e.field(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(start) = block_start {
        tracing::debug!("Dropping unterminated lease block starting at line {}", start + 1);
    }

    if db.is_empty() {
        return Err(LeaseError::EmptyOrUnparseableDatabase {
            skipped: db.skipped.len(),
        });
    }

    Ok(db)
}
