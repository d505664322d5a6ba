use std::fmt;
use std::path::Path;

/// A process holding an open handle on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub name: String,
}

/// Result of asking the OS who holds a file open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReport {
    Holders(Vec<LockHolder>),
    /// The platform offers no way to find out.
    Unknown,
}

impl fmt::Display for LockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockReport::Unknown => f.write_str("unknown holder"),
            LockReport::Holders(holders) if holders.is_empty() => f.write_str("no process"),
            LockReport::Holders(holders) => {
                let names: Vec<String> = holders
                    .iter()
                    .map(|h| format!("{} (pid {})", h.name, h.pid))
                    .collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

/// Diagnostic query used to enrich relocation failures.
///
/// Never blocks or retries; a process that exits mid-query is simply left
/// out of the report.
pub trait LockInspector: Send {
    fn inspect(&self, path: &Path) -> LockReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_holders() {
        let report = LockReport::Holders(vec![
            LockHolder {
                pid: 42,
                name: "convert".to_string(),
            },
            LockHolder {
                pid: 7,
                name: "ftpd".to_string(),
            },
        ]);
        assert_eq!(report.to_string(), "convert (pid 42), ftpd (pid 7)");
    }

    #[test]
    fn test_display_empty_and_unknown() {
        assert_eq!(LockReport::Holders(Vec::new()).to_string(), "no process");
        assert_eq!(LockReport::Unknown.to_string(), "unknown holder");
    }
}
