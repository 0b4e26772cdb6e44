use crate::models::TransferUnit;

/// One line of the failure registry: `<unit>\t<reason>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub unit: TransferUnit,
    pub reason: String,
}

impl FailureEntry {
    /// Tabs and line breaks in the reason would break the line format
    pub fn new(unit: TransferUnit, reason: &str) -> Self {
        let reason = reason
            .chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string();
        Self { unit, reason }
    }

    pub fn to_line(&self) -> String {
        format!("{}\t{}", self.unit, self.reason)
    }

    /// Lines written before reasons were recorded carry only the unit
    pub fn parse(line: &str) -> Self {
        match line.split_once('\t') {
            Some((unit, reason)) => Self {
                unit: TransferUnit::from(unit.trim()),
                reason: reason.trim().to_string(),
            },
            None => Self {
                unit: TransferUnit::from(line.trim()),
                reason: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_is_sanitised() {
        let entry = FailureEntry::new("/data/a".into(), "peer said:\tno\nreally");
        assert_eq!(entry.to_line(), "/data/a\tpeer said: no really");
    }

    #[test]
    fn test_parse_without_reason() {
        let entry = FailureEntry::parse("/data/a");
        assert_eq!(entry.unit.id(), "/data/a");
        assert!(entry.reason.is_empty());
    }
}
