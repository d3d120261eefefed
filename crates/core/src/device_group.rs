//! Named sets of device identifiers whose data freshness is tracked together.

use std::collections::HashSet;

use crate::error::CoreError;

/// An immutable, non-empty, de-duplicated set of device identifiers.
///
/// Identifiers are opaque strings matched verbatim against the `device`
/// column of the samples table. Insertion order is preserved so logs
/// and queries are stable across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGroup {
    label: String,
    devices: Vec<String>,
}

impl DeviceGroup {
    /// Build a group from a label and a list of identifiers.
    ///
    /// Blank identifiers are dropped and duplicates keep their first
    /// occurrence. Fails if the label is blank or no identifiers remain.
    pub fn new<I, S>(label: impl Into<String>, devices: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let label = label.into().trim().to_string();
        if label.is_empty() {
            return Err(CoreError::Validation(
                "device group label must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        let devices: Vec<String> = devices
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .filter(|d| seen.insert(d.clone()))
            .collect();

        if devices.is_empty() {
            return Err(CoreError::Validation(format!(
                "device group '{label}' has no device identifiers"
            )));
        }

        Ok(Self { label, devices })
    }

    /// Human-readable name used in logs and alert messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always `false`; construction rejects empty groups.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Identifiers present in both `self` and `other`.
    ///
    /// Groups are expected to be disjoint, but this is not enforced; the
    /// caller decides whether an overlap is worth reporting.
    pub fn overlap<'a>(&'a self, other: &DeviceGroup) -> Vec<&'a str> {
        let theirs: HashSet<&str> = other.devices.iter().map(String::as_str).collect();
        self.devices
            .iter()
            .map(String::as_str)
            .filter(|d| theirs.contains(d))
            .collect()
    }
}
