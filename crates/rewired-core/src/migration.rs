//! Forward upgrades for stored record bodies.
//!
//! A record envelope names the schema version its body was written with.
//! When that version is older than [`SCHEMA_VERSION`](crate::backend::SCHEMA_VERSION),
//! the body is rewritten one version at a time until it reaches the current
//! shape. Each [`MigrationStep`] upgrades exactly one version and works on
//! raw body bytes, so it can decode a legacy layout the current code no
//! longer knows about.
//!
//! Downgrades are never attempted. A record from a newer build is refused
//! by the backend before it gets here.

use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("cannot downgrade a record body from version {from} to {to}")]
    Downgrade { from: u32, to: u32 },
    #[error("no upgrade registered for version {version}")]
    MissingStep { version: u32 },
    #[error("upgrade {label} (version {from} to {}) failed: {reason}", .from + 1)]
    StepFailed {
        from: u32,
        label: &'static str,
        reason: String,
    },
}

/// Rewrites a body from its version to the next. Errors are plain reasons;
/// the registry attaches the version and label.
pub type UpgradeFn = fn(&[u8]) -> Result<Vec<u8>, String>;

#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// Short name for logs and errors.
    pub label: &'static str,
    pub upgrade: UpgradeFn,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

/// Upgrade steps keyed by the version they start from.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<u32, MigrationStep>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the step that lifts bodies written at `from` to `from + 1`.
    /// A second registration for the same version replaces the first.
    pub fn register(&mut self, from: u32, label: &'static str, upgrade: UpgradeFn) {
        if let Some(old) = self.steps.insert(from, MigrationStep { label, upgrade }) {
            tracing::debug!(from, replaced = old.label, label, "upgrade step replaced");
        }
    }

    /// Labels of the steps between `from` and `to`, or the first version
    /// with no step.
    pub fn path(&self, from: u32, to: u32) -> Result<Vec<&'static str>, MigrationError> {
        if from > to {
            return Err(MigrationError::Downgrade { from, to });
        }
        (from..to)
            .map(|version| {
                self.steps
                    .get(&version)
                    .map(|step| step.label)
                    .ok_or(MigrationError::MissingStep { version })
            })
            .collect()
    }

    /// Upgrade `body` from version `from` to `to`. The whole path is checked
    /// before any step runs.
    pub fn migrate(&self, body: &[u8], from: u32, to: u32) -> Result<Vec<u8>, MigrationError> {
        self.path(from, to)?;
        let mut current = body.to_vec();
        for from in from..to {
            let Some(step) = self.steps.get(&from) else {
                return Err(MigrationError::MissingStep { version: from });
            };
            current = (step.upgrade)(&current).map_err(|reason| MigrationError::StepFailed {
                from,
                label: step.label,
                reason,
            })?;
            tracing::debug!(from, step = step.label, bytes = current.len(), "record body upgraded");
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Toy layouts: v1 is a bare name, v2 prefixes its length, v3 appends a
    // zero date.

    fn length_prefix(body: &[u8]) -> Result<Vec<u8>, String> {
        let len = u8::try_from(body.len()).map_err(|_| "name too long".to_string())?;
        let mut out = vec![len];
        out.extend_from_slice(body);
        Ok(out)
    }

    fn zero_date(body: &[u8]) -> Result<Vec<u8>, String> {
        let mut out = body.to_vec();
        out.extend_from_slice(&0u64.to_le_bytes());
        Ok(out)
    }

    fn registry() -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        registry.register(1, "length-prefix", length_prefix);
        registry.register(2, "zero-date", zero_date);
        registry
    }

    #[test]
    fn current_body_passes_through() {
        let body = registry().migrate(b"Lab.lsv", 3, 3).unwrap();
        assert_eq!(body, b"Lab.lsv");
        assert_eq!(MigrationRegistry::new().path(2, 2).unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn oldest_body_climbs_every_step() {
        let registry = registry();
        assert_eq!(registry.path(1, 3).unwrap(), ["length-prefix", "zero-date"]);

        let body = registry.migrate(b"Lab.lsv", 1, 3).unwrap();
        let mut expected = vec![7];
        expected.extend_from_slice(b"Lab.lsv");
        expected.extend_from_slice(&[0; 8]);
        assert_eq!(body, expected);
    }

    #[test]
    fn gap_is_reported_before_anything_runs() {
        let mut registry = MigrationRegistry::new();
        registry.register(1, "explodes", |_| panic!("must not run"));
        let err = registry.migrate(b"x", 1, 3).unwrap_err();
        assert!(matches!(err, MigrationError::MissingStep { version: 2 }));
    }

    #[test]
    fn downgrade_is_refused() {
        let err = registry().migrate(b"x", 3, 1).unwrap_err();
        assert!(matches!(err, MigrationError::Downgrade { from: 3, to: 1 }));
    }

    #[test]
    fn failed_step_names_itself() {
        let long_name = vec![b'a'; 300];
        let err = registry().migrate(&long_name, 1, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "upgrade length-prefix (version 1 to 2) failed: name too long"
        );
    }

    #[test]
    fn reregistering_replaces_the_step() {
        let mut registry = registry();
        registry.register(2, "no-op", |body| Ok(body.to_vec()));
        assert_eq!(registry.path(2, 3).unwrap(), ["no-op"]);
        assert_eq!(registry.migrate(b"ab", 2, 3).unwrap(), b"ab");
    }
}
