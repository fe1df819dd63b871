//! Job state codes
//!
//! The single-letter codes are a contract owned by the scheduler. Codes outside the vocabulary
//! are reported as errors rather than mapped to a guess.

use snoop_common::{Result, SnoopError};
use std::collections::BTreeMap;

/// PBS Pro job states. Sites with further codes add them through `SNOOP_EXTRA_JOB_STATES`;
/// anything outside this table and those extensions is rejected.
const BUILTIN_STATES: [(&str, &str); 12] = [
    ("B", "Begun"),
    ("E", "Exiting"),
    ("F", "Finished"),
    ("H", "Held"),
    ("M", "Moved"),
    ("Q", "Queued"),
    ("R", "Running"),
    ("S", "Suspended"),
    ("T", "Transiting"),
    ("U", "User Busy"),
    ("W", "Waiting"),
    ("X", "Subjob Finished"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStateVocabulary {
    names: BTreeMap<String, String>,
}

impl Default for JobStateVocabulary {
    fn default() -> Self {
        Self {
            names: BUILTIN_STATES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl JobStateVocabulary {
    /// Add site-specific codes. Built-in codes cannot be redefined.
    pub fn with_extensions<I, C, N>(mut self, extensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        for (code, name) in extensions {
            let code = code.into();
            if BUILTIN_STATES.iter().any(|(builtin, _)| *builtin == code) {
                return Err(SnoopError::config(format!(
                    "job state code '{code}' is built in and cannot be redefined"
                )));
            }
            self.names.insert(code, name.into());
        }
        Ok(self)
    }

    /// Human-readable name for `code`, or [`SnoopError::UnknownJobState`] naming the job.
    pub fn name(&self, job_id: &str, code: &str) -> Result<&str> {
        self.names
            .get(code.trim())
            .map(String::as_str)
            .ok_or_else(|| SnoopError::unknown_job_state(job_id, code))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Parse `"C=Completed,L=Lingering"` into code/name pairs.
pub fn parse_extensions(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (code, name) = entry.split_once('=').ok_or_else(|| {
                SnoopError::config(format!(
                    "job state extension '{entry}' must look like CODE=Name"
                ))
            })?;
            let (code, name) = (code.trim(), name.trim());
            if code.is_empty() || name.is_empty() {
                return Err(SnoopError::config(format!(
                    "job state extension '{entry}' has an empty code or name"
                )));
            }
            Ok((code.to_string(), name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_codes() {
        let states = JobStateVocabulary::default();
        assert_eq!(states.len(), 12);
        assert_eq!(states.name("1.pbs", "F").unwrap(), "Finished");
        assert_eq!(states.name("1.pbs", "R").unwrap(), "Running");
        assert_eq!(states.name("1.pbs", "Q").unwrap(), "Queued");
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        let err = JobStateVocabulary::default().name("42.pbs", "Z").unwrap_err();
        assert!(matches!(
            err,
            SnoopError::UnknownJobState { ref job_id, ref code }
                if job_id == "42.pbs" && code == "Z"
        ));
    }

    #[test]
    fn test_codes_are_case_sensitive() {
        assert!(JobStateVocabulary::default().name("1", "f").is_err());
    }

    #[test]
    fn test_extensions() {
        let states = JobStateVocabulary::default()
            .with_extensions(parse_extensions("C=Completed, L = Lingering").unwrap())
            .unwrap();
        assert_eq!(states.len(), 14);
        assert_eq!(states.name("1", "C").unwrap(), "Completed");
        assert_eq!(states.name("1", "L").unwrap(), "Lingering");
    }

    #[test]
    fn test_builtin_codes_cannot_be_redefined() {
        assert!(JobStateVocabulary::default()
            .with_extensions([("F", "Failed")])
            .is_err());
    }

    #[test]
    fn test_parse_extensions_rejects_malformed_entries() {
        assert!(parse_extensions("C").is_err());
        assert!(parse_extensions("=Completed").is_err());
        assert!(parse_extensions("").unwrap().is_empty());
    }
}
