//! Per-test `hoverfly` directive: which fixture, and whether to record it

use serde::Deserialize;
use std::str::FromStr;

use crate::error::{HarnessError, Result};
use crate::simulation::fixture_file_name;

/// Fixture to use for one test
///
/// Deserializing rejects unknown fields, and so does the compact string
/// form accepted by [`FromStr`]:
///
/// ```text
/// archive_org_simulation
/// archive_org_simulation,record
/// name=archive_org_simulation,record=true,stateful=true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub record: bool,
    #[serde(default)]
    pub stateful: bool,
}

/// What a session does with the fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStrategy {
    /// Upload the fixture and serve it
    Replay,
    /// Proxy real traffic and write it to the fixture
    Record { stateful: bool },
}

impl Directive {
    /// Replay an existing fixture
    pub fn replay(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record: false,
            stateful: false,
        }
    }

    /// Record a new fixture
    pub fn record(name: impl Into<String>) -> Self {
        Self {
            record: true,
            ..Self::replay(name)
        }
    }

    /// Record repeated identical requests as a sequence
    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn file_name(&self) -> String {
        fixture_file_name(&self.name)
    }

    /// `stateful` only matters when recording
    pub fn strategy(&self) -> SessionStrategy {
        if self.record {
            SessionStrategy::Record {
                stateful: self.stateful,
            }
        } else {
            SessionStrategy::Replay
        }
    }
}

impl FromStr for Directive {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let mut name = None;
        let mut record = false;
        let mut stateful = false;
        let mut unknown = Vec::new();

        for (index, part) in s.split(',').map(str::trim).enumerate() {
            if part.is_empty() {
                continue;
            }

            let (key, value) = match part.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (part, None),
            };

            match (key, value) {
                ("name", Some(value)) => name = Some(value.to_string()),
                ("record", value) => record = parse_flag(key, value)?,
                ("stateful", value) => stateful = parse_flag(key, value)?,
                // A bare leading word is the fixture name
                (word, None) if index == 0 => name = Some(word.to_string()),
                _ => unknown.push(part.to_string()),
            }
        }

        if !unknown.is_empty() {
            return Err(HarnessError::UnknownDirectiveArgument(unknown.join(", ")));
        }

        match name {
            Some(name) if !name.is_empty() => Ok(Self {
                name,
                record,
                stateful,
            }),
            _ => Err(HarnessError::InvalidDirective(format!(
                "'{}' does not name a simulation",
                s
            ))),
        }
    }
}

fn parse_flag(key: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(HarnessError::InvalidDirective(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let directive: Directive = "archive_org_simulation".parse().unwrap();
        assert_eq!(directive, Directive::replay("archive_org_simulation"));
        assert_eq!(directive.strategy(), SessionStrategy::Replay);
        assert_eq!(directive.file_name(), "archive_org_simulation.json");
    }

    #[test]
    fn test_parse_flags() {
        let directive: Directive = "archive_org_simulation, record, stateful".parse().unwrap();
        assert_eq!(directive, Directive::record("archive_org_simulation").stateful());
        assert_eq!(
            directive.strategy(),
            SessionStrategy::Record { stateful: true }
        );

        let directive: Directive = "name=sim.json,record=true,stateful=false".parse().unwrap();
        assert_eq!(directive.name, "sim.json");
        assert_eq!(directive.file_name(), "sim.json");
        assert_eq!(
            directive.strategy(),
            SessionStrategy::Record { stateful: false }
        );
    }

    #[test]
    fn test_stateful_without_record_replays() {
        let directive: Directive = "sim,stateful".parse().unwrap();
        assert_eq!(directive.strategy(), SessionStrategy::Replay);
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let err = "name=archive_org_simulation,doge=doge"
            .parse::<Directive>()
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnknownDirectiveArgument(ref a) if a == "doge=doge"));
        assert!(err.is_configuration());

        let err = "sim,replay".parse::<Directive>().unwrap_err();
        assert!(matches!(err, HarnessError::UnknownDirectiveArgument(_)));
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(matches!(
            "record=true".parse::<Directive>(),
            Err(HarnessError::InvalidDirective(_))
        ));
        assert!(matches!(
            "".parse::<Directive>(),
            Err(HarnessError::InvalidDirective(_))
        ));
    }

    #[test]
    fn test_invalid_flag_value() {
        assert!(matches!(
            "sim,record=yes".parse::<Directive>(),
            Err(HarnessError::InvalidDirective(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let directive: Directive =
            serde_json::from_str(r#"{"name": "sim", "record": true}"#).unwrap();
        assert_eq!(directive, Directive::record("sim"));

        let err = serde_json::from_str::<Directive>(r#"{"name": "sim", "doge": "doge"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("doge"));
    }
}
