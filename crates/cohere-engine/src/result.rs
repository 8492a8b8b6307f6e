use serde::Serialize;
use std::fmt;

use cohere_ir::EventId;

use crate::config::RefinementConfig;
use crate::literal::Reason;
use crate::model::ExecutionModel;
use crate::stats::{RefinementStats, RefinementSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

impl Verdict {
    /// Swaps PASS and FAIL; UNKNOWN stays.
    pub fn invert(self) -> Self {
        match self {
            Verdict::Pass => Verdict::Fail,
            Verdict::Fail => Verdict::Pass,
            Verdict::Unknown => Verdict::Unknown,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadsFromWitness {
    pub write: EventId,
    pub read: EventId,
    pub value: Option<i64>,
}

/// The consistent execution behind a FAIL of the violation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Witness {
    pub executed: Vec<EventId>,
    pub reads_from: Vec<ReadsFromWitness>,
}

impl Witness {
    pub fn from_model(model: &ExecutionModel<'_>) -> Self {
        Self {
            executed: model
                .events()
                .iter()
                .copied()
                .filter(|&e| !model.program().events[e].is_init())
                .collect(),
            reads_from: model
                .reads_from()
                .map(|(write, read)| ReadsFromWitness {
                    write,
                    read,
                    value: model.value(read),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub program: String,
    pub model: String,
    pub verdict: Verdict,
    /// Why the verdict is UNKNOWN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the assertion was inverted before reporting.
    pub inverted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
    pub summary: RefinementSummary,
    pub iterations: Vec<RefinementStats>,
    /// Reasons the solver was told to exclude, in the order they were found.
    pub clauses: Vec<Reason>,
    pub config: RefinementConfig,
}

impl VerificationReport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RESULT: {}", self.verdict)?;
        writeln!(f, "Program: {} under {}", self.program, self.model)?;
        if let Some(reason) = &self.reason {
            writeln!(f, "Reason: {reason}")?;
        }
        if let Some(witness) = &self.witness {
            writeln!(f, "Witness execution:")?;
            for rf in &witness.reads_from {
                match rf.value {
                    Some(v) => writeln!(f, "  e{} reads {} from e{}", rf.read, v, rf.write)?,
                    None => writeln!(f, "  e{} reads from e{}", rf.read, rf.write)?,
                }
            }
        }
        write!(
            f,
            "Refinement: {} iterations, {} clauses, {} coherence guesses",
            self.summary.iterations, self.summary.num_clauses, self.summary.num_guessed_coherences
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inversion_keeps_unknown() {
        assert_eq!(Verdict::Pass.invert(), Verdict::Fail);
        assert_eq!(Verdict::Fail.invert(), Verdict::Pass);
        assert_eq!(Verdict::Unknown.invert(), Verdict::Unknown);
    }

    #[test]
    fn verdict_serializes_uppercase() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Verdict::Unknown)?, "\"UNKNOWN\"");
        Ok(())
    }

    #[test]
    fn report_display_leads_with_result() -> Result<(), Box<dyn std::error::Error>> {
        let report = VerificationReport {
            program: "sb".into(),
            model: "tso".into(),
            verdict: Verdict::Fail,
            reason: None,
            inverted: false,
            witness: Some(Witness {
                executed: vec![2, 3],
                reads_from: vec![ReadsFromWitness {
                    write: 0,
                    read: 3,
                    value: Some(0),
                }],
            }),
            summary: RefinementSummary::default(),
            iterations: Vec::new(),
            clauses: Vec::new(),
            config: RefinementConfig::default(),
        };
        let text = report.to_string();
        assert!(text.starts_with("RESULT: FAIL\n"));
        assert!(text.contains("e3 reads 0 from e0"));
        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty()?)?;
        assert_eq!(json["verdict"], "FAIL");
        assert!(json.get("reason").is_none());
        assert_eq!(json["config"]["initial_approximation"], "empty");
        Ok(())
    }
}
