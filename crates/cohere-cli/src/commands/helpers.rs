use std::path::Path;

use miette::IntoDiagnostic;

use cohere_engine::InitialApproximation;
use cohere_ir::{models, Program, Wmm};

use crate::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format `{other}` (expected text | json)"
        )),
    }
}

pub(crate) fn parse_approximation(raw: &str) -> miette::Result<InitialApproximation> {
    match raw {
        "empty" => Ok(InitialApproximation::Empty),
        "po-loc-rf" => Ok(InitialApproximation::PoLocRf),
        other => Err(miette::miette!(
            "Unknown approximation `{other}` (expected empty | po-loc-rf)"
        )),
    }
}

pub(crate) fn lookup_model(name: &str) -> miette::Result<Wmm> {
    models::by_name(name).ok_or_else(|| {
        miette::miette!(
            "Unknown memory model `{name}` (expected one of: {})",
            models::MODEL_NAMES.join(", ")
        )
    })
}

pub(crate) fn read_program(path: &Path) -> miette::Result<Program> {
    let source = std::fs::read_to_string(path)
        .into_diagnostic()
        .map_err(|e| miette::miette!("Cannot read {}: {e}", path.display()))?;
    Program::from_json(&source).map_err(|e| miette::miette!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_approximations_parse() {
        assert_eq!(parse_output_format("json").ok(), Some(OutputFormat::Json));
        assert!(parse_output_format("yaml").is_err());
        assert_eq!(
            parse_approximation("po-loc-rf").ok(),
            Some(InitialApproximation::PoLocRf)
        );
        assert!(parse_approximation("full").is_err());
    }

    #[test]
    fn model_lookup_accepts_aliases() {
        assert_eq!(lookup_model("x86").map(|m| m.name().to_string()).ok(), Some("tso".into()));
        assert!(lookup_model("power").is_err());
    }
}
