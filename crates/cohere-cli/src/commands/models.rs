// Command handler for: Models

use serde::Serialize;

use cohere_ir::models;

use super::helpers::parse_output_format;
use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub(crate) struct ModelSummary {
    pub(crate) name: String,
    pub(crate) relations: usize,
    pub(crate) axioms: Vec<String>,
}

pub(crate) fn summaries() -> Vec<ModelSummary> {
    models::MODEL_NAMES
        .iter()
        .filter_map(|name| models::by_name(name))
        .map(|wmm| ModelSummary {
            name: wmm.name().to_string(),
            relations: wmm.num_relations(),
            axioms: wmm.axioms().iter().map(|a| a.name.clone()).collect(),
        })
        .collect()
}

pub(crate) fn run(format: &str) -> miette::Result<()> {
    let summaries = summaries();
    match parse_output_format(format)? {
        OutputFormat::Text => {
            for s in &summaries {
                println!(
                    "{:<6} {:>3} relations  axioms: {}",
                    s.name,
                    s.relations,
                    s.axioms.join(", ")
                );
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summaries)
                .map_err(|e| miette::miette!("{e}"))?;
            println!("{json}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_model_is_listed() {
        let names: Vec<String> = summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["sc", "tso", "arm8", "rc11"]);
    }

    #[test]
    fn every_model_checks_per_location_coherence() {
        for s in summaries() {
            assert!(s.axioms.iter().any(|a| a == "sc-per-location"), "{}", s.name);
        }
    }
}
