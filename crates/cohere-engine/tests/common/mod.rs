#![allow(dead_code)]

use cohere_engine::{EngineError, RefinementConfig, RefinementDriver, VerificationReport, VerificationTask};
use cohere_ir::{models, Program};
use cohere_smt::backends::z3_backend::Z3Solver;

pub fn load_litmus(name: &str) -> Program {
    let path = format!("{}/../../demos/litmus/{name}", env!("CARGO_MANIFEST_DIR"));
    let source =
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {path}: {e}"));
    Program::from_json(&source).unwrap_or_else(|e| panic!("Failed to parse {path}: {e}"))
}

pub fn load_all_litmus() -> Vec<(String, Program)> {
    let dir = format!("{}/../../demos/litmus", env!("CARGO_MANIFEST_DIR"));
    let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("Failed to read {dir}: {e}"))
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
        .into_iter()
        .map(|path| {
            let file = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown.json")
                .to_string();
            let program = load_litmus(&file);
            (file, program)
        })
        .collect()
}

pub fn test_config() -> RefinementConfig {
    RefinementConfig {
        timeout_secs: 60,
        ..RefinementConfig::default()
    }
}

pub fn verify_with(
    program: &Program,
    model: &str,
    config: RefinementConfig,
) -> Result<VerificationReport, EngineError> {
    let wmm = models::by_name(model).unwrap_or_else(|| panic!("unknown model {model}"));
    let task = VerificationTask::new(program, wmm, config)?;
    RefinementDriver::new(&task, Z3Solver::with_timeout_secs(60)).run()
}

pub fn verify(program: &Program, model: &str) -> Result<VerificationReport, EngineError> {
    verify_with(program, model, test_config())
}
