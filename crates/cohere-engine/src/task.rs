//! A program paired with the memory model it is verified against.

use tracing::debug;

use cohere_ir::{BranchEquivalence, CompiledProgram, Program, Wmm};
use cohere_smt::encoder::{
    encode_assertion_violation, encode_no_bound_event_exec, encode_po_loc_rf_acyclicity,
    encode_program, ProgramEncoding,
};
use cohere_smt::terms::SmtTerm;

use crate::config::{InitialApproximation, RefinementConfig};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct VerificationTask {
    pub program: CompiledProgram,
    pub wmm: Wmm,
    pub config: RefinementConfig,
}

impl VerificationTask {
    /// Compiles `program` and checks that `wmm` is well formed.
    pub fn new(program: &Program, wmm: Wmm, config: RefinementConfig) -> Result<Self, EngineError> {
        Self::from_compiled(program.compile()?, wmm, config)
    }

    pub fn from_compiled(
        mut program: CompiledProgram,
        wmm: Wmm,
        config: RefinementConfig,
    ) -> Result<Self, EngineError> {
        wmm.validate()?;
        // exec literals must name events that show up in the event graphs
        program
            .branch_equivalence
            .assign_visible_representatives(&program.events);
        debug!(
            program = %program.name,
            model = wmm.name(),
            events = program.events.len(),
            relations = wmm.num_relations(),
            "verification task ready"
        );
        Ok(Self {
            program,
            wmm,
            config,
        })
    }

    pub fn branch_equivalence(&self) -> &BranchEquivalence {
        &self.program.branch_equivalence
    }

    pub fn assertion_is_trivial(&self) -> bool {
        self.program.assertion.condition.is_trivially_true()
    }

    pub fn is_inverted(&self) -> bool {
        self.program.assertion.inverted
    }

    /// Control flow, data flow and reads-from of the program.
    pub fn encode_program(&self) -> ProgramEncoding {
        encode_program(&self.program)
    }

    /// What the solver is told about the memory model before refinement
    /// starts.
    pub fn encode_wmm_core(&self, program: &ProgramEncoding) -> ProgramEncoding {
        match self.config.initial_approximation {
            InitialApproximation::Empty => ProgramEncoding::default(),
            InitialApproximation::PoLocRf => {
                encode_po_loc_rf_acyclicity(&self.program, &program.rf_candidates)
            }
        }
    }

    /// Holds exactly in the executions that violate the assertion.
    pub fn encode_assertions(&self) -> SmtTerm {
        encode_assertion_violation(&self.program)
    }

    pub fn encode_no_bound_event_exec(&self) -> SmtTerm {
        encode_no_bound_event_exec(&self.program)
    }
}
