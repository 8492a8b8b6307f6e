//! The candidate execution extracted from one solver model.

use std::collections::{BTreeMap, HashMap};

use cohere_ir::{CompiledProgram, Event, EventId, LocationId};
use cohere_smt::encoder::variables::{exec_var, rf_var, val_var};
use cohere_smt::solver::Model;

use crate::error::EngineError;

/// Index of an executed visible event inside an [`ExecutionModel`].
pub type ModelIndex = usize;

/// Executed visible events (dense, in event-id order) with their
/// reads-from choice. Coherence is not part of the model; the search
/// constructs it.
#[derive(Debug, Clone)]
pub struct ExecutionModel<'p> {
    program: &'p CompiledProgram,
    events: Vec<EventId>,
    index_of: HashMap<EventId, ModelIndex>,
    rf: BTreeMap<EventId, EventId>,
    values: HashMap<EventId, i64>,
    writes_by_location: Vec<Vec<ModelIndex>>,
}

impl<'p> ExecutionModel<'p> {
    /// Builds a model from an explicit execution. `rf` lists (write, read)
    /// pairs; every executed read needs exactly one.
    pub fn new(
        program: &'p CompiledProgram,
        executed: impl IntoIterator<Item = EventId>,
        rf: impl IntoIterator<Item = (EventId, EventId)>,
    ) -> Result<Self, EngineError> {
        let mut events: Vec<EventId> = executed
            .into_iter()
            .filter(|&e| e < program.events.len() && program.events[e].is_visible())
            .collect();
        events.extend(program.init_events.iter().copied());
        events.sort_unstable();
        events.dedup();

        let index_of: HashMap<EventId, ModelIndex> =
            events.iter().enumerate().map(|(i, &e)| (e, i)).collect();

        let mut reads_from = BTreeMap::new();
        for (write, read) in rf {
            if !index_of.contains_key(&read) {
                continue;
            }
            if !index_of.contains_key(&write) {
                return Err(EngineError::MalformedModel(format!(
                    "e{read} reads from e{write}, which does not execute"
                )));
            }
            if !program.events[write].is_write() || !program.events[read].is_read() {
                return Err(EngineError::MalformedModel(format!(
                    "rf(e{write}, e{read}) does not connect a write to a read"
                )));
            }
            if program.events[write].location() != program.events[read].location() {
                return Err(EngineError::MalformedModel(format!(
                    "rf(e{write}, e{read}) crosses locations"
                )));
            }
            if reads_from.insert(read, write).is_some() {
                return Err(EngineError::MalformedModel(format!(
                    "e{read} reads from more than one write"
                )));
            }
        }
        for &e in &events {
            if program.events[e].is_read() && !reads_from.contains_key(&e) {
                return Err(EngineError::MalformedModel(format!(
                    "executed read e{e} has no write to read from"
                )));
            }
        }

        let mut writes_by_location = vec![Vec::new(); program.num_locations()];
        for (idx, &e) in events.iter().enumerate() {
            let event = &program.events[e];
            if let (true, Some(loc)) = (event.is_write(), event.location()) {
                writes_by_location[loc].push(idx);
            }
        }

        Ok(Self {
            program,
            events,
            index_of,
            rf: reads_from,
            values: HashMap::new(),
            writes_by_location,
        })
    }

    /// Reads the execution off a solver model of the program encoding.
    pub fn from_solver_model(
        program: &'p CompiledProgram,
        rf_candidates: &[(EventId, EventId)],
        model: &Model,
    ) -> Result<Self, EngineError> {
        let executed = program
            .visible_events()
            .map(|e| e.id)
            .filter(|&e| model.is_true(&exec_var(e)));
        let rf = rf_candidates
            .iter()
            .copied()
            .filter(|&(w, r)| model.is_true(&rf_var(w, r)));
        let mut execution = Self::new(program, executed, rf)?;
        execution.values = execution
            .events
            .iter()
            .filter_map(|&e| model.get_int(&val_var(e)).map(|v| (e, v)))
            .collect();
        Ok(execution)
    }

    pub fn program(&self) -> &'p CompiledProgram {
        self.program
    }

    /// Number of executed visible events.
    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn event_id(&self, index: ModelIndex) -> EventId {
        self.events[index]
    }

    pub fn event(&self, index: ModelIndex) -> &'p Event {
        &self.program.events[self.events[index]]
    }

    pub fn index_of(&self, event: EventId) -> Option<ModelIndex> {
        self.index_of.get(&event).copied()
    }

    pub fn is_executed(&self, event: EventId) -> bool {
        self.index_of.contains_key(&event)
    }

    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    /// The write `read` takes its value from.
    pub fn read_from(&self, read: EventId) -> Option<EventId> {
        self.rf.get(&read).copied()
    }

    /// (write, read) pairs of the reads-from relation.
    pub fn reads_from(&self) -> impl Iterator<Item = (EventId, EventId)> + '_ {
        self.rf.iter().map(|(&r, &w)| (w, r))
    }

    pub fn value(&self, event: EventId) -> Option<i64> {
        self.values.get(&event).copied()
    }

    /// Executed writes to `location`, init first.
    pub fn writes_to(&self, location: LocationId) -> &[ModelIndex] {
        &self.writes_by_location[location]
    }

    pub fn num_locations(&self) -> usize {
        self.writes_by_location.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_ir::{Instruction, Program, ValueExpr};
    use cohere_smt::solver::ModelValue;

    fn message_passing() -> CompiledProgram {
        // e0 init x, e1 init y | e2 W x, e3 W y | e4 R y, e5 R x
        Program::new("mp")
            .with_location("x", 0)
            .with_location("y", 0)
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(1)),
                Instruction::store("y", ValueExpr::constant(1)),
            ])
            .with_thread(vec![Instruction::load("r1", "y"), Instruction::load("r2", "x")])
            .compile()
            .unwrap_or_else(|e| panic!("mp compiles: {e}"))
    }

    #[test]
    fn explicit_model_indexes_events() -> Result<(), EngineError> {
        let program = message_passing();
        let model = ExecutionModel::new(&program, [2, 3, 4, 5], [(3, 4), (0, 5)])?;
        assert_eq!(model.size(), 6);
        assert_eq!(model.index_of(3), Some(3));
        assert_eq!(model.read_from(5), Some(0));
        assert_eq!(model.writes_to(0), &[0, 2]);
        assert_eq!(model.writes_to(1), &[1, 3]);
        Ok(())
    }

    #[test]
    fn executed_read_needs_a_write() {
        let program = message_passing();
        let result = ExecutionModel::new(&program, [2, 3, 4, 5], [(3, 4)]);
        assert!(matches!(result, Err(EngineError::MalformedModel(_))));
    }

    #[test]
    fn rf_must_stay_on_one_location() {
        let program = message_passing();
        let result = ExecutionModel::new(&program, [2, 3, 4, 5], [(2, 4), (0, 5)]);
        assert!(matches!(result, Err(EngineError::MalformedModel(_))));
    }

    #[test]
    fn reads_solver_model() -> Result<(), EngineError> {
        let program = message_passing();
        let mut solver_model = Model::default();
        for e in 0..6 {
            solver_model
                .values
                .insert(exec_var(e), ModelValue::Bool(e != 5));
        }
        solver_model
            .values
            .insert(rf_var(1, 4), ModelValue::Bool(true));
        solver_model
            .values
            .insert(val_var(4), ModelValue::Int(0));
        let candidates = [(1, 4), (3, 4), (0, 5), (2, 5)];
        let model = ExecutionModel::from_solver_model(&program, &candidates, &solver_model)?;
        assert!(!model.is_executed(5));
        assert_eq!(model.read_from(4), Some(1));
        assert_eq!(model.value(4), Some(0));
        Ok(())
    }
}
