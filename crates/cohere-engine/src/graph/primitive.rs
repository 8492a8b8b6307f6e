//! Edges of the base relations in one execution.

use cohere_ir::{BaseRelation, EventFilter, EventId};

use super::edge::Edge;
use crate::model::ExecutionModel;

/// Edges of a base relation other than `co`, which the search builds.
pub(crate) fn base_edges(base: &BaseRelation, model: &ExecutionModel<'_>) -> Vec<Edge> {
    match base {
        BaseRelation::Po => pairs(model, |m, a, b| {
            let (ea, eb) = (m.event(a), m.event(b));
            ea.thread.is_some() && ea.thread == eb.thread && ea.po_index < eb.po_index
        }),
        BaseRelation::Loc => pairs(model, |m, a, b| {
            let (ea, eb) = (m.event(a), m.event(b));
            a != b && ea.location().is_some() && ea.location() == eb.location()
        }),
        BaseRelation::Int => pairs(model, |m, a, b| {
            let (ea, eb) = (m.event(a), m.event(b));
            a != b && ea.thread.is_some() && ea.thread == eb.thread
        }),
        BaseRelation::Ext => pairs(model, |m, a, b| {
            let (ea, eb) = (m.event(a), m.event(b));
            a != b && (ea.thread.is_none() || ea.thread != eb.thread)
        }),
        BaseRelation::Id => identity(model, &EventFilter::All),
        BaseRelation::Identity(filter) => identity(model, filter),
        BaseRelation::Product(domain, range) => pairs(model, |m, a, b| {
            domain.matches(m.event(a)) && range.matches(m.event(b))
        }),
        BaseRelation::Rf => model
            .reads_from()
            .filter_map(|(w, r)| lift(model, w, r))
            .collect(),
        BaseRelation::Rmw => lift_all(model, &model.program().rmw),
        BaseRelation::Data => lift_all(model, &model.program().data_deps),
        BaseRelation::Ctrl => lift_all(model, &model.program().ctrl_deps),
        BaseRelation::Co => Vec::new(),
    }
}

/// `init -> w` for every executed write `w` of each location.
pub(crate) fn initial_coherence(model: &ExecutionModel<'_>) -> Vec<Edge> {
    let mut edges = Vec::new();
    for loc in 0..model.num_locations() {
        let writes = model.writes_to(loc);
        let Some(&init) = writes.iter().find(|&&w| model.event(w).is_init()) else {
            continue;
        };
        edges.extend(writes.iter().filter(|&&w| w != init).map(|&w| Edge::new(init, w)));
    }
    edges
}

fn pairs<F>(model: &ExecutionModel<'_>, related: F) -> Vec<Edge>
where
    F: Fn(&ExecutionModel<'_>, usize, usize) -> bool,
{
    let n = model.size();
    let mut edges = Vec::new();
    for a in 0..n {
        for b in 0..n {
            if related(model, a, b) {
                edges.push(Edge::new(a, b));
            }
        }
    }
    edges
}

fn identity(model: &ExecutionModel<'_>, filter: &EventFilter) -> Vec<Edge> {
    (0..model.size())
        .filter(|&a| filter.matches(model.event(a)))
        .map(|a| Edge::new(a, a))
        .collect()
}

fn lift(model: &ExecutionModel<'_>, a: EventId, b: EventId) -> Option<Edge> {
    Some(Edge::new(model.index_of(a)?, model.index_of(b)?))
}

fn lift_all(model: &ExecutionModel<'_>, pairs: &[(EventId, EventId)]) -> Vec<Edge> {
    pairs.iter().filter_map(|&(a, b)| lift(model, a, b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_ir::{CompiledProgram, Instruction, Program, ValueExpr};

    fn program() -> CompiledProgram {
        // e0 init x | e1 W x, e2 R x | e3 W x
        Program::new("p")
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(1)),
                Instruction::load("r", "x"),
            ])
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(2))])
            .compile()
            .unwrap_or_else(|e| panic!("compiles: {e}"))
    }

    #[test]
    fn program_order_and_threads() -> Result<(), crate::EngineError> {
        let program = program();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(3, 2)])?;
        assert_eq!(base_edges(&BaseRelation::Po, &model), vec![Edge::new(1, 2)]);
        let ext = base_edges(&BaseRelation::Ext, &model);
        assert!(ext.contains(&Edge::new(0, 1)));
        assert!(ext.contains(&Edge::new(1, 3)));
        assert!(!ext.contains(&Edge::new(1, 2)));
        assert_eq!(base_edges(&BaseRelation::Rf, &model), vec![Edge::new(3, 2)]);
        Ok(())
    }

    #[test]
    fn coherence_starts_at_init() -> Result<(), crate::EngineError> {
        let program = program();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(0, 2)])?;
        assert_eq!(
            initial_coherence(&model),
            vec![Edge::new(0, 1), Edge::new(0, 3)]
        );
        Ok(())
    }

    #[test]
    fn products_respect_filters() -> Result<(), crate::EngineError> {
        let program = program();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(1, 2)])?;
        let wr = base_edges(
            &BaseRelation::Product(EventFilter::Writes, EventFilter::Reads),
            &model,
        );
        assert_eq!(wr, vec![Edge::new(0, 2), Edge::new(1, 2), Edge::new(3, 2)]);
        Ok(())
    }
}
