//! Built-in memory models.
//!
//! The models follow the usual axiomatic presentations, trimmed to the event
//! vocabulary of this crate (no address dependencies, no mixed-size accesses).
//! Every model includes per-location coherence and RMW atomicity.

use crate::wmm::{EventFilter, RelationExpr, RelationId, Wmm};

pub const MODEL_NAMES: &[&str] = &["sc", "tso", "arm8", "rc11"];

/// Looks up a built-in model by (case-insensitive) name.
pub fn by_name(name: &str) -> Option<Wmm> {
    match name.to_ascii_lowercase().as_str() {
        "sc" => Some(sc()),
        "tso" | "x86" => Some(tso()),
        "arm8" | "armv8" | "aarch64" => Some(arm8()),
        "rc11" | "c11" => Some(rc11()),
        _ => None,
    }
}

struct Common {
    po: RelationId,
    rf: RelationId,
    co: RelationId,
    fr: RelationId,
    rfe: RelationId,
    coe: RelationId,
    fre: RelationId,
}

fn common(wmm: &mut Wmm) -> Common {
    let po = wmm.po();
    wmm.named(po, "po");
    let rf = wmm.rf();
    wmm.named(rf, "rf");
    let co = wmm.co();
    wmm.named(co, "co");
    let fr = wmm.fr();
    wmm.named(fr, "fr");
    let rfe = wmm.external(rf);
    wmm.named(rfe, "rfe");
    let coe = wmm.external(co);
    wmm.named(coe, "coe");
    let fre = wmm.external(fr);
    wmm.named(fre, "fre");

    let po_loc = wmm.po_loc();
    wmm.named(po_loc, "po-loc");
    let coherence = wmm.union_all(po_loc, &[rf, co, fr]);
    wmm.named(coherence, "com-loc");
    wmm.acyclic(coherence, "sc-per-location");

    let rmw = wmm.rmw();
    wmm.named(rmw, "rmw");
    let fre_coe = wmm.composition(fre, coe);
    let broken = wmm.intersection(rmw, fre_coe);
    wmm.named(broken, "rmw-interrupted");
    wmm.empty(broken, "atomicity");

    Common {
        po,
        rf,
        co,
        fr,
        rfe,
        coe,
        fre,
    }
}

/// Sequential consistency.
pub fn sc() -> Wmm {
    let mut wmm = Wmm::new("sc");
    let c = common(&mut wmm);
    let hb = wmm.union_all(c.po, &[c.rf, c.co, c.fr]);
    wmm.named(hb, "sc-order");
    wmm.acyclic(hb, "sc");
    wmm
}

/// Total store order (x86-TSO).
pub fn tso() -> Wmm {
    let mut wmm = Wmm::new("tso");
    let c = common(&mut wmm);

    let write_read = wmm.product(EventFilter::Writes, EventFilter::Reads);
    let ppo = wmm.difference(c.po, write_read);
    wmm.named(ppo, "ppo");

    let mfence = wmm.fencerel("mfence");
    wmm.named(mfence, "mfence");
    let before_locked = wmm.restrict(c.po, EventFilter::All, EventFilter::Exclusive);
    let after_locked = wmm.restrict(c.po, EventFilter::Exclusive, EventFilter::All);
    let implied = wmm.union_all(mfence, &[before_locked, after_locked]);
    wmm.named(implied, "implied");

    let ghb = wmm.union_all(ppo, &[implied, c.rfe, c.co, c.fr]);
    wmm.named(ghb, "ghb");
    wmm.acyclic(ghb, "tso");
    wmm
}

/// A simplified ARMv8 (AArch64) model: external visibility requires the
/// ordered-before relation to be acyclic.
pub fn arm8() -> Wmm {
    let mut wmm = Wmm::new("arm8");
    let c = common(&mut wmm);

    let obs = wmm.union_all(c.rfe, &[c.coe, c.fre]);
    wmm.named(obs, "obs");

    let data = wmm.data();
    wmm.named(data, "data");
    let ctrl = wmm.ctrl();
    wmm.named(ctrl, "ctrl");
    let ctrl_w = wmm.restrict(ctrl, EventFilter::All, EventFilter::Writes);
    let dob = wmm.union(data, ctrl_w);
    wmm.named(dob, "dob");

    let rmw = wmm.rmw();
    let rfi = wmm.internal(c.rf);
    wmm.named(rfi, "rfi");
    let rmw_forward = wmm.restrict(
        rfi,
        EventFilter::Writes.and(EventFilter::Exclusive),
        EventFilter::Reads.and(EventFilter::Acquire),
    );
    let aob = wmm.union(rmw, rmw_forward);
    wmm.named(aob, "aob");

    let acquire_reads = EventFilter::Reads.and(EventFilter::Acquire);
    let release_writes = EventFilter::Writes.and(EventFilter::Release);
    let dmb_full = wmm.fencerel("dmb.full");
    let dmb_ld = wmm.fencerel("dmb.ld");
    let dmb_ld = wmm.restrict(dmb_ld, EventFilter::Reads, EventFilter::All);
    let dmb_st = wmm.fencerel("dmb.st");
    let dmb_st = wmm.restrict(dmb_st, EventFilter::Writes, EventFilter::Writes);
    let release_acquire = wmm.restrict(c.po, release_writes.clone(), acquire_reads.clone());
    let after_acquire = wmm.restrict(c.po, acquire_reads, EventFilter::All);
    let before_release = wmm.restrict(c.po, EventFilter::All, release_writes);
    let bob = wmm.union_all(
        dmb_full,
        &[dmb_ld, dmb_st, release_acquire, after_acquire, before_release],
    );
    wmm.named(bob, "bob");

    let ob = wmm.union_all(obs, &[dob, aob, bob]);
    wmm.named(ob, "ob");
    wmm.acyclic(ob, "external");
    wmm
}

/// An RC11-style model with a recursively defined happens-before.
pub fn rc11() -> Wmm {
    let mut wmm = Wmm::new("rc11");
    let c = common(&mut wmm);

    // rs = [W]; po-loc?; [W]; (rf; rmw)*
    let po_loc = wmm.po_loc();
    let po_loc_opt = wmm.optional(po_loc);
    let same_thread_writes = wmm.restrict(po_loc_opt, EventFilter::Writes, EventFilter::Writes);
    let rmw = wmm.rmw();
    let rf_rmw = wmm.composition(c.rf, rmw);
    let rf_rmw_star = wmm.star(rf_rmw);
    let rs = wmm.composition(same_thread_writes, rf_rmw_star);
    wmm.named(rs, "rs");

    // sw = [REL]; ([F]; po)?; rs; rf; [R]; (po; [F])?; [ACQ]
    let fence_po = wmm.restrict(c.po, EventFilter::Fence(None), EventFilter::All);
    let fence_po_opt = wmm.optional(fence_po);
    let po_fence = wmm.restrict(c.po, EventFilter::All, EventFilter::Fence(None));
    let po_fence_opt = wmm.optional(po_fence);
    let to_read = wmm.sequence(fence_po_opt, &[rs, c.rf]);
    let to_read = wmm.restrict(to_read, EventFilter::All, EventFilter::Reads);
    let sync = wmm.composition(to_read, po_fence_opt);
    let sw = wmm.restrict(sync, EventFilter::Release, EventFilter::Acquire);
    wmm.named(sw, "sw");

    // hb = po | sw | hb; hb
    let hb = wmm.declare("hb");
    let po_sw = wmm.union(c.po, sw);
    let hb_hb = wmm.composition(hb, hb);
    wmm.define(hb, RelationExpr::Union(po_sw, hb_hb));

    let com = wmm.union_all(c.rf, &[c.co, c.fr]);
    let eco = wmm.closure(com);
    wmm.named(eco, "eco");
    let eco_opt = wmm.optional(eco);
    let hb_eco = wmm.composition(hb, eco_opt);
    wmm.irreflexive(hb_eco, "coherence");

    let sc_order = wmm.union(c.po, com);
    let psc = wmm.restrict(sc_order, EventFilter::SeqCst, EventFilter::SeqCst);
    wmm.named(psc, "psc");
    wmm.acyclic(psc, "sc");

    let po_rf = wmm.union(c.po, c.rf);
    wmm.acyclic(po_rf, "no-thin-air");
    wmm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_models_validate() {
        for name in MODEL_NAMES {
            let wmm = by_name(name).expect("catalog entry");
            assert!(wmm.validate().is_ok(), "{name}: {:?}", wmm.validate());
            assert!(!wmm.axioms().is_empty());
        }
        assert!(by_name("power").is_none());
        assert_eq!(by_name("X86").map(|w| w.name().to_string()), Some("tso".into()));
    }

    #[test]
    fn every_model_checks_coherence_and_atomicity() {
        for name in MODEL_NAMES {
            let wmm = by_name(name).expect("catalog entry");
            let axioms: Vec<&str> = wmm.axioms().iter().map(|a| a.name.as_str()).collect();
            assert!(axioms.contains(&"sc-per-location"), "{name}");
            assert!(axioms.contains(&"atomicity"), "{name}");
        }
    }

    #[test]
    fn rc11_has_a_recursive_group() {
        let wmm = rc11();
        let hb = wmm.lookup("hb").expect("hb is named");
        let groups = wmm.recursive_groups();
        let group = groups
            .iter()
            .find(|g| g.contains(&hb))
            .expect("hb has a group");
        assert!(wmm.is_recursive(group));
        assert!(groups
            .iter()
            .filter(|g| !g.contains(&hb))
            .all(|g| !wmm.is_recursive(g)));
    }

    #[test]
    fn tso_preserved_program_order_is_static() {
        let wmm = tso();
        let ppo = wmm.lookup("ppo").expect("ppo is named");
        assert!(wmm.static_relations()[ppo]);
        let ghb = wmm.lookup("ghb").expect("ghb is named");
        assert!(!wmm.static_relations()[ghb]);
    }
}
