// Command handler for: Events

use std::path::Path;

use super::helpers::read_program;

pub(crate) fn run(file: &Path) -> miette::Result<()> {
    let program = read_program(file)?;
    let compiled = program
        .compile()
        .map_err(|e| miette::miette!("{}: {e}", file.display()))?;
    let be = &compiled.branch_equivalence;
    println!("Program: {}", compiled.name);
    for event in &compiled.events {
        let mut line = event.to_string();
        if event.thread.is_some() && !be.is_always_executed(event.id) {
            line.push_str(&format!("  (branch of e{})", be.representative(event.id)));
        }
        println!("  {line}");
    }
    println!(
        "{} events, {} threads, {} locations",
        compiled.events.len(),
        compiled.threads.len(),
        compiled.num_locations()
    );
    Ok(())
}
