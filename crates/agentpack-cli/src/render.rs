//! Plain-text rendering of core reports

use agentpack_core::{ApplyOutcome, BuildPlan, IntegrityReport};

fn flag(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAIL"
    }
}

pub fn apply(outcome: &ApplyOutcome, show_diff: bool) {
    println!("Mapped fields ({}):", outcome.mapping_report.len());
    for entry in &outcome.mapping_report {
        println!(
            "  {:<34} -> {}{} [{}]",
            entry.source_field, entry.target_pack, entry.target_path, entry.action
        );
    }

    let verb = if outcome.dry_run { "would change" } else { "changed" };
    println!(
        "\nFiles {verb} in {} ({}):",
        outcome.output_dir.display(),
        outcome.changed_files.len()
    );
    for path in &outcome.changed_files {
        println!("  {}", path.display());
    }

    if show_diff {
        for entry in outcome.diff_report.iter().filter(|d| d.changed) {
            println!("\n--- {} ---", entry.pack_name);
            print!("{}", entry.unified_diff);
        }
    }
}

pub fn plan(plan: &BuildPlan) {
    println!("Build order:");
    for (i, name) in plan.order.iter().enumerate() {
        println!("  {:>2}. {name}", i + 1);
    }
    for warning in &plan.warnings {
        println!("warning: {warning}");
    }
    for (pack, keys) in &plan.invalid {
        println!("invalid: {pack}: {}", keys.join(", "));
    }
}

pub fn integrity(report: &IntegrityReport) {
    println!("Integrity report (mode: {})", report.mode);
    println!("  contract:     {}", flag(report.contract_ok));
    for violation in &report.contract_violations {
        println!("    {violation}");
    }
    for (pack, keys) in &report.missing_keys {
        println!("    {pack}: missing {}", keys.join(", "));
    }

    println!("  crossref:     {}", flag(report.crossref_ok));
    for issue in &report.crossref_issues {
        println!("    {issue}");
    }

    println!("  completeness: {}", flag(report.packs_complete));
    for pack in &report.missing_packs {
        println!("    missing pack {pack}");
    }
    for (pack, sections) in &report.missing_sections {
        println!("    {pack}: missing sections {}", sections.join(", "));
    }

    println!("  parity:       {}", flag(report.parity_ok));
    for (name, agree) in &report.parity {
        println!("    {name}: {agree}");
    }

    println!("\n{}", if report.ok() { "OK" } else { "NOT OK" });
}
