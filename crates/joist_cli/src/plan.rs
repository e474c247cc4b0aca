//! `joist plan`: which steps would run, and in what order.
//!
//! Planning updates fingerprints in memory only; the history on disk is
//! left untouched so a later build still sees the changes.

use std::collections::HashMap;

use joist_engine::{plan_document, BuildContext, Plan};
use joist_graph::{GraphDocument, StepId};
use joist_stale::{ActionHistory, StaleReason};
use serde_json::json;

use crate::project::{engine_config, project_root};
use crate::{GlobalArgs, PlanArgs, ReportFormat};

/// Runs the `joist plan` command.
pub fn run(args: &PlanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let root = project_root(global)?;
    let config = engine_config(global, &root)?;
    let mut ctx = match &args.history {
        Some(path) => BuildContext::with_history(&root, config, ActionHistory::load(path))?,
        None => BuildContext::new(&root, config)?,
    };
    if args.ignore_import_libraries {
        ctx.set_ignore_outdated_import_libraries(true);
    }

    let document = GraphDocument::read(&args.actions)?;
    let plan = plan_document(&ctx, document)?;

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!(
                    "   Planned {} of {} steps",
                    plan.order.len(),
                    plan.graph.len()
                );
            }
            print!("{}", render_text(&plan));
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&render_json(&plan))?);
        }
    }
    Ok(0)
}

fn reasons(plan: &Plan) -> HashMap<StepId, &StaleReason> {
    plan.outdated.iter().map(|o| (o.step, &o.reason)).collect()
}

/// One line per step in execution order.
fn render_text(plan: &Plan) -> String {
    if plan.is_empty() {
        return "up to date\n".to_string();
    }
    let reasons = reasons(plan);
    let width = plan.order.len().to_string().len();
    let mut out = String::new();
    for (index, &id) in plan.order.iter().enumerate() {
        let label = plan.graph.step(id).label();
        match reasons.get(&id) {
            Some(reason) => {
                out.push_str(&format!("{:>width$}. {label} ({reason})\n", index + 1))
            }
            None => out.push_str(&format!("{:>width$}. {label}\n", index + 1)),
        }
    }
    out
}

fn render_json(plan: &Plan) -> serde_json::Value {
    let reasons = reasons(plan);
    let artifacts = plan.graph.artifacts();
    let steps: Vec<serde_json::Value> = plan
        .order
        .iter()
        .map(|&id| {
            let step = plan.graph.step(id);
            json!({
                "id": id.as_raw(),
                "kind": step.kind.to_string(),
                "label": step.label(),
                "reason": reasons.get(&id).map(|r| r.to_string()),
                "produced": step.produced_paths(artifacts).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "total": plan.graph.len(),
        "outdated": steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joist_config::EngineConfig;
    use std::path::Path;

    fn sample(dir: &Path) -> GraphDocument {
        let text = json!({
            "Actions": [
                {
                    "id": 1,
                    "kind": "Compile",
                    "commandPath": "cc",
                    "commandArguments": "-c a.cpp",
                    "producedItems": [dir.join("a.o")]
                },
                {
                    "id": 2,
                    "kind": "Link",
                    "commandPath": "ld",
                    "commandArguments": "a.o -o app",
                    "prerequisiteActionIds": [1],
                    "producedItems": [dir.join("app")]
                }
            ]
        });
        GraphDocument::from_json(&text.to_string()).unwrap()
    }

    fn planned(dir: &Path) -> Plan {
        let ctx = BuildContext::with_history(dir, EngineConfig::default(), ActionHistory::in_memory())
            .unwrap();
        plan_document(&ctx, sample(dir)).unwrap()
    }

    #[test]
    fn text_lists_steps_in_order_with_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let text = render_text(&planned(dir.path()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. "));
        assert!(lines[0].contains("a.cpp"), "{}", lines[0]);
        assert!(lines[1].starts_with("2. "));
        assert!(lines[1].contains("a.o -o app"), "{}", lines[1]);
    }

    #[test]
    fn json_report_has_every_outdated_step() {
        let dir = tempfile::tempdir().unwrap();
        let value = render_json(&planned(dir.path()));
        assert_eq!(value["total"], 2);
        let outdated = value["outdated"].as_array().unwrap();
        assert_eq!(outdated.len(), 2);
        assert_eq!(outdated[0]["id"], 0);
        assert_eq!(outdated[1]["kind"], "Link");
        assert!(outdated[1]["reason"].as_str().is_some());
    }

    #[test]
    fn run_reads_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let actions = dir.path().join("actions.json");
        std::fs::write(&actions, sample(dir.path()).to_json().unwrap()).unwrap();
        let args = PlanArgs {
            actions,
            history: Some(dir.path().join("history.bin")),
            ignore_import_libraries: true,
            format: ReportFormat::Json,
        };
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            log_level: None,
            config: None,
        };
        assert_eq!(run(&args, &global).unwrap(), 0);
        assert!(!dir.path().join("history.bin").exists());
    }
}
