use std::path::Path;
use std::process;

use intake_engine::BlockedReason;
use serde_json::json;

use crate::answers::Answers;
use crate::{load_config, open_wizard, report_error, resolve_form, OutputFormat, EXIT_FAILED, EXIT_USAGE};

/// Validate every step offline. Uniqueness and the directory are not
/// consulted, so only field rules, conditional requirements and collection
/// minimums are reported.
pub(crate) fn cmd_validate(
    form: &str,
    answers_path: &Path,
    config_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let schema = resolve_form(form, output, quiet);
    let config = load_config(config_path, output, quiet);
    let answers = match Answers::load(answers_path) {
        Ok(a) => a,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(EXIT_USAGE);
        }
    };
    let known: Vec<&str> = schema.fields.iter().map(|f| f.name).collect();
    let unknown = answers.unknown_fields(&known);
    if !unknown.is_empty() {
        let msg = format!("error: unknown fields for form '{}': {}", form, unknown.join(", "));
        report_error(&msg, output, quiet);
        process::exit(EXIT_USAGE);
    }

    let mut wizard = open_wizard(schema, &config, output, quiet);
    let field_order: Vec<&'static str> = wizard
        .schema()
        .steps
        .iter()
        .flat_map(|s| s.fields.iter().copied())
        .collect();
    for field in field_order {
        let value = match answers.value(field) {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(msg) => {
                report_error(&format!("error: {}", msg), output, quiet);
                process::exit(EXIT_USAGE);
            }
        };
        // Offline: lookups, probes and option loads are not run.
        match wizard.set_value(field, value) {
            Ok(effects) => wizard.abandon(effects),
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(EXIT_USAGE);
            }
        }
    }

    let mut item_errors = Vec::new();
    let keys: Vec<_> = wizard
        .schema()
        .steps
        .iter()
        .flat_map(|s| s.collections.iter().map(|c| c.key))
        .collect();
    for key in keys {
        if let Err(msg) = answers.add_items(wizard.collections_mut(), key) {
            item_errors.push(msg);
        }
    }

    let review = wizard.review();
    let valid = review.is_empty() && item_errors.is_empty();
    tracing::debug!(form, valid, "answers validated");

    if !quiet {
        match output {
            OutputFormat::Text => print_text(form, &wizard, &review, &item_errors),
            OutputFormat::Json => {
                let steps: Vec<serde_json::Value> = review
                    .iter()
                    .map(|(step, reasons)| json!({ "step": step, "reasons": reasons }))
                    .collect();
                let doc = json!({
                    "form": form,
                    "valid": valid,
                    "steps": steps,
                    "item_errors": item_errors,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
                );
            }
        }
    }
    if !valid {
        process::exit(EXIT_FAILED);
    }
}

fn print_text(
    form: &str,
    wizard: &intake_engine::Wizard,
    review: &[(usize, Vec<BlockedReason>)],
    item_errors: &[String],
) {
    if review.is_empty() && item_errors.is_empty() {
        println!("{}: all steps valid", form);
        return;
    }
    for msg in item_errors {
        println!("{}", msg);
    }
    for (step, reasons) in review {
        let title = wizard.schema().step(*step).map(|s| s.title).unwrap_or("");
        println!("step {} ({}):", step, title);
        for reason in reasons {
            println!("  - {}", reason);
        }
    }
}
