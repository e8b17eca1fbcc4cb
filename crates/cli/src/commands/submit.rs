use std::path::Path;
use std::process;

use intake_engine::adapter::fixture::FixtureGateway;
use intake_engine::adapter::http::HttpGateway;
use intake_engine::{
    AttachmentReport, BlockedReason, SubmissionError, SubmissionOutcome, Transition, Wizard,
};
use intake_gateway::{AttachmentStore, GeoCatalog, IdentityDirectory, SubmissionStore, UniquenessProbe};
use serde_json::json;

use crate::answers::Answers;
use crate::{load_config, open_wizard, report_error, resolve_form, OutputFormat, EXIT_FAILED, EXIT_USAGE};

pub(crate) struct SubmitOptions<'a> {
    pub form: &'a str,
    pub answers: &'a Path,
    pub fixtures: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Why a headless run stopped before a receipt.
#[derive(Debug)]
enum Stop {
    /// The answers document does not fit the form.
    Input(String),
    Blocked {
        step: usize,
        title: &'static str,
        reasons: Vec<BlockedReason>,
    },
    Items(String),
    Submission(SubmissionError),
}

pub(crate) fn cmd_submit(opts: SubmitOptions<'_>) {
    let SubmitOptions {
        form,
        output,
        quiet,
        ..
    } = opts;
    let schema = resolve_form(form, output, quiet);
    let config = load_config(opts.config, output, quiet);
    let answers = match Answers::load(opts.answers) {
        Ok(a) => a,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(EXIT_USAGE);
        }
    };
    let mut wizard = open_wizard(schema, &config, output, quiet);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: failed to start runtime: {}", e), output, quiet);
            process::exit(EXIT_FAILED);
        }
    };

    let result = if let Some(path) = opts.fixtures {
        let gateway = match FixtureGateway::from_path(path) {
            Ok(g) => g,
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(EXIT_USAGE);
            }
        };
        rt.block_on(drive(&mut wizard, &answers, &gateway))
    } else if config.gateway.base_url.is_some() {
        let gateway = match HttpGateway::new(&config.gateway) {
            Ok(g) => g,
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(EXIT_USAGE);
            }
        };
        rt.block_on(drive(&mut wizard, &answers, &gateway))
    } else {
        tracing::info!("no fixtures or gateway configured; running against an empty directory");
        rt.block_on(drive(&mut wizard, &answers, &FixtureGateway::empty()))
    };

    match result {
        Ok(outcome) => print_outcome(form, &outcome, output, quiet),
        Err(Stop::Input(msg)) => {
            report_error(&format!("error: {}", msg), output, quiet);
            process::exit(EXIT_USAGE);
        }
        Err(Stop::Blocked {
            step,
            title,
            reasons,
        }) => {
            if !quiet {
                match output {
                    OutputFormat::Text => {
                        println!("step {} ({}) cannot be completed:", step, title);
                        for reason in &reasons {
                            println!("  - {}", reason);
                        }
                    }
                    OutputFormat::Json => {
                        let doc = json!({
                            "status": "blocked",
                            "step": step,
                            "title": title,
                            "reasons": reasons,
                        });
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
                        );
                    }
                }
            }
            process::exit(EXIT_FAILED);
        }
        Err(Stop::Items(msg)) => {
            report_error(&format!("error: {}", msg), output, quiet);
            process::exit(EXIT_FAILED);
        }
        Err(Stop::Submission(e)) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(EXIT_FAILED);
        }
    }
}

/// Fill each step in turn, settling lookups, probes and option loads after
/// every field, then try to advance. Submits once the last step passes.
async fn drive<G>(wizard: &mut Wizard, answers: &Answers, gateway: &G) -> Result<SubmissionOutcome, Stop>
where
    G: IdentityDirectory + UniquenessProbe + GeoCatalog + SubmissionStore + AttachmentStore,
{
    let known: Vec<&str> = wizard.schema().fields.iter().map(|f| f.name).collect();
    let unknown = answers.unknown_fields(&known);
    if !unknown.is_empty() {
        return Err(Stop::Input(format!("unknown fields: {}", unknown.join(", "))));
    }

    if wizard.schema().geo.is_some() {
        if let Ok(ticket) = wizard.load_regions() {
            let regions = ticket.execute(gateway).await;
            wizard.complete_options(&ticket, regions);
        }
    }
    for (slot, file) in answers.read_attachments().map_err(Stop::Input)? {
        wizard
            .attach(&slot, file)
            .map_err(|e| Stop::Input(e.to_string()))?;
    }

    loop {
        let step = wizard.step();
        let Some(def) = wizard.schema().step(step).cloned() else {
            return Err(Stop::Input(format!("form has no step {}", step)));
        };
        for field in &def.fields {
            if let Some(value) = answers.value(field).map_err(Stop::Input)? {
                let effects = wizard
                    .set_value(field, value)
                    .map_err(|e| Stop::Input(e.to_string()))?;
                wizard.settle(effects, gateway).await;
            }
            let effects = wizard
                .blur(field)
                .map_err(|e| Stop::Input(e.to_string()))?;
            wizard.settle(effects, gateway).await;
        }
        for spec in &def.collections {
            answers
                .add_items(wizard.collections_mut(), spec.key)
                .map_err(Stop::Items)?;
        }

        match wizard.next() {
            Transition::Advanced { from, to } => {
                tracing::debug!(from, to, "step passed");
            }
            Transition::Blocked { step, reasons } => {
                return Err(Stop::Blocked {
                    step,
                    title: def.title,
                    reasons,
                });
            }
            Transition::ReadyToSubmit => break,
        }
    }

    wizard
        .finish(gateway, gateway)
        .await
        .map_err(Stop::Submission)
}

fn print_outcome(form: &str, outcome: &SubmissionOutcome, output: OutputFormat, quiet: bool) {
    if let AttachmentReport::Failed(e) = &outcome.attachments {
        report_error(&format!("warning: {}", e), output, quiet);
    }
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => {
            println!("{} submitted: receipt {}", form, outcome.receipt.id);
            match &outcome.attachments {
                AttachmentReport::Skipped => {}
                AttachmentReport::Uploaded(ack) => {
                    println!("attachments: {}", ack.slots.join(", "));
                }
                AttachmentReport::Failed(_) => println!("attachments: not stored"),
            }
        }
        OutputFormat::Json => {
            let attachments = match &outcome.attachments {
                AttachmentReport::Skipped => json!({ "status": "skipped" }),
                AttachmentReport::Uploaded(ack) => json!({ "status": "uploaded", "slots": ack.slots }),
                AttachmentReport::Failed(e) => json!({ "status": "failed", "error": e.to_string() }),
            };
            let doc = json!({
                "status": "submitted",
                "form": form,
                "receipt": outcome.receipt.id,
                "fingerprint": outcome.fingerprint,
                "attachments": attachments,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            );
        }
    }
}
