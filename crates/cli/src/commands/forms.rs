use crate::OutputFormat;

pub(crate) fn cmd_forms(output: OutputFormat) {
    let catalog = intake_engine::forms::catalog();
    match output {
        OutputFormat::Text => {
            for schema in &catalog {
                println!(
                    "{:<12} {} ({} steps)",
                    schema.name,
                    schema.title,
                    schema.step_count()
                );
            }
        }
        OutputFormat::Json => {
            let forms: Vec<serde_json::Value> = catalog
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "title": s.title,
                        "steps": s.step_count(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(forms));
        }
    }
}
