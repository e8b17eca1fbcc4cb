use intake_engine::schema::{FieldDefinition, FieldKind, Requirement};
use intake_engine::FormSchema;
use serde_json::{json, Value};

use crate::{resolve_form, OutputFormat};

pub(crate) fn cmd_schema(form: &str, output: OutputFormat, quiet: bool) {
    let schema = resolve_form(form, output, quiet);
    match output {
        OutputFormat::Json => {
            let doc = schema_json(&schema);
            println!(
                "{}",
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            );
        }
        OutputFormat::Text => print_text(&schema),
    }
}

fn print_text(schema: &FormSchema) {
    println!("{} ({})", schema.title, schema.name);
    for step in &schema.steps {
        println!();
        println!("step {}: {}", step.number, step.title);
        for name in &step.fields {
            if let Some(def) = schema.field(name) {
                let mut notes = vec![requirement_text(&def.requirement)];
                if let Some(kind) = def.uniqueness {
                    notes.push(format!("unique {}", kind));
                }
                if schema.lookup.as_ref().is_some_and(|l| l.key_field == def.name) {
                    notes.push("directory lookup key".to_string());
                }
                println!(
                    "  {:<26} {:<14} {}",
                    def.name,
                    kind_name(&def.kind),
                    notes.join(", ")
                );
            }
        }
        for spec in &step.collections {
            let req = if spec.required { "at least one item" } else { "optional" };
            println!("  [{}] {}", spec.key, req);
        }
    }
    if !schema.attachment_slots.is_empty() {
        println!();
        println!("attachments: {}", schema.attachment_slots.join(", "));
    }
}

fn schema_json(schema: &FormSchema) -> Value {
    let steps: Vec<Value> = schema
        .steps
        .iter()
        .map(|step| {
            let fields: Vec<Value> = step
                .fields
                .iter()
                .filter_map(|name| schema.field(name))
                .map(field_json)
                .collect();
            let collections: Vec<Value> = step
                .collections
                .iter()
                .map(|c| json!({ "key": c.key, "required": c.required }))
                .collect();
            json!({
                "number": step.number,
                "title": step.title,
                "fields": fields,
                "collections": collections,
            })
        })
        .collect();
    json!({
        "name": schema.name,
        "title": schema.title,
        "steps": steps,
        "lookup_key": schema.lookup.as_ref().map(|l| l.key_field),
        "attachment_slots": schema.attachment_slots,
    })
}

fn field_json(def: &FieldDefinition) -> Value {
    let mut obj = json!({
        "name": def.name,
        "label": def.label,
        "kind": kind_name(&def.kind),
        "required": requirement_text(&def.requirement),
    });
    if let FieldKind::Choice(options) = &def.kind {
        obj["options"] = json!(options);
    }
    if let Some(kind) = def.uniqueness {
        obj["unique"] = json!(kind);
    }
    obj
}

fn requirement_text(req: &Requirement) -> String {
    match req {
        Requirement::Always => "required".to_string(),
        Requirement::Optional => "optional".to_string(),
        Requirement::When(p) => format!("required when {}", p),
    }
}

fn kind_name(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Text => "text".to_string(),
        FieldKind::NationalId => "national_id".to_string(),
        FieldKind::Email => "email".to_string(),
        FieldKind::Phone => "phone".to_string(),
        FieldKind::BirthDate => "birth_date".to_string(),
        FieldKind::Integer { min, max } => format!("integer {}..={}", min, max),
        FieldKind::PositiveDecimal => "decimal > 0".to_string(),
        FieldKind::Flag { must_accept: true } => "accept".to_string(),
        FieldKind::Flag { must_accept: false } => "yes/no".to_string(),
        FieldKind::Choice(_) => "choice".to_string(),
        FieldKind::GeoArea => "geo_area".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_fields_name_their_condition() {
        let schema = intake_engine::forms::membership();
        let doc = schema_json(&schema);
        let property = &doc["steps"][1]["fields"];
        let owner_name = property
            .as_array()
            .and_then(|f| f.iter().find(|f| f["name"] == "owner_name"))
            .cloned()
            .unwrap_or_default();
        assert_eq!(owner_name["required"], "required when is_owner is false");
        assert_eq!(doc["lookup_key"], "national_id");
        assert_eq!(doc["steps"][2]["collections"][0]["key"], "animals");
    }

    #[test]
    fn kinds_have_short_names() {
        assert_eq!(kind_name(&FieldKind::Integer { min: 1, max: 40 }), "integer 1..=40");
        assert_eq!(kind_name(&FieldKind::Flag { must_accept: true }), "accept");
    }
}
