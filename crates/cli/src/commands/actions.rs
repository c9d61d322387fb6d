//! `repobot actions`: print the action catalog.

use serde_json::{Value, json};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&catalog_json())?);
    Ok(())
}

/// Every action schema, tagged with its family.
pub fn catalog_json() -> Value {
    let entries: Vec<Value> = repobot_actions::catalog()
        .iter()
        .map(|(family, schema)| {
            json!({
                "family": family.as_str(),
                "name": schema.name,
                "description": schema.description,
                "parameters": schema.params,
            })
        })
        .collect();
    Value::Array(entries)
}
