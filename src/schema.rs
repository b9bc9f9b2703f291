use schemars::schema_for;
use serde_json::json;

use crate::model::intent::{Intent, IntentResult};
use crate::model::payload::Payload;

/// JSON Schemas for the wire surface: the intent request, the result
/// envelope, and the event payload sum.
pub fn get_schema_json() -> String {
    let bundle = json!({
        "intent": schema_for!(Intent),
        "intent_result": schema_for!(IntentResult),
        "event_payload": schema_for!(Payload),
    });
    serde_json::to_string_pretty(&bundle).expect("fail")
}

pub fn run() -> anyhow::Result<()> {
    println!("{}", get_schema_json());
    Ok(())
}
