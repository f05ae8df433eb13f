//! Declarative stream descriptor
//!
//! One descriptor drives the whole cycle: which column identifies a row,
//! which field carries the replication key, where question columns start,
//! and the export path for a survey.

use crate::normalize::NormalizedRecord;
use serde_json::{json, Map, Value};

/// JSON type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Object,
}

impl FieldType {
    fn json_schema(self) -> Value {
        match self {
            FieldType::String => json!({"type": ["null", "string"]}),
            FieldType::Boolean => json!({"type": ["null", "boolean"]}),
            FieldType::Object => json!({"type": ["null", "object"], "additionalProperties": true}),
        }
    }
}

/// A field the stream declares up front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec { name, field_type }
}

const SURVEY_RESPONSE_FIELDS: &[FieldSpec] = &[
    field("StartDate", FieldType::String),
    field("EndDate", FieldType::String),
    field("Status", FieldType::String),
    field("IPAddress", FieldType::String),
    field("Progress", FieldType::String),
    field("Duration_in_seconds", FieldType::String),
    field("Finished", FieldType::Boolean),
    field("RecordedDate", FieldType::String),
    field("ResponseId", FieldType::String),
    field("RecipientLastName", FieldType::String),
    field("RecipientFirstName", FieldType::String),
    field("RecipientEmail", FieldType::String),
    field("ExternalReference", FieldType::String),
    field("LocationLatitude", FieldType::String),
    field("LocationLongitude", FieldType::String),
    field("DistributionChannel", FieldType::String),
    field("UserLanguage", FieldType::String),
    field("sfContactId", FieldType::String),
    field("sfAccountId", FieldType::String),
    field("SurveyID", FieldType::String),
    field("Country", FieldType::String),
    field("Survey_Language", FieldType::String),
    field("SurveyName", FieldType::String),
    field("Questions", FieldType::Object),
    field("survey_export_date", FieldType::String),
];

/// Descriptor for one exported stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSchema {
    pub name: &'static str,
    pub identifier_field: &'static str,
    pub replication_key: &'static str,
    pub question_prefix: &'static str,
    /// Export path with a `{survey_id}` placeholder
    pub path_template: &'static str,
    pub fields: &'static [FieldSpec],
}

impl StreamSchema {
    /// The survey responses stream
    pub fn survey_responses() -> Self {
        Self {
            name: "surveyresponses",
            identifier_field: "ResponseId",
            replication_key: "survey_export_date",
            question_prefix: "Q",
            path_template: "/API/v3/surveys/{survey_id}/export-responses/",
            fields: SURVEY_RESPONSE_FIELDS,
        }
    }

    /// Export path for a survey
    pub fn export_path(&self, survey_id: &str) -> String {
        self.path_template.replace("{survey_id}", survey_id)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Coerce declared boolean fields in place.
    ///
    /// Values that do not read as a boolean are left as strings.
    pub fn conform(&self, record: &mut NormalizedRecord) {
        for declared in self.fields.iter().filter(|f| f.field_type == FieldType::Boolean) {
            if let Some(value) = record.fields.get_mut(declared.name) {
                if let Some(flag) = value.as_str().and_then(parse_bool) {
                    *value = Value::Bool(flag);
                }
            }
        }
    }

    /// JSON Schema of the emitted records
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut schema = f.field_type.json_schema();
                if f.name == self.replication_key {
                    schema["format"] = json!("date-time");
                }
                (f.name.to_string(), schema)
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": true,
        })
    }

    /// Discovery catalog listing this stream
    pub fn catalog(&self) -> Value {
        json!({
            "streams": [{
                "tap_stream_id": self.name,
                "stream": self.name,
                "key_properties": [self.identifier_field],
                "replication_key": self.replication_key,
                "replication_method": "INCREMENTAL",
                "schema": self.json_schema(),
            }]
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "1" => Some(true),
        "False" | "false" | "0" => Some(false),
        _ => None,
    }
}
