//! Normalized survey response record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the nested question columns
pub const QUESTIONS_FIELD: &str = "Questions";

/// Field holding the export timestamp (the replication key)
pub const EXPORT_DATE_FIELD: &str = "survey_export_date";

/// Field holding the configured survey display name
pub const SURVEY_NAME_FIELD: &str = "SurveyName";

/// One survey response.
///
/// Serializes as a flat JSON object: the fixed columns, then `Questions`,
/// then the two fields the stream driver attaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(rename = "Questions", default)]
    pub questions: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_export_date: Option<String>,

    #[serde(rename = "SurveyName", default, skip_serializing_if = "Option::is_none")]
    pub survey_name: Option<String>,
}

impl NormalizedRecord {
    /// String value of a top-level field, if present and non-null
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Stamp the record with the cycle's export timestamp and survey name.
    ///
    /// Same-named columns from the export are replaced.
    pub fn attach_export_metadata(&mut self, export_date: &str, survey_name: &str) {
        self.fields.remove(EXPORT_DATE_FIELD);
        self.fields.remove(SURVEY_NAME_FIELD);
        self.survey_export_date = Some(export_date.to_string());
        self.survey_name = Some(survey_name.to_string());
    }
}
