//! Clinical triage record and the schema check applied to model output.
//!
//! The model's JSON is untrusted: [`ClinicalRecord::conform`] walks it field by field, keeps
//! what has the right shape, downgrades everything else to a sentinel, and reports which
//! paths it had to repair. No key is ever omitted from the result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Placeholder for patient details and symptom fields the model could not determine.
pub const UNKNOWN: &str = "Unknown";
/// Placeholder for narrative fields (transcript, notes, actions) with nothing to report.
pub const NOT_AVAILABLE: &str = "N/A";
/// Repair path reported when the whole reply had the wrong JSON type.
pub const ROOT_PATH: &str = "$root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    High,
    Medium,
    Low,
    Unknown,
}

impl Urgency {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Urgency::High),
            "medium" => Some(Urgency::Medium),
            "low" => Some(Urgency::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "High",
            Urgency::Medium => "Medium",
            Urgency::Low => "Low",
            Urgency::Unknown => UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientData {
    pub name: String,
    /// 0 when the age could not be determined.
    pub age: u32,
    pub gender: String,
    pub phone: String,
    /// YYYY-MM-DD, or "Unknown".
    pub call_date: String,
    /// Call length in seconds, copied from the extraction request.
    #[serde(default, serialize_with = "serialize_seconds")]
    pub duration: Option<f64>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub symptom: String,
    pub severity: String,
    pub duration: String,
    pub location: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNotes {
    pub assessment: String,
    pub concerns: String,
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    pub patient_data: PatientData,
    pub extracted_symptoms: Vec<Symptom>,
    pub transcript: String,
    pub actions: Vec<String>,
    pub clinical_notes: ClinicalNotes,
}

/// A record plus the JSON paths that had to be downgraded to sentinels.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformed {
    pub record: ClinicalRecord,
    pub repaired: Vec<String>,
}

impl Conformed {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty()
    }
}

/// Integral seconds are written as JSON integers so a conformed record compares equal to the
/// model's own `125` rather than `125.0`.
fn serialize_seconds<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(secs) if secs.is_finite() && *secs >= 0.0 && secs.fract() == 0.0 && *secs < u64::MAX as f64 => {
            serializer.serialize_u64(*secs as u64)
        }
        Some(secs) if secs.is_finite() => serializer.serialize_f64(*secs),
        _ => serializer.serialize_none(),
    }
}

/// Collects repaired paths while walking the model's value.
struct Repairs(Vec<String>);

impl Repairs {
    fn mark(&mut self, path: impl Into<String>) {
        self.0.push(path.into());
    }

    /// Non-empty string, or a scalar coerced to one (counted as a repair), else `sentinel`.
    fn string(&mut self, obj: Option<&Map<String, Value>>, key: &str, path: &str, sentinel: &str) -> String {
        match obj.and_then(|o| o.get(key)) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => {
                self.mark(path);
                n.to_string()
            }
            Some(Value::Bool(b)) => {
                self.mark(path);
                b.to_string()
            }
            _ => {
                self.mark(path);
                sentinel.to_string()
            }
        }
    }

    fn age(&mut self, obj: Option<&Map<String, Value>>) -> u32 {
        let parsed = match obj.and_then(|o| o.get("age")) {
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) => u32::try_from(v).ok(),
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64)
                    .map(|f| {
                        self.mark("patientData.age");
                        f as u32
                    }),
            },
            Some(Value::String(s)) => s.trim().parse::<u32>().ok().map(|v| {
                self.mark("patientData.age");
                v
            }),
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            self.mark("patientData.age");
            0
        })
    }

    fn call_date(&mut self, obj: Option<&Map<String, Value>>) -> String {
        match obj.and_then(|o| o.get("callDate")) {
            Some(Value::String(s)) if NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok() => s.trim().to_string(),
            _ => {
                self.mark("patientData.callDate");
                UNKNOWN.to_string()
            }
        }
    }

    fn urgency(&mut self, obj: Option<&Map<String, Value>>) -> Urgency {
        match obj.and_then(|o| o.get("urgency")) {
            Some(Value::String(s)) => match Urgency::parse(s) {
                Some(u) => {
                    if u.as_str() != s.as_str() {
                        self.mark("patientData.urgency");
                    }
                    u
                }
                None => {
                    self.mark("patientData.urgency");
                    Urgency::Unknown
                }
            },
            _ => {
                self.mark("patientData.urgency");
                Urgency::Unknown
            }
        }
    }

    fn duration(&mut self, obj: Option<&Map<String, Value>>, elapsed_time: Option<f64>) -> Option<f64> {
        let given = obj.and_then(|o| o.get("duration"));
        let matches = match (given, elapsed_time) {
            (Some(Value::Null), None) => true,
            (Some(Value::Number(n)), Some(e)) => n.as_f64() == Some(e),
            _ => false,
        };
        if !matches {
            self.mark("patientData.duration");
        }
        elapsed_time.filter(|e| e.is_finite())
    }

    fn patient_data(&mut self, root: &Map<String, Value>, elapsed_time: Option<f64>) -> PatientData {
        let obj = match root.get("patientData") {
            Some(Value::Object(o)) => Some(o),
            _ => {
                self.mark("patientData");
                None
            }
        };
        PatientData {
            name: self.string(obj, "name", "patientData.name", UNKNOWN),
            age: self.age(obj),
            gender: self.string(obj, "gender", "patientData.gender", UNKNOWN),
            phone: self.string(obj, "phone", "patientData.phone", UNKNOWN),
            call_date: self.call_date(obj),
            duration: self.duration(obj, elapsed_time),
            urgency: self.urgency(obj),
        }
    }

    fn symptoms(&mut self, root: &Map<String, Value>) -> Vec<Symptom> {
        let items = match root.get("extractedSymptoms") {
            Some(Value::Array(items)) => items,
            _ => {
                self.mark("extractedSymptoms");
                return Vec::new();
            }
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Value::Object(obj) = item else {
                self.mark(format!("extractedSymptoms[{}]", i));
                continue;
            };
            let obj = Some(obj);
            let field = |name: &str| format!("extractedSymptoms[{}].{}", i, name);
            out.push(Symptom {
                symptom: self.string(obj, "symptom", &field("symptom"), UNKNOWN),
                severity: self.string(obj, "severity", &field("severity"), UNKNOWN),
                duration: self.string(obj, "duration", &field("duration"), UNKNOWN),
                location: self.string(obj, "location", &field("location"), UNKNOWN),
                description: self.string(obj, "description", &field("description"), UNKNOWN),
            });
        }
        out
    }

    fn actions(&mut self, root: &Map<String, Value>) -> Vec<String> {
        let mut actions = Vec::new();
        match root.get("actions") {
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) if !s.trim().is_empty() => actions.push(s.clone()),
                        _ => self.mark(format!("actions[{}]", i)),
                    }
                }
                if actions.is_empty() {
                    self.mark("actions");
                }
            }
            _ => self.mark("actions"),
        }
        if actions.is_empty() {
            actions.push(NOT_AVAILABLE.to_string());
        }
        actions
    }

    fn notes(&mut self, root: &Map<String, Value>) -> ClinicalNotes {
        let obj = match root.get("clinicalNotes") {
            Some(Value::Object(o)) => Some(o),
            _ => {
                self.mark("clinicalNotes");
                None
            }
        };
        ClinicalNotes {
            assessment: self.string(obj, "assessment", "clinicalNotes.assessment", NOT_AVAILABLE),
            concerns: self.string(obj, "concerns", "clinicalNotes.concerns", NOT_AVAILABLE),
            plan: self.string(obj, "plan", "clinicalNotes.plan", NOT_AVAILABLE),
        }
    }
}

impl ClinicalRecord {
    /// Check the model's value against the record schema. Every defect is repaired with a
    /// sentinel; a top level that is not an object counts as `{}` plus a `$root` repair.
    /// `patientData.duration` is always set to `elapsed_time`.
    pub fn conform(value: &Value, elapsed_time: Option<f64>) -> Conformed {
        let mut repairs = Repairs(Vec::new());
        let empty = Map::new();
        let root = match value {
            Value::Object(root) => root,
            _ => {
                repairs.mark(ROOT_PATH);
                &empty
            }
        };

        let patient_data = repairs.patient_data(root, elapsed_time);
        let extracted_symptoms = repairs.symptoms(root);
        let transcript = repairs.string(Some(root), "transcript", "transcript", NOT_AVAILABLE);
        let actions = repairs.actions(root);
        let clinical_notes = repairs.notes(root);

        Conformed {
            record: ClinicalRecord {
                patient_data,
                extracted_symptoms,
                transcript,
                actions,
                clinical_notes,
            },
            repaired: repairs.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_record() -> Value {
        json!({
            "patientData": {
                "name": "Jane", "age": 40, "gender": "Female", "phone": "Unknown",
                "callDate": "2024-01-01", "duration": 125, "urgency": "Medium"
            },
            "extractedSymptoms": [{
                "symptom": "chest pain", "severity": "Unknown", "duration": "2 hours",
                "location": "chest", "description": "chest hurts"
            }],
            "transcript": "...",
            "actions": ["N/A"],
            "clinicalNotes": {"assessment": "N/A", "concerns": "N/A", "plan": "N/A"}
        })
    }

    #[test]
    fn test_complete_record_round_trips_unchanged() {
        let value = complete_record();
        let conformed = ClinicalRecord::conform(&value, Some(125.0));
        assert!(conformed.is_clean(), "unexpected repairs: {:?}", conformed.repaired);
        assert_eq!(conformed.record.patient_data.name, "Jane");
        assert_eq!(serde_json::to_value(&conformed.record).unwrap(), value);
    }

    #[test]
    fn test_empty_object_gets_every_key() {
        let conformed = ClinicalRecord::conform(&json!({}), None);
        let out = serde_json::to_value(&conformed.record).unwrap();
        assert_eq!(out["patientData"]["name"], "Unknown");
        assert_eq!(out["patientData"]["age"], 0);
        assert_eq!(out["patientData"]["duration"], Value::Null);
        assert_eq!(out["patientData"]["urgency"], "Unknown");
        assert_eq!(out["extractedSymptoms"], json!([]));
        assert_eq!(out["transcript"], "N/A");
        assert_eq!(out["actions"], json!(["N/A"]));
        assert_eq!(out["clinicalNotes"]["plan"], "N/A");
        assert!(conformed.repaired.contains(&"patientData".to_string()));
        assert!(conformed.repaired.contains(&"clinicalNotes".to_string()));
    }

    #[test]
    fn test_duration_is_pinned_to_request() {
        let mut value = complete_record();
        value["patientData"]["duration"] = json!("about two minutes");
        let conformed = ClinicalRecord::conform(&value, Some(61.5));
        assert_eq!(conformed.record.patient_data.duration, Some(61.5));
        assert_eq!(conformed.repaired, vec!["patientData.duration".to_string()]);
    }

    #[test]
    fn test_mistyped_fields_are_downgraded() {
        let value = json!({
            "patientData": {
                "name": "", "age": "52", "gender": null, "phone": 5551234,
                "callDate": "last Tuesday", "urgency": "high"
            },
            "extractedSymptoms": [
                "headache",
                {"symptom": "nausea", "severity": 7}
            ],
            "transcript": ["not", "a", "string"],
            "actions": [1, ""],
            "clinicalNotes": "none"
        });
        let conformed = ClinicalRecord::conform(&value, Some(10.0));
        let r = &conformed.record;
        assert_eq!(r.patient_data.name, UNKNOWN);
        assert_eq!(r.patient_data.age, 52);
        assert_eq!(r.patient_data.gender, UNKNOWN);
        assert_eq!(r.patient_data.phone, "5551234");
        assert_eq!(r.patient_data.call_date, UNKNOWN);
        assert_eq!(r.patient_data.urgency, Urgency::High);
        assert_eq!(r.extracted_symptoms.len(), 1);
        assert_eq!(r.extracted_symptoms[0].symptom, "nausea");
        assert_eq!(r.extracted_symptoms[0].severity, "7");
        assert_eq!(r.extracted_symptoms[0].location, UNKNOWN);
        assert_eq!(r.transcript, NOT_AVAILABLE);
        assert_eq!(r.actions, vec![NOT_AVAILABLE.to_string()]);
        assert_eq!(r.clinical_notes.assessment, NOT_AVAILABLE);
        for path in [
            "patientData.name",
            "patientData.age",
            "patientData.urgency",
            "extractedSymptoms[0]",
            "extractedSymptoms[1].severity",
            "actions[0]",
            "actions",
        ] {
            assert!(conformed.repaired.iter().any(|p| p == path), "missing repair {}", path);
        }
    }

    #[test]
    fn test_non_object_becomes_all_sentinels() {
        for value in [json!([1, 2]), Value::Null, json!(42), json!("ok")] {
            let conformed = ClinicalRecord::conform(&value, Some(5.0));
            let r = &conformed.record;
            assert_eq!(conformed.repaired[0], ROOT_PATH, "for {}", value);
            assert_eq!(r.patient_data.name, UNKNOWN);
            assert_eq!(r.patient_data.age, 0);
            assert_eq!(r.patient_data.urgency, Urgency::Unknown);
            assert_eq!(r.patient_data.duration, Some(5.0));
            assert!(r.extracted_symptoms.is_empty());
            assert_eq!(r.transcript, NOT_AVAILABLE);
            assert_eq!(r.actions, vec![NOT_AVAILABLE.to_string()]);
            assert_eq!(r.clinical_notes.plan, NOT_AVAILABLE);
        }
    }

    #[test]
    fn test_fractional_age_and_negative_age() {
        let mut value = complete_record();
        value["patientData"]["age"] = json!(40.5);
        assert_eq!(ClinicalRecord::conform(&value, Some(125.0)).record.patient_data.age, 0);
        value["patientData"]["age"] = json!(-3);
        assert_eq!(ClinicalRecord::conform(&value, Some(125.0)).record.patient_data.age, 0);
    }

    #[test]
    fn test_record_deserializes_from_wire() {
        let record: ClinicalRecord = serde_json::from_value(complete_record()).unwrap();
        assert_eq!(record.patient_data.urgency, Urgency::Medium);
        assert_eq!(record.patient_data.duration, Some(125.0));
    }
}
