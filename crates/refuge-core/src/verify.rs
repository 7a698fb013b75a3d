//! Checks on a merged output file

use serde::Serialize;
use serde_json::Value;

/// Keys every output record must carry
pub const REQUIRED_FIELDS: [&str; 7] = [
    "coord",
    "name",
    "info_comp",
    "altitude",
    "places",
    "description",
    "remarque",
];

/// A record failing one of the checks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordProblem {
    pub index: usize,
    pub name: String,
    /// Missing or mistyped keys
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    pub total: usize,
    /// Records with a `surname`
    pub merged: usize,
    pub single_source: usize,
    pub missing_fields: Vec<RecordProblem>,
    pub incomplete_flags: Vec<RecordProblem>,
    /// `description` or `remarque` present but not a list
    pub non_list_text: Vec<RecordProblem>,
    pub description_entries: usize,
    pub remarque_entries: usize,
    pub multi_description: usize,
    pub multi_remarque: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing_fields.is_empty()
            && self.incomplete_flags.is_empty()
            && self.non_list_text.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Total records: {}\n", self.total));
        out.push_str(&format!("Merged records: {}\n", self.merged));
        out.push_str(&format!("Single-source records: {}\n", self.single_source));

        for (label, problems) in [
            ("Records with missing fields", &self.missing_fields),
            ("Records with incomplete info_comp", &self.incomplete_flags),
            ("Records with non-list text fields", &self.non_list_text),
        ] {
            if problems.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{}: {}\n", label, problems.len()));
            for p in problems.iter().take(10) {
                out.push_str(&format!("  #{} {}: {}\n", p.index, p.name, p.fields.join(", ")));
            }
        }

        out.push_str(&format!("\nDescription entries: {}\n", self.description_entries));
        out.push_str(&format!("Remarque entries: {}\n", self.remarque_entries));
        out.push_str(&format!("Records with several descriptions: {}\n", self.multi_description));
        out.push_str(&format!("Records with several remarques: {}\n", self.multi_remarque));
        out.push_str(&format!("\n{}\n", if self.is_ok() { "OK" } else { "FAILED" }));
        out
    }
}

/// Check an output record array
pub fn verify_records(records: &[Value], required_flags: &[String]) -> VerifyReport {
    let mut report = VerifyReport {
        total: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if record.get("surname").is_some_and(|s| !s.is_null()) {
            report.merged += 1;
        } else {
            report.single_source += 1;
        }

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| record.get(**f).is_none())
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            report.missing_fields.push(RecordProblem {
                index,
                name: name.clone(),
                fields: missing,
            });
        }

        let flags = record.get("info_comp").and_then(Value::as_object);
        let missing_flags: Vec<String> = required_flags
            .iter()
            .filter(|flag| !flags.is_some_and(|f| f.contains_key(flag.as_str())))
            .cloned()
            .collect();
        if !missing_flags.is_empty() {
            report.incomplete_flags.push(RecordProblem {
                index,
                name: name.clone(),
                fields: missing_flags,
            });
        }

        let mut non_list = Vec::new();
        for field in ["description", "remarque"] {
            match record.get(field) {
                Some(Value::Array(items)) => {
                    let entries = items.len();
                    if field == "description" {
                        report.description_entries += entries;
                        report.multi_description += usize::from(entries > 1);
                    } else {
                        report.remarque_entries += entries;
                        report.multi_remarque += usize::from(entries > 1);
                    }
                }
                Some(_) => non_list.push(field.to_string()),
                None => {}
            }
        }
        if !non_list.is_empty() {
            report.non_list_text.push(RecordProblem {
                index,
                name,
                fields: non_list,
            });
        }
    }

    report
}
