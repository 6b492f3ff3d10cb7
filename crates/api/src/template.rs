//! `{{path.to.field}}` substitution for HR document templates.
//!
//! Markers rooted in one of [`ROOTS`] are always replaced: with the formatted
//! value when the path resolves, with [`BLANK`] otherwise. Markers with any
//! other root are user text and stay as written.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use entity::{department, employee, position};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const ROOTS: [&str; 6] = [
    "employee",
    "position",
    "department",
    "company",
    "system",
    "custom",
];

/// Printed in place of a recognized field that has no value.
pub const BLANK: &str = "________";

const AMOUNT_HINTS: [&str; 6] = ["salary", "amount", "sum", "wage", "bonus", "price"];

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("marker pattern compiles")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Recognized paths that had no value, in first-seen order.
    pub unresolved: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TemplateContext {
    sections: Map<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, root: &str, value: Value) -> Self {
        self.sections.insert(root.to_string(), value);
        self
    }

    pub fn section(&self, root: &str) -> Option<&Value> {
        self.sections.get(root)
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.sections.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

pub fn is_recognized(path: &str) -> bool {
    let root = path.split('.').next().unwrap_or_default();
    ROOTS.contains(&root)
}

/// Distinct marker paths in the order they first appear.
pub fn markers(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in MARKER_RE.captures_iter(text) {
        let path = caps[1].to_string();
        if !seen.contains(&path) {
            seen.push(path);
        }
    }
    seen
}

pub fn render(text: &str, ctx: &TemplateContext) -> Rendered {
    let mut out = String::with_capacity(text.len());
    let mut unresolved = Vec::new();
    let mut last = 0;
    for caps in MARKER_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let path = &caps[1];
        out.push_str(&text[last..whole.start()]);
        if is_recognized(path) {
            match ctx.lookup(path).and_then(|value| format_value(leaf_key(path), value)) {
                Some(formatted) => out.push_str(&formatted),
                None => {
                    out.push_str(BLANK);
                    if !unresolved.iter().any(|p: &String| p == path) {
                        unresolved.push(path.to_string());
                    }
                }
            }
        } else {
            out.push_str(whole.as_str());
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Rendered {
        text: out,
        unresolved,
    }
}

fn leaf_key(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn is_amount_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    AMOUNT_HINTS.iter().any(|hint| lowered.contains(hint))
}

fn format_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("да".to_string()),
        Value::Bool(false) => Some("нет".to_string()),
        Value::Number(n) => {
            if is_amount_key(key) {
                n.as_f64().map(format_amount)
            } else {
                Some(n.to_string())
            }
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| format_value(key, item))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Russian-locale money formatting: `1 234 567,5` with no-break spaces
/// between digit groups and at most two fraction digits.
pub fn format_amount(value: f64) -> String {
    let cents = (value * 100.0).round() as i128;
    let negative = cents < 0;
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 * 2);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push('\u{a0}');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if fraction != 0 {
        out.push(',');
        if fraction % 10 == 0 {
            out.push_str(&(fraction / 10).to_string());
        } else {
            out.push_str(&format!("{fraction:02}"));
        }
    }
    out
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Company block shared by every generated document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub legal_name: Option<String>,
    pub inn: Option<String>,
    pub address: Option<String>,
    pub director: Option<String>,
}

impl CompanyProfile {
    pub fn to_section(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn employee_section(model: &employee::Model) -> Value {
    json!({
        "id": model.id.to_string(),
        "fullName": model.full_name(),
        "firstName": model.first_name,
        "lastName": model.last_name,
        "middleName": model.middle_name,
        "personnelNumber": model.personnel_number,
        "email": model.email,
        "phone": model.phone,
        "address": model.address,
        "birthDate": model.birth_date.map(format_date),
        "hireDate": model.hire_date.map(format_date),
        "terminationDate": model.termination_date.map(format_date),
        "salary": model.salary,
    })
}

pub fn position_section(model: &position::Model) -> Value {
    json!({
        "id": model.id.to_string(),
        "title": model.title,
        "salary": model.salary,
    })
}

pub fn department_section(model: &department::Model) -> Value {
    json!({
        "id": model.id.to_string(),
        "name": model.name,
    })
}

pub fn system_section(now: DateTime<Utc>, document_number: Option<&str>) -> Value {
    json!({
        "currentDate": format_date(now.date_naive()),
        "currentYear": now.year(),
        "documentNumber": document_number,
    })
}

/// Everything a document template can reference about one employee.
pub struct ContextSources<'a> {
    pub employee: &'a employee::Model,
    pub position: Option<&'a position::Model>,
    pub department: Option<&'a department::Model>,
    pub company: &'a CompanyProfile,
    pub now: DateTime<Utc>,
    pub document_number: Option<&'a str>,
    pub custom: Option<Value>,
}

pub fn build_context(sources: ContextSources<'_>) -> TemplateContext {
    let mut ctx = TemplateContext::new()
        .with_section("employee", employee_section(sources.employee))
        .with_section("company", sources.company.to_section())
        .with_section(
            "system",
            system_section(sources.now, sources.document_number),
        );
    if let Some(position) = sources.position {
        ctx = ctx.with_section("position", position_section(position));
    }
    if let Some(department) = sources.department {
        ctx = ctx.with_section("department", department_section(department));
    }
    if let Some(custom) = sources.custom {
        ctx = ctx.with_section("custom", custom);
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext::new()
            .with_section(
                "employee",
                json!({ "fullName": "Иванов Иван", "salary": 1234567.5, "email": null }),
            )
            .with_section("company", json!({ "name": "ООО Ромашка" }))
            .with_section("custom", json!({ "items": ["a", "b"], "remote": true }))
    }

    #[test]
    fn replaces_known_fields() {
        let out = render(
            "{{employee.fullName}} работает в {{ company.name }}.",
            &context(),
        );
        assert_eq!(out.text, "Иванов Иван работает в ООО Ромашка.");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn salary_fields_are_locale_formatted() {
        let out = render("Оклад: {{employee.salary}}", &context());
        assert_eq!(out.text, "Оклад: 1\u{a0}234\u{a0}567,5");
    }

    #[test]
    fn unresolved_recognized_markers_become_blanks() {
        let out = render(
            "E-mail: {{employee.email}}, ИНН: {{company.inn}}, {{position.title}}",
            &context(),
        );
        assert_eq!(out.text, format!("E-mail: {BLANK}, ИНН: {BLANK}, {BLANK}"));
        assert_eq!(
            out.unresolved,
            vec!["employee.email", "company.inn", "position.title"]
        );
    }

    #[test]
    fn unknown_roots_are_left_untouched() {
        let text = "Hello {{client.name}} and {{ weird }}";
        let out = render(text, &context());
        assert_eq!(out.text, text);
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn rendering_is_idempotent_on_resolved_text() {
        let first = render(
            "{{employee.fullName}} {{company.inn}} {{other.thing}} {{custom.items}}",
            &context(),
        );
        let second = render(&first.text, &context());
        assert_eq!(first.text, second.text);
        assert!(markers(&second.text).iter().all(|m| !is_recognized(m)));
    }

    #[test]
    fn arrays_and_booleans_are_humanized() {
        let out = render("{{custom.items}} / {{custom.remote}}", &context());
        assert_eq!(out.text, "a, b / да");
    }

    #[test]
    fn markers_are_listed_once_in_order() {
        let found = markers("{{b.x}} {{a}} {{ b.x }} {{c.d.e}}");
        assert_eq!(found, vec!["b.x", "a", "c.d.e"]);
    }

    #[test]
    fn amounts_group_thousands() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1\u{a0}000");
        assert_eq!(format_amount(-15000.05), "-15\u{a0}000,05");
        assert_eq!(format_amount(12.346), "12,35");
    }
}
