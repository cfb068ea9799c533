//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! A record is submittable only when no rule reports a violation.

use serde::{Deserialize, Serialize};

use crate::record::RegistrationRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule: String,
    pub message: String,
    pub remediation: Vec<String>,
}

impl FieldViolation {
    pub fn new(field: &str, message: &str, remediation: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: String::new(),
            message: message.to_string(),
            remediation: vec![remediation.to_string()],
        }
    }

    fn from_rule(rule: &dyn ValidationRule, field: &str, message: &str, remediation: &str) -> Self {
        Self {
            rule: rule.name().to_string(),
            ..Self::new(field, message, remediation)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<FieldViolation>,
}

impl ValidationResult {
    /// Violations for a single field, in rule order.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }

    pub fn into_result(self) -> Result<(), Vec<FieldViolation>> {
        if self.valid {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, record: &RegistrationRecord) -> Vec<FieldViolation>;
}

// --- Concrete Rules ---

pub const REQUIRED_FIELDS: [&str; 7] = ["name", "phone", "email", "gender", "locality", "city", "state"];

pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn name(&self) -> &'static str { "required" }

    fn validate(&self, record: &RegistrationRecord) -> Vec<FieldViolation> {
        record
            .fields()
            .into_iter()
            .filter(|(field, value)| REQUIRED_FIELDS.contains(field) && value.trim().is_empty())
            .map(|(field, _)| {
                FieldViolation::from_rule(
                    self,
                    field,
                    &format!("{} is required", capitalize(field)),
                    &format!("Enter your {}", field),
                )
            })
            .collect()
    }
}

pub struct PhoneFormatRule;

impl ValidationRule for PhoneFormatRule {
    fn name(&self) -> &'static str { "phone_format" }

    fn validate(&self, record: &RegistrationRecord) -> Vec<FieldViolation> {
        // Emptiness is the required rule's concern.
        if record.phone.is_empty() || is_valid_phone(&record.phone) {
            return vec![];
        }
        vec![FieldViolation::from_rule(
            self,
            "phone",
            "Invalid phone number",
            "Use only digits, spaces, and + - ( )",
        )]
    }
}

pub struct EmailFormatRule;

impl ValidationRule for EmailFormatRule {
    fn name(&self) -> &'static str { "email_format" }

    fn validate(&self, record: &RegistrationRecord) -> Vec<FieldViolation> {
        if record.email.is_empty() || is_valid_email(&record.email) {
            return vec![];
        }
        vec![FieldViolation::from_rule(
            self,
            "email",
            "Invalid email address",
            "Use the form name@example.com",
        )]
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    !phone.is_empty()
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '))
}

/// `local@domain.tld`: local part `[A-Z0-9._%+-]+`, domain `[A-Z0-9.-]+`,
/// final label of at least two letters. Case-insensitive.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'));
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'));
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());
    local_ok && host_ok && tld_ok
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(PhoneFormatRule),
                Box::new(EmailFormatRule),
            ],
        }
    }

    pub fn validate(&self, record: &RegistrationRecord) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(record))
            .collect();

        ValidationResult {
            valid: violations.is_empty(),
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
