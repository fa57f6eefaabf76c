//! Static alias table and column-name normalization
//!
//! The table is built once and shared read-only between sessions. Lookups
//! are keyed on the *compact* form of a name: camelCase split, case-folded,
//! separators stripped and common abbreviations expanded, so that
//! `SocialSecurityNum`, `social_security_no` and `ssn` all land on the same
//! dictionary entries.

use crate::classification::types::{FieldDescriptor, Subtype};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A column or table name broken into normalized tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    /// Lowercase tokens after abbreviation expansion
    pub tokens: Vec<String>,
    /// Tokens joined without separators
    pub compact: String,
}

impl NormalizedName {
    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn has_any(&self, tokens: &[&str]) -> bool {
        tokens.iter().any(|t| self.has_token(t))
    }
}

/// Normalize a column or table name.
pub fn normalize(name: &str) -> NormalizedName {
    let mut raw_tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut raw_tokens);
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let camel = p.is_lowercase() && ch.is_uppercase();
            let digit_edge = p.is_ascii_digit() != ch.is_ascii_digit();
            if camel || digit_edge {
                flush(&mut current, &mut raw_tokens);
            }
        }
        current.extend(ch.to_lowercase());
        prev = Some(ch);
    }
    flush(&mut current, &mut raw_tokens);

    let tokens: Vec<String> = raw_tokens
        .iter()
        .flat_map(|t| expand_abbreviation(t))
        .collect();
    let compact = tokens.concat();

    NormalizedName { tokens, compact }
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

fn expand_abbreviation(token: &str) -> Vec<String> {
    let expanded: &[&str] = match token {
        "num" | "no" | "nbr" | "nr" | "nmbr" => &["number"],
        "addr" | "adr" => &["address"],
        "tel" | "telephone" | "phn" => &["phone"],
        "mob" => &["mobile"],
        "dt" => &["date"],
        "fname" => &["first", "name"],
        "lname" => &["last", "name"],
        "mname" => &["middle", "name"],
        "pwd" | "passwd" => &["password"],
        "acct" | "acc" => &["account"],
        "dx" => &["diagnosis"],
        "rx" => &["prescription"],
        "meds" => &["medication"],
        "cust" => &["customer"],
        "emp" => &["employee"],
        "bday" => &["birthday"],
        _ => return vec![token.to_string()],
    };
    expanded.iter().map(|s| s.to_string()).collect()
}

/// Dictionary a matching alias belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasFamily {
    /// English naming conventions
    Common,
    /// German, French and Spanish column names
    Localized,
    /// Added from configuration
    Custom,
}

/// One exact-alias dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasEntry {
    pub subtype: Subtype,
    pub confidence: f64,
    pub family: AliasFamily,
}

/// Keyword rule for compound column names.
#[derive(Debug, Clone)]
pub struct TokenRule {
    /// Any of these tokens triggers the rule
    pub keywords: &'static [&'static str],
    /// When non-empty, one of these tokens must also be present
    pub qualifiers: &'static [&'static str],
    pub subtype: Subtype,
    pub confidence: f64,
}

/// User-supplied alias loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAlias {
    pub alias: String,
    pub subtype: Subtype,
    #[serde(default = "default_custom_confidence")]
    pub confidence: f64,
}

fn default_custom_confidence() -> f64 {
    0.90
}

/// Read-only alias and pattern table.
pub struct AliasTable {
    exact: HashMap<String, AliasEntry>,
    token_rules: Vec<TokenRule>,
}

impl AliasTable {
    /// Table with the built-in dictionaries and token rules.
    pub fn builtin() -> Self {
        let mut exact = HashMap::new();
        for (alias, subtype, confidence) in COMMON_ALIASES {
            exact.insert(
                normalize(alias).compact,
                AliasEntry {
                    subtype: *subtype,
                    confidence: *confidence,
                    family: AliasFamily::Common,
                },
            );
        }
        for (alias, subtype, confidence) in LOCALIZED_ALIASES {
            exact.insert(
                normalize(alias).compact,
                AliasEntry {
                    subtype: *subtype,
                    confidence: *confidence,
                    family: AliasFamily::Localized,
                },
            );
        }
        Self {
            exact,
            token_rules: builtin_token_rules(),
        }
    }

    /// Built-in table extended with configured aliases.
    pub fn with_custom(custom: &[CustomAlias]) -> Result<Self> {
        let mut table = Self::builtin();
        for alias in custom {
            let key = normalize(&alias.alias).compact;
            if key.is_empty() {
                return Err(Error::Config(format!(
                    "Custom alias '{}' normalizes to an empty name",
                    alias.alias
                )));
            }
            if !(0.0..=1.0).contains(&alias.confidence) {
                return Err(Error::Config(format!(
                    "Custom alias '{}' has confidence {} outside [0, 1]",
                    alias.alias, alias.confidence
                )));
            }
            table.exact.insert(
                key,
                AliasEntry {
                    subtype: alias.subtype,
                    confidence: alias.confidence,
                    family: AliasFamily::Custom,
                },
            );
        }
        Ok(table)
    }

    pub fn lookup_exact(&self, compact: &str) -> Option<&AliasEntry> {
        self.exact.get(compact)
    }

    /// Closest alias within edit distance 1, for names of five or more characters.
    ///
    /// Ties are broken by alias key so the result does not depend on hash order.
    pub fn lookup_fuzzy(&self, compact: &str) -> Option<(&str, &AliasEntry)> {
        if compact.chars().count() < 5 || self.exact.contains_key(compact) {
            return None;
        }
        self.exact
            .iter()
            .filter(|(key, _)| key.len().abs_diff(compact.len()) <= 1)
            .filter(|(key, _)| edit_distance(key, compact) == 1)
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn token_rules(&self) -> &[TokenRule] {
        &self.token_rules
    }

    pub fn alias_count(&self) -> usize {
        self.exact.len()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == *cb { 0 } else { 1 };
            row[j + 1] = (diag + cost).min(row[j] + 1).min(above + 1);
            diag = above;
        }
    }
    row[b_chars.len()]
}

// ---- Declared types ----

/// Broad family of a declared SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Text,
    Numeric,
    Temporal,
    Boolean,
    Binary,
    Unknown,
}

/// Parsed declared type, e.g. `CHAR(11)` → (`char`, Some(11)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub base: String,
    pub length: Option<u32>,
    pub family: TypeFamily,
}

impl DeclaredType {
    /// Parse a declared type. Column constraints following the type, as in
    /// `CHAR(11) NOT NULL`, are ignored.
    pub fn parse(raw: &str) -> Self {
        let raw = strip_constraints(raw);
        let (base, length) = match declared_type_regex().and_then(|re| re.captures(&raw)) {
            Some(caps) => (
                caps.get(1)
                    .map(|m| m.as_str().to_ascii_lowercase())
                    .unwrap_or_default(),
                caps.get(2).and_then(|m| m.as_str().parse().ok()),
            ),
            None => (raw.trim().to_ascii_lowercase(), None),
        };
        let family = type_family(&base);
        Self {
            base,
            length,
            family,
        }
    }

    pub fn is_fixed_char(&self) -> bool {
        matches!(self.base.as_str(), "char" | "character" | "nchar" | "bpchar")
    }
}

/// Keywords that start the constraint part of a DDL column definition.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "not", "null", "default", "primary", "unique", "references", "check", "collate",
    "constraint", "generated", "identity", "auto_increment", "autoincrement", "comment",
];

/// Cut a declared type at its first constraint keyword.
fn strip_constraints(raw: &str) -> String {
    raw.split_whitespace()
        .take_while(|word| !CONSTRAINT_KEYWORDS.contains(&word.to_ascii_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn declared_type_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*\d+\s*)?\))?\s*$")
                .ok()
        })
        .as_ref()
}

fn type_family(base: &str) -> TypeFamily {
    let head = base.split_whitespace().next().unwrap_or("");
    match head {
        "char" | "character" | "nchar" | "varchar" | "nvarchar" | "varchar2" | "nvarchar2"
        | "text" | "tinytext" | "mediumtext" | "longtext" | "string" | "citext" | "bpchar"
        | "clob" => TypeFamily::Text,
        "int" | "integer" | "smallint" | "bigint" | "tinyint" | "mediumint" | "serial"
        | "bigserial" | "decimal" | "numeric" | "number" | "float" | "double" | "real"
        | "money" => TypeFamily::Numeric,
        "date" | "datetime" | "datetime2" | "timestamp" | "timestamptz" | "time" => {
            TypeFamily::Temporal
        }
        "bool" | "boolean" | "bit" => TypeFamily::Boolean,
        "blob" | "bytea" | "binary" | "varbinary" | "longblob" | "image" => TypeFamily::Binary,
        _ => TypeFamily::Unknown,
    }
}

// ---- Context term lists ----

/// Tokens marking a healthcare context.
pub const MEDICAL_TERMS: &[&str] = &[
    "patient", "patients", "medical", "health", "healthcare", "clinical", "clinic",
    "clinics", "hospital", "diagnosis", "diagnoses", "treatment", "treatments",
    "prescription", "prescriptions", "pharmacy", "ehr", "emr", "encounter",
    "encounters", "admission", "admissions", "physician", "physicians", "nurse",
    "therapy", "medication", "medications", "lab", "labs", "immunization",
    "immunizations", "patienten", "krankenhaus", "paciente", "pacientes",
];

/// Tokens marking a table that describes people.
pub const PERSON_DOMAIN_TERMS: &[&str] = &[
    "customer", "customers", "user", "users", "member", "members", "employee",
    "employees", "person", "persons", "people", "client", "clients", "student",
    "students", "contact", "contacts", "payroll", "staff", "applicant", "applicants",
    "billing", "account", "accounts", "subscriber", "subscribers", "guest", "guests",
    "kunden", "mitarbeiter", "benutzer", "clientes", "usuarios",
];

/// Semantic hints derived from a field's table and column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextHints {
    pub healthcare: bool,
    pub person_domain: bool,
}

impl ContextHints {
    pub fn from_names(table: &NormalizedName, column: &NormalizedName) -> Self {
        let any = |terms: &[&str]| table.has_any(terms) || column.has_any(terms);
        Self {
            healthcare: any(MEDICAL_TERMS),
            person_domain: any(PERSON_DOMAIN_TERMS),
        }
    }

    pub fn from_field(field: &FieldDescriptor) -> Self {
        Self::from_names(&normalize(&field.table), &normalize(&field.column))
    }
}

// ---- Built-in dictionaries ----

const COMMON_ALIASES: &[(&str, Subtype, f64)] = &[
    ("ssn", Subtype::Ssn, 0.95),
    ("social_security_number", Subtype::Ssn, 0.95),
    ("social_security_num", Subtype::Ssn, 0.95),
    ("social_security", Subtype::Ssn, 0.90),
    ("soc_sec_no", Subtype::Ssn, 0.90),
    ("email", Subtype::Email, 0.90),
    ("email_address", Subtype::Email, 0.90),
    ("e_mail", Subtype::Email, 0.90),
    ("mail_address", Subtype::Email, 0.80),
    ("contact_email", Subtype::Email, 0.90),
    ("phone", Subtype::Phone, 0.85),
    ("phone_number", Subtype::Phone, 0.90),
    ("mobile", Subtype::Phone, 0.80),
    ("mobile_number", Subtype::Phone, 0.90),
    ("cell_phone", Subtype::Phone, 0.90),
    ("home_phone", Subtype::Phone, 0.90),
    ("work_phone", Subtype::Phone, 0.85),
    ("fax_number", Subtype::Phone, 0.75),
    ("first_name", Subtype::Name, 0.85),
    ("last_name", Subtype::Name, 0.85),
    ("middle_name", Subtype::Name, 0.80),
    ("full_name", Subtype::Name, 0.85),
    ("surname", Subtype::Name, 0.85),
    ("given_name", Subtype::Name, 0.85),
    ("family_name", Subtype::Name, 0.85),
    ("maiden_name", Subtype::Name, 0.85),
    ("forename", Subtype::Name, 0.85),
    ("street_address", Subtype::Address, 0.85),
    ("home_address", Subtype::Address, 0.85),
    ("mailing_address", Subtype::Address, 0.85),
    ("address_line1", Subtype::Address, 0.80),
    ("address_line2", Subtype::Address, 0.75),
    ("street", Subtype::Address, 0.75),
    ("zip", Subtype::PostalCode, 0.75),
    ("zip_code", Subtype::PostalCode, 0.80),
    ("zipcode", Subtype::PostalCode, 0.80),
    ("postal_code", Subtype::PostalCode, 0.80),
    ("postcode", Subtype::PostalCode, 0.80),
    ("dob", Subtype::DateOfBirth, 0.90),
    ("date_of_birth", Subtype::DateOfBirth, 0.95),
    ("birth_date", Subtype::DateOfBirth, 0.90),
    ("birthdate", Subtype::DateOfBirth, 0.90),
    ("birthday", Subtype::DateOfBirth, 0.85),
    ("national_id", Subtype::NationalId, 0.90),
    ("national_id_number", Subtype::NationalId, 0.90),
    ("sin", Subtype::NationalId, 0.75),
    ("passport", Subtype::Passport, 0.85),
    ("passport_number", Subtype::Passport, 0.95),
    ("drivers_license", Subtype::DriversLicense, 0.90),
    ("driver_license_number", Subtype::DriversLicense, 0.90),
    ("license_number", Subtype::DriversLicense, 0.70),
    ("tax_id", Subtype::TaxId, 0.90),
    ("tin", Subtype::TaxId, 0.80),
    ("ein", Subtype::TaxId, 0.80),
    ("ip_address", Subtype::IpAddress, 0.85),
    ("ip", Subtype::IpAddress, 0.70),
    ("last_login_ip", Subtype::IpAddress, 0.85),
    ("username", Subtype::Username, 0.75),
    ("user_name", Subtype::Username, 0.75),
    ("login", Subtype::Username, 0.65),
    ("gender", Subtype::Gender, 0.80),
    ("sex", Subtype::Gender, 0.75),
    ("ethnicity", Subtype::Ethnicity, 0.85),
    ("race", Subtype::Ethnicity, 0.80),
    ("fingerprint", Subtype::Biometric, 0.85),
    ("biometric_template", Subtype::Biometric, 0.90),
    ("face_template", Subtype::Biometric, 0.85),
    ("credit_card", Subtype::CreditCard, 0.95),
    ("credit_card_number", Subtype::CreditCard, 0.95),
    ("card_number", Subtype::CreditCard, 0.90),
    ("cc_number", Subtype::CreditCard, 0.90),
    ("pan", Subtype::CreditCard, 0.75),
    ("cvv", Subtype::CreditCard, 0.90),
    ("bank_account", Subtype::BankAccount, 0.90),
    ("bank_account_number", Subtype::BankAccount, 0.95),
    ("account_number", Subtype::BankAccount, 0.80),
    ("routing_number", Subtype::BankAccount, 0.85),
    ("iban", Subtype::Iban, 0.95),
    ("salary", Subtype::Salary, 0.85),
    ("annual_salary", Subtype::Salary, 0.85),
    ("wage", Subtype::Salary, 0.80),
    ("income", Subtype::Salary, 0.75),
    ("diagnosis", Subtype::Diagnosis, 0.90),
    ("diagnosis_code", Subtype::Diagnosis, 0.90),
    ("icd10", Subtype::Diagnosis, 0.90),
    ("icd_code", Subtype::Diagnosis, 0.90),
    ("medication", Subtype::Medication, 0.90),
    ("prescription", Subtype::Medication, 0.85),
    ("mrn", Subtype::MedicalRecordNumber, 0.95),
    ("medical_record_number", Subtype::MedicalRecordNumber, 0.95),
    ("health_plan_id", Subtype::HealthPlanId, 0.90),
    ("insurance_member_id", Subtype::HealthPlanId, 0.85),
    ("cpt_code", Subtype::Procedure, 0.85),
    ("lab_result", Subtype::LabResult, 0.90),
    ("blood_type", Subtype::LabResult, 0.85),
    ("allergies", Subtype::Allergy, 0.90),
    ("allergy", Subtype::Allergy, 0.90),
];

const LOCALIZED_ALIASES: &[(&str, Subtype, f64)] = &[
    // German
    ("benutzer_email", Subtype::Email, 0.90),
    ("e_mail_adresse", Subtype::Email, 0.90),
    ("vorname", Subtype::Name, 0.85),
    ("nachname", Subtype::Name, 0.85),
    ("geburtsdatum", Subtype::DateOfBirth, 0.90),
    ("telefonnummer", Subtype::Phone, 0.90),
    ("telefon", Subtype::Phone, 0.85),
    ("handynummer", Subtype::Phone, 0.85),
    ("strasse", Subtype::Address, 0.80),
    ("anschrift", Subtype::Address, 0.85),
    ("postleitzahl", Subtype::PostalCode, 0.85),
    ("steuernummer", Subtype::TaxId, 0.90),
    ("steuer_id", Subtype::TaxId, 0.90),
    ("personalausweisnummer", Subtype::NationalId, 0.90),
    ("sozialversicherungsnummer", Subtype::NationalId, 0.95),
    ("krankenversicherungsnummer", Subtype::HealthPlanId, 0.95),
    ("diagnose", Subtype::Diagnosis, 0.90),
    ("gehalt", Subtype::Salary, 0.85),
    ("kontonummer", Subtype::BankAccount, 0.90),
    ("geschlecht", Subtype::Gender, 0.80),
    // French
    ("prenom", Subtype::Name, 0.85),
    ("nom_de_famille", Subtype::Name, 0.85),
    ("date_naissance", Subtype::DateOfBirth, 0.90),
    ("date_de_naissance", Subtype::DateOfBirth, 0.90),
    ("courriel", Subtype::Email, 0.90),
    ("adresse_postale", Subtype::Address, 0.85),
    ("numero_securite_sociale", Subtype::NationalId, 0.95),
    // Spanish
    ("correo", Subtype::Email, 0.85),
    ("correo_electronico", Subtype::Email, 0.90),
    ("telefono", Subtype::Phone, 0.85),
    ("fecha_nacimiento", Subtype::DateOfBirth, 0.90),
    ("fecha_de_nacimiento", Subtype::DateOfBirth, 0.90),
    ("apellido", Subtype::Name, 0.85),
    ("direccion", Subtype::Address, 0.80),
    ("codigo_postal", Subtype::PostalCode, 0.80),
];

fn builtin_token_rules() -> Vec<TokenRule> {
    vec![
        TokenRule { keywords: &["ssn"], qualifiers: &[], subtype: Subtype::Ssn, confidence: 0.80 },
        TokenRule { keywords: &["security"], qualifiers: &["social"], subtype: Subtype::Ssn, confidence: 0.80 },
        TokenRule { keywords: &["email", "mail"], qualifiers: &[], subtype: Subtype::Email, confidence: 0.70 },
        TokenRule { keywords: &["phone", "mobile", "cell", "fax"], qualifiers: &[], subtype: Subtype::Phone, confidence: 0.65 },
        TokenRule { keywords: &["address", "street"], qualifiers: &[], subtype: Subtype::Address, confidence: 0.55 },
        TokenRule { keywords: &["zip", "postcode", "postal"], qualifiers: &[], subtype: Subtype::PostalCode, confidence: 0.55 },
        TokenRule { keywords: &["name"], qualifiers: &["first", "last", "full", "middle", "given", "family", "maiden", "legal", "display"], subtype: Subtype::Name, confidence: 0.75 },
        TokenRule { keywords: &["name"], qualifiers: &[], subtype: Subtype::Name, confidence: 0.50 },
        TokenRule { keywords: &["surname", "forename"], qualifiers: &[], subtype: Subtype::Name, confidence: 0.75 },
        TokenRule { keywords: &["birth", "dob", "birthday", "birthdate"], qualifiers: &[], subtype: Subtype::DateOfBirth, confidence: 0.70 },
        TokenRule { keywords: &["passport"], qualifiers: &[], subtype: Subtype::Passport, confidence: 0.75 },
        TokenRule { keywords: &["license", "licence"], qualifiers: &["driver", "drivers", "driving"], subtype: Subtype::DriversLicense, confidence: 0.75 },
        TokenRule { keywords: &["tax"], qualifiers: &["id", "number"], subtype: Subtype::TaxId, confidence: 0.70 },
        TokenRule { keywords: &["national"], qualifiers: &["id", "number"], subtype: Subtype::NationalId, confidence: 0.75 },
        TokenRule { keywords: &["ip"], qualifiers: &[], subtype: Subtype::IpAddress, confidence: 0.60 },
        TokenRule { keywords: &["username", "login"], qualifiers: &[], subtype: Subtype::Username, confidence: 0.55 },
        TokenRule { keywords: &["gender", "sex"], qualifiers: &[], subtype: Subtype::Gender, confidence: 0.60 },
        TokenRule { keywords: &["ethnicity", "race", "ethnic"], qualifiers: &[], subtype: Subtype::Ethnicity, confidence: 0.65 },
        TokenRule { keywords: &["biometric", "fingerprint", "retina"], qualifiers: &[], subtype: Subtype::Biometric, confidence: 0.70 },
        TokenRule { keywords: &["card"], qualifiers: &["credit", "debit", "number", "payment"], subtype: Subtype::CreditCard, confidence: 0.75 },
        TokenRule { keywords: &["cvv", "cvc", "pan"], qualifiers: &[], subtype: Subtype::CreditCard, confidence: 0.70 },
        TokenRule { keywords: &["iban"], qualifiers: &[], subtype: Subtype::Iban, confidence: 0.85 },
        TokenRule { keywords: &["account", "routing"], qualifiers: &["bank", "number", "routing", "checking", "savings"], subtype: Subtype::BankAccount, confidence: 0.65 },
        TokenRule { keywords: &["salary", "wage", "wages", "income", "compensation"], qualifiers: &[], subtype: Subtype::Salary, confidence: 0.60 },
        TokenRule { keywords: &["diagnosis", "diagnoses", "icd", "icd10"], qualifiers: &[], subtype: Subtype::Diagnosis, confidence: 0.75 },
        TokenRule { keywords: &["medication", "prescription", "drug", "dosage"], qualifiers: &[], subtype: Subtype::Medication, confidence: 0.70 },
        TokenRule { keywords: &["mrn"], qualifiers: &[], subtype: Subtype::MedicalRecordNumber, confidence: 0.85 },
        TokenRule { keywords: &["record"], qualifiers: &["medical", "health"], subtype: Subtype::MedicalRecordNumber, confidence: 0.75 },
        TokenRule { keywords: &["allergy", "allergies"], qualifiers: &[], subtype: Subtype::Allergy, confidence: 0.70 },
        TokenRule { keywords: &["cpt"], qualifiers: &[], subtype: Subtype::Procedure, confidence: 0.70 },
        TokenRule { keywords: &["procedure"], qualifiers: &["medical", "surgical", "clinical"], subtype: Subtype::Procedure, confidence: 0.60 },
        TokenRule { keywords: &["lab", "blood"], qualifiers: &["result", "results", "type", "test", "value"], subtype: Subtype::LabResult, confidence: 0.65 },
        TokenRule { keywords: &["insurance", "plan"], qualifiers: &["member", "policy", "health", "id", "number"], subtype: Subtype::HealthPlanId, confidence: 0.60 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_snake_and_camel() {
        let name = normalize("SocialSecurityNum");
        assert_eq!(name.tokens, vec!["social", "security", "number"]);
        assert_eq!(name.compact, "socialsecuritynumber");

        let snake = normalize("social_security_no");
        assert_eq!(snake.compact, "socialsecuritynumber");
    }

    #[test]
    fn test_normalize_splits_digits_and_separators() {
        let name = normalize("address-line.1");
        assert_eq!(name.tokens, vec!["address", "line", "1"]);
        assert_eq!(normalize("addressLine1").compact, "addressline1");
    }

    #[test]
    fn test_normalize_expands_abbreviations() {
        assert_eq!(normalize("cust_tel").tokens, vec!["customer", "phone"]);
        assert_eq!(normalize("fname").tokens, vec!["first", "name"]);
        assert_eq!(normalize("patient_addr").compact, "patientaddress");
    }

    #[test]
    fn test_exact_lookup_variants() {
        let table = AliasTable::builtin();
        let ssn = table.lookup_exact(&normalize("SSN").compact).unwrap();
        assert_eq!(ssn.subtype, Subtype::Ssn);
        assert_eq!(
            table.lookup_exact(&normalize("social_security_num").compact).unwrap().subtype,
            Subtype::Ssn
        );
        assert!(table.lookup_exact(&normalize("notes").compact).is_none());
    }

    #[test]
    fn test_localized_family() {
        let table = AliasTable::builtin();
        let entry = table.lookup_exact(&normalize("benutzer_email").compact).unwrap();
        assert_eq!(entry.subtype, Subtype::Email);
        assert_eq!(entry.family, AliasFamily::Localized);
        let birth = table.lookup_exact(&normalize("Geburtsdatum").compact).unwrap();
        assert_eq!(birth.family, AliasFamily::Localized);
        assert_eq!(
            table.lookup_exact(&normalize("email").compact).unwrap().family,
            AliasFamily::Common
        );
    }

    #[test]
    fn test_fuzzy_lookup() {
        let table = AliasTable::builtin();
        let (key, entry) = table.lookup_fuzzy(&normalize("email_adress").compact).unwrap();
        assert_eq!(key, "emailaddress");
        assert_eq!(entry.subtype, Subtype::Email);

        // Short names never fuzzy-match
        assert!(table.lookup_fuzzy("ssm").is_none());
        // Exact hits are not reported as fuzzy
        assert!(table.lookup_fuzzy("email").is_none());
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("email", "emial"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_custom_aliases() {
        let table = AliasTable::with_custom(&[CustomAlias {
            alias: "kdnr".to_string(),
            subtype: Subtype::NationalId,
            confidence: 0.8,
        }])
        .unwrap();
        let entry = table.lookup_exact("kdnr").unwrap();
        assert_eq!(entry.family, AliasFamily::Custom);
        assert_eq!(table.alias_count(), AliasTable::builtin().alias_count() + 1);

        let bad = AliasTable::with_custom(&[CustomAlias {
            alias: "__".to_string(),
            subtype: Subtype::Email,
            confidence: 0.8,
        }]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_declared_type_parse() {
        let char11 = DeclaredType::parse("CHAR(11)");
        assert_eq!(char11.base, "char");
        assert_eq!(char11.length, Some(11));
        assert_eq!(char11.family, TypeFamily::Text);
        assert!(char11.is_fixed_char());

        let decimal = DeclaredType::parse("DECIMAL(10, 2)");
        assert_eq!(decimal.length, Some(10));
        assert_eq!(decimal.family, TypeFamily::Numeric);

        assert_eq!(DeclaredType::parse("timestamp with time zone").family, TypeFamily::Temporal);
        assert_eq!(DeclaredType::parse("BOOLEAN").family, TypeFamily::Boolean);
        assert_eq!(DeclaredType::parse("").family, TypeFamily::Unknown);

        let ddl = DeclaredType::parse("CHAR(11) NOT NULL");
        assert_eq!(ddl.base, "char");
        assert_eq!(ddl.length, Some(11));
        assert!(ddl.is_fixed_char());

        let varchar = DeclaredType::parse("varchar(255) default '' collate utf8mb4_bin");
        assert_eq!(varchar.length, Some(255));
        assert_eq!(varchar.family, TypeFamily::Text);
        assert_eq!(DeclaredType::parse("INTEGER PRIMARY KEY").family, TypeFamily::Numeric);
    }

    #[test]
    fn test_context_hints() {
        let patients = ContextHints::from_field(&FieldDescriptor::new("patients", "ssn", "CHAR(11)"));
        assert!(patients.healthcare);
        assert!(!patients.person_domain);

        let german = ContextHints::from_field(&FieldDescriptor::new("kunden", "vorname", "TEXT"));
        assert!(german.person_domain);
        assert!(!german.healthcare);
    }
}
