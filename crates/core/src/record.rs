//! Patient record wire model and field catalogue.
//!
//! Responsibilities:
//! - Define the submission payload ([`PatientRecord`]) in the backend's JSON shape
//! - Name every logical field ([`RecordField`]) so sessions, APIs and logs agree on it
//! - Parse externally supplied records strictly (unknown keys are rejected)
//! - Describe the record as the JSON Schema of the save tool's arguments
//!
//! No format validation happens here: a record is judged only on whether every field is
//! present and non-blank.

use crate::constants::SAVE_TOOL_NAME;
use crate::{IntakeError, IntakeResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Field catalogue
// ============================================================================

/// One independently tracked piece of a [`PatientRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    FirstName,
    LastName,
    DateOfBirth,
    Ssn,
    Email,
    MaritalStatus,
    Phone,
    AddressType,
    AddressLine1,
    City,
    State,
    Country,
    ZipCode,
}

/// Number of tracked fields.
pub const FIELD_COUNT: usize = 13;

impl RecordField {
    /// Every field, in canonical (collection and serialisation) order.
    pub const ALL: [RecordField; FIELD_COUNT] = [
        RecordField::FirstName,
        RecordField::LastName,
        RecordField::DateOfBirth,
        RecordField::Ssn,
        RecordField::Email,
        RecordField::MaritalStatus,
        RecordField::Phone,
        RecordField::AddressType,
        RecordField::AddressLine1,
        RecordField::City,
        RecordField::State,
        RecordField::Country,
        RecordField::ZipCode,
    ];

    /// Fields of the `PatientInformation` group.
    pub const PERSONAL: [RecordField; 7] = [
        RecordField::FirstName,
        RecordField::LastName,
        RecordField::DateOfBirth,
        RecordField::Ssn,
        RecordField::Email,
        RecordField::MaritalStatus,
        RecordField::Phone,
    ];

    /// Fields of the `Address` group.
    pub const ADDRESS: [RecordField; 6] = [
        RecordField::AddressType,
        RecordField::AddressLine1,
        RecordField::City,
        RecordField::State,
        RecordField::Country,
        RecordField::ZipCode,
    ];

    /// Key used in the submission JSON.
    pub fn wire_name(self) -> &'static str {
        match self {
            RecordField::FirstName => "FirstName",
            RecordField::LastName => "LastName",
            RecordField::DateOfBirth => "DateOfBirth",
            RecordField::Ssn => "SSN",
            RecordField::Email => "EmailID",
            RecordField::MaritalStatus => "MaritalStatus",
            RecordField::Phone => "PhoneNumber",
            RecordField::AddressType => "Type",
            RecordField::AddressLine1 => "AddressLine1",
            RecordField::City => "City",
            RecordField::State => "State",
            RecordField::Country => "Country",
            RecordField::ZipCode => "ZipCode",
        }
    }

    /// snake_case name used by the REST API and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::FirstName => "first_name",
            RecordField::LastName => "last_name",
            RecordField::DateOfBirth => "date_of_birth",
            RecordField::Ssn => "ssn",
            RecordField::Email => "email",
            RecordField::MaritalStatus => "marital_status",
            RecordField::Phone => "phone",
            RecordField::AddressType => "address_type",
            RecordField::AddressLine1 => "address_line1",
            RecordField::City => "city",
            RecordField::State => "state",
            RecordField::Country => "country",
            RecordField::ZipCode => "zip_code",
        }
    }

    /// Human wording, for read-backs and error messages shown to callers.
    pub fn label(self) -> &'static str {
        match self {
            RecordField::FirstName => "first name",
            RecordField::LastName => "last name",
            RecordField::DateOfBirth => "date of birth",
            RecordField::Ssn => "social security number",
            RecordField::Email => "email address",
            RecordField::MaritalStatus => "marital status",
            RecordField::Phone => "phone number",
            RecordField::AddressType => "address type",
            RecordField::AddressLine1 => "street address",
            RecordField::City => "city",
            RecordField::State => "state",
            RecordField::Country => "country",
            RecordField::ZipCode => "zip code",
        }
    }

    /// Normalised spellings accepted by [`FromStr`] besides the wire and snake_case names.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            RecordField::Ssn => &["socialsecuritynumber"],
            RecordField::Email => &["email", "emailaddress"],
            RecordField::Phone => &["phone", "phonenumber"],
            RecordField::AddressType => &["addresstype", "type"],
            RecordField::AddressLine1 => &["line1", "streetaddress"],
            RecordField::ZipCode => &["zip", "postalcode"],
            _ => &[],
        }
    }

    fn matches(self, normalised: &str) -> bool {
        normalise(self.wire_name()) == normalised
            || normalise(self.as_str()) == normalised
            || self.aliases().contains(&normalised)
    }
}

fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = IntakeError;

    /// Case-insensitive; accepts `FirstName`, `first_name`, `first-name` and the short
    /// spellings (`Email`, `Phone`, `Type`, `Line1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = normalise(s.trim());
        RecordField::ALL
            .into_iter()
            .find(|field| field.matches(&normalised))
            .ok_or_else(|| IntakeError::UnknownField(s.to_string()))
    }
}

// ============================================================================
// Wire model
// ============================================================================

/// Personal details group (`PatientInformation` on the wire).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersonalInfo {
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "DateOfBirth")]
    pub date_of_birth: String,
    #[serde(rename = "SSN")]
    pub ssn: String,
    #[serde(rename = "EmailID")]
    pub email: String,
    #[serde(rename = "MaritalStatus")]
    pub marital_status: String,
    #[serde(rename = "PhoneNumber")]
    pub phone: String,
}

/// Address group (`Address` on the wire).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddressInfo {
    /// `home` or `work`; not enforced here.
    #[serde(rename = "Type")]
    pub address_type: String,
    #[serde(rename = "AddressLine1")]
    pub line1: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "ZipCode")]
    pub zip_code: String,
}

/// The structured record submitted to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientRecord {
    #[serde(rename = "PatientInformation")]
    pub personal: PersonalInfo,
    #[serde(rename = "Address")]
    pub address: AddressInfo,
}

impl PatientRecord {
    /// Parse a record from JSON text, rejecting unknown keys.
    ///
    /// Missing keys are tolerated and read as empty, so an incomplete record parses and is then
    /// reported by [`PatientRecord::missing_fields`].
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::RecordSchema`] naming the JSON path of the first mismatch
    /// (e.g. `PatientInformation.Nickname`).
    pub fn from_json(text: &str) -> IntakeResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let record = serde_path_to_error::deserialize::<_, PatientRecord>(&mut deserializer)
            .map_err(|err| {
                let path = err.path().to_string();
                let message = err.into_inner().to_string();
                IntakeError::RecordSchema {
                    path: if path.is_empty() || path == "." {
                        "<root>".into()
                    } else {
                        path
                    },
                    message,
                }
            })?;
        deserializer.end().map_err(|err| IntakeError::RecordSchema {
            path: "<root>".into(),
            message: err.to_string(),
        })?;
        Ok(record)
    }

    /// Serialise to the canonical request body.
    pub fn to_json_body(&self) -> IntakeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(IntakeError::Serialization)
    }

    pub fn get(&self, field: RecordField) -> &str {
        match field {
            RecordField::FirstName => &self.personal.first_name,
            RecordField::LastName => &self.personal.last_name,
            RecordField::DateOfBirth => &self.personal.date_of_birth,
            RecordField::Ssn => &self.personal.ssn,
            RecordField::Email => &self.personal.email,
            RecordField::MaritalStatus => &self.personal.marital_status,
            RecordField::Phone => &self.personal.phone,
            RecordField::AddressType => &self.address.address_type,
            RecordField::AddressLine1 => &self.address.line1,
            RecordField::City => &self.address.city,
            RecordField::State => &self.address.state,
            RecordField::Country => &self.address.country,
            RecordField::ZipCode => &self.address.zip_code,
        }
    }

    pub fn set(&mut self, field: RecordField, value: impl Into<String>) {
        let slot = match field {
            RecordField::FirstName => &mut self.personal.first_name,
            RecordField::LastName => &mut self.personal.last_name,
            RecordField::DateOfBirth => &mut self.personal.date_of_birth,
            RecordField::Ssn => &mut self.personal.ssn,
            RecordField::Email => &mut self.personal.email,
            RecordField::MaritalStatus => &mut self.personal.marital_status,
            RecordField::Phone => &mut self.personal.phone,
            RecordField::AddressType => &mut self.address.address_type,
            RecordField::AddressLine1 => &mut self.address.line1,
            RecordField::City => &mut self.address.city,
            RecordField::State => &mut self.address.state,
            RecordField::Country => &mut self.address.country,
            RecordField::ZipCode => &mut self.address.zip_code,
        };
        *slot = value.into();
    }

    /// Fields whose value is empty after trimming, in canonical order.
    pub fn missing_fields(&self) -> Vec<RecordField> {
        RecordField::ALL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fails with [`IntakeError::IncompleteRecord`] unless every field is populated.
    pub fn ensure_complete(&self) -> IntakeResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IntakeError::IncompleteRecord { missing })
        }
    }
}

/// Function-tool definition the conversational layer registers to hand over a full record.
pub fn tool_definition() -> Value {
    json!({
        "name": SAVE_TOOL_NAME,
        "description": "Save the collected patient details to the medical records system.",
        "parameters": tool_parameters_schema(),
    })
}

/// JSON Schema for the arguments of the save tool exposed to the conversational layer.
pub fn tool_parameters_schema() -> Value {
    fn group(fields: &[RecordField]) -> Value {
        let properties: Map<String, Value> = fields
            .iter()
            .map(|f| (f.wire_name().to_string(), json!({ "type": "string" })))
            .collect();
        let required: Vec<&str> = fields.iter().map(|f| f.wire_name()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    json!({
        "type": "object",
        "properties": {
            "PatientInformation": group(&RecordField::PERSONAL),
            "Address": group(&RecordField::ADDRESS),
        },
        "required": ["PatientInformation", "Address"],
        "additionalProperties": false,
    })
}
