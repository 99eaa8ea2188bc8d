//! Caller-facing wording for the points where the core produces something to say.
//!
//! The conversational policy itself lives outside this crate. These helpers only cover the two
//! moments the core owns: reading the collected record back before submission, and telling the
//! caller how the submission went.

use crate::record::PatientRecord;
use crate::submission::SubmissionOutcome;

const FALLBACK_NAME: &str = "there";

/// Message to speak after a submission attempt.
///
/// `first_name` falls back to "there" when absent or blank.
pub fn outcome_message(outcome: &SubmissionOutcome, first_name: Option<&str>) -> String {
    let name = first_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_NAME);

    match outcome {
        SubmissionOutcome::Success { .. } => format!(
            "Wonderful! Thank you so much for your patience, {name}. I've got everything saved in \
             our system now. You're all set for registration. It was really nice talking with you \
             today, and we'll see you soon. Have a great rest of your day!"
        ),
        SubmissionOutcome::Failure {
            is_network_error: true,
            ..
        } => format!(
            "I'm really sorry, {name}, but I'm having trouble connecting to our system right now. \
             This might be a temporary network issue. Let me try again in just a moment, or if \
             this keeps happening, I can have someone from our technical team call you back to \
             complete the registration. I apologize for the inconvenience."
        ),
        SubmissionOutcome::Failure { .. } => format!(
            "I'm really sorry, {name}, but I'm having a technical issue saving your information \
             right now. Let me try that again, or if this keeps happening, I can have someone \
             from our technical team call you back to complete the registration. I apologize for \
             the inconvenience."
        ),
    }
}

/// Read-back of a collected record, asked before the caller confirms submission.
///
/// Only the last four digits of the SSN are spoken.
pub fn confirmation_summary(record: &PatientRecord) -> String {
    let p = &record.personal;
    let a = &record.address;
    format!(
        "Alright {first}, let me just double-check everything I have to make sure it's all \
         correct. I've got {first} {last}, born {dob}. I can reach you at {phone}, your email is \
         {email}, marital status is {marital}, and your social security number ends in {ssn}. \
         Your {kind} address is {line1} in {city}, {state}, {country} {zip}. How does that all \
         sound? Is everything correct, or would you like me to change anything?",
        first = p.first_name.trim(),
        last = p.last_name.trim(),
        dob = p.date_of_birth.trim(),
        phone = p.phone.trim(),
        email = p.email.trim(),
        marital = p.marital_status.trim(),
        ssn = ssn_last_four(&p.ssn),
        kind = a.address_type.trim(),
        line1 = a.line1.trim(),
        city = a.city.trim(),
        state = a.state.trim(),
        country = a.country.trim(),
        zip = a.zip_code.trim(),
    )
}

/// Last four digits of an SSN, ignoring separators. Shorter inputs yield what digits exist.
pub fn ssn_last_four(ssn: &str) -> String {
    let digits: Vec<char> = ssn.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(4);
    digits[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::complete_record;
    use serde_json::json;

    #[test]
    fn success_message_uses_first_name() {
        let outcome = SubmissionOutcome::Success {
            response: json!({ "id": "abc123" }),
        };
        let msg = outcome_message(&outcome, Some("John"));
        assert!(msg.contains("patience, John."));
        assert!(msg.contains("saved in our system"));
    }

    #[test]
    fn network_and_application_failures_are_worded_differently() {
        let network = SubmissionOutcome::Failure {
            error_message: "ECONNREFUSED".into(),
            is_network_error: true,
        };
        let application = SubmissionOutcome::Failure {
            error_message: "API responded with status 422".into(),
            is_network_error: false,
        };

        let network_msg = outcome_message(&network, Some("Sarah"));
        let application_msg = outcome_message(&application, Some("Sarah"));

        assert!(network_msg.contains("trouble connecting"));
        assert!(application_msg.contains("technical issue"));
        assert!(network_msg.contains("call you back"));
        assert!(application_msg.contains("call you back"));
        // Internal detail is not read out to the caller.
        assert!(!application_msg.contains("422"));
    }

    #[test]
    fn missing_or_blank_name_falls_back() {
        let outcome = SubmissionOutcome::Failure {
            error_message: String::new(),
            is_network_error: false,
        };
        assert!(outcome_message(&outcome, None).starts_with("I'm really sorry, there,"));
        assert!(outcome_message(&outcome, Some("  ")).starts_with("I'm really sorry, there,"));
    }

    #[test]
    fn summary_masks_ssn_and_lists_address() {
        let summary = confirmation_summary(&complete_record());
        assert!(summary.contains("John Doe, born 1985-05-15"));
        assert!(summary.contains("ends in 6789"));
        assert!(!summary.contains("123-45-6789"));
        assert!(summary.contains("Your home address is 123 Main Street in Austin, Texas, USA 78701"));
    }

    #[test]
    fn ssn_last_four_ignores_separators_and_short_input() {
        assert_eq!(ssn_last_four("123-45-6789"), "6789");
        assert_eq!(ssn_last_four("123 45 6789"), "6789");
        assert_eq!(ssn_last_four("12"), "12");
        assert_eq!(ssn_last_four("n/a"), "");
    }
}
