//! Conversational collection state.
//!
//! A [`CollectionSession`] tracks one caller's answers across an arbitrary number of turns.
//! Every reported value goes through [`CollectionSession::record_value`], which decides whether
//! the caller is giving the field for the first time, repeating what is already stored, or
//! changing it. The conversational layer phrases its next utterance from that signal.
//!
//! The session never submits on its own. Once [`CollectionSession::is_complete`] holds and the
//! caller has confirmed the read-back, [`CollectionSession::begin_submission`] projects the
//! record for the submission client and holds the session until
//! [`CollectionSession::finish_submission`] reports the result.

use crate::record::{PatientRecord, RecordField, FIELD_COUNT};
use crate::{IntakeError, IntakeResult};
use chrono::{DateTime, Utc};
use intake_types::FieldValue;
use serde::Serialize;
use uuid::Uuid;

/// How a reported value relates to what the session already holds for that field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum DuplicateSignal {
    /// Nothing was stored yet; the value is now stored.
    FirstTime,
    /// Identical to the stored value; nothing changes, the caller should acknowledge the match.
    Unchanged,
    /// Differs from the stored value; the new value is stored, the caller should confirm.
    Changed { old_value: String, new_value: String },
}

/// Per-field tracking state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldTrackingEntry {
    current_value: Option<FieldValue>,
    was_provided: bool,
    previous_value: Option<FieldValue>,
}

impl FieldTrackingEntry {
    pub fn current_value(&self) -> Option<&str> {
        self.current_value.as_ref().map(FieldValue::as_str)
    }

    pub fn was_provided(&self) -> bool {
        self.was_provided
    }

    /// Value displaced by the most recent `Changed` update, if it has not been reverted.
    pub fn previous_value(&self) -> Option<&str> {
        self.previous_value.as_ref().map(FieldValue::as_str)
    }

    fn is_filled(&self) -> bool {
        self.was_provided && self.current_value.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Collecting,
    /// A submission is in flight; updates are refused until it finishes.
    Submitting,
    Submitted,
    Abandoned,
}

/// Collection state for a single call.
///
/// Not internally synchronised: one call's turns are processed one at a time.
#[derive(Clone, Debug)]
pub struct CollectionSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: SessionState,
    entries: [FieldTrackingEntry; FIELD_COUNT],
}

impl Default for CollectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: SessionState::Collecting,
            entries: Default::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn entry(&self, field: RecordField) -> &FieldTrackingEntry {
        &self.entries[index_of(field)]
    }

    /// Every field with its tracking entry, in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (RecordField, &FieldTrackingEntry)> {
        RecordField::ALL.into_iter().zip(self.entries.iter())
    }

    /// Record a value reported for `field`.
    ///
    /// The raw value is trimmed and compared with the stored one by exact, case-sensitive
    /// equality.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::EmptyValue`] when `raw` is blank; the entry is left untouched.
    /// - [`IntakeError::SubmissionInProgress`] while a submission is in flight.
    /// - [`IntakeError::SessionClosed`] once the session was submitted or abandoned.
    pub fn record_value(
        &mut self,
        field: RecordField,
        raw: impl AsRef<str>,
    ) -> IntakeResult<DuplicateSignal> {
        self.ensure_open()?;
        let value = FieldValue::new(raw).map_err(|_| IntakeError::EmptyValue { field })?;

        let entry = &mut self.entries[index_of(field)];
        let signal = match entry.current_value.take() {
            None => {
                entry.current_value = Some(value);
                DuplicateSignal::FirstTime
            }
            Some(stored) if stored == value => {
                entry.current_value = Some(stored);
                DuplicateSignal::Unchanged
            }
            Some(stored) => {
                let signal = DuplicateSignal::Changed {
                    old_value: stored.as_str().to_owned(),
                    new_value: value.as_str().to_owned(),
                };
                entry.previous_value = Some(stored);
                entry.current_value = Some(value);
                signal
            }
        };
        entry.was_provided = true;

        tracing::debug!(session = %self.id, field = %field, signal = signal_kind(&signal), "field recorded");
        Ok(signal)
    }

    /// Apply every field of `record` through [`CollectionSession::record_value`].
    ///
    /// Used when the conversational layer hands over a full record at the read-back step, so
    /// repeats and corrections there are detected exactly like mid-conversation ones. Blank
    /// fields in `record` are skipped and keep whatever the session already holds.
    pub fn record_all(
        &mut self,
        record: &PatientRecord,
    ) -> IntakeResult<Vec<(RecordField, DuplicateSignal)>> {
        let mut signals = Vec::new();
        for field in RecordField::ALL {
            let value = record.get(field);
            if value.trim().is_empty() {
                continue;
            }
            signals.push((field, self.record_value(field, value)?));
        }
        Ok(signals)
    }

    /// Undo the last `Changed` update of `field`, restoring and returning the earlier value.
    ///
    /// # Errors
    ///
    /// [`IntakeError::NothingToRevert`] if the field has no displaced value.
    pub fn revert_change(&mut self, field: RecordField) -> IntakeResult<String> {
        self.ensure_open()?;
        let entry = &mut self.entries[index_of(field)];
        let previous = entry
            .previous_value
            .take()
            .ok_or(IntakeError::NothingToRevert { field })?;
        let restored = previous.as_str().to_owned();
        entry.current_value = Some(previous);
        tracing::debug!(session = %self.id, field = %field, "field change reverted");
        Ok(restored)
    }

    /// Fields not yet provided, in canonical order.
    pub fn missing_fields(&self) -> Vec<RecordField> {
        self.entries()
            .filter(|(_, entry)| !entry.is_filled())
            .map(|(field, _)| field)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(FieldTrackingEntry::is_filled)
    }

    /// Project the tracked values into the submission shape.
    ///
    /// # Errors
    ///
    /// [`IntakeError::IncompleteRecord`] listing the missing fields when the session is not
    /// complete.
    pub fn to_record(&self) -> IntakeResult<PatientRecord> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(IntakeError::IncompleteRecord { missing });
        }

        let mut record = PatientRecord::default();
        for (field, entry) in self.entries() {
            if let Some(value) = entry.current_value() {
                record.set(field, value);
            }
        }
        Ok(record)
    }

    /// Project the record and mark the session as submitting.
    ///
    /// Only one submission can be in flight; updates and further submissions are refused until
    /// [`CollectionSession::finish_submission`] is called.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::SubmissionInProgress`] if a submission is already in flight.
    /// - [`IntakeError::SessionClosed`] once the session was submitted or abandoned.
    /// - [`IntakeError::IncompleteRecord`] when fields are missing; the state is unchanged.
    pub fn begin_submission(&mut self) -> IntakeResult<PatientRecord> {
        self.ensure_open()?;
        let record = self.to_record()?;
        self.state = SessionState::Submitting;
        Ok(record)
    }

    /// End an in-flight submission: close the session if the record was accepted, reopen it for
    /// corrections and retries otherwise. No-op unless a submission is in flight.
    pub fn finish_submission(&mut self, accepted: bool) {
        if self.state == SessionState::Submitting {
            self.state = if accepted {
                SessionState::Submitted
            } else {
                SessionState::Collecting
            };
        }
    }

    /// Close the session without submitting.
    ///
    /// # Errors
    ///
    /// Same as [`CollectionSession::record_value`]: refused while submitting or once closed.
    pub fn abandon(&mut self) -> IntakeResult<()> {
        self.ensure_open()?;
        self.state = SessionState::Abandoned;
        Ok(())
    }

    fn ensure_open(&self) -> IntakeResult<()> {
        match self.state {
            SessionState::Collecting => Ok(()),
            SessionState::Submitting => Err(IntakeError::SubmissionInProgress(self.id)),
            SessionState::Submitted | SessionState::Abandoned => {
                Err(IntakeError::SessionClosed(self.id))
            }
        }
    }
}

fn index_of(field: RecordField) -> usize {
    field as usize
}

fn signal_kind(signal: &DuplicateSignal) -> &'static str {
    match signal {
        DuplicateSignal::FirstTime => "first_time",
        DuplicateSignal::Unchanged => "unchanged",
        DuplicateSignal::Changed { .. } => "changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::complete_record;

    fn filled_session() -> CollectionSession {
        let mut session = CollectionSession::new();
        session
            .record_all(&complete_record())
            .expect("session is open");
        session
    }

    #[test]
    fn index_matches_canonical_order() {
        for (i, field) in RecordField::ALL.into_iter().enumerate() {
            assert_eq!(index_of(field), i);
        }
    }

    #[test]
    fn first_time_then_unchanged_for_identical_trimmed_values() {
        let mut session = CollectionSession::new();
        let first = session
            .record_value(RecordField::Email, "abc@gmail.com")
            .unwrap();
        let second = session
            .record_value(RecordField::Email, "  abc@gmail.com ")
            .unwrap();

        assert_eq!(first, DuplicateSignal::FirstTime);
        assert_eq!(second, DuplicateSignal::Unchanged);
        assert_eq!(
            session.entry(RecordField::Email).current_value(),
            Some("abc@gmail.com")
        );
    }

    #[test]
    fn different_value_reports_change_with_previous_value() {
        let mut session = CollectionSession::new();
        session
            .record_value(RecordField::Email, "john@email.com")
            .unwrap();
        let signal = session
            .record_value(RecordField::Email, "sarah@email.com")
            .unwrap();

        assert_eq!(
            signal,
            DuplicateSignal::Changed {
                old_value: "john@email.com".into(),
                new_value: "sarah@email.com".into(),
            }
        );
        let entry = session.entry(RecordField::Email);
        assert_eq!(entry.current_value(), Some("sarah@email.com"));
        assert_eq!(entry.previous_value(), Some("john@email.com"));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let mut session = CollectionSession::new();
        session.record_value(RecordField::City, "Austin").unwrap();
        let signal = session.record_value(RecordField::City, "austin").unwrap();
        assert!(matches!(signal, DuplicateSignal::Changed { .. }));
    }

    #[test]
    fn blank_value_is_rejected_and_entry_untouched() {
        let mut session = CollectionSession::new();
        session.record_value(RecordField::City, "Austin").unwrap();

        let err = session
            .record_value(RecordField::City, "   ")
            .expect_err("blank value");
        assert!(matches!(err, IntakeError::EmptyValue { field } if field == RecordField::City));
        assert_eq!(session.entry(RecordField::City).current_value(), Some("Austin"));
    }

    #[test]
    fn completeness_requires_every_field() {
        let session = filled_session();
        assert!(session.is_complete());
        assert!(session.missing_fields().is_empty());

        let record = complete_record();
        for skipped in RecordField::ALL {
            let mut session = CollectionSession::new();
            for field in RecordField::ALL.into_iter().filter(|f| *f != skipped) {
                session.record_value(field, record.get(field)).unwrap();
            }
            assert!(!session.is_complete(), "{skipped} missing but complete");
            assert_eq!(session.missing_fields(), vec![skipped]);
        }
    }

    #[test]
    fn to_record_projects_tracked_values() {
        let session = filled_session();
        let record = session.to_record().expect("complete");
        assert_eq!(record, complete_record());
    }

    #[test]
    fn to_record_fails_while_incomplete() {
        let mut session = CollectionSession::new();
        session.record_value(RecordField::FirstName, "John").unwrap();

        let err = session.to_record().expect_err("incomplete");
        match err {
            IntakeError::IncompleteRecord { missing } => {
                assert_eq!(missing.len(), 12);
                assert!(!missing.contains(&RecordField::FirstName));
            }
            other => panic!("expected IncompleteRecord, got {other:?}"),
        }
    }

    #[test]
    fn summary_reconfirmation_behaves_like_mid_conversation_repeat() {
        let mut session = filled_session();
        let mut corrected = complete_record();
        corrected.personal.email = "new@example.com".into();

        let signals = session.record_all(&corrected).unwrap();
        assert_eq!(signals.len(), 13);
        for (field, signal) in signals {
            if field == RecordField::Email {
                assert_eq!(
                    signal,
                    DuplicateSignal::Changed {
                        old_value: "john@example.com".into(),
                        new_value: "new@example.com".into(),
                    }
                );
            } else {
                assert_eq!(signal, DuplicateSignal::Unchanged, "{field}");
            }
        }
    }

    #[test]
    fn record_all_skips_blank_fields_and_keeps_stored_values() {
        let mut session = filled_session();
        let mut partial = complete_record();
        partial.personal.ssn = "   ".into();
        partial.address.city = String::new();

        let signals = session.record_all(&partial).unwrap();
        assert_eq!(signals.len(), 11);
        assert!(signals
            .iter()
            .all(|(field, _)| *field != RecordField::Ssn && *field != RecordField::City));

        assert_eq!(session.entry(RecordField::Ssn).current_value(), Some("123-45-6789"));
        assert_eq!(session.entry(RecordField::City).current_value(), Some("Austin"));
        assert!(session.is_complete());

        let mut fresh = CollectionSession::new();
        fresh.record_all(&partial).unwrap();
        assert_eq!(
            fresh.missing_fields(),
            vec![RecordField::Ssn, RecordField::City]
        );
    }

    #[test]
    fn revert_restores_previous_value_once() {
        let mut session = CollectionSession::new();
        session.record_value(RecordField::Phone, "555-1234").unwrap();
        session.record_value(RecordField::Phone, "555-9999").unwrap();

        let restored = session.revert_change(RecordField::Phone).unwrap();
        assert_eq!(restored, "555-1234");
        assert_eq!(session.entry(RecordField::Phone).current_value(), Some("555-1234"));

        let err = session
            .revert_change(RecordField::Phone)
            .expect_err("nothing left to revert");
        assert!(matches!(err, IntakeError::NothingToRevert { .. }));
    }

    #[test]
    fn closed_session_rejects_updates() {
        let mut session = filled_session();
        session.begin_submission().unwrap();
        session.finish_submission(true);
        assert_eq!(session.state(), SessionState::Submitted);

        let err = session
            .record_value(RecordField::City, "Dallas")
            .expect_err("closed");
        assert!(matches!(err, IntakeError::SessionClosed(id) if id == session.id()));

        let mut abandoned = CollectionSession::new();
        abandoned.abandon().unwrap();
        assert!(abandoned.record_value(RecordField::City, "Dallas").is_err());
        assert!(abandoned.abandon().is_err());
    }

    #[test]
    fn only_one_submission_can_be_in_flight() {
        let mut session = filled_session();
        let record = session.begin_submission().unwrap();
        assert_eq!(record, complete_record());
        assert_eq!(session.state(), SessionState::Submitting);

        let id = session.id();
        assert!(matches!(
            session.begin_submission(),
            Err(IntakeError::SubmissionInProgress(got)) if got == id
        ));
        assert!(matches!(
            session.record_value(RecordField::City, "Dallas"),
            Err(IntakeError::SubmissionInProgress(_))
        ));
        assert!(matches!(
            session.revert_change(RecordField::City),
            Err(IntakeError::SubmissionInProgress(_))
        ));
        assert!(matches!(session.abandon(), Err(IntakeError::SubmissionInProgress(_))));
        assert_eq!(session.entry(RecordField::City).current_value(), Some("Austin"));
    }

    #[test]
    fn failed_submission_reopens_session() {
        let mut session = filled_session();
        session.begin_submission().unwrap();
        session.finish_submission(false);
        assert_eq!(session.state(), SessionState::Collecting);

        assert_eq!(
            session.record_value(RecordField::City, "Dallas").unwrap(),
            DuplicateSignal::Changed {
                old_value: "Austin".into(),
                new_value: "Dallas".into(),
            }
        );
        assert!(session.begin_submission().is_ok());
    }

    #[test]
    fn incomplete_session_does_not_start_submitting() {
        let mut session = CollectionSession::new();
        assert!(matches!(
            session.begin_submission(),
            Err(IntakeError::IncompleteRecord { .. })
        ));
        assert_eq!(session.state(), SessionState::Collecting);

        session.finish_submission(true);
        assert_eq!(session.state(), SessionState::Collecting);
    }

    #[test]
    fn signal_serialises_with_tag() {
        let value = serde_json::to_value(DuplicateSignal::Changed {
            old_value: "a".into(),
            new_value: "b".into(),
        })
        .unwrap();
        assert_eq!(value["signal"], "changed");
        assert_eq!(value["old_value"], "a");
        assert_eq!(value["new_value"], "b");
    }
}
