// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient and payload validation.
//!
//! Pure functions run before a notification is queued and again inside the
//! delivery worker. A validation failure is permanent: the same input fails
//! the same way on every attempt, so nothing here is ever retried.

use uuid::Uuid;

use crate::error::HeraldError;
use crate::types::{NewNotification, NotificationPayload};

/// Maximum SMS text length accepted at ingestion (concatenated-segment cap).
const MAX_SMS_LEN: usize = 1600;

/// Validate a single recipient identifier against the strict UUID format.
pub fn validate_recipient(recipient: &str) -> Result<Uuid, HeraldError> {
    Uuid::parse_str(recipient).map_err(|_| {
        HeraldError::Validation(format!(
            "Invalid UUID format for recipient `{recipient}`"
        ))
    })
}

/// Validate every recipient in a list. Fails on the first malformed entry.
pub fn validate_recipients(recipients: &[String]) -> Result<Vec<Uuid>, HeraldError> {
    if recipients.is_empty() {
        return Err(HeraldError::Validation(
            "notification has no recipients".into(),
        ));
    }
    recipients
        .iter()
        .map(|r| validate_recipient(r))
        .collect()
}

/// Validate the shape of a notification before it is queued.
///
/// Serde has already rejected unknown payload kinds by the time this runs;
/// this checks the semantic constraints serde cannot express.
pub fn validate_notification(new: &NewNotification) -> Result<(), HeraldError> {
    validate_recipients(&new.recipients)?;

    if new.channels.is_empty() {
        return Err(HeraldError::Validation(
            "notification targets no channels".into(),
        ));
    }

    if new.workflow_key.trim().is_empty() {
        return Err(HeraldError::Validation(
            "notification has an empty workflow key".into(),
        ));
    }

    match &new.payload {
        NotificationPayload::Message { body, .. } if body.trim().is_empty() => Err(
            HeraldError::Validation("message payload has an empty body".into()),
        ),
        NotificationPayload::Email { subject, .. } if subject.trim().is_empty() => Err(
            HeraldError::Validation("email payload has an empty subject".into()),
        ),
        NotificationPayload::Sms { text } if text.len() > MAX_SMS_LEN => {
            Err(HeraldError::Validation(format!(
                "sms payload exceeds {MAX_SMS_LEN} characters ({})",
                text.len()
            )))
        }
        _ => Ok(()),
    }
}
