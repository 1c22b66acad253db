use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A contact owned by exactly one business, collected through an NFC tag
/// scan or manual entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_given: bool,
    pub consent_date: Option<NaiveDateTime>,
    /// NFC card id or free-text origin such as "manual_entry"
    pub source: Option<String>,
    pub status: String,
    pub last_contact: Option<NaiveDateTime>,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Customer {
    /// SMS delivery needs a non-empty phone number. Consent is deliberately
    /// not part of the check; email is the consent-gated channel.
    pub fn sms_eligible(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Email delivery needs a non-empty address and explicit consent.
    pub fn email_eligible(&self) -> bool {
        self.consent_given && self.email.as_deref().is_some_and(|e| !e.is_empty())
    }
}
