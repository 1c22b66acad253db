//! Campaign delivery engine: resolves the recipient set, applies channel
//! eligibility, personalizes per recipient, fans out through the injected
//! provider and aggregates per-recipient outcomes.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::models::{Business, Campaign, CreateCampaignDelivery, Customer};
use crate::db::repository::{
    BusinessRepository, CampaignDeliveryRepository, CampaignRepository, CustomerRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::email::EmailProvider;
use crate::services::sms::{self, SmsProvider};
use crate::services::template;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsOptions {
    /// Explicit recipient ids; absent or empty means every customer of the
    /// tenant. Order and duplicates are preserved.
    pub customer_ids: Option<Vec<i64>>,
    /// Caller-supplied sender label, validated before any provider call.
    pub sms_from: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailOptions {
    pub customer_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntry {
    pub customer_id: i64,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// "sent" or "failed"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverySummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignSendReport {
    pub campaign: Campaign,
    pub results: Vec<DeliveryEntry>,
    pub summary: DeliverySummary,
}

/// The engine takes its providers by injection so tests can substitute
/// recording fakes; selection from configuration happens once at startup.
pub struct CampaignService {
    pool: SqlitePool,
    sms: Arc<dyn SmsProvider>,
    email: Arc<dyn EmailProvider>,
}

impl CampaignService {
    pub fn new(pool: SqlitePool, sms: Arc<dyn SmsProvider>, email: Arc<dyn EmailProvider>) -> Self {
        Self { pool, sms, email }
    }

    /// Fan a campaign out over SMS. Always answers with a full per-recipient
    /// report when the operation itself is well-formed; only structural
    /// problems (unknown campaign, no eligible recipients, bad sender label)
    /// surface as errors.
    pub async fn send_sms_campaign(
        &self,
        business_id: i64,
        campaign_id: i64,
        options: SendSmsOptions,
    ) -> AppResult<CampaignSendReport> {
        let campaign =
            CampaignRepository::find_by_id_for_business(&self.pool, campaign_id, business_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

        let business = BusinessRepository::find_by_id(&self.pool, business_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;

        // Explicit sender labels are rejected, not truncated; truncation is
        // reserved for labels derived from the business name.
        if let Some(from) = &options.sms_from {
            sms::validate_sender_label(from)?;
        }

        let recipients = self
            .resolve_recipients(business_id, options.customer_ids)
            .await?;

        let eligible: Vec<Customer> = recipients
            .into_iter()
            .filter(Customer::sms_eligible)
            .collect();

        tracing::info!(
            "Sending SMS campaign {} ({}) to {} customers",
            campaign.id,
            campaign.name,
            eligible.len()
        );

        if eligible.is_empty() {
            return Err(AppError::Validation(
                "No customers with phone numbers found".to_string(),
            ));
        }

        let sender = options
            .sms_from
            .or_else(|| business.sms_from_name.clone())
            .unwrap_or_else(|| sms::derive_sender_label(&business.name));

        let mut results = Vec::with_capacity(eligible.len());
        for customer in &eligible {
            let message = template::render_sms(&campaign.message, customer);
            let phone = customer.phone.as_deref().unwrap_or("");

            let outcome = self.sms.send_sms(phone, &message, Some(&sender)).await;
            results.push(
                self.record_attempt(&campaign, customer, outcome.success, outcome.message_id, outcome.error)
                    .await?,
            );
        }

        self.finish(campaign.id, results).await
    }

    /// Fan a campaign out over email. Eligibility requires both a non-empty
    /// address and consent; the subject falls back to a business-derived one.
    pub async fn send_email_campaign(
        &self,
        business_id: i64,
        campaign_id: i64,
        options: SendEmailOptions,
    ) -> AppResult<CampaignSendReport> {
        let campaign =
            CampaignRepository::find_by_id_for_business(&self.pool, campaign_id, business_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

        let business = BusinessRepository::find_by_id(&self.pool, business_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;

        let recipients = self
            .resolve_recipients(business_id, options.customer_ids)
            .await?;

        let eligible: Vec<Customer> = recipients
            .into_iter()
            .filter(Customer::email_eligible)
            .collect();

        tracing::info!(
            "Sending email campaign {} ({}) to {} customers",
            campaign.id,
            campaign.name,
            eligible.len()
        );

        if eligible.is_empty() {
            return Err(AppError::Validation(
                "No eligible customers to send to (need consent and email address)".to_string(),
            ));
        }

        let subject_template = campaign
            .subject
            .clone()
            .unwrap_or_else(|| format!("Message from {}", business.name));

        let mut results = Vec::with_capacity(eligible.len());
        for customer in &eligible {
            let message = template::render(&campaign.message, customer);
            let subject = template::render(&subject_template, customer);
            let address = customer.email.as_deref().unwrap_or("");

            let outcome = self
                .email
                .send_email(address, &subject, &message, Some(&business.name))
                .await;
            results.push(
                self.record_attempt(&campaign, customer, outcome.success, outcome.message_id, outcome.error)
                    .await?,
            );
        }

        self.finish(campaign.id, results).await
    }

    /// One-off welcome SMS after a customer connects. Gated on phone and
    /// consent; returns whether the message went out.
    pub async fn send_welcome_sms(&self, customer: &Customer, business: &Business) -> bool {
        if !customer.sms_eligible() || !customer.consent_given {
            return false;
        }

        let message = format!(
            "Hi {}! Welcome to {}. Thanks for connecting with us! Reply STOP to opt out.",
            customer.name, business.name
        );
        let sender = business
            .sms_from_name
            .clone()
            .unwrap_or_else(|| sms::derive_sender_label(&business.name));

        let outcome = self
            .sms
            .send_sms(
                customer.phone.as_deref().unwrap_or(""),
                &template::truncate_sms(message),
                Some(&sender),
            )
            .await;
        outcome.success
    }

    /// One-off welcome email; gated on address and consent.
    pub async fn send_welcome_email(&self, customer: &Customer, business: &Business) -> bool {
        if !customer.email_eligible() {
            return false;
        }

        let body = format!(
            "Hi {},\n\nThank you for connecting with us! We're excited to keep you updated with our latest offers and news.\n\nBest regards,\n{} Team",
            customer.name, business.name
        );

        let outcome = self
            .email
            .send_email(
                customer.email.as_deref().unwrap_or(""),
                &format!("Welcome to {}!", business.name),
                &body,
                Some(&business.name),
            )
            .await;
        outcome.success
    }

    /// Resolve the recipient set. An explicit id list is loaded id by id so
    /// caller ordering and duplicates survive; ids belonging to another
    /// tenant are silently dropped rather than erroring, so a probing caller
    /// learns nothing about other tenants' data.
    async fn resolve_recipients(
        &self,
        business_id: i64,
        customer_ids: Option<Vec<i64>>,
    ) -> AppResult<Vec<Customer>> {
        match customer_ids {
            Some(ids) if !ids.is_empty() => {
                let mut customers = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(customer) =
                        CustomerRepository::find_by_id_for_business(&self.pool, id, business_id)
                            .await?
                    {
                        customers.push(customer);
                    }
                }
                Ok(customers)
            }
            _ => CustomerRepository::find_by_business(&self.pool, business_id).await,
        }
    }

    /// Record one attempt: delivery audit row, last-contact touch on success,
    /// report entry. Individual failures never abort the surrounding loop.
    async fn record_attempt(
        &self,
        campaign: &Campaign,
        customer: &Customer,
        success: bool,
        message_id: Option<String>,
        error: Option<String>,
    ) -> AppResult<DeliveryEntry> {
        let status = if success { "sent" } else { "failed" };

        CampaignDeliveryRepository::create(
            &self.pool,
            CreateCampaignDelivery {
                campaign_id: campaign.id,
                customer_id: customer.id,
                status: status.to_string(),
                error_message: error.clone(),
            },
        )
        .await?;

        if success {
            CustomerRepository::touch_last_contact(
                &self.pool,
                customer.id,
                Utc::now().naive_utc(),
            )
            .await?;
        } else {
            tracing::warn!(
                "Delivery to customer {} failed: {}",
                customer.id,
                error.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(DeliveryEntry {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            customer_email: customer.email.clone(),
            status: status.to_string(),
            message_id,
            error,
        })
    }

    /// Terminal bookkeeping: the campaign becomes `sent` after the loop no
    /// matter how many individual attempts failed ("sent" records that an
    /// attempt was made, not that delivery succeeded).
    async fn finish(
        &self,
        campaign_id: i64,
        results: Vec<DeliveryEntry>,
    ) -> AppResult<CampaignSendReport> {
        let campaign =
            CampaignRepository::mark_sent(&self.pool, campaign_id, Utc::now().naive_utc()).await?;

        let sent = results.iter().filter(|r| r.status == "sent").count();
        let summary = DeliverySummary {
            total: results.len(),
            sent,
            failed: results.len() - sent,
        };

        Ok(CampaignSendReport {
            campaign,
            results,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db::repository::{CreateBusiness, CreateCampaign, CreateCustomer};
    use crate::services::sms::{BulkItemOutcome, BulkOutcome, SendOutcome, SmsMessage};

    // ------------------------------------------------------------------
    // Recording fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingSmsProvider {
        calls: AtomicUsize,
        fail_numbers: Vec<String>,
        sent_messages: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSmsProvider {
        fn failing_for(numbers: &[&str]) -> Self {
            Self {
                fail_numbers: numbers.iter().map(|n| n.to_string()).collect(),
                ..Self::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SmsProvider for RecordingSmsProvider {
        async fn send_sms(&self, to: &str, message: &str, _from: Option<&str>) -> SendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent_messages
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            if self.fail_numbers.iter().any(|n| n == to) {
                SendOutcome::failed("gateway rejected recipient")
            } else {
                SendOutcome::ok(format!("test-{to}"))
            }
        }

        async fn send_bulk(&self, messages: &[SmsMessage], from: Option<&str>) -> BulkOutcome {
            let mut results = Vec::new();
            for msg in messages {
                let outcome = self.send_sms(&msg.to, &msg.message, from).await;
                results.push(BulkItemOutcome {
                    to: msg.to.clone(),
                    outcome,
                });
            }
            BulkOutcome {
                success: results.iter().all(|r| r.outcome.success),
                results,
            }
        }
    }

    #[derive(Default)]
    struct RecordingEmailProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailProvider for RecordingEmailProvider {
        async fn send_email(
            &self,
            to: &str,
            _subject: &str,
            _body: &str,
            _business_name: Option<&str>,
        ) -> SendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SendOutcome::ok(format!("test-{to}"))
        }

        async fn send_bulk(&self, messages: &[crate::services::email::EmailMessage]) -> BulkOutcome {
            let mut results = Vec::new();
            for msg in messages {
                let outcome = self
                    .send_email(&msg.to, &msg.subject, &msg.body, msg.business_name.as_deref())
                    .await;
                results.push(BulkItemOutcome {
                    to: msg.to.clone(),
                    outcome,
                });
            }
            BulkOutcome {
                success: true,
                results,
            }
        }
    }

    // ------------------------------------------------------------------
    // Test fixtures
    // ------------------------------------------------------------------

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        pool
    }

    async fn seed_business(pool: &SqlitePool, name: &str, email: &str) -> Business {
        BusinessRepository::create(
            pool,
            CreateBusiness {
                name: name.to_string(),
                email: email.to_string(),
                phone: None,
                password: "hash".to_string(),
                sms_from_name: None,
            },
        )
        .await
        .unwrap()
    }

    async fn seed_customer(
        pool: &SqlitePool,
        business_id: i64,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        consent: bool,
    ) -> Customer {
        CustomerRepository::create(
            pool,
            CreateCustomer {
                business_id,
                name: name.to_string(),
                email: email.map(String::from),
                phone: phone.map(String::from),
                consent_given: consent,
                consent_date: None,
                source: Some("manual_entry".to_string()),
                tags: Vec::new(),
            },
        )
        .await
        .unwrap()
    }

    async fn seed_campaign(
        pool: &SqlitePool,
        business_id: i64,
        campaign_type: &str,
        message: &str,
    ) -> Campaign {
        CampaignRepository::create(
            pool,
            CreateCampaign {
                business_id,
                name: "Spring offer".to_string(),
                campaign_type: campaign_type.to_string(),
                subject: None,
                message: message.to_string(),
                status: "draft".to_string(),
                target_audience: Vec::new(),
            },
        )
        .await
        .unwrap()
    }

    fn service(
        pool: SqlitePool,
        sms: Arc<RecordingSmsProvider>,
        email: Arc<RecordingEmailProvider>,
    ) -> CampaignService {
        CampaignService::new(pool, sms, email)
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn sms_campaign_full_success() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        for (name, phone) in [("Anna", "+461"), ("Bosse", "+462"), ("Cilla", "+463")] {
            seed_customer(&pool, business.id, name, None, Some(phone), false).await;
        }
        let campaign = seed_campaign(&pool, business.id, "sms", "Hi {{name}}!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let report = svc
            .send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.sent, 3);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.campaign.status, "sent");
        assert!(report.campaign.sent_at.is_some());

        let messages = sms.sent_messages.lock().unwrap();
        for name in ["Anna", "Bosse", "Cilla"] {
            assert!(messages
                .iter()
                .any(|(_, m)| m == &format!("Hi {name}!")));
        }
    }

    #[tokio::test]
    async fn sms_campaign_partial_failure_still_marks_sent() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        for (name, phone) in [("Anna", "+461"), ("Bosse", "+462"), ("Cilla", "+463")] {
            seed_customer(&pool, business.id, name, None, Some(phone), false).await;
        }
        let campaign = seed_campaign(&pool, business.id, "sms", "Hi {{name}}!").await;

        let sms = Arc::new(RecordingSmsProvider::failing_for(&["+462"]));
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let report = svc
            .send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.sent, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.sent + report.summary.failed, report.results.len());
        assert_eq!(report.campaign.status, "sent");

        let failed: Vec<_> = report
            .results
            .iter()
            .filter(|r| r.status == "failed")
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].customer_name, "Bosse");
        assert!(failed[0].error.is_some());
    }

    #[tokio::test]
    async fn sms_eligibility_ignores_consent_but_requires_phone() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        // No consent but has a phone: included. Phone missing: excluded.
        let with_phone =
            seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        seed_customer(&pool, business.id, "Bosse", Some("b@example.com"), None, true).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let report = svc
            .send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.results[0].customer_id, with_phone.id);
        assert_eq!(sms.call_count(), 1);
    }

    #[tokio::test]
    async fn email_requires_consent_and_address() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        // One with email but no consent, one with consent but no email.
        seed_customer(&pool, business.id, "Anna", Some("a@example.com"), None, false).await;
        seed_customer(&pool, business.id, "Bosse", None, Some("+462"), true).await;
        let campaign = seed_campaign(&pool, business.id, "email", "Hello {{name}}").await;

        let email = Arc::new(RecordingEmailProvider::default());
        let svc = service(pool.clone(), Arc::new(RecordingSmsProvider::default()), email.clone());

        let err = svc
            .send_email_campaign(business.id, campaign.id, SendEmailOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(email.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_eligible_recipients_issues_no_provider_calls() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        seed_customer(&pool, business.id, "Anna", Some("a@example.com"), None, true).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let err = svc
            .send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(sms.call_count(), 0);

        // The campaign never transitioned: the operation failed structurally.
        let unchanged = CampaignRepository::find_by_id_for_business(&pool, campaign.id, business.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.status, "draft");
    }

    #[tokio::test]
    async fn cross_tenant_ids_are_silently_excluded() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        let other = seed_business(&pool, "Other Shop", "other@example.com").await;
        let own = seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let foreign = seed_customer(&pool, other.id, "Eve", None, Some("+4699"), false).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let report = svc
            .send_sms_campaign(
                business.id,
                campaign.id,
                SendSmsOptions {
                    customer_ids: Some(vec![own.id, foreign.id]),
                    sms_from: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.summary.total, 1);
        assert!(report.results.iter().all(|r| r.customer_id == own.id));
        assert_eq!(sms.call_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_send_duplicate_messages() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        let customer = seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let report = svc
            .send_sms_campaign(
                business.id,
                campaign.id,
                SendSmsOptions {
                    customer_ids: Some(vec![customer.id, customer.id]),
                    sms_from: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.summary.total, 2);
        assert_eq!(sms.call_count(), 2);
    }

    #[tokio::test]
    async fn invalid_sender_label_rejected_before_any_call() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        let err = svc
            .send_sms_campaign(
                business.id,
                campaign.id,
                SendSmsOptions {
                    customer_ids: None,
                    sms_from: Some("Way Too Long Sender".to_string()),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(sms.call_count(), 0);
    }

    #[tokio::test]
    async fn campaign_of_another_tenant_is_not_found() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        let other = seed_business(&pool, "Other Shop", "other@example.com").await;
        let campaign = seed_campaign(&pool, other.id, "sms", "Hej!").await;

        let svc = service(
            pool.clone(),
            Arc::new(RecordingSmsProvider::default()),
            Arc::new(RecordingEmailProvider::default()),
        );

        let err = svc
            .send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delivery_rows_written_for_every_attempt() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        for (name, phone) in [("Anna", "+461"), ("Bosse", "+462")] {
            seed_customer(&pool, business.id, name, None, Some(phone), false).await;
        }
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej {{name}}").await;

        let sms = Arc::new(RecordingSmsProvider::failing_for(&["+462"]));
        let svc = service(pool.clone(), sms, Arc::new(RecordingEmailProvider::default()));

        svc.send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        let deliveries = CampaignDeliveryRepository::find_by_campaign(&pool, campaign.id)
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries.iter().filter(|d| d.status == "sent").count(), 1);
        assert_eq!(deliveries.iter().filter(|d| d.status == "failed").count(), 1);
        assert!(deliveries
            .iter()
            .find(|d| d.status == "failed")
            .unwrap()
            .error_message
            .is_some());
    }

    #[tokio::test]
    async fn delivery_status_upgrades_are_campaign_scoped() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let svc = service(
            pool.clone(),
            Arc::new(RecordingSmsProvider::default()),
            Arc::new(RecordingEmailProvider::default()),
        );
        svc.send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        let delivery = CampaignDeliveryRepository::find_by_campaign(&pool, campaign.id)
            .await
            .unwrap()
            .remove(0);

        let upgraded =
            CampaignDeliveryRepository::upgrade_status(&pool, delivery.id, campaign.id, "opened")
                .await
                .unwrap()
                .unwrap();
        assert_eq!(upgraded.status, "opened");
        assert!(upgraded.opened_at.is_some());

        // Wrong campaign id reads as absent, unknown statuses are rejected.
        let missing =
            CampaignDeliveryRepository::upgrade_status(&pool, delivery.id, campaign.id + 1, "opened")
                .await
                .unwrap();
        assert!(missing.is_none());
        assert!(
            CampaignDeliveryRepository::upgrade_status(&pool, delivery.id, campaign.id, "bounced")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn last_contact_touched_only_on_success() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        let ok = seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let bad = seed_customer(&pool, business.id, "Bosse", None, Some("+462"), false).await;
        let campaign = seed_campaign(&pool, business.id, "sms", "Hej!").await;

        let sms = Arc::new(RecordingSmsProvider::failing_for(&["+462"]));
        let svc = service(pool.clone(), sms, Arc::new(RecordingEmailProvider::default()));

        svc.send_sms_campaign(business.id, campaign.id, SendSmsOptions::default())
            .await
            .unwrap();

        let ok_after = CustomerRepository::find_by_id(&pool, ok.id).await.unwrap().unwrap();
        let bad_after = CustomerRepository::find_by_id(&pool, bad.id).await.unwrap().unwrap();
        assert!(ok_after.last_contact.is_some());
        assert!(bad_after.last_contact.is_none());
    }

    #[tokio::test]
    async fn email_campaign_personalizes_subject_and_counts() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        seed_customer(&pool, business.id, "Anna", Some("a@example.com"), None, true).await;
        seed_customer(&pool, business.id, "Bosse", Some("b@example.com"), None, true).await;
        let campaign = seed_campaign(&pool, business.id, "email", "Hello {{name}}").await;

        let email = Arc::new(RecordingEmailProvider::default());
        let svc = service(pool.clone(), Arc::new(RecordingSmsProvider::default()), email.clone());

        let report = svc
            .send_email_campaign(business.id, campaign.id, SendEmailOptions::default())
            .await
            .unwrap();

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.sent, 2);
        assert_eq!(email.calls.load(Ordering::SeqCst), 2);
        assert!(report.results.iter().all(|r| r.customer_email.is_some()));
    }

    #[tokio::test]
    async fn welcome_sms_gated_on_consent() {
        let pool = test_pool().await;
        let business = seed_business(&pool, "Cafe 21", "cafe@example.com").await;
        let no_consent =
            seed_customer(&pool, business.id, "Anna", None, Some("+461"), false).await;
        let consented = seed_customer(&pool, business.id, "Bosse", None, Some("+462"), true).await;

        let sms = Arc::new(RecordingSmsProvider::default());
        let svc = service(pool.clone(), sms.clone(), Arc::new(RecordingEmailProvider::default()));

        assert!(!svc.send_welcome_sms(&no_consent, &business).await);
        assert!(svc.send_welcome_sms(&consented, &business).await);
        assert_eq!(sms.call_count(), 1);
    }
}
