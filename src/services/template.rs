//! Message personalization: literal `{{name}}` / `{{email}}` / `{{phone}}`
//! substitution. The token format is user-facing (businesses type it into
//! message bodies) and must not change.

use crate::db::models::Customer;

/// Standard single-segment SMS length limit.
pub const SMS_MAX_CHARS: usize = 160;

/// Substitute the recipient's fields into a message template. Absent fields
/// become empty strings; unknown tokens pass through untouched. Pure, no
/// escaping, no recursive expansion.
pub fn render(template: &str, customer: &Customer) -> String {
    template
        .replace("{{name}}", &customer.name)
        .replace("{{email}}", customer.email.as_deref().unwrap_or(""))
        .replace("{{phone}}", customer.phone.as_deref().unwrap_or(""))
}

/// Personalize for SMS and enforce the 160-char limit: anything longer is
/// cut to 157 characters plus "...". Counts characters, not bytes, since
/// messages routinely carry å/ä/ö and emoji.
pub fn render_sms(template: &str, customer: &Customer) -> String {
    truncate_sms(render(template, customer))
}

pub fn truncate_sms(message: String) -> String {
    if message.chars().count() <= SMS_MAX_CHARS {
        return message;
    }
    let mut truncated: String = message.chars().take(SMS_MAX_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn customer(name: &str, email: Option<&str>, phone: Option<&str>) -> Customer {
        let now = Utc::now().naive_utc();
        Customer {
            id: 1,
            business_id: 1,
            name: name.to_string(),
            email: email.map(String::from),
            phone: phone.map(String::from),
            consent_given: true,
            consent_date: None,
            source: None,
            status: "active".to_string(),
            last_contact: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let c = customer("Anna", Some("anna@example.com"), Some("+46701234567"));
        let rendered = render("Hi {{name}}, mail {{email}}, tel {{phone}}", &c);
        assert_eq!(rendered, "Hi Anna, mail anna@example.com, tel +46701234567");
    }

    #[test]
    fn repeated_placeholders_all_replaced() {
        let c = customer("Anna", None, None);
        assert_eq!(render("{{name}} {{name}} {{name}}", &c), "Anna Anna Anna");
    }

    #[test]
    fn absent_fields_substitute_empty() {
        let c = customer("Anna", None, None);
        assert_eq!(render("[{{email}}][{{phone}}]", &c), "[][]");
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let c = customer("Anna", None, None);
        assert_eq!(render("Hi {{name}}, {{foo}}!", &c), "Hi Anna, {{foo}}!");
    }

    #[test]
    fn rendering_is_idempotent() {
        let c = customer("Anna", Some("a@b.se"), Some("123"));
        let once = render("Hi {{name}} ({{email}})", &c);
        let twice = render(&once, &c);
        assert_eq!(once, twice);
    }

    #[test]
    fn short_sms_untouched() {
        let msg = "x".repeat(160);
        assert_eq!(truncate_sms(msg.clone()), msg);
    }

    #[test]
    fn long_sms_truncated_to_exactly_160() {
        let msg = "x".repeat(200);
        let out = truncate_sms(msg);
        assert_eq!(out.chars().count(), 160);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().take(157).collect::<String>(), "x".repeat(157));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        // 200 chars of 'ö' is 400 bytes; the limit is per character.
        let msg = "ö".repeat(200);
        let out = truncate_sms(msg);
        assert_eq!(out.chars().count(), 160);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn render_sms_truncates_after_substitution() {
        let c = customer(&"n".repeat(180), None, None);
        let out = render_sms("Hi {{name}}!", &c);
        assert_eq!(out.chars().count(), 160);
    }
}
