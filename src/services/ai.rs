//! AI campaign content: generate copy from a brief or enhance an existing
//! message through a chat-completion backend. Best-effort enrichment
//! upstream of delivery, never part of the delivery guarantee.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::OpenAiConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub business_name: String,
    #[serde(default)]
    pub business_type: Option<String>,
    /// sms, email or whatsapp
    pub campaign_type: String,
    /// promotion, welcome, retention, announcement, survey
    pub campaign_goal: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub product_service: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub key_message: Option<String>,
    #[serde(default)]
    pub call_to_action: Option<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRequest {
    pub original_message: String,
    pub campaign_type: String,
    /// tone, clarity, engagement, cta, personalization, length
    #[serde(default)]
    pub improvements: Vec<String>,
    pub business_name: String,
    #[serde(default)]
    pub target_audience: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGeneratedCampaign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
    pub suggestions: Vec<String>,
    pub word_count: usize,
    /// low, medium or high
    pub estimated_engagement: String,
}

// ============================================================================
// Language detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Swedish,
    English,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::Swedish => "Swedish",
            Language::English => "English",
        }
    }

    /// Instruction pinning the backend to the input language; switching the
    /// customer-facing language on enhancement is a correctness bug.
    fn instruction(&self) -> &'static str {
        match self {
            Language::Swedish => {
                "Du MÅSTE svara på svenska. Originalmeddelandet är på svenska och din \
                 förbättrade version MÅSTE också vara på svenska. Använd svenska ord, \
                 fraser och grammatik."
            }
            Language::English => {
                "You MUST respond in English. The original message is in English and your \
                 enhanced version MUST also be in English. Use English words, phrases, \
                 and grammar."
            }
        }
    }
}

const SWEDISH_WORDS: &[&str] = &[
    "och", "eller", "är", "det", "att", "för", "med", "på", "av", "till", "från", "som", "en",
    "ett", "den", "de", "vi", "du", "han", "hon", "här", "där", "när", "vad", "hur", "varför",
    "hej", "tack", "ja", "nej", "din", "nu", "vardag", "börja", "resa", "upplev", "våra",
];

const ENGLISH_WORDS: &[&str] = &[
    "and", "or", "is", "the", "to", "for", "with", "on", "of", "from", "as", "a", "an", "we",
    "you", "he", "she", "here", "there", "when", "what", "how", "why", "hello", "thank", "yes",
    "no", "your", "now", "start", "journey", "discover", "daily", "easier",
];

/// Lexical heuristic, not a full detector: Swedish characters win outright,
/// otherwise the larger common-word overlap decides.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| "åäöÅÄÖ".contains(c)) {
        return Language::Swedish;
    }

    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let swedish = words.iter().filter(|w| SWEDISH_WORDS.contains(w)).count();
    let english = words.iter().filter(|w| ENGLISH_WORDS.contains(w)).count();

    if swedish > english {
        Language::Swedish
    } else {
        Language::English
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug)]
pub struct AiCampaignService {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl AiCampaignService {
    /// Fails at construction when no API key is configured so the caller can
    /// surface "feature not configured" instead of a generic send failure.
    pub fn new(config: &OpenAiConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::NotConfigured(
                "OpenAI API key not configured. Please add your API key to use AI features."
                    .to_string(),
            )
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        })
    }

    pub async fn generate_campaign(
        &self,
        request: &GenerationRequest,
    ) -> AppResult<AiGeneratedCampaign> {
        let prompt = build_generation_prompt(request);
        let content = self
            .chat(
                Some(
                    "You are an expert marketing campaign writer specializing in multi-channel \
                     customer engagement. Create compelling, conversion-focused content that \
                     resonates with target audiences.",
                ),
                &prompt,
                0.7,
            )
            .await?;

        let parsed: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| AppError::Ai(format!("Malformed AI response: {e}")))?;

        let message = parsed
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(AiGeneratedCampaign {
            subject: parsed
                .get("subject")
                .and_then(|s| s.as_str())
                .map(String::from),
            word_count: message.split_whitespace().count(),
            suggestions: string_array(&parsed, "suggestions"),
            estimated_engagement: parsed
                .get("estimatedEngagement")
                .and_then(|e| e.as_str())
                .unwrap_or("medium")
                .to_string(),
            message,
        })
    }

    pub async fn enhance_campaign(
        &self,
        request: &EnhancementRequest,
    ) -> AppResult<AiGeneratedCampaign> {
        let prompt = build_enhancement_prompt(request);
        let content = self
            .chat(
                Some(
                    "You are an expert multilingual marketing copy editor. Analyze and improve \
                     marketing campaigns to maximize engagement and conversion rates. CRITICAL: \
                     Always respond in the SAME LANGUAGE as the input text. Detect the language \
                     of the original message and maintain it throughout your enhancement. Never \
                     change the language.",
                ),
                &prompt,
                0.6,
            )
            .await?;

        let parsed: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| AppError::Ai(format!("Malformed AI response: {e}")))?;

        let message = parsed
            .get("enhanced_message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(AiGeneratedCampaign {
            subject: parsed
                .get("subject")
                .and_then(|s| s.as_str())
                .map(String::from),
            word_count: message.split_whitespace().count(),
            suggestions: string_array(&parsed, "improvement_suggestions"),
            estimated_engagement: parsed
                .get("estimatedEngagement")
                .and_then(|e| e.as_str())
                .unwrap_or("medium")
                .to_string(),
            message,
        })
    }

    /// Produce `count` rewordings of a message for A/B exploration.
    pub async fn campaign_variations(
        &self,
        original_message: &str,
        count: usize,
    ) -> AppResult<Vec<String>> {
        let prompt = format!(
            "Create {count} variations of this marketing message:\n\"{original_message}\"\n\n\
             Each variation should:\n\
             1. Maintain the same core message and call-to-action\n\
             2. Use different wording and structure\n\
             3. Appeal to different psychological triggers (urgency, benefit, social proof)\n\
             4. Be roughly the same length\n\n\
             Respond with a JSON object: {{\"variations\": [\"variation1\", \"variation2\"]}}"
        );

        let content = self.chat(None, &prompt, 0.8).await?;
        let parsed: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| AppError::Ai(format!("Malformed AI response: {e}")))?;

        Ok(string_array(&parsed, "variations"))
    }

    async fn chat(
        &self,
        system: Option<&str>,
        user: &str,
        temperature: f64,
    ) -> AppResult<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "response_format": { "type": "json_object" },
                "temperature": temperature,
                "max_tokens": 1000,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Ai(format!("Backend answered {status}: {text}")));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(String::from)
            .ok_or_else(|| AppError::Ai("Backend response carried no content".to_string()))
    }
}

fn string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn build_generation_prompt(request: &GenerationRequest) -> String {
    let default_max = match request.campaign_type.as_str() {
        "sms" => 120,
        "email" => 500,
        _ => 300,
    };
    let max_length = request.max_length.unwrap_or(default_max);

    let mut prompt = format!(
        "Generate a {} marketing campaign with the following requirements:\n\n\
         Business: {} ({})\n\
         Campaign Goal: {}\n\
         Target Audience: {}\n\
         Product/Service: {}\n\
         Tone: {}\n\
         Key Message: {}\n\
         Call to Action: {}\n\
         Max Length: {} characters\n\n",
        request.campaign_type,
        request.business_name,
        request.business_type.as_deref().unwrap_or("business"),
        request.campaign_goal,
        request.target_audience.as_deref().unwrap_or("General customers"),
        request.product_service.as_deref().unwrap_or("Not specified"),
        request.tone.as_deref().unwrap_or("friendly"),
        request.key_message.as_deref().unwrap_or("Not specified"),
        request.call_to_action.as_deref().unwrap_or("Contact us"),
        max_length,
    );

    if request.campaign_type == "sms" {
        prompt.push_str(
            "SMS SPECIFIC REQUIREMENTS:\n\
             - MAXIMUM 120 characters including spaces and emojis\n\
             - Be punchy, direct and exciting - no filler words\n\
             - Include {{name}} for personalization\n\
             - Strong, clear call-to-action\n\
             - Add \"STOP to opt out\" only if space allows\n\n",
        );
    }

    if request.campaign_type == "email" {
        prompt.push_str("Include both a subject line and a message body.\n");
    }
    prompt.push_str(
        "Include a clear call-to-action, make it engaging and conversion-focused, and use \
         personalization placeholders like {{name}} where appropriate.\n\n\
         Respond in JSON format:\n\
         {\"subject\": \"Email subject line\", \"message\": \"Campaign message content\", \
         \"suggestions\": [\"tip1\", \"tip2\"], \"estimatedEngagement\": \"low|medium|high\"}",
    );

    prompt
}

fn build_enhancement_prompt(request: &EnhancementRequest) -> String {
    let language = detect_language(&request.original_message);
    let improvements = if request.improvements.is_empty() {
        "engagement, clarity".to_string()
    } else {
        request.improvements.join(", ")
    };

    let mut prompt = format!(
        "CRITICAL: {}\n\n\
         Enhance this {} marketing campaign:\n\n\
         Original Message: \"{}\"\n\
         Business: {}\n\
         Target Audience: {}\n\
         Focus Improvements: {}\n\
         Detected Language: {}\n\n\
         Please improve the campaign by focusing on: {}\n\
         IMPORTANT: Keep the enhanced message in the SAME LANGUAGE ({}) as the original.\n",
        language.instruction(),
        request.campaign_type,
        request.original_message,
        request.business_name,
        request.target_audience.as_deref().unwrap_or("General customers"),
        improvements,
        language.name(),
        improvements,
        language.name(),
    );

    if request.campaign_type == "sms" {
        prompt.push_str("Keep the enhanced version under 160 characters.\n");
    }
    if request.campaign_type == "email" {
        prompt.push_str("Provide both an enhanced subject and message if applicable.\n");
    }
    prompt.push_str(
        "\nRespond in JSON format:\n\
         {\"subject\": \"Enhanced subject line IN THE SAME LANGUAGE\", \
         \"enhanced_message\": \"Improved campaign message IN THE SAME LANGUAGE\", \
         \"improvement_suggestions\": [\"what was improved\", \"why it works better\"], \
         \"estimatedEngagement\": \"low|medium|high\"}",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swedish_characters_force_swedish() {
        assert_eq!(detect_language("Upplev våra erbjudanden"), Language::Swedish);
        assert_eq!(detect_language("Hör av dig så berättar vi mer"), Language::Swedish);
    }

    #[test]
    fn swedish_word_overlap_wins_without_special_chars() {
        assert_eq!(detect_language("hej vi har en present till du"), Language::Swedish);
    }

    #[test]
    fn english_detected() {
        assert_eq!(
            detect_language("Discover your exclusive discount now and start the journey"),
            Language::English
        );
    }

    #[test]
    fn empty_input_defaults_to_english() {
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn enhancement_prompt_pins_detected_language() {
        let request = EnhancementRequest {
            original_message: "Börja din resa med våra skräddarsydda erbjudanden".to_string(),
            campaign_type: "sms".to_string(),
            improvements: vec!["engagement".to_string()],
            business_name: "Cafe 21".to_string(),
            target_audience: None,
        };
        let prompt = build_enhancement_prompt(&request);
        assert!(prompt.contains("Detected Language: Swedish"));
        assert!(prompt.contains("under 160 characters"));
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = OpenAiConfig {
            api_key: None,
            api_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
        };
        let err = AiCampaignService::new(&config).unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }
}
