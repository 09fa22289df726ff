use reqwest::Client;
use serde_json::json;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 1024;

/// Single entry point for LLM calls. Everything AI-facing goes through
/// `complete`; callers only see plain text or an error string.
pub struct OpenAiService;

impl OpenAiService {
    fn api_key() -> Result<String, String> {
        crate::config::Config::openai_api_key().ok_or_else(|| "OpenAI is not configured".to_string())
    }

    pub async fn complete(system_prompt: &str, user_prompt: &str) -> Result<String, String> {
        let key = Self::api_key()?;
        let client = Client::new();

        let res = client
            .post(OPENAI_API_URL)
            .bearer_auth(&key)
            .json(&json!({
                "model": MODEL,
                "max_tokens": MAX_TOKENS,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt }
                ]
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("OpenAI returned {}: {}", status, body));
        }

        let body: serde_json::Value = res.json().await.map_err(|e| e.to_string())?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "OpenAI returned empty content".to_string())
    }

    pub async fn generate_cover_letter(
        job_title: &str,
        company: &str,
        highlights: &str,
    ) -> Result<String, String> {
        let system = "You are a career coach writing concise, specific cover letters. \
                      Keep it under 350 words, professional tone, no placeholders.";
        let user = format!(
            "Write a cover letter for the role of {} at {}. \
             Candidate highlights:\n{}",
            job_title, company, highlights
        );
        Self::complete(system, &user).await
    }

    pub async fn generate_cv_summary(highlights: &str) -> Result<String, String> {
        let system = "You are a CV writer. Produce a tight 3-4 sentence professional \
                      summary in the first person, no cliches.";
        Self::complete(system, highlights).await
    }
}
