use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    ai::TextGenerator,
    error::ApiError,
    portfolios::{
        dto::UpdatePortfolioRequest,
        repo::{Portfolio, Project},
    },
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

const BIO_SYSTEM_PROMPT: &str = "You are an expert portfolio builder. Generate professional, \
    engaging portfolio content based on the user's information. Focus on highlighting \
    achievements, skills, and experience in a compelling way.";

const PROJECT_SYSTEM_PROMPT: &str =
    "You are a technical writer specializing in project descriptions for developer portfolios.";

/// Zero, negative or oversized limits fall back into (0, 100].
pub fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(MAX_LIMIT)
    }
}

/// Merge the provided fields into the stored portfolio. A present list
/// replaces the stored list wholesale; absent fields stay untouched.
pub fn apply_update(portfolio: &mut Portfolio, req: UpdatePortfolioRequest) {
    if let Some(v) = req.name {
        portfolio.name = v;
    }
    if let Some(v) = req.title {
        portfolio.title = v;
    }
    if let Some(v) = req.bio {
        portfolio.bio = v;
    }
    if let Some(v) = req.email {
        portfolio.email = v;
    }
    if let Some(v) = req.phone {
        portfolio.phone = v;
    }
    if let Some(v) = req.location {
        portfolio.location = v;
    }
    if let Some(v) = req.website {
        portfolio.website = v;
    }
    if let Some(v) = req.linkedin {
        portfolio.linkedin = v;
    }
    if let Some(v) = req.github {
        portfolio.github = v;
    }
    if let Some(v) = req.experience {
        portfolio.experience.0 = v;
    }
    if let Some(v) = req.education {
        portfolio.education.0 = v;
    }
    if let Some(v) = req.projects {
        portfolio.projects.0 = v;
    }
    if let Some(v) = req.skills {
        portfolio.skills = v;
    }
    if let Some(v) = req.template {
        portfolio.template = v;
    }
    if let Some(v) = req.is_public {
        portfolio.is_public = v;
    }
}

fn build_profile_prompt(portfolio: &Portfolio, context: Option<&Value>) -> String {
    let mut info = serde_json::Map::new();
    info.insert("name".into(), json!(portfolio.name));
    info.insert("title".into(), json!(portfolio.title));
    info.insert("bio".into(), json!(portfolio.bio));
    info.insert("experience".into(), json!(portfolio.experience.0));
    info.insert("education".into(), json!(portfolio.education.0));
    info.insert("projects".into(), json!(portfolio.projects.0));
    info.insert("skills".into(), json!(portfolio.skills));
    if let Some(Value::Object(extra)) = context {
        for (key, value) in extra {
            info.insert(key.clone(), value.clone());
        }
    }

    let mut prompt =
        String::from("Generate enhanced portfolio content based on the following information:\n\n");
    for (key, value) in &info {
        prompt.push_str(&format!("{key}: {value}\n"));
    }
    prompt.push_str(
        "\nPlease enhance this information to create compelling portfolio content that \
         highlights the person's strengths, achievements, and potential. Focus on professional \
         language and quantifiable achievements where possible.",
    );
    prompt
}

fn build_project_prompt(project: &Project) -> String {
    format!(
        "Generate a professional project description for a project named '{}' using \
         technologies: {}. Make it engaging and highlight the technical challenges and solutions.",
        project.name,
        project.tech_stack.join(", ")
    )
}

/// Rewrite the requested fields of `portfolio` in place using the text
/// generator. An empty field list means bio. A bio generation failure aborts
/// the whole call; a per-project failure only skips that project.
pub async fn enhance_portfolio(
    ai: &dyn TextGenerator,
    portfolio: &mut Portfolio,
    fields: &[String],
    context: Option<&Value>,
) -> Result<(), ApiError> {
    if fields.is_empty() || fields.iter().any(|f| f == "bio") {
        let prompt = build_profile_prompt(portfolio, context);
        let bio = ai
            .generate(BIO_SYSTEM_PROMPT, &prompt, 1000, 0.7)
            .await
            .map_err(ApiError::ExternalService)?;
        portfolio.bio = bio;
        info!(portfolio_id = %portfolio.id, "bio enhanced");
    }

    if fields.iter().any(|f| f == "projects") {
        for project in portfolio.projects.0.iter_mut() {
            if project.name.is_empty() {
                continue;
            }
            let prompt = build_project_prompt(project);
            match ai.generate(PROJECT_SYSTEM_PROMPT, &prompt, 300, 0.6).await {
                Ok(description) => project.description = description,
                Err(e) => {
                    warn!(
                        error = %e,
                        project = %project.name,
                        "project enhancement failed, keeping existing description"
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use sqlx::types::Json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn project(name: &str, description: &str) -> Project {
        Project {
            name: name.into(),
            description: description.into(),
            tech_stack: vec!["rust".into(), "postgres".into()],
            link: String::new(),
            github_link: String::new(),
            image_url: String::new(),
            start_date: OffsetDateTime::now_utc(),
            end_date: None,
            featured: false,
        }
    }

    fn sample_portfolio() -> Portfolio {
        let now = OffsetDateTime::now_utc();
        Portfolio {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Ada Lovelace".into(),
            title: "Systems Engineer".into(),
            bio: "original bio".into(),
            email: "a@x.com".into(),
            phone: String::new(),
            location: "London".into(),
            website: String::new(),
            linkedin: String::new(),
            github: String::new(),
            experience: Json(vec![]),
            education: Json(vec![]),
            projects: Json(vec![project("alpha", "old alpha"), project("beta", "old beta")]),
            skills: vec!["rust".into(), "sql".into()],
            template: "classic".into(),
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Fails whenever the user prompt mentions any of the given markers.
    struct FailingOn(&'static [&'static str]);

    #[async_trait]
    impl TextGenerator for FailingOn {
        async fn generate(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> anyhow::Result<String> {
            if self.0.iter().any(|marker| user_prompt.contains(marker)) {
                anyhow::bail!("generation refused");
            }
            Ok("fresh description".to_string())
        }
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(-1), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(0), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(1), 1);
        assert_eq!(clamp_limit(100), 100);
        assert_eq!(clamp_limit(500), MAX_LIMIT);
    }

    #[test]
    fn patch_replaces_only_provided_fields() {
        let mut portfolio = sample_portfolio();
        apply_update(
            &mut portfolio,
            UpdatePortfolioRequest {
                bio: Some("x".into()),
                ..Default::default()
            },
        );
        assert_eq!(portfolio.bio, "x");
        assert_eq!(portfolio.name, "Ada Lovelace");
        assert_eq!(portfolio.title, "Systems Engineer");
        assert_eq!(portfolio.skills, vec!["rust", "sql"]);
        assert_eq!(portfolio.projects.0.len(), 2);
    }

    #[test]
    fn patch_replaces_collections_wholesale() {
        let mut portfolio = sample_portfolio();
        apply_update(
            &mut portfolio,
            UpdatePortfolioRequest {
                skills: Some(vec!["a".into(), "b".into()]),
                ..Default::default()
            },
        );
        assert_eq!(portfolio.skills, vec!["a", "b"]);
    }

    #[test]
    fn patch_can_flip_visibility() {
        let mut portfolio = sample_portfolio();
        apply_update(
            &mut portfolio,
            UpdatePortfolioRequest {
                is_public: Some(true),
                ..Default::default()
            },
        );
        assert!(portfolio.is_public);
        assert_eq!(portfolio.bio, "original bio");
    }

    #[tokio::test]
    async fn empty_fields_enhance_bio_wholesale() {
        let mut portfolio = sample_portfolio();
        enhance_portfolio(&FixedGenerator("a better bio"), &mut portfolio, &[], None)
            .await
            .expect("enhance");
        assert_eq!(portfolio.bio, "a better bio");
        assert_eq!(portfolio.projects.0[0].description, "old alpha");
    }

    #[tokio::test]
    async fn bio_failure_aborts_enhancement() {
        let mut portfolio = sample_portfolio();
        let err = enhance_portfolio(
            &FailingOn(&["Ada Lovelace"]),
            &mut portfolio,
            &["bio".to_string()],
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::ExternalService(_)));
        assert_eq!(portfolio.bio, "original bio");
    }

    #[tokio::test]
    async fn project_failure_skips_that_project_only() {
        let mut portfolio = sample_portfolio();
        enhance_portfolio(
            &FailingOn(&["alpha"]),
            &mut portfolio,
            &["projects".to_string()],
            None,
        )
        .await
        .expect("per-project failures are swallowed");
        assert_eq!(portfolio.projects.0[0].description, "old alpha");
        assert_eq!(portfolio.projects.0[1].description, "fresh description");
        assert_eq!(portfolio.bio, "original bio");
    }

    #[tokio::test]
    async fn unnamed_projects_are_skipped() {
        let mut portfolio = sample_portfolio();
        portfolio.projects.0[0].name = String::new();
        enhance_portfolio(
            &FixedGenerator("fresh"),
            &mut portfolio,
            &["projects".to_string()],
            None,
        )
        .await
        .expect("enhance");
        assert_eq!(portfolio.projects.0[0].description, "old alpha");
        assert_eq!(portfolio.projects.0[1].description, "fresh");
    }

    #[test]
    fn profile_prompt_merges_caller_context() {
        let portfolio = sample_portfolio();
        let context = json!({"tone": "concise", "audience": "recruiters"});
        let prompt = build_profile_prompt(&portfolio, Some(&context));
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("tone"));
        assert!(prompt.contains("concise"));
        assert!(prompt.contains("recruiters"));
    }
}
