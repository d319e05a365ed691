use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::model::ProjectContent;
use crate::settings::Settings;
use crate::store;

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 200;
const NO_MATCH: &str = "None";

/// A single-prompt text completion.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client (OpenAI wire format).
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(settings: &Settings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout() * 6)
            .build()?;
        Ok(OpenAiClient {
            client,
            endpoint: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl Completion for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        let resp: Value = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("completion response had no content: {}", resp))
    }
}

/// What one completion call decided.
#[derive(Debug, Clone, PartialEq)]
pub enum PrizeOutcome {
    Matched(String),
    NoMatch,
    Failed,
}

impl PrizeOutcome {
    /// On-disk value: the prize text, or `null` for both no-match and failure.
    pub fn into_field(self) -> Option<String> {
        match self {
            PrizeOutcome::Matched(p) => Some(p),
            PrizeOutcome::NoMatch | PrizeOutcome::Failed => None,
        }
    }
}

pub fn build_prompt(project_text: &str, prizes: &[String]) -> String {
    let list = prizes
        .iter()
        .map(|p| format!("- {}", p))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Given this project description:\n\"{}\"\n\nAnd these prizes:\n{}\n\n\
         Which prize (if any) does this project best qualify for? Return ONLY the exact prize text \
         that matches best, or \"{}\" if no prizes match well.\n\
         Consider the project's features and goals when matching to prize criteria.\n",
        project_text, list, NO_MATCH
    )
}

/// Interpret a completion. An answer naming one of `prizes` (allowing for
/// quotes or a trailing period the model added) records that prize exactly;
/// anything else is kept as the trimmed answer.
pub fn parse_answer(answer: &str, prizes: &[String]) -> PrizeOutcome {
    let raw = answer.trim();
    let unquoted = raw
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    if unquoted.is_empty() || unquoted.trim_end_matches('.').eq_ignore_ascii_case(NO_MATCH) {
        return PrizeOutcome::NoMatch;
    }

    [raw, unquoted, unquoted.trim_end_matches('.')]
        .iter()
        .find_map(|candidate| prizes.iter().find(|p| p.as_str() == *candidate))
        .map(|p| PrizeOutcome::Matched(p.clone()))
        .unwrap_or_else(|| PrizeOutcome::Matched(raw.to_string()))
}

pub async fn match_one<C: Completion + ?Sized>(
    client: &C,
    project: &ProjectContent,
    prizes: &[String],
) -> PrizeOutcome {
    let text = format!("{}. {}", project.title, project.text);
    match client.complete(&build_prompt(&text, prizes)).await {
        Ok(answer) => parse_answer(&answer, prizes),
        Err(e) => {
            warn!("Completion failed for {}: {:#}", project.title, e);
            PrizeOutcome::Failed
        }
    }
}

pub struct MatchStats {
    pub matched: usize,
    pub no_match: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Match every project in turn, rewriting `path` with the whole collection
/// after each one so an interruption loses at most the project in flight.
pub async fn match_all<C: Completion + ?Sized>(
    client: &C,
    path: &Path,
    projects: &mut [ProjectContent],
    prizes: &[String],
    delay: Duration,
    resume: bool,
) -> Result<MatchStats> {
    let mut stats = MatchStats {
        matched: 0,
        no_match: 0,
        failed: 0,
        skipped: 0,
    };
    let total = projects.len();

    for i in 0..total {
        if resume && projects[i].is_matched() {
            stats.skipped += 1;
            continue;
        }
        info!("Processing project {}/{}: {}", i + 1, total, projects[i].title);

        let outcome = match_one(client, &projects[i], prizes).await;
        match &outcome {
            PrizeOutcome::Matched(p) => {
                info!("Matched prize: {}", p);
                stats.matched += 1;
            }
            PrizeOutcome::NoMatch => {
                info!("No prize fits");
                stats.no_match += 1;
            }
            PrizeOutcome::Failed => stats.failed += 1,
        }
        projects[i].matched_prize = Some(outcome.into_field());

        store::write_json(path, &*projects)?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn project(title: &str) -> ProjectContent {
        ProjectContent {
            title: title.to_string(),
            link: format!("https://devpost.com/software/{}", title.to_lowercase()),
            text: format!("{} does things.", title),
            matched_prize: None,
        }
    }

    fn prizes() -> Vec<String> {
        vec!["Best Mental Health Hack".into(), "Best Climate Tech".into()]
    }

    /// Replays canned answers; `Err` entries simulate API failures. Before
    /// each call it records how many records on disk are already matched.
    struct Scripted {
        answers: Mutex<Vec<Result<String, String>>>,
        path: std::path::PathBuf,
        on_disk: Mutex<Vec<(usize, usize)>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(path: &Path, answers: Vec<Result<&str, &str>>) -> Self {
            Scripted {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .rev()
                        .map(|a| a.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                path: path.to_path_buf(),
                on_disk: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completion for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if self.path.exists() {
                let raw: Vec<Value> = store::read_json(&self.path)?;
                let matched = raw.iter().filter(|r| r.get("matched_prize").is_some()).count();
                self.on_disk.lock().unwrap().push((matched, raw.len() - matched));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.answers.lock().unwrap().pop() {
                Some(Ok(a)) => Ok(a),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Err(anyhow!("no scripted answer")),
            }
        }
    }

    #[tokio::test]
    async fn persists_after_every_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects_data.json");
        let mut projects = vec![project("Alpha"), project("Beta"), project("Gamma"), project("Delta")];
        store::write_json(&path, &projects).unwrap();

        let client = Scripted::new(
            &path,
            vec![Ok("Best Climate Tech"), Ok("None"), Err("503"), Ok("\"Best Mental Health Hack\"")],
        );
        let stats = match_all(&client, &path, &mut projects, &prizes(), Duration::ZERO, false)
            .await
            .unwrap();

        // before project k runs, exactly k records on disk carry a result
        assert_eq!(
            *client.on_disk.lock().unwrap(),
            vec![(0, 4), (1, 3), (2, 2), (3, 1)]
        );

        let back: Vec<ProjectContent> = store::read_json(&path).unwrap();
        assert!(back.iter().all(|p| p.is_matched()));
        assert_eq!(back[0].matched_prize, Some(Some("Best Climate Tech".into())));
        assert_eq!(back[1].matched_prize, Some(None));
        assert_eq!(back[2].matched_prize, Some(None));
        assert_eq!(back[3].matched_prize, Some(Some("Best Mental Health Hack".into())));

        assert_eq!(stats.matched, 2);
        assert_eq!(stats.no_match, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn resume_skips_visited_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects_data.json");
        let mut done = project("Alpha");
        done.matched_prize = Some(Some("Best Climate Tech".into()));
        let mut projects = vec![done, project("Beta")];

        let client = Scripted::new(&path, vec![Ok("None")]);
        let stats = match_all(&client, &path, &mut projects, &prizes(), Duration::ZERO, true)
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
        assert_eq!(projects[0].matched_prize, Some(Some("Best Climate Tech".into())));
        assert_eq!(projects[1].matched_prize, Some(None));
    }

    #[tokio::test]
    async fn prompt_carries_title_text_and_prizes() {
        let dir = tempfile::tempdir().unwrap();
        let client = Scripted::new(&dir.path().join("unused.json"), vec![Ok("None")]);
        match_one(&client, &project("Alpha"), &prizes()).await;

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"Alpha. Alpha does things.\""));
        assert!(prompts[0].contains("- Best Mental Health Hack\n- Best Climate Tech"));
    }

    #[test]
    fn answers() {
        let prizes = prizes();
        assert_eq!(parse_answer("None", &prizes), PrizeOutcome::NoMatch);
        assert_eq!(parse_answer(" none. ", &prizes), PrizeOutcome::NoMatch);
        assert_eq!(parse_answer("", &prizes), PrizeOutcome::NoMatch);
        assert_eq!(parse_answer("\"\"", &prizes), PrizeOutcome::NoMatch);
        assert_eq!(
            parse_answer("\"Best Climate Tech\"", &prizes),
            PrizeOutcome::Matched("Best Climate Tech".into())
        );
        assert_eq!(
            parse_answer("Best Climate Tech.", &prizes),
            PrizeOutcome::Matched("Best Climate Tech".into())
        );
    }

    #[test]
    fn prize_names_ending_in_a_period_are_kept_verbatim() {
        let prizes = vec!["Most Useful Hack by Acme Inc.".to_string()];
        assert_eq!(
            parse_answer("Most Useful Hack by Acme Inc.", &prizes),
            PrizeOutcome::Matched("Most Useful Hack by Acme Inc.".into())
        );
        assert_eq!(
            parse_answer("\"Most Useful Hack by Acme Inc.\"", &prizes),
            PrizeOutcome::Matched("Most Useful Hack by Acme Inc.".into())
        );
        // not a listed prize: recorded as answered
        assert_eq!(
            parse_answer("Something else entirely.", &prizes),
            PrizeOutcome::Matched("Something else entirely.".into())
        );
    }

    #[test]
    fn no_match_and_failure_share_the_null_field() {
        assert_eq!(PrizeOutcome::NoMatch.into_field(), None);
        assert_eq!(PrizeOutcome::Failed.into_field(), None);
        assert_eq!(PrizeOutcome::Matched("x".into()).into_field(), Some("x".into()));
    }
}
