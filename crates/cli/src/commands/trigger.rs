//! `repobot trigger-issue`: run the issue task for an existing issue.

use std::path::PathBuf;
use std::sync::Arc;

use repobot_core::event::EventBus;
use repobot_core::host::RepoRef;

pub async fn run(
    repo: &str,
    number: u64,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = RepoRef::parse(repo)
        .ok_or_else(|| format!("Invalid repository '{repo}', expected owner/name"))?;
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let pipeline = repobot_gateway::build_pipeline(&config, Arc::new(EventBus::default()))?;
    println!("Running issue task for {repo}#{number}");

    let report = pipeline.run_issue(repo, number).await?;
    println!("   Outcome:    {}", report.outcome.as_str());
    println!("   Iterations: {}", report.iterations);
    if let Some(answer) = report.answer() {
        println!();
        println!("{answer}");
    }

    Ok(())
}
