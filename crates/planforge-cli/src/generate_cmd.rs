//! `planforge generate`: one request, no HTTP server.

use anyhow::{Context, Result};

use planforge_core::PlanPipeline;
use planforge_core::plan::PlanRequest;

/// Run one description through the pipeline and print the envelope.
pub async fn run_generate(
    pipeline: &PlanPipeline,
    description: &str,
    strategy: Option<String>,
) -> Result<()> {
    let request = PlanRequest::new(description, strategy);
    let outcome = pipeline
        .run(&request)
        .await
        .context("plan generation failed")?;

    let states: Vec<String> = outcome.trace.iter().map(|s| s.to_string()).collect();
    tracing::info!(
        path = %states.join(" -> "),
        generation_calls = outcome.generation_calls,
        audit_calls = outcome.audit_calls,
        "generate: done"
    );

    let json = serde_json::to_string_pretty(&outcome.envelope)
        .context("failed to serialize plan")?;
    println!("{json}");
    Ok(())
}
