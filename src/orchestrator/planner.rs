//! The `Planner` seam — decomposition and synthesis as an opaque call.
//!
//! Kept deliberately narrow: a production node wires a real
//! reasoning-graph-backed planner in here; [`StubPlanner`] is a
//! deterministic stand-in that makes the coordinator's plan -> route ->
//! execute -> aggregate control flow testable without one.

use async_trait::async_trait;

use crate::error::A2AResult;
use crate::types::{Message, Part};

use super::plan::Plan;

/// Produces a [`Plan`] from the initial user message, and later composes
/// a final answer from the completed steps' outputs.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Decompose `input` into a [`Plan`], given the skill tags currently
    /// advertised by registered peers.
    async fn plan(&self, input: &Message, available_skills: &[String]) -> A2AResult<Plan>;

    /// Compose the outer task's final output parts from each step's
    /// output, in plan order. `outputs[i]` corresponds to `plan.steps[i]`
    /// and is `None` for an omitted optional step that failed.
    async fn synthesize(&self, plan: &Plan, outputs: &[Option<Vec<Part>>]) -> A2AResult<Vec<Part>>;
}

/// Deterministic [`Planner`] for tests and demos.
///
/// Splits the input text on top-level " and " conjunctions and maps each
/// clause to a step targeting the first available skill tag matching a
/// keyword from a small fixed table (falling back to the first available
/// skill if nothing matches) — just enough structure to exercise fan-out
/// without any real reasoning.
#[derive(Debug, Default)]
pub struct StubPlanner;

impl StubPlanner {
    fn guess_skill<'a>(clause: &str, available_skills: &'a [String]) -> Option<&'a str> {
        let lower = clause.to_lowercase();
        available_skills
            .iter()
            .find(|skill| lower.contains(skill.to_lowercase().as_str()))
            .map(String::as_str)
            .or_else(|| available_skills.first().map(String::as_str))
    }

    fn extract_text(message: &Message) -> String {
        message
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(&self, input: &Message, available_skills: &[String]) -> A2AResult<Plan> {
        let text = Self::extract_text(input);
        if available_skills.is_empty() {
            return Ok(Plan::empty());
        }

        let clauses: Vec<&str> = text
            .split(" and ")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        let clauses = if clauses.is_empty() { vec![text.as_str()] } else { clauses };

        let steps = clauses
            .into_iter()
            .enumerate()
            .map(|(i, clause)| {
                let skill = Self::guess_skill(clause, available_skills).unwrap_or("default");
                super::plan::Step::new(format!("step-{i}"), clause.to_string(), skill)
            })
            .collect();

        Ok(Plan { steps })
    }

    async fn synthesize(&self, plan: &Plan, outputs: &[Option<Vec<Part>>]) -> A2AResult<Vec<Part>> {
        let mut parts = Vec::new();
        for (step, output) in plan.steps.iter().zip(outputs.iter()) {
            match output {
                Some(step_parts) => parts.extend(step_parts.iter().cloned()),
                None => parts.push(Part::text(format!(
                    "[omitted: step '{}' ({}) did not complete]",
                    step.step_id, step.description
                ))),
            }
        }
        if parts.is_empty() {
            parts.push(Part::text("no steps produced output"));
        }
        Ok(parts)
    }
}
