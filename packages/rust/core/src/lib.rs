//! Pipeline orchestration for reviewforge.
//!
//! [`Orchestrator`] sequences discovery, the [`AnalysisFanOut`], synthesis,
//! and the [`RefinementLoop`]. Collaborator roles are plain async traits in
//! [`collaborators`]; [`llm`] provides OpenRouter-backed implementations.

pub mod collaborators;
pub mod fanout;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod refinement;

#[cfg(test)]
mod testing;

pub use collaborators::{Analyzer, CallContext, Collaborators, Discoverer, Reviser, Synthesizer};
pub use fanout::AnalysisFanOut;
pub use llm::{LlmCollaborators, OpenRouterClient};
pub use pipeline::{Orchestrator, ProgressReporter, ReviewOutcome, SilentProgress, run_pipeline};
pub use refinement::{LoopExit, RefinementLoop, RefinementOutcome};
