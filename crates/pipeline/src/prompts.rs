//! Prompt Library
//!
//! The six prompts used by the pipeline. Structured prompts describe the
//! expected JSON shape in prose; the invoker appends the exact JSON Schema.

use idea_impact_core::PromptTemplate;

/// Proposal used as the worked example in the extraction prompt
pub const EXTRACT_EXAMPLE_PROPOSAL: &str = "Build a fleet of electric driverless vehicles for our city and replace trains to provide efficient transport for remote areas";

/// Statements the worked example decomposes into
pub const EXTRACT_EXAMPLE_STATEMENTS: [&str; 3] = [
    "Build a fleet of electric driverless vehicles",
    "Replace existing trains",
    "Provide efficient transport for remote areas",
];

const EXTRACT: &str = r#"You are an analyst breaking a proposal into atomic impact statements.

Each statement must be short, self-contained and unambiguous, and describe exactly one concrete action or effect the proposal commits to. Do not add consequences that the proposal does not state.

Example
Proposal: {{example_proposal}}
Answer: {{example_answer}}

Proposal: {{proposal}}

Return a JSON object with a "statements" array of strings."#;

const EXPAND: &str = r#"You are assessing the sustainability consequences of a proposal.

Proposal: {{proposal}}

Impact statement: {{statement}}

List the direct and indirect downstream impacts of this one statement on the environment, society and the economy. Each impact is one sentence and may be positive or negative.

Return a JSON object with an "impacts" array of strings."#;

const CATEGORIZE: &str = r#"Group the following downstream impacts into a small number of sustainability categories (for example "Emissions", "Biodiversity", "Employment"). Choose category names that fit the impacts. Every impact belongs to exactly one category; copy impact text verbatim.

Impacts:
{{impacts}}

Return a JSON object with a "categories" array. Each element has a "name" and an "impacts" array of strings."#;

const RESEARCH: &str = r#"You are a sustainability researcher.

Proposal: {{proposal}}

Category: {{category}}

Impacts in this category:
{{statements}}

Summarise what published evidence and comparable projects say about these impacts. Note magnitudes, uncertainties and conditions under which the impacts would be larger or smaller. Answer in plain prose."#;

const EVALUATE: &str = r#"Score the net sustainability impact of one category of a proposal.

Category: {{category}}

Impacts in this category:
{{statements}}

Research notes:
{{research}}

Give a concise "researchSummary" of the evidence and a "score" between -1.0 (severely harmful) and 1.0 (strongly beneficial), where 0.0 is neutral.

Return a JSON object with "researchSummary" and "score"."#;

const SUMMARIZE: &str = r#"Write the final recommendation for a proposal.

Proposal: {{proposal}}

Category scores (-1.0 to 1.0):
{{scores}}

Research findings:
{{findings}}

The acceptance rule has already been applied: total positive score {{positive_total}}, total negative score {{negative_total}}. Verdict: {{verdict}}.

Explain the verdict in a few paragraphs. If the proposal is not acceptable as-is, suggest concrete changes that would reduce its negative impacts. Do not change the verdict."#;

/// Decompose a proposal into impact statements
pub fn extract() -> PromptTemplate {
    PromptTemplate::new("extract", EXTRACT)
}

/// Downstream impacts of one statement
pub fn expand() -> PromptTemplate {
    PromptTemplate::new("expand", EXPAND)
}

/// Group impacts into categories
pub fn categorize() -> PromptTemplate {
    PromptTemplate::new("categorize", CATEGORIZE)
}

/// Free-text research for one category
pub fn research() -> PromptTemplate {
    PromptTemplate::new("research", RESEARCH)
}

/// Structured score for one category
pub fn evaluate() -> PromptTemplate {
    PromptTemplate::new("evaluate", EVALUATE)
}

/// Final narrative
pub fn summarize() -> PromptTemplate {
    PromptTemplate::new("summarize", SUMMARIZE)
}

/// The worked example's answer as the model is expected to write it
pub fn extract_example_answer() -> String {
    serde_json::json!({ "statements": EXTRACT_EXAMPLE_STATEMENTS }).to_string()
}

/// Bullet list, one item per line
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| format!("- {}", s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
