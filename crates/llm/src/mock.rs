//! Scripted Provider
//!
//! In-process [`ModelProvider`] driven by a closure. Used by tests and
//! offline runs; every call is counted per model and its prompt recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::provider::ModelProvider;
use crate::types::{Completion, LlmResult};

type Handler = dyn Fn(&str, &str) -> LlmResult<Completion> + Send + Sync;

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub model: String,
    pub prompt: String,
}

/// Provider whose answers come from a handler `(model, prompt) -> result`.
///
/// Clones share the handler and the call history.
#[derive(Clone)]
pub struct ScriptedProvider {
    name: String,
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<ScriptedCall>>>,
}

impl ScriptedProvider {
    /// Create a provider from a handler
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> LlmResult<Completion> + Send + Sync + 'static,
    {
        Self {
            name: "scripted".to_string(),
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that answers every prompt with the same text
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_, _| Ok(Completion::new(text.clone(), 10, 10)))
    }

    /// Override the provider name reported in usage records
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ScriptedCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of calls across all models
    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    /// Number of calls routed to `model`
    pub fn calls_for(&self, model: &str) -> usize {
        self.calls().iter().filter(|c| c.model == model).count()
    }

    /// Call counts keyed by model
    pub fn call_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for call in self.calls() {
            *counts.entry(call.model).or_insert(0) += 1;
        }
        counts
    }
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("name", &self.name)
            .field("calls", &self.total_calls())
            .finish()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, model: &str, prompt: &str, _temperature: f32) -> LlmResult<Completion> {
        let call = ScriptedCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
        };
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
        (self.handler)(model, prompt)
    }
}
