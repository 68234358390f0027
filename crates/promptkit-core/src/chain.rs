//! Chain executor: sequencing of dependent sub-prompts.
//!
//! A chain is a list of [`ChainStep`]s executed in ascending `order`. Each
//! step renders its own sub-template against a context that starts as a copy
//! of the caller's initial values and accumulates every earlier step's output
//! under that step's `output_variable`.
//!
//! Execution is strictly sequential: step *n+1* never starts before step
//! *n*'s executor call resolves. The first executor error halts the chain;
//! the result keeps every step that completed so the caller can see how far
//! it got. Nothing is retried or rolled back.
//!
//! [`validate_chain`] is advisory. [`execute_chain`] does not call it;
//! [`execute_validated_chain`] does.

use crate::types::{ChainStep, VariableContext};
use crate::variables::render_template;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

const FALLBACK_ERROR: &str = "Chain execution failed";

/// The text-generation collaborator: turns a rendered prompt into generated text.
///
/// This is the engine's only I/O seam. Retries, authentication, provider
/// selection, and cancellation all belong to the implementation; an
/// implementation that wants to abort a running chain returns an error.
pub trait PromptExecutor: Send + Sync {
    /// Sends `prompt` to the provider and returns its raw output.
    fn execute(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
}

impl<E: PromptExecutor> PromptExecutor for &E {
    fn execute(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send {
        (**self).execute(prompt)
    }
}

impl<E: PromptExecutor> PromptExecutor for Arc<E> {
    fn execute(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send {
        (**self).execute(prompt)
    }
}

/// Adapts an async closure into a [`PromptExecutor`].
///
/// # Examples
///
/// ```
/// use promptkit_core::chain::{FnExecutor, PromptExecutor};
///
/// let upper = FnExecutor::new(|prompt: String| async move { Ok(prompt.to_uppercase()) });
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// assert_eq!(rt.block_on(upper.execute("hi")).unwrap(), "HI");
/// ```
#[derive(Clone)]
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnExecutor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor").finish_non_exhaustive()
    }
}

impl<F, Fut> PromptExecutor for FnExecutor<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    fn execute(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send {
        (self.f)(prompt.to_string())
    }
}

/// Per-invocation chain state.
///
/// `Pending → Running(0) → … → Running(n-1) → Completed`, or
/// `Running(i) → Failed(i)` when step `i` (0-based, in execution order) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Running(usize),
    Completed,
    Failed(usize),
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Pending => write!(f, "pending"),
            ChainState::Running(i) => write!(f, "running({i})"),
            ChainState::Completed => write!(f, "completed"),
            ChainState::Failed(i) => write!(f, "failed({i})"),
        }
    }
}

/// Outcome of a chain dependency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    /// Fully rendered prompt sent to the executor.
    pub prompt: String,
    /// Raw executor output.
    pub output: String,
    pub output_variable: String,
}

/// Result of executing a whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResult {
    pub success: bool,
    /// Completed steps, in execution order.
    pub steps: Vec<StepResult>,
    /// Last completed step's output on success; empty on failure or for an empty chain.
    pub final_output: String,
    /// Context as it stood when the chain finished or failed.
    pub context: VariableContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainResult {
    fn failed(steps: Vec<StepResult>, context: VariableContext, error: String) -> Self {
        Self {
            success: false,
            steps,
            final_output: String::new(),
            context,
            error: Some(error),
        }
    }
}

fn sorted_by_order(steps: &[ChainStep]) -> Vec<&ChainStep> {
    let mut ordered: Vec<&ChainStep> = steps.iter().collect();
    ordered.sort_by_key(|step| step.order);
    ordered
}

/// Checks that every step's inputs are produced by a step with a smaller `order`.
///
/// Steps may be passed in any order. Each unmet input yields one error naming
/// the step and the variable.
pub fn validate_chain(steps: &[ChainStep]) -> ChainValidation {
    validate_chain_with_context(steps, std::iter::empty::<String>())
}

/// Like [`validate_chain`], with `initial_keys` treated as already defined.
pub fn validate_chain_with_context<I>(steps: &[ChainStep], initial_keys: I) -> ChainValidation
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut defined: HashSet<String> = initial_keys.into_iter().map(Into::into).collect();
    let mut errors = Vec::new();

    let ordered = sorted_by_order(steps);
    let mut index = 0;
    while index < ordered.len() {
        // Steps sharing an order value do not see each other's outputs.
        let order = ordered[index].order;
        let group_end = ordered[index..]
            .iter()
            .position(|step| step.order != order)
            .map_or(ordered.len(), |offset| index + offset);
        let group = &ordered[index..group_end];

        for step in group {
            for input in &step.input_variables {
                if !defined.contains(input) {
                    errors.push(format!(
                        "Step \"{}\": Input variable \"{}\" is not defined by any previous step",
                        step.name, input
                    ));
                }
            }
        }

        for step in group {
            if !step.output_variable.is_empty() {
                defined.insert(step.output_variable.clone());
            }
        }

        index = group_end;
    }

    ChainValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Renders a step's sub-template against the current context.
///
/// Unresolved placeholders are left intact.
pub fn build_step_prompt(step: &ChainStep, context: &VariableContext) -> String {
    render_template(&step.prompt, context)
}

/// Builds the step prompt, runs it through `executor`, and packages the result.
///
/// # Errors
///
/// Propagates the executor's error unchanged.
pub async fn execute_step<E: PromptExecutor>(
    step: &ChainStep,
    context: &VariableContext,
    executor: &E,
) -> anyhow::Result<StepResult> {
    let prompt = build_step_prompt(step, context);
    let output = executor.execute(&prompt).await?;

    Ok(StepResult {
        step_id: step.id.clone(),
        step_name: step.name.clone(),
        prompt,
        output,
        output_variable: step.output_variable.clone(),
    })
}

/// Executes `steps` in ascending `order`, feeding outputs forward.
///
/// The caller's `initial_context` is never mutated. Dependencies are not
/// validated; a step whose inputs are missing renders with its placeholders
/// unresolved.
#[tracing::instrument(skip_all, fields(steps = steps.len()))]
pub async fn execute_chain<E: PromptExecutor>(
    steps: &[ChainStep],
    initial_context: &VariableContext,
    executor: &E,
) -> ChainResult {
    let mut context = initial_context.clone();
    let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());
    let mut state = ChainState::Pending;
    tracing::debug!(%state, "chain created");

    for (index, step) in sorted_by_order(steps).into_iter().enumerate() {
        state = ChainState::Running(index);
        tracing::debug!(%state, step_id = %step.id, order = step.order, "executing step");

        match execute_step(step, &context, executor).await {
            Ok(result) => {
                if !step.output_variable.is_empty() {
                    context.insert(step.output_variable.clone(), result.output.clone());
                }
                results.push(result);
            }
            Err(e) => {
                state = ChainState::Failed(index);
                let message = format!("{e:#}");
                let message = if message.trim().is_empty() {
                    FALLBACK_ERROR.to_string()
                } else {
                    message
                };
                tracing::warn!(%state, step_id = %step.id, error = %message, "chain step failed");
                return ChainResult::failed(results, context, message);
            }
        }
    }

    state = ChainState::Completed;
    tracing::debug!(%state, completed = results.len(), "chain finished");

    let final_output = results
        .last()
        .map(|result| result.output.clone())
        .unwrap_or_default();

    ChainResult {
        success: true,
        steps: results,
        final_output,
        context,
        error: None,
    }
}

/// Validates the chain against the initial context first, and executes it only when valid.
///
/// An invalid chain yields a failed [`ChainResult`] with no steps and all
/// validation errors joined by `"; "`; the executor is never called.
pub async fn execute_validated_chain<E: PromptExecutor>(
    steps: &[ChainStep],
    initial_context: &VariableContext,
    executor: &E,
) -> ChainResult {
    let validation = validate_chain_with_context(steps, initial_context.keys().cloned());
    if !validation.is_valid {
        tracing::warn!(errors = validation.errors.len(), "refusing to execute invalid chain");
        return ChainResult::failed(
            Vec::new(),
            initial_context.clone(),
            validation.errors.join("; "),
        );
    }

    execute_chain(steps, initial_context, executor).await
}

/// Turns a list of sub-prompts into a linear chain.
///
/// Step *i* (1-indexed) has `order = i`, writes `step{i}Output`, and reads
/// `step{i-1}Output` when `i > 1`.
///
/// # Examples
///
/// ```
/// use promptkit_core::chain::{create_simple_chain, validate_chain};
///
/// let steps = create_simple_chain(&["Outline {topic}", "Expand: {step1Output}"]);
/// assert_eq!(steps[1].input_variables, vec!["step1Output"]);
/// assert!(validate_chain(&steps).is_valid);
/// ```
pub fn create_simple_chain<S: AsRef<str>>(prompts: &[S]) -> Vec<ChainStep> {
    prompts
        .iter()
        .enumerate()
        .map(|(index, prompt)| {
            let n = index + 1;
            ChainStep {
                id: format!("step-{n}"),
                order: n as i64,
                name: format!("Step {n}"),
                prompt: prompt.as_ref().to_string(),
                output_variable: format!("step{n}Output"),
                input_variables: if n > 1 {
                    vec![format!("step{}Output", n - 1)]
                } else {
                    Vec::new()
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn step(order: i64, output: &str, inputs: &[&str], prompt: &str) -> ChainStep {
        ChainStep {
            id: format!("s{order}"),
            order,
            name: format!("Step {order}"),
            prompt: prompt.to_string(),
            output_variable: output.to_string(),
            input_variables: inputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Records prompts and answers with `"<n>:<prompt>"`; fails on the configured call.
    #[derive(Default)]
    struct ScriptedExecutor {
        prompts: Mutex<Vec<String>>,
        fail_on: Option<usize>,
        fail_message: &'static str,
    }

    impl PromptExecutor for ScriptedExecutor {
        async fn execute(&self, prompt: &str) -> anyhow::Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            let call = prompts.len();
            if self.fail_on == Some(call) {
                return Err(anyhow::anyhow!("{}", self.fail_message));
            }
            Ok(format!("{call}:{prompt}"))
        }
    }

    #[test]
    fn test_validate_chain_in_order() {
        let steps = vec![step(1, "a", &[], "x"), step(2, "b", &["a"], "{a}")];
        let validation = validate_chain(&steps);
        assert!(validation.is_valid);
        assert!(validation.errors.is_empty());
    }

    #[test]
    fn test_validate_chain_reversed_order_fails() {
        let steps = vec![step(2, "a", &[], "x"), step(1, "b", &["a"], "{a}")];
        let validation = validate_chain(&steps);
        assert!(!validation.is_valid);
        assert_eq!(
            validation.errors,
            vec!["Step \"Step 1\": Input variable \"a\" is not defined by any previous step"]
        );
    }

    #[test]
    fn test_validate_chain_ignores_array_position() {
        let steps = vec![step(3, "c", &["b"], ""), step(1, "a", &[], ""), step(2, "b", &["a"], "")];
        assert!(validate_chain(&steps).is_valid);
    }

    #[test]
    fn test_validate_chain_equal_order_is_not_earlier() {
        let steps = vec![step(1, "a", &[], ""), step(1, "b", &["a"], "")];
        let validation = validate_chain(&steps);
        assert_eq!(validation.errors.len(), 1);
    }

    #[test]
    fn test_validate_chain_with_initial_context() {
        let steps = vec![step(1, "summary", &["article"], "Summarize {article}")];
        assert!(!validate_chain(&steps).is_valid);
        assert!(validate_chain_with_context(&steps, ["article"]).is_valid);
    }

    #[test]
    fn test_build_step_prompt_keeps_unresolved() {
        let mut context = VariableContext::new();
        context.insert("a".to_string(), "alpha".to_string());
        let prompt = build_step_prompt(&step(1, "x", &[], "{a} then {b}"), &context);
        assert_eq!(prompt, "alpha then {b}");
    }

    #[test]
    fn test_create_simple_chain() {
        let steps = create_simple_chain(&["A", "B", "C"]);
        assert_eq!(steps.len(), 3);

        for (i, step) in steps.iter().enumerate() {
            let n = i + 1;
            assert_eq!(step.order, n as i64);
            assert_eq!(step.id, format!("step-{n}"));
            assert_eq!(step.output_variable, format!("step{n}Output"));
            if n == 1 {
                assert!(step.input_variables.is_empty());
            } else {
                assert_eq!(step.input_variables, vec![format!("step{}Output", n - 1)]);
            }
        }
        assert_eq!(steps[2].prompt, "C");
        assert!(create_simple_chain::<&str>(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_execute_chain_feeds_outputs_forward() {
        let steps = vec![
            step(2, "b", &["a"], "Refine: {a}"),
            step(1, "a", &[], "Draft about {topic}"),
        ];
        let mut initial = VariableContext::new();
        initial.insert("topic".to_string(), "rust".to_string());

        let executor = ScriptedExecutor::default();
        let result = execute_chain(&steps, &initial, &executor).await;

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].prompt, "Draft about rust");
        assert_eq!(result.steps[1].prompt, "Refine: 1:Draft about rust");
        assert_eq!(result.final_output, result.steps[1].output);
        assert_eq!(result.context["a"], "1:Draft about rust");
        assert_eq!(result.context["b"], result.final_output);

        // Caller's map is untouched.
        assert_eq!(initial.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_chain_stops_at_first_failure() {
        let steps = create_simple_chain(&["one", "two {step1Output}", "three {step2Output}"]);
        let executor = ScriptedExecutor {
            fail_on: Some(2),
            fail_message: "provider unavailable",
            ..Default::default()
        };

        let result = execute_chain(&steps, &VariableContext::new(), &executor).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.final_output, "");
        assert_eq!(result.error.as_deref(), Some("provider unavailable"));
        assert_eq!(result.context["step1Output"], "1:one");
        assert!(!result.context.contains_key("step2Output"));
        assert_eq!(executor.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_execute_chain_uses_fallback_message() {
        let steps = create_simple_chain(&["only"]);
        let executor = ScriptedExecutor {
            fail_on: Some(1),
            fail_message: "",
            ..Default::default()
        };

        let result = execute_chain(&steps, &VariableContext::new(), &executor).await;
        assert_eq!(result.error.as_deref(), Some(FALLBACK_ERROR));
    }

    #[tokio::test]
    async fn test_execute_chain_keeps_error_causes() {
        use anyhow::Context;

        let executor = FnExecutor::new(|_prompt: String| async move {
            Err::<String, _>(anyhow::anyhow!("connection refused"))
                .context("failed to reach provider")
        });
        let steps = create_simple_chain(&["only"]);

        let result = execute_chain(&steps, &VariableContext::new(), &executor).await;

        assert_eq!(
            result.error.as_deref(),
            Some("failed to reach provider: connection refused")
        );
    }

    #[tokio::test]
    async fn test_execute_empty_chain() {
        let executor = ScriptedExecutor::default();
        let result = execute_chain(&[], &VariableContext::new(), &executor).await;
        assert!(result.success);
        assert!(result.steps.is_empty());
        assert_eq!(result.final_output, "");
    }

    #[tokio::test]
    async fn test_step_without_output_variable_is_not_stored() {
        let steps = vec![step(1, "", &[], "fire and forget")];
        let executor = ScriptedExecutor::default();
        let result = execute_chain(&steps, &VariableContext::new(), &executor).await;

        assert!(result.success);
        assert!(result.context.is_empty());
        assert_eq!(result.final_output, "1:fire and forget");
    }

    #[tokio::test]
    async fn test_execute_validated_chain_skips_invalid() {
        let steps = vec![step(1, "b", &["a"], "{a}")];
        let executor = ScriptedExecutor::default();

        let result = execute_validated_chain(&steps, &VariableContext::new(), &executor).await;

        assert!(!result.success);
        assert!(result.steps.is_empty());
        assert!(result.error.unwrap().contains("\"a\""));
        assert!(executor.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fn_executor_and_shared_executor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let executor = Arc::new(FnExecutor::new(move |prompt: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(prompt.len().to_string())
            }
        }));

        let steps = create_simple_chain(&["abc", "{step1Output}"]);
        let result = execute_chain(&steps, &VariableContext::new(), &executor).await;

        assert!(result.success);
        assert_eq!(result.final_output, "1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_chain_state_display() {
        assert_eq!(ChainState::Pending.to_string(), "pending");
        assert_eq!(ChainState::Running(2).to_string(), "running(2)");
        assert_eq!(ChainState::Failed(0).to_string(), "failed(0)");
    }
}
