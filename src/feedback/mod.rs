//! Feedback orchestration: segment, evaluate, score, improve, render.

pub mod followup;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assessment::extract::{extract, ExtractError, Shape};
use crate::assessment::normalize::{normalize_items, validate_items};
use crate::assessment::render::{ImprovementSection, Report};
use crate::assessment::scoring::{self, RubricScore};
use crate::assessment::segment::{segment, word_count};
use crate::assessment::{Axis, EvaluationResult, ImprovementItem};
use crate::config::ModelSelection;
use crate::error::FeedbackError;
use crate::generation::TextGenerator;
use crate::prompts::{self, EVALUATION_TOKENS, IMPROVEMENT_TOKENS, REQUIREMENT_TOKENS};

pub const MISSING_TEXT: &str = "入力されたテキストがありません。";

/// Improvement requests get this many tries before the section degrades.
const IMPROVEMENT_ATTEMPTS: u32 = 2;

/// Workflow stages of one feedback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Segmenting,
    EvaluatingConcurrently,
    Scoring,
    ImprovingConcurrently,
    Rendering,
    Done,
    Failed,
}

/// Tracks and logs stage transitions for one request.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn start() -> Self {
        debug!("Feedback stage -> {:?}", Stage::Segmenting);
        Self {
            stage: Stage::Segmenting,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("Feedback stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackRequest {
    pub question: String,
    pub text: String,
    pub model_preference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackOutcome {
    /// Full rendered report.
    pub feedback: String,
    pub word_count: usize,
    /// Submission with paragraph marks and sentence ids.
    pub numbered_text: String,
    pub score: RubricScore,
}

/// Runs feedback and follow-up requests against a [`TextGenerator`].
pub struct FeedbackService {
    generator: Arc<dyn TextGenerator>,
    models: ModelSelection,
}

impl FeedbackService {
    pub fn new(generator: Arc<dyn TextGenerator>, models: ModelSelection) -> Self {
        Self { generator, models }
    }

    /// Produce the full report for one submission.
    ///
    /// Any unrecoverable failure ends the request with no partial report.
    /// Improvement sections that stay malformed after a retry degrade to a
    /// placeholder instead.
    pub async fn run(&self, request: &FeedbackRequest) -> Result<FeedbackOutcome, FeedbackError> {
        if request.text.trim().is_empty() {
            return Err(FeedbackError::InputMissing(MISSING_TEXT));
        }

        let mut progress = Progress::start();
        match self.run_stages(&mut progress, request).await {
            Ok(outcome) => {
                progress.advance(Stage::Done);
                info!(
                    "Feedback ready: {} words, score {}/20",
                    outcome.word_count, outcome.score.total
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!("Feedback failed during {:?}: {}", progress.stage, e);
                progress.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        progress: &mut Progress,
        request: &FeedbackRequest,
    ) -> Result<FeedbackOutcome, FeedbackError> {
        let model = self.models.resolve(request.model_preference.as_deref());
        let question = request.question.as_str();

        // ── Segmenting ──
        let words = word_count(&request.text);
        let segmentation = segment(&request.text);
        let numbered = segmentation.numbered_text();
        debug!(
            "Segmented {} words into {} sentences over {} paragraphs",
            words,
            segmentation.sentence_count(),
            segmentation.paragraph_count
        );

        // ── EvaluatingConcurrently ──
        progress.advance(Stage::EvaluatingConcurrently);
        let (expression, content) = tokio::try_join!(
            self.evaluate(Axis::Expression, question, &numbered, model),
            self.evaluate(Axis::Content, question, &numbered, model),
        )?;

        // ── Scoring ──
        progress.advance(Stage::Scoring);
        let score = scoring::score(&expression, &content);

        // ── ImprovingConcurrently ──
        progress.advance(Stage::ImprovingConcurrently);
        let (expression_items, content_items, requirement) = tokio::try_join!(
            self.improve(question, &numbered, &expression, model),
            self.improve(question, &numbered, &content, model),
            self.check_requirement(question, words, model),
        )?;

        // ── Rendering ──
        progress.advance(Stage::Rendering);
        let report = Report::build(
            score,
            &requirement,
            &numbered,
            (&expression, &expression_items),
            (&content, &content_items),
        );

        Ok(FeedbackOutcome {
            feedback: report.to_text(),
            word_count: words,
            numbered_text: numbered,
            score,
        })
    }

    async fn evaluate(
        &self,
        axis: Axis,
        question: &str,
        numbered: &str,
        model: &str,
    ) -> Result<EvaluationResult, FeedbackError> {
        let stage = Stage::EvaluatingConcurrently;
        let prompt = prompts::evaluation_prompt(axis, question, numbered);
        let text = self
            .generator
            .generate(&prompt, model, EVALUATION_TOKENS)
            .await
            .map_err(|source| FeedbackError::Generation { stage, source })?;
        let value = extract(&text, Shape::Evaluation).map_err(|source| FeedbackError::Extract {
            stage,
            label: axis.evaluation_label(),
            source,
        })?;
        Ok(EvaluationResult::from_value(axis, &value))
    }

    /// Improvement list for one axis. A malformed or ill-formed reply is
    /// retried once, then the section degrades. Generator failures and
    /// failure-sentinel replies are fatal.
    async fn improve(
        &self,
        question: &str,
        numbered: &str,
        evaluation: &EvaluationResult,
        model: &str,
    ) -> Result<ImprovementSection, FeedbackError> {
        let stage = Stage::ImprovingConcurrently;
        let axis = evaluation.axis;
        let prompt = prompts::improvement_prompt(question, numbered, evaluation);

        for attempt in 1..=IMPROVEMENT_ATTEMPTS {
            let text = self
                .generator
                .generate(&prompt, model, IMPROVEMENT_TOKENS)
                .await
                .map_err(|source| FeedbackError::Generation { stage, source })?;

            let value = match extract(&text, Shape::Improvements) {
                Ok(value) => value,
                Err(source @ ExtractError::UpstreamError(_)) => {
                    return Err(FeedbackError::Extract {
                        stage,
                        label: axis.improvement_label(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} attempt {} unusable ({:?}): {}",
                        axis.improvement_label(),
                        attempt,
                        e.kind(),
                        e
                    );
                    continue;
                }
            };

            let items = normalize_items(ImprovementItem::list_from_value(&value));
            match validate_items(&items, evaluation) {
                Ok(()) => return Ok(ImprovementSection::Items(items)),
                Err(e) => warn!(
                    "{} attempt {} failed validation ({:?}): {}",
                    axis.improvement_label(),
                    attempt,
                    e.kind(),
                    e
                ),
            }
        }

        warn!("{} degraded to placeholder", axis.improvement_label());
        Ok(ImprovementSection::Degraded)
    }

    async fn check_requirement(
        &self,
        question: &str,
        words: usize,
        model: &str,
    ) -> Result<String, FeedbackError> {
        let prompt = prompts::requirement_prompt(question, words);
        self.generator
            .generate(&prompt, model, REQUIREMENT_TOKENS)
            .await
            .map_err(|source| FeedbackError::Generation {
                stage: Stage::ImprovingConcurrently,
                source,
            })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::generation::{GenerationError, TextGenerator};

    /// Which prompt builder produced a prompt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Route {
        ExpressionEvaluation,
        ContentEvaluation,
        ExpressionImprovement,
        ContentImprovement,
        Requirement,
        FollowUp,
    }

    fn route_of(prompt: &str) -> Route {
        if prompt.contains("expression_improvements") {
            Route::ExpressionImprovement
        } else if prompt.contains("content_improvements") {
            Route::ContentImprovement
        } else if prompt.contains("・語数：") {
            Route::Requirement
        } else if prompt.contains("【質問】") {
            Route::FollowUp
        } else if prompt.contains(r#""type": "contents""#) {
            Route::ContentEvaluation
        } else {
            Route::ExpressionEvaluation
        }
    }

    /// Fake generator that answers by prompt kind. The last queued reply
    /// for a route repeats once the queue is down to one.
    #[derive(Default)]
    pub struct RoutedGenerator {
        replies: Mutex<HashMap<Route, VecDeque<Result<String, GenerationError>>>>,
        calls: Mutex<Vec<(Route, String)>>,
    }

    impl RoutedGenerator {
        pub fn reply(self, route: Route, reply: Result<&str, GenerationError>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(route)
                .or_default()
                .push_back(reply.map(str::to_string));
            self
        }

        /// Well-formed replies for every route of a clean submission.
        pub fn clean() -> Self {
            Self::default()
                .reply(
                    Route::ExpressionEvaluation,
                    Ok(r#"{"type":"expression","items":{"C-1":"o","C-2":"o"},"details":{"C-1_incorrect":0},"notes":[]}"#),
                )
                .reply(
                    Route::ContentEvaluation,
                    Ok(r#"{"type":"contents","items":{"D-1":"o","D-2":"o"},"details":{"D-2_leaps":0},"notes":[]}"#),
                )
                .reply(Route::ExpressionImprovement, Ok(r#"{"items":[]}"#))
                .reply(Route::ContentImprovement, Ok(r#"{"items":[]}"#))
                .reply(Route::Requirement, Ok("採点要件： 条件を満たしています。"))
                .reply(Route::FollowUp, Ok("S1 は時制が違います。"))
        }

        /// Replace every queued reply for `route`.
        pub fn replace(self, route: Route, reply: Result<&str, GenerationError>) -> Self {
            self.replies.lock().unwrap().remove(&route);
            self.reply(route, reply)
        }

        pub fn calls(&self) -> Vec<(Route, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, route: Route) -> usize {
            self.calls().iter().filter(|(r, _)| *r == route).count()
        }
    }

    #[async_trait]
    impl TextGenerator for RoutedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            model: &str,
            _max_output_tokens: u32,
        ) -> Result<String, GenerationError> {
            let route = route_of(prompt);
            self.calls.lock().unwrap().push((route, model.to_string()));
            let mut replies = self.replies.lock().unwrap();
            let queue = replies
                .get_mut(&route)
                .unwrap_or_else(|| panic!("no reply scripted for {:?}", route));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        }
    }
}
