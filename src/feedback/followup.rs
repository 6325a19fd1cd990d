use tracing::{debug, warn};

use super::FeedbackService;
use crate::assessment::extract::is_failure_sentinel;
use crate::error::FeedbackError;
use crate::prompts::{follow_up_prompt, FollowUpContext, FOLLOW_UP_TOKENS};

pub const MISSING_QUESTION: &str = "question が未指定です。";
pub const UNPARSEABLE_ANSWER: &str = "応答の解析に失敗しました。";

/// A single follow-up question about an earlier report. Context fields are
/// optional and may be left empty.
#[derive(Debug, Clone, Default)]
pub struct FollowUpRequest {
    pub question: String,
    pub original_question: String,
    pub original_text: String,
    pub feedback: String,
    pub model_preference: Option<String>,
}

impl FeedbackService {
    /// Answer a follow-up question with one generation call. No state is kept
    /// between calls.
    pub async fn answer(&self, request: &FollowUpRequest) -> Result<String, FeedbackError> {
        if request.question.trim().is_empty() {
            return Err(FeedbackError::InputMissing(MISSING_QUESTION));
        }

        let model = self.models.resolve(request.model_preference.as_deref());
        let context = FollowUpContext {
            original_question: &request.original_question,
            original_text: &request.original_text,
            feedback: &request.feedback,
        };
        let prompt = follow_up_prompt(&request.question, &context);
        debug!("Follow-up question on {} ({} prompt chars)", model, prompt.chars().count());

        let answer = self
            .generator
            .generate(&prompt, model, FOLLOW_UP_TOKENS)
            .await
            .map_err(FeedbackError::FollowUp)?;

        if answer.trim().is_empty() {
            warn!("Follow-up answer was empty");
            return Err(FeedbackError::UnusableAnswer(UNPARSEABLE_ANSWER.to_string()));
        }
        if is_failure_sentinel(&answer) {
            warn!("Follow-up answer carried a failure sentinel");
            return Err(FeedbackError::UnusableAnswer(answer));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ModelSelection;
    use crate::error::ErrorKind;
    use crate::feedback::testing::{Route, RoutedGenerator};
    use crate::generation::GenerationError;

    fn make_request(question: &str) -> FollowUpRequest {
        FollowUpRequest {
            question: question.to_string(),
            original_text: "I go to school yesterday.".to_string(),
            ..Default::default()
        }
    }

    fn make_service(generator: RoutedGenerator) -> (FeedbackService, Arc<RoutedGenerator>) {
        let generator = Arc::new(generator);
        (
            FeedbackService::new(generator.clone(), ModelSelection::default()),
            generator,
        )
    }

    #[tokio::test]
    async fn answers_with_generated_text() {
        let (service, generator) = make_service(RoutedGenerator::clean());
        let answer = service.answer(&make_request("S1 のどこが違いますか？")).await.unwrap();
        assert_eq!(answer, "S1 は時制が違います。");
        assert_eq!(generator.calls(), vec![(Route::FollowUp, "gemini-2.5-flash".to_string())]);
    }

    #[tokio::test]
    async fn missing_question_is_rejected() {
        let (service, generator) = make_service(RoutedGenerator::clean());
        let err = service.answer(&make_request("  ")).await.unwrap_err();
        assert_eq!(err.to_string(), MISSING_QUESTION);
        assert_eq!(err.kind(), ErrorKind::InputMissing);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn sentinel_answer_is_an_error() {
        let (service, _) = make_service(
            RoutedGenerator::clean().replace(Route::FollowUp, Ok("APIからの有効な応答がありませんでした。")),
        );
        let err = service.answer(&make_request("why?")).await.unwrap_err();
        assert_eq!(err.to_string(), "APIからの有効な応答がありませんでした。");
        assert_eq!(err.kind(), ErrorKind::UpstreamPermanent);
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let (service, _) = make_service(RoutedGenerator::clean().replace(Route::FollowUp, Ok("  ")));
        let err = service.answer(&make_request("why?")).await.unwrap_err();
        assert_eq!(err.to_string(), UNPARSEABLE_ANSWER);
        assert_eq!(err.kind(), ErrorKind::MalformedUpstreamPayload);
    }

    #[tokio::test]
    async fn generator_errors_pass_through() {
        let (service, _) = make_service(
            RoutedGenerator::clean().replace(Route::FollowUp, Err(GenerationError::Unauthorized)),
        );
        let err = service.answer(&make_request("why?")).await.unwrap_err();
        assert_eq!(err.to_string(), GenerationError::Unauthorized.to_string());
        assert!(err.stage().is_none());
    }
}
