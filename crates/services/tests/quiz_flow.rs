use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use assess_core::model::{AssessmentDefinition, AssessmentId, Question, SubmissionPayload, UserId};
use assess_core::time::fixed_clock;
use services::{
    ApiError, AppServices, AssessmentApi, CachingAssessmentApi, QuizError, SubmissionCache,
    SubmitOutcome,
};
use storage::repository::Storage;

/// Backend double that scores against a fixed answer key and lags on reads.
struct ScoringBackend {
    definition: AssessmentDefinition,
    submits: AtomicUsize,
    result_fetches: AtomicUsize,
}

impl ScoringBackend {
    fn new() -> Self {
        let questions = vec![
            Question::new("Box<T> lives on?", vec!["stack".into(), "heap".into()], Some(1)),
            Question::new("Vec::new allocates?", vec!["yes".into(), "no".into()], Some(1)),
            Question::new("&str is?", vec!["borrowed".into(), "owned".into()], Some(0)),
        ];
        Self {
            definition: AssessmentDefinition::new(AssessmentId::random(), "Memory", 10, questions),
            submits: AtomicUsize::new(0),
            result_fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssessmentApi for ScoringBackend {
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentDefinition, ApiError> {
        if id == self.definition.id() {
            Ok(self.definition.clone())
        } else {
            Err(ApiError::NotFound)
        }
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<Value, ApiError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let correct = payload
            .answers()
            .iter()
            .filter(|answer| {
                self.definition
                    .question(answer.question_index)
                    .and_then(Question::correct_option_index)
                    == Some(answer.selected_answer)
            })
            .count();
        Ok(json!({
            "resultId": "attempt-1",
            "user": { "id": payload.user_id().to_string(), "name": "Ferris" },
            "score": correct,
            "totalQuestions": self.definition.question_count(),
            "questionsAttempted": payload.answers().len(),
            "attemptDate": "2024-03-15T14.30.00",
            "timeTaken": payload.time_taken_minutes()
        }))
    }

    async fn fetch_results(&self, _id: AssessmentId) -> Result<Value, ApiError> {
        self.result_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(json!([]))
    }
}

fn services(backend: &Arc<ScoringBackend>) -> AppServices {
    let storage = Storage::in_memory();
    let cache = SubmissionCache::new(Arc::clone(&storage.key_values)).with_clock(fixed_clock());
    let inner: Arc<dyn AssessmentApi> = Arc::clone(backend) as Arc<dyn AssessmentApi>;
    let api: Arc<dyn AssessmentApi> = Arc::new(CachingAssessmentApi::new(inner, cache));
    AppServices::from_api(api, UserId::random(), fixed_clock())
}

#[tokio::test]
async fn take_submit_and_read_back_within_cache_window() {
    let backend = Arc::new(ScoringBackend::new());
    let app = services(&backend);
    let quiz = app.quiz();
    let id = backend.definition.id();

    let mut session = quiz.start(id).await.expect("start");
    assert!(
        session
            .definition()
            .unwrap()
            .questions()
            .iter()
            .all(|q| q.correct_option_index().is_none())
    );

    session.select_answer(0, 1).unwrap();
    session.select_answer(1, 0).unwrap();
    session.select_answer(2, 0).unwrap();

    let SubmitOutcome::Completed(result) = quiz.submit(&mut session).await.expect("submit") else {
        panic!("expected a completed submission");
    };
    assert_eq!(result.correct_answers(), 2);
    assert_eq!(result.total_questions(), 3);
    assert_eq!(result.score(), 67);
    assert_eq!(result.points(), 20);
    assert_eq!(result.context().time_taken_minutes, Some(1));

    // Results read right after the submit come from the cache, not the lagging backend.
    let shown = app
        .results()
        .attempt_result(id, Some(app.user_id()))
        .await
        .expect("cached result");
    assert_eq!(shown.result_id(), Some("attempt-1"));
    assert_eq!(shown.user().name, "Ferris");
    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(backend.submits.load(Ordering::SeqCst), 1);

    // Other assessments still go to the network.
    let other = app.results().results_for_assessment(AssessmentId::random()).await;
    assert!(other.unwrap().is_empty());
    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_assessment_fails_to_start() {
    let backend = Arc::new(ScoringBackend::new());
    let app = services(&backend);

    let err = app.quiz().start(AssessmentId::random()).await.unwrap_err();
    assert_eq!(err, QuizError::Api(ApiError::NotFound));
    assert!(!err.is_retryable());
}
