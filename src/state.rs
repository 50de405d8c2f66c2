use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{exam::ExamService, question::QuestionService},
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub exams: ExamService,
    pub questions: QuestionService,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            exams: ExamService::new(store.clone()),
            questions: QuestionService::new(store.clone()),
            store,
            config,
        }
    }
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}

impl FromRef<AppState> for QuestionService {
    fn from_ref(state: &AppState) -> Self {
        state.questions.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
