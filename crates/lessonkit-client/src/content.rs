//! Lesson content fetched from the backend.

use anyhow::{Context, Result};
use reqwest::Method;
use tracing::instrument;

use lessonkit_core::model::Lesson;
use lessonkit_core::parser::{parse_lesson_str, LessonFormat};

use crate::api::ApiClient;
use crate::error::ClientError;

pub struct ContentClient {
    api: ApiClient,
}

impl ContentClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET` the lesson endpoint with `{id}` substituted.
    #[instrument(skip(self))]
    pub async fn fetch_lesson(&self, id: &str) -> Result<Lesson> {
        if id.trim().is_empty() {
            anyhow::bail!("lesson id is empty");
        }
        let path = self.api.endpoints().lesson.replace("{id}", id);
        let request = self.api.request(Method::GET, &path).await?;
        let body = self
            .api
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let lesson = parse_lesson_str(&body, LessonFormat::Json)
            .map_err(|e| ClientError::MalformedResponse(format!("{e:#}")))
            .with_context(|| format!("failed to load lesson {id}"))?;
        tracing::debug!(lesson = %lesson.id, items = lesson.questions.len(), "lesson fetched");
        Ok(lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lessonkit_core::model::LessonItem;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{BackendConfig, EndpointsConfig};
    use crate::token::StaticToken;

    fn content_client(server: &MockServer, endpoints: EndpointsConfig) -> ContentClient {
        let backend = BackendConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        ContentClient::new(
            ApiClient::new(&backend, &endpoints, Arc::new(StaticToken::new("tok"))).unwrap(),
        )
    }

    #[tokio::test]
    async fn fetches_and_parses_lesson() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/lessons/geo-101"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "geo-101",
                "title": "Capitals",
                "questions": [
                    {"type": "MCQ", "question": "Capital of France?",
                     "options": {"A": "Berlin", "B": "Paris"}, "answer": "B"},
                    {"type": "teleport"}
                ]
            })))
            .mount(&server)
            .await;

        let lesson = content_client(&server, EndpointsConfig::default())
            .fetch_lesson("geo-101")
            .await
            .unwrap();
        assert_eq!(lesson.title, "Capitals");
        assert!(matches!(lesson.questions[1], LessonItem::Unsupported(_)));
    }

    #[tokio::test]
    async fn custom_lesson_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/content/7/lesson"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "7", "title": "Seven"})),
            )
            .mount(&server)
            .await;

        let endpoints = EndpointsConfig {
            lesson: "/v2/content/{id}/lesson".into(),
            ..Default::default()
        };
        let lesson = content_client(&server, endpoints)
            .fetch_lesson("7")
            .await
            .unwrap();
        assert!(lesson.questions.is_empty());
    }

    #[tokio::test]
    async fn missing_lesson_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = content_client(&server, EndpointsConfig::default())
            .fetch_lesson("nope")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_lesson_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
            .mount(&server)
            .await;

        let err = content_client(&server, EndpointsConfig::default())
            .fetch_lesson("x")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to load lesson x"));
        assert!(err.downcast_ref::<ClientError>().is_some());
    }
}
