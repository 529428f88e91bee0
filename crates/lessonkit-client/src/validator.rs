//! HTTP answer validator against the backend's AI validation endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use lessonkit_core::traits::{AnswerValidator, ValidationRequest, ValidationVerdict};

use crate::api::ApiClient;

/// Judges FreeText, Translation and VoiceAnswer responses remotely.
pub struct HttpValidator {
    api: ApiClient,
}

impl HttpValidator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[derive(Serialize)]
struct FreeTextBody<'a> {
    question: &'a str,
    answer: &'a str,
}

#[derive(Serialize)]
struct TranslationBody<'a> {
    text: &'a str,
    translation: &'a str,
    from_language: &'a str,
    to_language: &'a str,
}

#[async_trait]
impl AnswerValidator for HttpValidator {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(kind = %request.question_type()))]
    async fn validate(&self, request: &ValidationRequest) -> anyhow::Result<ValidationVerdict> {
        let endpoints = self.api.endpoints();
        let builder = match request {
            ValidationRequest::FreeText { question, answer } => self
                .api
                .request(Method::POST, &endpoints.free_text)
                .await?
                .json(&FreeTextBody { question, answer }),
            ValidationRequest::Translation {
                text,
                translation,
                from_language,
                to_language,
            } => self
                .api
                .request(Method::POST, &endpoints.translation)
                .await?
                .json(&TranslationBody {
                    text,
                    translation,
                    from_language,
                    to_language,
                }),
            ValidationRequest::VoiceAnswer {
                question,
                recording,
            } => {
                let file = Part::bytes(recording.bytes.clone())
                    .file_name(recording.file_name.clone())
                    .mime_str("audio/wav")?;
                let form = Form::new().text("question", question.clone()).part("file", file);
                self.api
                    .request(Method::POST, &endpoints.voice_answer)
                    .await?
                    .multipart(form)
            }
        };

        let verdict: ValidationVerdict = self.api.send_json(builder).await?;
        tracing::debug!(correct = verdict.correct, "validation verdict received");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lessonkit_core::traits::Recording;
    use wiremock::matchers::{body_json, body_string_contains, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{BackendConfig, EndpointsConfig};
    use crate::error::ClientError;
    use crate::token::{FileTokenStore, StaticToken, TokenStore};

    fn validator_with(server: &MockServer, tokens: Arc<dyn TokenStore>) -> HttpValidator {
        let backend = BackendConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..Default::default()
        };
        HttpValidator::new(ApiClient::new(&backend, &EndpointsConfig::default(), tokens).unwrap())
    }

    fn validator(server: &MockServer) -> HttpValidator {
        validator_with(server, Arc::new(StaticToken::new("test-token")))
    }

    #[tokio::test]
    async fn free_text_posts_json_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ai/validate-answer/free-text"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "question": "Why is the sky blue?",
                "answer": "Rayleigh scattering"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "correct": true,
                "feedback": "Nice!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = validator(&server)
            .validate(&ValidationRequest::FreeText {
                question: "Why is the sky blue?".into(),
                answer: "Rayleigh scattering".into(),
            })
            .await
            .unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.feedback.as_deref(), Some("Nice!"));
    }

    #[tokio::test]
    async fn translation_posts_all_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ai/validate-answer/translation"))
            .and(body_json(serde_json::json!({
                "text": "Bonjour",
                "translation": "Hello",
                "from_language": "fr",
                "to_language": "en"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"correct": false})))
            .mount(&server)
            .await;

        let verdict = validator(&server)
            .validate(&ValidationRequest::Translation {
                text: "Bonjour".into(),
                translation: "Hello".into(),
                from_language: "fr".into(),
                to_language: "en".into(),
            })
            .await
            .unwrap();
        assert!(!verdict.correct);
    }

    #[tokio::test]
    async fn voice_answer_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ai/validate-answer/voice-answer"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains("name=\"question\""))
            .and(body_string_contains("filename=\"answer.wav\""))
            .and(body_string_contains("audio/wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"correct": true})))
            .mount(&server)
            .await;

        let verdict = validator(&server)
            .validate(&ValidationRequest::VoiceAnswer {
                question: "Describe your morning.".into(),
                recording: Recording::wav(b"RIFF0000WAVE".to_vec()),
            })
            .await
            .unwrap();
        assert!(verdict.correct);
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = validator(&server)
            .validate(&ValidationRequest::FreeText {
                question: "q".into(),
                answer: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn unauthorized_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = validator(&server)
            .validate(&ValidationRequest::FreeText {
                question: "q".into(),
                answer: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Unauthorized { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = validator(&server)
            .validate(&ValidationRequest::FreeText {
                question: "q".into(),
                answer: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"correct": true})))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let signed_out = Arc::new(FileTokenStore::new(dir.path().join("token")));
        let err = validator_with(&server, signed_out)
            .validate(&ValidationRequest::FreeText {
                question: "q".into(),
                answer: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let backend = BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..Default::default()
        };
        let validator = HttpValidator::new(
            ApiClient::new(
                &backend,
                &EndpointsConfig::default(),
                Arc::new(StaticToken::new("t")),
            )
            .unwrap(),
        );
        let err = validator
            .validate(&ValidationRequest::FreeText {
                question: "q".into(),
                answer: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Network(_) | ClientError::Timeout(_))
        ));
    }
}
