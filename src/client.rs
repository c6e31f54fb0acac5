//! HTTP client for the ThesisAI REST API.
//!
//! Every call returns a typed result; non-success statuses are mapped
//! to [`ApiError`] variants by [`crate::utils::check_response_error`].
//! The streaming feedback endpoint returns the raw response so the
//! session controller can consume it chunk by chunk.

use crate::types::*;
use crate::utils::{check_response_error, parse_json};
use reqwest::{Client, RequestBuilder, Response};
use std::path::Path;
use tracing::debug;

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        check_response_error(response).await
    }

    // ---- auth ----

    /// OAuth2 password login. The returned token is not stored on the
    /// client automatically; call [`ApiClient::set_token`].
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let builder = self
            .http
            .post(self.url("/token"))
            .form(&[("username", username), ("password", password)]);
        parse_json(self.send(builder).await?).await
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/me")));
        parse_json(self.send(builder).await?).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
        password: &str,
        role: Role,
        supervisor_id: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut form = vec![
            ("username".to_string(), username.to_string()),
            ("email".to_string(), email.to_string()),
            ("full_name".to_string(), full_name.to_string()),
            ("password".to_string(), password.to_string()),
            ("role".to_string(), role.to_string()),
        ];
        if let Some(supervisor) = supervisor_id {
            form.push(("supervisor_id".to_string(), supervisor.to_string()));
        }
        let builder = self.http.post(self.url("/register")).form(&form);
        parse_json(self.send(builder).await?).await
    }

    // ---- theses ----

    pub async fn upload_thesis(&self, path: &Path) -> Result<UploadAck, ApiError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::InvalidRequest("path has no file name".to_string()))?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("cannot read {}: {e}", path.display())))?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| ApiError::Unknown(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let builder = self.authorize(self.http.post(self.url("/upload")).multipart(form));
        parse_json(self.send(builder).await?).await
    }

    pub async fn my_theses(&self) -> Result<Vec<Thesis>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/my-theses")));
        parse_json(self.send(builder).await?).await
    }

    /// Admin only
    pub async fn all_theses(&self) -> Result<Vec<Thesis>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/all")));
        parse_json(self.send(builder).await?).await
    }

    /// Supervisor only: assigned theses still awaiting review
    pub async fn theses_to_review(&self) -> Result<Vec<Thesis>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/to-review")));
        parse_json(self.send(builder).await?).await
    }

    pub async fn download_thesis(&self, thesis_id: &str) -> Result<Vec<u8>, ApiError> {
        let builder = self.authorize(self.http.get(self.url(&format!("/download/{thesis_id}"))));
        let response = self.send(builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    pub async fn extract_text(&self, thesis_id: &str) -> Result<String, ApiError> {
        #[derive(serde::Deserialize)]
        struct ExtractedText {
            text: String,
        }
        let builder =
            self.authorize(self.http.get(self.url(&format!("/extract-text/{thesis_id}"))));
        let extracted: ExtractedText = parse_json(self.send(builder).await?).await?;
        Ok(extracted.text)
    }

    pub async fn preview_images(&self, thesis_id: &str) -> Result<Vec<String>, ApiError> {
        #[derive(serde::Deserialize)]
        struct PreviewImages {
            images: Vec<String>,
        }
        let builder = self.authorize(
            self.http
                .get(self.url(&format!("/preview-images/{thesis_id}"))),
        );
        let preview: PreviewImages = parse_json(self.send(builder).await?).await?;
        Ok(preview.images)
    }

    pub async fn delete_thesis(&self, thesis_id: &str) -> Result<(), ApiError> {
        let builder = self.authorize(self.http.delete(self.url(&format!("/theses/{thesis_id}"))));
        self.send(builder).await?;
        Ok(())
    }

    // ---- AI feedback ----

    /// Open the streaming feedback request. The response body is the
    /// event stream consumed by [`crate::session::FeedbackSession`].
    pub async fn request_feedback(&self, request: &FeedbackRequest) -> Result<Response, ApiError> {
        let mut form = vec![
            ("thesis_id".to_string(), request.thesis_id.clone()),
            (
                "custom_instructions".to_string(),
                request.custom_instructions.clone(),
            ),
        ];
        for (i, question) in request.predefined_questions.iter().enumerate() {
            form.push((format!("predefined_questions[{i}]"), question.clone()));
        }
        if !request.selected_options.is_empty() {
            form.push((
                "selected_options".to_string(),
                request.selected_options.clone(),
            ));
        }

        debug!(thesis_id = %request.thesis_id, "opening feedback stream");
        let builder = self.authorize(self.http.post(self.url("/feedback")).form(&form));
        self.send(builder).await
    }

    /// Persist the fully assembled feedback text after a completed stream
    pub async fn save_feedback(
        &self,
        thesis_id: &str,
        feedback_content: &str,
    ) -> Result<SaveFeedbackAck, ApiError> {
        let builder = self.authorize(self.http.post(self.url("/save-feedback")).form(&[
            ("thesis_id", thesis_id),
            ("feedback_content", feedback_content),
        ]));
        parse_json(self.send(builder).await?).await
    }

    pub async fn feedback_options(&self) -> Result<Vec<FeedbackOption>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/feedback-options")));
        parse_json(self.send(builder).await?).await
    }

    // ---- users and assignments ----

    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/users")));
        parse_json(self.send(builder).await?).await
    }

    pub async fn user(&self, username: &str) -> Result<User, ApiError> {
        let builder = self.authorize(self.http.get(self.url(&format!("/users/{username}"))));
        parse_json(self.send(builder).await?).await
    }

    pub async fn update_user(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
        role: Role,
        supervisor_username: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut form = vec![
            ("email".to_string(), email.to_string()),
            ("full_name".to_string(), full_name.to_string()),
            ("role".to_string(), role.to_string()),
        ];
        if let Some(supervisor) = supervisor_username {
            form.push(("supervisor_username".to_string(), supervisor.to_string()));
        }
        let builder = self.authorize(
            self.http
                .put(self.url(&format!("/users/{username}")))
                .form(&form),
        );
        parse_json(self.send(builder).await?).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<serde_json::Value, ApiError> {
        let builder = self.authorize(self.http.delete(self.url(&format!("/users/{username}"))));
        parse_json(self.send(builder).await?).await
    }

    pub async fn supervisors(&self) -> Result<Vec<User>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/supervisors")));
        parse_json(self.send(builder).await?).await
    }

    pub async fn students(&self) -> Result<Vec<User>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/students")));
        parse_json(self.send(builder).await?).await
    }

    /// Admin only
    pub async fn assign_supervisor(
        &self,
        student_username: &str,
        supervisor_username: &str,
    ) -> Result<AssignmentAck, ApiError> {
        let builder = self.authorize(self.http.post(self.url("/assign-supervisor")).form(&[
            ("student_username", student_username),
            ("supervisor_username", supervisor_username),
        ]));
        parse_json(self.send(builder).await?).await
    }

    /// Supervisor only
    pub async fn supervisor_assignments(&self) -> Result<Vec<SupervisorAssignment>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/supervisor-assignments")));
        parse_json(self.send(builder).await?).await
    }

    // ---- supervisor feedback ----

    pub async fn submit_supervisor_feedback(
        &self,
        thesis_id: &str,
        feedback_content: &str,
    ) -> Result<SaveFeedbackAck, ApiError> {
        let builder = self.authorize(
            self.http
                .post(self.url("/submit-supervisor-feedback"))
                .form(&[
                    ("thesis_id", thesis_id),
                    ("feedback_content", feedback_content),
                ]),
        );
        parse_json(self.send(builder).await?).await
    }

    pub async fn supervisor_feedback(&self) -> Result<Vec<SupervisorFeedback>, ApiError> {
        let builder = self.authorize(self.http.get(self.url("/supervisor-feedback")));
        parse_json(self.send(builder).await?).await
    }

    pub async fn supervisor_feedback_for(
        &self,
        thesis_id: &str,
    ) -> Result<SupervisorFeedback, ApiError> {
        let builder = self.authorize(
            self.http
                .get(self.url(&format!("/supervisor-feedback/{thesis_id}"))),
        );
        parse_json(self.send(builder).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.url("/token"), "http://localhost:8000/token");
    }
}
