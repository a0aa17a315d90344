use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use image2text::{
    io::ImageSource,
    vlm::{
        sampling::{DEFAULT_MAX_NEW_TOKENS, DEFAULT_TEMPERATURE},
        BackendLoader, SamplingParameters,
    },
    GenerationRequest,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, AppState};

/// The body of a successful describe request.
#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeResponse {
    /// Always `ok`.
    pub status: String,
    /// Where the text was written.
    pub output: String,
    /// The generated text.
    pub text: String,
}

/// The fields of the describe form.
struct DescribeForm {
    files: Vec<ImageSource>,
    prompt: Option<String>,
    max_new_tokens: usize,
    temperature: f64,
}

impl DescribeForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = DescribeForm {
            files: Vec::new(),
            prompt: None,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        };

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "files" | "file" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let data = field.bytes().await?;
                    form.files.push(ImageSource::Bytes {
                        name: file_name,
                        data: data.to_vec(),
                    });
                }
                "prompt" => {
                    let prompt = field.text().await?;
                    form.prompt = Some(prompt).filter(|p| !p.trim().is_empty());
                }
                "max_new_tokens" => {
                    let value = field.text().await?;
                    form.max_new_tokens = value.trim().parse().map_err(|_| {
                        ApiError::InvalidForm(format!(
                            "max_new_tokens must be an integer, got {value:?}"
                        ))
                    })?;
                }
                "temperature" => {
                    let value = field.text().await?;
                    form.temperature = value.trim().parse().map_err(|_| {
                        ApiError::InvalidForm(format!(
                            "temperature must be a number, got {value:?}"
                        ))
                    })?;
                }
                other => log::debug!("ignoring form field {other:?}"),
            }
        }

        Ok(form)
    }
}

/// Describe the uploaded images with the default model and persist the answer.
pub async fn describe<L: BackendLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
    mut multipart: Multipart,
) -> Result<Json<DescribeResponse>, ApiError> {
    let form = DescribeForm::read(&mut multipart).await?;
    let params = SamplingParameters::new(form.max_new_tokens, form.temperature)
        .map_err(|e| ApiError::InvalidForm(e.to_string()))?;

    log::info!(
        "describe request: {} file(s), prompt: {}",
        form.files.len(),
        form.prompt.is_some()
    );

    let identity = state.service.default_identity();
    let request = GenerationRequest::new(form.files)
        .with_prompt(form.prompt)
        .with_identity(identity.clone())
        .with_params(params);

    // the model call blocks for its whole duration
    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || service.generate(request));

    let joined = match state.generation_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                let service = state.service.clone();
                tokio::task::spawn_blocking(move || service.evict(&identity))
                    .await
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                return Err(ApiError::Timeout(limit));
            }
        },
        None => task.await,
    };
    let result = joined.map_err(|e| ApiError::Internal(e.to_string()))??;

    let path = state.persister.save(result.text(), result.name_hint())?;
    let result = result.with_persisted_path(path);

    Ok(Json(DescribeResponse {
        status: "ok".to_string(),
        output: result
            .persisted_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        text: result.into_text(),
    }))
}
