//! Comic API handlers
//!
//! Listing and reading are public. Creating a comic requires a token, and
//! appending a chapter additionally requires being the comic's author.

use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::media::UploadFile;
use crate::state::AppState;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use netcc_core::{Comic, NewChapter, NewComic};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Most episode images accepted in one chapter upload
pub const MAX_EPISODES: usize = 10;

/// Multipart form for `POST /api/comics`
#[derive(ToSchema)]
pub struct ComicUpload {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// jpg, jpeg, or png
    #[schema(value_type = String, format = Binary)]
    pub thumbnail: Vec<u8>,
}

/// Multipart form for `POST /api/comics/{id}/chapters`
#[derive(ToSchema)]
pub struct ChapterUpload {
    pub title: String,
    /// Up to ten images, stored in the order sent
    #[schema(value_type = Vec<String>, format = Binary)]
    pub episodes: Vec<Vec<u8>>,
}

/// Text fields and files from a comic or chapter upload
#[derive(Debug, Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    thumbnail: Option<UploadFile>,
    episodes: Vec<UploadFile>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "title" => form.title = Some(field.text().await.map_err(invalid_multipart)?),
                "description" => {
                    form.description = Some(field.text().await.map_err(invalid_multipart)?)
                }
                "category" => form.category = Some(field.text().await.map_err(invalid_multipart)?),
                "thumbnail" => form.thumbnail = read_file(field).await?,
                "episodes" => {
                    if let Some(file) = read_file(field).await? {
                        if form.episodes.len() == MAX_EPISODES {
                            return Err(AppError::Validation(format!(
                                "At most {MAX_EPISODES} episodes per chapter"
                            )));
                        }
                        form.episodes.push(file);
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Trimmed title, or a validation error if it is missing or blank
    fn required_title(&mut self) -> Result<String, AppError> {
        self.title
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Validation("Title is required".to_string()))
    }
}

/// Read a file part; an empty part with no file name means nothing was chosen
async fn read_file(field: Field<'_>) -> Result<Option<UploadFile>, AppError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.is_empty());
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(invalid_multipart)?;

    if file_name.is_none() && bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(UploadFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

fn invalid_multipart(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
}

/// Optional text field; blank counts as absent
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Malformed ids are reported the same as unknown ones
fn parse_comic_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Comic".to_string()))
}

/// Create a new comic
///
/// Multipart fields: `title` (required), `description`, `category`, and the
/// `thumbnail` image file (required). The thumbnail is uploaded to the media
/// host before the comic is stored.
#[utoipa::path(
    post,
    path = "/api/comics",
    tag = "comics",
    request_body(content = ComicUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Comic created"),
        (status = 400, description = "Missing title or thumbnail, or unsupported image", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("token" = [])
    )
)]
pub async fn create_comic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Multipart,
) -> Result<Json<Comic>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let title = form.required_title()?;
    let thumbnail = form
        .thumbnail
        .take()
        .ok_or_else(|| AppError::Validation("Thumbnail is required".to_string()))?;

    let thumbnail_url = state.media.upload(thumbnail).await?;

    let comic = state
        .comics
        .create_comic(NewComic {
            title,
            author_id: user.user_id,
            description: optional_text(form.description),
            category: optional_text(form.category),
            thumbnail: thumbnail_url,
        })
        .await?;

    info!(comic_id = %comic.id, author_id = %user.user_id, "Comic created");

    Ok(Json(comic))
}

/// List all comics
///
/// Comics come back in creation order with the author's username populated.
#[utoipa::path(
    get,
    path = "/api/comics",
    tag = "comics",
    responses(
        (status = 200, description = "All comics"),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn list_comics(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Comic>>, AppError> {
    let comics = state.comics.list_comics().await?;
    Ok(Json(comics))
}

/// Get a single comic
#[utoipa::path(
    get,
    path = "/api/comics/{id}",
    tag = "comics",
    params(
        ("id" = String, Path, description = "Comic ID")
    ),
    responses(
        (status = 200, description = "The comic, author populated"),
        (status = 404, description = "Comic not found", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn get_comic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Comic>, AppError> {
    let comic_id = parse_comic_id(&id)?;

    let comic = state
        .comics
        .find_comic_populated(comic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comic".to_string()))?;

    Ok(Json(comic))
}

/// Append a chapter to a comic
///
/// Multipart fields: `title` (required) and up to ten `episodes` image files,
/// kept in the order they were sent. Only the comic's author may append;
/// nothing is uploaded for a request that fails that check.
#[utoipa::path(
    post,
    path = "/api/comics/{id}/chapters",
    tag = "comics",
    params(
        ("id" = String, Path, description = "Comic ID")
    ),
    request_body(content = ChapterUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated comic"),
        (status = 400, description = "Missing title, too many episodes, or unsupported image", body = crate::error::ApiError),
        (status = 401, description = "Missing token or not the author", body = crate::error::ApiError),
        (status = 404, description = "Comic not found", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("token" = [])
    )
)]
pub async fn add_chapter(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Comic>, AppError> {
    let comic_id = parse_comic_id(&id)?;

    let comic = state
        .comics
        .find_comic(comic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comic".to_string()))?;

    if let Err(e) = user.ensure_owns(comic.author_id()) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: user.user_id,
            resource: format!("comic:{comic_id}"),
            client: ClientInfo::from_headers(&headers),
        });
        return Err(e.into());
    }

    let mut form = UploadForm::read(multipart).await?;
    let title = form.required_title()?;

    let mut episodes = Vec::with_capacity(form.episodes.len());
    for file in form.episodes {
        episodes.push(state.media.upload(file).await?);
    }

    let comic = state
        .comics
        .append_chapter(comic_id, NewChapter { title, episodes })
        .await?;

    info!(
        comic_id = %comic.id,
        chapters = comic.chapters.len(),
        "Chapter appended"
    );

    Ok(Json(comic))
}
