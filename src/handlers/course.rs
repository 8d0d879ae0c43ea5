use crate::error::{AppError, AppResult};
use crate::handlers::auth::{cleanup_staged, read_text_field};
use crate::middleware::auth::require_admin;
use crate::middleware::AuthUser;
use crate::models::{CourseModel, LectureModel};
use crate::response::ApiResponse;
use crate::services::course::CourseService;
use crate::services::media::{
    discard_staged, stage_upload, MediaConfig, MediaStore, UploadOptions,
};
use axum::{
    extract::{Multipart, Path},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseResponse {
    /// Course ID
    pub id: i32,
    /// Course title
    pub title: String,
    /// Course description
    pub description: String,
    /// Category
    pub category: String,
    /// Instructor display name
    pub created_by: String,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Number of attached lectures
    pub lectures_count: i32,
    /// Creation timestamp
    pub created_at: String,
}

impl From<CourseModel> for CourseResponse {
    fn from(c: CourseModel) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            category: c.category,
            created_by: c.created_by,
            thumbnail_url: c.thumbnail_url,
            lectures_count: c.lectures_count,
            created_at: c.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LectureResponse {
    /// Lecture ID
    pub id: i32,
    /// Lecture title
    pub title: String,
    /// Lecture description
    pub description: String,
    /// Media URL
    pub media_url: Option<String>,
}

impl From<LectureModel> for LectureResponse {
    fn from(l: LectureModel) -> Self {
        Self {
            id: l.id,
            title: l.title,
            description: l.description,
            media_url: l.media_url,
        }
    }
}

/// Fields of the multipart course form; the optional `thumbnail` file
/// part is handled separately.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCourseData {
    /// Course title (max 100 characters)
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// Course description (max 1000 characters)
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    /// Category (max 100 characters)
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    /// Instructor display name (max 100 characters)
    #[validate(length(min = 1, max = 100))]
    pub created_by: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub created_by: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    responses(
        (status = 200, description = "All courses, without lectures", body = Vec<CourseResponse>),
    ),
    tag = "courses"
)]
pub async fn list_courses(
    Extension(db): Extension<DatabaseConnection>,
) -> AppResult<impl IntoResponse> {
    let service = CourseService::new(db);
    let courses = service.list().await?;
    let response: Vec<CourseResponse> = courses.into_iter().map(CourseResponse::from).collect();
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}/lectures",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Lectures of the course", body = Vec<LectureResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Course not found", body = AppError),
    ),
    tag = "courses"
)]
pub async fn get_course_lectures(
    Extension(db): Extension<DatabaseConnection>,
    _auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = CourseService::new(db);
    let lectures = service.lectures(id).await?;
    let response: Vec<LectureResponse> = lectures.into_iter().map(LectureResponse::from).collect();
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/courses",
    security(("jwt_token" = [])),
    request_body(content = CreateCourseData, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Course created successfully", body = CourseResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Admin role required", body = AppError),
        (status = 502, description = "Thumbnail upload failed (course is still created)", body = AppError),
    ),
    tag = "courses"
)]
pub async fn create_course(
    Extension(db): Extension<DatabaseConnection>,
    Extension(media): Extension<Arc<dyn MediaStore>>,
    Extension(media_config): Extension<MediaConfig>,
    auth_user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    require_admin(&auth_user)?;

    let mut title = None;
    let mut description = None;
    let mut category = None;
    let mut created_by = None;
    let mut staged: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = Some(read_text_field(field).await?),
            "description" => description = Some(read_text_field(field).await?),
            "category" => category = Some(read_text_field(field).await?),
            "created_by" => created_by = Some(read_text_field(field).await?),
            "thumbnail" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                staged = Some(stage_upload(&media_config, &data).await?);
            }
            _ => {}
        }
    }

    let payload = match (title, description, category, created_by) {
        (Some(title), Some(description), Some(category), Some(created_by)) => CreateCourseData {
            title,
            description,
            category,
            created_by,
        },
        _ => {
            cleanup_staged(&staged).await;
            return Err(AppError::Validation("All fields are required".to_string()));
        }
    };

    if let Err(e) = payload.validate() {
        cleanup_staged(&staged).await;
        return Err(AppError::Validation(format!("Validation error: {e}")));
    }

    let service = CourseService::new(db);
    let course = match service
        .create(
            &payload.title,
            &payload.description,
            &payload.category,
            &payload.created_by,
        )
        .await
    {
        Ok(course) => course,
        Err(e) => {
            cleanup_staged(&staged).await;
            return Err(e);
        }
    };

    // As with registration: a failed thumbnail upload surfaces an error
    // but does not roll the course back.
    let course = match staged {
        Some(path) => {
            let uploaded = media.upload(&path, &UploadOptions::media()).await;
            discard_staged(&path).await;
            let stored = uploaded?;
            service.set_thumbnail(course, stored).await?
        }
        None => course,
    };

    Ok(ApiResponse::with_message(
        CourseResponse::from(course),
        "Course created successfully".to_string(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated successfully", body = CourseResponse),
        (status = 403, description = "Admin role required", body = AppError),
        (status = 404, description = "Course not found", body = AppError),
    ),
    tag = "courses"
)]
pub async fn update_course(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCourseRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&auth_user)?;

    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = CourseService::new(db);
    let course = service
        .update(
            id,
            payload.title,
            payload.description,
            payload.category,
            payload.created_by,
        )
        .await?;

    Ok(ApiResponse::with_message(
        CourseResponse::from(course),
        "Course updated successfully".to_string(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course deleted successfully", body = String),
        (status = 403, description = "Admin role required", body = AppError),
        (status = 404, description = "Course not found", body = AppError),
    ),
    tag = "courses"
)]
pub async fn delete_course(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    require_admin(&auth_user)?;

    let service = CourseService::new(db);
    service.delete(id).await?;

    Ok(ApiResponse::with_message(
        (),
        "Course deleted successfully".to_string(),
    ))
}

/// Fields of the multipart lecture form; the optional `media` file part
/// is handled separately.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddLectureData {
    /// Lecture title (max 100 characters)
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// Lecture description (max 1000 characters)
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/courses/{id}/lectures",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Course ID")),
    request_body(content = AddLectureData, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Lecture added to the course", body = LectureResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Admin role required", body = AppError),
        (status = 404, description = "Course not found", body = AppError),
    ),
    tag = "courses"
)]
pub async fn add_lecture(
    Extension(db): Extension<DatabaseConnection>,
    Extension(media): Extension<Arc<dyn MediaStore>>,
    Extension(media_config): Extension<MediaConfig>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    require_admin(&auth_user)?;

    let mut title = None;
    let mut description = None;
    let mut staged: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = Some(read_text_field(field).await?),
            "description" => description = Some(read_text_field(field).await?),
            "media" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                staged = Some(stage_upload(&media_config, &data).await?);
            }
            _ => {}
        }
    }

    let payload = match (title, description) {
        (Some(title), Some(description)) => AddLectureData { title, description },
        _ => {
            cleanup_staged(&staged).await;
            return Err(AppError::Validation("All fields are required".to_string()));
        }
    };

    if let Err(e) = payload.validate() {
        cleanup_staged(&staged).await;
        return Err(AppError::Validation(format!("Validation error: {e}")));
    }

    // 404 before touching the media store, so a bad course id cannot
    // orphan an uploaded file.
    let service = CourseService::new(db);
    if let Err(e) = service.get(id).await {
        cleanup_staged(&staged).await;
        return Err(e);
    }

    let stored = match staged {
        Some(path) => {
            let uploaded = media.upload(&path, &UploadOptions::media()).await;
            discard_staged(&path).await;
            Some(uploaded?)
        }
        None => None,
    };

    let lecture = service
        .add_lecture(id, &payload.title, &payload.description, stored)
        .await?;

    Ok(ApiResponse::with_message(
        LectureResponse::from(lecture),
        "Lecture successfully added to the course".to_string(),
    ))
}
