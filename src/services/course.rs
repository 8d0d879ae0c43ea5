use crate::{
    error::{AppError, AppResult},
    models::{course, lecture, Course, CourseModel, Lecture, LectureModel},
    services::media::StoredMedia,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder,
};

pub struct CourseService {
    db: DatabaseConnection,
}

impl CourseService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All courses, without their lectures.
    pub async fn list(&self) -> AppResult<Vec<CourseModel>> {
        Ok(Course::find()
            .order_by_asc(course::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn get(&self, id: i32) -> AppResult<CourseModel> {
        Course::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn lectures(&self, course_id: i32) -> AppResult<Vec<LectureModel>> {
        let course = self.get(course_id).await?;
        Ok(Lecture::find()
            .filter(lecture::Column::CourseId.eq(course.id))
            .order_by_asc(lecture::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn create(
        &self,
        title: &str,
        description: &str,
        category: &str,
        created_by: &str,
    ) -> AppResult<CourseModel> {
        let now = chrono::Utc::now().naive_utc();

        let new_course = course::ActiveModel {
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            category: Set(category.to_string()),
            created_by: Set(created_by.to_string()),
            lectures_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let course = new_course.insert(&self.db).await?;
        tracing::info!(course_id = course.id, "course created");
        Ok(course)
    }

    pub async fn set_thumbnail(
        &self,
        course: CourseModel,
        media: StoredMedia,
    ) -> AppResult<CourseModel> {
        let now = chrono::Utc::now().naive_utc();
        let mut active: course::ActiveModel = course.into();
        active.thumbnail_public_id = Set(Some(media.public_id));
        active.thumbnail_url = Set(Some(media.secure_url));
        active.updated_at = Set(now);
        Ok(active.update(&self.db).await?)
    }

    pub async fn update(
        &self,
        id: i32,
        title: Option<String>,
        description: Option<String>,
        category: Option<String>,
        created_by: Option<String>,
    ) -> AppResult<CourseModel> {
        let course = self.get(id).await?;
        let now = chrono::Utc::now().naive_utc();

        let mut active: course::ActiveModel = course.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(category) = category {
            active.category = Set(category);
        }
        if let Some(created_by) = created_by {
            active.created_by = Set(created_by);
        }
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    /// Lectures go with the course (cascade delete).
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let course = self.get(id).await?;
        course.delete(&self.db).await?;
        Ok(())
    }

    /// Attach a lecture and bump the course's lecture counter.
    pub async fn add_lecture(
        &self,
        course_id: i32,
        title: &str,
        description: &str,
        media: Option<StoredMedia>,
    ) -> AppResult<LectureModel> {
        let course = self.get(course_id).await?;
        let now = chrono::Utc::now().naive_utc();

        let (media_public_id, media_url) = match media {
            Some(m) => (Some(m.public_id), Some(m.secure_url)),
            None => (None, None),
        };

        let new_lecture = lecture::ActiveModel {
            course_id: Set(course.id),
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            media_public_id: Set(media_public_id),
            media_url: Set(media_url),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = new_lecture.insert(&self.db).await?;

        let count = course.lectures_count + 1;
        let mut active: course::ActiveModel = course.into();
        active.lectures_count = Set(count);
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        Ok(created)
    }
}
