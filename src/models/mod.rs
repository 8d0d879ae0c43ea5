pub mod course;
pub mod lecture;
pub mod user;

pub use course::{Entity as Course, Model as CourseModel};
pub use lecture::{Entity as Lecture, Model as LectureModel};
pub use user::{Entity as User, Model as UserModel, Role};
