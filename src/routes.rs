use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::handler::Handler;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::average::{AverageReport, Subject};
use crate::err::{self, Error};
use crate::io::Gateway;
use crate::models::{Course, Record, RecordId, Student, Teacher, TestResult};
use crate::relations::{tests_for_course, tests_for_student};
use crate::store::Store;
use crate::{proceeds, Payload};

/// The four collections the service owns, one lock each.
#[derive(Clone)]
pub struct School {
    pub teachers: Arc<Store<Teacher>>,
    pub courses: Arc<Store<Course>>,
    pub students: Arc<Store<Student>>,
    pub tests: Arc<Store<TestResult>>,
}

impl School {
    pub async fn open(gateway: Arc<dyn Gateway>) -> anyhow::Result<Self> {
        let school = Self {
            teachers: Arc::new(Store::open(gateway.clone()).await?),
            courses: Arc::new(Store::open(gateway.clone()).await?),
            students: Arc::new(Store::open(gateway.clone()).await?),
            tests: Arc::new(Store::open(gateway).await?),
        };
        log::info!(
            "School opened with {} teacher(s), {} course(s), {} student(s), {} test(s)",
            school.teachers.len().await,
            school.courses.len().await,
            school.students.len().await,
            school.tests.len().await
        );
        Ok(school)
    }

    pub fn router(&self) -> Router {
        let app = Router::new().route("/", get(banner));
        let app = crud::<Teacher>(app);
        let app = crud::<Course>(app);
        let app = crud::<Student>(app);
        let app = crud::<TestResult>(app);

        app.route("/students/:id/tests", get(student_tests))
            .route("/students/:id/average", get(student_average))
            .route("/courses/:id/tests", get(course_tests))
            .route("/courses/:id/average", get(course_average))
            .fallback(err::handler404.into_service())
            .layer(Extension(self.teachers.clone()))
            .layer(Extension(self.courses.clone()))
            .layer(Extension(self.students.clone()))
            .layer(Extension(self.tests.clone()))
    }
}

fn crud<R: Record>(app: Router) -> Router {
    let collection = format!("/{}", R::COLLECTION);
    let single = format!("/{}/:id", R::COLLECTION);
    app.route(&collection, get(list::<R>).post(create::<R>))
        .route(
            &single,
            get(fetch::<R>).put(update::<R>).delete(remove::<R>),
        )
}

async fn banner() -> &'static str {
    "School API is running"
}

/// Reads the leading digits of a path segment, so `7`, ` 7` and `7abc` all
/// name record 7. Segments without leading digits can never match a record.
fn parse_id<R: Record>(raw: &str) -> Result<RecordId, Error> {
    let raw = raw.trim_start();
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    unsigned[..end]
        .parse::<RecordId>()
        .map_err(|_| Error::not_found(R::NAME))
}

/// Builds a draft from whatever the client sent.
///
/// Bodies that are empty or not declared as JSON give an empty draft, and so
/// do JSON values that are not objects. Only text declared as JSON that does
/// not parse is refused.
fn draft_from<R: Record>(headers: &HeaderMap, body: &[u8]) -> Result<R::Draft, Error> {
    let declared_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.contains("json"));
    if !declared_json || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Default::default());
    }
    match serde_json::from_slice::<Value>(body)? {
        object @ Value::Object(_) => Ok(serde_json::from_value(object).unwrap_or_default()),
        _ => Ok(Default::default()),
    }
}

async fn list<R: Record>(Extension(store): Extension<Arc<Store<R>>>) -> Json<Vec<R>> {
    Json(store.list().await)
}

async fn fetch<R: Record>(
    Path(id): Path<String>,
    Extension(store): Extension<Arc<Store<R>>>,
) -> Payload<R> {
    let id = parse_id::<R>(&id)?;
    proceeds(store.get(id).await?)
}

async fn create<R: Record>(
    Extension(store): Extension<Arc<Store<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<R>), Error> {
    let draft = draft_from::<R>(&headers, &body)?;
    let record = store.insert(draft).await?;
    log::info!("created {} {}", R::NAME, record.id());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update<R: Record>(
    Path(id): Path<String>,
    Extension(store): Extension<Arc<Store<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Payload<R> {
    let id = parse_id::<R>(&id)?;
    let patch = draft_from::<R>(&headers, &body)?;
    proceeds(store.replace(id, patch).await?)
}

async fn remove<R: Record>(
    Path(id): Path<String>,
    Extension(store): Extension<Arc<Store<R>>>,
) -> Payload<R> {
    let id = parse_id::<R>(&id)?;
    let removed = store.remove(id).await?;
    log::info!("deleted {} {}", R::NAME, removed.id());
    proceeds(removed)
}

async fn student_tests(
    Path(id): Path<String>,
    Extension(students): Extension<Arc<Store<Student>>>,
    Extension(tests): Extension<Arc<Store<TestResult>>>,
) -> Payload<Vec<TestResult>> {
    let id = parse_id::<Student>(&id)?;
    proceeds(tests_for_student(&students, &tests, id).await?)
}

async fn course_tests(
    Path(id): Path<String>,
    Extension(courses): Extension<Arc<Store<Course>>>,
    Extension(tests): Extension<Arc<Store<TestResult>>>,
) -> Payload<Vec<TestResult>> {
    let id = parse_id::<Course>(&id)?;
    proceeds(tests_for_course(&courses, &tests, id).await?)
}

async fn student_average(
    Path(id): Path<String>,
    Extension(students): Extension<Arc<Store<Student>>>,
    Extension(tests): Extension<Arc<Store<TestResult>>>,
) -> Payload<AverageReport> {
    let id = parse_id::<Student>(&id)?;
    let taken = tests_for_student(&students, &tests, id).await?;
    proceeds(AverageReport::new(Subject::StudentId(id), &taken))
}

async fn course_average(
    Path(id): Path<String>,
    Extension(courses): Extension<Arc<Store<Course>>>,
    Extension(tests): Extension<Arc<Store<TestResult>>>,
) -> Payload<AverageReport> {
    let id = parse_id::<Course>(&id)?;
    let taken = tests_for_course(&courses, &tests, id).await?;
    proceeds(AverageReport::new(Subject::CourseId(id), &taken))
}
