use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RecordId = u64;

/// A row of one of the school collections.
///
/// Every collection shares the same lifecycle: a record is built from a
/// [`Record::Draft`] once an id has been allocated for it, and later patched
/// in place with another draft where only the supplied fields win.
///
/// Apart from the id, attributes hold whatever JSON value the client sent.
/// Nothing is validated, so a `"mark": "8"` or a missing `outOf` is stored
/// as-is.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Create body and update patch. Every field is optional.
    type Draft: DeserializeOwned + Default + Send + 'static;

    /// Collection name, used for both the route prefix and the storage file.
    const COLLECTION: &'static str;
    /// Human name used in `"<Name> not found"` messages.
    const NAME: &'static str;

    fn id(&self) -> RecordId;

    fn from_draft(id: RecordId, draft: Self::Draft) -> Self;

    fn apply(&mut self, patch: Self::Draft);
}

fn patch<T>(slot: &mut Option<T>, value: Option<T>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDraft {
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
    pub email: Option<Value>,
    pub department: Option<Value>,
    pub room: Option<Value>,
}

impl Record for Teacher {
    type Draft = TeacherDraft;

    const COLLECTION: &'static str = "teachers";
    const NAME: &'static str = "Teacher";

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: TeacherDraft) -> Self {
        Self {
            id,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            department: draft.department,
            room: draft.room,
        }
    }

    fn apply(&mut self, draft: TeacherDraft) {
        patch(&mut self.first_name, draft.first_name);
        patch(&mut self.last_name, draft.last_name);
        patch(&mut self.email, draft.email);
        patch(&mut self.department, draft.department);
        patch(&mut self.room, draft.room);
    }
}

/// `teacher_id` is a loose reference, nothing checks that the teacher exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub code: Option<Value>,
    pub name: Option<Value>,
    pub teacher_id: Option<Value>,
    pub semester: Option<Value>,
    pub room: Option<Value>,
    pub schedule: Option<Value>,
}

impl Record for Course {
    type Draft = CourseDraft;

    const COLLECTION: &'static str = "courses";
    const NAME: &'static str = "Course";

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: CourseDraft) -> Self {
        Self {
            id,
            code: draft.code,
            name: draft.name,
            teacher_id: draft.teacher_id,
            semester: draft.semester,
            room: draft.room,
            schedule: draft.schedule,
        }
    }

    fn apply(&mut self, draft: CourseDraft) {
        patch(&mut self.code, draft.code);
        patch(&mut self.name, draft.name);
        patch(&mut self.teacher_id, draft.teacher_id);
        patch(&mut self.semester, draft.semester);
        patch(&mut self.room, draft.room);
        patch(&mut self.schedule, draft.schedule);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_number: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homeroom: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
    pub grade: Option<Value>,
    pub student_number: Option<Value>,
    pub homeroom: Option<Value>,
}

impl Record for Student {
    type Draft = StudentDraft;

    const COLLECTION: &'static str = "students";
    const NAME: &'static str = "Student";

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: StudentDraft) -> Self {
        Self {
            id,
            first_name: draft.first_name,
            last_name: draft.last_name,
            grade: draft.grade,
            student_number: draft.student_number,
            homeroom: draft.homeroom,
        }
    }

    fn apply(&mut self, draft: StudentDraft) {
        patch(&mut self.first_name, draft.first_name);
        patch(&mut self.last_name, draft.last_name);
        patch(&mut self.grade, draft.grade);
        patch(&mut self.student_number, draft.student_number);
        patch(&mut self.homeroom, draft.homeroom);
    }
}

/// One graded test. `weight` is stored for clients but averages ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_of: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultDraft {
    pub student_id: Option<Value>,
    pub course_id: Option<Value>,
    pub test_name: Option<Value>,
    pub date: Option<Value>,
    pub mark: Option<Value>,
    pub out_of: Option<Value>,
    pub weight: Option<Value>,
}

impl Record for TestResult {
    type Draft = TestResultDraft;

    const COLLECTION: &'static str = "tests";
    const NAME: &'static str = "Test";

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: TestResultDraft) -> Self {
        Self {
            id,
            student_id: draft.student_id,
            course_id: draft.course_id,
            test_name: draft.test_name,
            date: draft.date,
            mark: draft.mark,
            out_of: draft.out_of,
            weight: draft.weight,
        }
    }

    fn apply(&mut self, draft: TestResultDraft) {
        patch(&mut self.student_id, draft.student_id);
        patch(&mut self.course_id, draft.course_id);
        patch(&mut self.test_name, draft.test_name);
        patch(&mut self.date, draft.date);
        patch(&mut self.mark, draft.mark);
        patch(&mut self.out_of, draft.out_of);
        patch(&mut self.weight, draft.weight);
    }
}

impl TestResult {
    pub fn belongs_to_student(&self, student_id: RecordId) -> bool {
        refers_to(self.student_id.as_ref(), student_id)
    }

    pub fn belongs_to_course(&self, course_id: RecordId) -> bool {
        refers_to(self.course_id.as_ref(), course_id)
    }
}

/// Strict numeric match: `"1"` does not refer to record 1, `1.0` does.
fn refers_to(reference: Option<&Value>, id: RecordId) -> bool {
    reference
        .and_then(Value::as_f64)
        .map_or(false, |value| value == id as f64)
}
