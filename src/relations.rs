use crate::err::Error;
use crate::models::{Course, Record, RecordId, Student, TestResult};
use crate::store::Store;

/// Tests written by `student_id`, in store order.
///
/// Only the student has to exist; a student without tests yields an empty list.
pub async fn tests_for_student(
    students: &Store<Student>,
    tests: &Store<TestResult>,
    student_id: RecordId,
) -> Result<Vec<TestResult>, Error> {
    if !students.contains(student_id).await {
        return Err(Error::not_found(Student::NAME));
    }
    Ok(tests.filter(|test| test.belongs_to_student(student_id)).await)
}

/// Tests taken in `course_id`, in store order.
pub async fn tests_for_course(
    courses: &Store<Course>,
    tests: &Store<TestResult>,
    course_id: RecordId,
) -> Result<Vec<TestResult>, Error> {
    if !courses.contains(course_id).await {
        return Err(Error::not_found(Course::NAME));
    }
    Ok(tests.filter(|test| test.belongs_to_course(course_id)).await)
}
