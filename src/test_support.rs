use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use time::macros::datetime;
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, redis::RedisHandle, security, state::AppState};
use crate::db::models::{
    AppUser, Attempt, Content, Course, Enrollment, Evaluation, Period, Quiz, StudentProfile,
    Subject, Subtopic, TeacherAssignment, Topic,
};
use crate::db::relation::{
    EvaluationChain, PeriodNode, QuizChain, Related, SubjectNode, SubtopicNode, TopicNode,
};
use crate::db::types::{AssessmentKind, ContentKind, IdentityId, ProfileId, UserRole};
use crate::repositories::{AcademicStore, StoreError, StoreResult};
use crate::services::hierarchy::HierarchyLevel;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<InMemoryStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("APP_ENV", "test");
    std::env::set_var("APP_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("ALGORITHM", "HS256");
    std::env::set_var("REDIS_HOST", "127.0.0.1");
    std::env::set_var("REDIS_PORT", "6379");
    std::env::set_var("REDIS_DB", "1");
    std::env::remove_var("REDIS_PASSWORD");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("REPORT_MAX_CONCURRENCY");
    std::env::remove_var("REPORT_BRANCH_TIMEOUT_SECONDS");
    std::env::remove_var("REPORT_RATE_LIMIT_PER_MINUTE");
}

/// Router over an in-memory store. Redis is never connected, so rate
/// limiting fails open.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(InMemoryStore::default());
    let redis = RedisHandle::new(settings.redis().redis_url());

    let state = AppState::new(settings, store.clone(), redis);
    let app = api::router::router(state.clone());

    TestContext { state, app, store, _guard: guard }
}

pub(crate) fn bearer_token(user: IdentityId, settings: &Settings) -> String {
    security::create_access_token(&user.to_string(), settings, time::Duration::minutes(30))
        .expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// One subject with a single period → topic → subtopic path under it.
#[derive(Debug, Clone)]
pub(crate) struct SubjectPath {
    pub(crate) subject: Subject,
    pub(crate) period: Period,
    pub(crate) topic: Topic,
    pub(crate) subtopic: Subtopic,
}

#[derive(Default)]
struct Data {
    courses: Vec<Course>,
    subjects: Vec<Subject>,
    periods: Vec<Period>,
    topics: Vec<Topic>,
    subtopics: Vec<Subtopic>,
    contents: Vec<Content>,
    quizzes: Vec<Quiz>,
    evaluations: Vec<Evaluation>,
    quiz_attempts: Vec<Attempt>,
    evaluation_attempts: Vec<Attempt>,
    enrollments: Vec<Enrollment>,
    students: Vec<StudentProfile>,
    users: Vec<AppUser>,
    teacher_assignments: Vec<TeacherAssignment>,
    guardian_links: Vec<(IdentityId, ProfileId)>,
    stripped_embeds: HashSet<HierarchyLevel>,
    detached_topics: HashSet<Uuid>,
    failing_subjects: HashSet<Uuid>,
    failing_courses: HashSet<Uuid>,
    slow_subjects: HashMap<Uuid, Duration>,
    fail_all: bool,
    direct_lookups: usize,
    attempt_clock: i64,
}

/// Store fake with failure injection and nested-fetch degradation.
#[derive(Default)]
pub(crate) struct InMemoryStore {
    data: Mutex<Data>,
}

impl InMemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Data) -> R) -> R {
        let mut data = self.data.lock().expect("store lock");
        f(&mut data)
    }

    fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> StoreResult<R> {
        let data = self.data.lock().expect("store lock");
        if data.fail_all {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(f(&data))
    }

    pub(crate) fn add_course(&self, name: &str) -> Course {
        let course = Course { id: Uuid::new_v4(), name: name.to_string(), level: None };
        self.with(|data| data.courses.push(course.clone()));
        course
    }

    pub(crate) fn add_subject(&self, course_id: Uuid, name: &str) -> Subject {
        let subject = Subject { id: Uuid::new_v4(), name: name.to_string(), course_id };
        self.with(|data| data.subjects.push(subject.clone()));
        subject
    }

    pub(crate) fn add_period(&self, subject_id: Uuid, name: &str, number: i32) -> Period {
        let period = Period {
            id: Uuid::new_v4(),
            name: name.to_string(),
            number,
            starts_at: None,
            ends_at: None,
            subject_id,
        };
        self.with(|data| data.periods.push(period.clone()));
        period
    }

    pub(crate) fn add_topic(&self, period_id: Uuid, name: &str) -> Topic {
        let topic = Topic { id: Uuid::new_v4(), name: name.to_string(), period_id };
        self.with(|data| data.topics.push(topic.clone()));
        topic
    }

    pub(crate) fn add_subtopic(&self, topic_id: Uuid, name: &str) -> Subtopic {
        let subtopic = Subtopic { id: Uuid::new_v4(), name: name.to_string(), topic_id };
        self.with(|data| data.subtopics.push(subtopic.clone()));
        subtopic
    }

    pub(crate) fn add_content(&self, subtopic_id: Uuid, title: &str, kind: ContentKind) -> Content {
        let content = Content { id: Uuid::new_v4(), title: title.to_string(), kind, subtopic_id };
        self.with(|data| data.contents.push(content.clone()));
        content
    }

    pub(crate) fn add_quiz(&self, subtopic_id: Uuid, name: &str) -> Quiz {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subtopic_id,
            opens_at: None,
            closes_at: None,
            is_active: true,
        };
        self.with(|data| data.quizzes.push(quiz.clone()));
        quiz
    }

    pub(crate) fn add_evaluation(
        &self,
        period_id: Uuid,
        subject_id: Uuid,
        name: &str,
    ) -> Evaluation {
        let evaluation = Evaluation {
            id: Uuid::new_v4(),
            name: name.to_string(),
            period_id,
            subject_id,
            opens_at: None,
            closes_at: None,
        };
        self.with(|data| data.evaluations.push(evaluation.clone()));
        evaluation
    }

    pub(crate) fn add_subject_path(&self, course_id: Uuid, name: &str) -> SubjectPath {
        let subject = self.add_subject(course_id, name);
        let period = self.add_period(subject.id, "Periodo 1", 1);
        let topic = self.add_topic(period.id, &format!("{name} basics"));
        let subtopic = self.add_subtopic(topic.id, &format!("{name} intro"));
        SubjectPath { subject, period, topic, subtopic }
    }

    pub(crate) fn add_user(&self, full_name: &str, role: UserRole) -> AppUser {
        let user = AppUser {
            id: IdentityId(Uuid::new_v4()),
            full_name: full_name.to_string(),
            role,
            is_active: true,
        };
        self.with(|data| data.users.push(user.clone()));
        user
    }

    /// A student profile; `linked` also creates the matching login identity.
    pub(crate) fn add_student(&self, full_name: &str, linked: bool) -> StudentProfile {
        let identity_id = linked.then(|| self.add_user(full_name, UserRole::Student).id);
        let profile = StudentProfile {
            id: ProfileId(Uuid::new_v4()),
            identity_id,
            full_name: full_name.to_string(),
        };
        self.with(|data| data.students.push(profile.clone()));
        profile
    }

    pub(crate) fn enroll(&self, student: ProfileId, course_id: Uuid) {
        self.with(|data| data.enrollments.push(Enrollment { student_id: student, course_id }));
    }

    pub(crate) fn assign_teacher(&self, teacher: IdentityId, course_id: Uuid) {
        self.with(|data| {
            data.teacher_assignments.push(TeacherAssignment { teacher_id: teacher.0, course_id })
        });
    }

    pub(crate) fn link_guardian(&self, guardian: IdentityId, student: ProfileId) {
        self.with(|data| data.guardian_links.push((guardian, student)));
    }

    pub(crate) fn record_quiz_attempt(
        &self,
        student: IdentityId,
        quiz_id: Uuid,
        grade: Option<f64>,
        completed: bool,
    ) -> Attempt {
        self.with(|data| {
            let attempt =
                next_attempt(data, AssessmentKind::Quiz, student, quiz_id, grade, completed);
            data.quiz_attempts.push(attempt.clone());
            attempt
        })
    }

    pub(crate) fn record_evaluation_attempt(
        &self,
        student: IdentityId,
        evaluation_id: Uuid,
        grade: Option<f64>,
        completed: bool,
    ) -> Attempt {
        self.with(|data| {
            let kind = AssessmentKind::Evaluation;
            let attempt = next_attempt(data, kind, student, evaluation_id, grade, completed);
            data.evaluation_attempts.push(attempt.clone());
            attempt
        })
    }

    /// Nested fetches leave out the embed at `level` (and everything it would
    /// have carried), as a broken join would.
    pub(crate) fn strip_embed(&self, level: HierarchyLevel) {
        self.with(|data| {
            data.stripped_embeds.insert(level);
        });
    }

    /// The topic still lists under its period, but neither the nested fetch
    /// nor a by-id lookup can reach it from below.
    pub(crate) fn detach_topic(&self, topic_id: Uuid) {
        self.with(|data| {
            data.detached_topics.insert(topic_id);
        });
    }

    /// Every read touching this subject fails.
    pub(crate) fn fail_subject(&self, subject_id: Uuid) {
        self.with(|data| {
            data.failing_subjects.insert(subject_id);
        });
    }

    pub(crate) fn fail_course(&self, course_id: Uuid) {
        self.with(|data| {
            data.failing_courses.insert(course_id);
        });
    }

    pub(crate) fn slow_subject(&self, subject_id: Uuid, delay: Duration) {
        self.with(|data| {
            data.slow_subjects.insert(subject_id, delay);
        });
    }

    pub(crate) fn fail_all_reads(&self) {
        self.with(|data| data.fail_all = true);
    }

    /// Number of by-id lookups served so far.
    pub(crate) fn direct_lookups(&self) -> usize {
        self.with(|data| data.direct_lookups)
    }

    fn count_lookup(&self) {
        self.with(|data| data.direct_lookups += 1);
    }

    fn subject_guard(&self, subject_ids: &[Uuid]) -> StoreResult<Option<Duration>> {
        self.read(|data| {
            if subject_ids.iter().any(|id| data.failing_subjects.contains(id)) {
                return Err(StoreError::Unavailable("injected subject failure".to_string()));
            }
            Ok(subject_ids.iter().filter_map(|id| data.slow_subjects.get(id).copied()).max())
        })?
    }
}

fn next_attempt(
    data: &mut Data,
    kind: AssessmentKind,
    student: IdentityId,
    assessment_id: Uuid,
    grade: Option<f64>,
    completed: bool,
) -> Attempt {
    data.attempt_clock += 1;
    let started_at = datetime!(2025-03-03 08:00 UTC) + time::Duration::minutes(data.attempt_clock);
    let finished_at: Option<OffsetDateTime> =
        completed.then(|| started_at + time::Duration::minutes(30));
    Attempt {
        id: Uuid::new_v4(),
        kind,
        assessment_id,
        student_id: student,
        grade,
        completed,
        started_at: Some(started_at),
        finished_at,
    }
}

fn subject_node(data: &Data, subject_id: Uuid) -> Related<SubjectNode> {
    if data.stripped_embeds.contains(&HierarchyLevel::Subject) {
        return Related::Missing;
    }
    let node = data.subjects.iter().find(|subject| subject.id == subject_id).map(|subject| {
        let course = if data.stripped_embeds.contains(&HierarchyLevel::Course) {
            Related::Missing
        } else {
            data.courses.iter().find(|course| course.id == subject.course_id).cloned().into()
        };
        SubjectNode {
            id: subject.id,
            name: subject.name.clone(),
            course_id: Some(subject.course_id),
            course,
        }
    });
    node.into()
}

fn period_node(data: &Data, period_id: Uuid) -> Related<PeriodNode> {
    if data.stripped_embeds.contains(&HierarchyLevel::Period) {
        return Related::Missing;
    }
    let node = data.periods.iter().find(|period| period.id == period_id).map(|period| PeriodNode {
        id: period.id,
        name: period.name.clone(),
        number: period.number,
        starts_at: period.starts_at,
        ends_at: period.ends_at,
        subject_id: Some(period.subject_id),
        subject: subject_node(data, period.subject_id),
    });
    node.into()
}

fn subtopic_node(data: &Data, subtopic_id: Uuid) -> Related<SubtopicNode> {
    if data.stripped_embeds.contains(&HierarchyLevel::Subtopic) {
        return Related::Missing;
    }
    let node = data.subtopics.iter().find(|subtopic| subtopic.id == subtopic_id).map(|subtopic| {
        // Postgres hands the topic back through json_agg, so it arrives as an array.
        let topic = if data.stripped_embeds.contains(&HierarchyLevel::Topic) {
            Related::Missing
        } else {
            Related::Many(
                data.topics
                    .iter()
                    .filter(|topic| {
                        topic.id == subtopic.topic_id && !data.detached_topics.contains(&topic.id)
                    })
                    .map(|topic| TopicNode {
                        id: topic.id,
                        name: topic.name.clone(),
                        period_id: Some(topic.period_id),
                        period: period_node(data, topic.period_id),
                    })
                    .collect(),
            )
        };
        SubtopicNode {
            id: subtopic.id,
            name: subtopic.name.clone(),
            topic_id: Some(subtopic.topic_id),
            topic,
        }
    });
    node.into()
}

fn contains(ids: &[Uuid], id: Uuid) -> bool {
    ids.contains(&id)
}

#[async_trait]
impl AcademicStore for InMemoryStore {
    async fn get_courses(&self, ids: Option<&[Uuid]>) -> StoreResult<Vec<Course>> {
        self.read(|data| {
            data.courses
                .iter()
                .filter(|course| ids.map_or(true, |ids| contains(ids, course.id)))
                .cloned()
                .collect()
        })
    }

    async fn get_subjects(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Subject>> {
        self.read(|data| {
            if course_ids.iter().any(|id| data.failing_courses.contains(id)) {
                return Err(StoreError::Unavailable("injected course failure".to_string()));
            }
            Ok(data
                .subjects
                .iter()
                .filter(|subject| contains(course_ids, subject.course_id))
                .cloned()
                .collect())
        })?
    }

    async fn get_periods(&self, subject_ids: &[Uuid]) -> StoreResult<Vec<Period>> {
        if let Some(delay) = self.subject_guard(subject_ids)? {
            tokio::time::sleep(delay).await;
        }
        self.read(|data| {
            data.periods
                .iter()
                .filter(|period| contains(subject_ids, period.subject_id))
                .cloned()
                .collect()
        })
    }

    async fn get_topics(&self, period_ids: &[Uuid]) -> StoreResult<Vec<Topic>> {
        self.read(|data| {
            let topics = data.topics.iter();
            topics.filter(|topic| contains(period_ids, topic.period_id)).cloned().collect()
        })
    }

    async fn get_subtopics(&self, topic_ids: &[Uuid]) -> StoreResult<Vec<Subtopic>> {
        self.read(|data| {
            data.subtopics
                .iter()
                .filter(|subtopic| contains(topic_ids, subtopic.topic_id))
                .cloned()
                .collect()
        })
    }

    async fn get_contents(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Content>> {
        self.read(|data| {
            data.contents
                .iter()
                .filter(|content| contains(subtopic_ids, content.subtopic_id))
                .cloned()
                .collect()
        })
    }

    async fn find_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        self.count_lookup();
        self.read(|data| data.courses.iter().find(|course| course.id == id).cloned())
    }

    async fn find_subject(&self, id: Uuid) -> StoreResult<Option<Subject>> {
        self.count_lookup();
        self.read(|data| data.subjects.iter().find(|subject| subject.id == id).cloned())
    }

    async fn find_period(&self, id: Uuid) -> StoreResult<Option<Period>> {
        self.count_lookup();
        self.read(|data| data.periods.iter().find(|period| period.id == id).cloned())
    }

    async fn find_topic(&self, id: Uuid) -> StoreResult<Option<Topic>> {
        self.count_lookup();
        self.read(|data| {
            let detached = data.detached_topics.contains(&id);
            data.topics.iter().find(|topic| topic.id == id && !detached).cloned()
        })
    }

    async fn find_subtopic(&self, id: Uuid) -> StoreResult<Option<Subtopic>> {
        self.count_lookup();
        self.read(|data| data.subtopics.iter().find(|subtopic| subtopic.id == id).cloned())
    }

    async fn get_quizzes(&self, subtopic_ids: &[Uuid]) -> StoreResult<Vec<Quiz>> {
        self.read(|data| {
            let quizzes = data.quizzes.iter();
            quizzes.filter(|quiz| contains(subtopic_ids, quiz.subtopic_id)).cloned().collect()
        })
    }

    async fn get_quizzes_by_ids(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<Quiz>> {
        self.read(|data| {
            data.quizzes.iter().filter(|quiz| contains(quiz_ids, quiz.id)).cloned().collect()
        })
    }

    async fn get_evaluations(
        &self,
        period_ids: &[Uuid],
        subject_ids: &[Uuid],
    ) -> StoreResult<Vec<Evaluation>> {
        self.read(|data| {
            data.evaluations
                .iter()
                .filter(|evaluation| {
                    contains(period_ids, evaluation.period_id)
                        || contains(subject_ids, evaluation.subject_id)
                })
                .cloned()
                .collect()
        })
    }

    async fn get_evaluations_by_ids(
        &self,
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<Evaluation>> {
        self.read(|data| {
            data.evaluations
                .iter()
                .filter(|evaluation| contains(evaluation_ids, evaluation.id))
                .cloned()
                .collect()
        })
    }

    async fn quiz_chains(&self, quiz_ids: &[Uuid]) -> StoreResult<Vec<QuizChain>> {
        self.read(|data| {
            data.quizzes
                .iter()
                .filter(|quiz| contains(quiz_ids, quiz.id))
                .map(|quiz| QuizChain {
                    id: quiz.id,
                    name: quiz.name.clone(),
                    subtopic_id: Some(quiz.subtopic_id),
                    subtopic: subtopic_node(data, quiz.subtopic_id),
                })
                .collect()
        })
    }

    async fn evaluation_chains(
        &self,
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<EvaluationChain>> {
        self.read(|data| {
            data.evaluations
                .iter()
                .filter(|evaluation| contains(evaluation_ids, evaluation.id))
                .map(|evaluation| EvaluationChain {
                    id: evaluation.id,
                    name: evaluation.name.clone(),
                    period_id: Some(evaluation.period_id),
                    subject_id: Some(evaluation.subject_id),
                    period: period_node(data, evaluation.period_id),
                    subject: subject_node(data, evaluation.subject_id),
                })
                .collect()
        })
    }

    async fn get_quiz_attempts(
        &self,
        identity_ids: &[IdentityId],
        quiz_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>> {
        self.read(|data| {
            data.quiz_attempts
                .iter()
                .filter(|attempt| {
                    identity_ids.contains(&attempt.student_id)
                        && contains(quiz_ids, attempt.assessment_id)
                })
                .cloned()
                .collect()
        })
    }

    async fn get_evaluation_attempts(
        &self,
        identity_ids: &[IdentityId],
        evaluation_ids: &[Uuid],
    ) -> StoreResult<Vec<Attempt>> {
        self.read(|data| {
            data.evaluation_attempts
                .iter()
                .filter(|attempt| {
                    identity_ids.contains(&attempt.student_id)
                        && contains(evaluation_ids, attempt.assessment_id)
                })
                .cloned()
                .collect()
        })
    }

    async fn get_enrollments(&self, course_ids: &[Uuid]) -> StoreResult<Vec<Enrollment>> {
        self.read(|data| {
            data.enrollments
                .iter()
                .filter(|enrollment| contains(course_ids, enrollment.course_id))
                .cloned()
                .collect()
        })
    }

    async fn get_enrollments_for_students(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<Vec<Enrollment>> {
        self.read(|data| {
            data.enrollments
                .iter()
                .filter(|enrollment| profile_ids.contains(&enrollment.student_id))
                .cloned()
                .collect()
        })
    }

    async fn get_profile_identity_map(
        &self,
        profile_ids: &[ProfileId],
    ) -> StoreResult<HashMap<ProfileId, IdentityId>> {
        self.read(|data| {
            data.students
                .iter()
                .filter(|student| profile_ids.contains(&student.id))
                .filter_map(|student| student.identity_id.map(|identity| (student.id, identity)))
                .collect()
        })
    }

    async fn get_students(&self, profile_ids: &[ProfileId]) -> StoreResult<Vec<StudentProfile>> {
        self.read(|data| {
            let students = data.students.iter();
            students.filter(|student| profile_ids.contains(&student.id)).cloned().collect()
        })
    }

    async fn get_teacher_assignments(
        &self,
        teacher: IdentityId,
    ) -> StoreResult<Vec<TeacherAssignment>> {
        self.read(|data| {
            data.teacher_assignments
                .iter()
                .filter(|assignment| assignment.teacher_id == teacher.0)
                .cloned()
                .collect()
        })
    }

    async fn get_guardian_students(&self, guardian: IdentityId) -> StoreResult<Vec<ProfileId>> {
        self.read(|data| {
            data.guardian_links
                .iter()
                .filter(|(linked_guardian, _)| *linked_guardian == guardian)
                .map(|(_, student)| *student)
                .collect()
        })
    }

    async fn find_user(&self, id: IdentityId) -> StoreResult<Option<AppUser>> {
        self.read(|data| data.users.iter().find(|user| user.id == id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read(|_| ())
    }
}
