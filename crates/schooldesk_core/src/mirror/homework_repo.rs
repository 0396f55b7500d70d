use super::state::MirrorState;
use super::MirrorStore;
use crate::model::homework::{
    Homework, HomeworkDetail, HomeworkPatch, HomeworkState, HomeworkStatusUpdate,
    HomeworkSubmission, NewHomework, StudentHomework,
};
use crate::model::{now_ms, RecordId};
use crate::repo::{HomeworkRepository, RepoError, RepoResult};

impl HomeworkRepository for MirrorStore {
    fn list_homework(&self) -> RepoResult<Vec<Homework>> {
        self.read(|state| Ok(state.homework.values().cloned().collect()))
    }

    fn get_homework(&self, id: RecordId) -> RepoResult<Option<Homework>> {
        self.read(|state| Ok(state.homework.get(&id).cloned()))
    }

    fn create_homework(&self, homework: &NewHomework) -> RepoResult<RecordId> {
        let row = homework.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_homework(&self, id: RecordId, patch: &HomeworkPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Homework>(id, |row| patch.apply(row, now)))
    }

    fn delete_homework(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Homework>(id))
    }

    fn homework_by_class(
        &self,
        class_id: RecordId,
        section_id: Option<RecordId>,
    ) -> RepoResult<Vec<HomeworkDetail>> {
        self.read(|state| {
            Ok(state
                .homework
                .values()
                .filter(|homework| {
                    homework.is_active
                        && homework.class_id == class_id
                        && section_id.map_or(true, |id| homework.section_id == id)
                })
                .filter_map(|homework| detail(state, homework))
                .collect())
        })
    }

    fn homework_for_student(
        &self,
        student_id: RecordId,
        class_id: RecordId,
        section_id: RecordId,
    ) -> RepoResult<Vec<StudentHomework>> {
        self.read(|state| {
            Ok(state
                .homework
                .values()
                .filter(|homework| {
                    homework.is_active
                        && homework.class_id == class_id
                        && homework.section_id == section_id
                })
                .filter_map(|homework| {
                    let detail = detail(state, homework)?;
                    let submission = find_status(state, homework.id, student_id);
                    Some(StudentHomework {
                        detail,
                        status: submission.map_or(HomeworkState::Pending, |row| row.status),
                        comments: submission.and_then(|row| row.comments.clone()),
                        submission_date: submission.map(|row| row.submission_date),
                    })
                })
                .collect())
        })
    }

    fn homework_history(&self, student_id: RecordId) -> RepoResult<Vec<StudentHomework>> {
        self.read(|state| {
            let mut history: Vec<StudentHomework> = state
                .homework_status
                .values()
                .filter(|row| {
                    row.student_id == student_id && row.status == HomeworkState::Completed
                })
                .filter_map(|row| {
                    let homework = state.homework.get(&row.homework_id)?;
                    Some(StudentHomework {
                        detail: detail(state, homework)?,
                        status: row.status,
                        comments: row.comments.clone(),
                        submission_date: Some(row.submission_date),
                    })
                })
                .collect();
            history.sort_by_key(|entry| entry.detail.homework.id);
            Ok(history)
        })
    }

    fn update_homework_status(
        &self,
        update: &HomeworkStatusUpdate,
    ) -> RepoResult<HomeworkSubmission> {
        let now = now_ms();
        self.write(|tx| {
            let existing = find_status(tx.state(), update.homework_id, update.student_id)
                .map(|row| row.id);
            let id = match existing {
                Some(id) => {
                    tx.update::<HomeworkSubmission>(id, |row| {
                        row.status = update.status;
                        row.comments = update.comments.clone();
                        row.updated_at = now;
                    })?;
                    id
                }
                None => tx.insert(HomeworkSubmission {
                    id: 0,
                    homework_id: update.homework_id,
                    student_id: update.student_id,
                    status: update.status,
                    comments: update.comments.clone(),
                    submission_date: now,
                    created_at: now,
                    updated_at: now,
                })?,
            };
            tx.state().homework_status.get(&id).cloned().ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "homework status for homework {} student {} missing after upsert",
                    update.homework_id, update.student_id
                ))
            })
        })
    }

    fn get_homework_status(
        &self,
        homework_id: RecordId,
        student_id: RecordId,
    ) -> RepoResult<Option<HomeworkSubmission>> {
        self.read(|state| Ok(find_status(state, homework_id, student_id).cloned()))
    }
}

fn find_status(
    state: &MirrorState,
    homework_id: RecordId,
    student_id: RecordId,
) -> Option<&HomeworkSubmission> {
    state
        .homework_status
        .values()
        .find(|row| row.homework_id == homework_id && row.student_id == student_id)
}

fn detail(state: &MirrorState, homework: &Homework) -> Option<HomeworkDetail> {
    let subject = state.subjects.get(&homework.subject_id)?;
    let teacher = state.teachers.get(&homework.teacher_id)?;
    let teacher_user = state.users.get(&teacher.user_id)?;
    Some(HomeworkDetail {
        homework: homework.clone(),
        subject_name: subject.name.clone(),
        subject_code: subject.code.clone(),
        teacher_name: teacher_user.full_name(),
    })
}
