//! Flattens the nested level/session payload into the rows of each table view.

use crate::payload::{Level, Session};
use crate::record::{AssignmentRow, RecordingRow, ScheduleRow};

fn optional(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn sessions(levels: Option<&[Level]>) -> impl Iterator<Item = (&Level, &Session)> {
    levels
        .unwrap_or_default()
        .iter()
        .flat_map(|level| level.sessions.iter().map(move |session| (level, session)))
}

/// One row per session, carrying the first assignment attachment if any.
pub fn assignments(levels: Option<&[Level]>) -> Vec<AssignmentRow> {
    sessions(levels)
        .map(|(level, session)| AssignmentRow {
            id: session.id.to_string(),
            course_name: level.course_name.clone(),
            level_name: level.level_name.clone(),
            session_date: session.date.clone(),
            challenge: optional(&session.challenge),
            assignment: session
                .assignment_attachment
                .first()
                .map(|a| a.file_path.clone())
                .unwrap_or_default(),
            feedback: optional(&session.feedback),
        })
        .collect()
}

pub fn recordings(levels: Option<&[Level]>) -> Vec<RecordingRow> {
    sessions(levels)
        .map(|(level, session)| RecordingRow {
            id: session.id.to_string(),
            course_name: level.course_name.clone(),
            level_name: level.level_name.clone(),
            session_date: session.date.clone(),
            recording_link: session
                .meeting
                .recording_download_url
                .clone()
                .unwrap_or_default(),
        })
        .collect()
}

pub fn schedule(levels: Option<&[Level]>) -> Vec<ScheduleRow> {
    sessions(levels)
        .map(|(level, session)| ScheduleRow {
            id: session.id.to_string(),
            course_name: level.course_name.clone(),
            level_name: level.level_name.clone(),
            name: session.name.clone(),
            status: session.status.clone(),
            session_date: session.date.clone(),
            time: session.time.clone(),
            instructor: session.instructor.name.clone(),
            meeting_link: optional(&session.meeting.meeting_link),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AssignmentAttachment, Meeting};

    fn levels() -> Vec<Level> {
        vec![
            Level {
                level_id: 1,
                course_name: "Scratch".into(),
                level_name: "Level 1".into(),
                sessions: vec![
                    Session {
                        id: 7,
                        date: "2024-01-02".into(),
                        challenge: Some("Maze".into()),
                        feedback: Some(String::new()),
                        assignment_attachment: vec![
                            AssignmentAttachment { id: 1, file_path: "/a/first.pdf".into() },
                            AssignmentAttachment { id: 2, file_path: "/a/second.pdf".into() },
                        ],
                        ..Default::default()
                    },
                    Session {
                        id: 8,
                        date: "2024-01-09".into(),
                        meeting: Meeting {
                            recording_download_url: Some("/rec/8.mp4".into()),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                ],
            },
            Level {
                level_id: 2,
                course_name: "Python".into(),
                level_name: "Level 2".into(),
                sessions: vec![Session { id: 9, ..Default::default() }],
            },
        ]
    }

    #[test]
    fn one_row_per_session_in_payload_order() {
        let levels = levels();
        let rows = assignments(Some(&levels));
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8", "9"]);
        assert_eq!(rows[2].course_name, "Python");
        assert_eq!(rows[2].level_name, "Level 2");
    }

    #[test]
    fn assignment_uses_first_attachment_or_empty() {
        let levels = levels();
        let rows = assignments(Some(&levels));
        assert_eq!(rows[0].assignment, "/a/first.pdf");
        assert_eq!(rows[1].assignment, "");
        assert_eq!(rows[0].challenge.as_deref(), Some("Maze"));
        assert_eq!(rows[0].feedback, None);
    }

    #[test]
    fn recording_link_defaults_to_empty() {
        let levels = levels();
        let rows = recordings(Some(&levels));
        assert_eq!(rows[0].recording_link, "");
        assert_eq!(rows[1].recording_link, "/rec/8.mp4");
    }

    #[test]
    fn absent_payload_projects_to_nothing() {
        assert!(assignments(None).is_empty());
        assert!(recordings(None).is_empty());
        assert!(schedule(Some(&[])).is_empty());
    }
}
