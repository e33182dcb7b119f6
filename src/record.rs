use std::fmt::Debug;
use std::hash::Hash;

/// How the values of a field are compared and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    NullableText,
    DateTime,
    /// Path or URL of a file, the empty string means there is no file.
    FileRef,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor<F: 'static> {
    pub field: F,
    pub label: &'static str,
    pub kind: FieldKind,
    pub sortable: bool,
    pub filterable: bool,
    /// Shown instead of an absent value.
    pub placeholder: &'static str,
}

/// A flat, displayable row of a table view.
///
/// Each view declares its columns once through `fields()`; the sort, filter
/// and pagination engines only ever talk to rows through this trait.
pub trait Record: Clone + Debug + Send + Sync + 'static {
    type Field: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn id(&self) -> &str;

    /// Raw value of a field, `None` when absent.
    fn value(&self, field: Self::Field) -> Option<&str>;

    fn fields() -> &'static [FieldDescriptor<Self::Field>];

    fn descriptor(field: Self::Field) -> Option<&'static FieldDescriptor<Self::Field>> {
        Self::fields().iter().find(|d| d.field == field)
    }

    fn kind(field: Self::Field) -> FieldKind {
        Self::descriptor(field)
            .map(|d| d.kind)
            .unwrap_or(FieldKind::Text)
    }

    fn is_sortable(field: Self::Field) -> bool {
        Self::descriptor(field).is_some_and(|d| d.sortable)
    }

    fn filter_keys() -> Vec<Self::Field> {
        Self::fields()
            .iter()
            .filter(|d| d.filterable)
            .map(|d| d.field)
            .collect()
    }

    /// The field a fresh view is sorted by.
    fn default_sort_field() -> Self::Field {
        Self::fields()
            .iter()
            .find(|d| d.sortable)
            .unwrap_or(&Self::fields()[0])
            .field
    }
}

/// Rows carrying a single transferable file.
pub trait Attachment: Record {
    fn file_ref(&self) -> &str;
    fn set_file_ref(&mut self, path: String);

    fn has_file(&self) -> bool {
        !self.file_ref().is_empty()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

// -------------------------------- Assignments -------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentField {
    CourseName,
    LevelName,
    SessionDate,
    Challenge,
    Assignment,
    Feedback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRow {
    pub id: String,
    pub course_name: String,
    pub level_name: String,
    pub session_date: String,
    pub challenge: Option<String>,
    pub assignment: String,
    pub feedback: Option<String>,
}

const ASSIGNMENT_FIELDS: &[FieldDescriptor<AssignmentField>] = &[
    FieldDescriptor {
        field: AssignmentField::CourseName,
        label: "Course Name",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: AssignmentField::LevelName,
        label: "Level Name",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: AssignmentField::SessionDate,
        label: "Session Date",
        kind: FieldKind::DateTime,
        sortable: true,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: AssignmentField::Challenge,
        label: "Challenge",
        kind: FieldKind::NullableText,
        sortable: false,
        filterable: false,
        placeholder: "No Challenge",
    },
    FieldDescriptor {
        field: AssignmentField::Assignment,
        label: "Assignment",
        kind: FieldKind::FileRef,
        sortable: false,
        filterable: false,
        placeholder: "No Assignment",
    },
    FieldDescriptor {
        field: AssignmentField::Feedback,
        label: "Feedback",
        kind: FieldKind::NullableText,
        sortable: false,
        filterable: false,
        placeholder: "No Feedback",
    },
];

impl Record for AssignmentRow {
    type Field = AssignmentField;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: AssignmentField) -> Option<&str> {
        match field {
            AssignmentField::CourseName => Some(&self.course_name),
            AssignmentField::LevelName => Some(&self.level_name),
            AssignmentField::SessionDate => Some(&self.session_date),
            AssignmentField::Challenge => self.challenge.as_deref(),
            AssignmentField::Assignment => non_empty(&self.assignment),
            AssignmentField::Feedback => self.feedback.as_deref(),
        }
    }

    fn fields() -> &'static [FieldDescriptor<AssignmentField>] {
        ASSIGNMENT_FIELDS
    }
}

impl Attachment for AssignmentRow {
    fn file_ref(&self) -> &str {
        &self.assignment
    }

    fn set_file_ref(&mut self, path: String) {
        self.assignment = path;
    }
}

// -------------------------------- Recordings --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingField {
    CourseName,
    LevelName,
    SessionDate,
    RecordingLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRow {
    pub id: String,
    pub course_name: String,
    pub level_name: String,
    pub session_date: String,
    pub recording_link: String,
}

const RECORDING_FIELDS: &[FieldDescriptor<RecordingField>] = &[
    FieldDescriptor {
        field: RecordingField::CourseName,
        label: "Course Name",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: RecordingField::LevelName,
        label: "Lesson Name",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: RecordingField::SessionDate,
        label: "Session Date",
        kind: FieldKind::DateTime,
        sortable: true,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: RecordingField::RecordingLink,
        label: "Recording Link",
        kind: FieldKind::FileRef,
        sortable: false,
        filterable: false,
        placeholder: "No Recording",
    },
];

impl Record for RecordingRow {
    type Field = RecordingField;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: RecordingField) -> Option<&str> {
        match field {
            RecordingField::CourseName => Some(&self.course_name),
            RecordingField::LevelName => Some(&self.level_name),
            RecordingField::SessionDate => Some(&self.session_date),
            RecordingField::RecordingLink => non_empty(&self.recording_link),
        }
    }

    fn fields() -> &'static [FieldDescriptor<RecordingField>] {
        RECORDING_FIELDS
    }
}

impl Attachment for RecordingRow {
    fn file_ref(&self) -> &str {
        &self.recording_link
    }

    fn set_file_ref(&mut self, path: String) {
        self.recording_link = path;
    }
}

// --------------------------------- Schedule ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleField {
    CourseName,
    LevelName,
    Name,
    Status,
    SessionDate,
    Time,
    Instructor,
    MeetingLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRow {
    pub id: String,
    pub course_name: String,
    pub level_name: String,
    pub name: String,
    pub status: String,
    pub session_date: String,
    pub time: String,
    pub instructor: String,
    pub meeting_link: Option<String>,
}

impl ScheduleRow {
    /// Sessions that already happened carry a status other than "not taken".
    pub fn is_taken(&self) -> bool {
        self.status != "not taken"
    }
}

const SCHEDULE_FIELDS: &[FieldDescriptor<ScheduleField>] = &[
    FieldDescriptor {
        field: ScheduleField::CourseName,
        label: "Course",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::LevelName,
        label: "Level",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::Name,
        label: "Session",
        kind: FieldKind::Text,
        sortable: false,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::Status,
        label: "Status",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::SessionDate,
        label: "Date",
        kind: FieldKind::DateTime,
        sortable: true,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::Time,
        label: "Time",
        kind: FieldKind::Text,
        sortable: false,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::Instructor,
        label: "Instructor",
        kind: FieldKind::Text,
        sortable: false,
        filterable: false,
        placeholder: "",
    },
    FieldDescriptor {
        field: ScheduleField::MeetingLink,
        label: "Meeting",
        kind: FieldKind::NullableText,
        sortable: false,
        filterable: false,
        placeholder: "No Link",
    },
];

impl Record for ScheduleRow {
    type Field = ScheduleField;

    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, field: ScheduleField) -> Option<&str> {
        match field {
            ScheduleField::CourseName => Some(&self.course_name),
            ScheduleField::LevelName => Some(&self.level_name),
            ScheduleField::Name => Some(&self.name),
            ScheduleField::Status => Some(&self.status),
            ScheduleField::SessionDate => Some(&self.session_date),
            ScheduleField::Time => Some(&self.time),
            ScheduleField::Instructor => Some(&self.instructor),
            ScheduleField::MeetingLink => self.meeting_link.as_deref(),
        }
    }

    fn fields() -> &'static [FieldDescriptor<ScheduleField>] {
        SCHEDULE_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(file: &str) -> AssignmentRow {
        AssignmentRow {
            id: "1".into(),
            course_name: "Scratch".into(),
            level_name: "Level 1".into(),
            session_date: "2024-01-02".into(),
            challenge: None,
            assignment: file.into(),
            feedback: Some("Good".into()),
        }
    }

    #[test]
    fn empty_file_ref_reads_as_absent() {
        let row = assignment("");
        assert_eq!(row.value(AssignmentField::Assignment), None);
        assert!(!row.has_file());

        let row = assignment("/files/a.pdf");
        assert_eq!(row.value(AssignmentField::Assignment), Some("/files/a.pdf"));
        assert!(row.has_file());
    }

    #[test]
    fn descriptors_drive_sort_and_filter_capabilities() {
        assert_eq!(AssignmentRow::default_sort_field(), AssignmentField::CourseName);
        assert_eq!(
            AssignmentRow::filter_keys(),
            vec![AssignmentField::CourseName, AssignmentField::LevelName]
        );
        assert!(AssignmentRow::is_sortable(AssignmentField::SessionDate));
        assert!(!AssignmentRow::is_sortable(AssignmentField::Feedback));
        assert_eq!(AssignmentRow::kind(AssignmentField::SessionDate), FieldKind::DateTime);
        assert_eq!(
            ScheduleRow::filter_keys(),
            vec![ScheduleField::CourseName, ScheduleField::LevelName, ScheduleField::Status]
        );
    }
}
