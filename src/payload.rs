//! Wire types of the student REST API.
//!
//! Every field tolerates being missing or `null`: malformed payloads degrade
//! to empty values instead of failing the whole response.

use serde::{Deserialize, Deserializer, Serialize};

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssignmentAttachment {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Instructor {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Meeting {
    pub meeting_link: Option<String>,
    pub recording_url: Option<String>,
    pub recording_download_url: Option<String>,
    pub invitation_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Session {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    #[serde(deserialize_with = "nullable")]
    pub time: String,
    pub challenge: Option<String>,
    pub feedback: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub instructor: Instructor,
    #[serde(deserialize_with = "nullable")]
    pub meeting: Meeting,
    #[serde(deserialize_with = "nullable")]
    pub assignment_attachment: Vec<AssignmentAttachment>,
}

/// A course level with its sessions, the top level unit of the sessions payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Level {
    #[serde(deserialize_with = "nullable")]
    pub level_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub course_name: String,
    #[serde(deserialize_with = "nullable")]
    pub level_name: String,
    #[serde(deserialize_with = "nullable")]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SessionsEnvelope {
    pub data: Option<SessionsData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SessionsData {
    pub levels: Option<Vec<Level>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    pub image: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub birth_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProfileEnvelope {
    pub student: Option<Profile>,
}

/// Fields of a profile update, absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub image: Option<std::path::PathBuf>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.name.is_none() && self.birth_date.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Certificate {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    pub attachment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CertificatesEnvelope {
    #[serde(deserialize_with = "nullable")]
    pub data: Vec<Certificate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StudentRound {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub day: String,
    #[serde(deserialize_with = "nullable")]
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgressStudent {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub points: i64,
    #[serde(deserialize_with = "nullable")]
    pub rounds: Vec<StudentRound>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Progress {
    #[serde(rename = "progressPercentage", deserialize_with = "nullable")]
    pub progress_percentage: f64,
    pub student: Option<ProgressStudent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadedAttachment {
    #[serde(deserialize_with = "nullable")]
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadData {
    pub attachment: Option<UploadedAttachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadResponse {
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    pub data: Option<UploadData>,
}

impl UploadResponse {
    pub fn success(file_path: impl Into<String>) -> Self {
        UploadResponse {
            status: "success".to_string(),
            data: Some(UploadData {
                attachment: Some(UploadedAttachment {
                    file_path: file_path.into(),
                }),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Path of the stored file, only for a successful upload.
    pub fn file_path(&self) -> Option<&str> {
        if !self.is_success() {
            return None;
        }
        self.data
            .as_ref()
            .and_then(|d| d.attachment.as_ref())
            .map(|a| a.file_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_payload_tolerates_nulls() {
        let raw = r#"{
            "data": {"levels": [{
                "level_id": 3,
                "course_name": "Scratch",
                "level_name": null,
                "sessions": [{
                    "id": 42,
                    "date": "2024-01-02",
                    "challenge": null,
                    "instructor": null,
                    "meeting": {"recording_download_url": "/rec/42.mp4"},
                    "assignment_attachment": null
                }]
            }]}
        }"#;
        let envelope: SessionsEnvelope = serde_json::from_str(raw).unwrap();
        let levels = envelope.data.unwrap().levels.unwrap();
        assert_eq!(levels[0].level_name, "");
        let session = &levels[0].sessions[0];
        assert_eq!(session.id, 42);
        assert!(session.assignment_attachment.is_empty());
        assert_eq!(session.instructor, Instructor::default());
        assert_eq!(
            session.meeting.recording_download_url.as_deref(),
            Some("/rec/42.mp4")
        );
    }

    #[test]
    fn upload_response_only_yields_path_on_success() {
        let ok: UploadResponse = serde_json::from_str(
            r#"{"status":"success","data":{"attachment":{"file_path":"/x/y.pdf"}}}"#,
        )
        .unwrap();
        assert_eq!(ok.file_path(), Some("/x/y.pdf"));

        let failed: UploadResponse = serde_json::from_str(
            r#"{"status":"error","data":{"attachment":{"file_path":"/x/y.pdf"}}}"#,
        )
        .unwrap();
        assert_eq!(failed.file_path(), None);
    }

    #[test]
    fn progress_reads_camel_case_percentage() {
        let progress: Progress =
            serde_json::from_str(r#"{"progressPercentage": 62.5, "student": null}"#).unwrap();
        assert_eq!(progress.progress_percentage, 62.5);
        assert!(progress.student.is_none());
    }
}
