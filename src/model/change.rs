use serde::{Deserialize, Serialize};

// Codes as stored in the dataset's status columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    Ordered,
    InProgress,
    NotInspected,
    Completed,
    Aborted,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Ordered => 1,
            Status::InProgress => 2,
            Status::NotInspected => 3,
            Status::Completed => 4,
            Status::Aborted => 5,
        }
    }
}

impl From<Status> for u8 {
    fn from(s: Status) -> u8 {
        s.code()
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Status::Ordered),
            2 => Ok(Status::InProgress),
            3 => Ok(Status::NotInspected),
            4 => Ok(Status::Completed),
            5 => Ok(Status::Aborted),
            other => Err(format!("unknown status code {}", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentStatusChange {
    pub lsid: i64,
    pub new_status: Status,
    pub comment: String,
    pub project_area_id: String,
    pub changed_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectStatusChange {
    #[serde(rename = "GlobalID")]
    pub global_id: String,
    pub new_status: Status,
    pub comments_inspector: String,
    pub changed_at: String,
}
