use serde::{Deserialize, Serialize};

/// Film metadata owned by the external catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}
