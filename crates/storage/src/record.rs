use serde::{Deserialize, Serialize};

/// Collection paths used by the field-visit core.
pub mod collections {
    pub const VISITS: &str = "visits";
    pub const TASKS: &str = "tasks";
    pub const PLOTS: &str = "plots";
    pub const CROP_CYCLES: &str = "crop_cycles";

    /// Sub-collection of observations under a visit.
    pub fn observations(visit_id: &str) -> String {
        format!("{VISITS}/{visit_id}/observations")
    }

    /// Sub-collection of field activities under a crop cycle.
    pub fn activities(cycle_id: &str) -> String {
        format!("{CROP_CYCLES}/{cycle_id}/activities")
    }
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coords {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Lifecycle status of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    InProgress,
    Completed,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
        }
    }
}

/// A field visit as stored in `visits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: String,
    pub agronomist_id: String,
    pub client_id: String,
    pub property_id: String,
    pub property_name: String,
    pub client_name: String,
    /// RFC 3339 timestamp assigned by the store.
    pub check_in_time: String,
    pub check_in_coords: Coords,
    /// RFC 3339 timestamp assigned by the store. None until check-out.
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub check_out_coords: Option<Coords>,
    pub status: VisitStatus,
}

/// An observation attached to a visit, stored in `visits/{id}/observations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub coords: Coords,
    /// RFC 3339 timestamp assigned by the store.
    pub timestamp: String,
}

/// A scheduled task stored in `tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agronomist_id: String,
    pub title: String,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    pub due_date: String,
    pub property_id: String,
    pub plot_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
}

/// A plot belonging to a property, stored in `plots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRecord {
    pub id: String,
    pub property_id: String,
    pub name: String,
}

/// A crop cycle on a plot, stored in `crop_cycles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropCycleRecord {
    pub id: String,
    pub plot_id: String,
    pub crop: String,
    /// `active` or `closed`.
    pub status: String,
}

/// A field activity recorded against a crop cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub plot_id: String,
    pub kind: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub agronomist_id: String,
    pub recorded_at: String,
}
