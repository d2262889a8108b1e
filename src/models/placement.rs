use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One of the three placement slots a student can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementSlot {
    One,
    Two,
    Three,
}

impl PlacementSlot {
    pub const ALL: [PlacementSlot; 3] = [PlacementSlot::One, PlacementSlot::Two, PlacementSlot::Three];

    /// Name of the user field holding this slot's reference.
    pub fn field(&self) -> &'static str {
        match self {
            PlacementSlot::One => "placementOne",
            PlacementSlot::Two => "placementTwo",
            PlacementSlot::Three => "placementThree",
        }
    }
}

/// Document in the "placements" collection. Owned by exactly one user through `student`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student: ObjectId,
    pub company: String,
    pub role: String,
    pub ctc: f64,
    pub date: String,
    pub doc: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime>,
}

#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResponse {
    pub id: String,
    pub student: String,
    pub company: String,
    pub role: String,
    pub ctc: f64,
    pub date: String,
    pub doc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&Placement> for PlacementResponse {
    fn from(placement: &Placement) -> Self {
        Self {
            id: placement.id.to_hex(),
            student: placement.student.to_hex(),
            company: placement.company.clone(),
            role: placement.role.clone(),
            ctc: placement.ctc,
            date: placement.date.clone(),
            doc: placement.doc.clone(),
            created_at: placement
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct PlacementSummary {
    pub company: String,
    pub ctc: f64,
}

impl From<&Placement> for PlacementSummary {
    fn from(placement: &Placement) -> Self {
        Self {
            company: placement.company.clone(),
            ctc: placement.ctc,
        }
    }
}

/// Row of the admin placement report.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDetailsRow {
    pub full_name: String,
    pub roll_number: String,
    pub branch: Option<String>,
    pub placement_one: Option<PlacementSummary>,
    pub placement_two: Option<PlacementSummary>,
    pub placement_three: Option<PlacementSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_fields() {
        let fields: Vec<_> = PlacementSlot::ALL.iter().map(|s| s.field()).collect();
        assert_eq!(fields, vec!["placementOne", "placementTwo", "placementThree"]);
    }

    #[test]
    fn test_response_uses_hex_ids() {
        let placement = Placement {
            id: ObjectId::new(),
            student: ObjectId::new(),
            company: "Acme".into(),
            role: "SDE".into(),
            ctc: 18.5,
            date: "2024-07-01".into(),
            doc: "https://media.example/offer.pdf".into(),
            created_at: Some(DateTime::from_millis(0)),
        };

        let json = serde_json::to_value(PlacementResponse::from(&placement)).unwrap();
        assert_eq!(json["id"], placement.id.to_hex());
        assert_eq!(json["student"], placement.student.to_hex());
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(PlacementSummary::from(&placement).ctc, 18.5);
    }
}
