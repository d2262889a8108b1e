use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::placement::{PlacementResponse, PlacementSlot};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, utoipa::ToSchema)]
pub struct CodingProfiles {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub leetcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub codeforces: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub codechef: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub atcoder: Option<String>,
}

impl CodingProfiles {
    fn entries(&self) -> [(&'static str, &Option<String>); 5] {
        [
            ("github", &self.github),
            ("leetcode", &self.leetcode),
            ("codeforces", &self.codeforces),
            ("codechef", &self.codechef),
            ("atcoder", &self.atcoder),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct WorkExperience {
    pub company: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<String>,
}

/// Document in the "users" collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub roll_number: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id_card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mobile_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cgpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub abc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub graduation_year: Option<String>,
    #[serde(default)]
    pub work_experiences: Vec<WorkExperience>,
    #[serde(default)]
    pub coding_profiles: CodingProfiles,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placement_one: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placement_two: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placement_three: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<DateTime>,
}

fn default_roles() -> Vec<String> {
    vec![ROLE_USER.to_string()]
}

/// Fields supplied at registration; everything else starts empty.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub roll_number: String,
    pub password_hash: String,
    pub id_card: Option<String>,
    pub roles: Vec<String>,
    pub is_verified: bool,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        let now = DateTime::now();
        Self {
            id: ObjectId::new(),
            username: new_user.username.to_lowercase(),
            email: new_user.email.to_lowercase(),
            full_name: new_user.full_name,
            roll_number: new_user.roll_number,
            password: new_user.password_hash,
            id_card: new_user.id_card,
            branch: None,
            section: None,
            mobile_number: None,
            semester: None,
            cgpa: None,
            abc_id: None,
            linkedin: None,
            image: None,
            resume: None,
            graduation_year: None,
            work_experiences: Vec::new(),
            coding_profiles: CodingProfiles::default(),
            refresh_token: None,
            is_verified: new_user.is_verified,
            roles: new_user.roles,
            placement_one: None,
            placement_two: None,
            placement_three: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }

    pub fn placement_ref(&self, slot: PlacementSlot) -> Option<ObjectId> {
        match slot {
            PlacementSlot::One => self.placement_one,
            PlacementSlot::Two => self.placement_two,
            PlacementSlot::Three => self.placement_three,
        }
    }

    pub fn set_placement_ref(&mut self, slot: PlacementSlot, id: Option<ObjectId>) {
        match slot {
            PlacementSlot::One => self.placement_one = id,
            PlacementSlot::Two => self.placement_two = id,
            PlacementSlot::Three => self.placement_three = id,
        }
    }

    pub fn placement_refs(&self) -> Vec<ObjectId> {
        PlacementSlot::ALL
            .iter()
            .filter_map(|slot| self.placement_ref(*slot))
            .collect()
    }
}

/// Partial profile change. Only `Some` values are written; coding profile links are
/// merged field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub roll_number: Option<String>,
    pub email: Option<String>,
    pub branch: Option<String>,
    pub section: Option<String>,
    pub mobile_number: Option<String>,
    pub semester: Option<String>,
    pub cgpa: Option<f64>,
    pub abc_id: Option<String>,
    pub linkedin: Option<String>,
    pub graduation_year: Option<String>,
    pub work_experiences: Option<Vec<WorkExperience>>,
    pub coding_profiles: CodingProfiles,
    pub image: Option<String>,
    pub resume: Option<String>,
}

impl ProfileUpdate {
    fn text_fields(&self) -> [(&'static str, &Option<String>); 11] {
        [
            ("fullName", &self.full_name),
            ("rollNumber", &self.roll_number),
            ("email", &self.email),
            ("branch", &self.branch),
            ("section", &self.section),
            ("mobileNumber", &self.mobile_number),
            ("semester", &self.semester),
            ("abcId", &self.abc_id),
            ("linkedin", &self.linkedin),
            ("graduationYear", &self.graduation_year),
            ("image", &self.image),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.text_fields().iter().all(|(_, v)| v.is_none())
            && self.coding_profiles.entries().iter().all(|(_, v)| v.is_none())
            && self.cgpa.is_none()
            && self.work_experiences.is_none()
            && self.resume.is_none()
    }

    /// `$set` body for MongoDB, using dotted paths for coding profile links.
    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        for (key, value) in self.text_fields() {
            if let Some(value) = value {
                set.insert(key, value.clone());
            }
        }
        if let Some(resume) = &self.resume {
            set.insert("resume", resume.clone());
        }
        if let Some(cgpa) = self.cgpa {
            set.insert("cgpa", cgpa);
        }
        if let Some(experiences) = &self.work_experiences {
            let items: Vec<Bson> = experiences
                .iter()
                .map(|w| {
                    Bson::Document(doc! {
                        "company": w.company.as_str(),
                        "role": w.role.as_str(),
                        "duration": w.duration.clone(),
                    })
                })
                .collect();
            set.insert("workExperiences", items);
        }
        for (key, value) in self.coding_profiles.entries() {
            if let Some(value) = value {
                set.insert(format!("codingProfiles.{}", key), value.clone());
            }
        }
        set.insert("updatedAt", DateTime::now());
        set
    }

    /// Same change applied to an in-memory document.
    pub fn apply(&self, user: &mut User) {
        fn put(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        if let Some(name) = &self.full_name {
            user.full_name = name.clone();
        }
        if let Some(roll) = &self.roll_number {
            user.roll_number = roll.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        put(&mut user.branch, &self.branch);
        put(&mut user.section, &self.section);
        put(&mut user.mobile_number, &self.mobile_number);
        put(&mut user.semester, &self.semester);
        put(&mut user.abc_id, &self.abc_id);
        put(&mut user.linkedin, &self.linkedin);
        put(&mut user.graduation_year, &self.graduation_year);
        put(&mut user.image, &self.image);
        put(&mut user.resume, &self.resume);
        if self.cgpa.is_some() {
            user.cgpa = self.cgpa;
        }
        if let Some(experiences) = &self.work_experiences {
            user.work_experiences = experiences.clone();
        }
        put(&mut user.coding_profiles.github, &self.coding_profiles.github);
        put(&mut user.coding_profiles.leetcode, &self.coding_profiles.leetcode);
        put(&mut user.coding_profiles.codeforces, &self.coding_profiles.codeforces);
        put(&mut user.coding_profiles.codechef, &self.coding_profiles.codechef);
        put(&mut user.coding_profiles.atcoder, &self.coding_profiles.atcoder);
        user.updated_at = Some(DateTime::now());
    }
}

/// Profile fields shared by every outward view. Never carries the password hash or
/// the refresh token.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub roll_number: String,
    pub id_card: Option<String>,
    pub branch: Option<String>,
    pub section: Option<String>,
    pub mobile_number: Option<String>,
    pub semester: Option<String>,
    pub cgpa: Option<f64>,
    pub abc_id: Option<String>,
    pub linkedin: Option<String>,
    pub image: Option<String>,
    pub resume: Option<String>,
    pub graduation_year: Option<String>,
    pub work_experiences: Vec<WorkExperience>,
    pub coding_profiles: CodingProfiles,
    pub is_verified: bool,
    pub roles: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            roll_number: user.roll_number.clone(),
            id_card: user.id_card.clone(),
            branch: user.branch.clone(),
            section: user.section.clone(),
            mobile_number: user.mobile_number.clone(),
            semester: user.semester.clone(),
            cgpa: user.cgpa,
            abc_id: user.abc_id.clone(),
            linkedin: user.linkedin.clone(),
            image: user.image.clone(),
            resume: user.resume.clone(),
            graduation_year: user.graduation_year.clone(),
            work_experiences: user.work_experiences.clone(),
            coding_profiles: user.coding_profiles.clone(),
            is_verified: user.is_verified,
            roles: user.roles.clone(),
            created_at: user.created_at.and_then(|dt| dt.try_to_rfc3339_string().ok()),
            updated_at: user.updated_at.and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

/// The account as seen by its owner: placements are referenced by id.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub username: String,
    #[serde(flatten)]
    pub profile: ProfileView,
    pub placement_one: Option<String>,
    pub placement_two: Option<String>,
    pub placement_three: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            profile: ProfileView::from(user),
            placement_one: user.placement_one.map(|id| id.to_hex()),
            placement_two: user.placement_two.map(|id| id.to_hex()),
            placement_three: user.placement_three.map(|id| id.to_hex()),
        }
    }
}

/// Lookup view with placements embedded; username omitted.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedUser {
    #[serde(flatten)]
    pub profile: ProfileView,
    pub placement_one: Option<PlacementResponse>,
    pub placement_two: Option<PlacementResponse>,
    pub placement_three: Option<PlacementResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(NewUser {
            username: "Asha".into(),
            email: "Asha@Example.com".into(),
            full_name: "Asha Rao".into(),
            roll_number: "BTECH/10001/21".into(),
            password_hash: "$2b$04$hash".into(),
            id_card: Some("https://media.example/id.png".into()),
            roles: vec![ROLE_USER.into()],
            is_verified: false,
        })
    }

    #[test]
    fn test_new_user_normalises_identity() {
        let user = sample_user();
        assert_eq!(user.username, "asha");
        assert_eq!(user.email, "asha@example.com");
        assert!(!user.is_admin());
        assert!(user.placement_refs().is_empty());
    }

    #[test]
    fn test_placement_refs() {
        let mut user = sample_user();
        let id = ObjectId::new();
        user.set_placement_ref(PlacementSlot::Two, Some(id));
        assert_eq!(user.placement_ref(PlacementSlot::Two), Some(id));
        assert_eq!(user.placement_ref(PlacementSlot::One), None);
        assert_eq!(user.placement_refs(), vec![id]);
    }

    #[test]
    fn test_empty_update() {
        assert!(ProfileUpdate::default().is_empty());

        let mut update = ProfileUpdate::default();
        update.coding_profiles.leetcode = Some("asha_lc".into());
        assert!(!update.is_empty());
    }

    #[test]
    fn test_set_document_only_contains_given_fields() {
        let update = ProfileUpdate {
            branch: Some("cse".into()),
            cgpa: Some(8.4),
            coding_profiles: CodingProfiles {
                github: Some("https://github.com/asha".into()),
                ..Default::default()
            },
            work_experiences: Some(vec![WorkExperience {
                company: "Acme".into(),
                role: "Intern".into(),
                duration: None,
            }]),
            ..Default::default()
        };

        let set = update.to_set_document();
        assert_eq!(set.get_str("branch").unwrap(), "cse");
        assert_eq!(set.get_f64("cgpa").unwrap(), 8.4);
        assert_eq!(
            set.get_str("codingProfiles.github").unwrap(),
            "https://github.com/asha"
        );
        assert_eq!(set.get_array("workExperiences").unwrap().len(), 1);
        assert!(set.contains_key("updatedAt"));
        assert!(!set.contains_key("fullName"));
        assert!(!set.contains_key("codingProfiles.leetcode"));
    }

    #[test]
    fn test_apply_merges_profiles() {
        let mut user = sample_user();
        user.coding_profiles.codechef = Some("asha_cc".into());

        let update = ProfileUpdate {
            full_name: Some("Asha R".into()),
            coding_profiles: CodingProfiles {
                atcoder: Some("asha_ac".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        update.apply(&mut user);

        assert_eq!(user.full_name, "Asha R");
        assert_eq!(user.coding_profiles.codechef.as_deref(), Some("asha_cc"));
        assert_eq!(user.coding_profiles.atcoder.as_deref(), Some("asha_ac"));
        assert_eq!(user.roll_number, "BTECH/10001/21");
    }

    #[test]
    fn test_views_hide_credentials() {
        let mut user = sample_user();
        user.refresh_token = Some("refresh".into());
        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();

        assert_eq!(json["username"], "asha");
        assert_eq!(json["rollNumber"], "BTECH/10001/21");
        assert!(json.get("password").is_none());
        assert!(json.get("refreshToken").is_none());
        assert!(json["placementOne"].is_null());
    }
}
