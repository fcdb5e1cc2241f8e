//! # Session Data Model
//!
//! Types describing who is signed in: the platform role taxonomy, the
//! redacted access credential, the shared user envelope the backend attaches
//! to every profile, the four role-specific profile shapes, and the
//! [`Identity`] union the rest of the core passes around.
//!
//! Profile payloads arrive in two shapes depending on the endpoint: the user
//! envelope either sits at the top level or is nested one level down under a
//! `user` key. [`Identity::from_value`] absorbs both; nothing outside this
//! module should re-derive a role from raw JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::projection;

/// Platform role taxonomy. Serialized in the backend's SCREAMING form
/// (`"PATIENT"`, `"DOCTOR"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Patient,
    Doctor,
    Lab,
    Admin,
    Staff,
}

impl Role {
    /// The backend wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Lab => "LAB",
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
        }
    }

    /// Human-facing label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Lab => "Lab",
            Role::Admin => "Administrator",
            Role::Staff => "Staff",
        }
    }

    /// Parse the wire form, case-insensitively. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PATIENT" => Some(Role::Patient),
            "DOCTOR" => Some(Role::Doctor),
            "LAB" => Some(Role::Lab),
            "ADMIN" => Some(Role::Admin),
            "STAFF" => Some(Role::Staff),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer credential for API requests.
///
/// The token value never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED, {} bytes])", self.0.len())
    }
}

/// Account lifecycle state reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    Deleted,
}

/// Review state for provider accounts (doctors, labs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Active,
}

impl VerificationStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "Pending Review",
            VerificationStatus::Verified => "Verified",
            VerificationStatus::Rejected => "Rejected",
            VerificationStatus::Active => "Active",
        }
    }
}

/// The account fields the backend attaches to every profile shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub account_status: Option<AccountStatus>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Coded lookup value with its display form, e.g. gender or blood group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CodedValue {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

impl CodedValue {
    /// The best human-facing form available.
    pub fn label(&self) -> Option<&str> {
        self.display.as_deref().or(self.code.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user: UserEnvelope,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender_details: Option<CodedValue>,
    #[serde(default)]
    pub blood_group_details: Option<CodedValue>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorQualification {
    #[serde(default)]
    pub qualification_name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub year_of_completion: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user: UserEnvelope,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub consultation_fee: Option<String>,
    #[serde(default)]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default)]
    pub verification_notes: Option<String>,
    #[serde(default)]
    pub qualifications: Vec<DoctorQualification>,
    #[serde(default)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabProfile {
    pub user: UserEnvelope,
    #[serde(default)]
    pub lab_name: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    /// Free-shape schedule blob; stored and echoed, not interpreted.
    #[serde(default)]
    pub operating_hours: Option<Value>,
    #[serde(default)]
    pub verification_status: Option<VerificationStatus>,
}

/// Admins and staff share one shape; the envelope `role` field tells the two
/// apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStaffProfile {
    pub user: UserEnvelope,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub role_display: Option<String>,
}

/// The signed-in identity, one variant per profile shape.
///
/// Construct through [`Identity::from_value`] so the role dispatch and the
/// top-level/nested envelope tolerance stay in one place.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Lab(LabProfile),
    AdminStaff(AdminStaffProfile),
}

impl Identity {
    /// Decode an identity from a raw backend payload.
    ///
    /// The role is resolved through [`projection::resolve_role`] and the
    /// payload is normalized so the user envelope may sit at the top level or
    /// nested under `user`.
    ///
    /// # Errors
    ///
    /// `SessionError::MalformedPayload` when no recognizable role is present
    /// or the matching profile shape does not decode.
    pub fn from_value(value: &Value) -> Result<Identity> {
        let role = projection::resolve_role(value).ok_or_else(|| {
            SessionError::MalformedPayload("payload carries no recognizable role".to_string())
        })?;

        let shaped = projection::normalize_envelope_shape(value);
        let decode_err = |e: serde_json::Error| {
            SessionError::MalformedPayload(format!("{} profile: {}", role, e))
        };

        match role {
            Role::Patient => Ok(Identity::Patient(
                serde_json::from_value(shaped).map_err(decode_err)?,
            )),
            Role::Doctor => Ok(Identity::Doctor(
                serde_json::from_value(shaped).map_err(decode_err)?,
            )),
            Role::Lab => Ok(Identity::Lab(
                serde_json::from_value(shaped).map_err(decode_err)?,
            )),
            Role::Admin | Role::Staff => Ok(Identity::AdminStaff(
                serde_json::from_value(shaped).map_err(decode_err)?,
            )),
        }
    }

    /// Serialize for durable storage. Round-trips through
    /// [`Identity::from_value`].
    pub fn to_value(&self) -> Result<Value> {
        let result = match self {
            Identity::Patient(p) => serde_json::to_value(p),
            Identity::Doctor(d) => serde_json::to_value(d),
            Identity::Lab(l) => serde_json::to_value(l),
            Identity::AdminStaff(a) => serde_json::to_value(a),
        };
        result.map_err(|e| SessionError::MalformedPayload(e.to_string()))
    }

    /// The shared account envelope.
    pub fn envelope(&self) -> &UserEnvelope {
        match self {
            Identity::Patient(p) => &p.user,
            Identity::Doctor(d) => &d.user,
            Identity::Lab(l) => &l.user,
            Identity::AdminStaff(a) => &a.user,
        }
    }

    pub fn role(&self) -> Role {
        self.envelope().role
    }

    pub fn user_id(&self) -> Uuid {
        self.envelope().user_id
    }
}

/// Point-in-time view of the session handed to callers and the route guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    /// True only during initial hydration, before the first load completes.
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(Identity::role)
    }
}
