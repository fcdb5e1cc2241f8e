//! # Identity Projection
//!
//! The single place raw profile payloads are interpreted for display:
//! the two-step role resolver every consumer shares, the envelope shape
//! normalizer, and [`ProfileView`] which flattens a decoded [`Identity`]
//! into labeled rows. Absent fields produce no row; they are never padded
//! with placeholders.

use serde_json::Value;

use crate::types::{
    AdminStaffProfile, DoctorProfile, Identity, LabProfile, PatientProfile, Role,
};

/// Fallback label when a payload carries no recognizable role.
pub const UNKNOWN_ROLE_LABEL: &str = "USER";

/// Resolve the role from a raw payload: prefer `user.role` nested one level
/// down, fall back to a top-level `role`. Unknown role strings resolve to
/// `None` rather than an error so display paths can degrade gracefully.
pub fn resolve_role(value: &Value) -> Option<Role> {
    value
        .get("user")
        .and_then(|user| user.get("role"))
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .or_else(|| value.get("role").and_then(Value::as_str).and_then(Role::parse))
}

/// The role's wire form for display, or `"USER"` when none resolves.
pub fn display_role(value: &Value) -> String {
    resolve_role(value)
        .map(|role| role.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_ROLE_LABEL.to_string())
}

/// Normalize a payload so the user envelope sits under a `user` key.
///
/// Flat payloads (envelope fields at the top level) are wrapped; payloads
/// already carrying a `user` object pass through unchanged. Profile fields
/// stay at the top level in both cases.
pub fn normalize_envelope_shape(value: &Value) -> Value {
    if value.get("user").map_or(false, Value::is_object) {
        return value.clone();
    }
    let mut shaped = value.clone();
    if let Some(object) = shaped.as_object_mut() {
        object.insert("user".to_string(), value.clone());
    }
    shaped
}

/// One labeled line of a rendered profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub label: &'static str,
    pub value: String,
}

impl FieldRow {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self { label, value: value.into() }
    }
}

/// Role-dispatched display projection of an [`Identity`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileView {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Lab(LabProfile),
    AdminStaff(AdminStaffProfile),
}

impl ProfileView {
    pub fn from_identity(identity: &Identity) -> Self {
        match identity {
            Identity::Patient(p) => ProfileView::Patient(p.clone()),
            Identity::Doctor(d) => ProfileView::Doctor(d.clone()),
            Identity::Lab(l) => ProfileView::Lab(l.clone()),
            Identity::AdminStaff(a) => ProfileView::AdminStaff(a.clone()),
        }
    }

    /// Section heading for the role-specific detail block.
    pub fn role_label(&self) -> &'static str {
        match self {
            ProfileView::Patient(p) => p.user.role.display_name(),
            ProfileView::Doctor(d) => d.user.role.display_name(),
            ProfileView::Lab(l) => l.user.role.display_name(),
            ProfileView::AdminStaff(a) => a.user.role.display_name(),
        }
    }

    /// Flatten the profile into display rows. Only present fields emit a
    /// row, so an empty profile yields an empty list.
    pub fn rows(&self) -> Vec<FieldRow> {
        let mut rows = Vec::new();
        match self {
            ProfileView::Patient(p) => {
                push_opt(&mut rows, "Full name", p.full_name.as_deref());
                if let Some(dob) = p.date_of_birth {
                    rows.push(FieldRow::new("Date of birth", dob.format("%Y-%m-%d").to_string()));
                }
                if let Some(gender) = p.gender_details.as_ref().and_then(|g| g.label()) {
                    rows.push(FieldRow::new("Gender", gender));
                }
                if let Some(group) = p.blood_group_details.as_ref().and_then(|g| g.label()) {
                    rows.push(FieldRow::new("Blood group", group));
                }
                push_opt(&mut rows, "Mobile", p.mobile.as_deref());
                push_opt(&mut rows, "Emergency contact", p.emergency_contact_name.as_deref());
                push_opt(&mut rows, "Emergency number", p.emergency_contact_number.as_deref());
                push_opt(&mut rows, "Address", p.address.as_deref());
                push_opt(&mut rows, "City", p.city.as_deref());
                push_opt(&mut rows, "State", p.state.as_deref());
                push_opt(&mut rows, "Pincode", p.pincode.as_deref());
            }
            ProfileView::Doctor(d) => {
                push_opt(&mut rows, "Full name", d.full_name.as_deref());
                push_opt(&mut rows, "Registration number", d.registration_number.as_deref());
                if let Some(years) = d.experience_years {
                    rows.push(FieldRow::new("Experience", format!("{} years", years)));
                }
                push_opt(&mut rows, "Phone", d.phone_number.as_deref());
                push_opt(&mut rows, "Consultation fee", d.consultation_fee.as_deref());
                if let Some(status) = d.verification_status {
                    rows.push(FieldRow::new("Verification", status.display_name()));
                }
                if let Some(joined) = d.joining_date {
                    rows.push(FieldRow::new("Joined", joined.format("%Y-%m-%d").to_string()));
                }
                for qualification in &d.qualifications {
                    if let Some(name) = qualification.qualification_name.as_deref() {
                        let value = match (&qualification.institution, qualification.year_of_completion) {
                            (Some(inst), Some(year)) => format!("{}, {} ({})", name, inst, year),
                            (Some(inst), None) => format!("{}, {}", name, inst),
                            (None, Some(year)) => format!("{} ({})", name, year),
                            (None, None) => name.to_string(),
                        };
                        rows.push(FieldRow::new("Qualification", value));
                    }
                }
            }
            ProfileView::Lab(l) => {
                push_opt(&mut rows, "Lab name", l.lab_name.as_deref());
                push_opt(&mut rows, "License number", l.license_number.as_deref());
                push_opt(&mut rows, "Phone", l.phone_number.as_deref());
                push_opt(&mut rows, "Address", l.address.as_deref());
                push_opt(&mut rows, "City", l.city.as_deref());
                push_opt(&mut rows, "State", l.state.as_deref());
                push_opt(&mut rows, "Pincode", l.pincode.as_deref());
                if let Some(status) = l.verification_status {
                    rows.push(FieldRow::new("Verification", status.display_name()));
                }
            }
            ProfileView::AdminStaff(a) => {
                rows.push(FieldRow::new("Email", a.user.email.clone()));
                if let Some(display) = a.role_display.as_deref() {
                    rows.push(FieldRow::new("Role", display));
                } else {
                    rows.push(FieldRow::new("Role", a.user.role.display_name()));
                }
                rows.push(FieldRow::new(
                    "Superuser",
                    if a.is_superuser { "Yes" } else { "No" },
                ));
            }
        }
        rows
    }
}

fn push_opt(rows: &mut Vec<FieldRow>, label: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() {
            rows.push(FieldRow::new(label, value));
        }
    }
}
