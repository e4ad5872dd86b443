//! Domain types exchanged with the SPP service.
//!
//! All identifiers are 64-bit; monetary amounts are minor currency units and
//! timestamps are nanoseconds since the Unix epoch. Neither is ever given
//! fractional precision client-side.

use serde::{Deserialize, Serialize};

/// Enrollment status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentStatus {
  Enrolled,
  Graduated,
}

impl StudentStatus {
  /// Wire and cache-key form of the status.
  pub fn as_str(&self) -> &'static str {
    match self {
      StudentStatus::Enrolled => "enrolled",
      StudentStatus::Graduated => "graduated",
    }
  }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
  Cash,
  Transfer,
}

impl PaymentMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::Cash => "cash",
      PaymentMethod::Transfer => "transfer",
    }
  }
}

/// Admin-panel role carried on a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
  SuperAdmin,
  Treasurer,
  SmpAdmin,
  SmaAdmin,
}

/// Platform access role of the caller; distinct from the profile [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessRole {
  Admin,
  User,
  Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
  pub id: u64,
  pub name: String,
  pub address: String,
}

/// A student, keyed by NIS (student identification number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub nis: String,
  pub status: StudentStatus,
  pub class_number: u32,
  pub institution: Institution,
  pub full_name: String,
  pub registry_number: String,
  pub guardian_name: String,
  pub guardian_phone: String,
  /// Enrollment timestamp, nanoseconds since the Unix epoch
  pub enrollment_date: i64,
}

/// Fields for registering a new student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
  pub nis: String,
  pub class_number: u32,
  pub registry_number: String,
  pub full_name: String,
  pub institution_id: u64,
  pub guardian_name: String,
  pub guardian_phone: String,
  pub enrollment_date: i64,
}

/// Mutable student fields; status changes go through their own operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
  pub class_number: u32,
  pub full_name: String,
  pub guardian_name: String,
  pub guardian_phone: String,
}

/// A recorded tuition payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: u64,
  pub student_nis: String,
  pub institution: Institution,
  /// Billing period label this payment applies to
  pub brand: String,
  pub amount: i64,
  pub date: i64,
  pub payment_method: PaymentMethod,
  pub notes: String,
  pub receipt_url: String,
  pub created_at: i64,
}

/// A payment to record. The service assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
  pub student_nis: String,
  pub institution_id: u64,
  pub brand: String,
  pub amount: i64,
  pub date: i64,
  pub payment_method: PaymentMethod,
  pub notes: String,
  pub receipt_url: String,
}

impl CreatePaymentRequest {
  /// Start a request for a student, pre-filling the institution from the
  /// student's own record.
  pub fn for_student(student: &Student, brand: &str, amount: i64, date: i64) -> Self {
    Self {
      student_nis: student.nis.clone(),
      institution_id: student.institution.id,
      brand: brand.to_string(),
      amount,
      date,
      payment_method: PaymentMethod::Cash,
      notes: String::new(),
      receipt_url: String::new(),
    }
  }
}

/// Mutable payment fields; student and institution are fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
  pub amount: i64,
  pub date: i64,
  pub payment_method: PaymentMethod,
  pub notes: String,
}

/// A configured tuition rate for an institution and billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SppSetting {
  pub id: u64,
  pub institution: Institution,
  pub brand: String,
  pub amount: i64,
  pub date: i64,
  pub payment_method: PaymentMethod,
  pub notes: String,
  pub receipt_url: String,
  pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSppSetting {
  pub institution_id: u64,
  pub brand: String,
  pub amount: i64,
  pub date: i64,
  pub payment_method: PaymentMethod,
  pub notes: String,
  pub receipt_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SppSettingUpdate {
  pub amount: i64,
  pub brand: String,
  pub notes: String,
}

/// Profile of the authenticated caller.
///
/// `institution_id` is present iff the role is not [`Role::SuperAdmin`]; the
/// field is omitted from the wire form entirely when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub name: String,
  pub role: Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub institution_id: Option<u64>,
}

/// Aggregate counters for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  pub total_smp_students: u64,
  pub total_sma_students: u64,
  pub total_payments_this_month: u64,
  pub total_arrears_this_month: u64,
}
