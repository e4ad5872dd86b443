//! Query descriptors and cache-key conventions for the SPP service.
//!
//! Every cached read renders to a canonical string key: the group tag plus
//! one segment per filter parameter. Absent parameters render as the fixed
//! `~` placeholder, never the empty string, so "no filter" and "empty-string
//! filter" never collide in the key space.

use std::fmt;

use super::types::StudentStatus;

/// Placeholder segment for an absent filter parameter.
const ABSENT: &str = "~";

/// Query key types for cached reads, one variant per remote query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKey {
  /// List students, optionally filtered by institution and status
  Students {
    institution_id: Option<u64>,
    status: Option<StudentStatus>,
  },
  /// A single student by NIS
  Student { nis: String },
  /// Per-student payment ledger
  StudentPaymentHistory { nis: String },
  /// All institutions
  Institutions,
  /// A single institution
  Institution { id: u64 },
  /// Tuition rate records, optionally filtered by institution
  SppSettings { institution_id: Option<u64> },
  /// A single tuition rate record
  SppSetting { id: u64 },
  /// List payments, optionally filtered by institution and student
  Payments {
    institution_id: Option<u64>,
    student_nis: Option<String>,
  },
  /// A single payment
  Payment { id: u64 },
  /// Dashboard counters
  DashboardStats,
  /// Profile of the authenticated caller
  CurrentUserProfile,
}

impl QueryKey {
  /// Canonical cache key for this query.
  pub fn cache_key(&self) -> String {
    match self {
      Self::Students {
        institution_id,
        status,
      } => format!(
        "students:{}:{}",
        opt_id(institution_id),
        status.map(|s| s.as_str()).unwrap_or(ABSENT)
      ),
      Self::Student { nis } => format!("student:{}", nis),
      Self::StudentPaymentHistory { nis } => format!("studentPaymentHistory:{}", nis),
      Self::Institutions => "institutions".to_string(),
      Self::Institution { id } => format!("institution:{}", id),
      Self::SppSettings { institution_id } => format!("sppSettings:{}", opt_id(institution_id)),
      Self::SppSetting { id } => format!("sppSetting:{}", id),
      Self::Payments {
        institution_id,
        student_nis,
      } => format!(
        "payments:{}:{}",
        opt_id(institution_id),
        student_nis.as_deref().unwrap_or(ABSENT)
      ),
      Self::Payment { id } => format!("payment:{}", id),
      Self::DashboardStats => "dashboardStats".to_string(),
      Self::CurrentUserProfile => "currentUserProfile".to_string(),
    }
  }
}

fn opt_id(id: &Option<u64>) -> String {
  id.map(|n| n.to_string()).unwrap_or_else(|| ABSENT.to_string())
}

/// An invalidation target: a key group, optionally narrowed to one entity.
///
/// Prefixes are matched segment-wise against cache keys, so `Payment(17)`
/// covers exactly the `payment:17` entry while `Payments` covers every
/// filtered payment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPrefix {
  Students,
  Student(String),
  StudentPaymentHistory,
  Institutions,
  SppSettings,
  SppSetting(u64),
  Payments,
  Payment(u64),
  DashboardStats,
  CurrentUserProfile,
}

impl fmt::Display for KeyPrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyPrefix::Students => write!(f, "students"),
      KeyPrefix::Student(nis) => write!(f, "student:{}", nis),
      KeyPrefix::StudentPaymentHistory => write!(f, "studentPaymentHistory"),
      KeyPrefix::Institutions => write!(f, "institutions"),
      KeyPrefix::SppSettings => write!(f, "sppSettings"),
      KeyPrefix::SppSetting(id) => write!(f, "sppSetting:{}", id),
      KeyPrefix::Payments => write!(f, "payments"),
      KeyPrefix::Payment(id) => write!(f, "payment:{}", id),
      KeyPrefix::DashboardStats => write!(f, "dashboardStats"),
      KeyPrefix::CurrentUserProfile => write!(f, "currentUserProfile"),
    }
  }
}

impl KeyPrefix {
  /// Canonical prefix string handed to the cache.
  pub fn render(&self) -> String {
    self.to_string()
  }
}
