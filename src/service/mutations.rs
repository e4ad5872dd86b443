//! Write operations and their declared cache invalidations.
//!
//! The operation → key-group mapping is a single table so the cross-entity
//! dependency graph stays auditable: payment writes touch the aggregate
//! dashboard counters and the per-student ledger, not just the payment lists.

use super::keys::KeyPrefix;

/// A write operation against the SPP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
  AddStudent,
  UpdateStudent { nis: String },
  UpdateStudentStatus { nis: String },
  DeleteStudent,
  AddInstitution,
  CreateSppSetting,
  UpdateSppSetting { id: u64 },
  DeleteSppSetting { id: u64 },
  CreatePayment,
  UpdatePayment { id: u64 },
  DeletePayment,
  SaveUserProfile,
}

impl MutationKind {
  /// Cache-key groups marked stale when this operation succeeds.
  pub fn invalidates(&self) -> Vec<KeyPrefix> {
    use KeyPrefix::*;

    match self {
      MutationKind::AddStudent | MutationKind::DeleteStudent => vec![Students, DashboardStats],
      MutationKind::UpdateStudent { nis } | MutationKind::UpdateStudentStatus { nis } => {
        vec![Students, DashboardStats, Student(nis.clone())]
      }
      MutationKind::AddInstitution => vec![Institutions],
      MutationKind::CreateSppSetting => vec![SppSettings],
      MutationKind::UpdateSppSetting { id } | MutationKind::DeleteSppSetting { id } => {
        vec![SppSettings, SppSetting(*id)]
      }
      MutationKind::CreatePayment | MutationKind::DeletePayment => {
        vec![Payments, Students, StudentPaymentHistory, DashboardStats]
      }
      MutationKind::UpdatePayment { id } => vec![
        Payments,
        Payment(*id),
        Students,
        StudentPaymentHistory,
        DashboardStats,
      ],
      MutationKind::SaveUserProfile => vec![CurrentUserProfile],
    }
  }
}
