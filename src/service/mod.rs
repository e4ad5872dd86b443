//! The remote SPP service surface and its clients.
//!
//! [`SppApi`] is the seam: the HTTP client implements it against the real
//! service, tests substitute in-memory fakes. [`CachedSppClient`] fronts any
//! implementation with the query cache and mutation invalidation.

pub mod cached;
pub mod client;
pub mod keys;
pub mod mutations;
pub mod types;

use async_trait::async_trait;
use color_eyre::Result;

pub use cached::CachedSppClient;
pub use client::SppClient;

use types::{
  AccessRole, CreatePaymentRequest, DashboardStats, Institution, NewSppSetting, NewStudent,
  Payment, PaymentUpdate, SppSetting, SppSettingUpdate, Student, StudentStatus, StudentUpdate,
  UserProfile,
};

/// Remote procedures exposed by the SPP service.
///
/// Calls resolve or reject; no retry or batching is defined at this seam.
/// `Option` filter parameters mean "no filter applied".
#[async_trait]
pub trait SppApi: Send + Sync {
  // Students
  async fn list_students(
    &self,
    institution_id: Option<u64>,
    status: Option<StudentStatus>,
  ) -> Result<Vec<Student>>;
  async fn get_student(&self, nis: &str) -> Result<Option<Student>>;
  async fn add_student(&self, student: NewStudent) -> Result<Student>;
  async fn update_student(&self, nis: &str, update: StudentUpdate) -> Result<Student>;
  async fn update_student_status(&self, nis: &str, status: StudentStatus) -> Result<Student>;
  async fn delete_student(&self, nis: &str) -> Result<()>;
  async fn student_payment_history(&self, nis: &str) -> Result<Vec<Payment>>;

  // Institutions
  async fn list_institutions(&self) -> Result<Vec<Institution>>;
  async fn get_institution(&self, id: u64) -> Result<Option<Institution>>;
  async fn add_institution(&self, name: &str, address: &str) -> Result<Institution>;

  // Tuition rate settings
  async fn list_spp_settings(&self, institution_id: Option<u64>) -> Result<Vec<SppSetting>>;
  async fn get_spp_setting(&self, id: u64) -> Result<Option<SppSetting>>;
  async fn create_spp_setting(&self, setting: NewSppSetting) -> Result<SppSetting>;
  async fn update_spp_setting(&self, id: u64, update: SppSettingUpdate) -> Result<SppSetting>;
  async fn delete_spp_setting(&self, id: u64) -> Result<()>;

  // Payments
  async fn list_payments(
    &self,
    institution_id: Option<u64>,
    student_nis: Option<&str>,
  ) -> Result<Vec<Payment>>;
  async fn get_payment(&self, id: u64) -> Result<Option<Payment>>;
  async fn create_payment(&self, request: CreatePaymentRequest) -> Result<Payment>;
  async fn update_payment(&self, id: u64, update: PaymentUpdate) -> Result<Payment>;
  async fn delete_payment(&self, id: u64) -> Result<()>;

  // Dashboard
  async fn dashboard_stats(&self) -> Result<DashboardStats>;

  // Caller identity
  async fn caller_profile(&self) -> Result<Option<UserProfile>>;
  async fn save_caller_profile(&self, profile: UserProfile) -> Result<()>;
  async fn caller_access_role(&self) -> Result<AccessRole>;
}
