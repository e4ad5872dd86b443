//! Cached SPP client: cache-first reads and invalidating writes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tracing::debug;

use crate::cache::{QueryCache, QueryState};
use crate::config::Config;

use super::keys::QueryKey;
use super::mutations::MutationKind;
use super::types::{
  AccessRole, CreatePaymentRequest, DashboardStats, Institution, NewSppSetting, NewStudent,
  Payment, PaymentUpdate, Role, SppSetting, SppSettingUpdate, Student, StudentStatus,
  StudentUpdate, UserProfile,
};
use super::{SppApi, SppClient};

/// SPP service client with a transparent query cache.
///
/// Reads go through the shared [`QueryCache`] keyed by [`QueryKey`]; writes
/// run the remote call and, on success only, mark the operation's declared
/// key groups stale so mounted readers refetch. No optimistic updates are
/// made. While the readiness gate is down (connecting or reconnecting) reads
/// are disabled and never reach the service.
#[derive(Clone)]
pub struct CachedSppClient {
  api: Arc<dyn SppApi>,
  cache: QueryCache,
  ready: Arc<AtomicBool>,
}

impl CachedSppClient {
  pub fn new(api: Arc<dyn SppApi>, cache: QueryCache) -> Self {
    Self {
      api,
      cache,
      ready: Arc::new(AtomicBool::new(true)),
    }
  }

  /// Connect to the configured service and front it with a cache tuned from
  /// the same configuration.
  pub async fn connect(config: &Config) -> Result<Self> {
    let client = SppClient::connect(config).await?;
    let cache = QueryCache::new()
      .with_stale_time(config.cache.stale_time())
      .with_retry(config.cache.retry_policy());
    Ok(Self::new(Arc::new(client), cache))
  }

  /// Raise or lower the readiness gate. While down, reads return their last
  /// known state without issuing remote calls.
  pub fn set_ready(&self, ready: bool) {
    self.ready.store(ready, Ordering::SeqCst);
  }

  fn is_ready(&self) -> bool {
    self.ready.load(Ordering::SeqCst)
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn list_students(
    &self,
    institution_id: Option<u64>,
    status: Option<StudentStatus>,
  ) -> QueryState<Vec<Student>> {
    let key = QueryKey::Students {
      institution_id,
      status,
    };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        async move { api.list_students(institution_id, status).await }
      })
      .await
  }

  pub async fn get_student(&self, nis: &str) -> QueryState<Option<Student>> {
    let key = QueryKey::Student {
      nis: nis.to_string(),
    };
    let api = Arc::clone(&self.api);
    let nis = nis.to_string();
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        let nis = nis.clone();
        async move { api.get_student(&nis).await }
      })
      .await
  }

  pub async fn student_payment_history(&self, nis: &str) -> QueryState<Vec<Payment>> {
    let key = QueryKey::StudentPaymentHistory {
      nis: nis.to_string(),
    };
    let api = Arc::clone(&self.api);
    let nis = nis.to_string();
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        let nis = nis.clone();
        async move { api.student_payment_history(&nis).await }
      })
      .await
  }

  pub async fn list_institutions(&self) -> QueryState<Vec<Institution>> {
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(
        &QueryKey::Institutions.cache_key(),
        self.is_ready(),
        move || {
          let api = Arc::clone(&api);
          async move { api.list_institutions().await }
        },
      )
      .await
  }

  pub async fn get_institution(&self, id: u64) -> QueryState<Option<Institution>> {
    let key = QueryKey::Institution { id };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        async move { api.get_institution(id).await }
      })
      .await
  }

  pub async fn list_spp_settings(
    &self,
    institution_id: Option<u64>,
  ) -> QueryState<Vec<SppSetting>> {
    let key = QueryKey::SppSettings { institution_id };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        async move { api.list_spp_settings(institution_id).await }
      })
      .await
  }

  pub async fn get_spp_setting(&self, id: u64) -> QueryState<Option<SppSetting>> {
    let key = QueryKey::SppSetting { id };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        async move { api.get_spp_setting(id).await }
      })
      .await
  }

  pub async fn list_payments(
    &self,
    institution_id: Option<u64>,
    student_nis: Option<&str>,
  ) -> QueryState<Vec<Payment>> {
    let student_nis = student_nis.map(str::to_string);
    let key = QueryKey::Payments {
      institution_id,
      student_nis: student_nis.clone(),
    };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        let nis = student_nis.clone();
        async move { api.list_payments(institution_id, nis.as_deref()).await }
      })
      .await
  }

  pub async fn get_payment(&self, id: u64) -> QueryState<Option<Payment>> {
    let key = QueryKey::Payment { id };
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(&key.cache_key(), self.is_ready(), move || {
        let api = Arc::clone(&api);
        async move { api.get_payment(id).await }
      })
      .await
  }

  pub async fn dashboard_stats(&self) -> QueryState<DashboardStats> {
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(
        &QueryKey::DashboardStats.cache_key(),
        self.is_ready(),
        move || {
          let api = Arc::clone(&api);
          async move { api.dashboard_stats().await }
        },
      )
      .await
  }

  pub async fn current_profile(&self) -> QueryState<Option<UserProfile>> {
    let api = Arc::clone(&self.api);
    self
      .cache
      .fetch(
        &QueryKey::CurrentUserProfile.cache_key(),
        self.is_ready(),
        move || {
          let api = Arc::clone(&api);
          async move { api.caller_profile().await }
        },
      )
      .await
  }

  /// Access role of the caller. Uncached: it gates the login flow, not data
  /// screens, and changes only with the session.
  pub async fn caller_access_role(&self) -> Result<AccessRole> {
    self.api.caller_access_role().await
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub async fn add_student(&self, student: NewStudent) -> Result<Student> {
    if student.nis.trim().is_empty() {
      return Err(eyre!("Student NIS is required"));
    }
    if student.full_name.trim().is_empty() {
      return Err(eyre!("Student name is required"));
    }
    self
      .apply(MutationKind::AddStudent, self.api.add_student(student))
      .await
  }

  pub async fn update_student(&self, nis: &str, update: StudentUpdate) -> Result<Student> {
    self
      .apply(
        MutationKind::UpdateStudent {
          nis: nis.to_string(),
        },
        self.api.update_student(nis, update),
      )
      .await
  }

  pub async fn update_student_status(
    &self,
    nis: &str,
    status: StudentStatus,
  ) -> Result<Student> {
    self
      .apply(
        MutationKind::UpdateStudentStatus {
          nis: nis.to_string(),
        },
        self.api.update_student_status(nis, status),
      )
      .await
  }

  pub async fn delete_student(&self, nis: &str) -> Result<()> {
    self
      .apply(MutationKind::DeleteStudent, self.api.delete_student(nis))
      .await
  }

  pub async fn add_institution(&self, name: &str, address: &str) -> Result<Institution> {
    if name.trim().is_empty() {
      return Err(eyre!("Institution name is required"));
    }
    self
      .apply(
        MutationKind::AddInstitution,
        self.api.add_institution(name, address),
      )
      .await
  }

  pub async fn create_spp_setting(&self, setting: NewSppSetting) -> Result<SppSetting> {
    if setting.amount <= 0 {
      return Err(eyre!("Tuition amount must be positive"));
    }
    self
      .apply(
        MutationKind::CreateSppSetting,
        self.api.create_spp_setting(setting),
      )
      .await
  }

  pub async fn update_spp_setting(
    &self,
    id: u64,
    update: SppSettingUpdate,
  ) -> Result<SppSetting> {
    if update.amount <= 0 {
      return Err(eyre!("Tuition amount must be positive"));
    }
    self
      .apply(
        MutationKind::UpdateSppSetting { id },
        self.api.update_spp_setting(id, update),
      )
      .await
  }

  pub async fn delete_spp_setting(&self, id: u64) -> Result<()> {
    self
      .apply(
        MutationKind::DeleteSppSetting { id },
        self.api.delete_spp_setting(id),
      )
      .await
  }

  pub async fn create_payment(&self, request: CreatePaymentRequest) -> Result<Payment> {
    if request.student_nis.trim().is_empty() {
      return Err(eyre!("Payment requires a student NIS"));
    }
    if request.institution_id == 0 {
      return Err(eyre!("Payment requires an institution"));
    }
    if request.amount <= 0 {
      return Err(eyre!("Payment amount must be positive"));
    }
    self
      .apply(MutationKind::CreatePayment, self.api.create_payment(request))
      .await
  }

  pub async fn update_payment(&self, id: u64, update: PaymentUpdate) -> Result<Payment> {
    if update.amount <= 0 {
      return Err(eyre!("Payment amount must be positive"));
    }
    self
      .apply(
        MutationKind::UpdatePayment { id },
        self.api.update_payment(id, update),
      )
      .await
  }

  pub async fn delete_payment(&self, id: u64) -> Result<()> {
    self
      .apply(MutationKind::DeletePayment, self.api.delete_payment(id))
      .await
  }

  /// Save the caller's profile, enforcing the role/institution rule first:
  /// a super admin carries no institution, every other role requires one.
  pub async fn save_profile(&self, mut profile: UserProfile) -> Result<()> {
    match profile.role {
      Role::SuperAdmin => profile.institution_id = None,
      _ if profile.institution_id.is_none() => {
        return Err(eyre!("Role {:?} requires an institution", profile.role));
      }
      _ => {}
    }
    self
      .apply(
        MutationKind::SaveUserProfile,
        self.api.save_caller_profile(profile),
      )
      .await
  }

  /// Run a write and, only when it succeeds, invalidate its declared groups.
  async fn apply<T>(&self, kind: MutationKind, op: impl Future<Output = Result<T>>) -> Result<T> {
    let out = op.await?;
    for prefix in kind.invalidates() {
      self.cache.invalidate(&prefix.render());
    }
    debug!(kind = ?kind, "mutation applied");
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::service::types::PaymentMethod;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::atomic::AtomicU64;
  use std::sync::Mutex;

  fn institution(id: u64) -> Institution {
    Institution {
      id,
      name: format!("SMP {}", id),
      address: "Jl. Pesantren 1".to_string(),
    }
  }

  fn new_student(nis: &str) -> NewStudent {
    NewStudent {
      nis: nis.to_string(),
      class_number: 7,
      registry_number: format!("R-{}", nis),
      full_name: "Andi Saputra".to_string(),
      institution_id: 1,
      guardian_name: "Rina".to_string(),
      guardian_phone: "0812000111".to_string(),
      enrollment_date: 1_693_526_400_123_456_789,
    }
  }

  fn payment_request(nis: &str, amount: i64, date: i64) -> CreatePaymentRequest {
    CreatePaymentRequest {
      student_nis: nis.to_string(),
      institution_id: 1,
      brand: "2026-08".to_string(),
      amount,
      date,
      payment_method: PaymentMethod::Cash,
      notes: String::new(),
      receipt_url: String::new(),
    }
  }

  /// In-memory service double that counts every remote call.
  #[derive(Default)]
  struct FakeApi {
    students: Mutex<Vec<Student>>,
    institutions: Mutex<Vec<Institution>>,
    payments: Mutex<Vec<Payment>>,
    settings: Mutex<Vec<SppSetting>>,
    profile: Mutex<Option<UserProfile>>,
    calls: Mutex<HashMap<&'static str, u32>>,
    fail_writes: AtomicBool,
    next_id: AtomicU64,
  }

  impl FakeApi {
    fn with_institution() -> Self {
      let api = Self::default();
      api.institutions.lock().unwrap().push(institution(1));
      api
    }

    fn hit(&self, name: &'static str) {
      *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
    }

    fn calls(&self, name: &str) -> u32 {
      self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn check_write(&self) -> Result<()> {
      if self.fail_writes.load(Ordering::SeqCst) {
        Err(eyre!("injected write failure"))
      } else {
        Ok(())
      }
    }

    fn institution_by_id(&self, id: u64) -> Institution {
      self
        .institutions
        .lock()
        .unwrap()
        .iter()
        .find(|i| i.id == id)
        .cloned()
        .unwrap_or_else(|| institution(id))
    }

    fn assign_id(&self) -> u64 {
      self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
  }

  #[async_trait]
  impl SppApi for FakeApi {
    async fn list_students(
      &self,
      institution_id: Option<u64>,
      status: Option<StudentStatus>,
    ) -> Result<Vec<Student>> {
      self.hit("list_students");
      Ok(
        self
          .students
          .lock()
          .unwrap()
          .iter()
          .filter(|s| institution_id.map_or(true, |id| s.institution.id == id))
          .filter(|s| status.map_or(true, |st| s.status == st))
          .cloned()
          .collect(),
      )
    }

    async fn get_student(&self, nis: &str) -> Result<Option<Student>> {
      self.hit("get_student");
      Ok(
        self
          .students
          .lock()
          .unwrap()
          .iter()
          .find(|s| s.nis == nis)
          .cloned(),
      )
    }

    async fn add_student(&self, student: NewStudent) -> Result<Student> {
      self.hit("add_student");
      self.check_write()?;
      let created = Student {
        nis: student.nis,
        status: StudentStatus::Enrolled,
        class_number: student.class_number,
        institution: self.institution_by_id(student.institution_id),
        full_name: student.full_name,
        registry_number: student.registry_number,
        guardian_name: student.guardian_name,
        guardian_phone: student.guardian_phone,
        enrollment_date: student.enrollment_date,
      };
      self.students.lock().unwrap().push(created.clone());
      Ok(created)
    }

    async fn update_student(&self, nis: &str, update: StudentUpdate) -> Result<Student> {
      self.hit("update_student");
      self.check_write()?;
      let mut students = self.students.lock().unwrap();
      let student = students
        .iter_mut()
        .find(|s| s.nis == nis)
        .ok_or_else(|| eyre!("no such student"))?;
      student.class_number = update.class_number;
      student.full_name = update.full_name;
      student.guardian_name = update.guardian_name;
      student.guardian_phone = update.guardian_phone;
      Ok(student.clone())
    }

    async fn update_student_status(&self, nis: &str, status: StudentStatus) -> Result<Student> {
      self.hit("update_student_status");
      self.check_write()?;
      let mut students = self.students.lock().unwrap();
      let student = students
        .iter_mut()
        .find(|s| s.nis == nis)
        .ok_or_else(|| eyre!("no such student"))?;
      student.status = status;
      Ok(student.clone())
    }

    async fn delete_student(&self, nis: &str) -> Result<()> {
      self.hit("delete_student");
      self.check_write()?;
      self.students.lock().unwrap().retain(|s| s.nis != nis);
      Ok(())
    }

    async fn student_payment_history(&self, nis: &str) -> Result<Vec<Payment>> {
      self.hit("student_payment_history");
      Ok(
        self
          .payments
          .lock()
          .unwrap()
          .iter()
          .filter(|p| p.student_nis == nis)
          .cloned()
          .collect(),
      )
    }

    async fn list_institutions(&self) -> Result<Vec<Institution>> {
      self.hit("list_institutions");
      Ok(self.institutions.lock().unwrap().clone())
    }

    async fn get_institution(&self, id: u64) -> Result<Option<Institution>> {
      self.hit("get_institution");
      Ok(
        self
          .institutions
          .lock()
          .unwrap()
          .iter()
          .find(|i| i.id == id)
          .cloned(),
      )
    }

    async fn add_institution(&self, name: &str, address: &str) -> Result<Institution> {
      self.hit("add_institution");
      self.check_write()?;
      let created = Institution {
        id: self.assign_id(),
        name: name.to_string(),
        address: address.to_string(),
      };
      self.institutions.lock().unwrap().push(created.clone());
      Ok(created)
    }

    async fn list_spp_settings(&self, institution_id: Option<u64>) -> Result<Vec<SppSetting>> {
      self.hit("list_spp_settings");
      Ok(
        self
          .settings
          .lock()
          .unwrap()
          .iter()
          .filter(|s| institution_id.map_or(true, |id| s.institution.id == id))
          .cloned()
          .collect(),
      )
    }

    async fn get_spp_setting(&self, id: u64) -> Result<Option<SppSetting>> {
      self.hit("get_spp_setting");
      Ok(
        self
          .settings
          .lock()
          .unwrap()
          .iter()
          .find(|s| s.id == id)
          .cloned(),
      )
    }

    async fn create_spp_setting(&self, setting: NewSppSetting) -> Result<SppSetting> {
      self.hit("create_spp_setting");
      self.check_write()?;
      let created = SppSetting {
        id: self.assign_id(),
        institution: self.institution_by_id(setting.institution_id),
        brand: setting.brand,
        amount: setting.amount,
        date: setting.date,
        payment_method: setting.payment_method,
        notes: setting.notes,
        receipt_url: setting.receipt_url,
        created_at: setting.date,
      };
      self.settings.lock().unwrap().push(created.clone());
      Ok(created)
    }

    async fn update_spp_setting(&self, id: u64, update: SppSettingUpdate) -> Result<SppSetting> {
      self.hit("update_spp_setting");
      self.check_write()?;
      let mut settings = self.settings.lock().unwrap();
      let setting = settings
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| eyre!("no such setting"))?;
      setting.amount = update.amount;
      setting.brand = update.brand;
      setting.notes = update.notes;
      Ok(setting.clone())
    }

    async fn delete_spp_setting(&self, id: u64) -> Result<()> {
      self.hit("delete_spp_setting");
      self.check_write()?;
      self.settings.lock().unwrap().retain(|s| s.id != id);
      Ok(())
    }

    async fn list_payments(
      &self,
      institution_id: Option<u64>,
      student_nis: Option<&str>,
    ) -> Result<Vec<Payment>> {
      self.hit("list_payments");
      Ok(
        self
          .payments
          .lock()
          .unwrap()
          .iter()
          .filter(|p| institution_id.map_or(true, |id| p.institution.id == id))
          .filter(|p| student_nis.map_or(true, |nis| p.student_nis == nis))
          .cloned()
          .collect(),
      )
    }

    async fn get_payment(&self, id: u64) -> Result<Option<Payment>> {
      self.hit("get_payment");
      Ok(
        self
          .payments
          .lock()
          .unwrap()
          .iter()
          .find(|p| p.id == id)
          .cloned(),
      )
    }

    async fn create_payment(&self, request: CreatePaymentRequest) -> Result<Payment> {
      self.hit("create_payment");
      self.check_write()?;
      let created = Payment {
        id: self.assign_id(),
        student_nis: request.student_nis,
        institution: self.institution_by_id(request.institution_id),
        brand: request.brand,
        amount: request.amount,
        date: request.date,
        payment_method: request.payment_method,
        notes: request.notes,
        receipt_url: request.receipt_url,
        created_at: request.date,
      };
      self.payments.lock().unwrap().push(created.clone());
      Ok(created)
    }

    async fn update_payment(&self, id: u64, update: PaymentUpdate) -> Result<Payment> {
      self.hit("update_payment");
      self.check_write()?;
      let mut payments = self.payments.lock().unwrap();
      let payment = payments
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| eyre!("no such payment"))?;
      payment.amount = update.amount;
      payment.date = update.date;
      payment.payment_method = update.payment_method;
      payment.notes = update.notes;
      Ok(payment.clone())
    }

    async fn delete_payment(&self, id: u64) -> Result<()> {
      self.hit("delete_payment");
      self.check_write()?;
      self.payments.lock().unwrap().retain(|p| p.id != id);
      Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats> {
      self.hit("dashboard_stats");
      Ok(DashboardStats {
        total_smp_students: self.students.lock().unwrap().len() as u64,
        total_sma_students: 0,
        total_payments_this_month: self.payments.lock().unwrap().len() as u64,
        total_arrears_this_month: 0,
      })
    }

    async fn caller_profile(&self) -> Result<Option<UserProfile>> {
      self.hit("caller_profile");
      Ok(self.profile.lock().unwrap().clone())
    }

    async fn save_caller_profile(&self, profile: UserProfile) -> Result<()> {
      self.hit("save_caller_profile");
      self.check_write()?;
      *self.profile.lock().unwrap() = Some(profile);
      Ok(())
    }

    async fn caller_access_role(&self) -> Result<AccessRole> {
      self.hit("caller_access_role");
      Ok(AccessRole::Admin)
    }
  }

  fn client_for(api: &Arc<FakeApi>) -> CachedSppClient {
    CachedSppClient::new(api.clone(), QueryCache::new())
  }

  #[tokio::test]
  async fn payment_creation_invalidates_dependent_groups() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.add_student(new_student("1001")).await.unwrap();

    // Prime the dependent groups plus one bystander
    client.list_payments(None, None).await;
    client.list_students(None, None).await;
    client.student_payment_history("1001").await;
    client.dashboard_stats().await;
    client.list_institutions().await;

    client
      .create_payment(payment_request("1001", 50_000, 7))
      .await
      .unwrap();

    let cache = client.cache();
    assert!(cache.is_stale("payments:~:~"));
    assert!(cache.is_stale("students:~:~"));
    assert!(cache.is_stale("studentPaymentHistory:1001"));
    assert!(cache.is_stale("dashboardStats"));
    assert!(!cache.is_stale("institutions"));
  }

  #[tokio::test]
  async fn failed_mutation_invalidates_nothing() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.add_student(new_student("1001")).await.unwrap();
    client
      .create_payment(payment_request("1001", 25_000, 3))
      .await
      .unwrap();

    let before = client
      .list_payments(None, None)
      .await
      .into_data()
      .unwrap();
    assert_eq!(before.len(), 1);

    api.fail_writes.store(true, Ordering::SeqCst);
    let err = client
      .create_payment(payment_request("1001", 50_000, 7))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("injected"));

    // Nothing went stale and the cached list is unchanged
    let cache = client.cache();
    assert!(!cache.is_stale("payments:~:~"));
    assert!(!cache.is_stale("dashboardStats"));
    assert_eq!(cache.peek::<Vec<Payment>>("payments:~:~"), Some(before));
  }

  #[tokio::test]
  async fn student_round_trip_preserves_submitted_values() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.add_student(new_student("1001")).await.unwrap();

    let student = client
      .get_student("1001")
      .await
      .into_data()
      .unwrap()
      .expect("student should exist");

    assert_eq!(student.nis, "1001");
    assert_eq!(student.full_name, "Andi Saputra");
    assert_eq!(student.guardian_phone, "0812000111");
    // Nanosecond precision survives the trip
    assert_eq!(student.enrollment_date, 1_693_526_400_123_456_789);
  }

  #[tokio::test]
  async fn stale_student_list_refetches_after_add() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    let before = client
      .list_students(None, None)
      .await
      .into_data()
      .unwrap();
    assert!(before.is_empty());

    client.add_student(new_student("1001")).await.unwrap();

    let after = client.list_students(None, None).await.into_data().unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(api.calls("list_students"), 2);
  }

  #[tokio::test]
  async fn payment_history_lists_the_created_entry() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);
    let date = 1_700_000_000_000_000_000i64;

    client.add_student(new_student("1001")).await.unwrap();
    client.student_payment_history("1001").await;

    client
      .create_payment(payment_request("1001", 50_000, date))
      .await
      .unwrap();

    let history = client
      .student_payment_history("1001")
      .await
      .into_data()
      .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 50_000);
    assert_eq!(history[0].date, date);
    assert_eq!(history[0].payment_method, PaymentMethod::Cash);
  }

  #[tokio::test]
  async fn super_admin_profile_drops_the_institution() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    // Prime the profile entry so the save has something to invalidate
    let state = client.current_profile().await;
    assert!(state.is_success());

    client
      .save_profile(UserProfile {
        name: "Siti".to_string(),
        role: Role::SuperAdmin,
        institution_id: Some(9),
      })
      .await
      .unwrap();

    let saved = api.profile.lock().unwrap().clone().unwrap();
    assert_eq!(saved.institution_id, None);
    assert!(client.cache().is_stale("currentUserProfile"));
  }

  #[tokio::test]
  async fn scoped_role_without_institution_is_rejected_client_side() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    let err = client
      .save_profile(UserProfile {
        name: "Budi".to_string(),
        role: Role::Treasurer,
        institution_id: None,
      })
      .await
      .unwrap_err();

    assert!(err.to_string().contains("requires an institution"));
    assert_eq!(api.calls("save_caller_profile"), 0);
  }

  #[tokio::test]
  async fn invalid_payment_amounts_never_reach_the_service() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client
      .create_payment(payment_request("1001", 0, 7))
      .await
      .unwrap_err();
    client
      .update_payment(
        1,
        PaymentUpdate {
          amount: -5,
          date: 7,
          payment_method: PaymentMethod::Transfer,
          notes: String::new(),
        },
      )
      .await
      .unwrap_err();

    assert_eq!(api.calls("create_payment"), 0);
    assert_eq!(api.calls("update_payment"), 0);
  }

  #[tokio::test]
  async fn disabled_reads_never_reach_the_service() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.set_ready(false);
    let state = client.list_students(None, None).await;
    assert!(matches!(state, QueryState::Idle));
    assert_eq!(api.calls("list_students"), 0);

    client.set_ready(true);
    let state = client.list_students(None, None).await;
    assert!(state.is_success());
    assert_eq!(api.calls("list_students"), 1);
  }

  #[tokio::test]
  async fn access_role_is_an_uncached_passthrough() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.caller_access_role().await.unwrap();
    client.caller_access_role().await.unwrap();
    assert_eq!(api.calls("caller_access_role"), 2);
  }

  #[tokio::test]
  async fn update_payment_also_invalidates_its_single_key() {
    let api = Arc::new(FakeApi::with_institution());
    let client = client_for(&api);

    client.add_student(new_student("1001")).await.unwrap();
    let payment = client
      .create_payment(payment_request("1001", 25_000, 3))
      .await
      .unwrap();

    client.get_payment(payment.id).await;
    client
      .update_payment(
        payment.id,
        PaymentUpdate {
          amount: 30_000,
          date: 4,
          payment_method: PaymentMethod::Transfer,
          notes: "corrected".to_string(),
        },
      )
      .await
      .unwrap();

    assert!(client
      .cache()
      .is_stale(&format!("payment:{}", payment.id)));
  }
}
