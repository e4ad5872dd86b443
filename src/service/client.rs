//! HTTP/JSON client for the SPP service.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::config::Config;

use super::types::{
  AccessRole, CreatePaymentRequest, DashboardStats, Institution, NewSppSetting, NewStudent,
  Payment, PaymentUpdate, SppSetting, SppSettingUpdate, Student, StudentStatus, StudentUpdate,
  UserProfile,
};
use super::SppApi;

/// SPP service client wrapper
#[derive(Clone)]
pub struct SppClient {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl SppClient {
  /// Build a client from configuration. The bearer token comes from the
  /// environment (see [`Config::get_api_token`]).
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    // A trailing slash keeps Url::join from eating the last path segment
    let mut url = config.service.url.clone();
    if !url.ends_with('/') {
      url.push('/');
    }
    let base =
      Url::parse(&url).map_err(|e| eyre!("Invalid service URL {}: {}", config.service.url, e))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  /// Build a client and verify the service is reachable and the token is
  /// accepted, via a caller-role round-trip.
  pub async fn connect(config: &Config) -> Result<Self> {
    let client = Self::new(config)?;
    client
      .caller_access_role()
      .await
      .map_err(|e| eyre!("Failed to reach SPP service: {}", e))?;
    Ok(client)
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    let response = self
      .http
      .get(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .query(query)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    Self::read_json(response, path).await
  }

  /// GET where the service answers 404 for a missing entity.
  async fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
    let response = self
      .http
      .get(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    Self::read_json(response, path).await.map(Some)
  }

  async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
    let response = self
      .http
      .post(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    Self::read_json(response, path).await
  }

  async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
    let response = self
      .http
      .put(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    Self::read_json(response, path).await
  }

  async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
    let response = self
      .http
      .put(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    Self::expect_success(response, path).await
  }

  async fn delete(&self, path: &str) -> Result<()> {
    let response = self
      .http
      .delete(self.endpoint(path)?)
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", path, e))?;

    Self::expect_success(response, path).await
  }

  async fn read_json<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!("Service returned {} for {}: {}", status, path, body));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  async fn expect_success(response: reqwest::Response, path: &str) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!("Service returned {} for {}: {}", status, path, body));
    }
    Ok(())
  }
}

#[async_trait]
impl SppApi for SppClient {
  async fn list_students(
    &self,
    institution_id: Option<u64>,
    status: Option<StudentStatus>,
  ) -> Result<Vec<Student>> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(id) = institution_id {
      query.push(("institutionId", id.to_string()));
    }
    if let Some(status) = status {
      query.push(("status", status.as_str().to_string()));
    }
    self.get("api/v1/students", &query).await
  }

  async fn get_student(&self, nis: &str) -> Result<Option<Student>> {
    self.get_opt(&format!("api/v1/students/{}", nis)).await
  }

  async fn add_student(&self, student: NewStudent) -> Result<Student> {
    self.post("api/v1/students", &student).await
  }

  async fn update_student(&self, nis: &str, update: StudentUpdate) -> Result<Student> {
    self.put(&format!("api/v1/students/{}", nis), &update).await
  }

  async fn update_student_status(&self, nis: &str, status: StudentStatus) -> Result<Student> {
    self
      .put(
        &format!("api/v1/students/{}/status", nis),
        &json!({ "status": status }),
      )
      .await
  }

  async fn delete_student(&self, nis: &str) -> Result<()> {
    self.delete(&format!("api/v1/students/{}", nis)).await
  }

  async fn student_payment_history(&self, nis: &str) -> Result<Vec<Payment>> {
    self
      .get(&format!("api/v1/students/{}/payments", nis), &[])
      .await
  }

  async fn list_institutions(&self) -> Result<Vec<Institution>> {
    self.get("api/v1/institutions", &[]).await
  }

  async fn get_institution(&self, id: u64) -> Result<Option<Institution>> {
    self.get_opt(&format!("api/v1/institutions/{}", id)).await
  }

  async fn add_institution(&self, name: &str, address: &str) -> Result<Institution> {
    self
      .post(
        "api/v1/institutions",
        &json!({ "name": name, "address": address }),
      )
      .await
  }

  async fn list_spp_settings(&self, institution_id: Option<u64>) -> Result<Vec<SppSetting>> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(id) = institution_id {
      query.push(("institutionId", id.to_string()));
    }
    self.get("api/v1/spp-settings", &query).await
  }

  async fn get_spp_setting(&self, id: u64) -> Result<Option<SppSetting>> {
    self.get_opt(&format!("api/v1/spp-settings/{}", id)).await
  }

  async fn create_spp_setting(&self, setting: NewSppSetting) -> Result<SppSetting> {
    self.post("api/v1/spp-settings", &setting).await
  }

  async fn update_spp_setting(&self, id: u64, update: SppSettingUpdate) -> Result<SppSetting> {
    self
      .put(&format!("api/v1/spp-settings/{}", id), &update)
      .await
  }

  async fn delete_spp_setting(&self, id: u64) -> Result<()> {
    self.delete(&format!("api/v1/spp-settings/{}", id)).await
  }

  async fn list_payments(
    &self,
    institution_id: Option<u64>,
    student_nis: Option<&str>,
  ) -> Result<Vec<Payment>> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(id) = institution_id {
      query.push(("institutionId", id.to_string()));
    }
    if let Some(nis) = student_nis {
      query.push(("studentNis", nis.to_string()));
    }
    self.get("api/v1/payments", &query).await
  }

  async fn get_payment(&self, id: u64) -> Result<Option<Payment>> {
    self.get_opt(&format!("api/v1/payments/{}", id)).await
  }

  async fn create_payment(&self, request: CreatePaymentRequest) -> Result<Payment> {
    self.post("api/v1/payments", &request).await
  }

  async fn update_payment(&self, id: u64, update: PaymentUpdate) -> Result<Payment> {
    self.put(&format!("api/v1/payments/{}", id), &update).await
  }

  async fn delete_payment(&self, id: u64) -> Result<()> {
    self.delete(&format!("api/v1/payments/{}", id)).await
  }

  async fn dashboard_stats(&self) -> Result<DashboardStats> {
    self.get("api/v1/dashboard/stats", &[]).await
  }

  async fn caller_profile(&self) -> Result<Option<UserProfile>> {
    self.get_opt("api/v1/profile").await
  }

  async fn save_caller_profile(&self, profile: UserProfile) -> Result<()> {
    self.put_unit("api/v1/profile", &profile).await
  }

  async fn caller_access_role(&self) -> Result<AccessRole> {
    self.get("api/v1/profile/role", &[]).await
  }
}
