//! Operator commands for the sppctl binary.

use chrono::{TimeZone, Utc};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};

use crate::service::types::{
  CreatePaymentRequest, NewStudent, PaymentMethod, Role, StudentStatus, UserProfile,
};
use crate::service::CachedSppClient;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Show dashboard counters
  Dashboard,
  /// Browse and manage students
  #[command(subcommand)]
  Students(StudentsCommand),
  /// Browse and manage institutions
  #[command(subcommand)]
  Institutions(InstitutionsCommand),
  /// Browse and record payments
  #[command(subcommand)]
  Payments(PaymentsCommand),
  /// Browse tuition rate settings
  #[command(subcommand)]
  Settings(SettingsCommand),
  /// Show or save the caller profile
  #[command(subcommand)]
  Profile(ProfileCommand),
}

#[derive(Debug, Subcommand)]
pub enum StudentsCommand {
  /// List students
  List {
    /// Filter by institution id
    #[arg(long)]
    institution: Option<u64>,
    /// Filter by status: enrolled or graduated
    #[arg(long)]
    status: Option<String>,
  },
  /// Show one student and their payment history
  Show { nis: String },
  /// Register a new student
  Add {
    nis: String,
    full_name: String,
    #[arg(long)]
    class: u32,
    #[arg(long)]
    institution: u64,
    #[arg(long, default_value = "")]
    registry_number: String,
    #[arg(long, default_value = "")]
    guardian_name: String,
    #[arg(long, default_value = "")]
    guardian_phone: String,
    /// Enrollment date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    enrolled: Option<String>,
  },
  /// Change a student's status
  SetStatus { nis: String, status: String },
}

#[derive(Debug, Subcommand)]
pub enum InstitutionsCommand {
  /// List institutions
  List,
  /// Add an institution
  Add { name: String, address: String },
}

#[derive(Debug, Subcommand)]
pub enum PaymentsCommand {
  /// List payments
  List {
    /// Filter by institution id
    #[arg(long)]
    institution: Option<u64>,
    /// Filter by student NIS
    #[arg(long)]
    student: Option<String>,
  },
  /// Record a payment for a student
  Record {
    nis: String,
    /// Amount in minor currency units
    amount: i64,
    /// Billing period label (defaults to the current month)
    #[arg(long)]
    brand: Option<String>,
    /// Payment date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    date: Option<String>,
    /// Payment method: cash or transfer
    #[arg(long, default_value = "cash")]
    method: String,
    #[arg(long, default_value = "")]
    notes: String,
  },
  /// Show a student's payment history
  History { nis: String },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
  /// List tuition rate settings
  List {
    /// Filter by institution id
    #[arg(long)]
    institution: Option<u64>,
  },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
  /// Show the caller's profile
  Show,
  /// Save the caller's profile
  Save {
    name: String,
    /// One of: superAdmin, treasurer, smpAdmin, smaAdmin
    role: String,
    /// Institution id; required for every role except superAdmin
    #[arg(long)]
    institution: Option<u64>,
  },
}

pub async fn run(command: Command, client: &CachedSppClient) -> Result<()> {
  match command {
    Command::Dashboard => dashboard(client).await,
    Command::Students(cmd) => students(cmd, client).await,
    Command::Institutions(cmd) => institutions(cmd, client).await,
    Command::Payments(cmd) => payments(cmd, client).await,
    Command::Settings(cmd) => settings(cmd, client).await,
    Command::Profile(cmd) => profile(cmd, client).await,
  }
}

async fn dashboard(client: &CachedSppClient) -> Result<()> {
  let (stats, institutions) =
    futures::join!(client.dashboard_stats(), client.list_institutions());
  let stats = stats.require("dashboard stats")?;
  let institutions = institutions.require("institutions")?;

  println!("SMP students:        {}", stats.total_smp_students);
  println!("SMA students:        {}", stats.total_sma_students);
  println!("Payments this month: {}", stats.total_payments_this_month);
  println!("Arrears this month:  {}", stats.total_arrears_this_month);
  println!();
  for inst in &institutions {
    println!("[{}] {} - {}", inst.id, inst.name, inst.address);
  }
  Ok(())
}

async fn students(cmd: StudentsCommand, client: &CachedSppClient) -> Result<()> {
  match cmd {
    StudentsCommand::List {
      institution,
      status,
    } => {
      let status = status.as_deref().map(parse_status).transpose()?;
      let students = client
        .list_students(institution, status)
        .await
        .require("students")?;
      for s in &students {
        println!(
          "{:<12} {:<28} {:<10} class {:<3} {}",
          s.nis,
          s.full_name,
          s.status.as_str(),
          s.class_number,
          s.institution.name
        );
      }
      println!("{} student(s)", students.len());
    }
    StudentsCommand::Show { nis } => {
      let (student, history) = futures::join!(
        client.get_student(&nis),
        client.student_payment_history(&nis)
      );
      let student = student
        .require("student")?
        .ok_or_else(|| eyre!("No student with NIS {}", nis))?;
      let history = history.require("payment history")?;

      println!("{} ({})", student.full_name, student.nis);
      println!("Status:      {}", student.status.as_str());
      println!("Class:       {}", student.class_number);
      println!("Institution: {}", student.institution.name);
      println!("Guardian:    {} {}", student.guardian_name, student.guardian_phone);
      println!("Enrolled:    {}", format_date(student.enrollment_date));
      println!();
      for p in &history {
        println!(
          "#{:<6} {:<10} {:>12} {:<8} {}",
          p.id,
          p.brand,
          p.amount,
          p.payment_method.as_str(),
          format_date(p.date)
        );
      }
      println!("{} payment(s)", history.len());
    }
    StudentsCommand::Add {
      nis,
      full_name,
      class,
      institution,
      registry_number,
      guardian_name,
      guardian_phone,
      enrolled,
    } => {
      let enrollment_date = match enrolled {
        Some(date) => parse_date_nanos(&date)?,
        None => now_nanos()?,
      };
      let student = client
        .add_student(NewStudent {
          nis,
          class_number: class,
          registry_number,
          full_name,
          institution_id: institution,
          guardian_name,
          guardian_phone,
          enrollment_date,
        })
        .await?;
      println!("Registered {} ({})", student.full_name, student.nis);
    }
    StudentsCommand::SetStatus { nis, status } => {
      let status = parse_status(&status)?;
      let student = client.update_student_status(&nis, status).await?;
      println!("{} is now {}", student.nis, student.status.as_str());
    }
  }
  Ok(())
}

async fn institutions(cmd: InstitutionsCommand, client: &CachedSppClient) -> Result<()> {
  match cmd {
    InstitutionsCommand::List => {
      let institutions = client.list_institutions().await.require("institutions")?;
      for inst in &institutions {
        println!("[{}] {} - {}", inst.id, inst.name, inst.address);
      }
      println!("{} institution(s)", institutions.len());
    }
    InstitutionsCommand::Add { name, address } => {
      let inst = client.add_institution(&name, &address).await?;
      println!("Added institution [{}] {}", inst.id, inst.name);
    }
  }
  Ok(())
}

async fn payments(cmd: PaymentsCommand, client: &CachedSppClient) -> Result<()> {
  match cmd {
    PaymentsCommand::List {
      institution,
      student,
    } => {
      let payments = client
        .list_payments(institution, student.as_deref())
        .await
        .require("payments")?;
      for p in &payments {
        println!(
          "#{:<6} {:<12} {:<10} {:>12} {:<8} {}",
          p.id,
          p.student_nis,
          p.brand,
          p.amount,
          p.payment_method.as_str(),
          format_date(p.date)
        );
      }
      println!("{} payment(s)", payments.len());
    }
    PaymentsCommand::Record {
      nis,
      amount,
      brand,
      date,
      method,
      notes,
    } => {
      let method = parse_method(&method)?;
      let date = match date {
        Some(d) => parse_date_nanos(&d)?,
        None => now_nanos()?,
      };
      let brand = brand.unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());

      // The student's own institution pre-fills the payment
      let student = client
        .get_student(&nis)
        .await
        .require("student")?
        .ok_or_else(|| eyre!("No student with NIS {}", nis))?;

      let mut request = CreatePaymentRequest::for_student(&student, &brand, amount, date);
      request.payment_method = method;
      request.notes = notes;

      let payment = client.create_payment(request).await?;
      println!(
        "Recorded payment #{} of {} for {} ({})",
        payment.id, payment.amount, payment.student_nis, payment.brand
      );
    }
    PaymentsCommand::History { nis } => {
      let history = client
        .student_payment_history(&nis)
        .await
        .require("payment history")?;
      for p in &history {
        println!(
          "#{:<6} {:<10} {:>12} {:<8} {}",
          p.id,
          p.brand,
          p.amount,
          p.payment_method.as_str(),
          format_date(p.date)
        );
      }
      println!("{} payment(s)", history.len());
    }
  }
  Ok(())
}

async fn settings(cmd: SettingsCommand, client: &CachedSppClient) -> Result<()> {
  match cmd {
    SettingsCommand::List { institution } => {
      let settings = client
        .list_spp_settings(institution)
        .await
        .require("tuition settings")?;
      for s in &settings {
        println!("[{}] {:<10} {:>12} {}", s.id, s.brand, s.amount, s.institution.name);
      }
      println!("{} setting(s)", settings.len());
    }
  }
  Ok(())
}

async fn profile(cmd: ProfileCommand, client: &CachedSppClient) -> Result<()> {
  match cmd {
    ProfileCommand::Show => {
      match client.current_profile().await.require("profile")? {
        Some(p) => {
          println!("{} ({:?})", p.name, p.role);
          if let Some(id) = p.institution_id {
            println!("Institution: {}", id);
          }
        }
        None => println!("No profile saved yet"),
      }
    }
    ProfileCommand::Save {
      name,
      role,
      institution,
    } => {
      let role = parse_role(&role)?;
      client
        .save_profile(UserProfile {
          name,
          role,
          institution_id: institution,
        })
        .await?;
      println!("Profile saved");
    }
  }
  Ok(())
}

fn parse_status(input: &str) -> Result<StudentStatus> {
  match input.to_lowercase().as_str() {
    "enrolled" => Ok(StudentStatus::Enrolled),
    "graduated" => Ok(StudentStatus::Graduated),
    _ => Err(eyre!("Unknown status '{}'. Use enrolled or graduated.", input)),
  }
}

fn parse_method(input: &str) -> Result<PaymentMethod> {
  match input.to_lowercase().as_str() {
    "cash" => Ok(PaymentMethod::Cash),
    "transfer" => Ok(PaymentMethod::Transfer),
    _ => Err(eyre!("Unknown payment method '{}'. Use cash or transfer.", input)),
  }
}

fn parse_role(input: &str) -> Result<Role> {
  match input.to_lowercase().as_str() {
    "superadmin" => Ok(Role::SuperAdmin),
    "treasurer" => Ok(Role::Treasurer),
    "smpadmin" => Ok(Role::SmpAdmin),
    "smaadmin" => Ok(Role::SmaAdmin),
    _ => Err(eyre!(
      "Unknown role '{}'. Use superAdmin, treasurer, smpAdmin or smaAdmin.",
      input
    )),
  }
}

/// Parse a YYYY-MM-DD date into epoch nanoseconds at midnight UTC.
fn parse_date_nanos(input: &str) -> Result<i64> {
  let date = chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d")
    .map_err(|e| eyre!("Invalid date '{}': {}", input, e))?;
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| eyre!("Invalid date '{}'", input))?;
  midnight
    .and_utc()
    .timestamp_nanos_opt()
    .ok_or_else(|| eyre!("Date '{}' is out of range", input))
}

fn now_nanos() -> Result<i64> {
  Utc::now()
    .timestamp_nanos_opt()
    .ok_or_else(|| eyre!("Current time is out of range"))
}

fn format_date(nanos: i64) -> String {
  Utc.timestamp_nanos(nanos).format("%Y-%m-%d").to_string()
}
