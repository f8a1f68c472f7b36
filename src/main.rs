use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use gpa_tracker::auth::RegisterRequest;
use gpa_tracker::env::{Config, load_environment};
use gpa_tracker::telemetry::init_tracing;
use gpa_tracker::transfer::{export_to_file, import_from_file};
use gpa_tracker::{CourseDraft, Grade, Period, Session, db};

#[derive(Parser)]
#[command(name = "gpa-tracker")]
#[command(about = "Track courses and compute semester and cumulative GPA", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Login {
    #[arg(long, short)]
    username: String,
    /// Falls back to GPA_PASSWORD when omitted
    #[arg(long, short, env = "GPA_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
struct PeriodArgs {
    /// Academic year label, e.g. "Year 2"
    #[arg(long)]
    year: Option<String>,
    /// Semester label, e.g. "Semester 1"
    #[arg(long)]
    semester: Option<String>,
}

impl PeriodArgs {
    fn resolve(&self, config: &Config) -> Period {
        let default = &config.default_period;
        Period::new(
            self.year.as_deref().unwrap_or(&default.academic_year),
            self.semester.as_deref().unwrap_or(&default.semester),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        email: Option<String>,
    },
    /// Add or update a course in a period
    Add {
        #[command(flatten)]
        login: Login,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "")]
        code: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        credits: String,
    },
    /// List stored courses, newest first
    List {
        #[command(flatten)]
        login: Login,
    },
    /// Show semester and cumulative GPA
    Gpa {
        #[command(flatten)]
        login: Login,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Record a GPA snapshot for a period
    Snapshot {
        #[command(flatten)]
        login: Login,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Show recorded GPA snapshots
    History {
        #[command(flatten)]
        login: Login,
    },
    /// Show course totals
    Stats {
        #[command(flatten)]
        login: Login,
    },
    /// Write all courses to a JSON file
    Export {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace all courses with the contents of a JSON file
    Import {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the grade scale
    Grades,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_environment();
    let _telemetry = init_tracing()?;
    match loaded {
        Ok(files) => {
            for file in files {
                info!("Loaded environment from: {}", file);
            }
        }
        Err(e) => warn!("Failed to load environment files: {}", e),
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if let Err(e) = run(cli, &config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Grades => {
            for grade in Grade::all() {
                let note = if grade.is_credit_bearing() {
                    ""
                } else {
                    "  (no credit)"
                };
                println!("{:<3} {:.1}{}", grade.as_str(), grade.points(), note);
            }
        }
        Commands::Register { login, email } => {
            let request = RegisterRequest::new(&login.username, &login.password, email.as_deref());
            let pool = connect(config).await?;
            let session = Session::register(&pool, request).await?;
            println!("Account created for {}.", session.user().username);
        }
        Commands::Add {
            login,
            period,
            course,
            code,
            grade,
            credits,
        } => {
            let mut session = open(config, &login).await?;
            let period = period.resolve(config);
            let draft = CourseDraft::new(&course, &grade, &credits)
                .with_code(&code)
                .in_period(&period);
            let course = draft.validate()?;

            session.select_period(period);
            session.add_course(draft);
            session.save().await?;
            session.reload().await?;
            println!(
                "Saved {} ({}, {} credits). Semester GPA: {:.2}",
                course.course_name,
                course.grade,
                course.credits,
                session.semester_gpa()
            );
        }
        Commands::List { login } => {
            let session = open(config, &login).await?;
            for entry in session.courses().iter() {
                let draft = &entry.draft;
                println!(
                    "{:<10} {:<12} {:<24} {:<8} {:<3} {}",
                    draft.academic_year,
                    draft.semester,
                    draft.course_name,
                    draft.course_code,
                    draft.grade,
                    draft.credits
                );
            }
        }
        Commands::Gpa { login, period } => {
            let mut session = open(config, &login).await?;
            session.select_period(period.resolve(config));

            let semester = session.semester_summary();
            let cumulative = session.cumulative_summary().await?;
            println!(
                "{} / {}: GPA {:.2} over {:.1} credits ({} courses)",
                session.period().academic_year,
                session.period().semester,
                semester.gpa,
                semester.total_credits,
                semester.course_count
            );
            println!(
                "Cumulative: GPA {:.2} over {:.1} credits ({})",
                cumulative.gpa,
                cumulative.total_credits,
                cumulative.standing()
            );
        }
        Commands::Snapshot { login, period } => {
            let mut session = open(config, &login).await?;
            session.select_period(period.resolve(config));
            let snapshot = session.record_snapshot().await?;
            println!(
                "Semester GPA: {:.2}\nCumulative GPA: {:.2}\nTotal Credits: {:.1}",
                snapshot.semester_gpa, snapshot.cumulative_gpa, snapshot.total_credits
            );
        }
        Commands::History { login } => {
            let session = open(config, &login).await?;
            for snapshot in session.history().await? {
                println!(
                    "{:<10} {:<12} {:>5.2} {:>5.2} {:>6.1} {}",
                    snapshot.academic_year,
                    snapshot.semester,
                    snapshot.semester_gpa,
                    snapshot.cumulative_gpa,
                    snapshot.total_credits,
                    snapshot.computed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Stats { login } => {
            let session = open(config, &login).await?;
            let stats = session.stats().await?;
            println!("Courses: {}", stats.total_courses);
            println!("Credits: {:.1}", stats.total_credits);
            if let Some(first) = stats.first_course_date {
                println!("First course added: {}", first.format("%Y-%m-%d"));
            }
        }
        Commands::Export { login, out } => {
            let session = open(config, &login).await?;
            export_to_file(&out, &session.export_document())
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported {} courses to {}", session.courses().len(), out.display());
        }
        Commands::Import { login, file } => {
            let mut session = open(config, &login).await?;
            let document = import_from_file(&file)?;
            let count = session.import_document(document);
            let report = session.save_all().await?;
            info!(count, "Import finished");
            println!(
                "Imported {} courses ({} stored, {} skipped).",
                count, report.saved, report.skipped
            );
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))
}

async fn open(config: &Config, login: &Login) -> anyhow::Result<Session> {
    let pool = connect(config).await?;
    Session::login(&pool, &login.username, &login.password)
        .await
        .context("login failed")
}
