mod api;
mod board;
mod bridge;
mod config;
mod dashboard;
mod error;
mod gate;
mod logging;
mod models;
mod notice;
mod pipeline;
mod resume;
mod search;
mod session;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use api::{ApiClient, JobTrackerApi};
use config::Config;
use gate::{Gate, Route};
use models::{Application, ApplicationStatus, InterviewType, JobListing, RecordId, Registration, SearchParams, TrackingDraft};
use notice::Notices;
use pipeline::{InterviewDraft, Pipeline, Position};
use resume::{AnalysisTab, ResumeInput};
use search::{JobSearch, SavedJobs, SystemOpener};
use session::{LocalStore, SessionService};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications against a remote job tracker service")]
struct Cli {
    /// Base URL of the tracker API (overrides JOBTRACK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show session and connection settings
    Status,

    /// Show dashboard statistics
    Stats,

    /// Search job postings
    Search {
        /// Job title, keywords or company
        keyword: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        /// full_time, part_time, contract or temporary
        #[arg(short, long)]
        category: Option<String>,

        /// Remote positions only
        #[arg(long)]
        remote: bool,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Toggle the saved flag of a listing in the results
        #[arg(long, value_name = "JOB_ID")]
        save: Option<String>,

        /// Track a listing as applied and open its application link
        #[arg(long, value_name = "JOB_ID")]
        apply: Option<String>,

        /// Application date for --apply (YYYY-MM-DD, default today)
        #[arg(long, requires = "apply")]
        date: Option<NaiveDate>,

        /// Notes for --apply
        #[arg(long, requires = "apply")]
        notes: Option<String>,
    },

    /// Manage saved jobs
    Saved {
        #[command(subcommand)]
        command: Option<SavedCommands>,
    },

    /// List tracked applications by status
    Apps {
        /// Only this status (applied, screening, interview, offer, rejected)
        #[arg(short, long)]
        status: Option<ApplicationStatus>,
    },

    /// Show one application
    Show { id: RecordId },

    /// Move an application to another status
    Move {
        id: RecordId,

        status: ApplicationStatus,

        /// Position within the destination column (default: end)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Replace an application's notes
    Notes { id: RecordId, notes: String },

    /// Schedule an interview for an application
    Interview {
        id: RecordId,

        /// phone-screen, technical, behavioral, onsite or final
        #[arg(short = 't', long = "type")]
        interview_type: InterviewType,

        /// Local date and time, e.g. 2024-05-01T14:30
        #[arg(long)]
        at: String,

        /// Address or meeting link
        #[arg(short, long, default_value = "")]
        location: String,

        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Delete an application
    Delete {
        id: RecordId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Score a resume against a job description
    Analyze {
        /// Resume file (.txt, .md, .pdf or .docx)
        #[arg(long, conflicts_with = "resume_text")]
        resume: Option<PathBuf>,

        #[arg(long)]
        resume_text: Option<String>,

        /// Plain-text job description file
        #[arg(long, conflicts_with = "job_text")]
        job: Option<PathBuf>,

        #[arg(long)]
        job_text: Option<String>,

        /// Show a single tab instead of all of them
        #[arg(long, value_enum)]
        tab: Option<AnalysisTab>,
    },

    /// Interactive application board
    Board,
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved jobs
    List,

    /// Remove a job from the saved list
    Remove { id: RecordId },
}

impl Commands {
    fn route(&self) -> Option<Route> {
        match self {
            Commands::Login { .. } => Some(Route::Login),
            Commands::Register { .. } => Some(Route::Register),
            Commands::Logout | Commands::Status => None,
            Commands::Stats => Some(Route::Dashboard),
            Commands::Search { .. } => Some(Route::Jobs),
            Commands::Saved { .. } => Some(Route::SavedJobs),
            Commands::Analyze { .. } => Some(Route::ResumeAnalysis),
            Commands::Apps { .. }
            | Commands::Show { .. }
            | Commands::Move { .. }
            | Commands::Notes { .. }
            | Commands::Interview { .. }
            | Commands::Delete { .. }
            | Commands::Board => Some(Route::Applications),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(cli.api_url)?;
    logging::init(&config.log_path())?;

    let store = LocalStore::open(&config.store_path())?;
    let session = Arc::new(SessionService::new(store));
    session.initialize()?;
    let client = ApiClient::new(&config, session.clone())?;
    tracing::debug!(api = client.base_url(), "client ready");
    let api: Arc<dyn JobTrackerApi> = Arc::new(client);

    if let Some(route) = cli.command.route() {
        match gate::resolve(route, session.state()) {
            Gate::Render(_) => {}
            Gate::Redirect(Route::Login) => bail!("Not logged in. Run `jobtrack login` first."),
            Gate::Redirect(_) => {
                println!("Already logged in.");
                return show_dashboard(api.as_ref());
            }
            Gate::Pending => bail!("Session storage has not been read"),
        }
    }

    match cli.command {
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            session::login(api.as_ref(), &session, &email, &password)?;
            println!("Logged in as {}", email);
        }

        Commands::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            let registration = Registration {
                firstname: first_name,
                lastname: last_name,
                email,
                password: password_or_prompt(password)?,
            };
            session::register(api.as_ref(), &session, &registration)?;
            println!("Account created for {}", registration.email);
        }

        Commands::Logout => {
            session::logout(&session)?;
            println!("Logged out.");
        }

        Commands::Status => {
            println!("API:      {}", config.api_url);
            println!("Timeout:  {}s", config.timeout.as_secs());
            println!("Store:    {}", config.store_path().display());
            let state = if session.is_authenticated() { "logged in" } else { "not logged in" };
            println!("Session:  {}", state);
        }

        Commands::Stats => show_dashboard(api.as_ref())?,

        Commands::Search {
            keyword,
            location,
            category,
            remote,
            page,
            save,
            apply,
            date,
            notes,
        } => {
            let params = SearchParams {
                keyword: keyword.unwrap_or_default(),
                location: location.unwrap_or_default(),
                category: category.unwrap_or_default(),
                remote,
                page: 1,
            };
            let mut search = JobSearch::new();
            search.search_from(api.as_ref(), params, page);
            if let Some(id) = save {
                search.toggle_saved(api.as_ref(), &RecordId::from(id.as_str()));
            }
            if let Some(id) = apply {
                let draft = TrackingDraft {
                    application_date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                    notes: notes.unwrap_or_default(),
                };
                search.track_and_apply(api.as_ref(), &RecordId::from(id.as_str()), &draft, &SystemOpener);
            }
            print_listings(search.jobs());
            if search.total_results() > 0 {
                println!(
                    "\nPage {} of {} ({} jobs)",
                    search.current_page(),
                    search.page_count(),
                    search.total_results()
                );
            }
            report(&mut search.notices)?;
        }

        Commands::Saved { command } => {
            let mut saved = SavedJobs::new();
            match command.unwrap_or(SavedCommands::List) {
                SavedCommands::List => {
                    if saved.load(api.as_ref()) {
                        if saved.jobs().is_empty() {
                            println!("No saved jobs.");
                        } else {
                            let listings: Vec<JobListing> = saved.jobs().iter().map(|s| s.job.clone()).collect();
                            print_listings(&listings);
                        }
                    }
                }
                SavedCommands::Remove { id } => {
                    saved.unsave(api.as_ref(), &id);
                }
            }
            report(&mut saved.notices)?;
        }

        Commands::Apps { status } => {
            let mut pipeline = Pipeline::new();
            pipeline.load(api.as_ref());
            report(&mut pipeline.notices)?;
            print_board(&pipeline, status);
        }

        Commands::Show { id } => {
            let mut pipeline = Pipeline::new();
            pipeline.load(api.as_ref());
            report(&mut pipeline.notices)?;
            let app = pipeline
                .buckets()
                .application(&id)
                .ok_or_else(|| anyhow!("Application {} not found", id))?;
            print_application(app);
        }

        Commands::Move { id, status, index } => {
            let mut pipeline = Pipeline::new();
            pipeline.load(api.as_ref());
            report(&mut pipeline.notices)?;
            let source = pipeline
                .buckets()
                .find(&id)
                .ok_or_else(|| anyhow!("Application {} not found", id))?;
            let index = index.unwrap_or_else(|| pipeline.buckets().column(status).len());
            let destination = Position::new(status, index);
            if pipeline.move_and_persist(api.as_ref(), source, destination).is_none() {
                println!("Application {} is already there.", id);
            }
            report(&mut pipeline.notices)?;
        }

        Commands::Notes { id, notes } => {
            let mut pipeline = Pipeline::new();
            pipeline.save_notes(api.as_ref(), &id, &notes);
            report(&mut pipeline.notices)?;
        }

        Commands::Interview {
            id,
            interview_type,
            at,
            location,
            notes,
        } => {
            let draft = InterviewDraft {
                interview_type: Some(interview_type),
                scheduled_date: at,
                location,
                notes,
            };
            let mut pipeline = Pipeline::new();
            pipeline.schedule_interview(api.as_ref(), &id, &draft);
            report(&mut pipeline.notices)?;
        }

        Commands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete application {}?", id))? {
                println!("Cancelled.");
                return Ok(());
            }
            let mut pipeline = Pipeline::new();
            pipeline.delete(api.as_ref(), &id);
            report(&mut pipeline.notices)?;
        }

        Commands::Analyze {
            resume,
            resume_text,
            job,
            job_text,
            tab,
        } => {
            let input = ResumeInput {
                resume_text: match resume {
                    Some(path) => resume::load_resume_file(&path)?,
                    None => resume_text.unwrap_or_default(),
                },
                job_description: match job {
                    Some(path) => std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read job description: {}", path.display()))?,
                    None => job_text.unwrap_or_default(),
                },
            };
            let analysis = resume::analyze(api.as_ref(), &input)?;
            let tabs = match tab {
                Some(tab) => vec![tab],
                None => AnalysisTab::ALL.to_vec(),
            };
            for (i, tab) in tabs.into_iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("== {} ==", tab.label());
                for line in resume::render_tab(&analysis, tab) {
                    println!("{}", line);
                }
            }
        }

        Commands::Board => board::run_board(api.clone(), &session)?,
    }

    Ok(())
}

fn show_dashboard(api: &dyn JobTrackerApi) -> Result<()> {
    let mut notices = Notices::default();
    if let Some(stats) = dashboard::load(api, &mut notices) {
        for line in dashboard::render(&stats, chrono::Local::now()) {
            println!("{}", line);
        }
    }
    report(&mut notices)
}

/// Successes go to stdout; the last error becomes the command's error.
fn report(notices: &mut Notices) -> Result<()> {
    if notices.is_empty() {
        return Ok(());
    }
    let mut failure = None;
    for notice in notices.drain() {
        if notice.is_error() {
            if let Some(previous) = failure.replace(notice.message) {
                eprintln!("error: {}", previous);
            }
        } else {
            println!("{}", notice.message);
        }
    }
    match failure {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn salary_range(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("${:.0}k-${:.0}k", min / 1000.0, max / 1000.0),
        (Some(min), None) => format!("${:.0}k+", min / 1000.0),
        (None, Some(max)) => format!("<${:.0}k", max / 1000.0),
        (None, None) => "-".to_string(),
    }
}

fn print_listings(jobs: &[JobListing]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!("{:<10} {:<5} {:<30} {:<20} {:<18} {:>12}", "ID", "SAVED", "TITLE", "COMPANY", "LOCATION", "SALARY");
    println!("{}", "-".repeat(100));
    for job in jobs {
        let mut location = truncate(&job.location, 18);
        if job.remote {
            location = truncate(&format!("{} (remote)", job.location), 18);
        }
        println!(
            "{:<10} {:<5} {:<30} {:<20} {:<18} {:>12}",
            truncate(&job.id.to_string(), 10),
            if job.is_saved { "*" } else { "" },
            truncate(&job.title, 28),
            truncate(&job.company, 18),
            location,
            salary_range(job.salary_min, job.salary_max)
        );
    }
}

fn print_board(pipeline: &Pipeline, only: Option<ApplicationStatus>) {
    if pipeline.buckets().is_empty() {
        println!("No applications tracked yet.");
        return;
    }
    for (status, apps) in pipeline.buckets().columns() {
        if only.is_some_and(|s| s != status) {
            continue;
        }
        println!("{} ({})", status.label(), apps.len());
        for (index, app) in apps.iter().enumerate() {
            println!(
                "  {:>2}. #{:<8} {:<30} {:<20} {}",
                index,
                truncate(&app.id.to_string(), 8),
                truncate(&app.title, 28),
                truncate(&app.company, 18),
                app.applied_date.as_deref().unwrap_or("")
            );
        }
        println!();
    }
}

fn print_application(app: &Application) {
    println!("Application #{}", app.id);
    println!("Title: {}", app.title);
    println!("Company: {}", app.company);
    if !app.location.is_empty() {
        println!("Location: {}", app.location);
    }
    println!("Status: {}", app.status);
    if let Some(date) = &app.applied_date {
        println!("Applied: {}", date);
    }
    if app.salary_min.is_some() || app.salary_max.is_some() {
        println!("Salary: {}", salary_range(app.salary_min, app.salary_max));
    }
    if let Some(url) = &app.application_url {
        println!("URL: {}", url);
    }
    if let Some(interview) = &app.interview {
        println!(
            "Interview: {} on {}{}",
            interview.interview_type,
            interview.scheduled_date,
            if interview.location.is_empty() {
                String::new()
            } else {
                format!(" at {}", interview.location)
            }
        );
    }
    if let Some(notes) = app.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("\n--- Notes ---\n{}", notes);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
