mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{close::CloseAction, EXIT_FAILURE, EXIT_REGISTRY_ERROR, EXIT_VALIDATION_ERROR};
use rollbook_core::Engine;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rollbook",
    version,
    about = "Student enrollment lifecycle and session locking registry"
)]
struct Cli {
    /// Path to the Rollbook registry directory.
    #[arg(long, default_value = "~/.local/share/rollbook")]
    registry: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new academic session.
    SessionNew {
        /// Unique session name, e.g. "2024-25".
        name: String,
        /// First day of the session (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the session (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
        /// Make this the active session immediately.
        #[arg(long, default_value_t = false)]
        activate: bool,
    },
    /// List all sessions.
    Sessions,
    /// Make a session the single active one.
    Activate {
        /// Session name or id.
        session: String,
    },
    /// Permanently lock a session, freezing its enrollments.
    Lock {
        /// Session name or id.
        session: String,
    },
    /// Enroll a student into a session/class/section.
    Enroll {
        /// Student id.
        student: String,
        /// Session name or id.
        #[arg(long)]
        session: String,
        /// Class id.
        #[arg(long)]
        class: String,
        /// Section id.
        #[arg(long)]
        section: String,
        /// Roll number within the class/section.
        #[arg(long)]
        roll: String,
    },
    /// Promote one enrollment into a destination session.
    Promote {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
        /// Destination session name or id.
        #[arg(long)]
        session: String,
        /// Destination class id.
        #[arg(long)]
        class: String,
        /// Destination section id.
        #[arg(long)]
        section: String,
        /// Roll number in the destination; auto-assigned if omitted.
        #[arg(long)]
        roll: Option<String>,
    },
    /// Promote a whole batch from a TOML roster, all-or-nothing.
    BulkPromote {
        /// Path to the roster file.
        roster: PathBuf,
    },
    /// Retain an enrollment: repeat the class/section in a new session.
    Retain {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
        /// Destination session name or id.
        #[arg(long)]
        session: String,
        /// Roll number in the destination; next available if omitted.
        #[arg(long)]
        roll: Option<String>,
    },
    /// Close an enrollment as transferred to another school.
    Transfer {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
        /// Free-text remarks recorded on the closed row.
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Close an enrollment as graduated.
    Graduate {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
        /// Free-text remarks recorded on the closed row.
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Close an enrollment as dropped out.
    Drop {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
        /// Free-text remarks recorded on the closed row.
        #[arg(long)]
        remarks: Option<String>,
    },
    /// List enrollments, optionally filtered.
    List {
        /// Filter by session name or id.
        #[arg(long)]
        session: Option<String>,
        /// Filter by class id.
        #[arg(long)]
        class: Option<String>,
        /// Filter by section id.
        #[arg(long)]
        section: Option<String>,
        /// Filter by status (active, promoted, retained, transferred, graduated, dropped).
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a student's full enrollment history.
    History {
        /// Student id.
        student: String,
    },
    /// Inspect one enrollment record.
    Inspect {
        /// Enrollment id (full, short, or unique prefix).
        enrollment: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ROLLBOOK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let registry_path = expand_tilde(&cli.registry);
    let engine = match Engine::open(&registry_path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: failed to open registry: {e}");
            return ExitCode::from(EXIT_REGISTRY_ERROR);
        }
    };
    let json = cli.json;

    let result = match cli.command {
        Commands::SessionNew {
            name,
            start,
            end,
            activate,
        } => commands::session_new::run(&engine, &name, start, end, activate, json),
        Commands::Sessions => commands::sessions::run(&engine, json),
        Commands::Activate { session } => commands::activate::run(&engine, &session, json),
        Commands::Lock { session } => commands::lock::run(&engine, &session, json),
        Commands::Enroll {
            student,
            session,
            class,
            section,
            roll,
        } => commands::enroll::run(&engine, &student, &session, &class, &section, &roll, json),
        Commands::Promote {
            enrollment,
            session,
            class,
            section,
            roll,
        } => commands::promote::run(
            &engine,
            &enrollment,
            &session,
            &class,
            &section,
            roll.as_deref(),
            json,
        ),
        Commands::BulkPromote { roster } => commands::bulk_promote::run(&engine, &roster, json),
        Commands::Retain {
            enrollment,
            session,
            roll,
        } => commands::retain::run(&engine, &enrollment, &session, roll.as_deref(), json),
        Commands::Transfer {
            enrollment,
            remarks,
        } => commands::close::run(
            &engine,
            &enrollment,
            remarks.as_deref(),
            CloseAction::Transfer,
            json,
        ),
        Commands::Graduate {
            enrollment,
            remarks,
        } => commands::close::run(
            &engine,
            &enrollment,
            remarks.as_deref(),
            CloseAction::Graduate,
            json,
        ),
        Commands::Drop {
            enrollment,
            remarks,
        } => commands::close::run(
            &engine,
            &enrollment,
            remarks.as_deref(),
            CloseAction::Drop,
            json,
        ),
        Commands::List {
            session,
            class,
            section,
            status,
        } => commands::list::run(
            &engine,
            session.as_deref(),
            class.as_deref(),
            section.as_deref(),
            status.as_deref(),
            json,
        ),
        Commands::History { student } => commands::history::run(&engine, &student, json),
        Commands::Inspect { enrollment } => commands::inspect::run(&engine, &enrollment, json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("validation error:")
                || msg.starts_with("failed to parse roster")
                || msg.starts_with("failed to read roster")
                || msg.starts_with("unsupported roster_version")
                || msg.starts_with("roster contains no promotions")
            {
                EXIT_VALIDATION_ERROR
            } else if msg.starts_with("registry I/O error:")
                || msg.starts_with("registry format version mismatch")
                || msg.starts_with("integrity check failed")
                || msg.starts_with("lock acquisition failed")
            {
                EXIT_REGISTRY_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
