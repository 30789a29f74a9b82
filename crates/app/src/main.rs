use std::fmt;
use std::time::Duration;

use hunt_core::catalog;
use hunt_core::model::{LocationId, NewUser};
use services::{AppServices, Clock, GameSettings, RunOutcome, SessionEvent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidLocation { raw: String },
    InvalidStepDelay { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidLocation { raw } => write!(f, "unknown location: {raw}"),
            ArgsError::InvalidStepDelay { raw } => {
                write!(f, "invalid --step-delay-ms value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [flags] status");
    eprintln!("  cargo run -p app -- [flags] locations");
    eprintln!("  cargo run -p app -- [flags] play <location>");
    eprintln!("  cargo run -p app -- [flags] reset <location>");
    eprintln!("  cargo run -p app -- [flags] leaderboard");
    eprintln!("  cargo run -p app -- [flags] register <username> <password> <nickname>");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --db <sqlite_url>        default sqlite://hunt.sqlite3");
    eprintln!("  --step-delay-ms <n>      default 2000");
    eprintln!("  --repair                 repair the saved game on load");
    eprintln!("  --user <name> --password <pw>");
    eprintln!();
    eprintln!("Locations: library, decoding, puzzle, temple, forest, cave");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  HUNT_DB_URL, HUNT_STEP_DELAY_MS, HUNT_REPAIR_ON_LOAD=1, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Locations,
    Play(LocationId),
    Reset(LocationId),
    Leaderboard,
    Register {
        username: String,
        password: String,
        nickname: String,
    },
}

impl Command {
    fn parse(name: &str, positional: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut take = |command: &'static str, name: &'static str| {
            positional
                .next()
                .ok_or(ArgsError::MissingArgument { command, name })
        };
        let location = |raw: String| {
            raw.parse::<LocationId>()
                .map_err(|_| ArgsError::InvalidLocation { raw })
        };

        let command = match name {
            "status" => Self::Status,
            "locations" => Self::Locations,
            "play" => Self::Play(location(take("play", "location")?)?),
            "reset" => Self::Reset(location(take("reset", "location")?)?),
            "leaderboard" => Self::Leaderboard,
            "register" => Self::Register {
                username: take("register", "username")?,
                password: take("register", "password")?,
                nickname: take("register", "nickname")?,
            },
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

struct Args {
    db_url: String,
    step_delay: Duration,
    repair_on_load: bool,
    credentials: Option<(String, String)>,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("HUNT_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://hunt.sqlite3".into(), normalize_sqlite_url);
        let mut step_delay = match std::env::var("HUNT_STEP_DELAY_MS") {
            Ok(raw) => parse_step_delay(raw)?,
            Err(_) => services::DEFAULT_STEP_DELAY,
        };
        let mut repair_on_load = std::env::var("HUNT_REPAIR_ON_LOAD").is_ok_and(|v| v == "1");
        let mut user = None;
        let mut password = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--step-delay-ms" => {
                    step_delay = parse_step_delay(require_value(args, "--step-delay-ms")?)?;
                }
                "--repair" => repair_on_load = true,
                "--user" => user = Some(require_value(args, "--user")?),
                "--password" => password = Some(require_value(args, "--password")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some((user, password)),
            (Some(_), None) => return Err(ArgsError::MissingValue { flag: "--password" }),
            (None, Some(_)) => return Err(ArgsError::MissingValue { flag: "--user" }),
            (None, None) => None,
        };

        let mut positional = positional.into_iter();
        let command = match positional.next() {
            Some(name) => Command::parse(&name, &mut positional)?,
            None => Command::Status,
        };

        Ok(Self {
            db_url,
            step_delay,
            repair_on_load,
            credentials,
            command,
        })
    }

    fn settings(&self) -> GameSettings {
        GameSettings::default()
            .with_step_delay(self.step_delay)
            .with_repair_on_load(self.repair_on_load)
    }
}

fn parse_step_delay(raw: String) -> Result<Duration, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ArgsError::InvalidStepDelay { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn print_status(app: &AppServices) {
    let state = app.progress().snapshot().await;
    println!("total progress: {}%", state.total_progress());
    match state.last_played() {
        Some(at) => println!("last played:    {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last played:    never"),
    }
    if let Some(user) = app.player().current_user().await {
        println!("signed in as:   {} ({})", user.nickname(), user.username());
    }
    for location in LocationId::ALL {
        let record = state.location(location);
        let marker = if record.completed {
            "done"
        } else if state.is_unlocked(location) {
            "open"
        } else {
            "locked"
        };
        println!(
            "  {:<9} {:>3}%  {marker}",
            location.key(),
            record.progress
        );
    }
}

async fn print_locations(app: &AppServices) {
    let state = app.progress().snapshot().await;
    for info in catalog::all_locations() {
        let lock = if state.is_unlocked(info.id) { " " } else { "x" };
        println!("[{lock}] {} {:<9} {}", info.icon, info.id.key(), info.name);
        println!("      {}", info.description);
    }
}

async fn play(app: &AppServices, location: LocationId) -> Result<(), Box<dyn std::error::Error>> {
    if !app.progress().is_unlocked(location).await {
        let needed = location.prerequisite().map_or("", LocationId::key);
        println!("{location} is locked; complete {needed} first");
        return Ok(());
    }

    let session = app.open_location(location);
    println!("{}: {} steps", session.name(), session.step_count());

    let mut events = session.subscribe();
    let steps = session.steps();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::StepCompleted { step, .. } => {
                    if let Some(def) = steps.get(step - 1) {
                        println!("  {} step {step}: {}", def.icon, def.title);
                        println!("     {}", def.description);
                    }
                }
                SessionEvent::Finished { location } => {
                    println!("{location} completed");
                }
            }
        }
    });

    let mut run = tokio::spawn({
        let session = session.clone();
        async move { session.start().await }
    });
    let outcome = tokio::select! {
        joined = &mut run => joined?.outcome,
        _ = tokio::signal::ctrl_c() => {
            info!(%location, "interrupted, closing session");
            session.close();
            run.await?.outcome
        }
    };
    drop(session);
    if let Err(err) = printer.await {
        warn!(error = %err, "event printer stopped");
    }

    match outcome {
        RunOutcome::Finished => {
            let state = app.progress().snapshot().await;
            println!("total progress: {}%", state.total_progress());
            if let Some(next) = location.successor().filter(|id| state.is_unlocked(*id)) {
                println!("unlocked: {next}");
            }
        }
        RunOutcome::Cancelled | RunOutcome::Ignored => {
            println!("{}", unfinished_message(location, outcome));
        }
    }
    Ok(())
}

fn unfinished_message(location: LocationId, outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Cancelled => format!("{location} abandoned"),
        _ => format!("{location}: nothing to play"),
    }
}

async fn print_leaderboard(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let current = app.player().current_user().await.map(|u| u.id());
    for (rank, user) in app.users().leaderboard().await?.iter().enumerate() {
        let marker = if Some(user.id()) == current { "*" } else { " " };
        println!(
            "{marker}{:>2}. {:<20} {:>3}%  since {}",
            rank + 1,
            user.nickname(),
            user.progress(),
            user.registered_at().format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.settings())
        .await?;

    if let Some((user, password)) = &parsed.credentials {
        if app.login(user, password).await?.is_none() {
            return Err(format!("invalid credentials for {user}").into());
        }
    }

    match parsed.command {
        Command::Status => print_status(&app).await,
        Command::Locations => print_locations(&app).await,
        Command::Play(location) => play(&app, location).await?,
        Command::Reset(location) => {
            app.open_location(location).reset().await;
            println!("{location} reset");
            print_status(&app).await;
        }
        Command::Leaderboard => print_leaderboard(&app).await?,
        Command::Register {
            username,
            password,
            nickname,
        } => {
            let user = app
                .register(NewUser::new(username, password, nickname))
                .await?;
            println!("registered {} as #{}", user.username(), user.id());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
