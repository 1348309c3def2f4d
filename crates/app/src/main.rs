//! Terminal front end for the Spanish tutor.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use profe_core::model::{LevelRange, ProficiencyLevel, UserId};
use services::{
    AdvanceOutcome, AppConfig, AppServices, AuthUser, Clock, QuizError, QuizRequest, QuizSession,
    TutorSession,
};
use tracing_subscriber::EnvFilter;

/// Default number of history entries shown by `history`.
const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Practice Spanish from the terminal: placement quiz, corrector, tutor chat
/// and guided exercises.
#[derive(Parser, Debug)]
#[command(name = "profe")]
#[command(version, about, long_about = None)]
struct Args {
    /// Database URL (overrides PROFE_DB_URL)
    #[arg(long, value_name = "URL", global = true)]
    db: Option<String>,

    /// Sign in as this account; the password is read from PROFE_PASSWORD
    #[arg(long, value_name = "EMAIL", global = true)]
    email: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Take the placement quiz
    Quiz {
        /// Number of questions to generate
        #[arg(short = 'n', long, default_value_t = services::ai::flows::DEFAULT_QUESTION_COUNT)]
        questions: usize,

        /// Level range, e.g. `A1-B2` or `B1`
        #[arg(long, value_name = "RANGE")]
        range: Option<LevelRange>,
    },
    /// Correct a Spanish text (read from stdin when no text is given)
    Correct { text: Vec<String> },
    /// Chat with the tutor; `/salir` ends the conversation
    Tutor {
        /// Save every reply as audio in the current directory
        #[arg(long)]
        voice: bool,
    },
    /// List the exercise catalog
    Exercises,
    /// Work through one exercise
    Exercise { id: String },
    /// Show the signed-in profile
    Profile,
    /// Show recent quiz results
    History {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Create an account (requires --email and PROFE_PASSWORD)
    Signup {
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(db) = args.db {
        config.db_url = db;
    }
    tracing::debug!(db = %config.db_url, "configuration loaded");

    let app = AppServices::new_sqlite(&config, Clock::default())
        .await
        .context("could not open the database")?;

    if let Command::Signup { name } = &args.command {
        return signup(&app, args.email.as_deref(), name.as_deref()).await;
    }

    let user = match args.email.as_deref() {
        Some(email) => Some(sign_in(&app, email).await?),
        None => None,
    };
    let uid = user.as_ref().map(|u| &u.uid);

    match args.command {
        Command::Quiz { questions, range } => quiz(&app, uid, questions, range).await,
        Command::Correct { text } => correct(&app, &text).await,
        Command::Tutor { voice } => tutor(&app, voice).await,
        Command::Exercises => {
            exercises(&app);
            Ok(())
        }
        Command::Exercise { id } => exercise(&app, uid, &id).await,
        Command::Profile => profile(&app, require_user(uid)?).await,
        Command::History { limit } => history(&app, require_user(uid)?, limit).await,
        Command::Signup { .. } => Ok(()),
    }
}

//
// ─── ACCOUNT ───────────────────────────────────────────────────────────────────
//

fn password() -> anyhow::Result<String> {
    std::env::var("PROFE_PASSWORD").context("PROFE_PASSWORD must be set to sign in")
}

fn require_user(uid: Option<&UserId>) -> anyhow::Result<&UserId> {
    uid.context("this command needs --email to sign in")
}

async fn sign_in(app: &AppServices, email: &str) -> anyhow::Result<AuthUser> {
    let user = app.auth().sign_in(email, &password()?).await?;
    tracing::debug!(uid = %user.uid, "signed in from the command line");
    Ok(user)
}

async fn signup(app: &AppServices, email: Option<&str>, name: Option<&str>) -> anyhow::Result<()> {
    let Some(email) = email else {
        bail!("signup needs --email");
    };
    let user = app.auth().sign_up(email, &password()?, name).await?;
    println!("Cuenta creada: {}", user.email.as_deref().unwrap_or(email));
    Ok(())
}

async fn profile(app: &AppServices, uid: &UserId) -> anyhow::Result<()> {
    let profile = app.progress().profile(uid).await?;
    println!("Usuario:   {}", profile.display_name().or(profile.email()).unwrap_or(uid.as_str()));
    match profile.level() {
        Some(level) => println!("Nivel:     {level}"),
        None => println!("Nivel:     sin evaluar (haz `profe quiz`)"),
    }
    println!("Ejercicios completados: {}", profile.completed_exercises().len());
    Ok(())
}

async fn history(app: &AppServices, uid: &UserId, limit: u32) -> anyhow::Result<()> {
    let entries = app.progress().quiz_history(uid, limit).await?;
    if entries.is_empty() {
        println!("Todavía no hay resultados.");
    }
    for entry in entries {
        println!(
            "{}  {}  {}",
            entry.completed_at.format("%Y-%m-%d %H:%M"),
            entry.level,
            entry.reasoning
        );
    }
    Ok(())
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

async fn quiz(
    app: &AppServices,
    uid: Option<&UserId>,
    questions: usize,
    range: Option<LevelRange>,
) -> anyhow::Result<()> {
    let mut request = QuizRequest::default().with_question_count(questions);
    if let Some(range) = range {
        request.range = range;
    }
    let quiz = app
        .quiz()
        .as_ref()
        .clone()
        .with_request(request)
        .with_shuffle_options(true);

    println!("Generando preguntas...");
    let mut session = QuizSession::new();
    quiz.load_questions(&mut session).await?;

    loop {
        let Some(question) = session.current_question().cloned() else {
            break;
        };
        let progress = session.progress();
        println!();
        println!("[{}/{}] {}", progress.answered + 1, progress.total, question.question());
        for (index, option) in question.options().iter().enumerate() {
            println!("  {}. {option}", index + 1);
        }

        let answer = loop {
            let Some(line) = read_line("> ")? else {
                return Ok(());
            };
            let selected = match line.parse::<usize>() {
                Ok(n) if (1..=question.options().len()).contains(&n) => {
                    question.options()[n - 1].clone()
                }
                _ => line,
            };
            match quiz.answer(&mut session, &selected) {
                Ok(answer) => break answer,
                Err(e) => println!("{e}"),
            }
        };

        if answer.is_correct() {
            println!("¡Correcto! {}", answer.feedback());
        } else {
            println!("Incorrecto. La respuesta era: {}", answer.correct_answer());
        }

        match quiz.advance(&mut session, uid).await {
            Ok(AdvanceOutcome::NextQuestion) => {}
            Ok(AdvanceOutcome::Finished(result)) => {
                print_result(result.level(), result.reasoning());
                return Ok(());
            }
            Err(QuizError::Generation(e)) => return retry_analysis(&quiz, &mut session, uid, e).await,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn retry_analysis(
    quiz: &services::QuizService,
    session: &mut QuizSession,
    uid: Option<&UserId>,
    mut error: services::GenerationError,
) -> anyhow::Result<()> {
    loop {
        println!("No se pudo analizar el resultado: {error}");
        let again = read_line("¿Reintentar? [s/N] ")?
            .is_some_and(|line| line.eq_ignore_ascii_case("s"));
        if !again {
            return Ok(());
        }
        match quiz.retry_analysis(session, uid).await {
            Ok(result) => {
                print_result(result.level(), result.reasoning());
                return Ok(());
            }
            Err(QuizError::Generation(e)) => error = e,
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_result(level: ProficiencyLevel, reasoning: &str) {
    println!();
    println!("Tu nivel: {level}");
    println!("{reasoning}");
}

//
// ─── CORRECTOR AND TUTOR ───────────────────────────────────────────────────────
//

async fn correct(app: &AppServices, words: &[String]) -> anyhow::Result<()> {
    let text = if words.is_empty() {
        let mut buf = String::new();
        for line in io::stdin().lock().lines() {
            buf.push_str(&line?);
            buf.push('\n');
        }
        buf
    } else {
        words.join(" ")
    };

    let correction = app.flows().correct_text(&text).await?;
    println!("{}", correction.corrected_text);
    println!();
    println!("{}", correction.feedback);
    Ok(())
}

async fn tutor(app: &AppServices, voice: bool) -> anyhow::Result<()> {
    let level = app
        .auth()
        .profile()
        .map_or_else(ProficiencyLevel::lowest, |p| p.level_or_default());
    let tutor = app.tutor();
    let mut session = TutorSession::new(level);
    println!("Nivel {level}. Escribe tu mensaje (/salir para terminar).");

    let mut saved = 0usize;
    while let Some(line) = read_line("tú> ")? {
        if line == "/salir" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let reply = match tutor.send(&mut session, &line).await {
            Ok(reply) => reply,
            Err(e) => {
                println!("({e})");
                continue;
            }
        };
        println!("profe> {}", reply.text());

        if voice {
            match tutor.speak(&mut session, reply.id()).await {
                Ok(audio) => {
                    if let Some(payload) = session.audio(audio) {
                        saved += 1;
                        let path = PathBuf::from(format!("profe-{saved:03}.mp3"));
                        std::fs::write(&path, &payload.data)
                            .with_context(|| format!("could not write {}", path.display()))?;
                        println!("(audio: {})", path.display());
                    }
                }
                Err(e) => println!("(sin audio: {e})"),
            }
        }
    }
    Ok(())
}

//
// ─── EXERCISES ─────────────────────────────────────────────────────────────────
//

fn exercises(app: &AppServices) {
    let profile = app.auth().profile();
    for status in app.exercises().catalog_view(profile.as_ref()) {
        let mark = if status.completed {
            "✓"
        } else if status.locked {
            "·"
        } else {
            " "
        };
        println!(
            "{mark} {:<22} {}  {}",
            status.exercise.id, status.exercise.level, status.exercise.title
        );
    }
}

async fn exercise(app: &AppServices, uid: Option<&UserId>, id: &str) -> anyhow::Result<()> {
    let service = app.exercises();
    // Refuse locked exercises before any scenario is shown.
    let exercise = match uid {
        Some(uid) => service.open(uid, id).await?,
        None => service.find(id)?,
    };
    let profile = app.auth().profile();
    let level = profile
        .as_ref()
        .map_or_else(ProficiencyLevel::lowest, |p| p.level_or_default());

    println!("{} ({})", exercise.title, exercise.level);
    println!("{}", exercise.description);

    for scenario in exercise.scenarios {
        println!();
        println!("== {} ==", scenario.title);
        println!("{}", scenario.situation);
        println!("{}", scenario.question);
        let Some(response) = read_line("> ")? else {
            return Ok(());
        };
        let check = service.check_response(scenario, &response, level).await?;
        println!("{}", check.feedback);
        if let Some(corrected) = check.corrected {
            println!("Versión corregida: {corrected}");
        }
    }

    match uid {
        Some(uid) => {
            if service.complete(uid, id).await? {
                println!("Ejercicio completado.");
            } else {
                println!("Ya habías completado este ejercicio.");
            }
        }
        None => println!("Inicia sesión con --email para guardar tu progreso."),
    }
    Ok(())
}

//
// ─── TERMINAL ──────────────────────────────────────────────────────────────────
//

/// Print `prompt` and read one trimmed line. `None` on end of input.
fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}
