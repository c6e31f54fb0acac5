use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use thesisai_client::client::ApiClient;
use thesisai_client::config::{self, StoredSession};
use thesisai_client::display::{SessionState, TerminalSink};
use thesisai_client::render::MarkdownRenderer;
use thesisai_client::session::FeedbackSession;
use thesisai_client::types::{FeedbackRequest, Role};

#[derive(Parser)]
#[command(name = "thesisai", about = "Client for the ThesisAI review platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session token
    Login {
        username: String,
        #[arg(long)]
        password: Option<String>,
        /// API base URL to use and remember
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Show the currently logged-in user
    Whoami,
    /// Register a new account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "student")]
        role: String,
        #[arg(long)]
        supervisor_id: Option<String>,
    },
    /// Upload a thesis file
    Upload { file: PathBuf },
    /// List theses
    Theses {
        /// all (admin) or to-review (supervisor); defaults to own theses
        #[arg(long)]
        scope: Option<String>,
    },
    /// Download a thesis file
    Download {
        thesis_id: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete a thesis
    Delete { thesis_id: String },
    /// Print the extracted text of a thesis
    ExtractText { thesis_id: String },
    /// Stream AI feedback for a thesis
    Feedback {
        thesis_id: String,
        #[arg(long, default_value = "")]
        instructions: String,
        /// Predefined question, repeatable
        #[arg(long = "question")]
        questions: Vec<String>,
        #[arg(long, default_value = "")]
        options: String,
        /// Write the rendered HTML document to this file on completion
        #[arg(long)]
        html_out: Option<PathBuf>,
        /// Do not save the generated feedback on the server
        #[arg(long)]
        no_save: bool,
    },
    /// Save previously generated feedback text for a thesis
    SaveFeedback {
        thesis_id: String,
        #[arg(long)]
        content: String,
    },
    /// List available AI feedback options
    FeedbackOptions,
    /// List users (admin)
    Users,
    /// Show one user (admin)
    User { username: String },
    /// Update a user (admin)
    EditUser {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        supervisor: Option<String>,
    },
    /// Delete a user (admin)
    DeleteUser { username: String },
    /// List supervisors
    Supervisors,
    /// Assign a supervisor to a student (admin)
    Assign {
        student: String,
        supervisor: String,
    },
    /// Show supervisor-student assignments (supervisor)
    Assignments,
    /// Submit supervisor feedback for a thesis
    Review {
        thesis_id: String,
        #[arg(long)]
        content: String,
    },
    /// List submitted supervisor feedback
    Reviews {
        /// Limit to one thesis
        #[arg(long)]
        thesis_id: Option<String>,
    },
}

fn parse_role(role: &str) -> Result<Role> {
    match role {
        "student" => Ok(Role::Student),
        "supervisor" => Ok(Role::Supervisor),
        "admin" => Ok(Role::Admin),
        other => bail!("invalid role '{other}', expected student, supervisor or admin"),
    }
}

fn client_from(session: &StoredSession) -> ApiClient {
    let mut client = ApiClient::new(session.api_url());
    if let Some(token) = &session.access_token {
        client.set_token(token.clone());
    }
    client
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut session = config::load_session()?;

    match cli.command {
        Command::Login {
            username,
            password,
            api_url,
        } => {
            if let Some(url) = api_url {
                session.api_url = Some(url);
            }
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password: ")?,
            };
            let client = ApiClient::new(session.api_url());
            let login = client.login(&username, &password).await?;
            println!(
                "Logged in as {} ({})",
                login.user.username, login.user.role
            );
            session.access_token = Some(login.access_token);
            session.user = Some(login.user);
            config::store_session(&session)?;
        }
        Command::Whoami => {
            let client = client_from(&session);
            let user = client.me().await?;
            println!("{} <{}> {} ({})", user.full_name, user.email, user.username, user.role);
        }
        Command::Register {
            username,
            email,
            full_name,
            password,
            role,
            supervisor_id,
        } => {
            let client = ApiClient::new(session.api_url());
            client
                .register(
                    &username,
                    &email,
                    &full_name,
                    &password,
                    parse_role(&role)?,
                    supervisor_id.as_deref(),
                )
                .await?;
            println!("Registered {username}");
        }
        Command::Upload { file } => {
            let client = client_from(&session);
            let ack = client.upload_thesis(&file).await?;
            println!("{} (thesis id: {})", ack.message, ack.thesis_id);
        }
        Command::Theses { scope } => {
            let client = client_from(&session);
            let theses = match scope.as_deref() {
                None => client.my_theses().await?,
                Some("all") => client.all_theses().await?,
                Some("to-review") => client.theses_to_review().await?,
                Some(other) => bail!("unknown scope '{other}', expected all or to-review"),
            };
            for thesis in theses {
                println!(
                    "{}  {:?}  {}  {}",
                    thesis.id,
                    thesis.status,
                    thesis.filename,
                    thesis.student_name.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Download { thesis_id, out } => {
            let client = client_from(&session);
            let data = client.download_thesis(&thesis_id).await?;
            tokio::fs::write(&out, data)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("Saved to {}", out.display());
        }
        Command::Delete { thesis_id } => {
            let client = client_from(&session);
            client.delete_thesis(&thesis_id).await?;
            println!("Deleted {thesis_id}");
        }
        Command::ExtractText { thesis_id } => {
            let client = client_from(&session);
            println!("{}", client.extract_text(&thesis_id).await?);
        }
        Command::Feedback {
            thesis_id,
            instructions,
            questions,
            options,
            html_out,
            no_save,
        } => {
            run_feedback(
                &client_from(&session),
                FeedbackRequest {
                    thesis_id,
                    custom_instructions: instructions,
                    predefined_questions: questions,
                    selected_options: options,
                },
                html_out,
                no_save,
            )
            .await?;
        }
        Command::SaveFeedback { thesis_id, content } => {
            let client = client_from(&session);
            let ack = client.save_feedback(&thesis_id, &content).await?;
            println!("{} (feedback id: {})", ack.message, ack.feedback_id);
        }
        Command::FeedbackOptions => {
            let client = client_from(&session);
            for option in client.feedback_options().await? {
                let marker = if option.default { "*" } else { " " };
                println!("{marker} {}  {}: {}", option.id, option.label, option.description);
            }
        }
        Command::Users => {
            let client = client_from(&session);
            for user in client.users().await? {
                println!("{}  {}  {}  {}", user.username, user.role, user.full_name, user.email);
            }
        }
        Command::User { username } => {
            let client = client_from(&session);
            let user = client.user(&username).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::EditUser {
            username,
            email,
            full_name,
            role,
            supervisor,
        } => {
            let client = client_from(&session);
            client
                .update_user(
                    &username,
                    &email,
                    &full_name,
                    parse_role(&role)?,
                    supervisor.as_deref(),
                )
                .await?;
            println!("Updated {username}");
        }
        Command::DeleteUser { username } => {
            let client = client_from(&session);
            client.delete_user(&username).await?;
            println!("Deleted {username}");
        }
        Command::Supervisors => {
            let client = client_from(&session);
            for user in client.supervisors().await? {
                println!("{}  {}", user.username, user.full_name);
            }
        }
        Command::Assign {
            student,
            supervisor,
        } => {
            let client = client_from(&session);
            let ack = client.assign_supervisor(&student, &supervisor).await?;
            println!("{}", ack.message);
        }
        Command::Assignments => {
            let client = client_from(&session);
            for assignment in client.supervisor_assignments().await? {
                println!(
                    "{} -> {} ({} theses)",
                    assignment.supervisor_name,
                    assignment.student_name,
                    assignment.theses.len()
                );
            }
        }
        Command::Review {
            thesis_id,
            content,
        } => {
            let client = client_from(&session);
            let ack = client
                .submit_supervisor_feedback(&thesis_id, &content)
                .await?;
            println!("{}", ack.message);
        }
        Command::Reviews { thesis_id } => {
            let client = client_from(&session);
            match thesis_id {
                Some(thesis_id) => {
                    let feedback = client.supervisor_feedback_for(&thesis_id).await?;
                    println!("{}", feedback.content);
                }
                None => {
                    for feedback in client.supervisor_feedback().await? {
                        println!(
                            "{}  {}  {}",
                            feedback.thesis_id,
                            feedback.created_at,
                            feedback.content.lines().next().unwrap_or("")
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Drive one streaming feedback session in the terminal. Ctrl-C
/// cancels the stream; that is a normal exit, not an error.
async fn run_feedback(
    client: &ApiClient,
    request: FeedbackRequest,
    html_out: Option<PathBuf>,
    no_save: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let sink = TerminalSink;
    let mut session = FeedbackSession::new();
    if no_save {
        session = session.without_persistence();
    }
    let outcome = session.run(client, &request, &sink, &cancel).await?;
    println!();

    match outcome {
        SessionState::Stopped => eprintln!("[stopped]"),
        SessionState::Completed => {
            if let Some(path) = html_out {
                let html = MarkdownRenderer::new().render(session.accumulated_text());
                tokio::fs::write(&path, html)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                eprintln!("[rendered HTML written to {}]", path.display());
            }
        }
        other => eprintln!("[{other}]"),
    }
    Ok(())
}

/// Plain stdin prompt; input is echoed
fn prompt_password(prompt: &str) -> Result<String> {
    use std::io::Write;
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
