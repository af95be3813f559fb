//! Command-line client for the LMS backend.
//!
//! Logs in, browses the catalog and manages cart, enrollments and wishlist.
//! The session is kept in a file so that consecutive invocations share it.

use anyhow::{Context, Result, anyhow};
use lms_cli::{
    commands::{Command, parse_command},
    logging,
};
use lms_client::{ApiClient, ClientConfig, ClientResult, RegisterRequest, SessionManager};
use pico_args::Arguments;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const HELP: &str = "\
Talk to the LMS backend API

USAGE:
  lms_cli [OPTIONS] COMMAND [ARGS]

COMMANDS:
  login                         Obtain and store a session
  register FULL NAME            Create an account, then log in
  logout                        Forget the stored session
  whoami                        Show the logged-in user
  courses                       List courses
  search QUERY                  Search courses
  course SLUG                   Show one course
  cart CART_ID                  Show a cart
  add-to-cart COURSE [CART_ID]  Add a course to a cart
  enrollments                   List your enrollments
  wishlist [COURSE_ID]          Show the wishlist, or toggle a course on it
  notifications                 List your notifications
  dashboard                     Show instructor dashboard totals
  reset-password EMAIL          Request a password reset email
  get PATH                      GET any API path and print the JSON

OPTIONS:
  --api URL             API base URL  [default: $LMS_API_BASE_URL or http://127.0.0.1:8000/api/v1/]
  --session FILE        Session file  [default: $LMS_SESSION_FILE or ~/.lms_session.json]
  --email EMAIL         Email for login/register
  --password PASS       Password for login/register

FLAGS:
  -v, --verbose         Log every credential decision
  -h, --help            Print help information
";

struct Args {
    api_url: Option<String>,
    session_file: Option<PathBuf>,
    email: Option<String>,
    password: Option<String>,
    verbose: bool,
    command: Vec<OsString>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        api_url: pargs.opt_value_from_str("--api")?,
        session_file: pargs.opt_value_from_str("--session")?,
        email: pargs.opt_value_from_str("--email")?,
        password: pargs.opt_value_from_str("--password")?,
        verbose: pargs.contains(["-v", "--verbose"]),
        command: pargs.finish(),
    };

    logging::init(args.verbose);
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let words: Vec<String> = args
        .command
        .iter()
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    let command = parse_command(&words)?;

    let session_file = args
        .session_file
        .or_else(|| std::env::var("LMS_SESSION_FILE").ok().map(PathBuf::from))
        .or_else(default_session_file);
    let config = ClientConfig::from_env(args.api_url, session_file)
        .context("Invalid client configuration")?;
    let session = Arc::new(SessionManager::from_config(&config));
    let client = ApiClient::new(config, session).context("Failed to create API client")?;

    let started = Instant::now();
    let result = execute(&client, command, args.email, args.password).await;
    logging::log_api_call(
        words.first().map(String::as_str).unwrap_or_default(),
        started.elapsed().as_millis() as u64,
        result.is_ok(),
    );
    result
}

async fn execute(
    client: &ApiClient,
    command: Command,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    match command {
        Command::Login => {
            let email = prompt_if_missing(email, "Email")?;
            let password = prompt_if_missing(password, "Password")?;
            let user = client
                .login(&email, &password)
                .await
                .context("Login failed")?;
            println!(
                "Logged in as {}",
                user.username.or(user.email).unwrap_or(email)
            );
        }
        Command::Register { full_name } => {
            let full_name = prompt_if_missing(Some(full_name).filter(|n| !n.is_empty()), "Full name")?;
            let email = prompt_if_missing(email, "Email")?;
            let password = prompt_if_missing(password, "Password")?;
            let password2 = prompt_if_missing(None, "Repeat password")?;
            let user = client
                .register(RegisterRequest {
                    full_name,
                    email,
                    password,
                    password2,
                })
                .await
                .context("Registration failed")?;
            println!(
                "Registered and logged in as {}",
                user.username.unwrap_or_default()
            );
        }
        Command::Logout => {
            client.logout().context("Failed to clear session")?;
            println!("Logged out");
        }
        Command::WhoAmI => match client.current_user() {
            Some(user) => println!(
                "{} <{}> (id {})",
                user.full_name.unwrap_or_default(),
                user.email.unwrap_or_default(),
                user.user_id.map(|id| id.to_string()).unwrap_or_default()
            ),
            None => println!("Not logged in"),
        },
        Command::Courses => print_json(resource(client.courses().await)?)?,
        Command::Search(query) => print_json(resource(client.search_courses(&query).await)?)?,
        Command::Course(slug) => print_json(resource(client.course(&slug).await)?)?,
        Command::Cart(cart_id) => print_json(resource(client.cart(&cart_id).await)?)?,
        Command::AddToCart { course_id, cart_id } => print_json(resource(
            client.add_to_cart(&course_id, cart_id.as_deref()).await,
        )?)?,
        Command::Enrollments => print_json(resource(client.enrollments().await)?)?,
        Command::Wishlist => print_json(resource(client.wishlist().await)?)?,
        Command::ToggleWishlist(course_id) => {
            print_json(resource(client.toggle_wishlist(&course_id).await)?)?
        }
        Command::Notifications => print_json(resource(client.notifications().await)?)?,
        Command::Dashboard => print_json(resource(client.instructor_dashboard().await)?)?,
        Command::ResetPassword(email) => {
            client
                .request_password_reset(&email)
                .await
                .context("Password reset request failed")?;
            println!("Password reset email sent to {email}");
        }
        Command::Get(path) => print_json(resource(client.get_json(&path).await)?)?,
    }
    Ok(())
}

/// A 401 on a resource means the stored session is no longer usable
fn resource<T>(result: ClientResult<T>) -> Result<T> {
    result.map_err(|e| {
        if e.is_unauthorized() {
            anyhow!("Session expired, run 'lms_cli login' again")
        } else {
            e.into()
        }
    })
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".lms_session.json"))
}

fn prompt_if_missing(value: Option<String>, label: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    print!("{label}: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn print_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
