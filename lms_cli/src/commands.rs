use std::fmt;

/// A single invocation of the command-line client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Register { full_name: String },
    Logout,
    WhoAmI,
    Courses,
    Search(String),
    Course(String),
    Cart(String),
    AddToCart { course_id: String, cart_id: Option<String> },
    Enrollments,
    Wishlist,
    ToggleWishlist(String),
    Notifications,
    /// Instructor dashboard totals
    Dashboard,
    ResetPassword(String),
    /// Raw GET of any API path, printed as JSON
    Get(String),
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No command given.
    Missing,
    /// Command needs an argument that was not given.
    MissingArgument { command: &'static str, argument: &'static str },
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "No command given. Use --help to see available commands"),
            Self::MissingArgument { command, argument } => {
                write!(f, "'{command}' requires {argument} (e.g., '{command} <{argument}>')")
            }
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{}'. Use --help to see available commands",
                cmd
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse the free (non-flag) arguments into a [`Command`].
///
/// # Examples
///
/// ```
/// use lms_cli::commands::{Command, parse_command};
///
/// assert_eq!(parse_command(&["courses"]), Ok(Command::Courses));
/// assert_eq!(
///     parse_command(&["course", "rust-101"]),
///     Ok(Command::Course("rust-101".to_string()))
/// );
/// ```
pub fn parse_command<S: AsRef<str>>(args: &[S]) -> Result<Command, ParseError> {
    let parts: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let arg = |index: usize, command: &'static str, argument: &'static str| {
        parts
            .get(index)
            .map(|s| s.to_string())
            .ok_or(ParseError::MissingArgument { command, argument })
    };

    match parts.first() {
        None => Err(ParseError::Missing),
        Some(&"login") => Ok(Command::Login),
        Some(&"register") => Ok(Command::Register {
            full_name: parts[1..].join(" "),
        }),
        Some(&"logout") => Ok(Command::Logout),
        Some(&"whoami") => Ok(Command::WhoAmI),
        Some(&"courses") => Ok(Command::Courses),
        Some(&"search") => match parts.len() {
            1 => Err(ParseError::MissingArgument {
                command: "search",
                argument: "query",
            }),
            _ => Ok(Command::Search(parts[1..].join(" "))),
        },
        Some(&"course") => arg(1, "course", "slug").map(Command::Course),
        Some(&"cart") => arg(1, "cart", "cart_id").map(Command::Cart),
        Some(&"add-to-cart") => Ok(Command::AddToCart {
            course_id: arg(1, "add-to-cart", "course_id")?,
            cart_id: parts.get(2).map(|s| s.to_string()),
        }),
        Some(&"enrollments") => Ok(Command::Enrollments),
        Some(&"wishlist") => match parts.get(1) {
            Some(course_id) => Ok(Command::ToggleWishlist(course_id.to_string())),
            None => Ok(Command::Wishlist),
        },
        Some(&"notifications") => Ok(Command::Notifications),
        Some(&"dashboard") => Ok(Command::Dashboard),
        Some(&"reset-password") => arg(1, "reset-password", "email").map(Command::ResetPassword),
        Some(&"get") => arg(1, "get", "path").map(Command::Get),
        Some(other) => Err(ParseError::UnrecognizedCommand(other.to_string())),
    }
}
