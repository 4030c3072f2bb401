use clap::Subcommand;
use focusroute_core::integrations::{GoogleClient, NotionTodos};

use super::load_config;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Google Calendar and Gmail
    Google {
        #[command(subcommand)]
        action: GoogleOp,
    },
    /// Notion to-do page
    Notion {
        #[command(subcommand)]
        action: NotionOp,
    },
}

#[derive(Subcommand)]
pub enum GoogleOp {
    /// Store the OAuth client id and secret
    Credentials {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
    },
    /// Run the browser authorization flow
    Login,
    /// Remove stored tokens
    Logout,
    /// Check authentication status
    Status,
}

#[derive(Subcommand)]
pub enum NotionOp {
    /// Store the integration token
    SetToken {
        token: String,
        /// Skip the users/me check
        #[arg(long)]
        no_verify: bool,
    },
    /// Remove the stored token
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Google { action } => handle_google(action),
        AuthAction::Notion { action } => handle_notion(action),
    }
}

fn status(authenticated: bool) -> &'static str {
    if authenticated {
        "authenticated"
    } else {
        "not authenticated"
    }
}

fn handle_google(op: GoogleOp) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        GoogleOp::Credentials {
            client_id,
            client_secret,
        } => {
            GoogleClient::set_credentials(&client_id, &client_secret)?;
            println!("Google credentials stored");
        }
        GoogleOp::Login => {
            GoogleClient::authorize()?;
            println!("Google authenticated");
        }
        GoogleOp::Logout => {
            GoogleClient::disconnect()?;
            println!("Google disconnected");
        }
        GoogleOp::Status => println!("{}", status(GoogleClient::is_authenticated())),
    }
    Ok(())
}

fn handle_notion(op: NotionOp) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        NotionOp::SetToken { token, no_verify } => {
            if !no_verify {
                let config = load_config()?;
                NotionTodos::with_token(&config.notion, token.as_str())?.verify()?;
            }
            NotionTodos::set_token(&token)?;
            println!("Notion authenticated");
        }
        NotionOp::Logout => {
            NotionTodos::clear_token()?;
            println!("Notion disconnected");
        }
        NotionOp::Status => println!("{}", status(NotionTodos::stored_token().is_some())),
    }
    Ok(())
}
