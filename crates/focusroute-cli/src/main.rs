use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusroute", version, about = "Plan the day's focus blocks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full daily pipeline (to-dos, mail, ranking, calendar)
    Plan(commands::plan::PlanArgs),
    /// Place explicit tasks on today's calendar
    Schedule(commands::schedule::ScheduleArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Authentication management for integrations
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Inspect recorded thread/to-do/event links
    Link {
        #[command(subcommand)]
        action: commands::link::LinkAction,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("FOCUSROUTE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Link { action } => commands::link::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_tasks() {
        let cli = Cli::try_parse_from([
            "focusroute",
            "schedule",
            "--task",
            "Write report=60",
            "--task",
            "Email=15",
            "--offline",
        ])
        .unwrap();
        match cli.command {
            Commands::Schedule(args) => {
                assert_eq!(args.tasks, vec!["Write report=60", "Email=15"]);
                assert!(args.offline);
                assert!(!args.json);
            }
            _ => panic!("expected schedule"),
        }
    }

    #[test]
    fn schedule_requires_a_task() {
        assert!(Cli::try_parse_from(["focusroute", "schedule"]).is_err());
    }

    #[test]
    fn parses_link_show_with_thread() {
        let cli = Cli::try_parse_from(["focusroute", "link", "show", "--thread", "t1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Link {
                action: commands::link::LinkAction::Show { thread: Some(_), .. }
            }
        ));
    }
}
