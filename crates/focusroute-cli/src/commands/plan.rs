use clap::Args;
use focusroute_core::integrations::{
    GoogleClient, MockCalendar, MockGenerator, MockInbox, MockTodos, NotionTodos, OllamaClient,
};
use focusroute_core::{DailyRouter, LinkageStore, PlanSummary, RunError};

use super::{load_config, parse_now, print_placed};

#[derive(Args)]
pub struct PlanArgs {
    /// Use in-memory collaborators (sample inbox, empty to-do list, no LLM)
    #[arg(long)]
    pub offline: bool,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Planning time: RFC 3339 or local YYYY-MM-DDTHH:MM
    #[arg(long)]
    pub now: Option<String>,
}

fn report(
    result: Result<PlanSummary, RunError>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Ok(summary) => print!("{summary}"),
        Err(err) => {
            print_placed(&err);
            return Err(err.into());
        }
    }
    Ok(())
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let tz = config.tz()?;
    let rules = config.workday_rules()?;
    let now = parse_now(args.now.as_deref(), tz)?;

    if args.offline {
        let todos = MockTodos::new();
        let inbox = MockInbox::sample(&now.to_rfc3339());
        let generator = MockGenerator::offline();
        let calendar = MockCalendar::new();
        let store = LinkageStore::open_memory()?;

        let result = DailyRouter::new(&todos, &inbox, &generator, &calendar, &calendar, rules, tz)
            .with_linkage(&store)
            .run(now);
        return report(result, args.json);
    }

    let google = GoogleClient::new(&config.google, tz)?;
    let todos = NotionTodos::new(&config.notion)?;
    let generator = OllamaClient::new(&config.ollama)?;
    let store = LinkageStore::open()?;
    tracing::info!(model = generator.model(), "planning with live collaborators");

    let result = DailyRouter::new(&todos, &google, &generator, &google, &google, rules, tz)
        .with_linkage(&store)
        .run(now);
    report(result, args.json)
}
