use clap::Subcommand;
use focusroute_core::LinkageStore;

#[derive(Subcommand)]
pub enum LinkAction {
    /// Show recorded mappings and the mail sync cursor
    Show {
        /// Only this mail thread
        #[arg(long)]
        thread: Option<String>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: LinkAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LinkAction::Show { thread, json } => {
            let store = LinkageStore::open()?;
            let mappings = match thread {
                Some(thread) => {
                    let mapping = store
                        .get_mapping(&thread)?
                        .ok_or_else(|| format!("no mapping for thread {thread}"))?;
                    vec![mapping]
                }
                None => store.list_mappings()?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&mappings)?);
                return Ok(());
            }

            if let Some(cursor) = store.get_cursor("gmail")? {
                println!("gmail cursor: {cursor}");
            }
            if mappings.is_empty() {
                println!("no mappings recorded");
            }
            for m in &mappings {
                println!(
                    "{}  todo={}  event={}  updated={}",
                    m.origin_id,
                    m.notion_block_id.as_deref().unwrap_or("-"),
                    m.calendar_event_id.as_deref().unwrap_or("-"),
                    m.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}
