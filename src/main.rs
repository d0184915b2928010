use chrono::Local;
use clap::{Parser, Subcommand};
use colored::{Color, Colorize};
use eyre::{Result, eyre};
use famcal::{App, Config, Event, EventCategory, FileImporter, Store, TimeRange, agenda, models};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "famcal")]
#[command(about = "Family agenda - list, import and edit shared calendar events")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: $CONFIG_DIR/famcal/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the store (overrides the config)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the events visible for a member, search and time range
    List {
        /// Member id, or "all"
        #[arg(short, long, default_value = famcal::ALL_MEMBERS)]
        member: String,

        /// Case-insensitive text to find in titles
        #[arg(short = 'q', long, default_value = "")]
        search: String,

        /// Time window (default from config)
        #[arg(short, long, value_enum)]
        range: Option<TimeRange>,
    },

    /// Add a single event
    Add {
        #[arg(short, long)]
        title: String,

        /// Date as YYYY-MM-DD
        #[arg(short, long)]
        date: String,

        /// Start time as HH:MM
        #[arg(long)]
        start: Option<String>,

        /// End time as HH:MM
        #[arg(long)]
        end: Option<String>,

        /// Id of the person the event belongs to
        #[arg(short, long)]
        member: String,

        /// Salud, Colegio, Ocio, Trabajo, Hogar or Otro
        #[arg(short, long, default_value = "Otro")]
        category: String,

        #[arg(long)]
        reminder: bool,

        #[arg(long)]
        description: Option<String>,
    },

    /// Import events from a .json, .jsonl or .yaml file
    Import { file: PathBuf },

    /// Delete an event by id
    Delete { id: String },

    /// Show what is on a given day
    Day {
        /// Date as YYYY-MM-DD
        date: String,
    },

    /// List family members
    Members,

    /// Rebuild the database from JSONL files
    Sync,
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.store_path {
        config.store_path = path;
    }

    let store = Store::open(&config.store_path)?;
    let mut app = App::new(store, config.default_range);

    match cli.command {
        Commands::List { member, search, range } => {
            config.require_member(&member)?;
            load(&mut app)?;
            let state = app.state_mut();
            state.select_member(&member);
            state.set_query(&search);
            if let Some(range) = range {
                state.set_time_range(range);
            }
            let range = state.time_range();
            println!("{}", range.label().bold());
            let visible = state.visible_events(Local::now().naive_local());
            print_events(visible.iter(), &config);
        }
        Commands::Add {
            title,
            date,
            start,
            end,
            member,
            category,
            reminder,
            description,
        } => {
            config.require_person(&member)?;
            let mut event = Event::new(title, date, member);
            event.start_time = start;
            event.end_time = end;
            event.category = category.parse::<EventCategory>()?;
            event.is_reminder = reminder;
            event.description = description;
            event.validate()?;

            if !app.add_event(event) {
                return Err(eyre!("Event was not saved"));
            }
            println!("Event saved ({} total)", app.state().events().len());
        }
        Commands::Import { file } => {
            let importer = FileImporter::new(&file)?;
            load(&mut app)?;
            let before = app.state().events().len();
            if !app.import(&importer) {
                return Err(eyre!("Import of {:?} failed", file));
            }
            let after = app.state().events().len();
            println!("Imported {:?}: agenda now has {} events (+{})", file, after, after.saturating_sub(before));
        }
        Commands::Delete { id } => {
            load(&mut app)?;
            if !app.delete(&id) {
                return Err(eyre!("Event {} was not deleted", id));
            }
            println!("Deleted {}", id);
        }
        Commands::Day { date } => {
            models::parse_iso_date(&date)?;
            load(&mut app)?;
            let state = app.state_mut();
            state.click_date(&date);
            match state.selected_date().map(str::to_string) {
                Some(day) => {
                    println!("{}", day.bold());
                    let stored = app.store().events_on_date(&day)?;
                    let mut events: Vec<&Event> = stored.iter().collect();
                    agenda::sort_events(&mut events);
                    print_events(events.into_iter(), &config);
                }
                None => {
                    println!("Nothing scheduled on {}; searching all events for it", date);
                    let visible = state.visible_events(Local::now().naive_local());
                    print_events(visible.iter(), &config);
                }
            }
        }
        Commands::Members => {
            for member in &config.members {
                let color = member.color.parse::<Color>().unwrap_or(Color::White);
                println!("{:<10} {}", member.id, member.name.color(color));
            }
        }
        Commands::Sync => {
            println!("Syncing database from JSONL files...");
            let store = app.store_mut();
            store.sync()?;
            let count = store.rebuild_indexes::<Event>()?;
            println!("Sync complete ({} events)", count);
        }
    }

    Ok(())
}

fn load(app: &mut App<Store>) -> Result<()> {
    if app.load() {
        Ok(())
    } else {
        Err(eyre!("Could not load events from {:?}", app.store().base_path()))
    }
}

fn print_events<'a>(events: impl Iterator<Item = &'a Event>, config: &Config) {
    let mut count = 0;
    for event in events {
        print_event(event, config);
        count += 1;
    }
    if count == 0 {
        println!("{}", "No hay eventos para estos filtros".dimmed());
    }
}

fn print_event(event: &Event, config: &Config) {
    let who = match config.member(&event.member_id) {
        Some(m) => m.name.color(m.color.parse::<Color>().unwrap_or(Color::White)),
        None => event.member_id.normal(),
    };
    let time = match (&event.start_time, &event.end_time) {
        (Some(start), Some(end)) => format!("{}-{}", start, end),
        (Some(start), None) => start.clone(),
        _ => "--:--".to_string(),
    };
    let reminder = if event.is_reminder { " (recordatorio)" } else { "" };

    println!(
        "{} {:<11} {} [{}] {}{}  {}",
        event.date.bold(),
        time,
        event.title,
        event.category,
        who,
        reminder.yellow(),
        event.id.dimmed()
    );
    if let Some(description) = &event.description {
        println!("    {}", description.dimmed());
    }
}
