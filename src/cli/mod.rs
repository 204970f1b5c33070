pub mod output;
pub mod serve;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{level_filters::LevelFilter, warn};

use crate::{
    app::AppContext,
    reminder::notifier::DesktopNotifier,
    state::{
        settings::SettingsPatch,
        storage::{FileStore, KeyValueStore},
    },
    sync::{
        rest::{RestCloudConfig, RestCloudStore},
        CloudStore, SyncConfig,
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, SERVE_PREFIX},
        time::WallTime,
    },
};

#[derive(Parser, Debug)]
#[command(name = "checkin", version, long_about = None)]
#[command(about = "Asks what you did in the last hours and summarizes where the time went")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME/checkin or $HOME/.local/state/checkin"
    )]
    dir: Option<PathBuf>,
    #[command(flatten)]
    cloud: CloudArgs,
}

#[derive(clap::Args, Debug)]
struct CloudArgs {
    #[arg(
        long,
        global = true,
        env = "CHECKIN_CLOUD_URL",
        help = "Base URL of the cloud store. Without it everything stays local"
    )]
    cloud_url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "CHECKIN_CLOUD_KEY",
        hide_env_values = true,
        help = "API key of the cloud store"
    )]
    cloud_key: Option<String>,
}

impl CloudArgs {
    fn store(&self) -> Result<Option<Arc<dyn CloudStore>>> {
        let Some(url) = &self.cloud_url else {
            return Ok(None);
        };
        let Some(key) = &self.cloud_key else {
            warn!("Cloud URL is set without a key, staying local");
            return Ok(None);
        };
        let store = RestCloudStore::new(RestCloudConfig::new(url, key))?;
        Ok(Some(Arc::new(store)))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Show whether a check-in is due")]
    Status,
    #[command(about = "Label the last interval with a category")]
    Log {
        #[arg(help = "Category name. Unknown names create a new category")]
        category: String,
    },
    #[command(about = "List categories, most used first")]
    Categories,
    #[command(about = "Show or change the check-in interval and the sleep window")]
    Settings {
        #[arg(long, help = "Hours covered by each check-in, e.g. 0.5 or 2")]
        interval: Option<f64>,
        #[arg(long, help = "Start of the sleep window as HH:MM")]
        sleep_start: Option<WallTime>,
        #[arg(long, help = "End of the sleep window as HH:MM")]
        sleep_end: Option<WallTime>,
    },
    #[command(about = "Summarize tracked time of a day")]
    Insights {
        #[arg(long, help = "Day as YYYY-MM-DD. Defaults to today")]
        day: Option<NaiveDate>,
    },
    #[command(about = "Configure reminders")]
    #[command(group(ArgGroup::new("toggle").args(["enable", "disable"])))]
    Notifications {
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long, help = "Don't remind about this hour (0-23). Can be repeated")]
        exclude: Vec<u8>,
        #[arg(long, help = "Remind about this hour again. Can be repeated")]
        include: Vec<u8>,
    },
    #[command(about = "Run in the foreground and show reminders until interrupted")]
    Serve,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = args.dir.clone().map_or_else(create_application_default_path, Ok)?;
    let prefix = match args.commands {
        Commands::Serve => SERVE_PREFIX,
        _ => CLI_PREFIX,
    };
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(prefix, &dir, logging_level, args.log)?;

    let mut app = open_context(dir, &args.cloud).await?;
    let result = process_command(&mut app, args.commands).await;
    app.shutdown().await;
    result
}

async fn open_context(dir: PathBuf, cloud: &CloudArgs) -> Result<AppContext> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.join("data"))?);
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let notifier = DesktopNotifier::new(storage.clone(), clock.clone());

    Ok(AppContext::start(
        storage,
        cloud.store()?,
        Box::new(notifier),
        clock,
        SyncConfig::default(),
    )
    .await)
}

async fn process_command(app: &mut AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Status => output::print_status(app),
        Commands::Log { category } => {
            let category = category.trim();
            if category.is_empty() {
                return Err(anyhow::anyhow!("Category can't be empty"));
            }
            let entry = app.add_log(category);
            output::print_logged(&entry);
        }
        Commands::Categories => output::print_categories(&app.sorted_categories()),
        Commands::Settings {
            interval,
            sleep_start,
            sleep_end,
        } => {
            app.update_settings(SettingsPatch {
                interval_hours: interval,
                sleep_start,
                sleep_end,
                ..Default::default()
            })?;
            output::print_settings(&app.state().settings);
        }
        Commands::Insights { day } => {
            let day = day.unwrap_or_else(|| app.today());
            output::print_insights(&app.insights(day));
        }
        Commands::Notifications {
            enable,
            disable,
            exclude,
            include,
        } => {
            if enable || disable {
                app.set_notifications_enabled(enable)?;
            }
            for hour in exclude {
                app.set_hour_excluded(hour, true)?;
            }
            for hour in include {
                app.set_hour_excluded(hour, false)?;
            }
            output::print_notifications(app.preferences(), app.armed_reminder());
        }
        Commands::Serve => serve::serve(app).await?,
    }
    Ok(())
}
