mod auth;
mod board;
mod cache;
mod config;
mod db;
mod display;
mod fetcher;
mod filters;
mod models;
mod source;
mod store;
mod tui;

use anyhow::{bail, Context, Result};
use auth::{AuthClient, HttpAuthTransport, OAuthProvider, Registration};
use board::{JobBoard, Phase};
use cache::{CachedFetcher, ListingCache};
use clap::{Args, Parser, Subcommand};
use config::Config;
use db::SqliteStore;
use fetcher::{Fetcher, HttpTransport, JobFeed};
use filters::DraftFilters;
use source::JobSource;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jobseek")]
#[command(about = "Search ATS and LinkedIn job listings from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search ATS postings (Greenhouse, Lever, Workday, ...)
    Ats {
        #[command(flatten)]
        filters: AtsFilterArgs,

        /// Page number (100 jobs per page)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Serve the unfiltered first page from the local cache when fresh
        #[arg(long)]
        cached: bool,
    },

    /// Search LinkedIn postings
    Linkedin {
        #[command(flatten)]
        filters: LinkedinFilterArgs,

        /// Page number (100 jobs per page)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Browse listings interactively
    Browse {
        #[command(subcommand)]
        source: BrowseCommands,
    },

    /// Log in to the auth backend
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account on the auth backend
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password, at least 6 characters (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session tokens
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Print the URL that starts an OAuth login
    OauthUrl {
        #[arg(value_enum)]
        provider: OAuthProvider,
    },

    /// Store the tokens from the URL the OAuth flow redirected to
    OauthCallback {
        /// Full redirect URL, including the #access_token=... fragment
        url: String,
    },

    /// Inspect or clear the listing cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum BrowseCommands {
    /// Browse ATS postings
    Ats {
        #[command(flatten)]
        filters: AtsFilterArgs,
    },

    /// Browse LinkedIn postings
    Linkedin {
        #[command(flatten)]
        filters: LinkedinFilterArgs,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show what is cached and whether it is still fresh
    Show,

    /// Drop the cached listings
    Clear,
}

#[derive(Args, Debug, Clone, Default)]
struct AtsFilterArgs {
    /// Title filter (e.g. "Software Engineer")
    #[arg(short, long)]
    title: Option<String>,

    /// Location filter (e.g. "United States")
    #[arg(short, long)]
    location: Option<String>,

    /// Company filter (comma-separated)
    #[arg(short, long)]
    organization: Option<String>,

    /// ATS platform (greenhouse, lever.co, workday, ...)
    #[arg(long)]
    source: Option<String>,

    /// Remote status (all, remote, onsite)
    #[arg(long)]
    remote: Option<String>,

    /// Only jobs posted after this date/time (e.g. 2024-11-01T00:00)
    #[arg(long)]
    date: Option<String>,

    /// Salary unit (HOUR, YEAR, MONTH)
    #[arg(long)]
    salary_unit: Option<String>,

    /// Minimum salary
    #[arg(long)]
    min_salary: Option<String>,

    /// Maximum salary
    #[arg(long)]
    max_salary: Option<String>,

    /// Include AI-enriched fields in results
    #[arg(long)]
    include_ai: bool,

    /// AI employment types (comma-separated)
    #[arg(long)]
    employment_type: Option<String>,

    /// AI work arrangements (comma-separated)
    #[arg(long)]
    work_arrangement: Option<String>,

    /// AI experience levels (comma-separated)
    #[arg(long)]
    experience_level: Option<String>,

    /// Only jobs offering visa sponsorship
    #[arg(long)]
    visa_sponsorship: bool,

    /// Include descriptions (text, html)
    #[arg(long)]
    description: Option<String>,
}

impl AtsFilterArgs {
    fn to_draft(&self) -> Result<DraftFilters> {
        let mut draft = DraftFilters::new(JobSource::Ats);
        set_text(&mut draft, "title_filter", &self.title)?;
        set_text(&mut draft, "location_filter", &self.location)?;
        set_text(&mut draft, "organization_filter", &self.organization)?;
        set_text(&mut draft, "source", &self.source)?;
        set_text(&mut draft, "remote", &self.remote)?;
        set_text(&mut draft, "date_filter", &self.date)?;
        set_text(&mut draft, "salary_unit", &self.salary_unit)?;
        set_text(&mut draft, "min_salary", &self.min_salary)?;
        set_text(&mut draft, "max_salary", &self.max_salary)?;
        draft.set("include_ai", self.include_ai)?;
        set_text(&mut draft, "ai_employment_type_filter", &self.employment_type)?;
        set_text(&mut draft, "ai_work_arrangement_filter", &self.work_arrangement)?;
        set_text(&mut draft, "ai_experience_level_filter", &self.experience_level)?;
        draft.set("ai_visa_sponsorship_filter", self.visa_sponsorship)?;
        set_text(&mut draft, "description_type", &self.description)?;
        Ok(draft)
    }
}

#[derive(Args, Debug, Clone, Default)]
struct LinkedinFilterArgs {
    /// Job title
    #[arg(short, long)]
    title: Option<String>,

    /// Location
    #[arg(short, long)]
    location: Option<String>,

    /// Company slugs (comma-separated)
    #[arg(short, long)]
    organization: Option<String>,

    /// Job type (CONTRACTOR, FULL_TIME, INTERN, OTHER, PART_TIME, TEMPORARY, VOLUNTEER)
    #[arg(long = "type")]
    job_type: Option<String>,

    /// Seniority levels (comma-separated, e.g. "Mid-Senior level,Director")
    #[arg(long)]
    seniority: Option<String>,

    /// Remote status (all, true, false)
    #[arg(long)]
    remote: Option<String>,

    /// Only jobs posted after this date/time (e.g. 2024-11-01T00:00)
    #[arg(long)]
    date: Option<String>,

    /// Easy Apply (all, true, false)
    #[arg(long)]
    direct_apply: Option<String>,

    /// Minimum company size
    #[arg(long)]
    min_employees: Option<String>,

    /// Maximum company size
    #[arg(long)]
    max_employees: Option<String>,

    /// Sort order (desc = newest first, asc = oldest first)
    #[arg(long)]
    order: Option<String>,

    /// Include AI-enriched fields in results
    #[arg(long)]
    include_ai: bool,

    /// AI work arrangements (On-site, Hybrid, Remote OK, Remote Solely)
    #[arg(long)]
    work_arrangement: Option<String>,

    /// AI experience levels (0-2, 2-5, 5-10, 10+)
    #[arg(long)]
    experience_level: Option<String>,

    /// Only jobs offering visa sponsorship
    #[arg(long)]
    visa_sponsorship: bool,
}

impl LinkedinFilterArgs {
    fn to_draft(&self) -> Result<DraftFilters> {
        let mut draft = DraftFilters::new(JobSource::Linkedin);
        set_text(&mut draft, "title_filter", &self.title)?;
        set_text(&mut draft, "location_filter", &self.location)?;
        set_text(&mut draft, "organization_slug_filter", &self.organization)?;
        set_text(&mut draft, "type_filter", &self.job_type)?;
        set_text(&mut draft, "seniority_filter", &self.seniority)?;
        set_text(&mut draft, "remote", &self.remote)?;
        set_text(&mut draft, "date_filter", &self.date)?;
        set_text(&mut draft, "directapply", &self.direct_apply)?;
        set_text(&mut draft, "employees_gte", &self.min_employees)?;
        set_text(&mut draft, "employees_lte", &self.max_employees)?;
        set_text(&mut draft, "order", &self.order)?;
        draft.set("include_ai", self.include_ai)?;
        set_text(&mut draft, "ai_work_arrangement_filter", &self.work_arrangement)?;
        set_text(&mut draft, "ai_experience_level_filter", &self.experience_level)?;
        draft.set("ai_visa_sponsorship_filter", self.visa_sponsorship)?;
        Ok(draft)
    }
}

fn set_text(draft: &mut DraftFilters, key: &str, value: &Option<String>) -> Result<()> {
    if let Some(value) = value {
        draft.set(key, value.as_str())?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobseek=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = Config::load()?;

    match cli.command {
        Commands::Ats {
            filters,
            page,
            json,
            cached,
        } => {
            let fetcher = listing_fetcher(&config, JobSource::Ats)?;
            let draft = filters.to_draft()?;
            if cached {
                let store = SqliteStore::open()?;
                let cache = ListingCache::new(Box::new(store)).with_ttl(config.cache_ttl_ms);
                let feed = CachedFetcher::new(fetcher, cache);
                run_search(&feed, draft, page, json, config.page_size)?;
            } else {
                run_search(&fetcher, draft, page, json, config.page_size)?;
            }
        }

        Commands::Linkedin { filters, page, json } => {
            let fetcher = listing_fetcher(&config, JobSource::Linkedin)?;
            run_search(&fetcher, filters.to_draft()?, page, json, config.page_size)?;
        }

        Commands::Browse { source } => {
            let (source, draft) = match source {
                BrowseCommands::Ats { filters } => (JobSource::Ats, filters.to_draft()?),
                BrowseCommands::Linkedin { filters } => (JobSource::Linkedin, filters.to_draft()?),
            };
            let feed: Arc<dyn JobFeed> = Arc::new(listing_fetcher(&config, source)?);
            let mut board = JobBoard::new(source, config.page_size);
            *board.draft_mut() = draft;
            tui::run_browse(feed, board)?;
        }

        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let client = auth_client(&config)?;
            client.login(&email, &password)?;
            println!("Logged in as {}.", email);
        }

        Commands::Register {
            name,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let client = auth_client(&config)?;
            let message = client.register(&Registration {
                name,
                email,
                password,
            })?;
            println!("{}", message);
        }

        Commands::Logout => {
            auth_client(&config)?.logout()?;
            println!("Logged out.");
        }

        Commands::Whoami => {
            let user = auth_client(&config)?.whoami()?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Commands::Refresh => {
            auth_client(&config)?.refresh()?;
            println!("Access token refreshed.");
        }

        Commands::OauthUrl { provider } => {
            println!("{}", auth_client(&config)?.oauth_url(provider));
        }

        Commands::OauthCallback { url } => {
            let tokens = auth::parse_oauth_redirect(&url)?;
            auth_client(&config)?.save_tokens(&tokens)?;
            println!("Session stored.");
        }

        Commands::Cache { command } => {
            let store = SqliteStore::open()?;
            let path = store.path().clone();
            let cache = ListingCache::new(Box::new(store)).with_ttl(config.cache_ttl_ms);
            match command {
                CacheCommands::Show => match cache.entry()? {
                    Some(entry) => {
                        let age_secs = entry.age_millis(cache.now_millis()) / 1000;
                        println!("Store: {}", path.display());
                        println!("Cached jobs: {}", entry.data.len());
                        println!("Age: {}s", age_secs);
                        println!(
                            "Status: {}",
                            if cache.is_fresh(&entry) { "fresh" } else { "expired" }
                        );
                    }
                    None => println!("No cached listings."),
                },
                CacheCommands::Clear => {
                    cache.clear()?;
                    println!("Listing cache cleared.");
                }
            }
        }

        Commands::Config => {
            println!(
                "Config file:  {}",
                Config::default_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!("RapidAPI key: {}", config.masked_api_key());
            println!("Auth URL:     {}", config.auth_base_url);
            println!("Page size:    {}", config.page_size);
            println!("Cache TTL:    {}ms", config.cache_ttl_ms);
        }
    }

    Ok(())
}

fn listing_fetcher(config: &Config, source: JobSource) -> Result<Fetcher> {
    let transport = HttpTransport::new(config.require_api_key()?)?;
    Ok(Fetcher::new(source, Box::new(transport)).with_page_size(config.page_size))
}

fn auth_client(config: &Config) -> Result<AuthClient> {
    let store = SqliteStore::open()?;
    Ok(AuthClient::new(
        config.auth_base_url.clone(),
        Box::new(HttpAuthTransport::new()),
        Box::new(store),
    ))
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn run_search(feed: &dyn JobFeed, draft: DraftFilters, page: u32, json: bool, page_size: u32) -> Result<()> {
    let source = draft.source();
    let mut board = JobBoard::new(source, page_size);
    *board.draft_mut() = draft;
    let mut ticket = board.apply_filters();
    if page > 1 {
        ticket = board.go_to_page(page);
    }

    let result = feed.fetch(&ticket.query, ticket.page);
    board.complete(&ticket, result);

    let state = board.state();
    if state.phase == Phase::Failed {
        let error = state.error.as_deref().unwrap_or("unknown error");
        bail!("Error fetching {} jobs: {}", source.display_name(), error);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.jobs)?);
        return Ok(());
    }

    if state.jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!(
        "{:<30} {:<20} {:<8} {:<24} {:<26} {:>12}",
        "TITLE", "ORGANIZATION", "MODE", "LOCATION", "SALARY", "POSTED"
    );
    println!("{}", "-".repeat(125));
    for job in &state.jobs {
        println!(
            "{:<30} {:<20} {:<8} {:<24} {:<26} {:>12}",
            display::truncate(&job.title, 28),
            display::truncate(job.organization.as_deref().unwrap_or("-"), 18),
            display::work_mode(job.remote_derived),
            display::truncate(&display::locations(job), 22),
            display::truncate(&display::salary_label(job), 26),
            display::posted_label(job, now)
        );
    }

    println!();
    println!(
        "{} jobs | page {} | {}",
        state.jobs.len(),
        board.page(),
        board.active_query().summary()
    );
    if board.has_next() {
        println!("More results: --page {}", board.page() + 1);
    }

    Ok(())
}
