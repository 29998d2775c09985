use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bestroute_completion::{
    CompletionBackend, GeminiConfig, ScriptedCompletion, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL,
};
use bestroute_core::{
    build_completion_request, render_text, route_cards, Preference, Preferences, TripRequest,
};
use bestroute_observability::{init_tracing, AppMetrics};
use bestroute_planner::RoutePlanner;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bestroute")]
#[command(about = "Ask a completion model for the best route between two places")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search for routes and print them.
    Find {
        #[command(flatten)]
        trip: TripArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Print the raw route JSON instead of cards.
        #[arg(long)]
        json: bool,
    },
    /// Print the prompt and output schema without calling the service.
    Prompt {
        #[command(flatten)]
        trip: TripArgs,
    },
}

#[derive(Debug, Args)]
struct TripArgs {
    #[arg(long = "from")]
    start: String,
    #[arg(long = "to")]
    destination: String,
    /// Extra stop, in visiting order. Repeatable.
    #[arg(long = "stop")]
    stops: Vec<String>,
    #[arg(long, conflicts_with = "no_fastest")]
    fastest: bool,
    /// Drop the default "fastest" preference.
    #[arg(long)]
    no_fastest: bool,
    #[arg(long)]
    cheapest: bool,
    #[arg(long)]
    comfort: bool,
    #[arg(long)]
    eco: bool,
}

impl TripArgs {
    fn into_trip(self) -> TripRequest {
        let mut preferences = Preferences::none();
        preferences.set(Preference::Fastest, self.fastest || !self.no_fastest);
        preferences.set(Preference::Cheapest, self.cheapest);
        preferences.set(Preference::MostComfortable, self.comfort);
        preferences.set(Preference::EcoFriendly, self.eco);
        TripRequest::new(self.start, self.destination)
            .with_stops(self.stops)
            .with_preferences(preferences)
    }
}

#[derive(Debug, Args)]
struct BackendArgs {
    /// Serve this file as the model reply instead of calling Gemini.
    #[arg(long, env = "BESTROUTE_SCRIPTED_REPLY_FILE")]
    reply_file: Option<PathBuf>,
    #[arg(long, env = "BESTROUTE_GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "BESTROUTE_GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    model: String,
    #[arg(long, env = "BESTROUTE_GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    base_url: String,
    #[arg(long, env = "BESTROUTE_HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    timeout_seconds: u64,
}

impl BackendArgs {
    fn build(self) -> Result<CompletionBackend> {
        if let Some(path) = self.reply_file {
            let reply = std::fs::read_to_string(&path)
                .with_context(|| format!("failed reading reply file {}", path.display()))?;
            return Ok(CompletionBackend::scripted(ScriptedCompletion::always(reply)));
        }

        let config = match self.api_key {
            Some(api_key) => GeminiConfig {
                api_key,
                model: self.model,
                base_url: self.base_url,
                timeout: Duration::from_secs(self.timeout_seconds),
            },
            None => GeminiConfig::from_env()
                .context("no Gemini API key: pass --api-key or set BESTROUTE_GEMINI_API_KEY")?,
        };

        CompletionBackend::gemini(config).context("failed to build Gemini client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("bestroute_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Find {
            trip,
            backend,
            json,
        } => {
            let trip = trip.into_trip();
            let planner = RoutePlanner::new(Arc::new(backend.build()?), AppMetrics::shared());

            let response = match planner.find_best_routes_for(&trip).await {
                Ok(response) => response,
                Err(failure) => anyhow::bail!("{}", failure.user_message()),
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "bestRoute": &response.best_route,
                        "alternatives": &response.alternatives,
                        "cards": route_cards(&response),
                    }))?
                );
            } else {
                print!("{}", render_text(&response));
            }
        }
        Command::Prompt { trip } => {
            let request = build_completion_request(&trip.into_trip());
            println!("{}\n", request.prompt);
            println!("{}", serde_json::to_string_pretty(&request.response_schema)?);
        }
    }

    Ok(())
}
