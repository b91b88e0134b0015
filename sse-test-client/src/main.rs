use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;
use sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the relay server (e.g., http://localhost:4000)
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value_t = ScenarioChoice::All)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test basic SSE connection and session identity
    ConnectionTest,
    /// Test untyped event delivery
    UntypedEvent,
    /// Test typed event subscription filtering
    SubscriptionFiltering,
    /// Test send-time acknowledgement behavior
    Acknowledgement,
    /// Run all scenarios
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    println!("{} Establishing SSE connection...", "→".blue());
    let mut connection = Connection::establish(&cli.base_url).await?;
    println!(
        "{} SSE connection established (session: {})",
        "✓".green(),
        connection.session_id
    );

    let api_client = ApiClient::new(cli.base_url.clone());

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&connection).await?);
        }
        ScenarioChoice::UntypedEvent => {
            results.push(scenarios::test_untyped_event(&api_client, &mut connection).await?);
        }
        ScenarioChoice::SubscriptionFiltering => {
            results.push(
                scenarios::test_subscription_filtering(&api_client, &mut connection).await?,
            );
        }
        ScenarioChoice::Acknowledgement => {
            results.push(scenarios::test_acknowledgement(&api_client, &mut connection).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&connection).await?);
            results.push(scenarios::test_untyped_event(&api_client, &mut connection).await?);
            results.push(
                scenarios::test_subscription_filtering(&api_client, &mut connection).await?,
            );
            results.push(scenarios::test_acknowledgement(&api_client, &mut connection).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
