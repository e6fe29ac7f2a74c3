//! `chi`: compute Customer Happiness Index and act on it from the command line.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use chi_lib::outreach::{
    draft_escalation_ticket, draft_loyalty_promotion, place_follow_up_call, CallRequest,
    ElevenLabsSimulator,
};
use chi_lib::scoring::{analyze_transcript, AnalysisReport};
use chi_lib::source::{source_for_path, RecordFilter};
use chi_lib::state::{completion_from_config, load_config, sample_transcripts, ChiService};
use chi_lib::types::{Config, FeedbackRecord};

#[derive(Parser, Debug)]
#[command(name = "chi")]
#[command(about = "Customer Happiness Index pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.chi/config.json)
    #[arg(long, global = true, env = "CHI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score feedback and print CHI per product and period
    Compute {
        /// Feedback file (.json, or .db/.sqlite)
        #[arg(short, long)]
        input: PathBuf,

        /// Only include this product
        #[arg(short, long)]
        product: Option<String>,

        /// Ignore the memoized result
        #[arg(long)]
        refresh: bool,
    },

    /// Recommend Fix, Engage or Reward for one product
    Recommend {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        product: String,

        /// Sample transcripts sent with the request
        #[arg(long, default_value = "5")]
        samples: usize,
    },

    /// Simulate a follow-up call with a customer
    Call {
        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: String,

        /// The customer's original feedback
        #[arg(long)]
        transcript: String,

        #[arg(long)]
        product: Option<String>,
    },

    /// Analyze one transcript: sentiment, location, resolution, topics
    Analyze {
        #[arg(long)]
        transcript: String,
    },

    /// Draft an operational email for a product
    Brief {
        #[arg(value_enum)]
        kind: BriefKind,

        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        product: String,

        /// Transcripts included in the brief
        #[arg(long, default_value = "10")]
        samples: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BriefKind {
    /// Engineering escalation ticket
    Escalation,
    /// Loyalty promotion campaign brief
    Promotion,
}

fn load_records(input: &Path, product: Option<&str>) -> anyhow::Result<Vec<FeedbackRecord>> {
    let filter = RecordFilter {
        product: product.map(str::to_string),
    };
    Ok(source_for_path(input).load(&filter)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Compute {
            input,
            product,
            refresh,
        } => {
            let records = load_records(&input, product.as_deref())?;
            let service = ChiService::from_config(config)?;
            let rows = service.compute_chi(&records, !refresh).await?;
            print_json(&rows)
        }
        Commands::Recommend {
            input,
            product,
            samples,
        } => {
            let records = load_records(&input, None)?;
            let service = ChiService::from_config(config)?;
            let rec = service
                .recommend_for_product(&records, &product, samples)
                .await?;
            print_json(&rec)
        }
        Commands::Call {
            name,
            phone,
            transcript,
            product,
        } => {
            let simulator = ElevenLabsSimulator::new(&config.conversation)?;
            let request = CallRequest {
                customer_name: name,
                customer_phone: phone,
                transcript,
                product,
            };
            let outcome =
                place_follow_up_call(&simulator, &request, config.conversation.turns_limit).await?;
            print_json(&outcome)
        }
        Commands::Brief {
            kind,
            input,
            product,
            samples,
        } => {
            let records = load_records(&input, Some(&product))?;
            let transcripts = sample_transcripts(&records, &product, samples);
            let completion = completion_from_config(&config.completion)?;
            let email = match kind {
                BriefKind::Escalation => {
                    draft_escalation_ticket(completion.as_ref(), &product, &transcripts).await?
                }
                BriefKind::Promotion => {
                    draft_loyalty_promotion(completion.as_ref(), &product, &transcripts).await?
                }
            };
            print_json(&email)
        }
        Commands::Analyze { transcript } => {
            let completion = completion_from_config(&config.completion)?;
            let analysis = analyze_transcript(completion.as_ref(), &transcript).await;
            print_json(&AnalysisReport::from(analysis))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    run(cli, config).await
}
