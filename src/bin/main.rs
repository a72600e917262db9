use trading_assistant_orchestrator::{
    models::RunState,
    ports::mock::mock_collaborators,
    providers::collaborators_from_env,
    Pipeline,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Trading Assistant Orchestrator starting");

    let collab = match collaborators_from_env() {
        Some(collab) => {
            info!("Using live collaborators from environment keys");
            collab
        }
        None => {
            info!("GEMINI_API_KEY not set, running against mock collaborators");
            mock_collaborators("report_request")
        }
    };

    let pipeline = Pipeline::assistant(collab)?;

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());
    let query = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "Give me a trading report for today".to_string());

    let state = RunState::new(symbol, query);
    info!(run_id = %state.run_id, symbol = %state.symbol, "Running pipeline");

    match pipeline.run(state).await {
        Ok(state) => {
            println!("\n=== ASSISTANT RESPONSE ===");
            println!(
                "{}",
                state
                    .user_response
                    .as_deref()
                    .unwrap_or("(no response produced)")
            );

            if let Some(signal) = &state.trade_signal {
                println!("\n=== TRADE SIGNAL ===");
                println!("Action: {} (confidence {:.2})", signal.action, signal.confidence);
                println!("Reasoning: {}", signal.reasoning);
            }

            if let Some(trade) = &state.executed_trade {
                println!("\n=== SIMULATED TRADE ===");
                println!(
                    "{} {} x{} @ ${:.2}",
                    trade.action, trade.symbol, trade.quantity, trade.price
                );
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline run failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
