//! # svir - Netlist Pipeline Driver
//!
//! The command-line binary around `svir-core`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                apps/svir (THE BINARY)               │
//! │                                                     │
//! │   ┌──────────┐   ┌────────────┐   ┌─────────────┐  │
//! │   │  CLI     │   │  File I/O  │   │  tracing     │  │
//! │   │  (clap)  │   │ (json/bin) │   │  subscriber  │  │
//! │   └────┬─────┘   └─────┬──────┘   └──────┬──────┘  │
//! │        └───────────────┼─────────────────┘          │
//! │                        ▼                            │
//! │                 ┌─────────────┐                     │
//! │                 │  svir-core  │                     │
//! │                 │ (THE LOGIC) │                     │
//! │                 └─────────────┘                     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Run the default pipeline and write the result
//! svir run -i design.json -o design.opt.json
//!
//! # Pick passes explicitly
//! svir run -i design.json -o out.json --passes const-fold,dead-code-elim
//!
//! # Parse + invariant check only
//! svir check -i design.json
//!
//! # Graph/op/value counts
//! svir stats -i design.json
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "svir=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
