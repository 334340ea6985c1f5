//! # Verdant - plantation lifecycle CLI
//!
//! The main binary for the Verdant lifecycle engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/verdant (THE BINARY)         │
//! │                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │   CLI     │  │  Config   │  │ Logging  │  │
//! │  │  (clap)   │  │  (toml)   │  │ (tracing)│  │
//! │  └─────┬─────┘  └─────┬─────┘  └────┬─────┘  │
//! │        └──────────────┼─────────────┘        │
//! │                       ▼                      │
//! │               ┌───────────────┐              │
//! │               │ verdant-core  │              │
//! │               │ (THE LOGIC)   │              │
//! │               └───────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! verdant init
//! verdant add-plantation --id north --name "North Ridge" --start-date 2024-03-01
//! verdant add-template --id water --plantation north --title Water \
//!     --frequency weekly --interval 2 --next-run 2024-03-08
//! verdant run-scheduler
//! verdant health --json-mode
//! ```

use clap::Parser;
use verdant::cli::{self, Cli};
use verdant::config::{DEFAULT_LOG_FILTER, LogFormat, VerdantConfig};
use verdant::logging;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Resolve configuration before logging so the log settings can come from it.
    let config = match VerdantConfig::resolve(&cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_with(LogFormat::Text, DEFAULT_LOG_FILTER);
            tracing::error!("Error: {}", e);
            std::process::exit(2);
        }
    };
    logging::init(&config);

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    tracing::debug!(
        database = %config.database.display(),
        backend = %config.backend,
        "configuration resolved"
    );

    // Execute command
    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Verdant startup banner.
fn print_banner() {
    println!(
        r#"
  Verdant v{}
  Plantation lifecycle engine
"#,
        env!("CARGO_PKG_VERSION")
    );
}
