//! End-to-end scenarios for the circles engine using Cucumber.
//!
//! ```bash
//! cargo test --test scenarios
//! ```
//!
//! Every scenario runs against a fresh in-memory store and a manual clock.
//! All feature files run; the process fails afterwards if any of them did.

mod steps;

use cucumber::writer::Stats as _;
use cucumber::World;
use steps::CirclesWorld;

const FEATURES: [(&str, &str); 3] = [
    ("Group Cycle", "tests/scenarios/features/group_cycle.feature"),
    ("Trust and Early Payout", "tests/scenarios/features/trust.feature"),
    ("Referral and Fee", "tests/scenarios/features/referrals.feature"),
];

#[tokio::main]
async fn main() {
    let mut failed = Vec::new();
    for (title, path) in FEATURES {
        println!("\n=== Running {title} Scenarios ===\n");
        let writer = CirclesWorld::cucumber().fail_on_skipped().run(path).await;
        if writer.execution_has_failed() {
            failed.push(path);
        }
    }

    if !failed.is_empty() {
        eprintln!("\nFailed feature files: {}", failed.join(", "));
        std::process::exit(1);
    }
}
