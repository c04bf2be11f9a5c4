//! Selects an option in a simulated custom dropdown whose options render late,
//! on a connection that degrades half way through.
//!
//! Run as follows:
//!
//!     cargo run --example dropdown

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use waitkit::components::dropdown::{DropdownDriver, HybridDropdown, Locator};
use waitkit::network::{NetworkConditions, SimulatedNetwork};
use waitkit::prelude::*;

/// A `<div>` based dropdown. Its options appear 1.5 seconds after page load
/// and it is not a native `<select>`.
struct SimulatedPage {
    loaded: Instant,
    selected: Mutex<String>,
}

impl SimulatedPage {
    fn options_rendered(&self) -> bool {
        self.loaded.elapsed() > Duration::from_millis(1500)
    }
}

impl DropdownDriver for SimulatedPage {
    fn select_native(&self, _dropdown: &Locator, _text: &str) -> Result<bool, ObservedError> {
        Ok(false)
    }

    fn click(&self, target: &Locator) -> Result<(), ObservedError> {
        match target {
            Locator::Css(_) => Ok(()),
            Locator::XPath(xpath) if self.options_rendered() && xpath.contains("\"Canada\"") => {
                *self.selected.lock().unwrap() = "Canada".to_string();
                Ok(())
            }
            Locator::XPath(xpath) => Err(ObservedError::not_found(xpath.clone())),
        }
    }

    fn execute_script(&self, _script: &str, _args: Vec<Value>) -> Result<Value, ObservedError> {
        Ok(Value::Bool(false))
    }

    fn selected_text(&self, _dropdown: &Locator) -> Result<String, ObservedError> {
        Ok(self.selected.lock().unwrap().clone())
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let network = SimulatedNetwork::new(NetworkProfile::fast());
    let adaptive = AdaptiveTimeout::new(Duration::from_secs(2));
    let template = PollPolicy::new(Duration::from_secs(2), Duration::from_millis(100));
    let mut reliability = Reliability::default();

    for round in 0..2 {
        if round == 1 {
            network.set(NetworkProfile::three_g());
        }
        let profile = network.current();
        let policy = adaptive.policy_for(&template, &profile, reliability)?;
        println!("round {}: {} network, timeout {:?}", round, profile.class, policy.timeout());

        let page = SimulatedPage {
            loaded: Instant::now(),
            selected: Mutex::new("Choose a country".to_string()),
        };
        let dropdown = HybridDropdown::new(&page, Locator::Css("#country".to_string()));
        let outcome = dropdown.select(&Waiter::new(policy.clone()), "Canada")?;
        reliability = adaptive.record(reliability, &outcome, policy.timeout());

        match outcome.into_result() {
            Ok(chosen) => println!(
                "  selected '{}' using '{}' after {} failed strategies",
                chosen.value,
                chosen.label,
                chosen.failures.len()
            ),
            Err(failure) => println!("  {}", failure),
        }
        println!("  reliability now {:.3}", reliability.value());
    }

    Ok(())
}
