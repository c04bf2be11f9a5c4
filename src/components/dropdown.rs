// Copyright 2021 Stephen Pryde and the thirtyfour_sync contributors
// Derived (and modified) from the Selenium project at https://github.com/SeleniumHQ/selenium.
//
// Copyright 2011-2020 Software Freedom Conservancy
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde_json::{json, Value};
use stringmatch::Needle;

use crate::condition::Observation;
use crate::error::{ConfigResult, ErrorKind, ObservedError};
use crate::fallback::{Chosen, StrategyChain};
use crate::wait::outcome::WaitOutcome;
use crate::wait::waiter::Waiter;

/// Escape the specified string for use in an XPath expression.
pub fn escape_string(value: &str) -> String {
    let contains_single = value.contains('\'');
    let contains_double = value.contains('\"');
    if contains_single && contains_double {
        let mut result = vec![String::from("concat(")];
        for substring in value.split('\"') {
            result.push(format!("\"{}\"", substring));
            result.push(String::from(", '\"', "));
        }
        result.pop();
        return result.join("") + ")";
    }

    if contains_double {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

/// Get the longest word in the specified string.
fn get_longest_token(value: &str) -> &str {
    let mut longest = "";
    for item in value.split(' ') {
        if item.len() > longest.len() {
            longest = item;
        }
    }
    longest
}

/// Where to find an element. Resolving it is up to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
        }
    }
}

/// The browser operations a dropdown selection needs.
///
/// Errors should use [`ErrorKind::NotFound`] or [`ErrorKind::Stale`] for
/// elements that are not rendered yet, so the wait retries them.
pub trait DropdownDriver {
    /// Select the option with this visible text on a native `<select>`.
    /// Returns `Ok(false)` if `dropdown` is not a native `<select>`.
    fn select_native(&self, dropdown: &Locator, text: &str) -> Result<bool, ObservedError>;

    fn click(&self, target: &Locator) -> Result<(), ObservedError>;

    fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, ObservedError>;

    /// The text the dropdown currently displays as its selection.
    fn selected_text(&self, dropdown: &Locator) -> Result<String, ObservedError>;
}

const OPTION_NODES: &str = "(@role='option' or self::li or self::option)";

/// Clicks the first visible option whose normalised text equals `arguments[0]`.
const CLICK_OPTION_SCRIPT: &str = r#"
var wanted = arguments[0].trim();
var nodes = document.querySelectorAll('[role="option"], li, option');
for (var i = 0; i < nodes.length; i++) {
    var node = nodes[i];
    if (node.textContent.replace(/\s+/g, ' ').trim() === wanted) {
        node.scrollIntoView({block: 'center'});
        node.click();
        node.dispatchEvent(new Event('change', {bubbles: true}));
        return true;
    }
}
return false;
"#;

/// Selects an option in a native or custom (div/ul based) dropdown.
///
/// Four strategies are tried in order, each verified by reading back the
/// displayed selection:
///
/// 1. native `<select>` by visible text
/// 2. open the dropdown, click the option with exactly this text
/// 3. open the dropdown, click an option containing the longest word of the text
/// 4. click the option from JavaScript
#[derive(Debug)]
pub struct HybridDropdown<'d, D> {
    driver: &'d D,
    trigger: Locator,
}

impl<'d, D: DropdownDriver> HybridDropdown<'d, D> {
    /// `trigger` is the `<select>` element, or the element that opens a custom dropdown.
    pub fn new(driver: &'d D, trigger: Locator) -> Self {
        Self { driver, trigger }
    }

    /// Select the option displaying `text`.
    pub fn select(&self, waiter: &Waiter, text: &str) -> ConfigResult<WaitOutcome<Chosen<String>>> {
        self.select_matching(waiter, text, text.trim())
    }

    /// Select the option displaying `text`, and accept any displayed
    /// selection that matches `expected`.
    pub fn select_matching<N>(
        &self,
        waiter: &Waiter,
        text: &str,
        expected: N,
    ) -> ConfigResult<WaitOutcome<Chosen<String>>>
    where
        N: Needle + Clone,
    {
        let chain = self.strategies(text, expected);
        waiter.clone().desc(format!("option '{}' in {}", text, self.trigger)).run_chain(chain)
    }

    fn strategies<'s, N>(&'s self, text: &'s str, expected: N) -> StrategyChain<'s, String>
    where
        N: Needle + Clone + 's,
    {
        let exact = Locator::XPath(format!(
            "//*[{} and normalize-space(.) = {}]",
            OPTION_NODES,
            escape_string(text.trim())
        ));
        let token = get_longest_token(text.trim());
        let partial = Locator::XPath(format!(
            "//*[{} and contains(normalize-space(.), {})]",
            OPTION_NODES,
            escape_string(token)
        ));

        let verify = |needle: N| move |selected: &String| needle.is_match(selected.trim());

        StrategyChain::new()
            .then_verified(
                "native select",
                move || {
                    move || match self.driver.select_native(&self.trigger, text) {
                        Ok(true) => self.read_selection(),
                        Ok(false) => Observation::Failed(ObservedError::new(
                            ErrorKind::custom("not a native select"),
                            self.trigger.to_string(),
                        )),
                        Err(e) => Observation::Failed(e),
                    }
                },
                verify(expected.clone()),
            )
            .then_verified(
                "click exact text",
                move || move || self.open_and_click(&exact),
                verify(expected.clone()),
            )
            .then_verified(
                "click partial text",
                move || move || self.open_and_click(&partial),
                verify(expected.clone()),
            )
            .then_verified(
                "javascript click",
                move || {
                    move || match self.driver.execute_script(CLICK_OPTION_SCRIPT, vec![json!(text)]) {
                        Ok(Value::Bool(true)) => self.read_selection(),
                        Ok(_) => Observation::NotYet,
                        Err(e) => Observation::Failed(e),
                    }
                },
                verify(expected),
            )
    }

    fn open_and_click(&self, option: &Locator) -> Observation<String> {
        if let Err(e) = self.driver.click(&self.trigger) {
            return Observation::Failed(e);
        }
        match self.driver.click(option) {
            Ok(()) => self.read_selection(),
            Err(e) => Observation::Failed(e),
        }
    }

    fn read_selection(&self) -> Observation<String> {
        Observation::from_result(self.driver.selected_text(&self.trigger))
    }
}
