//! Network-aware timeouts.
//!
//! A [`NetworkProfile`] describes the connection the browser is on. An
//! [`AdaptiveTimeout`] turns a base timeout plus a profile into the timeout
//! for the next wait, and folds the result of each wait back into a
//! [`Reliability`] factor. The factor is a plain value: the caller keeps it
//! and passes it into the next call. Nothing here holds state between calls.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::wait::outcome::{FailureKind, WaitOutcome};
use crate::wait::policy::PollPolicy;

/// Connection class, slowest last (except `Offline`).
///
/// Names follow the DevTools / Network Information API effective types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NetworkClass {
    #[serde(rename = "fast")]
    Fast,
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "slow-2g")]
    Slow2G,
    #[serde(rename = "offline")]
    Offline,
}

impl NetworkClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkClass::Fast => "fast",
            NetworkClass::FourG => "4g",
            NetworkClass::ThreeG => "3g",
            NetworkClass::TwoG => "2g",
            NetworkClass::Slow2G => "slow-2g",
            NetworkClass::Offline => "offline",
        }
    }

    /// Timeout multiplier for this class, before capping.
    pub fn scale(&self) -> f64 {
        match self {
            NetworkClass::Fast => 1.0,
            NetworkClass::FourG => 1.5,
            NetworkClass::ThreeG => 2.5,
            NetworkClass::TwoG => 4.0,
            NetworkClass::Slow2G => 5.0,
            NetworkClass::Offline => 8.0,
        }
    }

    /// The next slower class.
    fn degrade(self) -> Self {
        match self {
            NetworkClass::Fast => NetworkClass::FourG,
            NetworkClass::FourG => NetworkClass::ThreeG,
            NetworkClass::ThreeG => NetworkClass::TwoG,
            NetworkClass::TwoG => NetworkClass::Slow2G,
            NetworkClass::Slow2G | NetworkClass::Offline => self,
        }
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "wifi" => Ok(NetworkClass::Fast),
            "4g" => Ok(NetworkClass::FourG),
            "3g" => Ok(NetworkClass::ThreeG),
            "2g" => Ok(NetworkClass::TwoG),
            "slow-2g" | "slow2g" => Ok(NetworkClass::Slow2G),
            "offline" => Ok(NetworkClass::Offline),
            other => Err(ConfigError::InvalidAdaptive(format!("unknown network class '{}'", other))),
        }
    }
}

/// Round-trip latency at or above which a connection is no better than the class.
const SLOW_2G_LATENCY: Duration = Duration::from_millis(2000);
const TWO_G_LATENCY: Duration = Duration::from_millis(1400);
const THREE_G_LATENCY: Duration = Duration::from_millis(270);
const FAST_LATENCY: Duration = Duration::from_millis(50);

const SLOW_2G_KBPS: u32 = 50;
const TWO_G_KBPS: u32 = 70;
const THREE_G_KBPS: u32 = 700;
const FAST_KBPS: u32 = 10_000;

/// Packet loss ratio from which a connection is demoted by one class.
const LOSSY: f64 = 0.05;

/// Latency, bandwidth and loss of the connection under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub class: NetworkClass,
    #[serde(rename = "latency_ms", with = "crate::duration_ms")]
    pub latency: Duration,
    pub download_kbps: u32,
    pub upload_kbps: u32,
    /// Fraction of packets lost, 0.0 to 1.0.
    pub packet_loss: f64,
}

impl NetworkProfile {
    fn preset(class: NetworkClass, latency_ms: u64, download_kbps: u32, upload_kbps: u32) -> Self {
        Self {
            class,
            latency: Duration::from_millis(latency_ms),
            download_kbps,
            upload_kbps,
            packet_loss: 0.0,
        }
    }

    pub fn fast() -> Self {
        Self::preset(NetworkClass::Fast, 20, 50_000, 20_000)
    }

    pub fn four_g() -> Self {
        Self::preset(NetworkClass::FourG, 100, 9_000, 9_000)
    }

    pub fn three_g() -> Self {
        Self::preset(NetworkClass::ThreeG, 400, 700, 400)
    }

    pub fn two_g() -> Self {
        Self::preset(NetworkClass::TwoG, 1600, 70, 30)
    }

    pub fn slow_2g() -> Self {
        Self::preset(NetworkClass::Slow2G, 2000, 50, 20)
    }

    pub fn offline() -> Self {
        Self {
            packet_loss: 1.0,
            ..Self::preset(NetworkClass::Offline, 0, 0, 0)
        }
    }

    /// Classify raw measurements into a profile.
    pub fn from_measurements(latency: Duration, download_kbps: u32, packet_loss: f64) -> Self {
        let class = if packet_loss >= 1.0 || download_kbps == 0 {
            NetworkClass::Offline
        } else {
            let class = if latency >= SLOW_2G_LATENCY || download_kbps <= SLOW_2G_KBPS {
                NetworkClass::Slow2G
            } else if latency >= TWO_G_LATENCY || download_kbps <= TWO_G_KBPS {
                NetworkClass::TwoG
            } else if latency >= THREE_G_LATENCY || download_kbps <= THREE_G_KBPS {
                NetworkClass::ThreeG
            } else if latency < FAST_LATENCY && download_kbps >= FAST_KBPS {
                NetworkClass::Fast
            } else {
                NetworkClass::FourG
            };
            if packet_loss >= LOSSY {
                class.degrade()
            } else {
                class
            }
        };

        Self {
            class,
            latency,
            download_kbps,
            // Upload is not measured; assume a symmetric link.
            upload_kbps: download_kbps,
            packet_loss: packet_loss.max(0.0).min(1.0),
        }
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::fast()
    }
}

/// Source of the current network profile.
pub trait NetworkConditions: fmt::Debug + Send + Sync {
    fn current(&self) -> NetworkProfile;
}

/// Always reports the same profile.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedNetwork(pub NetworkProfile);

impl NetworkConditions for FixedNetwork {
    fn current(&self) -> NetworkProfile {
        self.0.clone()
    }
}

/// A profile that tests can switch, e.g. to simulate a connection dropping to 2G.
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    profile: Mutex<NetworkProfile>,
}

impl SimulatedNetwork {
    pub fn new(profile: NetworkProfile) -> Self {
        Self {
            profile: Mutex::new(profile),
        }
    }

    pub fn set(&self, profile: NetworkProfile) {
        *self.profile.lock().unwrap_or_else(|e| e.into_inner()) = profile;
    }
}

impl NetworkConditions for SimulatedNetwork {
    fn current(&self) -> NetworkProfile {
        self.profile.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Multiplier learned from previous waits. 1.0 means "as expected".
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Reliability(pub f64);

impl Reliability {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Reliability {
    fn default() -> Self {
        Reliability(1.0)
    }
}

/// How a wait's result moves the reliability factor.
///
/// Each result picks a multiplier. The factor moves towards
/// `factor * multiplier` by `weight`: `1.0` applies the multiplier in full,
/// smaller values smooth the change over several waits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoothing {
    pub weight: f64,
    pub on_success: f64,
    pub on_slow_success: f64,
    pub on_timeout: f64,
    /// A success is slow when it used more than this fraction of its timeout.
    pub slow_ratio: f64,
    /// Lower bound for the factor.
    pub floor: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            weight: 0.3,
            on_success: 0.95,
            on_slow_success: 1.1,
            on_timeout: 1.25,
            slow_ratio: 0.5,
            floor: 0.5,
        }
    }
}

/// Base timeout scaled by network class and learned reliability.
///
/// # Example:
/// ```rust
/// use std::time::Duration;
/// use waitkit::network::{AdaptiveTimeout, NetworkProfile, Reliability};
///
/// # fn main() -> Result<(), waitkit::ConfigError> {
/// let adaptive = AdaptiveTimeout::new(Duration::from_secs(10));
/// let fast = adaptive.timeout_for(&NetworkProfile::fast(), Reliability::default())?;
/// let slow = adaptive.timeout_for(&NetworkProfile::slow_2g(), Reliability::default())?;
/// assert_eq!(fast, Duration::from_secs(10));
/// assert_eq!(slow, Duration::from_secs(50));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTimeout {
    #[serde(rename = "base_timeout_ms", with = "crate::duration_ms")]
    pub base_timeout: Duration,
    /// The effective timeout never exceeds `base_timeout * cap_multiple`.
    pub cap_multiple: f64,
    pub smoothing: Smoothing,
}

impl Default for AdaptiveTimeout {
    fn default() -> Self {
        Self::new(crate::wait::policy::DEFAULT_TIMEOUT)
    }
}

impl AdaptiveTimeout {
    pub fn new(base_timeout: Duration) -> Self {
        Self {
            base_timeout,
            cap_multiple: 5.0,
            smoothing: Smoothing::default(),
        }
    }

    pub fn with_cap(mut self, cap_multiple: f64) -> Self {
        self.cap_multiple = cap_multiple;
        self
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let s = &self.smoothing;
        let invalid = |what: &str| Err(ConfigError::InvalidAdaptive(what.to_string()));
        if self.base_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if !self.cap_multiple.is_finite() || self.cap_multiple < 1.0 {
            return invalid("cap multiple must be >= 1.0");
        }
        if !(s.weight > 0.0 && s.weight <= 1.0) {
            return invalid("smoothing weight must be in (0, 1]");
        }
        if ![s.on_success, s.on_slow_success, s.on_timeout].iter().all(|m| m.is_finite() && *m > 0.0) {
            return invalid("multipliers must be positive");
        }
        if !(s.slow_ratio > 0.0 && s.slow_ratio <= 1.0) {
            return invalid("slow ratio must be in (0, 1]");
        }
        if !(s.floor > 0.0 && s.floor <= self.cap_multiple) {
            return invalid("floor must be in (0, cap multiple]");
        }
        Ok(())
    }

    /// Multiplier for `class`, capped at `cap_multiple`.
    pub fn scaling_factor(&self, class: NetworkClass) -> f64 {
        class.scale().min(self.cap_multiple)
    }

    /// Effective timeout for the next wait.
    pub fn timeout_for(
        &self,
        profile: &NetworkProfile,
        reliability: Reliability,
    ) -> ConfigResult<Duration> {
        self.validate()?;
        let learned = self.clamp(reliability.0);
        let factor = (self.scaling_factor(profile.class) * learned).min(self.cap_multiple);
        Ok(scale_duration(self.base_timeout, factor))
    }

    /// `template` with its timeout replaced by [`timeout_for`](Self::timeout_for).
    pub fn policy_for(
        &self,
        template: &PollPolicy,
        profile: &NetworkProfile,
        reliability: Reliability,
    ) -> ConfigResult<PollPolicy> {
        let policy = template.clone().with_timeout(self.timeout_for(profile, reliability)?);
        policy.validate()?;
        Ok(policy)
    }

    /// Fold the result of a wait that ran with `timeout_used` into `reliability`.
    pub fn record<T>(
        &self,
        reliability: Reliability,
        outcome: &WaitOutcome<T>,
        timeout_used: Duration,
    ) -> Reliability {
        let s = &self.smoothing;
        let multiplier = match outcome {
            WaitOutcome::Success { elapsed, .. } => {
                if elapsed.as_secs_f64() > timeout_used.as_secs_f64() * s.slow_ratio {
                    s.on_slow_success
                } else {
                    s.on_success
                }
            }
            WaitOutcome::Failure(f) => match f.kind {
                FailureKind::Timeout | FailureKind::AllStrategiesExhausted => s.on_timeout,
                FailureKind::Permanent | FailureKind::Cancelled => 1.0,
            },
        };
        let old = reliability.0;
        Reliability(self.clamp(old * (1.0 + s.weight * (multiplier - 1.0))))
    }

    fn clamp(&self, factor: f64) -> f64 {
        if factor.is_nan() {
            return 1.0;
        }
        factor.max(self.smoothing.floor).min(self.cap_multiple)
    }
}

fn scale_duration(d: Duration, factor: f64) -> Duration {
    // Keeps from_secs_f64 clear of its overflow panic.
    const MAX_SECS: f64 = 1.0e12;
    Duration::from_secs_f64((d.as_secs_f64() * factor).min(MAX_SECS))
}
