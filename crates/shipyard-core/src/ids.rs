use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{value:?} is not a valid {kind} id")]
pub struct ParseIdError {
    pub kind: &'static str,
    pub value: String,
}

const SEQUENCE_BITS: u32 = 12;

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Returns a process-unique, monotonically increasing id: milliseconds since the
/// epoch in the high bits with a sequence in the low `SEQUENCE_BITS`.
pub fn new_id() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();
    let candidate = millis << SEQUENCE_BITS;

    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = if candidate > last { candidate } else { last + 1 };
        match LAST_ID.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal, $kind:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new() -> Self {
                Self(new_id())
            }

            pub fn from_value(value: u64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let invalid = || ParseIdError {
                    kind: $kind,
                    value: s.to_string(),
                };

                let digits = s.strip_prefix(Self::PREFIX).ok_or_else(invalid)?;
                let value: u64 = digits.parse().map_err(|_| invalid())?;

                // only the canonical rendering parses, so formatting a parsed id gives back the input
                if value.to_string() != digits {
                    return Err(invalid());
                }

                Ok(Self(value))
            }
        }
    };
}

prefixed_id!(DeployableGroupId, "deployableGroup_", "deployable group");
prefixed_id!(EnvironmentId, "environment_", "environment");
prefixed_id!(DeployableId, "deployable_", "deployable");
prefixed_id!(EnvironmentConfigId, "environmentConfig_", "environment config");
prefixed_id!(DeployableConfigId, "deployableConfig_", "deployable config");
prefixed_id!(DeployableVectorId, "deployableVector_", "deployable vector");
prefixed_id!(DeploymentId, "deployment_", "deployment");
