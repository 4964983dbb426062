use crate::{env_lookup, parsed};
use std::time::Duration;

/// `RATINGS_RECONCILE_INTERVAL_SECS` enables a periodic sweep that
/// recomputes every tour's rating summary. Unset or `0` disables it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RatingsConfig {
    pub reconcile_interval: Option<Duration>,
}

impl RatingsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            reconcile_interval: parsed::<u64, _>(lookup, "RATINGS_RECONCILE_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_from;

    #[test]
    fn test_sweep_interval() {
        let off = RatingsConfig::from_lookup(&lookup_from(&[("RATINGS_RECONCILE_INTERVAL_SECS", "0")]));
        assert_eq!(off.reconcile_interval, None);

        let on = RatingsConfig::from_lookup(&lookup_from(&[("RATINGS_RECONCILE_INTERVAL_SECS", "60")]));
        assert_eq!(on.reconcile_interval, Some(Duration::from_secs(60)));
    }
}
