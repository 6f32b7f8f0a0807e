//! Bounded meter channels and their clamp-on-update arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Lowest value any meter channel can hold.
pub const METER_MIN: i64 = 0;
/// Highest value any meter channel can hold.
pub const METER_MAX: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterError {
    #[error("unknown meter channel '{0}'")]
    UnknownChannel(String),
    #[error("meter '{channel}' starts at {value}, outside 0..=100")]
    OutOfRange { channel: String, value: i64 },
}

/// A complete mapping of channel names to values in `0..=100`.
///
/// The channel set is fixed when the vector is built; applying a delta
/// never adds or removes channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i64>", into = "BTreeMap<String, i64>")]
pub struct MeterVector {
    channels: BTreeMap<String, u8>,
}

/// A partial mapping of channel names to signed adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterDelta(pub BTreeMap<String, i64>);

impl MeterVector {
    /// Build a vector from `(channel, value)` pairs. Values must already be
    /// inside the meter bounds; saturation only happens through deltas.
    pub fn new<I, S>(channels: I) -> Result<MeterVector, MeterError>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (channel, value) in channels {
            let channel = channel.into();
            if !(METER_MIN..=METER_MAX).contains(&value) {
                return Err(MeterError::OutOfRange { channel, value });
            }
            map.insert(channel, value as u8);
        }
        Ok(MeterVector { channels: map })
    }

    /// Current value of a channel, if the channel exists.
    pub fn get(&self, channel: &str) -> Option<i64> {
        self.channels.get(channel).map(|v| i64::from(*v))
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel names in sorted order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// `(channel, value)` pairs in sorted channel order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.channels
            .iter()
            .map(|(k, v)| (k.as_str(), i64::from(*v)))
    }

    /// Return a new vector with `delta` summed in and every touched channel
    /// clamped to `0..=100`. Channels absent from the delta pass through.
    ///
    /// Fails without producing anything if the delta names a channel this
    /// vector does not have.
    pub fn apply_delta(&self, delta: &MeterDelta) -> Result<MeterVector, MeterError> {
        self.check_delta(delta)?;
        let mut next = self.clone();
        for (channel, change) in &delta.0 {
            if let Some(value) = next.channels.get_mut(channel) {
                let summed = i64::from(*value).saturating_add(*change);
                *value = summed.clamp(METER_MIN, METER_MAX) as u8;
            }
        }
        Ok(next)
    }

    /// Verify every channel named by `delta` exists in this vector.
    pub fn check_delta(&self, delta: &MeterDelta) -> Result<(), MeterError> {
        for channel in delta.0.keys() {
            if !self.contains(channel) {
                return Err(MeterError::UnknownChannel(channel.clone()));
            }
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, i64>> for MeterVector {
    type Error = MeterError;

    fn try_from(map: BTreeMap<String, i64>) -> Result<Self, Self::Error> {
        MeterVector::new(map)
    }
}

impl From<MeterVector> for BTreeMap<String, i64> {
    fn from(vector: MeterVector) -> Self {
        vector
            .channels
            .into_iter()
            .map(|(k, v)| (k, i64::from(v)))
            .collect()
    }
}

impl fmt::Display for MeterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (channel, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{channel}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl MeterDelta {
    pub fn new<I, S>(entries: I) -> MeterDelta
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        MeterDelta(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn energy(value: i64) -> MeterVector {
        MeterVector::new([("energy", value), ("income", 50)]).unwrap()
    }

    #[test]
    fn apply_delta_sums_touched_channels() {
        let next = energy(50).apply_delta(&MeterDelta::new([("energy", 10)])).unwrap();
        assert_eq!(next.get("energy"), Some(60));
        assert_eq!(next.get("income"), Some(50));
    }

    #[test]
    fn apply_delta_is_pure() {
        let start = energy(50);
        let delta = MeterDelta::new([("energy", -10)]);
        let a = start.apply_delta(&delta).unwrap();
        let b = start.apply_delta(&delta).unwrap();
        assert_eq!(a, b);
        assert_eq!(start.get("energy"), Some(50));
    }

    #[test]
    fn large_negative_delta_clamps_to_zero() {
        let next = energy(5).apply_delta(&MeterDelta::new([("energy", -1000)])).unwrap();
        assert_eq!(next.get("energy"), Some(0));
    }

    #[test]
    fn large_positive_delta_clamps_to_hundred() {
        let next = energy(95).apply_delta(&MeterDelta::new([("energy", i64::MAX)])).unwrap();
        assert_eq!(next.get("energy"), Some(100));
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let err = energy(50)
            .apply_delta(&MeterDelta::new([("energy", 5), ("morale", 5)]))
            .unwrap_err();
        assert_eq!(err, MeterError::UnknownChannel("morale".to_string()));
    }

    #[test]
    fn channel_set_never_changes() {
        let start = energy(50);
        let next = start.apply_delta(&MeterDelta::new([("income", -70)])).unwrap();
        assert_eq!(
            start.channels().collect::<Vec<_>>(),
            next.channels().collect::<Vec<_>>()
        );
    }

    #[test]
    fn out_of_range_initial_value_rejected() {
        assert!(matches!(
            MeterVector::new([("energy", 101)]),
            Err(MeterError::OutOfRange { value: 101, .. })
        ));
        assert!(MeterVector::new([("energy", -1)]).is_err());
    }

    #[test]
    fn every_result_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let start = energy(rng.gen_range(0..=100));
            let delta = MeterDelta::new([
                ("energy", rng.gen_range(-500..=500)),
                ("income", rng.gen_range(-150..=150)),
            ]);
            let next = start.apply_delta(&delta).unwrap();
            for (_, value) in next.iter() {
                assert!((METER_MIN..=METER_MAX).contains(&value));
            }
        }
    }

    #[test]
    fn ron_rejects_out_of_range_values() {
        let ok: MeterVector = ron::from_str(r#"{"energy": 40}"#).unwrap();
        assert_eq!(ok.get("energy"), Some(40));
        assert!(ron::from_str::<MeterVector>(r#"{"energy": 140}"#).is_err());
    }

    #[test]
    fn display_lists_channels_in_order() {
        assert_eq!(energy(12).to_string(), "energy=12, income=50");
    }
}
