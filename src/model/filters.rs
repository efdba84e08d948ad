use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audio filters applied by the node.
///
/// A value of this type is a patch: unset fields are left untouched when merged
/// over another set of filters with [`Filters::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<Band>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<Karaoke>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<Timescale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<Oscillation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<Oscillation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distortion: Option<Distortion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_mix: Option<ChannelMix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_pass: Option<LowPass>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub plugin_filters: Map<String, Value>
}

/// A single equalizer band, `band` goes from 0 to 14 and `gain` from -0.25 to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub band: u8,
    pub gain: f32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Karaoke {
    pub level: f32,
    pub mono_level: f32,
    pub filter_band: f32,
    pub filter_width: f32
}

/// Speed, pitch and rate changes. Unset values are kept when merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timescale {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>
}

/// Used for both tremolo and vibrato.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    pub frequency: f32,
    pub depth: f32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub rotation_hz: f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distortion {
    pub sin_offset: f32,
    pub sin_scale: f32,
    pub cos_offset: f32,
    pub cos_scale: f32,
    pub tan_offset: f32,
    pub tan_scale: f32,
    pub offset: f32,
    pub scale: f32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMix {
    pub left_to_left: f32,
    pub left_to_right: f32,
    pub right_to_left: f32,
    pub right_to_right: f32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPass {
    pub smoothing: f32
}

impl Timescale {
    fn merge(self, patch: Self) -> Self {
        Self {
            speed: patch.speed.or(self.speed),
            pitch: patch.pitch.or(self.pitch),
            rate: patch.rate.or(self.rate)
        }
    }
}

impl Filters {
    /// Returns a new set of filters with every field set in `patch` replacing the
    /// one in `self`. Timescale values are merged one by one.
    pub fn merge(&self, patch: Filters) -> Filters {
        let mut plugin_filters = self.plugin_filters.clone();
        plugin_filters.extend(patch.plugin_filters);

        Filters {
            volume: patch.volume.or(self.volume),
            equalizer: patch.equalizer.or_else(|| self.equalizer.clone()),
            karaoke: patch.karaoke.or(self.karaoke),
            timescale: match (self.timescale, patch.timescale) {
                (Some(current), Some(patch)) => Some(current.merge(patch)),
                (current, patch) => patch.or(current)
            },
            tremolo: patch.tremolo.or(self.tremolo),
            vibrato: patch.vibrato.or(self.vibrato),
            rotation: patch.rotation.or(self.rotation),
            distortion: patch.distortion.or(self.distortion),
            channel_mix: patch.channel_mix.or(self.channel_mix),
            low_pass: patch.low_pass.or(self.low_pass),
            plugin_filters
        }
    }

    /// Boosts the lower equalizer bands, `gain` is clamped to the range accepted by the node.
    pub fn bass_boost(gain: f32) -> Self {
        let gain = gain.clamp(-0.25, 1.0);
        let bands = [(0, gain), (1, gain), (2, gain * 0.75), (3, gain * 0.5), (4, gain * 0.25)]
            .into_iter()
            .map(|(band, gain)| Band { band, gain })
            .collect();

        Self {
            equalizer: Some(bands),
            ..Default::default()
        }
    }

    pub fn nightcore() -> Self {
        Self::with_timescale(1.3, 1.3, 1.0)
    }

    pub fn vaporwave() -> Self {
        Self::with_timescale(0.85, 0.8, 1.0)
    }

    pub fn karaoke() -> Self {
        Self {
            karaoke: Some(Karaoke {
                level: 1.0,
                mono_level: 1.0,
                filter_band: 220.0,
                filter_width: 100.0
            }),
            ..Default::default()
        }
    }

    /// Rotates the audio around the listener.
    pub fn eight_d() -> Self {
        Self {
            rotation: Some(Rotation { rotation_hz: 0.2 }),
            ..Default::default()
        }
    }

    pub fn tremolo(frequency: f32, depth: f32) -> Self {
        Self {
            tremolo: Some(Oscillation { frequency, depth }),
            ..Default::default()
        }
    }

    pub fn vibrato(frequency: f32, depth: f32) -> Self {
        Self {
            vibrato: Some(Oscillation { frequency, depth }),
            ..Default::default()
        }
    }

    pub fn speed(speed: f64) -> Self {
        Self::timescale_patch(Timescale { speed: Some(speed), ..Default::default() })
    }

    pub fn pitch(pitch: f64) -> Self {
        Self::timescale_patch(Timescale { pitch: Some(pitch), ..Default::default() })
    }

    pub fn rate(rate: f64) -> Self {
        Self::timescale_patch(Timescale { rate: Some(rate), ..Default::default() })
    }

    fn with_timescale(speed: f64, pitch: f64, rate: f64) -> Self {
        Self::timescale_patch(Timescale {
            speed: Some(speed),
            pitch: Some(pitch),
            rate: Some(rate)
        })
    }

    fn timescale_patch(timescale: Timescale) -> Self {
        Self {
            timescale: Some(timescale),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn presets_keep_unrelated_fields() {
        let filters = Filters::default()
            .merge(Filters::karaoke())
            .merge(Filters::eight_d())
            .merge(Filters::nightcore());

        assert!(filters.karaoke.is_some());
        assert!(filters.rotation.is_some());
        assert_eq!(filters.timescale.unwrap().speed, Some(1.3));
    }

    #[test]
    fn timescale_presets_overwrite_each_other() {
        let filters = Filters::nightcore().merge(Filters::vaporwave());
        let timescale = filters.timescale.unwrap();

        assert_eq!(timescale.speed, Some(0.85));
        assert_eq!(timescale.pitch, Some(0.8));
        assert_eq!(timescale.rate, Some(1.0));
    }

    #[test]
    fn independent_speed_keeps_pitch() {
        let filters = Filters::vaporwave().merge(Filters::speed(2.0));
        let timescale = filters.timescale.unwrap();

        assert_eq!(timescale.speed, Some(2.0));
        assert_eq!(timescale.pitch, Some(0.8));
    }

    #[test]
    fn merge_does_not_mutate_base() {
        let base = Filters::karaoke();
        let _ = base.merge(Filters::tremolo(2.0, 0.5));

        assert!(base.tremolo.is_none());
    }

    #[test]
    fn bass_boost_clamps_gain() {
        let bands = Filters::bass_boost(4.0).equalizer.unwrap();

        assert_eq!(bands[0], Band { band: 0, gain: 1.0 });
        assert_eq!(bands.len(), 5);
    }

    #[test]
    fn serializes_only_set_fields() {
        let value = serde_json::to_value(Filters::speed(1.5)).unwrap();

        assert_eq!(value, json!({ "timescale": { "speed": 1.5 } }));
    }
}
