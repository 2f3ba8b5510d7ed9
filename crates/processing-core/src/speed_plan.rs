//! Where the global playback speed is applied.
//!
//! The speed change must hit every audio path exactly once. A [`SpeedPlan`]
//! is decided at the top of the pipeline and each stage asks it for its own
//! chain, so a stage cannot re-apply what an earlier stage already did.

use podreel_common::SpeedStage;

use crate::atempo::AtempoChain;

/// Pipeline stages that may retime audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Rendering one speech clip.
    SpeechClip,
    /// Mixing background music over the concatenated track.
    BgmMix,
    /// The final distribution encode.
    FinalEncode,
}

/// The single decision about which stage owns the speed change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedPlan {
    /// Speed is 1; no stage retimes anything.
    NotNeeded,
    /// Each speech clip is retimed while it is rendered.
    PerSegment(f64),
    /// Clips are rendered at 1x; the final encode retimes audio and video.
    AtFinalEncode(f64),
}

impl SpeedPlan {
    /// Decide the plan for a project speed and a configured stage.
    ///
    /// Invalid speeds are treated as 1.
    pub fn decide(speed: f64, stage: SpeedStage) -> Self {
        if AtempoChain::for_speed(speed).is_empty() {
            return Self::NotNeeded;
        }
        match stage {
            SpeedStage::PerSegment => Self::PerSegment(speed),
            SpeedStage::FinalEncode => Self::AtFinalEncode(speed),
        }
    }

    /// The requested speed (1 when not needed).
    pub fn speed(&self) -> f64 {
        match self {
            Self::NotNeeded => 1.0,
            Self::PerSegment(s) | Self::AtFinalEncode(s) => *s,
        }
    }

    /// The atempo chain a stage must apply. Empty for every stage but one.
    pub fn chain_for(&self, stage: Stage) -> AtempoChain {
        match (self, stage) {
            (Self::PerSegment(s), Stage::SpeechClip) => AtempoChain::for_speed(*s),
            (Self::AtFinalEncode(s), Stage::FinalEncode) => AtempoChain::for_speed(*s),
            _ => AtempoChain::identity(),
        }
    }

    /// Speed used when converting speech audio length to clip length.
    pub fn clip_speed(&self) -> f64 {
        match self {
            Self::PerSegment(s) => *s,
            _ => 1.0,
        }
    }

    /// Speed the final encode applies to video timestamps, if any.
    pub fn video_speed_at_encode(&self) -> Option<f64> {
        match self {
            Self::AtFinalEncode(s) => Some(*s),
            _ => None,
        }
    }

    /// Factor mapping clip-timeline seconds to output-file seconds.
    pub fn output_time_scale(&self) -> f64 {
        match self {
            Self::AtFinalEncode(s) => 1.0 / *s,
            _ => 1.0,
        }
    }
}
