//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{Blob, Calibration, LabelGenerator, LabelVolume, Pixel, VolumeBuffer};

pub use crate::error::{ConfigError, ConfigIssue, SegmentError, SegmentResult};
pub use crate::params::{Parameters, SettingValue};

pub use crate::masker::{NucleiMasker, Step};
pub use crate::segmenter::{CrownWearingSegmenter, FrameResult};
pub use crate::split::{NucleiSplitter, SplitterOptions};
pub use crate::spot::Spot;
