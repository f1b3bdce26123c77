//! 完整的单帧分割流程, 以及多帧并行分割.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::SegmentResult;
use crate::labeling::label_components;
use crate::mask::MaskBuilder;
use crate::params::{Parameters, Stages};
use crate::split::{NucleiSplitter, SplitterOptions};
use crate::spot::Spot;
use crate::{LabelGenerator, LabelVolume, VolumeBuffer};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
        use rayon::{ThreadPool, ThreadPoolBuilder};

        use crate::error::SegmentError;
    }
}

/// 单帧分割结果.
#[derive(Debug)]
pub struct FrameResult {
    /// 细胞核. 顺序见 [`NucleiSplitter::process`].
    pub spots: Vec<Spot>,

    /// 标签体. 只有启用 `do_display_labels` 时才反映丢弃与分裂.
    pub labels: LabelVolume,

    /// 本帧使用的标签生成器, 可继续用于产生不冲突的标签.
    pub generator: LabelGenerator,

    /// 本帧耗时.
    pub elapsed: Duration,
}

/// 分割器. 参数在创建时校验一次, 之后可用于任意多帧.
pub struct CrownWearingSegmenter {
    parameters: Parameters,
    stages: Stages,
    splitter: SplitterOptions,
    #[cfg(feature = "rayon")]
    pool: ThreadPool,
}

impl CrownWearingSegmenter {
    /// 以给定参数创建, 使用默认线程数.
    pub fn new(parameters: Parameters) -> SegmentResult<Self> {
        Self::with_threads(parameters, 0)
    }

    /// 以给定参数与线程数创建. `threads == 0` 表示使用全部可用核心.
    ///
    /// 未启用 `rayon` feature 时 `threads` 被忽略.
    pub fn with_threads(parameters: Parameters, threads: usize) -> SegmentResult<Self> {
        let stages = Stages::new(&parameters)?;
        #[cfg(not(feature = "rayon"))]
        let _ = threads;
        Ok(Self {
            parameters,
            stages,
            splitter: SplitterOptions::default(),
            #[cfg(feature = "rayon")]
            pool: build_pool(threads)?,
        })
    }

    /// 替换分裂参数.
    #[inline]
    pub fn with_splitter_options(mut self, options: SplitterOptions) -> Self {
        self.splitter = options;
        self
    }

    /// 当前参数.
    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// 当前分裂参数.
    #[inline]
    pub fn splitter_options(&self) -> &SplitterOptions {
        &self.splitter
    }

    /// 分割一帧.
    pub fn segment(&self, source: &VolumeBuffer) -> SegmentResult<FrameResult> {
        self.install(|| self.segment_frame(source))
    }

    /// 分割互相独立的多帧. 每帧各自返回结果, 某一帧失败不影响其余帧.
    #[cfg(feature = "rayon")]
    pub fn segment_frames(&self, frames: &[VolumeBuffer]) -> Vec<SegmentResult<FrameResult>> {
        self.install(|| frames.par_iter().map(|f| self.segment_frame(f)).collect())
    }

    /// 分割互相独立的多帧. 每帧各自返回结果, 某一帧失败不影响其余帧.
    #[cfg(not(feature = "rayon"))]
    pub fn segment_frames(&self, frames: &[VolumeBuffer]) -> Vec<SegmentResult<FrameResult>> {
        frames.iter().map(|f| self.segment_frame(f)).collect()
    }

    #[cfg(feature = "rayon")]
    fn install<R: Send, F: FnOnce() -> R + Send>(&self, op: F) -> R {
        self.pool.install(op)
    }

    #[cfg(not(feature = "rayon"))]
    fn install<R, F: FnOnce() -> R>(&self, op: F) -> R {
        op()
    }

    fn segment_frame(&self, source: &VolumeBuffer) -> SegmentResult<FrameResult> {
        let t = Instant::now();
        let s = &self.stages;

        let filtered = s.filter.apply(source)?;
        let masked = {
            let diffused = s.diffuser.apply(&filtered)?;
            let derivatives = s.derivatives.compute(&diffused.normalized)?;
            let mask = s.mask.build(&derivatives)?;
            MaskBuilder::apply(&filtered, &mask)?
        };
        drop(filtered);

        let binary = s.otsu.threshold(&masked)?;
        drop(masked);

        let generator = LabelGenerator::new();
        let mut labels = label_components(binary.view(), &generator)?;
        drop(binary);
        debug!("segmenter: masking and labeling done in {:?}", t.elapsed());

        let spots = NucleiSplitter::new(
            &mut labels,
            *source.calibration(),
            &generator,
            self.parameters.do_display_labels,
        )
        .with_options(self.splitter)
        .process();

        let elapsed = t.elapsed();
        info!(
            "segmented frame of shape {:?}: {} spots in {:?}",
            source.shape(),
            spots.len(),
            elapsed
        );
        Ok(FrameResult {
            spots,
            labels,
            generator,
            elapsed,
        })
    }
}

#[cfg(feature = "rayon")]
fn build_pool(threads: usize) -> SegmentResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cwnt-worker-{i}"))
        .build()
        .map_err(|_| SegmentError::Resource {
            context: "thread pool",
            bytes: 0,
        })
}
