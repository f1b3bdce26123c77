//! 分步执行前四个阶段, 并保留全部中间结果.
//!
//! 典型用法是交互式调参: 修改参数后只需从受影响的那一步重新执行.
//!
//! ```
//! use cwnt_core::masker::{NucleiMasker, Step};
//! use cwnt_core::params::Parameters;
//! use cwnt_core::{phantom, Calibration, VolumeBuffer};
//!
//! let pixels = phantom::spheres::<u8>((3, 20, 20), &[(1, 10, 10)], 5, 200);
//! let source = VolumeBuffer::from_pixels(pixels.view(), Calibration::unit());
//! let mut masker = NucleiMasker::new(&source, &Parameters::default()).unwrap();
//! masker.process().unwrap();
//!
//! let changed = Parameters {
//!     gamma: 2.0,
//!     ..Default::default()
//! };
//! assert_eq!(masker.update(&changed).unwrap(), Some(Step::Mask));
//! assert!(masker.masked().is_none());
//! masker.process_from(Step::Mask).unwrap();
//! assert_eq!(masker.masked().unwrap().shape(), (3, 20, 20));
//! ```

use std::time::Instant;

use log::debug;

use crate::derivative::Derivatives;
use crate::diffusion::Diffused;
use crate::error::{ConfigError, SegmentResult};
use crate::mask::MaskBuilder;
use crate::params::{Parameters, Stages};
use crate::VolumeBuffer;

/// 掩膜流程的四步, 按执行顺序排列.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// 像素滤波.
    Filter,

    /// 各向异性扩散与归一化.
    Diffuse,

    /// 梯度模, 拉普拉斯, Hessian.
    Derivatives,

    /// 计算掩膜并与滤波图像相乘.
    Mask,
}

impl Step {
    /// 全部步骤, 按执行顺序.
    pub const ALL: [Step; 4] = [Step::Filter, Step::Diffuse, Step::Derivatives, Step::Mask];
}

/// 分步掩膜器. 持有源数据的引用, 各步结果按需保存.
pub struct NucleiMasker<'a> {
    source: &'a VolumeBuffer,
    parameters: Parameters,
    stages: Stages,

    filtered: Option<VolumeBuffer>,
    diffused: Option<Diffused>,
    derivatives: Option<Derivatives>,
    mask: Option<VolumeBuffer>,
    masked: Option<VolumeBuffer>,
}

impl<'a> NucleiMasker<'a> {
    /// 以给定参数创建. 参数不合法时返回全部问题.
    pub fn new(source: &'a VolumeBuffer, parameters: &Parameters) -> Result<Self, ConfigError> {
        Ok(Self {
            source,
            parameters: parameters.clone(),
            stages: Stages::new(parameters)?,
            filtered: None,
            diffused: None,
            derivatives: None,
            mask: None,
            masked: None,
        })
    }

    /// 当前参数.
    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// 替换参数, 返回第一个受影响的步骤. 该步骤及其之后的结果被清除.
    ///
    /// 只改动了阈值, 显示或通道等与掩膜无关的参数时, 返回 `None` 且不清除任何结果.
    /// 参数不合法时不做任何改动.
    pub fn update(&mut self, parameters: &Parameters) -> Result<Option<Step>, ConfigError> {
        let stages = Stages::new(parameters)?;
        let (old, new) = (&self.parameters, parameters);
        let first = if old.do_median_filtering != new.do_median_filtering
            || old.gaussian_filter_sigma != new.gaussian_filter_sigma
        {
            Some(Step::Filter)
        } else if old.anisotropic_iterations != new.anisotropic_iterations
            || old.kappa != new.kappa
        {
            Some(Step::Diffuse)
        } else if old.gradient_sigma != new.gradient_sigma {
            Some(Step::Derivatives)
        } else if old.mask_coefficients() != new.mask_coefficients() {
            Some(Step::Mask)
        } else {
            None
        };

        self.parameters = parameters.clone();
        self.stages = stages;
        if let Some(step) = first {
            self.invalidate(step);
        }
        Ok(first)
    }

    /// 清除 `step` 及其之后各步的结果.
    pub fn invalidate(&mut self, step: Step) {
        if step <= Step::Filter {
            self.filtered = None;
        }
        if step <= Step::Diffuse {
            self.diffused = None;
        }
        if step <= Step::Derivatives {
            self.derivatives = None;
        }
        self.mask = None;
        self.masked = None;
    }

    /// `step` 的输入是否都已就绪?
    pub fn is_ready(&self, step: Step) -> bool {
        match step {
            Step::Filter => true,
            Step::Diffuse => self.filtered.is_some(),
            Step::Derivatives => self.diffused.is_some(),
            Step::Mask => self.derivatives.is_some() && self.filtered.is_some(),
        }
    }

    /// `step` 是否已经执行完毕, 且结果仍然有效?
    pub fn is_done(&self, step: Step) -> bool {
        match step {
            Step::Filter => self.filtered.is_some(),
            Step::Diffuse => self.diffused.is_some(),
            Step::Derivatives => self.derivatives.is_some(),
            Step::Mask => self.masked.is_some(),
        }
    }

    /// 执行单步. 输入未就绪时什么也不做, 返回 `Ok(false)`.
    ///
    /// 执行某一步会清除其之后各步的结果.
    pub fn exec_step(&mut self, step: Step) -> SegmentResult<bool> {
        if !self.is_ready(step) {
            return Ok(false);
        }
        let t = Instant::now();
        self.invalidate(step);
        match step {
            Step::Filter => {
                self.filtered = Some(self.stages.filter.apply(self.source)?);
            }
            Step::Diffuse => {
                if let Some(filtered) = self.filtered.as_ref() {
                    self.diffused = Some(self.stages.diffuser.apply(filtered)?);
                }
            }
            Step::Derivatives => {
                if let Some(d) = self.diffused.as_ref() {
                    self.derivatives = Some(self.stages.derivatives.compute(&d.normalized)?);
                }
            }
            Step::Mask => {
                if let (Some(d), Some(filtered)) = (self.derivatives.as_ref(), self.filtered.as_ref())
                {
                    let mask = self.stages.mask.build(d)?;
                    self.masked = Some(MaskBuilder::apply(filtered, &mask)?);
                    self.mask = Some(mask);
                }
            }
        }
        debug!("masker: step {step:?} done in {:?}", t.elapsed());
        Ok(true)
    }

    /// 从 `step` 开始执行到最后一步.
    ///
    /// 如果 `step` 之前有尚未执行的步骤, 则从其中最早的一步开始.
    pub fn process_from(&mut self, step: Step) -> SegmentResult<()> {
        let start = Step::ALL
            .into_iter()
            .find(|&s| s >= step || !self.is_done(s))
            .unwrap_or(step);
        for s in Step::ALL.into_iter().filter(|&s| s >= start) {
            self.exec_step(s)?;
        }
        Ok(())
    }

    /// 执行全部四步.
    #[inline]
    pub fn process(&mut self) -> SegmentResult<()> {
        self.process_from(Step::Filter)
    }

    /// 源数据.
    #[inline]
    pub fn source(&self) -> &VolumeBuffer {
        self.source
    }

    /// 第一步: 滤波图像.
    #[inline]
    pub fn filtered(&self) -> Option<&VolumeBuffer> {
        self.filtered.as_ref()
    }

    /// 第二步: 扩散后, 归一化前.
    #[inline]
    pub fn anisotropic_raw(&self) -> Option<&VolumeBuffer> {
        self.diffused.as_ref().map(|d| &d.raw)
    }

    /// 第二步: 逐切片归一化后.
    #[inline]
    pub fn normalized(&self) -> Option<&VolumeBuffer> {
        self.diffused.as_ref().map(|d| &d.normalized)
    }

    /// 第三步: 梯度模.
    #[inline]
    pub fn gradient_norm(&self) -> Option<&VolumeBuffer> {
        self.derivatives.as_ref().map(|d| &d.gradient_norm)
    }

    /// 第三步: 拉普拉斯正部.
    #[inline]
    pub fn laplacian(&self) -> Option<&VolumeBuffer> {
        self.derivatives.as_ref().map(|d| &d.laplacian)
    }

    /// 第三步: Hessian 行列式负部的绝对值.
    #[inline]
    pub fn hessian(&self) -> Option<&VolumeBuffer> {
        self.derivatives.as_ref().map(|d| &d.hessian)
    }

    /// 第四步: 掩膜.
    #[inline]
    pub fn mask(&self) -> Option<&VolumeBuffer> {
        self.mask.as_ref()
    }

    /// 第四步: 掩膜后的图像, 即阈值阶段的输入.
    #[inline]
    pub fn masked(&self) -> Option<&VolumeBuffer> {
        self.masked.as_ref()
    }

    /// 取走掩膜后的图像.
    #[inline]
    pub fn into_masked(self) -> Option<VolumeBuffer> {
        self.masked
    }
}
