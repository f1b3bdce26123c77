#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 实现 Crown-Wearing Nuclei Tracker (CWNT) 的单帧分割流程:
//! 输入一帧 2D/3D 荧光显微图像, 输出若干细胞核 (位置, 半径, 质量).
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 流程
//!
//! 各阶段严格按顺序执行, 后一阶段只消费前一阶段完整产出的缓冲区.
//!
//! ### 1. 像素滤波 ✅
//!
//! 可选 3x3 中值滤波, 然后逐切片高斯低通.
//!
//! 实现位于 `cwnt-core/src/filter`.
//!
//! ### 2. 各向异性扩散 ✅
//!
//! Perona-Malik 扩散, 逐切片迭代, 之后逐切片归一化到 `[0, 1]`.
//!
//! 实现位于 `cwnt-core/src/diffusion.rs`.
//!
//! ### 3. 导数 ✅
//!
//! 高斯平滑后的梯度模, 拉普拉斯 (只取正部), Hessian 行列式 (只取负部的绝对值).
//!
//! 实现位于 `cwnt-core/src/derivative.rs`.
//!
//! ### 4. "皇冠" 掩膜 ✅
//!
//! 以双曲正切组合上面三个量, 得到 `[0, 1]` 之间的软掩膜, 再与滤波图像相乘.
//!
//! 实现位于 `cwnt-core/src/mask.rs`, 分步执行器位于 `cwnt-core/src/masker.rs`.
//!
//! ### 5. Otsu 阈值 ✅
//!
//! 逐切片 256 级直方图 Otsu 二值化, 阈值乘以用户系数.
//!
//! 实现位于 `cwnt-core/src/threshold.rs`.
//!
//! ### 6. 6-连通域标记 ✅
//!
//! 实现位于 `cwnt-core/src/labeling.rs`.
//!
//! ### 7. 细胞核分裂 ✅
//!
//! 体积统计筛选, 位置直方图峰计数估计分裂数, 在物理坐标上做 k-means++ 聚类.
//!
//! 实现位于 `cwnt-core/src/split`.
//!
//! # 约定
//!
//! 1. 所有体数据按照 `(z, h, w)` 组织. `h` 对应物理 `y` 轴, `w` 对应物理 `x` 轴.
//! 2. 像素在进入流程时即被转换为 `f32`, 之后不再区分原始像素类型.
//! 3. 配置错误与内存分配失败以 `Err` 返回, 不会 panic.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 体数据, 标签, 物理标定等基础数据结构.
mod data;

pub use data::{phantom, Blob, Calibration, LabelGenerator, LabelVolume, Pixel, VolumeBuffer};

mod exec;

pub mod consts;
pub mod derivative;
pub mod diffusion;
pub mod error;
pub mod filter;
pub mod labeling;
pub mod mask;
pub mod masker;
pub mod params;
pub mod prelude;
pub mod segmenter;
pub mod split;
pub mod spot;
pub mod threshold;
