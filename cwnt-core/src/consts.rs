//! 通用常量.

/// 配置键名. 通过 [`crate::params::Parameters::from_settings`] 读取松散类型配置时使用.
pub mod keys {
    /// 是否进行 3x3 中值滤波. `bool`.
    pub const DO_MEDIAN_FILTERING: &str = "DO_MEDIAN_FILTERING";

    /// 预滤波高斯核标准差. `float >= 0`.
    pub const SIGMA_FILTER: &str = "SIGMA_FILTER";

    /// 各向异性扩散迭代次数. `int >= 0`.
    pub const N_ANISOTROPIC_FILTERING: &str = "N_ANISOTROPIC_FILTERING";

    /// 各向异性扩散边缘阈值. `float > 0`.
    pub const KAPPA: &str = "KAPPA";

    /// 导数阶段的高斯核标准差. `float > 0`.
    pub const SIGMA_GRADIENT: &str = "SIGMA_GRADIENT";

    /// 掩膜函数偏置项.
    pub const GAMMA: &str = "GAMMA";

    /// 掩膜函数中梯度模的系数.
    pub const ALPHA: &str = "ALPHA";

    /// 掩膜函数中拉普拉斯的系数.
    pub const BETA: &str = "BETA";

    /// 掩膜函数中 Hessian 的系数.
    pub const EPSILON: &str = "EPSILON";

    /// 掩膜函数的缩放分母, 不能为 0.
    pub const DELTA: &str = "DELTA";

    /// Otsu 阈值缩放系数.
    pub const THRESHOLD_FACTOR: &str = "THRESHOLD_FACTOR";

    /// 分裂时是否改写标签体.
    pub const DO_DISPLAY_LABELS: &str = "DO_DISPLAY_LABELS";

    /// 多通道源数据中的目标通道.
    pub const TARGET_CHANNEL: &str = "TARGET_CHANNEL";

    /// 全部必需键, 按流程阶段排序.
    pub const ALL: [&str; 13] = [
        DO_MEDIAN_FILTERING,
        SIGMA_FILTER,
        N_ANISOTROPIC_FILTERING,
        KAPPA,
        SIGMA_GRADIENT,
        GAMMA,
        ALPHA,
        BETA,
        EPSILON,
        DELTA,
        THRESHOLD_FACTOR,
        DO_DISPLAY_LABELS,
        TARGET_CHANNEL,
    ];
}

/// 各参数默认值.
pub mod defaults {
    /// 默认不做中值滤波.
    pub const DO_MEDIAN_FILTERING: bool = false;

    /// 预滤波高斯核标准差.
    pub const SIGMA_FILTER: f64 = 0.5;

    /// 各向异性扩散迭代次数.
    pub const N_ANISOTROPIC_FILTERING: u32 = 5;

    /// 各向异性扩散边缘阈值.
    pub const KAPPA: f64 = 50.0;

    /// 导数阶段的高斯核标准差.
    pub const SIGMA_GRADIENT: f64 = 1.0;

    /// 掩膜函数系数 gamma.
    pub const GAMMA: f64 = 1.0;

    /// 掩膜函数系数 alpha.
    pub const ALPHA: f64 = 1.0;

    /// 掩膜函数系数 beta.
    pub const BETA: f64 = 1.0;

    /// 掩膜函数系数 epsilon.
    pub const EPSILON: f64 = 1.0;

    /// 掩膜函数系数 delta.
    pub const DELTA: f64 = 1.0;

    /// Otsu 阈值缩放系数.
    pub const THRESHOLD_FACTOR: f64 = 1.0;

    /// 默认不改写标签体.
    pub const DO_DISPLAY_LABELS: bool = false;

    /// 默认取第 0 个通道.
    pub const TARGET_CHANNEL: usize = 0;

    /// 体积上界 (体素个数). 不小于该值的连通域被丢弃.
    pub const VOLUME_UPPER: usize = 1000;

    /// 体积下界 (体素个数). 不大于该值的连通域被丢弃.
    pub const VOLUME_LOWER: usize = 0;

    /// 体积超过 `mean + STD_FACTOR * std` 的连通域被视为分裂候选.
    pub const STD_FACTOR: f64 = 0.5;

    /// k-means++ 默认随机种子.
    pub const KMEANS_SEED: u64 = 0x00C0_FFEE;
}

/// Perona-Malik 扩散的时间步长.
pub const DIFFUSION_RATE: f64 = 0.15;

/// Otsu 直方图的级数.
pub const OTSU_BINS: usize = 256;

/// 背景标签.
pub const BACKGROUND: u32 = 0;

/// 标签生成器产出的第一个标签.
pub const FIRST_LABEL: u32 = 1;

/// Lloyd 迭代的最大次数.
pub const KMEANS_MAX_ITERATIONS: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_keys_unique() {
        let mut k = keys::ALL.to_vec();
        k.sort_unstable();
        k.dedup();
        assert_eq!(k.len(), keys::ALL.len());
    }
}
