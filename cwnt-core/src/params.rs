//! 用户配置.
//!
//! 两种来源:
//!
//! 1. 直接构造 [`Parameters`] (或从 `Default` 修改), 然后调用 [`Parameters::validate`];
//! 2. 从松散类型的键值表读取, 见 [`Parameters::from_settings`]. 十三个键全部必需.
//!
//! 两种方式都会一次性报告全部问题, 而不是遇到第一个就返回.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{defaults, keys};
use crate::derivative::DerivativeEngine;
use crate::diffusion::AnisotropicDiffuser;
use crate::error::{ConfigError, ConfigIssue};
use crate::filter::PixelFilter;
use crate::mask::{MaskBuilder, MaskCoefficients};
use crate::threshold::OtsuThresholder2D;

/// 松散类型的配置值.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    /// 布尔值.
    Bool(bool),

    /// 整数. 期望浮点数的地方也接受整数.
    Int(i64),

    /// 浮点数.
    Double(f64),
}

impl SettingValue {
    fn as_bool(&self) -> Option<bool> {
        match *self {
            SettingValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            SettingValue::Int(i) => Some(i as f64),
            SettingValue::Double(d) => Some(d),
            SettingValue::Bool(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            SettingValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Int(i)
    }
}

impl From<f64> for SettingValue {
    fn from(d: f64) -> Self {
        SettingValue::Double(d)
    }
}

/// 分割流程的全部用户参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameters {
    /// 是否先做 3x3 中值滤波.
    pub do_median_filtering: bool,

    /// 预滤波高斯核标准差, `>= 0`.
    pub gaussian_filter_sigma: f64,

    /// 各向异性扩散迭代次数.
    pub anisotropic_iterations: u32,

    /// 各向异性扩散边缘阈值, `> 0`.
    pub kappa: f64,

    /// 导数阶段的高斯核标准差, `> 0`.
    pub gradient_sigma: f64,

    /// 掩膜函数偏置项.
    pub gamma: f64,

    /// 梯度模系数.
    pub alpha: f64,

    /// 拉普拉斯系数.
    pub beta: f64,

    /// Hessian 系数.
    pub epsilon: f64,

    /// 缩放分母, `!= 0`.
    pub delta: f64,

    /// Otsu 阈值缩放系数.
    pub threshold_factor: f64,

    /// 分裂时是否改写标签体.
    pub do_display_labels: bool,

    /// 多通道源数据中的目标通道.
    pub target_channel: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            do_median_filtering: defaults::DO_MEDIAN_FILTERING,
            gaussian_filter_sigma: defaults::SIGMA_FILTER,
            anisotropic_iterations: defaults::N_ANISOTROPIC_FILTERING,
            kappa: defaults::KAPPA,
            gradient_sigma: defaults::SIGMA_GRADIENT,
            gamma: defaults::GAMMA,
            alpha: defaults::ALPHA,
            beta: defaults::BETA,
            epsilon: defaults::EPSILON,
            delta: defaults::DELTA,
            threshold_factor: defaults::THRESHOLD_FACTOR,
            do_display_labels: defaults::DO_DISPLAY_LABELS,
            target_channel: defaults::TARGET_CHANNEL,
        }
    }
}

impl Parameters {
    /// 检查取值范围, 返回全部问题.
    ///
    /// 判据与各阶段构造函数一致: 能通过校验的参数一定能构造出全部阶段.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Stages::new(self).map(drop)
    }

    /// 掩膜函数系数.
    pub fn mask_coefficients(&self) -> Result<MaskCoefficients, Vec<ConfigIssue>> {
        MaskCoefficients::new(self.gamma, self.alpha, self.beta, self.epsilon, self.delta)
    }

    /// 从键值表读取. 键名见 [`crate::consts::keys`].
    ///
    /// 报告缺失的键, 类型不符的值, 负的整数, 以及不认识的键.
    /// 读取成功后还会做一次 [`Parameters::validate`].
    pub fn from_settings(settings: &BTreeMap<String, SettingValue>) -> Result<Self, ConfigError> {
        let mut reader = SettingsReader {
            settings,
            issues: Vec::new(),
        };
        let mut p = Parameters::default();

        reader.read_bool(keys::DO_MEDIAN_FILTERING, &mut p.do_median_filtering);
        reader.read_f64(keys::SIGMA_FILTER, &mut p.gaussian_filter_sigma);
        reader.read_count(keys::N_ANISOTROPIC_FILTERING, |v| {
            p.anisotropic_iterations = u32::try_from(v).ok()?;
            Some(())
        });
        reader.read_f64(keys::KAPPA, &mut p.kappa);
        reader.read_f64(keys::SIGMA_GRADIENT, &mut p.gradient_sigma);
        reader.read_f64(keys::GAMMA, &mut p.gamma);
        reader.read_f64(keys::ALPHA, &mut p.alpha);
        reader.read_f64(keys::BETA, &mut p.beta);
        reader.read_f64(keys::EPSILON, &mut p.epsilon);
        reader.read_f64(keys::DELTA, &mut p.delta);
        reader.read_f64(keys::THRESHOLD_FACTOR, &mut p.threshold_factor);
        reader.read_bool(keys::DO_DISPLAY_LABELS, &mut p.do_display_labels);
        reader.read_count(keys::TARGET_CHANNEL, |v| {
            p.target_channel = usize::try_from(v).ok()?;
            Some(())
        });

        let mut issues = reader.issues;
        issues.extend(
            settings
                .keys()
                .filter(|k| !keys::ALL.contains(&k.as_str()))
                .map(|k| ConfigIssue::UnknownKey(k.clone())),
        );
        ConfigError::from_issues(issues)?;
        p.validate()?;
        Ok(p)
    }

    /// 转换为键值表. 与 [`Parameters::from_settings`] 互逆.
    pub fn to_settings(&self) -> BTreeMap<String, SettingValue> {
        let entries: [(&str, SettingValue); 13] = [
            (keys::DO_MEDIAN_FILTERING, self.do_median_filtering.into()),
            (keys::SIGMA_FILTER, self.gaussian_filter_sigma.into()),
            (
                keys::N_ANISOTROPIC_FILTERING,
                i64::from(self.anisotropic_iterations).into(),
            ),
            (keys::KAPPA, self.kappa.into()),
            (keys::SIGMA_GRADIENT, self.gradient_sigma.into()),
            (keys::GAMMA, self.gamma.into()),
            (keys::ALPHA, self.alpha.into()),
            (keys::BETA, self.beta.into()),
            (keys::EPSILON, self.epsilon.into()),
            (keys::DELTA, self.delta.into()),
            (keys::THRESHOLD_FACTOR, self.threshold_factor.into()),
            (keys::DO_DISPLAY_LABELS, self.do_display_labels.into()),
            (
                keys::TARGET_CHANNEL,
                SettingValue::Int(self.target_channel as i64),
            ),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// 由参数构造出的各阶段.
#[derive(Debug, Clone)]
pub(crate) struct Stages {
    pub(crate) filter: PixelFilter,
    pub(crate) diffuser: AnisotropicDiffuser,
    pub(crate) derivatives: DerivativeEngine,
    pub(crate) mask: MaskBuilder,
    pub(crate) otsu: OtsuThresholder2D,
}

impl Stages {
    pub(crate) fn new(p: &Parameters) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let filter = PixelFilter::new(p.do_median_filtering, p.gaussian_filter_sigma)
            .map_err(|e| issues.push(e))
            .ok();
        let diffuser = AnisotropicDiffuser::new(p.anisotropic_iterations, p.kappa)
            .map_err(|e| issues.push(e))
            .ok();
        let derivatives = DerivativeEngine::new(p.gradient_sigma)
            .map_err(|e| issues.push(e))
            .ok();
        let coefficients = p
            .mask_coefficients()
            .map_err(|mut e| issues.append(&mut e))
            .ok();
        let otsu = OtsuThresholder2D::new(p.threshold_factor)
            .map_err(|e| issues.push(e))
            .ok();

        ConfigError::from_issues(issues)?;
        match (filter, diffuser, derivatives, coefficients, otsu) {
            (Some(filter), Some(diffuser), Some(derivatives), Some(c), Some(otsu)) => Ok(Self {
                filter,
                diffuser,
                derivatives,
                mask: MaskBuilder::new(c),
                otsu,
            }),
            _ => unreachable!("a stage failed without reporting an issue"),
        }
    }
}

/// 逐键读取, 并积累问题.
struct SettingsReader<'a> {
    settings: &'a BTreeMap<String, SettingValue>,
    issues: Vec<ConfigIssue>,
}

impl SettingsReader<'_> {
    fn get(&mut self, key: &'static str) -> Option<SettingValue> {
        let v = self.settings.get(key).copied();
        if v.is_none() {
            self.issues.push(ConfigIssue::Missing(key));
        }
        v
    }

    fn read_bool(&mut self, key: &'static str, out: &mut bool) {
        if let Some(v) = self.get(key) {
            match v.as_bool() {
                Some(b) => *out = b,
                None => self.issues.push(ConfigIssue::WrongType {
                    key,
                    expected: "bool",
                }),
            }
        }
    }

    fn read_f64(&mut self, key: &'static str, out: &mut f64) {
        if let Some(v) = self.get(key) {
            match v.as_f64() {
                Some(d) => *out = d,
                None => self.issues.push(ConfigIssue::WrongType {
                    key,
                    expected: "float",
                }),
            }
        }
    }

    /// 读取非负整数. `store` 返回 `None` 表示超出目标类型的范围.
    fn read_count<F: FnOnce(u64) -> Option<()>>(&mut self, key: &'static str, store: F) {
        let Some(v) = self.get(key) else {
            return;
        };
        let Some(i) = v.as_i64() else {
            self.issues.push(ConfigIssue::WrongType {
                key,
                expected: "int",
            });
            return;
        };
        let stored = u64::try_from(i).ok().and_then(store);
        if stored.is_none() {
            self.issues.push(ConfigIssue::OutOfRange {
                key,
                value: i as f64,
                constraint: ">= 0",
            });
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  1. Pre-filtering:")?;
        writeln!(f, "    - do median filtering: {}", self.do_median_filtering)?;
        writeln!(
            f,
            "    - gaussian filter sigma: {:.1}",
            self.gaussian_filter_sigma
        )?;
        writeln!(f, "  2. Anisotropic diffusion:")?;
        writeln!(
            f,
            "    - number of iterations: {}",
            self.anisotropic_iterations
        )?;
        writeln!(f, "    - gradient threshold kappa: {:.1}", self.kappa)?;
        writeln!(f, "  3. Derivatives calculation:")?;
        writeln!(f, "    - gaussian gradient sigma: {:.1}", self.gradient_sigma)?;
        writeln!(f, "  4. Mask parameters:")?;
        writeln!(f, "    - γ tanh shift: {:.1}", self.gamma)?;
        writeln!(f, "    - α gradient contribution: {:.1}", self.alpha)?;
        writeln!(f, "    - β positive laplacian contribution: {:.1}", self.beta)?;
        writeln!(f, "    - ε negative hessian contribution: {:.1}", self.epsilon)?;
        writeln!(f, "    - δ derivatives sum scale: {:.1}", self.delta)?;
        writeln!(f, "  5. Thresholding:")?;
        writeln!(f, "    - threshold pre-factor: {:.1}", self.threshold_factor)?;
        writeln!(f, "  Display:")?;
        write!(f, "    - do display label image: {}", self.do_display_labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_settings() -> BTreeMap<String, SettingValue> {
        Parameters::default().to_settings()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let p = Parameters {
            gaussian_filter_sigma: -1.0,
            kappa: 0.0,
            gradient_sigma: 0.0,
            delta: 0.0,
            threshold_factor: f64::NAN,
            ..Default::default()
        };
        let e = p.validate().unwrap_err();
        assert_eq!(e.issues().len(), 5);
        for key in [
            keys::SIGMA_FILTER,
            keys::KAPPA,
            keys::SIGMA_GRADIENT,
            keys::DELTA,
            keys::THRESHOLD_FACTOR,
        ] {
            assert!(e.concerns(key), "{key} not reported");
        }
    }

    #[test]
    fn test_settings_round_trip() {
        let p = Parameters {
            do_median_filtering: true,
            anisotropic_iterations: 12,
            alpha: 2.5,
            target_channel: 3,
            ..Default::default()
        };
        assert_eq!(Parameters::from_settings(&p.to_settings()).unwrap(), p);
    }

    #[test]
    fn test_int_accepted_as_float() {
        let mut s = full_settings();
        s.insert(keys::KAPPA.to_string(), SettingValue::Int(30));
        assert_eq!(Parameters::from_settings(&s).unwrap().kappa, 30.0);
    }

    #[test]
    fn test_missing_wrong_and_unknown_keys() {
        let mut s = full_settings();
        s.remove(keys::GAMMA);
        s.insert(keys::DO_MEDIAN_FILTERING.to_string(), SettingValue::Int(1));
        s.insert(keys::N_ANISOTROPIC_FILTERING.to_string(), 2.5.into());
        s.insert(keys::TARGET_CHANNEL.to_string(), SettingValue::Int(-1));
        s.insert("RADIUS".to_string(), 5.0.into());
        let e = Parameters::from_settings(&s).unwrap_err();
        assert_eq!(
            e.issues(),
            &[
                ConfigIssue::WrongType {
                    key: keys::DO_MEDIAN_FILTERING,
                    expected: "bool"
                },
                ConfigIssue::WrongType {
                    key: keys::N_ANISOTROPIC_FILTERING,
                    expected: "int"
                },
                ConfigIssue::Missing(keys::GAMMA),
                ConfigIssue::OutOfRange {
                    key: keys::TARGET_CHANNEL,
                    value: -1.0,
                    constraint: ">= 0"
                },
                ConfigIssue::UnknownKey("RADIUS".to_string()),
            ]
        );
    }

    #[test]
    fn test_range_checked_after_reading() {
        let mut s = full_settings();
        s.insert(keys::DELTA.to_string(), 0.0.into());
        let e = Parameters::from_settings(&s).unwrap_err();
        assert!(e.concerns(keys::DELTA));
        assert_eq!(e.issues().len(), 1);
    }

    #[test]
    fn test_display_groups_by_stage() {
        let text = Parameters::default().to_string();
        let order = [
            "1. Pre-filtering",
            "2. Anisotropic diffusion",
            "3. Derivatives calculation",
            "4. Mask parameters",
            "5. Thresholding",
            "Display",
        ];
        let pos: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        assert!(pos.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("gradient threshold kappa: 50.0"));
    }
}
